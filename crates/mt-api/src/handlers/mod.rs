pub mod autocomplete;
pub mod health;
pub mod recommendations;
pub mod search_events;
