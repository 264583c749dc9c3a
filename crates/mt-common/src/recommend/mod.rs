//! Store recommendation: candidate filtering, scoring and ranking.

pub mod geo;
pub mod normalize;
pub mod pipeline;
pub mod scoring;
pub mod weights;

pub use geo::{filter_candidates, CandidateFilter, FilteredCandidate};
pub use pipeline::{
    DataSourceError, RankRequest, RecommendError, RecommendationData, Recommender,
};
pub use scoring::{ScoredCandidate, ScoringEngine};
pub use weights::{ScoreWeights, ScoringConfig};
