#[tokio::main]
async fn main() {
    if let Err(err) = mt_api::run().await {
        eprintln!("mt-api failed to start: {err}");
        std::process::exit(1);
    }
}
