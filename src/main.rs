use hashicups_provider::{init_logging, serve, HashicupsProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting HashiCups provider");

    serve(HashicupsProvider::new()).await
}
