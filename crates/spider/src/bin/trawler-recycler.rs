use trawler_spider::{run, Variant};

#[tokio::main]
async fn main() {
    if let Err(e) = run(Variant::Recycling).await {
        tracing::error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
