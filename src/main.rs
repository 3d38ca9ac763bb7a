#[tokio::main]
async fn main() {
    if let Err(e) = download_badges::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
