#[tokio::main]
async fn main() {
    if let Err(err) = heatwatch::run().await {
        eprintln!("heatwatch: {}", err);
        std::process::exit(1);
    }
}
