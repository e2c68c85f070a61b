#[tokio::main]
async fn main() -> anyhow::Result<()> {
    threatsense::run().await
}
