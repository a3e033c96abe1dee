#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopfront_lib::run().await
}
