#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tillbase_gateway::run().await
}
