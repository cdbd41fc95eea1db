mod bridge;
mod sim;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bridge::run().await
}
