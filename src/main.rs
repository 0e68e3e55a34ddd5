use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pairchat_server::run().await
}
