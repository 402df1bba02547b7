use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    hidebox_cli::cli::app::run().await
}
