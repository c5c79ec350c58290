use anyhow::Result;
use futago::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
