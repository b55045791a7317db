use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    orca_cli::main_entry().await
}
