//! gwsync command-line entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gwsync_cli::run().await
}
