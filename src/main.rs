use rask_log_batcher::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
