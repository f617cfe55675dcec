use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Main entrypoint simply delegates control to CLI layer.
    // Tracing is initialized there since `--debug` decides the filter.
    search_tail::cli::cli::run().await
}
