use docqa_rag::{DocQa, DocQaConfig};
use docqa_server::server::{ServerConfig, run_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = DocQaConfig::from_env()?;
    let docqa = DocQa::from_config(&config)?;

    run_server(ServerConfig::from_env(), docqa).await
}
