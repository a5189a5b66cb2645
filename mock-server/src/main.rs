use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mock_server=info".parse()?))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let engine_code = std::env::var("H3YUN_ENGINE_CODE").unwrap_or_else(|_| "mock-code".to_string());
    let engine_secret = std::env::var("H3YUN_ENGINE_SECRET").unwrap_or_else(|_| "mock-secret".to_string());

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, %engine_code, "listening");
    mock_server::run(listener, &engine_code, &engine_secret).await?;
    Ok(())
}
