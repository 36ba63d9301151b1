use taxi_hex::application::account_service::AccountService;
use taxi_hex::application::order_service::OrderService;
use taxi_hex::application::passwords::CredentialHasher;
use taxi_hex::application::tokens::TokenIssuer;
use taxi_hex::config::Config;
use taxi_hex::inbound::http::{HttpServer, HttpServerConfig};
use taxi_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / JWT_SECRET when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    let repo: Repo = build_repo(config.database_url.as_deref()).await?;

    let tokens = TokenIssuer::new(
        &config.jwt_secret,
        config.access_token_ttl_secs,
        config.refresh_token_ttl_secs,
    );
    let accounts = AccountService::new(repo.clone(), CredentialHasher::new(), tokens);
    let orders = OrderService::with_page_size(repo, config.driver_page_size);

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };
    tracing::info!(port = %server_cfg.port, page_size = config.driver_page_size, "taxi api configured");

    let http = HttpServer::new(accounts, orders, server_cfg).await?;
    http.run().await
}
