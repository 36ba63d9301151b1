///  To run :
///  cargo r --example ride_flow
use taxi_client::{RegisterRequest, TaxiClient};
use taxi_hex::application::account_service::AccountService;
use taxi_hex::application::order_service::OrderService;
use taxi_hex::application::passwords::CredentialHasher;
use taxi_hex::application::tokens::TokenIssuer;
use taxi_hex::inbound::http::{HttpServer, HttpServerConfig};
use taxi_repo::build_repo;
use taxi_types::domain::order::OrderStatus;
use reqwest::StatusCode;
use tempfile::tempdir;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn registration(phone: &str, role: &str) -> RegisterRequest {
    RegisterRequest {
        phone_number: phone.into(),
        password: "secret".into(),
        role: role.into(),
        full_name: Some(format!("Example {role}")),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // Use a temp file-backed SQLite DB so multiple connections see the same data.
    let tmp = tempdir()?;
    let db_path = tmp.path().join("taxi.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let repo = build_repo(Some(&db_url)).await?;
    let accounts = AccountService::new(
        repo.clone(),
        CredentialHasher::new(),
        TokenIssuer::new("example-secret", 300, 86_400),
    );
    let server = HttpServer::new(
        accounts,
        OrderService::new(repo),
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await?;

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let anonymous = TaxiClient::new(&addr)?;
    anonymous.register(&registration("+1000", "customer")).await?;
    let driver_profile = anonymous.register(&registration("+2000", "taxi_driver")).await?;
    anonymous.register(&registration("+3000", "taxi_driver")).await?;

    let rider = anonymous.authenticated(anonymous.login("+1000", "secret").await?.access);
    let driver = anonymous.authenticated(anonymous.login("+2000", "secret").await?.access);
    let rival = anonymous.authenticated(anonymous.login("+3000", "secret").await?.access);

    let order = rider.order_taxi("A", "B").await?;
    println!("Placed order id={} status={:?}", order.id, order.status);

    let page = driver.waiting_orders(1).await?;
    println!("Driver sees {} waiting order(s)", page.count);

    let accepted = driver.accept_order(order.id).await?;
    assert_eq!(accepted.taxi_driver, Some(driver_profile.id));
    println!("Accepted by driver {}", driver_profile.id);

    match rival.accept_order(order.id).await {
        Ok(_) => anyhow::bail!("second accept unexpectedly succeeded"),
        Err(err) => {
            let status = err.downcast_ref::<reqwest::Error>().and_then(|e| e.status());
            assert_eq!(status, Some(StatusCode::BAD_REQUEST));
            println!("Rival driver rejected with {status:?}");
        }
    }

    let history = rider.order_history().await?;
    assert_eq!(history[0].status, OrderStatus::Accepted);
    println!("Rider history: {:?}", history[0]);

    handle.abort();
    Ok(())
}
