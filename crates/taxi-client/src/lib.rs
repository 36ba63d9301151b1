use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use taxi_types::domain::order::{Order, OrderId};

#[derive(Clone)]
pub struct TaxiClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

/// Typed client for the ride-hailing HTTP API. Authenticated calls use the
/// bearer token set with [`TaxiClientBuilder::with_bearer`] or
/// [`TaxiClient::authenticated`].
#[derive(Clone)]
pub struct TaxiClient {
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
}

impl TaxiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<TaxiClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(TaxiClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    /// Same connection pool, different caller.
    pub fn authenticated(&self, access_token: impl Into<String>) -> Self {
        Self {
            base: self.base.clone(),
            client: self.client.clone(),
            token: Some(access_token.into()),
        }
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn register(&self, req: &RegisterRequest) -> anyhow::Result<Profile> {
        let res = self
            .client
            .post(self.url("register/")?)
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn login(&self, phone_number: &str, password: &str) -> anyhow::Result<Tokens> {
        let res = self
            .client
            .post(self.url("login/")?)
            .json(&LoginRequest {
                phone_number: phone_number.into(),
                password: password.into(),
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn refresh(&self, refresh_token: &str) -> anyhow::Result<String> {
        let res: RefreshResponse = self
            .client
            .post(self.url("token/refresh/")?)
            .json(&RefreshRequest {
                refresh: refresh_token.into(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(res.access)
    }

    pub async fn order_taxi(&self, location_from: &str, location_to: &str) -> anyhow::Result<Order> {
        let res = self
            .authorize(self.client.post(self.url("order-taxi/")?))
            .json(&PlaceOrderRequest {
                location_from: location_from.into(),
                location_to: location_to.into(),
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn personal_info(&self) -> anyhow::Result<Profile> {
        let res = self
            .authorize(self.client.get(self.url("personal-info/")?))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn order_history(&self) -> anyhow::Result<Vec<Order>> {
        let res = self
            .authorize(self.client.get(self.url("order-history/")?))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn cancel_order(&self, id: OrderId) -> anyhow::Result<String> {
        let res: MessageResponse = self
            .authorize(
                self.client
                    .patch(self.url(&format!("customer/orders/{id}/cancel/"))?),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(res.message)
    }

    pub async fn accept_order(&self, id: OrderId) -> anyhow::Result<Order> {
        let res = self
            .authorize(
                self.client
                    .patch(self.url(&format!("driver/orders/{id}/accept/"))?),
            )
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn waiting_orders(&self, page: u64) -> anyhow::Result<OrderPage> {
        let res = self
            .authorize(self.client.get(self.url("driver/orders/")?))
            .query(&[("page", page)])
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn all_waiting_orders(&self) -> anyhow::Result<Vec<Order>> {
        let res = self
            .authorize(self.client.get(self.url("driver/orders/all/")?))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }
}

impl TaxiClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_bearer(self, access_token: impl AsRef<str>) -> anyhow::Result<Self> {
        let value = format!("Bearer {}", access_token.as_ref());
        self.with_header(AUTHORIZATION.as_str(), value)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<TaxiClient> {
        if let Some(client) = self.client {
            return Ok(TaxiClient {
                base: self.base,
                client,
                token: None,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        tracing::debug!(base = %self.base, "taxi client ready");
        Ok(TaxiClient {
            base: self.base,
            client,
            token: None,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RegisterRequest {
    pub phone_number: String,
    pub password: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_model: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub phone_number: String,
    pub role: String,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub car_model: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tokens {
    pub refresh: String,
    pub access: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Order>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct LoginRequest {
    phone_number: String,
    password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct RefreshRequest {
    refresh: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct RefreshResponse {
    access: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct PlaceOrderRequest {
    location_from: String,
    location_to: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct MessageResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use taxi_types::domain::order::OrderStatus;

    fn sample_order() -> Order {
        Order {
            id: 17,
            customer: 1,
            location_from: "A".into(),
            location_to: "B".into(),
            order_time: chrono::Utc::now(),
            status: OrderStatus::Waiting,
            taxi_driver: None,
        }
    }

    #[tokio::test]
    async fn register_login_and_order() {
        let server = MockServer::start();
        let order = sample_order();

        let register_mock = server.mock(|when, then| {
            when.method(POST).path("/register/").json_body_obj(&RegisterRequest {
                phone_number: "+1000".into(),
                password: "pw".into(),
                role: "customer".into(),
                ..Default::default()
            });
            then.status(201).json_body(serde_json::json!({
                "id": 1,
                "phone_number": "+1000",
                "role": "customer",
                "full_name": null,
                "gender": null,
                "age": null,
                "car_model": null
            }));
        });

        let login_mock = server.mock(|when, then| {
            when.method(POST).path("/login/");
            then.status(200).json_body(serde_json::json!({
                "refresh": "r",
                "access": "a",
                "message": "Login successful"
            }));
        });

        let order_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/order-taxi/")
                .header("authorization", "Bearer a")
                .json_body(serde_json::json!({ "location_from": "A", "location_to": "B" }));
            then.status(201).json_body_obj(&order);
        });

        let client = TaxiClient::new(&server.base_url()).unwrap();
        let profile = client
            .register(&RegisterRequest {
                phone_number: "+1000".into(),
                password: "pw".into(),
                role: "customer".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.id, 1);

        let tokens = client.login("+1000", "pw").await.unwrap();
        assert_eq!(tokens.access, "a");

        let placed = client
            .authenticated(tokens.access)
            .order_taxi("A", "B")
            .await
            .unwrap();
        assert_eq!(placed, order);

        register_mock.assert();
        login_mock.assert();
        order_mock.assert();
    }

    #[tokio::test]
    async fn driver_calls_and_errors() {
        let server = MockServer::start();
        let mut accepted = sample_order();
        accepted.status = OrderStatus::Accepted;
        accepted.taxi_driver = Some(2);

        let page_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/driver/orders/")
                .query_param("page", "1")
                .header("authorization", "Bearer d");
            then.status(200).json_body(serde_json::json!({
                "count": 1,
                "next": null,
                "previous": null,
                "results": [sample_order()]
            }));
        });

        let accept_mock = server.mock(|when, then| {
            when.method(httpmock::Method::PATCH)
                .path("/driver/orders/17/accept/");
            then.status(200).json_body_obj(&accepted);
        });

        let cancel_mock = server.mock(|when, then| {
            when.method(httpmock::Method::PATCH)
                .path("/customer/orders/17/cancel/");
            then.status(400)
                .json_body(serde_json::json!({ "error": "Only orders that are in 'Waiting' status can be canceled." }));
        });

        let client = TaxiClient::builder(&server.base_url())
            .unwrap()
            .with_bearer("d")
            .unwrap()
            .build()
            .unwrap();

        let page = client.waiting_orders(1).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].id, 17);

        let order = client.accept_order(17).await.unwrap();
        assert_eq!(order.taxi_driver, Some(2));

        let err = client.cancel_order(17).await.unwrap_err();
        let status = err.downcast_ref::<reqwest::Error>().and_then(|e| e.status());
        assert_eq!(status, Some(reqwest::StatusCode::BAD_REQUEST));

        page_mock.assert();
        accept_mock.assert();
        cancel_mock.assert();
    }
}
