use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::identity::Caller;
use crate::application::account_service::{AccountService, Registration};
use crate::application::order_service::{OrderPage, OrderService};
use crate::errors::AppError;
use taxi_types::domain::order::{Order, OrderId};
use taxi_types::domain::user::{User, UserId};
use taxi_types::ports::order_repository::OrderRepository;
use taxi_types::ports::user_repository::UserRepository;

pub const DRIVER_ORDERS_PATH: &str = "/driver/orders/";

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

pub struct AppState<R>
where
    R: UserRepository + OrderRepository,
{
    pub accounts: Arc<AccountService<R>>,
    pub orders: Arc<OrderService<R>>,
}

impl<R> Clone for AppState<R>
where
    R: UserRepository + OrderRepository,
{
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            orders: self.orders.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HttpServer<R>
where
    R: UserRepository + OrderRepository,
{
    pub state: AppState<R>,
    pub config: HttpServerConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub refresh: String,
    pub access: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshResponse {
    pub access: String,
}

/// Client-settable order fields; everything else is assigned here.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub location_from: String,
    #[serde(default)]
    pub location_to: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfileResponse {
    pub id: UserId,
    pub phone_number: String,
    pub role: String,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub car_model: Option<String>,
}

impl From<User> for ProfileResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            phone_number: u.phone_number,
            role: u.role.as_str().to_string(),
            full_name: u.full_name,
            gender: u.gender.map(|g| g.as_str().to_string()),
            age: u.age,
            car_model: u.car_model,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderPageResponse {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Order>,
}

impl From<OrderPage> for OrderPageResponse {
    fn from(page: OrderPage) -> Self {
        let link = |n: u64| format!("{DRIVER_ORDERS_PATH}?page={n}");
        Self {
            count: page.count,
            next: page.next_page().map(link),
            previous: page.previous_page().map(link),
            results: page.results,
        }
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

impl<R> HttpServer<R>
where
    R: UserRepository + OrderRepository + Send + Sync + 'static,
{
    pub async fn new(
        accounts: AccountService<R>,
        orders: OrderService<R>,
        config: HttpServerConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            state: AppState {
                accounts: Arc::new(accounts),
                orders: Arc::new(orders),
            },
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/register/", post(register::<R>))
            .route("/login/", post(login::<R>))
            .route("/token/refresh/", post(refresh::<R>))
            .route("/order-taxi/", post(order_taxi::<R>))
            .route("/personal-info/", get(personal_info::<R>))
            .route("/order-history/", get(order_history::<R>))
            .route(
                "/customer/orders/{id}/cancel/",
                patch(cancel_order::<R>).put(cancel_order::<R>),
            )
            .route(
                "/driver/orders/{id}/accept/",
                patch(accept_order::<R>).put(accept_order::<R>),
            )
            .route(DRIVER_ORDERS_PATH, get(waiting_orders_page::<R>))
            .route("/driver/orders/all/", get(waiting_orders::<R>))
            .layer(trace_layer)
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".into())
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("order {raw}")))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn register<R>(
    State(state): State<AppState<R>>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError>
where
    R: UserRepository + OrderRepository,
{
    let Json(payload) = payload?;
    let user = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login<R>(
    State(state): State<AppState<R>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let Json(payload) = payload?;
    let pair = state
        .accounts
        .login(&payload.phone_number, &payload.password)
        .await?;
    Ok(Json(LoginResponse {
        refresh: pair.refresh,
        access: pair.access,
        message: "Login successful".into(),
    }))
}

async fn refresh<R>(
    State(state): State<AppState<R>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let Json(payload) = payload?;
    let access = state.accounts.refresh(&payload.refresh).await?;
    Ok(Json(RefreshResponse { access }))
}

async fn order_taxi<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError>
where
    R: UserRepository + OrderRepository,
{
    let Json(payload) = payload?;
    let order = state
        .orders
        .place_order(&identity, payload.location_from, payload.location_to)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn personal_info<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
) -> Result<Json<ProfileResponse>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let user = state.accounts.personal_info(&identity).await?;
    Ok(Json(user.into()))
}

async fn order_history<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<Order>>, AppError>
where
    R: UserRepository + OrderRepository,
{
    Ok(Json(state.orders.history(&identity).await?))
}

async fn cancel_order<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let id = parse_order_id(&id)?;
    state.orders.cancel(&identity, id).await?;
    Ok(Json(
        serde_json::json!({ "message": "Order canceled successfully." }),
    ))
}

async fn accept_order<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let id = parse_order_id(&id)?;
    Ok(Json(state.orders.accept(&identity, id).await?))
}

async fn waiting_orders_page<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<OrderPageResponse>, AppError>
where
    R: UserRepository + OrderRepository,
{
    let Query(query) = query.map_err(|_| invalid_page())?;
    let page = state
        .orders
        .waiting_page(&identity, query.page.unwrap_or(1))
        .await?;
    Ok(Json(page.into()))
}

async fn waiting_orders<R>(
    State(state): State<AppState<R>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<Order>>, AppError>
where
    R: UserRepository + OrderRepository,
{
    Ok(Json(state.orders.waiting_orders(&identity).await?))
}
