mod identity;
mod server;

pub use identity::Caller;
pub use server::{
    AppState, HttpServer, HttpServerConfig, LoginRequest, LoginResponse, OrderPageResponse,
    PlaceOrderRequest, ProfileResponse, RefreshRequest, RefreshResponse,
};
