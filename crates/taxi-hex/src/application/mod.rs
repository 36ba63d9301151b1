pub mod account_service;
pub mod order_service;
pub mod passwords;
pub mod tokens;
