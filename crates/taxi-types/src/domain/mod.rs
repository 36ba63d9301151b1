pub mod identity;
pub mod order;
pub mod user;
