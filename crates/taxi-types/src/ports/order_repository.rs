use async_trait::async_trait;

use crate::domain::order::{NewOrder, Order, OrderId, OrderStatus, Transition, TransitionOutcome};
use crate::domain::user::UserId;
use crate::ports::RepoError;

/// Slice of a listing: skip `offset` rows, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepoError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError>;

    /// Orders placed by `customer`, newest first.
    async fn list_by_customer(&self, customer: UserId) -> Result<Vec<Order>, RepoError>;

    /// Orders in `status`, newest first, optionally windowed.
    async fn list_by_status(
        &self,
        status: OrderStatus,
        window: Option<Window>,
    ) -> Result<Vec<Order>, RepoError>;
    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, RepoError>;

    /// Reloads the order, re-checks that it may take `transition` and writes
    /// the result, all under one lock or transaction.
    async fn transition(
        &self,
        id: OrderId,
        transition: Transition,
    ) -> Result<TransitionOutcome, RepoError>;
}
