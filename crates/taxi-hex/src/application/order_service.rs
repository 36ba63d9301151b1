use crate::errors::AppError;
use taxi_types::domain::identity::{Capability, Identity};
use taxi_types::domain::order::{
    NewOrder, Order, OrderId, OrderStatus, Transition, TransitionOutcome,
};
use taxi_types::ports::order_repository::{OrderRepository, Window};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const CANCEL_CONFLICT: &str = "Only orders that are in 'Waiting' status can be canceled.";

/// One page of waiting orders plus the numbers needed for navigation.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub count: u64,
    pub number: u64,
    pub num_pages: u64,
    pub results: Vec<Order>,
}

impl OrderPage {
    pub fn next_page(&self) -> Option<u64> {
        (self.number < self.num_pages).then_some(self.number + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.number > 1).then_some(self.number - 1)
    }
}

pub struct OrderService<R: OrderRepository> {
    repo: R,
    page_size: u64,
}

fn require(identity: &Identity, capability: Capability) -> Result<(), AppError> {
    if identity.has(capability) {
        return Ok(());
    }
    let what = match capability {
        Capability::Customer => "customers",
        Capability::TaxiDriver => "taxi drivers",
    };
    Err(AppError::Forbidden(format!("Only {what} may perform this action.")))
}

fn accept_conflict(current: OrderStatus) -> AppError {
    match current {
        OrderStatus::Canceled => AppError::Conflict("This order has already been canceled.".into()),
        _ => AppError::Conflict("This order has already been accepted.".into()),
    }
}

fn not_found(id: OrderId) -> AppError {
    AppError::NotFound(format!("order {id}"))
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_page_size(repo, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(repo: R, page_size: u64) -> Self {
        Self {
            repo,
            page_size: page_size.max(1),
        }
    }

    /// Any authenticated caller may order a ride; the order always starts
    /// out waiting with no driver.
    pub async fn place_order(
        &self,
        identity: &Identity,
        location_from: String,
        location_to: String,
    ) -> Result<Order, AppError> {
        let new_order = NewOrder::new(identity.user_id, location_from, location_to)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let order = self.repo.create_order(new_order).await?;
        tracing::info!(order_id = order.id, customer = order.customer, "order placed");
        Ok(order)
    }

    pub async fn history(&self, identity: &Identity) -> Result<Vec<Order>, AppError> {
        Ok(self.repo.list_by_customer(identity.user_id).await?)
    }

    pub async fn waiting_orders(&self, identity: &Identity) -> Result<Vec<Order>, AppError> {
        require(identity, Capability::TaxiDriver)?;
        Ok(self.repo.list_by_status(OrderStatus::Waiting, None).await?)
    }

    pub async fn waiting_page(&self, identity: &Identity, number: u64) -> Result<OrderPage, AppError> {
        require(identity, Capability::TaxiDriver)?;
        let count = self.repo.count_by_status(OrderStatus::Waiting).await?;
        let num_pages = count.div_ceil(self.page_size).max(1);
        if number == 0 || number > num_pages {
            return Err(AppError::NotFound("Invalid page.".into()));
        }
        let window = Window {
            offset: (number - 1) * self.page_size,
            limit: self.page_size,
        };
        let results = self
            .repo
            .list_by_status(OrderStatus::Waiting, Some(window))
            .await?;
        Ok(OrderPage {
            count,
            number,
            num_pages,
            results,
        })
    }

    pub async fn accept(&self, identity: &Identity, id: OrderId) -> Result<Order, AppError> {
        require(identity, Capability::TaxiDriver)?;
        let order = self.repo.get_order(id).await?.ok_or_else(|| not_found(id))?;
        if order.status != OrderStatus::Waiting {
            return Err(accept_conflict(order.status));
        }

        // Re-checked by the repository inside its transaction.
        match self
            .repo
            .transition(id, Transition::Accept { driver: identity.user_id })
            .await?
        {
            TransitionOutcome::Applied(order) => {
                tracing::info!(order_id = id, driver = identity.user_id, "order accepted");
                Ok(order)
            }
            TransitionOutcome::Rejected(current) => {
                tracing::warn!(order_id = id, driver = identity.user_id, status = ?current.status, "accept lost race");
                Err(accept_conflict(current.status))
            }
            TransitionOutcome::Missing => Err(not_found(id)),
        }
    }

    /// Customers may cancel only their own orders; anyone else's order is
    /// reported as missing.
    pub async fn cancel(&self, identity: &Identity, id: OrderId) -> Result<Order, AppError> {
        require(identity, Capability::Customer)?;
        let order = self
            .repo
            .get_order(id)
            .await?
            .filter(|o| o.customer == identity.user_id)
            .ok_or_else(|| not_found(id))?;
        if order.status != OrderStatus::Waiting {
            return Err(AppError::Conflict(CANCEL_CONFLICT.into()));
        }

        match self.repo.transition(id, Transition::Cancel).await? {
            TransitionOutcome::Applied(order) => {
                tracing::info!(order_id = id, customer = identity.user_id, "order canceled");
                Ok(order)
            }
            TransitionOutcome::Rejected(current) => {
                tracing::warn!(order_id = id, status = ?current.status, "cancel lost race");
                Err(AppError::Conflict(CANCEL_CONFLICT.into()))
            }
            TransitionOutcome::Missing => Err(not_found(id)),
        }
    }
}
