use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use taxi_types::domain::order::{
    NewOrder, Order, OrderId, OrderStatus, Transition, TransitionOutcome,
};
use taxi_types::domain::user::{NewUser, User, UserId};
use taxi_types::ports::order_repository::{OrderRepository, Window};
use taxi_types::ports::user_repository::UserRepository;
use taxi_types::ports::RepoError;

#[derive(Clone)]
pub struct InMemoryRepo {
    pub users: Arc<DashMap<UserId, User>>,
    pub orders: Arc<DashMap<OrderId, Order>>,
    phones: Arc<DashMap<String, UserId>>,
    next_user_id: Arc<AtomicI64>,
    next_order_id: Arc<AtomicI64>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
            phones: Arc::new(DashMap::new()),
            next_user_id: Arc::new(AtomicI64::new(0)),
            next_order_id: Arc::new(AtomicI64::new(0)),
        }
    }

    fn collect_sorted(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut out: Vec<Order> = self
            .orders
            .iter()
            .filter(|kv| keep(kv.value()))
            .map(|kv| kv.value().clone())
            .collect();
        out.sort_by(|a, b| b.order_time.cmp(&a.order_time).then(b.id.cmp(&a.id)));
        out
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        // The phone entry stays locked until the user row is in place.
        match self.phones.entry(user.phone_number.clone()) {
            Entry::Occupied(_) => Err(RepoError::Duplicate(format!(
                "phone_number {}",
                user.phone_number
            ))),
            Entry::Vacant(slot) => {
                let id = self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
                let user = user.into_user(id);
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        Ok(self.users.get(&id).map(|r| r.clone()))
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, RepoError> {
        let Some(id) = self.phones.get(phone_number).map(|r| *r.value()) else {
            return Ok(None);
        };
        self.get_user(id).await
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepoError> {
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = order.into_order(id);
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|r| r.clone()))
    }

    async fn list_by_customer(&self, customer: UserId) -> Result<Vec<Order>, RepoError> {
        Ok(self.collect_sorted(|o| o.customer == customer))
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        window: Option<Window>,
    ) -> Result<Vec<Order>, RepoError> {
        let all = self.collect_sorted(|o| o.status == status);
        Ok(match window {
            Some(w) => all
                .into_iter()
                .skip(w.offset as usize)
                .take(w.limit as usize)
                .collect(),
            None => all,
        })
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, RepoError> {
        Ok(self.orders.iter().filter(|kv| kv.status == status).count() as u64)
    }

    async fn transition(
        &self,
        id: OrderId,
        transition: Transition,
    ) -> Result<TransitionOutcome, RepoError> {
        // The write guard serializes concurrent transitions on one order.
        let Some(mut entry) = self.orders.get_mut(&id) else {
            return Ok(TransitionOutcome::Missing);
        };
        Ok(match entry.apply(transition) {
            Ok(()) => TransitionOutcome::Applied(entry.clone()),
            Err(_) => TransitionOutcome::Rejected(entry.clone()),
        })
    }
}
