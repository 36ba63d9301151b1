#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use taxi_types::domain::order::*;
use taxi_types::domain::user::{NewUser, User, UserId};
use taxi_types::ports::order_repository::{OrderRepository, Window};
use taxi_types::ports::user_repository::UserRepository;
use taxi_types::ports::RepoError;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://taxi.db";

#[cfg(all(feature = "memory", not(feature = "sqlite")))]
type Backend = memory::InMemoryRepo;

// With both features on, SQLite is the store of record.
#[cfg(feature = "sqlite")]
type Backend = sqlite::SqliteRepo;

/// The store selected at compile time by the `memory` / `sqlite` features.
#[derive(Clone)]
pub struct Repo {
    backend: Backend,
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build_repo(_: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("using in-memory repo");
        Ok(Self {
            backend: memory::InMemoryRepo::new(),
        })
    }

    #[cfg(feature = "sqlite")]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or(DEFAULT_DATABASE_URL);
        tracing::info!(url, "using sqlite repo");
        let backend = sqlite::SqliteRepo::new(url).await?;
        Ok(Self { backend })
    }
}

#[async_trait::async_trait]
impl UserRepository for Repo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        self.backend.create_user(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        self.backend.get_user(id).await
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, RepoError> {
        self.backend.find_by_phone(phone_number).await
    }
}

#[async_trait::async_trait]
impl OrderRepository for Repo {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepoError> {
        self.backend.create_order(order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        self.backend.get_order(id).await
    }

    async fn list_by_customer(&self, customer: UserId) -> Result<Vec<Order>, RepoError> {
        self.backend.list_by_customer(customer).await
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        window: Option<Window>,
    ) -> Result<Vec<Order>, RepoError> {
        self.backend.list_by_status(status, window).await
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, RepoError> {
        self.backend.count_by_status(status).await
    }

    async fn transition(
        &self,
        id: OrderId,
        transition: Transition,
    ) -> Result<TransitionOutcome, RepoError> {
        self.backend.transition(id, transition).await
    }
}
