use async_trait::async_trait;

use crate::domain::user::{NewUser, User, UserId};
use crate::ports::RepoError;

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Fails with [`RepoError::Duplicate`] when the phone number is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError>;
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, RepoError>;
}
