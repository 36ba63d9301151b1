use crate::application::passwords::CredentialHasher;
use crate::application::tokens::{TokenIssuer, TokenKind, TokenPair};
use crate::errors::AppError;
use serde::Deserialize;
use taxi_types::domain::identity::Identity;
use taxi_types::domain::user::{Gender, NewUser, Role, User};
use taxi_types::ports::user_repository::UserRepository;

/// Registration form. Choice fields arrive as strings and are checked here
/// so that bad values surface as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub car_model: Option<String>,
}

pub struct AccountService<R: UserRepository> {
    repo: R,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
}

impl<R: UserRepository> AccountService<R> {
    pub fn new(repo: R, hasher: CredentialHasher, tokens: TokenIssuer) -> Self {
        Self {
            repo,
            hasher,
            tokens,
        }
    }

    pub async fn register(&self, form: Registration) -> Result<User, AppError> {
        let phone_number = form
            .phone_number
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::Validation("phone_number is required".into()))?;
        let password = form
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation("password is required".into()))?;
        let role: Role = form
            .role
            .ok_or_else(|| AppError::Validation("role is required".into()))?
            .parse()
            .map_err(AppError::Validation)?;
        let gender = form
            .gender
            .filter(|g| !g.is_empty())
            .map(|g| g.parse::<Gender>())
            .transpose()
            .map_err(AppError::Validation)?;

        let password_hash = self.hash_off_runtime(password).await?;
        let new_user = NewUser::new(
            phone_number,
            role,
            form.full_name,
            gender,
            form.age,
            form.car_model,
            password_hash,
        )
        .map_err(|e| AppError::Validation(e.to_string()))?;

        let user = self.repo.create_user(new_user).await?;
        tracing::info!(user_id = user.id, role = user.role.as_str(), "user registered");
        Ok(user)
    }

    /// Unknown phone, wrong password and inactive account all yield the
    /// same error.
    pub async fn login(&self, phone_number: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self.repo.find_by_phone(phone_number.trim()).await?;
        let Some(user) = user.filter(|u| u.is_active) else {
            tracing::warn!("login rejected");
            return Err(AppError::InvalidCredentials);
        };
        if !self.verify_off_runtime(password, &user.password_hash).await? {
            tracing::warn!("login rejected");
            return Err(AppError::InvalidCredentials);
        }

        let identity = Identity::new(user.id, user.role.capability());
        let pair = self.tokens.issue(identity)?;
        tracing::info!(user_id = user.id, "login succeeded");
        Ok(pair)
    }

    /// New access token for a refresh token whose user is still active.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let identity = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        self.active_user(&identity).await?;
        Ok(self.tokens.access_for(identity)?)
    }

    /// Resolves a bearer access token to the caller's identity. The user
    /// behind the token must still exist and be active.
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity, AppError> {
        let identity = self.tokens.verify(access_token, TokenKind::Access)?;
        self.active_user(&identity).await?;
        Ok(identity)
    }

    pub async fn personal_info(&self, identity: &Identity) -> Result<User, AppError> {
        self.active_user(identity).await
    }

    async fn active_user(&self, identity: &Identity) -> Result<User, AppError> {
        self.repo
            .get_user(identity.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("User not found or inactive".into()))
    }

    async fn hash_off_runtime(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(hash)
    }

    async fn verify_off_runtime(&self, password: &str, stored: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let (password, stored) = (password.to_string(), stored.to_string());
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(ok)
    }
}
