//! User service.
//!
//! Credentials arrive already hashed; hashing and verification happen outside
//! this crate.

use serde::Deserialize;
use sosmed_common::{AppError, AppResult};
use sosmed_db::{entities::user, repositories::UserRepository};
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email, length(max = 320))]
    pub email: String,

    #[validate(length(min = 1, max = 256))]
    pub name: String,

    /// Opaque hash from the credential verifier.
    #[validate(length(min = 1))]
    pub password_hash: String,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Create a user account.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("name must not be blank".to_string()));
        }

        let user = self
            .user_repo
            .create(&email, name, &input.password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Find a user by e-mail, for credential verification.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        self.user_repo
            .find_by_email(&email.trim().to_lowercase())
            .await
    }

    /// All active users ordered by ID.
    pub async fn list(&self) -> AppResult<Vec<user::Model>> {
        self.user_repo.list_active().await
    }
}
