use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::principal::Role;
use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::StoreError;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Stored credentials for a login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub principal_id: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
    pub role: Role,
}

/// User persistence as the login and registration paths need it.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_credentials(&self, login: &str) -> Result<Option<Credentials>, StoreError>;
    /// Create a user and return its new principal id. A taken login is `StoreError::Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<String, StoreError>;
}

/// Password login and registration over a `UserRepository`.
#[derive(Clone)]
pub struct LoginProvider {
    users: Arc<dyn UserRepository>,
}

impl LoginProvider {
    pub fn new(users: Arc<dyn UserRepository>) -> Self { Self { users } }

    /// Verify credentials and return the principal id. Unknown login and wrong
    /// password produce the same error.
    pub async fn login(&self, req: &LoginRequest) -> AppResult<String> {
        let invalid = || AppError::unauthorized("invalid_credentials", "invalid login or password");
        if req.login.is_empty() || req.password.is_empty() {
            return Err(invalid());
        }
        // a relational outage on login is a server failure, not an auth verdict
        let creds = self.users.find_credentials(&req.login).await.map_err(AppError::from_business)?;
        let Some(creds) = creds else {
            debug!(login = %req.login, "login for unknown user");
            // same argon2 cost as a wrong password
            let _ = security::verify_password(security::UNKNOWN_USER_PHC, &req.password);
            return Err(invalid());
        };
        if !security::verify_password(&creds.password_hash, &req.password) {
            return Err(invalid());
        }
        info!(principal = %creds.principal_id, "login ok");
        Ok(creds.principal_id)
    }

    /// Register a user. Only customer and partner may self-register.
    pub async fn register(&self, login: &str, password: &str, role: Role) -> AppResult<String> {
        if login.trim().is_empty() || password.is_empty() {
            return Err(AppError::user("missing_credentials", "login and password are required"));
        }
        if role == Role::Admin {
            return Err(AppError::user("invalid_role", "admin accounts cannot self-register"));
        }
        let password_hash = security::hash_password(password).map_err(|e| AppError::internal("password_hash", &e.to_string()))?;
        let id = self
            .users
            .create_user(NewUser { login: login.trim().to_string(), password_hash, role })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::conflict("login_taken", "login already registered"),
                StoreError::Unavailable(m) | StoreError::Unexpected(m) => AppError::internal("user_create", &m),
            })?;
        info!(principal = %id, role = %role, "user registered");
        Ok(id)
    }
}
