use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{generate_jwt, hash_password, verify_password, Claims, JwtError};
use crate::config::{BootstrapAdmin, SecurityConfig};
use crate::database::models::user::{KNOWN_ROLES, ROLE_ADMIN};
use crate::database::models::User;
use crate::database::store::{StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User already exists: {0}")]
    UserExists(String),
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Token error: {0}")]
    Token(#[from] JwtError),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires
    pub expires_in: u64,
}

/// Credential checks and token issuance
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    jwt_expiry_hours: u64,
    password_hash_cost: u32,
}

/// bcrypt is deliberately slow; keep it off the async workers
async fn hash_blocking(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

async fn verify_blocking(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, security: &SecurityConfig) -> Self {
        Self {
            users,
            jwt_secret: security.jwt_secret.clone(),
            jwt_expiry_hours: security.jwt_expiry_hours,
            password_hash_cost: security.password_hash_cost,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Unknown users and wrong passwords fail the same way
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self.users.find_by_username(username).await?;
        let verified = match &user {
            Some(user) => verify_blocking(password, &user.password_hash).await?,
            None => false,
        };
        let user = match user {
            Some(user) if verified => user,
            _ => {
                warn!("Failed login for '{}'", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let claims = Claims::new(&user, self.jwt_expiry_hours);
        let access_token = generate_jwt(&claims, &self.jwt_secret)?;

        info!("User '{}' logged in", user.username);
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.jwt_expiry_hours * 3600,
        })
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        roles: Vec<String>,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("Username is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".to_string()));
        }
        if let Some(role) = roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
            return Err(AuthError::UnknownRole(role.clone()));
        }

        let password_hash = hash_blocking(password, self.password_hash_cost).await?;
        let user = User::new(username, password_hash, roles);
        self.users.insert_user(&user).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => AuthError::UserExists(user.username.clone()),
            other => AuthError::Store(other),
        })?;

        info!("Created user '{}' with roles {:?}", user.username, user.roles);
        Ok(user)
    }

    /// Create the configured admin unless that username is taken. Returns
    /// whether a user was created.
    pub async fn seed_admin(&self, admin: &BootstrapAdmin) -> Result<bool, AuthError> {
        if self.users.find_by_username(&admin.username).await?.is_some() {
            return Ok(false);
        }
        match self
            .create_user(&admin.username, &admin.password, vec![ROLE_ADMIN.to_string()])
            .await
        {
            Ok(_) => Ok(true),
            Err(AuthError::UserExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
