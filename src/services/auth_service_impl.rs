//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::db::Store;
use crate::domain::UserId;
use crate::services::auth_service::{AuthError, AuthService, LoginResult};
use crate::services::user_service::{UserError, validate_password};

pub struct SeaOrmAuthService {
    store: Store,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .store
            .users()
            .verify_password(email.trim(), password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        info!(user_id = user.id, "User logged in");

        Ok(LoginResult {
            user_id: UserId::new(user.id),
            auth_token: user.api_key,
        })
    }

    async fn logout(&self, user: UserId) -> Result<(), AuthError> {
        self.store.users().regenerate_api_key(user.value()).await?;
        info!(user_id = user.value(), "User logged out, token rotated");
        Ok(())
    }

    async fn verify_token(&self, token: &str) -> Result<Option<UserId>, AuthError> {
        let user = self.store.users().verify_api_key(token).await?;
        Ok(user.map(|u| UserId::new(u.id)))
    }

    async fn change_password(
        &self,
        user: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let security = self.config.read().await.security.clone();

        validate_password(new_password, security.min_password_length).map_err(|e| match e {
            UserError::Validation(msg) => AuthError::Validation(msg),
            other => AuthError::Internal(other.to_string()),
        })?;

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let users = self.store.users();
        let account = users
            .get_by_id(user.value())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if users
            .verify_password(&account.email, current_password)
            .await?
            .is_none()
        {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        users
            .update_password(user.value(), new_password, &security)
            .await?;

        info!(user_id = user.value(), "Password changed");
        Ok(())
    }
}
