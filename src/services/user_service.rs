//! Domain service for user accounts and author subscriptions.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::api::types::{SubscriptionDto, UserDto};
use crate::constants::{limits, users};
use crate::domain::UserId;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(users::USERNAME_PATTERN).expect("Invalid regex"));

/// Errors specific to user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("You are not subscribed to {0}")]
    NotSubscribed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterInput {
    /// Field-level checks; uniqueness is checked against the database later.
    pub fn validate(&self, min_password_length: usize) -> Result<(), UserError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(UserError::Validation("Email is required".into()));
        }
        if email.len() > limits::MAX_EMAIL_LEN {
            return Err(UserError::Validation(format!(
                "Email must be {} characters or less",
                limits::MAX_EMAIL_LEN
            )));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(UserError::Validation(format!("Invalid email: {email}"))),
        }

        validate_username(&self.username)?;

        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(UserError::Validation(format!("{field} is required")));
            }
            if value.chars().count() > limits::MAX_PERSON_NAME_LEN {
                return Err(UserError::Validation(format!(
                    "{field} must be {} characters or less",
                    limits::MAX_PERSON_NAME_LEN
                )));
            }
        }

        validate_password(&self.password, min_password_length)
    }
}

pub fn validate_username(username: &str) -> Result<(), UserError> {
    if username.is_empty() {
        return Err(UserError::Validation("Username is required".into()));
    }
    if username.chars().count() > limits::MAX_USERNAME_LEN {
        return Err(UserError::Validation(format!(
            "Username must be {} characters or less",
            limits::MAX_USERNAME_LEN
        )));
    }
    if username == users::RESERVED_USERNAME {
        return Err(UserError::Validation(format!(
            "Username '{}' is reserved",
            users::RESERVED_USERNAME
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(UserError::Validation(
            "Username may only contain letters, digits and @/./+/-/_".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), UserError> {
    if password.chars().count() < min_length {
        return Err(UserError::Validation(format!(
            "Password must be at least {min_length} characters"
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(UserError::Validation(
            "Password cannot be entirely numeric".into(),
        ));
    }
    Ok(())
}

/// Domain service trait for users.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// # Errors
    ///
    /// Returns [`UserError::Conflict`] if the email or username is taken.
    async fn register(&self, input: RegisterInput) -> Result<UserDto, UserError>;

    async fn list(
        &self,
        viewer: Option<UserId>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<UserDto>, UserError>;

    async fn get(&self, viewer: Option<UserId>, id: UserId) -> Result<UserDto, UserError>;

    /// Follows `author`, returning the author with up to `recipes_limit`
    /// of their recipes.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] when following oneself and
    /// [`UserError::Conflict`] when already subscribed.
    async fn subscribe(
        &self,
        follower: UserId,
        author: UserId,
        recipes_limit: Option<u64>,
    ) -> Result<SubscriptionDto, UserError>;

    /// # Errors
    ///
    /// Returns [`UserError::NotSubscribed`] if no subscription exists.
    async fn unsubscribe(&self, follower: UserId, author: UserId) -> Result<(), UserError>;

    async fn subscriptions(
        &self,
        follower: UserId,
        limit: u64,
        offset: u64,
        recipes_limit: Option<u64>,
    ) -> Result<Vec<SubscriptionDto>, UserError>;
}
