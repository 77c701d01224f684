//! `SeaORM` implementation of the `UserService` trait.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::api::types::{ShortRecipeDto, SubscriptionDto, UserDto};
use crate::config::Config;
use crate::db::{AddOutcome, NewUser, RemoveOutcome, Store, User};
use crate::domain::UserId;
use crate::services::user_service::{RegisterInput, UserError, UserService};

pub struct SeaOrmUserService {
    store: Store,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self { store, config }
    }

    async fn require(&self, id: UserId) -> Result<User, UserError> {
        self.store
            .users()
            .get_by_id(id.value())
            .await?
            .ok_or(UserError::NotFound(id))
    }

    async fn followed_by(
        &self,
        viewer: Option<UserId>,
        users: &[User],
    ) -> Result<HashSet<UserId>, UserError> {
        let Some(viewer) = viewer else {
            return Ok(HashSet::new());
        };
        let ids: Vec<UserId> = users.iter().map(|u| UserId::new(u.id)).collect();
        Ok(self
            .store
            .subscriptions()
            .following_among(viewer, &ids)
            .await?)
    }

    /// Author view with a preview of their newest recipes.
    async fn subscription_view(
        &self,
        author: User,
        recipes_limit: Option<u64>,
    ) -> Result<SubscriptionDto, UserError> {
        let author_id = UserId::new(author.id);
        let recipes = self.store.recipes();

        let preview = recipes
            .list_by_author(author_id, recipes_limit)
            .await?
            .into_iter()
            .map(ShortRecipeDto::from)
            .collect();
        let recipes_count = recipes.count_by_author(author_id).await?;

        Ok(SubscriptionDto {
            user: UserDto::from_user(author, true),
            recipes: preview,
            recipes_count,
        })
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, input: RegisterInput) -> Result<UserDto, UserError> {
        let security = self.config.read().await.security.clone();
        input.validate(security.min_password_length)?;

        let email = input.email.trim().to_string();
        let users = self.store.users();

        if users.get_by_email(&email).await?.is_some() {
            return Err(UserError::Conflict(format!(
                "A user with email {email} already exists"
            )));
        }
        if users.get_by_username(&input.username).await?.is_some() {
            return Err(UserError::Conflict(format!(
                "A user with username {} already exists",
                input.username
            )));
        }

        let user = users
            .create(
                NewUser {
                    email,
                    username: input.username,
                    first_name: input.first_name.trim().to_string(),
                    last_name: input.last_name.trim().to_string(),
                    password: input.password,
                },
                &security,
            )
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(UserDto::from_user(user, false))
    }

    async fn list(
        &self,
        viewer: Option<UserId>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<UserDto>, UserError> {
        let users = self.store.users().list(limit, offset).await?;
        let followed = self.followed_by(viewer, &users).await?;

        Ok(users
            .into_iter()
            .map(|u| {
                let subscribed = followed.contains(&UserId::new(u.id));
                UserDto::from_user(u, subscribed)
            })
            .collect())
    }

    async fn get(&self, viewer: Option<UserId>, id: UserId) -> Result<UserDto, UserError> {
        let user = self.require(id).await?;
        let subscribed = match viewer {
            Some(viewer) => self.store.subscriptions().exists(viewer, id).await?,
            None => false,
        };
        Ok(UserDto::from_user(user, subscribed))
    }

    async fn subscribe(
        &self,
        follower: UserId,
        author: UserId,
        recipes_limit: Option<u64>,
    ) -> Result<SubscriptionDto, UserError> {
        let target = self.require(author).await?;

        if follower == author {
            return Err(UserError::Conflict(
                "You cannot subscribe to yourself".into(),
            ));
        }

        match self.store.subscriptions().add(follower, author).await? {
            AddOutcome::Created => {
                info!(
                    follower_id = follower.value(),
                    following_id = author.value(),
                    "Subscription created"
                );
                self.subscription_view(target, recipes_limit).await
            }
            AddOutcome::Conflict => Err(UserError::Conflict(format!(
                "Already subscribed to {}",
                target.username
            ))),
        }
    }

    async fn unsubscribe(&self, follower: UserId, author: UserId) -> Result<(), UserError> {
        let target = self.require(author).await?;

        match self.store.subscriptions().remove(follower, author).await? {
            RemoveOutcome::Removed => Ok(()),
            RemoveOutcome::NotFound => Err(UserError::NotSubscribed(target.username)),
        }
    }

    async fn subscriptions(
        &self,
        follower: UserId,
        limit: u64,
        offset: u64,
        recipes_limit: Option<u64>,
    ) -> Result<Vec<SubscriptionDto>, UserError> {
        let ids = self
            .store
            .subscriptions()
            .following(follower, limit, offset)
            .await?;
        let raw: Vec<i32> = ids.iter().map(UserId::value).collect();
        let mut authors = self.store.users().get_by_ids(&raw).await?;
        // Keep subscription order rather than id order.
        authors.sort_by_key(|u| raw.iter().position(|id| *id == u.id));

        let mut views = Vec::with_capacity(authors.len());
        for author in authors {
            views.push(self.subscription_view(author, recipes_limit).await?);
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    async fn service_with_user() -> (SeaOrmUserService, Store, UserId) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..Default::default()
        };
        let user = store
            .users()
            .create(
                NewUser {
                    email: "alice@example.com".to_string(),
                    username: "alice".to_string(),
                    first_name: "Alice".to_string(),
                    last_name: "Test".to_string(),
                    password: "password123".to_string(),
                },
                &security,
            )
            .await
            .unwrap();
        let config = Arc::new(RwLock::new(Config::default()));
        let service = SeaOrmUserService::new(store.clone(), config);
        (service, store, UserId::new(user.id))
    }

    #[tokio::test]
    async fn self_subscription_is_conflict_before_any_write() {
        let (service, store, alice) = service_with_user().await;

        let err = service.subscribe(alice, alice, None).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict(_)), "{err:?}");

        assert!(!store.subscriptions().exists(alice, alice).await.unwrap());
        assert!(
            store
                .subscriptions()
                .following(alice, 10, 0)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
