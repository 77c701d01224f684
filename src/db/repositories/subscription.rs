use std::collections::HashSet;

use crate::domain::UserId;
use crate::entities::{prelude::*, subscriptions};
use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use super::membership::{AddOutcome, RemoveOutcome, is_unique_violation};

/// Follower -> author edges.
pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn exists(&self, follower: UserId, following: UserId) -> Result<bool> {
        let count = Subscriptions::find()
            .filter(subscriptions::Column::FollowerId.eq(follower.value()))
            .filter(subscriptions::Column::FollowingId.eq(following.value()))
            .count(&self.conn)
            .await
            .context("Failed to check subscription")?;

        Ok(count > 0)
    }

    /// Callers reject `follower == following` before reaching here; the table
    /// CHECK constraint is the last line.
    pub async fn add(&self, follower: UserId, following: UserId) -> Result<AddOutcome> {
        if self.exists(follower, following).await? {
            return Ok(AddOutcome::Conflict);
        }

        let row = subscriptions::ActiveModel {
            follower_id: Set(follower.value()),
            following_id: Set(following.value()),
            created_at: Set(crate::db::now_timestamp()),
        };

        match Subscriptions::insert(row).exec(&self.conn).await {
            Ok(_) => Ok(AddOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(AddOutcome::Conflict),
            Err(err) => Err(err).context("Failed to insert subscription"),
        }
    }

    pub async fn remove(&self, follower: UserId, following: UserId) -> Result<RemoveOutcome> {
        let result = Subscriptions::delete_many()
            .filter(subscriptions::Column::FollowerId.eq(follower.value()))
            .filter(subscriptions::Column::FollowingId.eq(following.value()))
            .exec(&self.conn)
            .await
            .context("Failed to delete subscription")?;

        Ok(if result.rows_affected > 0 {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        })
    }

    /// Authors followed by `follower`, most recent subscription first.
    pub async fn following(
        &self,
        follower: UserId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<UserId>> {
        let ids: Vec<i32> = Subscriptions::find()
            .filter(subscriptions::Column::FollowerId.eq(follower.value()))
            .order_by_desc(subscriptions::Column::CreatedAt)
            .order_by_desc(subscriptions::Column::FollowingId)
            .offset(offset)
            .limit(limit)
            .select_only()
            .column(subscriptions::Column::FollowingId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to list subscriptions")?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }

    /// Which of `authors` the follower is subscribed to.
    pub async fn following_among(
        &self,
        follower: UserId,
        authors: &[UserId],
    ) -> Result<HashSet<UserId>> {
        if authors.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<i32> = Subscriptions::find()
            .filter(subscriptions::Column::FollowerId.eq(follower.value()))
            .filter(subscriptions::Column::FollowingId.is_in(authors.iter().map(UserId::value)))
            .select_only()
            .column(subscriptions::Column::FollowingId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load subscriptions")?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::db::Store;
    use crate::db::repositories::user::NewUser;

    async fn user(store: &Store, name: &str) -> UserId {
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..Default::default()
        };
        let user = store
            .users()
            .create(
                NewUser {
                    email: format!("{name}@example.com"),
                    username: name.to_string(),
                    first_name: name.to_string(),
                    last_name: "Test".to_string(),
                    password: "password123".to_string(),
                },
                &security,
            )
            .await
            .unwrap();
        UserId::new(user.id)
    }

    #[tokio::test]
    async fn subscribe_then_duplicate_is_conflict() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let repo = store.subscriptions();

        assert_eq!(repo.add(alice, bob).await.unwrap(), AddOutcome::Created);
        assert_eq!(repo.add(alice, bob).await.unwrap(), AddOutcome::Conflict);
        assert_eq!(repo.following(alice, 10, 0).await.unwrap(), vec![bob]);
        assert!(repo.following(bob, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_subscription_violates_check_constraint() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let alice = user(&store, "alice").await;

        assert!(store.subscriptions().add(alice, alice).await.is_err());
    }

    #[tokio::test]
    async fn unsubscribe_absent_is_not_found() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        assert_eq!(
            store.subscriptions().remove(alice, bob).await.unwrap(),
            RemoveOutcome::NotFound
        );
    }
}
