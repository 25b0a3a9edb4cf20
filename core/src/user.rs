use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};
use uuid::Uuid;

use crate::{db::Database, ids::UserId};

pub const SESSION_TTL_SECONDS: i64 = 60 * 60 * 24 * 14;

const USER_COLUMNS: &str = "id, email, password_hash, full_name, avatar_url, created_at";

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Accounts and sign-in sessions. The identity layer in front of the
/// organization services; nothing here checks memberships.
#[derive(Clone)]
pub struct UserStore {
    pool: Pool<Sqlite>,
}

impl UserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        full_name: Option<&str>,
    ) -> Result<UserRecord> {
        let id = UserId::generate();
        let created_at = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, full_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;

        Ok(UserRecord {
            id,
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            full_name: full_name.map(str::to_owned),
            avatar_url: None,
            created_at,
        })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    /// `Some(None)` clears a field; `None` leaves it. Returns `None` when the
    /// user does not exist.
    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<Option<String>>,
        avatar_url: Option<Option<String>>,
    ) -> Result<Option<UserRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        let mut separated = builder.separated(", ");
        let mut has_updates = false;

        if let Some(full_name) = full_name {
            separated.push("full_name = ");
            separated.push_bind_unseparated(full_name);
            has_updates = true;
        }
        if let Some(avatar_url) = avatar_url {
            separated.push("avatar_url = ");
            separated.push_bind_unseparated(avatar_url);
            has_updates = true;
        }

        if has_updates {
            builder.push(" WHERE id = ");
            builder.push_bind(user_id);
            builder.build().execute(&self.pool).await?;
        }

        self.find_by_id(user_id).await
    }

    /// Replaces the stored hash. Returns `false` when the user does not exist.
    pub async fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to update password")?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes the account; sessions and memberships go with it.
    pub async fn delete(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_session(&self, user_id: &str) -> Result<SessionRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        let expires_at = created_at + SESSION_TTL_SECONDS;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(SessionRecord {
            id,
            user_id: UserId::from(user_id),
            created_at,
            expires_at,
        })
    }

    /// Live session by id. An expired session is deleted on sight.
    pub async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row =
            sqlx::query("SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(record) = row.map(|row| SessionRecord {
            id: row.get("id"),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }) else {
            return Ok(None);
        };

        if record.is_expired(Utc::now().timestamp()) {
            self.delete_session(&record.id).await?;
            Ok(None)
        } else {
            Ok(Some(record))
        }
    }

    /// Slides the expiry of a live session forward.
    pub async fn refresh_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let Some(mut record) = self.find_session(session_id).await? else {
            return Ok(None);
        };

        record.expires_at = Utc::now().timestamp() + SESSION_TTL_SECONDS;
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(record.expires_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(Some(record))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_row(row: SqliteRow) -> UserRecord {
        UserRecord {
            id: UserId::from(row.get::<String, _>("id")),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            avatar_url: row.get("avatar_url"),
            created_at: row.get("created_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_database;

    #[tokio::test]
    async fn create_and_lookup_user() {
        let (_dir, database) = setup_database().await;
        let store = UserStore::new(&database);

        let user = store
            .create("bob@x.com", "hash", Some("Bob"))
            .await
            .expect("create user");
        let by_email = store
            .find_by_email("bob@x.com")
            .await
            .expect("lookup")
            .expect("user");
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.full_name.as_deref(), Some("Bob"));

        let err = store
            .create("bob@x.com", "hash", None)
            .await
            .expect_err("duplicate email");
        assert!(crate::db::errors::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn update_profile_sets_and_clears_fields() {
        let (_dir, database) = setup_database().await;
        let store = UserStore::new(&database);
        let user = store
            .create("bob@x.com", "hash", Some("Bob"))
            .await
            .expect("create user");

        let updated = store
            .update_profile(
                user.id.as_str(),
                Some(None),
                Some(Some("https://img.example.com/b.png".into())),
            )
            .await
            .expect("update")
            .expect("user");
        assert!(updated.full_name.is_none());
        assert_eq!(
            updated.avatar_url.as_deref(),
            Some("https://img.example.com/b.png")
        );

        let missing = store
            .update_profile("nobody", Some(Some("x".into())), None)
            .await
            .expect("update missing");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let (_dir, database) = setup_database().await;
        let store = UserStore::new(&database);
        let user = store
            .create("bob@x.com", "hash", None)
            .await
            .expect("create user");
        let session = store
            .create_session(user.id.as_str())
            .await
            .expect("session");

        let refreshed = store
            .refresh_session(&session.id)
            .await
            .expect("refresh")
            .expect("live session");
        assert!(refreshed.expires_at >= session.expires_at);

        sqlx::query("UPDATE sessions SET expires_at = 0 WHERE id = ?")
            .bind(&session.id)
            .execute(database.pool())
            .await
            .expect("expire session");
        assert!(store.find_session(&session.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn deleting_user_drops_sessions() {
        let (_dir, database) = setup_database().await;
        let store = UserStore::new(&database);
        let user = store
            .create("bob@x.com", "hash", None)
            .await
            .expect("create user");
        let session = store
            .create_session(user.id.as_str())
            .await
            .expect("session");

        assert!(store.delete(user.id.as_str()).await.expect("delete"));
        assert!(!store.delete(user.id.as_str()).await.expect("delete again"));
        assert!(store.find_session(&session.id).await.expect("find").is_none());
    }
}
