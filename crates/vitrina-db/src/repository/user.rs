//! # User Repository
//!
//! Users, their password hashes and their extra permission flags.
//!
//! Password hashes are read only through [`UserRepository::find_credentials`];
//! every other method returns [`User`], which has no hash field.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use vitrina_core::validation::{validate_name, validate_username};
use vitrina_core::{new_id, Permission, PermissionSet, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    display_name: String,
    role_id: String,
    store_id: Option<String>,
    extra_permissions: String,
    is_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> DbResult<(User, String)> {
        let extra: PermissionSet = serde_json::from_str(&self.extra_permissions)?;
        let user = User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            role_id: self.role_id,
            store_id: self.store_id,
            extra_permissions: extra.to_vec(),
            is_enabled: self.is_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok((user, self.password_hash))
    }
}

/// Input for [`UserRepository::create`]. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role_id: String,
    pub store_id: Option<String>,
    pub extra_permissions: Vec<Permission>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub role_id: Option<String>,
    /// `Some(None)` unassigns the store.
    pub store_id: Option<Option<String>>,
    pub extra_permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn create(&self, new: NewUser) -> DbResult<User> {
        validate_username(&new.username)?;
        validate_name("display_name", &new.display_name, 100)?;

        let extra: PermissionSet = new.extra_permissions.into_iter().collect();
        let now = Utc::now();
        let user = User {
            id: new_id(),
            username: new.username.trim().to_string(),
            display_name: new.display_name.trim().to_string(),
            role_id: new.role_id,
            store_id: new.store_id,
            extra_permissions: extra.to_vec(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, username = %user.username, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, password_hash, display_name, role_id, store_id,
                extra_permissions, is_enabled, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&new.password_hash)
        .bind(&user.display_name)
        .bind(&user.role_id)
        .bind(&user.store_id)
        .bind(serde_json::to_string(&extra)?)
        .bind(user.is_enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("username", &user.username))?;

        info!(id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.into_user().map(|(user, _)| user)).transpose()
    }

    pub async fn require(&self, id: &str) -> DbResult<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Looks a user up by username for login, with the stored hash.
    pub async fn find_credentials(&self, username: &str) -> DbResult<Option<(User, String)>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?1")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRow::into_user).transpose()
    }

    /// Lists users, optionally only those assigned to one store.
    pub async fn list(&self, store_id: Option<&str>) -> DbResult<Vec<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE (?1 IS NULL OR store_id = ?1) ORDER BY username",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| r.into_user().map(|(user, _)| user))
        .collect()
    }

    pub async fn update(&self, id: &str, update: UserUpdate) -> DbResult<User> {
        let mut user = self.require(id).await?;

        if let Some(display_name) = update.display_name {
            validate_name("display_name", &display_name, 100)?;
            user.display_name = display_name.trim().to_string();
        }
        if let Some(role_id) = update.role_id {
            user.role_id = role_id;
        }
        if let Some(store_id) = update.store_id {
            user.store_id = store_id;
        }
        if let Some(extra) = update.extra_permissions {
            user.extra_permissions = extra.into_iter().collect::<PermissionSet>().to_vec();
        }
        user.updated_at = Utc::now();

        let extra: PermissionSet = user.extra_permissions.iter().copied().collect();
        sqlx::query(
            r#"
            UPDATE users SET
                display_name = ?2,
                role_id = ?3,
                store_id = ?4,
                extra_permissions = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.role_id)
        .bind(&user.store_id)
        .bind(serde_json::to_string(&extra)?)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %user.id, "User updated");
        Ok(user)
    }

    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        info!(id = %id, "Password changed");
        Ok(())
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> DbResult<User> {
        let result = sqlx::query("UPDATE users SET is_enabled = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(enabled)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        info!(id = %id, enabled, "User status changed");
        self.require(id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let roles = db.roles().ensure_builtin().await.unwrap();
        (db, roles[2].id.clone())
    }

    fn new_user(username: &str, role_id: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            display_name: "Ana López".to_string(),
            role_id: role_id.to_string(),
            store_id: None,
            extra_permissions: vec![Permission::ViewReports],
        }
    }

    #[tokio::test]
    async fn test_create_and_find_credentials() {
        let (db, cashier) = setup().await;
        let user = db.users().create(new_user("ana", &cashier)).await.unwrap();

        let (found, hash) = db.users().find_credentials("ana").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(hash, "hash");
        assert_eq!(found.extra_permissions, vec![Permission::ViewReports]);

        assert!(db.users().find_credentials("nadie").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (db, cashier) = setup().await;
        db.users().create(new_user("ana", &cashier)).await.unwrap();
        let err = db.users().create(new_user("ana", &cashier)).await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate username: 'ana' already exists");
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let (db, _) = setup().await;
        let err = db.users().create(new_user("ana", "no-role")).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_and_disable() {
        let (db, cashier) = setup().await;
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = db.users().create(new_user("ana", &cashier)).await.unwrap();

        let updated = db
            .users()
            .update(
                &user.id,
                UserUpdate {
                    store_id: Some(Some(store.id.clone())),
                    extra_permissions: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.store_id.as_deref(), Some(store.id.as_str()));
        assert!(updated.extra_permissions.is_empty());

        let disabled = db.users().set_enabled(&user.id, false).await.unwrap();
        assert!(!disabled.is_enabled);
        assert_eq!(db.users().list(Some(&store.id)).await.unwrap().len(), 1);
    }
}
