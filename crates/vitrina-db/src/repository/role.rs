//! # Role Repository
//!
//! Roles are named permission maps. The permission set is stored as a JSON
//! array of permission names in `roles.permissions`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use vitrina_core::permissions::RoleTemplate;
use vitrina_core::validation::validate_name;
use vitrina_core::{new_id, CoreError, Permission, PermissionSet, Role};

/// Row shape of `roles`.
#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: String,
    name: String,
    permissions: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = DbError;

    fn try_from(row: RoleRow) -> DbResult<Role> {
        let permissions: PermissionSet = serde_json::from_str(&row.permissions)?;
        Ok(Role {
            id: row.id,
            name: row.name,
            permissions: permissions.to_vec(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoleRepository { pool }
    }

    pub async fn create(&self, name: &str, permissions: &[Permission]) -> DbResult<Role> {
        validate_name("name", name, 60)?;
        let set: PermissionSet = permissions.iter().copied().collect();
        let now = Utc::now();
        let role = Role {
            id: new_id(),
            name: name.trim().to_string(),
            permissions: set.to_vec(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %role.id, name = %role.name, "Creating role");

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, permissions, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(serde_json::to_string(&set)?)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("name", &role.name))?;

        info!(id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>("SELECT * FROM roles WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Role::try_from)
            .transpose()
    }

    pub async fn require(&self, id: &str) -> DbResult<Role> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Role", id))
    }

    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>("SELECT * FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(Role::try_from)
            .transpose()
    }

    pub async fn list(&self) -> DbResult<Vec<Role>> {
        sqlx::query_as::<_, RoleRow>("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Role::try_from)
            .collect()
    }

    /// Renames a role and/or replaces its permission set.
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        permissions: Option<&[Permission]>,
    ) -> DbResult<Role> {
        let mut role = self.require(id).await?;

        if let Some(name) = name {
            validate_name("name", name, 60)?;
            role.name = name.trim().to_string();
        }
        if let Some(permissions) = permissions {
            role.permissions = permissions
                .iter()
                .copied()
                .collect::<PermissionSet>()
                .to_vec();
        }
        role.updated_at = Utc::now();

        sqlx::query("UPDATE roles SET name = ?2, permissions = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&role.id)
            .bind(&role.name)
            .bind(serde_json::to_string(&role.permission_set())?)
            .bind(role.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value("name", &role.name))?;

        info!(id = %role.id, permissions = role.permissions.len(), "Role updated");
        Ok(role)
    }

    /// Deletes a role no user holds.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if users > 0 {
            return Err(CoreError::RoleInUse {
                role_id: id.to_string(),
                users,
            }
            .into());
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Role", id));
        }

        info!(id = %id, "Role deleted");
        Ok(())
    }

    /// Creates the built-in roles that do not exist yet. Returns all of them.
    pub async fn ensure_builtin(&self) -> DbResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(RoleTemplate::ALL.len());
        for template in RoleTemplate::ALL {
            let role = match self.find_by_name(template.name()).await? {
                Some(role) => role,
                None => {
                    self.create(template.name(), &template.permissions().to_vec())
                        .await?
                }
            };
            roles.push(role);
        }
        Ok(roles)
    }
}
