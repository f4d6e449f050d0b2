//! First-run setup: built-in roles and, on an empty database, the first
//! administrator.

use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::NewUser;
use vitrina_core::password::hash_password;
use vitrina_core::{Role, User};

/// Credentials for the administrator created on an empty database.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct Bootstrap {
    /// Built-in roles in template order: administrator, manager, cashier.
    pub roles: Vec<Role>,
    pub admin_created: Option<User>,
}

/// Ensures the built-in roles exist and creates the first administrator
/// when the database has no users yet.
pub async fn bootstrap(db: &Database, admin: Option<&AdminSeed>) -> DbResult<Bootstrap> {
    let roles = db.roles().ensure_builtin().await?;

    let admin_created = match admin {
        Some(seed) if db.users().count().await? == 0 => {
            let user = db
                .users()
                .create(NewUser {
                    username: seed.username.clone(),
                    password_hash: hash_password(&seed.password)?,
                    display_name: seed.display_name.clone(),
                    role_id: roles[0].id.clone(),
                    store_id: None,
                    extra_permissions: Vec::new(),
                })
                .await?;
            info!(username = %user.username, "Initial administrator created");
            Some(user)
        }
        Some(_) => None,
        None => {
            if db.users().count().await? == 0 {
                warn!("No users exist and no initial administrator is configured");
            }
            None
        }
    };

    Ok(Bootstrap {
        roles,
        admin_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use vitrina_core::permissions::RoleTemplate;

    fn seed() -> AdminSeed {
        AdminSeed {
            username: "admin".to_string(),
            password: "cambiar123".to_string(),
            display_name: "Administrador".to_string(),
        }
    }

    #[tokio::test]
    async fn test_creates_admin_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = bootstrap(&db, Some(&seed())).await.unwrap();
        assert_eq!(first.roles.len(), 3);
        assert_eq!(first.roles[0].name, RoleTemplate::Administrator.name());
        let admin = first.admin_created.unwrap();
        assert_eq!(admin.role_id, first.roles[0].id);

        let (_, hash) = db.users().find_credentials("admin").await.unwrap().unwrap();
        assert!(vitrina_core::password::verify_password("cambiar123", &hash));

        let second = bootstrap(&db, Some(&seed())).await.unwrap();
        assert!(second.admin_created.is_none());
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_roles_without_admin() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = bootstrap(&db, None).await.unwrap();
        assert_eq!(result.roles.len(), 3);
        assert!(result.admin_created.is_none());
    }
}
