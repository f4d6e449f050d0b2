//! Request extractors: the authenticated [`Session`] and JSON / query
//! wrappers that reject with an [`ApiError`] body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::warn;
use vitrina_core::permissions::ensure_store_access;
use vitrina_core::{CoreError, Permission, PermissionSet, Role, User};

use crate::auth::extract_bearer_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The caller of a protected endpoint.
///
/// Resolved from the bearer token on every request: the user must still
/// exist and be enabled, and permissions come from the current role.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl Session {
    pub fn new(user: User, role: Role) -> Self {
        let permissions = user.effective_permissions(&role);
        Session {
            user,
            role,
            permissions,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        self.permissions.require(permission).map_err(|e| {
            warn!(user = %self.user.username, %permission, "Permission denied");
            e.into()
        })
    }

    pub fn require_any(&self, permissions: &[Permission]) -> ApiResult<()> {
        self.permissions.require_any(permissions).map_err(|e| {
            warn!(user = %self.user.username, "Permission denied");
            e.into()
        })
    }

    /// Refuses to hand out a permission the caller does not hold.
    pub fn ensure_grantable(&self, permissions: &[Permission]) -> ApiResult<()> {
        match permissions.iter().find(|p| !self.permissions.contains(**p)) {
            Some(missing) => {
                warn!(user = %self.user.username, permission = %missing, "Permission not held");
                Err(CoreError::PermissionDenied(*missing).into())
            }
            None => Ok(()),
        }
    }

    pub fn ensure_store(&self, store_id: &str) -> ApiResult<()> {
        ensure_store_access(&self.permissions, self.user.store_id.as_deref(), store_id).map_err(
            |e| {
                warn!(user = %self.user.username, store_id = %store_id, "Store access denied");
                e.into()
            },
        )
    }

    /// The store an action happens at: the requested one (checked against
    /// the user's scope) or the user's own.
    pub fn target_store(&self, requested: Option<&str>) -> ApiResult<String> {
        match requested.or(self.user.store_id.as_deref()) {
            Some(store_id) => {
                self.ensure_store(store_id)?;
                Ok(store_id.to_string())
            }
            None => Err(ApiError::validation("store_id is required")),
        }
    }

    /// The store filter of a listing. `None` means every store and is only
    /// possible with `all_stores`.
    pub fn store_scope(&self, requested: Option<&str>) -> ApiResult<Option<String>> {
        if let Some(store_id) = requested {
            self.ensure_store(store_id)?;
            return Ok(Some(store_id.to_string()));
        }
        if self.permissions.contains(Permission::AllStores) {
            return Ok(None);
        }
        match &self.user.store_id {
            Some(store_id) => Ok(Some(store_id.clone())),
            None => Err(ApiError::validation("store_id is required")),
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

        let claims = state.jwt.validate(token)?;

        let user = state
            .db
            .users()
            .get_by_id(&claims.sub)
            .await?
            .filter(|u| u.is_enabled)
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "Token of a missing or disabled user");
                ApiError::unauthorized("Session is no longer valid")
            })?;
        let role = state.db.roles().require(&user.role_id).await?;

        Ok(Session::new(user, role))
    }
}

/// `axum::Json` whose rejection is an [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::from(e))?;
        Ok(ApiJson(value))
    }
}

/// `Option<ApiJson<T>>` is `None` when the request has no JSON body.
impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let value = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::from(e))?;
        Ok(value.map(|Json(v)| ApiJson(v)))
    }
}

/// `axum::extract::Query` whose rejection is an [`ApiError`].
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::from(e))?;
        Ok(ApiQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(store: Option<&str>, permissions: &[Permission]) -> Session {
        let now = Utc::now();
        let role = Role {
            id: "r".into(),
            name: "test".into(),
            permissions: permissions.to_vec(),
            created_at: now,
            updated_at: now,
        };
        let user = User {
            id: "u".into(),
            username: "ana".into(),
            display_name: "Ana".into(),
            role_id: "r".into(),
            store_id: store.map(str::to_string),
            extra_permissions: Vec::new(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        };
        Session::new(user, role)
    }

    #[test]
    fn test_target_store_defaults_to_own() {
        let s = session(Some("centro"), &[Permission::Sell]);
        assert_eq!(s.target_store(None).unwrap(), "centro");
        assert!(s.target_store(Some("norte")).is_err());
    }

    #[test]
    fn test_all_stores_scope() {
        let s = session(None, &[Permission::AllStores]);
        assert_eq!(s.store_scope(None).unwrap(), None);
        assert_eq!(s.store_scope(Some("norte")).unwrap().as_deref(), Some("norte"));
        assert!(s.target_store(None).is_err());
    }

    #[test]
    fn test_store_user_scope() {
        let s = session(Some("centro"), &[]);
        assert_eq!(s.store_scope(None).unwrap().as_deref(), Some("centro"));
        assert!(s.store_scope(Some("norte")).is_err());
        assert!(s.require(Permission::ViewReports).is_err());
    }

    #[test]
    fn test_grant_only_what_is_held() {
        let s = session(Some("centro"), &[Permission::ManageUsers, Permission::Sell]);
        assert!(s.ensure_grantable(&[]).is_ok());
        assert!(s.ensure_grantable(&[Permission::Sell, Permission::ManageUsers]).is_ok());
        assert!(s.ensure_grantable(&[Permission::Sell, Permission::AllStores]).is_err());
    }
}
