//! Login and the session view the client builds its menu from.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vitrina_core::password::DUMMY_HASH;
use vitrina_core::permissions::visible_sections;
use vitrina_core::{Permission, RegisterSession, Role, Section, Store, User};

use crate::auth::verify_password_blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/session", get(current_session))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub session: SessionView,
}

/// Who is logged in, what they may do, and the register state of their
/// store.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: User,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub sections: Vec<Section>,
    pub store: Option<Store>,
    /// Open register session of the user's store, if any.
    pub register: Option<RegisterSession>,
}

impl SessionView {
    pub async fn build(state: &AppState, session: Session) -> ApiResult<Self> {
        let (store, register) = match session.user.store_id.as_deref() {
            Some(store_id) => (
                state.db.stores().get_by_id(store_id).await?,
                state.db.registers().current(store_id).await?,
            ),
            None => (None, None),
        };

        Ok(SessionView {
            sections: visible_sections(&session.permissions),
            permissions: session.permissions.to_vec(),
            user: session.user,
            role: session.role,
            store,
            register,
        })
    }
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let found = state.db.users().find_credentials(&req.username).await?;

    // Unknown and disabled users still pay for one verification
    let (user, hash) = match found {
        Some((user, hash)) if user.is_enabled => (user, hash),
        Some(_) => {
            verify_password_blocking(req.password, DUMMY_HASH.to_string()).await?;
            warn!(username = %req.username, "Login of a disabled user");
            return Err(ApiError::invalid_credentials());
        }
        None => {
            verify_password_blocking(req.password, DUMMY_HASH.to_string()).await?;
            warn!(username = %req.username, "Login of an unknown user");
            return Err(ApiError::invalid_credentials());
        }
    };

    if !verify_password_blocking(req.password, hash).await? {
        warn!(username = %user.username, "Login with a wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let role = state.db.roles().require(&user.role_id).await?;
    let token = state.jwt.issue(&user)?;
    info!(username = %user.username, role = %role.name, "User logged in");

    let session = SessionView::build(&state, Session::new(user, role)).await?;
    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt.lifetime_secs(),
        session,
    }))
}

async fn current_session(State(state): State<AppState>, session: Session) -> ApiResult<Json<SessionView>> {
    Ok(Json(SessionView::build(&state, session).await?))
}
