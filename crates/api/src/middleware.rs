use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use arkpos_auth::{JwtValidator, UserId, UserStatus};
use arkpos_infra::projections::{UserRow, UsersProjection};
use arkpos_infra::read_model::ReadStore;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Account status as the read side currently knows it.
pub trait AccountStatus: Send + Sync {
    fn status(&self, user_id: UserId) -> Option<UserStatus>;
}

impl<S> AccountStatus for UsersProjection<S>
where
    S: ReadStore<UserId, UserRow>,
{
    fn status(&self, user_id: UserId) -> Option<UserStatus> {
        self.get(user_id).map(|row| row.status)
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub accounts: Arc<dyn AccountStatus>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing bearer token");
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", e.to_string());
        }
    };

    // A valid token does not outlive a suspension.
    if state.accounts.status(claims.sub) == Some(UserStatus::Suspended) {
        tracing::info!(user_id = %claims.sub, "rejected token of suspended user");
        return errors::json_error(StatusCode::FORBIDDEN, "user_suspended", "user is suspended");
    }

    req.extensions_mut().insert(PrincipalContext::from(claims));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
