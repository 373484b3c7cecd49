use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use forgewms_auth::{AuthError, Credentials, IdentityProvider};

use crate::app::errors::json_error;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityProvider>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Some(token) => token.to_string(),
        None => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token"),
    };

    let user = match state.identity.authenticate(&Credentials::Bearer(token)) {
        Ok(user) => user,
        Err(AuthError::Inactive) => {
            return json_error(StatusCode::FORBIDDEN, "inactive", "account is inactive");
        }
        Err(e) => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string()),
    };

    req.extensions_mut().insert(CurrentUser::new(user));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
