//! Change a password the user already knows.
//! Used by: server.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handlers::{admit, validate_identity, validate_password};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub username: String,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ChangePasswordResponse {
    pub changed: bool,
}

pub async fn change_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>> {
    validate_identity("username", &req.username)?;
    validate_password(&state, &req.new_password)?;
    if req.new_password == req.current_password {
        return Err(Error::Validation("new password must differ from the current one".into()));
    }

    admit(&state, &addr, &req.username)?;

    let username = req.username.trim();
    match state
        .directory
        .change_password(username, &req.current_password, &req.new_password)
        .await
    {
        Ok(()) => {
            tracing::info!(username, "password changed");
            state.metrics.record_password_change();
            Ok(Json(ChangePasswordResponse { changed: true }))
        }
        Err(e) => {
            tracing::info!(username, error = %e, "password change failed");
            state.metrics.record_password_change_failure();
            Err(e)
        }
    }
}
