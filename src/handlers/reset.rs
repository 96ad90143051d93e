//! Forgotten-password flow: request an emailed link, then redeem it.
//! Used by: server.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::handlers::{admit, validate_identity, validate_password};
use crate::state::AppState;

/// Same answer whether or not the address belongs to anyone.
pub const RESET_REQUESTED: &str = "if the address is registered, a reset link has been sent";

const RESET_PATH: &str = "reset-password";
const MAX_TOKEN_LEN: usize = 128;

#[derive(Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct RequestResetResponse {
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct CompleteResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct CompleteResetResponse {
    pub reset: bool,
}

/// Appends the reset page to the base path, with or without a trailing slash.
pub fn reset_link(base: &Url, token: &str) -> Url {
    let mut link = base.clone();
    if let Ok(mut segments) = link.path_segments_mut() {
        segments.pop_if_empty().push(RESET_PATH);
    }
    link.set_fragment(None);
    link.query_pairs_mut().clear().append_pair("token", token);
    link
}

pub async fn request_reset(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RequestResetRequest>,
) -> Result<Json<RequestResetResponse>> {
    validate_identity("email", &req.email)?;
    admit(&state, &addr, &req.email)?;
    state.metrics.record_reset_request();

    let Some(account) = state.directory.find_by_email(req.email.trim()).await? else {
        tracing::debug!("reset requested for unknown address");
        return Ok(Json(RequestResetResponse { message: RESET_REQUESTED }));
    };

    let grant = match state.tokens.issue(&account.username, &account.email) {
        Ok(grant) => grant,
        Err(e) => {
            // answer as for an unknown address so a full store reveals nothing
            tracing::error!(username = %account.username, error = %e, "reset token issue failed");
            state.metrics.record_reset_issue_failure();
            return Ok(Json(RequestResetResponse { message: RESET_REQUESTED }));
        }
    };
    let link = reset_link(&state.reset_base_url, &grant.token);

    match state
        .mailer
        .send_reset_link(&account.email, &account.username, link.as_str())
        .await
    {
        Ok(()) => {
            state.metrics.record_reset_link_sent();
            tracing::info!(username = %account.username, "reset link issued");
        }
        Err(e) => {
            tracing::error!(username = %account.username, error = %e, "reset link delivery failed");
            // nobody can redeem a link that never arrived
            if let Err(e) = state.tokens.delete(&grant.token) {
                tracing::warn!(error = %e, "could not withdraw undelivered reset token");
            }
        }
    }

    Ok(Json(RequestResetResponse { message: RESET_REQUESTED }))
}

pub async fn complete_reset(
    State(state): State<AppState>,
    Json(req): Json<CompleteResetRequest>,
) -> Result<Json<CompleteResetResponse>> {
    validate_password(&state, &req.new_password)?;

    let token = req.token.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        state.metrics.record_reset_rejected();
        return Err(Error::InvalidToken);
    }

    let grant = state.tokens.redeem(token).map_err(|e| {
        state.metrics.record_reset_rejected();
        match e {
            Error::NotFound | Error::InvalidToken => Error::InvalidToken,
            other => other,
        }
    })?;

    state
        .directory
        .reset_password(&grant.username, &req.new_password)
        .await?;

    state.metrics.record_reset_completed();
    tracing::info!(username = %grant.username, "password reset completed");
    Ok(Json(CompleteResetResponse { reset: true }))
}
