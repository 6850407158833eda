// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth routes: authorize, then register the athlete for ingestion.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::ProcessingState;
use crate::services::ingest::register_athlete;
use crate::AppState;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
}

/// Callback URL on this host, derived from the request.
fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/strava/callback", scheme, host)
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope=activity:read_all",
        STRAVA_AUTHORIZE_URL,
        state.config.strava_client_id,
        urlencoding::encode(&callback_url(&headers)),
    );

    tracing::info!(
        client_id = %state.config.strava_client_id,
        "Starting OAuth flow, redirecting to Strava"
    );

    Redirect::temporary(&auth_url)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct CallbackResponse {
    pub athlete_id: u64,
    pub firstname: String,
    pub status: ProcessingState,
}

/// OAuth callback - exchange the code and register the athlete.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Err(AppError::BadRequest(format!("authorization denied: {}", error)));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing 'code' parameter".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let tokens = state.token_provider.exchange_code(&code).await?;

    let status = register_athlete(
        state.store.as_ref(),
        tokens.athlete.id,
        tokens.access_token,
        tokens.refresh_token,
    )
    .await?;

    tracing::info!(
        athlete_id = status.athlete_id,
        status = %status.status,
        "OAuth successful, athlete registered"
    );

    Ok(Json(CallbackResponse {
        athlete_id: status.athlete_id,
        firstname: tokens.athlete.firstname,
        status: status.status,
    }))
}
