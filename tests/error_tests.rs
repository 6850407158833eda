// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{http::StatusCode, response::IntoResponse};
use stride_features::error::AppError;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[test]
fn test_fetch_failure_classification() {
    assert!(AppError::Transport("timeout".to_string()).is_fetch_failure());
    assert!(AppError::Authorization(AppError::STRAVA_TOKEN_ERROR.to_string()).is_fetch_failure());
    assert!(!AppError::Database("down".to_string()).is_fetch_failure());
    assert!(!AppError::BudgetExceeded { consumed: 1, cap: 1 }.is_fetch_failure());
}

#[test]
fn test_is_strava_token_error() {
    assert!(AppError::Authorization(AppError::STRAVA_TOKEN_ERROR.to_string()).is_strava_token_error());
    assert!(!AppError::Transport(AppError::STRAVA_RATE_LIMIT.to_string()).is_strava_token_error());
    assert!(!AppError::BadRequest("Bad Request".to_string()).is_strava_token_error());
}

#[tokio::test]
async fn test_error_status_codes() {
    let cases = [
        (AppError::Transport("reset".into()), StatusCode::BAD_GATEWAY, "strava_error"),
        (
            AppError::Authorization("revoked".into()),
            StatusCode::UNAUTHORIZED,
            "strava_unauthorized",
        ),
        (
            AppError::BudgetExceeded { consumed: 25_001, cap: 25_000 },
            StatusCode::TOO_MANY_REQUESTS,
            "api_limit_exceeded",
        ),
        (AppError::NotFound("athlete 1".into()), StatusCode::NOT_FOUND, "not_found"),
        (AppError::BadRequest("nope".into()), StatusCode::BAD_REQUEST, "bad_request"),
        (
            AppError::Database("write failed".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "database_error",
        ),
    ];

    for (err, expected_status, expected_error) in cases {
        let (status, json) = render(err).await;
        assert_eq!(status, expected_status);
        assert_eq!(json["error"], expected_error);
    }
}

#[tokio::test]
async fn test_internal_errors_hide_details() {
    let (status, json) = render(AppError::Database("credentials at /etc/key".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json.get("details").is_none());

    let (_, json) = render(AppError::Internal(anyhow::anyhow!("boom"))).await;
    assert_eq!(json["error"], "internal_error");
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn test_budget_error_mentions_counts() {
    let (_, json) = render(AppError::BudgetExceeded { consumed: 25_001, cap: 25_000 }).await;
    assert_eq!(json["details"], "api limit exceeded (25001/25000 calls)");
}
