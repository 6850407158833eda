// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for scheduler task handlers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod common;

fn task_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-tasks-token", token);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_tasks_without_token_unauthorized() {
    for uri in [
        "/tasks/process-data",
        "/tasks/refresh-tokens",
        "/tasks/reset-processing",
        "/tasks/delete-athlete/7",
    ] {
        let (app, _) = common::create_test_app();
        let response = app.oneshot(task_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_tasks_with_wrong_token_forbidden() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(task_request("/tasks/process-data", Some("guess")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_wrong_token_does_not_run_ingestion() {
    let (app, state) = common::create_test_app();
    common::register(state.store.as_ref(), 7).await;

    let response = app
        .oneshot(task_request("/tasks/process-data", Some("guess")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.store.get_activity_ids(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_process_data_with_token_runs_batch() {
    let (app, state) = common::create_test_app();
    common::register(state.store.as_ref(), 7).await;
    let token = state.config.tasks_token.clone();

    let response = app
        .oneshot(task_request("/tasks/process-data", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["processed"], 1);
    assert_eq!(state.store.get_activity_ids(7).await.unwrap().len(), 25);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_process_data_runs_once() {
    let strava = Arc::new(common::FakeStrava {
        detail_delay: Some(Duration::from_millis(100)),
        ..common::FakeStrava::with_activities(25)
    });
    let (app, state) = common::create_test_app_with(strava.clone());
    common::register(state.store.as_ref(), 7).await;
    let token = state.config.tasks_token.clone();

    let (first, second) = tokio::join!(
        app.clone()
            .oneshot(task_request("/tasks/process-data", Some(&token))),
        app.oneshot(task_request("/tasks/process-data", Some(&token))),
    );

    let mut statuses = Vec::new();
    for response in [first.unwrap(), second.unwrap()] {
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        statuses.push(json["status"].as_str().unwrap().to_string());
    }
    statuses.sort();
    assert_eq!(statuses, ["already_running", "completed"]);
    assert_eq!(strava.detail_calls.load(Ordering::SeqCst), 25);
}

#[tokio::test]
async fn test_process_data_reports_limit_exceeded() {
    let (app, state) = common::create_test_app();
    state
        .store
        .set_budget(&stride_features::models::DailyBudget {
            consumed: 25_001,
            updated_at: None,
        })
        .await
        .unwrap();
    let token = state.config.tasks_token.clone();

    let response = app
        .oneshot(task_request("/tasks/process-data", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "limit_exceeded");
    assert_eq!(json["consumed"], 25_001);
}

#[tokio::test]
async fn test_reset_processing_with_token() {
    let (app, state) = common::create_test_app();
    let status = common::register(state.store.as_ref(), 7).await;
    state
        .store
        .set_status(&status.with_state(stride_features::models::ProcessingState::Processed))
        .await
        .unwrap();
    let token = state.config.tasks_token.clone();

    let response = app
        .oneshot(task_request("/tasks/reset-processing", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["reset"], 1);
}

#[tokio::test]
async fn test_delete_athlete_removes_stored_data() {
    let (app, state) = common::create_test_app();
    common::register(state.store.as_ref(), 7).await;
    state.ingestion().run_batch().await.unwrap();
    let token = state.config.tasks_token.clone();

    let response = app
        .oneshot(task_request("/tasks/delete-athlete/7", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    // 25 activities, 25 feature rows, stats, metadata and status
    assert_eq!(json["deleted"], 53);
    assert!(state.store.get_status(7).await.unwrap().is_none());
    assert!(state.store.get_athlete_metadata(7).await.unwrap().is_none());
    assert!(state.store.get_activity_ids(7).await.unwrap().is_empty());
}
