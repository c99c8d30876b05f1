//! HTTP surface: warm-up trigger, health, and the Slack events receiver.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rota_sdk::UserId;
use rota_sdk::events::{Envelope, Event};
use rota_sdk::signing::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::announce;
use crate::groups::Group;
use crate::scheduler::{Scheduler, Status};

const LIST_COMMAND: &str = "list";

pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    /// Requests are not verified when unset.
    pub signing_secret: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(warm_up))
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Kick off a cycle and answer right away.
async fn warm_up(State(state): State<Arc<AppState>>) -> &'static str {
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move { scheduler.trigger("warm-up").await });
    "Rotation bot is awake"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    rotation: Status,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rotation: state.scheduler.status(),
    })
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.signing_secret {
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = signing::verify(
            secret,
            header(&headers, TIMESTAMP_HEADER),
            header(&headers, SIGNATURE_HEADER),
            &body,
            now,
        ) {
            tracing::warn!(error = %e, "Rejected Slack request");
            return (StatusCode::UNAUTHORIZED, "Invalid Slack signature").into_response();
        }
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")).into_response(),
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        Envelope::EventCallback { event } => {
            dispatch(state.scheduler.clone(), event);
            StatusCode::OK.into_response()
        }
        Envelope::Unknown => StatusCode::OK.into_response(),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn dispatch(scheduler: Arc<Scheduler>, event: Event) {
    if event.is_command(LIST_COMMAND) {
        if let Event::Message { channel, .. } = event {
            tokio::spawn(async move {
                if let Err(e) = list_members(&scheduler, &channel).await {
                    tracing::warn!(channel = %channel, error = %e, "Failed to answer list command");
                }
            });
        }
        return;
    }
    if let Event::MemberJoinedChannel { channel, user } = event {
        tokio::spawn(async move {
            if let Err(e) = member_joined(&scheduler, &channel, &user).await {
                tracing::warn!(channel = %channel, error = %e, "Failed to refresh members after join");
            }
        });
    }
}

async fn list_members(scheduler: &Scheduler, channel: &str) -> anyhow::Result<()> {
    let roster = scheduler
        .membership()
        .refresh(channel)
        .await
        .context("refreshing channel roster")?;
    for group in [Group::A, Group::B] {
        let names = roster.display_names(group);
        scheduler
            .gateway()
            .post_message(channel, &announce::member_list(group, &names))
            .await
            .context("posting member list")?;
    }
    Ok(())
}

async fn member_joined(scheduler: &Scheduler, channel: &str, user: &UserId) -> anyhow::Result<()> {
    tracing::info!(channel, user = %user, "Member joined, refreshing roster");
    scheduler
        .membership()
        .refresh(channel)
        .await
        .context("refreshing channel roster")?;
    scheduler
        .gateway()
        .post_message(channel, announce::MEMBERS_UPDATED)
        .await
        .context("posting member update notice")?;
    Ok(())
}
