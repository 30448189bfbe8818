//! HTTP endpoint for slash command interactions.
//!
//! `POST /interactions` receives signed interaction payloads. Short commands
//! are answered inline; `purge` and `purger run` are acknowledged with a
//! deferred reply and finished in a tracked background task that edits the
//! original response. `GET /health` reports the scheduler state.

mod models;
mod verify;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
pub use models::*;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
pub use verify::{SIGNATURE_HEADER, SignatureError, SignatureVerifier, TIMESTAMP_HEADER};

use crate::{
    commands::CommandSurface,
    platform::discord::DiscordClient,
    scheduler::SchedulerPhase,
};

/// Shared state of the interactions router.
#[derive(Clone)]
pub struct InteractionState {
    pub verifier: Arc<SignatureVerifier>,
    pub surface: Arc<CommandSurface>,
    /// Used to complete deferred replies.
    pub client: DiscordClient,
    /// Deferred command tasks; drained on shutdown.
    pub tracker: TaskTracker,
}

pub fn router(state: InteractionState, body_limit: usize) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tracing::instrument(name = "interactions.handle", skip_all)]
async fn handle_interaction(
    State(state): State<InteractionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verifier.verify(
        header(&headers, SIGNATURE_HEADER),
        header(&headers, TIMESTAMP_HEADER),
        &body,
    ) {
        tracing::debug!(error = %e, "Rejected interaction");
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed interaction payload");
            return (StatusCode::BAD_REQUEST, "malformed interaction").into_response();
        }
    };

    match interaction.kind {
        INTERACTION_PING => Json(InteractionResponse::pong()).into_response(),
        INTERACTION_APPLICATION_COMMAND => handle_command(state, interaction).await,
        other => {
            tracing::debug!(kind = other, "Ignoring unsupported interaction type");
            (StatusCode::BAD_REQUEST, "unsupported interaction type").into_response()
        }
    }
}

async fn handle_command(state: InteractionState, interaction: Interaction) -> Response {
    let Some(invocation) = interaction.invocation() else {
        return Json(InteractionResponse::ephemeral("Unknown command.")).into_response();
    };

    tracing::info!(
        command = ?invocation.command,
        guild_id = ?invocation.guild_id,
        channel_id = ?invocation.channel_id,
        user = %invocation.user_name,
        "Command received"
    );

    if !invocation.command.is_long_running() {
        let reply = state.surface.respond(&invocation).await;
        return Json(InteractionResponse::ephemeral(reply)).into_response();
    }

    let surface = Arc::clone(&state.surface);
    let client = state.client.clone();
    let application = interaction.application_id;
    let token = interaction.token;
    state.tracker.spawn(async move {
        let reply = surface.respond(&invocation).await;
        if let Err(e) = client
            .edit_original_response(application, &token, &reply)
            .await
        {
            tracing::warn!(error = %e, "Failed to deliver deferred reply");
        }
    });

    Json(InteractionResponse::deferred_ephemeral()).into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub scheduler: SchedulerStatus,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    pub cycles: u64,
}

async fn health(State(state): State<InteractionState>) -> Json<HealthStatus> {
    let scheduler = state.surface.scheduler();
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scheduler: SchedulerStatus {
            phase: scheduler.phase(),
            next_run: scheduler.next_run(),
            cycles: scheduler.cycles(),
        },
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    use super::{verify::test_keys, *};
    use crate::{
        config::{CommandsConfig, DiscordConfig, PurgeConfig, ScheduleConfig},
        platform::{
            ApplicationId, BotIdentity, ChannelId, GuildId, Permissions, Platform, UserId,
            testing::{FakeChannel, FakePlatform},
        },
        purge::PurgeExecutor,
        scheduler::{Schedule, Scheduler},
        store::ConfigStore,
    };

    struct Harness {
        app: Router,
        tracker: TaskTracker,
        store: Arc<ConfigStore>,
        server: MockServer,
        _dir: TempDir,
    }

    async fn harness(platform: FakePlatform) -> Harness {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::load(dir.path().join("store.json")));
        let platform: Arc<dyn Platform> = Arc::new(platform);
        let executor = PurgeExecutor::new(PurgeConfig::default(), UserId(7));
        let scheduler = Arc::new(Scheduler::new(
            platform.clone(),
            store.clone(),
            executor.clone(),
            Schedule::from_config(&ScheduleConfig::default()).unwrap(),
        ));
        let surface = Arc::new(CommandSurface::new(
            platform,
            store.clone(),
            executor,
            scheduler,
            BotIdentity {
                user_id: UserId(7),
                application_id: ApplicationId(42),
                username: "purger".into(),
            },
            Permissions::from_bits(74752),
            CommandsConfig::default(),
        ));

        let mut config = DiscordConfig::with_token("t");
        config.api_base_url = server.uri();
        let tracker = TaskTracker::new();
        let state = InteractionState {
            verifier: Arc::new(
                SignatureVerifier::from_hex(&test_keys::public_key_hex()).unwrap(),
            ),
            surface,
            client: DiscordClient::new(&config).unwrap(),
            tracker: tracker.clone(),
        };

        Harness {
            app: router(state, 64 * 1024),
            tracker,
            store,
            server,
            _dir: dir,
        }
    }

    fn signed(body: &Value) -> Request<Body> {
        let raw = serde_json::to_vec(body).unwrap();
        let timestamp = "1700000000";
        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, test_keys::sign(timestamp, &raw))
            .header(TIMESTAMP_HEADER, timestamp)
            .body(Body::from(raw))
            .unwrap()
    }

    fn command(data: Value, permissions: Permissions) -> Value {
        json!({
            "type": 2,
            "application_id": "42",
            "token": "interaction-token",
            "guild_id": "1",
            "channel_id": "10",
            "member": {
                "user": {"id": "99", "username": "alice"},
                "roles": [],
                "permissions": permissions.bits().to_string(),
            },
            "data": data,
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_unsigned_request_is_rejected() {
        let h = harness(FakePlatform::new()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();
        let (status, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut tampered = signed(&json!({"type": 1, "application_id": "42"}));
        *tampered.body_mut() = Body::from(r#"{"type":1,"application_id":"43"}"#);
        let (status, _) = send(&h.app, tampered).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let h = harness(FakePlatform::new()).await;
        let ping = signed(&json!({"type": 1, "application_id": "42"}));
        let (status, body) = send(&h.app, ping).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_short_command_answers_inline() {
        let h = harness(FakePlatform::new()).await;
        h.store.add_channels(GuildId(1), [ChannelId(10)]).unwrap();

        let (status, body) = send(
            &h.app,
            signed(&command(
                json!({"name": "purger", "options": [{"type": 1, "name": "clear"}]}),
                Permissions::MANAGE_GUILD,
            )),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"type": 4, "data": {"content": "Removed. Affected channels: 1.", "flags": 64}})
        );
    }

    #[tokio::test]
    async fn test_long_command_is_deferred_and_completed() {
        let platform = FakePlatform::new()
            .with_guild(1)
            .with_channel(Arc::new(FakeChannel::text(1, 10).with_bulk(2, false)));
        let h = harness(platform).await;
        h.store.add_channels(GuildId(1), [ChannelId(10)]).unwrap();

        Mock::given(method("PATCH"))
            .and(path("/webhooks/42/interaction-token/messages/@original"))
            .and(body_json(json!({
                "content": "Purge complete. Total: 2 messages deleted.\n<#10> 2 deleted"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&h.server)
            .await;

        let (status, body) = send(
            &h.app,
            signed(&command(
                json!({"name": "purger", "options": [{"type": 1, "name": "run"}]}),
                Permissions::MANAGE_GUILD,
            )),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": 5, "data": {"flags": 64}}));

        h.tracker.close();
        h.tracker.wait().await;
        h.server.verify().await;
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let h = harness(FakePlatform::new()).await;
        let (_, body) = send(
            &h.app,
            signed(&command(json!({"name": "nope"}), Permissions::empty())),
        )
        .await;
        assert_eq!(body["data"]["content"], "Unknown command.");
    }

    #[tokio::test]
    async fn test_health_reports_scheduler() {
        let h = harness(FakePlatform::new()).await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["scheduler"]["phase"], "waiting_for_ready");
        assert_eq!(body["scheduler"]["cycles"], 0);
    }
}
