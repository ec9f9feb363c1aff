use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::Response,
};

use crate::{models::auth::StreamHello, services::auth_guard::AuthContext, state::AppState};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// WebSocket endpoint; authenticated by the query-token guard before the upgrade.
pub async fn stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Response {
    ws.on_upgrade(move |socket| run_stream(socket, state, context))
}

async fn run_stream(mut socket: WebSocket, state: AppState, context: AuthContext) {
    let Ok(opened) = state.sessions.get(usize::from(context.slot_id)) else {
        return;
    };
    let hello = StreamHello::new(context.username.clone(), context.slot_id, opened.expires_at);
    let Ok(payload) = serde_json::to_string(&hello) else {
        return;
    };
    if socket.send(Message::Text(payload.into())).await.is_err() {
        return;
    }
    tracing::debug!(slot_id = context.slot_id, "stream opened");

    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !session_alive(&state, &context, opened.created_at) {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(slot_id = context.slot_id, "stream closed");
}

/// The stream lives only as long as the slot that opened it; a later login
/// landing in the same slot carries a different `created_at`.
fn session_alive(state: &AppState, context: &AuthContext, created_at: u32) -> bool {
    state
        .sessions
        .get(usize::from(context.slot_id))
        .map(|session| {
            session.active
                && session.subject == context.username
                && session.created_at == created_at
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Arc};

    use crate::{
        config::Config,
        models::session::SessionGrant,
        services::{
            credentials::MockCredentialVerifier, session_pool::SessionPool,
            session_store::SessionStore,
        },
        utils::{jwt::Claims, time::ManualClock},
    };

    const T0: u32 = 1_700_000_000;

    fn state() -> (AppState, Arc<ManualClock>) {
        let vars = HashMap::from([
            ("JWT_SECRET", "stream-test-secret-0123456789".to_string()),
            ("ADMIN_PASSWORD", "unused-password".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        let pool = SessionPool::new(1, clock.clone()).unwrap();
        let state = AppState::new(
            Arc::new(pool),
            SessionStore::new("unused.bin"),
            Arc::new(MockCredentialVerifier::new()),
            config,
        );
        (state, clock)
    }

    fn claim(state: &AppState) -> AuthContext {
        let slot_id = state
            .sessions
            .allocate(SessionGrant {
                client_fingerprint: 1,
                user_agent: "ws/1.0".into(),
                subject: "alice".into(),
                expires_at: T0 + 3600,
            })
            .unwrap();
        AuthContext {
            username: "alice".into(),
            slot_id,
            claims: Claims::new(slot_id, "alice".into(), T0, Duration::from_secs(60)),
        }
    }

    #[test]
    fn stream_ends_when_its_slot_is_reused_by_the_same_subject() {
        let (state, clock) = state();
        let context = claim(&state);
        let opened = state.sessions.get(0).unwrap().created_at;
        assert!(session_alive(&state, &context, opened));

        state.sessions.disable(0).unwrap();
        assert!(!session_alive(&state, &context, opened));

        clock.advance(5);
        claim(&state);
        assert!(state.sessions.get(0).unwrap().active);
        assert!(!session_alive(&state, &context, opened));
    }
}
