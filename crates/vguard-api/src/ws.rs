//! Progress subscriptions over WebSocket.
//!
//! One socket may follow many jobs. Each subscription gets a forwarder task
//! that relays the job's topic into the socket's bounded send queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use vguard_models::{ClientMessage, JobId, OrgId, ProgressEvent, ServerMessage, Topic};

use crate::auth::OrgContext;
use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Send a server message, waiting for room when the queue is full.
async fn send_server_message(tx: &mpsc::Sender<Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(_) => return false,
    };
    metrics::record_ws_message_sent(message_type(msg));

    match tx.try_send(Message::Text(json)) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(message).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn message_type(msg: &ServerMessage) -> &'static str {
    match msg {
        ServerMessage::Subscribed { .. } => "subscribed",
        ServerMessage::Unsubscribed { .. } => "unsubscribed",
        ServerMessage::Progress { .. } => "progress",
        ServerMessage::Error { .. } => "error",
    }
}

/// WebSocket progress endpoint.
pub async fn ws_progress(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    OrgContext(org_id): OrgContext,
) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    ws.on_upgrade(move |socket| async move {
        handle_progress_socket(socket, state, org_id).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

async fn handle_progress_socket(socket: WebSocket, state: AppState, org_id: OrgId) {
    let (ws_sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    info!(org_id = %org_id, "Progress socket opened");

    let mut forwarders: HashMap<JobId, JoinHandle<()>> = HashMap::new();
    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_ws_message_received();
                        handle_client_message(&state, &org_id, &text, &tx, &mut forwarders).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(org_id = %org_id, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(org_id = %org_id, "WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    warn!("Heartbeat failed, client disconnected");
                    break;
                }
            }
        }

        forwarders.retain(|_, task| !task.is_finished());
    }

    for (_, task) in forwarders.drain() {
        task.abort();
    }
    drop(tx);
    let _ = send_task.await;
    info!(org_id = %org_id, "Progress socket closed");
}

async fn handle_client_message(
    state: &AppState,
    org_id: &OrgId,
    text: &str,
    tx: &mpsc::Sender<Message>,
    forwarders: &mut HashMap<JobId, JoinHandle<()>>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send_server_message(tx, &ServerMessage::error(format!("Invalid message: {}", e), None)).await;
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { job_id } => subscribe(state, org_id, job_id, tx, forwarders).await,
        ClientMessage::Unsubscribe { job_id } => {
            if let Some(task) = forwarders.remove(&job_id) {
                task.abort();
            }
            send_server_message(tx, &ServerMessage::Unsubscribed { job_id }).await;
        }
    }
}

async fn subscribe(
    state: &AppState,
    org_id: &OrgId,
    job_id: JobId,
    tx: &mpsc::Sender<Message>,
    forwarders: &mut HashMap<JobId, JoinHandle<()>>,
) {
    let job = match state.store.get(&job_id).await {
        Ok(job) => job,
        Err(e) => {
            warn!(job_id = %job_id, "Subscription lookup failed: {}", e);
            let msg = ServerMessage::error("Job status unavailable, retry later", Some(job_id));
            send_server_message(tx, &msg).await;
            return;
        }
    };

    let job = match job {
        Some(job) if state.authorizer.can_access(org_id, &job).await => job,
        _ => {
            metrics::record_subscription_rejected();
            send_server_message(tx, &ServerMessage::error("Job not found", Some(job_id))).await;
            return;
        }
    };

    // Nothing will be published for a finished job; answer from the record
    if job.is_terminal() {
        send_server_message(tx, &ServerMessage::Subscribed { job_id: job_id.clone() }).await;
        let status = job.sensitivity_verdict.as_ref().map(|v| v.status);
        let event = ProgressEvent::terminal(job_id, job.stage, status);
        send_server_message(tx, &ServerMessage::Progress { event }).await;
        return;
    }

    // Repeat subscriptions are acknowledged without a second forwarder
    if forwarders.get(&job_id).is_some_and(|task| !task.is_finished()) {
        send_server_message(tx, &ServerMessage::Subscribed { job_id }).await;
        return;
    }

    let topic = Topic::new(org_id.clone(), job_id.clone());
    let mut stream = match state.broadcaster.subscribe(&topic).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(job_id = %job_id, "Failed to subscribe to progress: {}", e);
            let msg = ServerMessage::error("Progress channel unavailable", Some(job_id));
            send_server_message(tx, &msg).await;
            return;
        }
    };

    send_server_message(tx, &ServerMessage::Subscribed { job_id: job_id.clone() }).await;

    let forward_tx = tx.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let terminal = event.is_terminal();
            if !send_server_message(&forward_tx, &ServerMessage::Progress { event }).await || terminal {
                break;
            }
        }
    });
    forwarders.insert(job_id, task);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use vguard_events::ProgressBroadcaster;
    use vguard_models::{SensitivityStatus, Stage};

    type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    async fn serve(app: &TestApp) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app.router();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("ws://{}/ws/progress", addr)
    }

    async fn connect(base: &str, org: &str) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(format!("{}?orgId={}", base, org))
            .await
            .unwrap();
        client
    }

    async fn send(client: &mut Client, msg: &ClientMessage) {
        let text = serde_json::to_string(msg).unwrap();
        client.send(WsMessage::Text(text)).await.unwrap();
    }

    async fn recv(client: &mut Client) -> ServerMessage {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for server message")
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_forwards_events() {
        let app = TestApp::new();
        let job_id = app.pending_job("acme").await;
        let base = serve(&app).await;
        let mut client = connect(&base, "acme").await;

        let subscribe = ClientMessage::Subscribe { job_id: job_id.clone() };
        send(&mut client, &subscribe).await;
        assert_eq!(recv(&mut client).await, ServerMessage::Subscribed { job_id: job_id.clone() });
        send(&mut client, &subscribe).await;
        assert_eq!(recv(&mut client).await, ServerMessage::Subscribed { job_id: job_id.clone() });

        let topic = Topic::new(OrgId::from_string("acme"), job_id.clone());
        assert_eq!(app.hub.subscriber_count(&topic).await, 1);

        let progress = ProgressEvent::stage(job_id.clone(), Stage::Compressing, 60);
        app.hub.publish(&topic, &progress).await.unwrap();
        let terminal = ProgressEvent::terminal(job_id.clone(), Stage::Completed, Some(SensitivityStatus::Safe));
        app.hub.publish(&topic, &terminal).await.unwrap();

        match recv(&mut client).await {
            ServerMessage::Progress { event } => assert_eq!(event.fraction_complete, 60),
            other => panic!("unexpected {:?}", other),
        }
        match recv(&mut client).await {
            ServerMessage::Progress { event } => assert!(event.is_terminal()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finished_job_answers_from_record() {
        let app = TestApp::new();
        let job_id = app.finished_job("acme").await;
        let base = serve(&app).await;
        let mut client = connect(&base, "acme").await;

        send(&mut client, &ClientMessage::Subscribe { job_id: job_id.clone() }).await;
        assert_eq!(recv(&mut client).await, ServerMessage::Subscribed { job_id: job_id.clone() });
        match recv(&mut client).await {
            ServerMessage::Progress { event } => {
                assert!(event.is_terminal());
                assert_eq!(event.stage, Stage::Flagged);
                assert_eq!(event.sensitivity_status, Some(SensitivityStatus::Flagged));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(app.hub.topic_count().await, 0);

        // Subscribing again still answers without leaving a channel behind
        send(&mut client, &ClientMessage::Subscribe { job_id: job_id.clone() }).await;
        assert_eq!(recv(&mut client).await, ServerMessage::Subscribed { job_id });
        assert!(matches!(recv(&mut client).await, ServerMessage::Progress { .. }));
        assert_eq!(app.hub.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_foreign_and_unknown_jobs_are_rejected() {
        let app = TestApp::new();
        let job_id = app.finished_job("acme").await;
        let base = serve(&app).await;
        let mut client = connect(&base, "intruder").await;

        send(&mut client, &ClientMessage::Subscribe { job_id: job_id.clone() }).await;
        match recv(&mut client).await {
            ServerMessage::Error { job_id: Some(id), .. } => assert_eq!(id, job_id),
            other => panic!("unexpected {:?}", other),
        }

        let unknown = JobId::from_string("nope");
        send(&mut client, &ClientMessage::Subscribe { job_id: unknown.clone() }).await;
        assert!(matches!(recv(&mut client).await, ServerMessage::Error { .. }));

        let topic = Topic::new(OrgId::from_string("intruder"), job_id);
        assert_eq!(app.hub.subscriber_count(&topic).await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_bad_messages() {
        let app = TestApp::new();
        let job_id = app.pending_job("acme").await;
        let base = serve(&app).await;
        let mut client = connect(&base, "acme").await;

        client.send(WsMessage::Text("not json".to_string())).await.unwrap();
        assert!(matches!(recv(&mut client).await, ServerMessage::Error { job_id: None, .. }));

        send(&mut client, &ClientMessage::Subscribe { job_id: job_id.clone() }).await;
        recv(&mut client).await;
        send(&mut client, &ClientMessage::Unsubscribe { job_id: job_id.clone() }).await;
        assert_eq!(recv(&mut client).await, ServerMessage::Unsubscribed { job_id });
    }
}
