//! JSON webhook channel.
//!
//! `POST /webhook` accepts `{ "secret", "content", "user_id"?, "wait_for_response"? }`.
//! Without `wait_for_response` the request is only queued and the reply is
//! dropped; with it the response body carries the bot's answer.
//! `GET /health` reports liveness.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::channels::{Channel, IncomingMessage, MessageStream, Reply, ReplyRoute};
use crate::config::HttpConfig;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "http";

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CONTENT_BYTES: usize = 4 * 1024;
const MAX_USER_ID_BYTES: usize = 128;
/// Requests blocked on `wait_for_response` at the same time.
const MAX_WAITING: usize = 100;
const RATE_LIMIT: u32 = 120;
const RATE_WINDOW: Duration = Duration::from_secs(60);
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Status code and message returned to a rejected caller.
type Rejection = (StatusCode, &'static str);

/// HTTP webhook channel. Its routes are served by a
/// [`WebhookServer`](crate::channels::WebhookServer).
pub struct HttpChannel {
    shared: Arc<Shared>,
}

struct Shared {
    secret: Option<String>,
    default_user_id: String,
    /// Set while the channel is running.
    inbox: RwLock<Option<mpsc::Sender<IncomingMessage>>>,
    waiting: Mutex<HashMap<Uuid, oneshot::Sender<String>>>,
    limiter: Mutex<FixedWindow>,
}

/// At most [`RATE_LIMIT`] requests per [`RATE_WINDOW`], across all callers.
#[derive(Debug)]
struct FixedWindow {
    started: Instant,
    count: u32,
}

impl FixedWindow {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        if now.duration_since(self.started) >= RATE_WINDOW {
            *self = Self::new(now);
        }
        if self.count >= RATE_LIMIT {
            return false;
        }
        self.count += 1;
        true
    }
}

#[derive(Debug, Deserialize)]
struct WebhookRequest {
    content: String,
    secret: Option<String>,
    /// Seller id; each id has its own calculation.
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    wait_for_response: bool,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl WebhookResponse {
    fn queued(request_id: Uuid) -> Self {
        Self {
            status: "queued",
            request_id: Some(request_id),
            reply: None,
            error: None,
        }
    }

    fn replied(request_id: Uuid, reply: String) -> Self {
        Self {
            status: "ok",
            request_id: Some(request_id),
            reply: Some(reply),
            error: None,
        }
    }

    fn rejected(error: &'static str) -> Self {
        Self {
            status: "error",
            request_id: None,
            reply: None,
            error: Some(error),
        }
    }
}

impl HttpChannel {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                secret: config
                    .webhook_secret
                    .as_ref()
                    .map(|s| s.expose_secret().to_string()),
                default_user_id: config.user_id.clone(),
                inbox: RwLock::new(None),
                waiting: Mutex::new(HashMap::new()),
                limiter: Mutex::new(FixedWindow::new(Instant::now())),
            }),
        }
    }

    /// Routes with state applied. The webhook answers 503 until `start`.
    pub fn routes(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/webhook", post(webhook))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(Arc::clone(&self.shared))
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "channel": CHANNEL_NAME }))
}

async fn webhook(State(shared): State<Arc<Shared>>, Json(req): Json<WebhookRequest>) -> Response {
    match shared.accept(req).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err((status, error)) => {
            tracing::debug!(%status, error, "Webhook request rejected");
            (status, Json(WebhookResponse::rejected(error))).into_response()
        }
    }
}

impl Shared {
    async fn accept(&self, req: WebhookRequest) -> Result<WebhookResponse, Rejection> {
        if !self.limiter.lock().await.admit(Instant::now()) {
            return Err((StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded"));
        }
        self.authorize(req.secret.as_deref())?;
        if req.content.len() > MAX_CONTENT_BYTES {
            return Err((StatusCode::PAYLOAD_TOO_LARGE, "content too large"));
        }
        let user_id = self.resolve_user(req.user_id.as_deref())?;

        let request_id = Uuid::new_v4();
        let waiter = if req.wait_for_response {
            Some(self.wait_for(request_id).await?)
        } else {
            None
        };

        let msg = IncomingMessage::new(ReplyRoute::Http { request_id }, user_id, req.content);
        if let Err(rejection) = self.enqueue(msg).await {
            self.waiting.lock().await.remove(&request_id);
            return Err(rejection);
        }

        let Some(waiter) = waiter else {
            return Ok(WebhookResponse::queued(request_id));
        };
        let outcome = tokio::time::timeout(REPLY_TIMEOUT, waiter).await;
        self.waiting.lock().await.remove(&request_id);
        match outcome {
            Ok(Ok(reply)) => Ok(WebhookResponse::replied(request_id, reply)),
            Ok(Err(_)) => Err((StatusCode::INTERNAL_SERVER_ERROR, "reply dropped")),
            Err(_) => Err((StatusCode::GATEWAY_TIMEOUT, "no reply in time")),
        }
    }

    fn authorize(&self, provided: Option<&str>) -> Result<(), Rejection> {
        match (self.secret.as_deref(), provided) {
            (None, _) => Ok(()),
            (Some(expected), Some(given)) if given == expected => Ok(()),
            (Some(_), Some(_)) => Err((StatusCode::UNAUTHORIZED, "invalid webhook secret")),
            (Some(_), None) => Err((StatusCode::UNAUTHORIZED, "webhook secret required")),
        }
    }

    fn resolve_user(&self, requested: Option<&str>) -> Result<String, Rejection> {
        match requested.map(str::trim) {
            None => Ok(self.default_user_id.clone()),
            Some(id) if id.is_empty() || id.len() > MAX_USER_ID_BYTES => {
                Err((StatusCode::BAD_REQUEST, "invalid user_id"))
            }
            Some(id) => Ok(id.to_string()),
        }
    }

    async fn wait_for(&self, request_id: Uuid) -> Result<oneshot::Receiver<String>, Rejection> {
        let mut waiting = self.waiting.lock().await;
        if waiting.len() >= MAX_WAITING {
            return Err((StatusCode::TOO_MANY_REQUESTS, "too many pending requests"));
        }
        let (tx, rx) = oneshot::channel();
        waiting.insert(request_id, tx);
        Ok(rx)
    }

    async fn enqueue(&self, msg: IncomingMessage) -> Result<(), Rejection> {
        let inbox = self.inbox.read().await;
        let tx = inbox
            .as_ref()
            .ok_or((StatusCode::SERVICE_UNAVAILABLE, "channel not started"))?;
        tx.send(msg)
            .await
            .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "channel closed"))
    }
}

#[async_trait]
impl Channel for HttpChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        if self.shared.secret.is_none() {
            return Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "HTTP webhook secret is required (set HTTP_WEBHOOK_SECRET)".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(256);
        *self.shared.inbox.write().await = Some(tx);
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        let ReplyRoute::Http { request_id } = reply.route else {
            return Err(ChannelError::InvalidMessage {
                name: CHANNEL_NAME.to_string(),
                reason: format!("cannot deliver to {} route", reply.route.channel()),
            });
        };
        // Callers that did not wait, or gave up, get nothing.
        if let Some(tx) = self.shared.waiting.lock().await.remove(&request_id) {
            let _ = tx.send(reply.content);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        if self.shared.inbox.read().await.is_some() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: CHANNEL_NAME.to_string(),
            })
        }
    }

    async fn shutdown(&self) {
        *self.shared.inbox.write().await = None;
    }
}
