//! Background HTTP listener for the webhook routes.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::ChannelError;

/// A running axum server. Dropping it without [`shutdown`](Self::shutdown)
/// leaves the task serving until the runtime stops.
pub struct WebhookServer {
    local_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WebhookServer {
    /// Bind `host:port` and serve `routes` with request tracing.
    pub async fn bind(host: &str, port: u16, routes: Router) -> Result<Self, ChannelError> {
        let startup_error = |reason: String| ChannelError::StartupFailed {
            name: "webhook_server".to_string(),
            reason,
        };

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| startup_error(format!("cannot bind {}:{}: {}", host, port, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| startup_error(e.to_string()))?;

        let app = routes.layer(TraceLayer::new_for_http());
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = stopped.await;
            });
            if let Err(e) = serve.await {
                tracing::error!("Webhook server failed: {}", e);
            }
        });

        tracing::info!(%local_addr, "Webhook server listening");
        Ok(Self {
            local_addr,
            stop,
            task,
        })
    }

    /// Address actually bound; differs from the requested one for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
        tracing::info!("Webhook server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::HttpChannel;
    use crate::config::HttpConfig;

    #[tokio::test]
    async fn test_serves_channel_routes() {
        let channel = HttpChannel::new(&HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            webhook_secret: None,
            user_id: "http".to_string(),
        });

        let server = WebhookServer::bind("127.0.0.1", 0, channel.routes())
            .await
            .unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);

        let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["channel"], "http");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_startup_error() {
        let first = WebhookServer::bind("127.0.0.1", 0, Router::new())
            .await
            .unwrap();
        let taken = first.local_addr().port();

        let second = WebhookServer::bind("127.0.0.1", taken, Router::new()).await;
        assert!(matches!(second, Err(ChannelError::StartupFailed { .. })));

        first.shutdown().await;
    }
}
