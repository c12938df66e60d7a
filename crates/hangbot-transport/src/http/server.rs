use std::net::SocketAddr;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::config::{WebhookListenerConfig, listener_configs};
use super::payload::deliver;
use crate::error::{WebhookError, WebhookResult};
use hangbot_framework::Bot;

/// Handle to a running listener. Dropping it stops the server.
#[derive(Debug)]
pub struct ListenerHandle {
    /// Listener label.
    pub id: String,
    /// The address actually bound.
    pub local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ListenerHandle {
    fn new(id: impl Into<String>, local_addr: SocketAddr, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self {
            id: id.into(),
            local_addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Stops the listener.
    pub fn stop(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

/// The webhook routes, without a listener.
///
/// Request bodies are unbounded: base64 images routinely exceed axum's
/// default limit.
pub fn webhook_router(bot: Bot) -> Router {
    Router::new()
        .route("/{conversation_id}", post(receive))
        .route("/{conversation_id}/", post(receive))
        .layer(DefaultBodyLimit::disable())
        .with_state(bot)
}

/// Binds and starts one listener.
pub async fn start_webhook(
    bot: Bot,
    spec: &WebhookListenerConfig,
) -> WebhookResult<ListenerHandle> {
    let addr = spec.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| WebhookError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| WebhookError::Bind { addr, source })?;

    let label = spec.label();
    info!(listener = %label, addr = %local_addr, "Webhook listening");

    let router = webhook_router(bot);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task_label = label.clone();

    tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        match server.await {
            Ok(()) => info!(listener = %task_label, "Webhook listener stopped"),
            Err(e) => error!(listener = %task_label, error = %e, "Webhook server error"),
        }
    });

    Ok(ListenerHandle::new(label, local_addr, shutdown_tx))
}

/// Starts every listener in `specs`; failures are logged and skipped.
pub async fn start_webhooks(bot: &Bot, specs: &[WebhookListenerConfig]) -> Vec<ListenerHandle> {
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        match start_webhook(bot.clone(), spec).await {
            Ok(handle) => handles.push(handle),
            Err(e) => warn!(listener = %spec.label(), error = %e, "Webhook listener not started"),
        }
    }
    handles
}

/// Starts the listeners listed under `webhooks` in the config document.
pub async fn start_configured(bot: &Bot) -> Vec<ListenerHandle> {
    let specs = listener_configs(bot);
    if specs.is_empty() {
        debug!("No webhook listeners configured");
        return Vec::new();
    }
    start_webhooks(bot, &specs).await
}

async fn receive(
    State(bot): State<Bot>,
    Path(conversation_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    debug!(conversation = %conversation_id, len = body.len(), "Webhook request");

    tokio::spawn(async move {
        match deliver(&bot, &conversation_id, &body).await {
            Ok(outcome) => debug!(conversation = %conversation_id, ?outcome, "Webhook delivered"),
            Err(e) => warn!(conversation = %conversation_id, error = %e, "Webhook delivery failed"),
        }
    });

    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::test_bot;

    async fn post_to(router: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..400 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_always_answers_ok() {
        let (bot, client) = test_bot();

        let (status, body) = post_to(webhook_router(bot.clone()), "/c1", "garbage").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");

        let (status, _) =
            post_to(webhook_router(bot), "/c2/", r#"{"message": "hi"}"#).await;
        assert_eq!(status, StatusCode::OK);

        wait_for(|| !client.sent().is_empty()).await;
        assert_eq!(client.sent(), vec![("c2".to_string(), "hi".to_string())]);
    }

    #[tokio::test]
    async fn test_large_image_is_accepted() {
        let (bot, client) = test_bot();
        // 3 MiB of base64 zeros, past axum's 2 MB default.
        let body = format!(r#"{{"image": "{}"}}"#, "A".repeat(3 * 1024 * 1024));

        let (status, text) = post_to(webhook_router(bot), "/c1", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "OK");

        wait_for(|| !client.images().is_empty()).await;
        let images = client.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].0, "c1");
        assert_eq!(images[0].1.len(), 3 * 1024 * 1024 / 4 * 3);
    }

    #[tokio::test]
    async fn test_only_post_is_routed() {
        let (bot, _) = test_bot();
        let response = webhook_router(bot)
            .oneshot(Request::get("/c1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_start_and_stop_listener() {
        let (bot, _) = test_bot();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let specs = vec![
            WebhookListenerConfig::new("local", "127.0.0.1", 0),
            WebhookListenerConfig::new("broken", "127.0.0.1", taken_port),
        ];

        let handles = start_webhooks(&bot, &specs).await;
        assert!(matches!(
            start_webhook(bot.clone(), &specs[1]).await,
            Err(WebhookError::Bind { .. })
        ));
        drop(taken);

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].id, "local");
        assert_ne!(handles[0].local_addr.port(), 0);
        for handle in handles {
            handle.stop();
        }
    }
}
