//! Pluggable alert delivery sinks.
//!
//! Dispatch is independent per channel: one failing sink is caught and
//! logged, siblings still deliver.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::events::EventChannel;
use crate::transport::{Method, Transport, TransportRequest};

use super::alerts::Alert;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A sink failed to deliver an alert.
#[derive(Debug, Error)]
#[error("sink delivery failed: {0}")]
pub struct SinkError(pub String);

/// Delivery channel for raised alerts.
pub trait AlertSink: Send + Sync {
    /// Sink name, referenced by rule actions.
    fn name(&self) -> &str;

    /// Deliver one alert.
    fn deliver(&self, alert: &Alert) -> BoxFuture<'_, Result<(), SinkError>>;
}

/// Structured-log sink.
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, alert: &Alert) -> BoxFuture<'_, Result<(), SinkError>> {
        info!(
            alert_id = %alert.id,
            rule = %alert.rule_id,
            severity = %alert.severity,
            message = %alert.message,
            "Alert raised"
        );
        Box::pin(async { Ok(()) })
    }
}

/// In-app event sink publishing alerts on a typed channel.
pub struct ChannelSink {
    channel: EventChannel<Alert>,
}

impl ChannelSink {
    /// Create a sink with its own channel.
    pub fn new() -> Self {
        Self {
            channel: EventChannel::new(),
        }
    }

    /// The channel consumers subscribe to.
    pub fn channel(&self) -> &EventChannel<Alert> {
        &self.channel
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for ChannelSink {
    fn name(&self) -> &str {
        "in-app"
    }

    fn deliver(&self, alert: &Alert) -> BoxFuture<'_, Result<(), SinkError>> {
        self.channel.publish(alert.clone());
        Box::pin(async { Ok(()) })
    }
}

/// Webhook sink POSTing the alert as JSON through the transport port.
pub struct WebhookSink {
    transport: Arc<dyn Transport>,
    url: String,
}

impl WebhookSink {
    /// Create a sink posting to `url`.
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    fn deliver(&self, alert: &Alert) -> BoxFuture<'_, Result<(), SinkError>> {
        let body = match serde_json::to_vec(alert) {
            Ok(body) => body,
            Err(e) => return Box::pin(async move { Err(SinkError(e.to_string())) }),
        };
        let request = TransportRequest::new(Method::Post, self.url.clone())
            .with_header("content-type", "application/json")
            .with_body(body.into());

        Box::pin(async move {
            let response = self
                .transport
                .execute(request)
                .await
                .map_err(|e| SinkError(e.to_string()))?;
            if response.is_success() {
                Ok(())
            } else {
                Err(SinkError(format!("webhook status {}", response.status)))
            }
        })
    }
}

/// Dispatch one alert through the selected sinks.
///
/// `actions` filters sinks by name; an empty list means every sink. Each
/// channel runs independently — a failure is logged per channel and never
/// blocks siblings.
pub async fn dispatch_all(sinks: &[Arc<dyn AlertSink>], actions: &[String], alert: &Alert) {
    for sink in sinks {
        if !actions.is_empty() && !actions.iter().any(|a| a == sink.name()) {
            continue;
        }
        if let Err(e) = sink.deliver(alert).await {
            warn!(channel = sink.name(), error = %e, "Alert delivery failed");
        }
    }
}
