//! NATS connection management.
//!
//! [`NatsConnection`] is a cheap-to-clone handle over an `async-nats`
//! client. Besides raw publish/subscribe it knows the arena subject layout,
//! so callers publish an [`Outbound`] or subscribe to stimuli without
//! building subjects by hand.

use arena_core::Outbound;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::encode;
use crate::error::NetError;
use crate::subjects;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Pick the server URL: an explicit one wins, then `NATS_URL`, then
/// [`DEFAULT_NATS_URL`].
#[must_use]
pub fn resolve_url(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(NATS_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_NATS_URL.to_string())
}

#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to the server chosen by [`resolve_url`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect(url: Option<&str>) -> Result<Self, NetError> {
        let url = resolve_url(url);
        info!(url = %url, "connecting to NATS");
        let client = async_nats::connect(url.as_str()).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    #[must_use]
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Publish a MessagePack-encoded message to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish<T: Serialize>(&self, subject: &str, message: &T) -> Result<(), NetError> {
        let payload = encode(message)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await?;
        Ok(())
    }

    /// Publish an engine event on `arena.event.<kind>`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish_event(&self, event: &Outbound) -> Result<(), NetError> {
        let subject = subjects::event(event.kind());
        debug!(subject = %subject, "publishing event");
        self.publish(&subject, event).await
    }

    /// Answer a request message on its reply subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::MissingReply`] if the request carries no reply
    /// subject, or [`NetError`] if encoding or publishing fails.
    pub async fn reply<T: Serialize>(
        &self,
        request: &async_nats::Message,
        message: &T,
    ) -> Result<(), NetError> {
        let Some(reply) = request.reply.clone() else {
            return Err(NetError::MissingReply(request.subject.to_string()));
        };
        let payload = encode(message)?;
        debug!(subject = %reply, bytes = payload.len(), "sending reply");
        self.client.publish(reply, payload.into()).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, NetError> {
        let sub = self.client.subscribe(subject.to_string()).await?;
        info!(subject, "subscribed");
        Ok(sub)
    }

    /// Subscribe to engine stimuli.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe_stimuli(&self) -> Result<async_nats::Subscriber, NetError> {
        self.subscribe(subjects::STIMULUS).await
    }

    /// Subscribe to stats requests.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe_stats_queries(&self) -> Result<async_nats::Subscriber, NetError> {
        self.subscribe(subjects::QUERY_STATS).await
    }

    /// Wait until everything published so far has reached the server.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Flush`] if the client cannot flush.
    pub async fn flush(&self) -> Result<(), NetError> {
        self.client.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_url_wins() {
        assert_eq!(resolve_url(Some("nats://arena:4222")), "nats://arena:4222");
    }
}
