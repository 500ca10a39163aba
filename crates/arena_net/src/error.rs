//! Transport errors.

/// Everything that can go wrong between the engine and NATS.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("could not encode arena message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("could not decode arena message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("could not reach NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("subscription failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("flush failed: {0}")]
    Flush(#[from] async_nats::client::FlushError),

    /// A request arrived without a reply subject; carries the request
    /// subject.
    #[error("request on {0} has no reply subject")]
    MissingReply(String),
}
