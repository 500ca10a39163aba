//! # arena_net
//!
//! NATS transport layer for the match orchestration engine.
//!
//! This crate provides:
//!
//! - [`subjects`]: the `arena.*` subject layout.
//! - [`codec`]: named-field MessagePack encoding.
//! - [`connection`]: connection handle with arena-aware publish/subscribe.
//! - [`error`]: transport errors.

pub mod codec;
pub mod connection;
pub mod error;
pub mod subjects;

pub use codec::{decode, decode_stimulus, encode};
pub use connection::NatsConnection;
pub use error::NetError;
