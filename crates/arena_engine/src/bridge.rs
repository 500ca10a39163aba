//! NATS bridge.
//!
//! Three independent tasks connect the authority loop to the outside:
//!
//! - `arena.stimulus` → decoded [`Inbound`] → tick loop channel.
//! - tick loop channel → [`Outbound`] → `arena.event.<kind>`.
//! - `arena.query.stats` request → [`StatsSnapshot`] → reply.
//!
//! None of them touch the engine. Undecodable messages are logged and
//! skipped.

use arena_core::{Inbound, Outbound};
use arena_net::{NatsConnection, NetError, decode, decode_stimulus};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::snapshot::{StatsQuery, StatsSnapshot};

/// Decode a stats request body. An empty body asks for every player.
///
/// # Errors
///
/// Returns [`NetError::Decode`] for a non-empty body that is not a query.
pub fn decode_query(payload: &[u8]) -> Result<StatsQuery, NetError> {
    if payload.is_empty() {
        return Ok(StatsQuery::default());
    }
    decode(payload)
}

/// Forward stimuli from NATS into the tick loop until the subscription ends
/// or the loop stops listening.
///
/// # Errors
///
/// Returns [`NetError::Subscribe`] if the subscription cannot be created.
pub async fn forward_stimuli(
    conn: NatsConnection,
    tx: mpsc::Sender<Inbound>,
) -> Result<(), NetError> {
    let mut sub = conn.subscribe_stimuli().await?;

    while let Some(msg) = sub.next().await {
        let stimulus = match decode_stimulus(&msg.payload) {
            Ok(stimulus) => stimulus,
            Err(e) => {
                warn!(%e, bytes = msg.payload.len(), "dropping undecodable stimulus");
                continue;
            }
        };
        debug!(kind = stimulus.kind(), "stimulus received");
        if tx.send(stimulus).await.is_err() {
            info!("tick loop closed, stimulus forwarding stopped");
            break;
        }
    }
    Ok(())
}

/// Publish engine events until the tick loop drops its sender.
pub async fn publish_events(conn: NatsConnection, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = conn.publish_event(&event).await {
            error!(%e, kind = event.kind(), "failed to publish event");
        }
    }
    info!("event publishing stopped");
}

/// Answer stats requests from the snapshot.
///
/// # Errors
///
/// Returns [`NetError::Subscribe`] if the subscription cannot be created.
pub async fn serve_stats(conn: NatsConnection, snapshot: StatsSnapshot) -> Result<(), NetError> {
    let mut sub = conn.subscribe_stats_queries().await?;

    while let Some(msg) = sub.next().await {
        let query = match decode_query(&msg.payload) {
            Ok(query) => query,
            Err(e) => {
                warn!(%e, "malformed stats query");
                continue;
            }
        };
        let report = snapshot.query(&query);
        debug!(players = report.players.len(), "answering stats query");
        if let Err(e) = conn.reply(&msg, &report).await {
            error!(%e, "failed to answer stats query");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use arena_core::PlayerId;
    use arena_net::encode;

    use super::*;

    #[test]
    fn test_empty_query_means_everyone() {
        assert_eq!(decode_query(&[]).unwrap(), StatsQuery::default());
    }

    #[test]
    fn test_query_for_one_player() {
        let query = StatsQuery {
            player: Some(PlayerId::from_u128(4)),
        };
        let bytes = encode(&query).unwrap();
        assert_eq!(decode_query(&bytes).unwrap(), query);
    }

    #[test]
    fn test_garbage_query_rejected() {
        assert!(matches!(decode_query(&[0xC1]), Err(NetError::Decode(_))));
    }
}
