//! Authority tick loop.
//!
//! Each tick:
//!
//! 1. Drain queued stimuli into the engine, in arrival order.
//! 2. Run every timer due at the current engine time.
//! 3. Republish the stats snapshot.
//! 4. Forward emitted events to the publisher.
//!
//! The loop owns the [`Engine`] by value. Producers reach it only through
//! the inbound channel; when the loop ends it hands the engine back so the
//! caller can flush it.

use std::time::{Duration, Instant};

use arena_core::{Inbound, Outbound, Timestamp};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Length of one tick. Rates that are not positive, or so small that
    /// the tick length overflows, fall back to the default.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        let fallback = Duration::from_secs_f64(1.0 / Self::default().tick_rate);
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return fallback;
        }
        Duration::try_from_secs_f64(1.0 / self.tick_rate).unwrap_or(fallback)
    }
}

/// Drives an [`Engine`] on a fixed timestep.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    engine: Engine,
    epoch: Instant,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, engine: Engine) -> Self {
        Self {
            tick_id: 0,
            config,
            engine,
            epoch: Instant::now(),
        }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Engine time: milliseconds since the loop was created.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        let ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis(ms)
    }

    /// Run one tick at `now` with the given stimuli. Returns the events
    /// emitted during the tick.
    pub fn step(&mut self, now: Timestamp, inbound: impl IntoIterator<Item = Inbound>) -> Vec<Outbound> {
        self.tick_id += 1;
        for stimulus in inbound {
            let kind = stimulus.kind();
            if let Err(e) = self.engine.handle(now, stimulus) {
                warn!(tick_id = self.tick_id, kind, %e, "stimulus rejected");
            }
        }
        self.engine.tick(now);
        let events = self.engine.drain_outbound();
        if !events.is_empty() {
            debug!(tick_id = self.tick_id, events = events.len(), "tick emitted events");
        }
        events
    }

    /// Run until `shutdown` flips to `true`, the configured tick count is
    /// reached, or the shutdown sender is dropped. Returns the engine.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        outbound: mpsc::Sender<Outbound>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Engine {
        let tick_duration = self.config.tick_duration();
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut publishing = true;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(ticks = self.tick_id, "tick loop shutting down");
                        break;
                    }
                    continue;
                }
            }

            let start = Instant::now();
            let mut batch = Vec::new();
            while let Ok(stimulus) = inbound.try_recv() {
                batch.push(stimulus);
            }
            let now = self.now();
            let events = self.step(now, batch);

            if publishing {
                for event in events {
                    if outbound.send(event).await.is_err() {
                        warn!("event publisher gone, dropping further events");
                        publishing = false;
                        break;
                    }
                }
            }

            if self.config.max_ticks > 0 && self.tick_id >= self.config.max_ticks {
                info!(ticks = self.tick_id, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > tick_duration {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        self.engine
    }
}

#[cfg(test)]
mod tests {
    use arena_core::{AdminCommand, MatchMode, PlayerId};

    use super::*;
    use crate::config::EngineConfig;
    use crate::store::MemoryStore;

    fn tick_loop(config: TickConfig) -> TickLoop {
        let mut engine_config = EngineConfig::default();
        engine_config.surge.enabled = false;
        TickLoop::new(config, Engine::new(engine_config, Box::new(MemoryStore::new())))
    }

    fn start_stimuli() -> Vec<Inbound> {
        vec![
            Inbound::PlayerJoined(PlayerId::from_u128(1)),
            Inbound::PlayerJoined(PlayerId::from_u128(2)),
            Inbound::Admin(AdminCommand::Start {
                force: false,
                mode: MatchMode::Individual,
                grace_secs: None,
            }),
        ]
    }

    #[test]
    fn test_step_advances_counter() {
        let mut tick_loop = tick_loop(TickConfig::default());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.step(Timestamp::ZERO, Vec::new());
        tick_loop.step(Timestamp::from_millis(50), Vec::new());
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_step_applies_stimuli_in_order() {
        let mut tick_loop = tick_loop(TickConfig::default());
        let events = tick_loop.step(Timestamp::ZERO, start_stimuli());
        assert_eq!(
            events,
            vec![Outbound::SessionStarted {
                mode: MatchMode::Individual,
                players: 2
            }]
        );
        assert!(tick_loop.engine().session().is_active());
    }

    #[test]
    fn test_rejected_stimulus_does_not_stop_tick() {
        let mut tick_loop = tick_loop(TickConfig::default());
        let mut stimuli = vec![Inbound::Admin(AdminCommand::Resume)];
        stimuli.extend(start_stimuli());
        let events = tick_loop.step(Timestamp::ZERO, stimuli);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_bad_tick_rate_falls_back() {
        let config = TickConfig {
            tick_rate: 0.0,
            max_ticks: 0,
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_tiny_tick_rate_falls_back() {
        let config = TickConfig {
            tick_rate: 1e-300,
            max_ticks: 0,
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_run_limited_ticks() {
        let tick_loop = tick_loop(TickConfig {
            tick_rate: 1000.0,
            max_ticks: 5,
        });
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        for stimulus in start_stimuli() {
            in_tx.send(stimulus).await.unwrap();
        }

        let engine = tick_loop.run(in_rx, out_tx, shutdown_rx).await;
        assert!(engine.session().is_active());
        assert_eq!(
            out_rx.recv().await,
            Some(Outbound::SessionStarted {
                mode: MatchMode::Individual,
                players: 2
            })
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let tick_loop = tick_loop(TickConfig::default());
        let (_in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, _out_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(tick_loop.run(in_rx, out_tx, shutdown_rx));
        shutdown_tx.send(true).unwrap();
        let engine = handle.await.unwrap();
        assert!(!engine.session().is_running());
    }
}
