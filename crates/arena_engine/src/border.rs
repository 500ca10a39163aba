//! Border phase sequencer.
//!
//! The arena is a circle that shrinks through [`PHASE_COUNT`] phases. In
//! automatic mode each applied phase schedules the next one after its
//! transition plus a short buffer, forming a chain of one-shot timers. The
//! sequencer keeps the token of the single pending link so pause, jump and
//! reset can cancel exactly that link.

use std::time::Duration;

use arena_core::{Outbound, Timestamp};
use glam::Vec2;
use tracing::{debug, info, warn};

use crate::config::{BorderConfig, PHASE_COUNT};
use crate::error::EngineError;
use crate::scheduler::{Scheduler, TimerId};
use crate::task::TimerTask;

/// A radius change in progress (or finished).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    from: f64,
    to: f64,
    start: Timestamp,
    end: Timestamp,
}

impl Transition {
    fn fixed(radius: f64) -> Self {
        Self {
            from: radius,
            to: radius,
            start: Timestamp::ZERO,
            end: Timestamp::ZERO,
        }
    }

    fn radius_at(&self, now: Timestamp) -> f64 {
        if now >= self.end {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let total = self.end.since(self.start).as_secs_f64();
        let elapsed = now.since(self.start).as_secs_f64();
        self.from + (self.to - self.from) * (elapsed / total)
    }
}

/// Chained border shrink state.
#[derive(Debug)]
pub struct BorderSequencer {
    config: BorderConfig,
    center: Vec2,
    current_phase: u8,
    automatic: bool,
    paused: bool,
    pending: Option<TimerId>,
    transition: Transition,
}

impl BorderSequencer {
    /// A phase list of the wrong length is replaced by the default phases.
    #[must_use]
    pub fn new(mut config: BorderConfig) -> Self {
        if config.phases.len() != PHASE_COUNT {
            warn!(
                phases = config.phases.len(),
                expected = PHASE_COUNT,
                "wrong number of border phases, using defaults"
            );
            config.phases = BorderConfig::default().phases;
        }
        let center = Vec2::from_array(config.center);
        let transition = Transition::fixed(config.initial_radius);
        Self {
            config,
            center,
            current_phase: 0,
            automatic: false,
            paused: false,
            pending: None,
            transition,
        }
    }

    /// Last applied phase, 0 before any.
    #[must_use]
    pub fn current_phase(&self) -> u8 {
        self.current_phase
    }

    /// Whether the automatic chain is running (possibly paused).
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Token of the pending continuation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    /// Radius at `now`, interpolated linearly during a transition.
    #[must_use]
    pub fn radius_at(&self, now: Timestamp) -> f64 {
        self.transition.radius_at(now)
    }

    /// Whether `point` lies inside the border at `now`.
    #[must_use]
    pub fn contains(&self, point: Vec2, now: Timestamp) -> bool {
        f64::from(point.distance(self.center)) <= self.radius_at(now)
    }

    fn apply(&mut self, phase: u8, duration: Duration, now: Timestamp) -> Outbound {
        let idx = usize::from(phase - 1);
        let radius = self.config.phases[idx].radius;
        self.transition = Transition {
            from: self.radius_at(now),
            to: radius,
            start: now,
            end: now.after(duration),
        };
        self.current_phase = phase;
        info!(phase, radius, duration_secs = duration.as_secs(), "border phase applied");
        Outbound::BorderPhaseChanged {
            phase,
            radius,
            duration_secs: duration.as_secs(),
        }
    }

    fn phase_duration(&self, phase: u8) -> Duration {
        Duration::from_secs(self.config.phases[usize::from(phase - 1)].duration_secs)
    }

    fn arm(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp, after: Duration) {
        if let Some(old) = self.pending.take() {
            scheduler.cancel(old);
        }
        let delay = after + Duration::from_secs(self.config.buffer_secs);
        self.pending = Some(scheduler.schedule_after(now, delay, TimerTask::BorderAdvance));
    }

    fn step(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp) -> Option<Outbound> {
        let next = self.current_phase + 1;
        if usize::from(next) > PHASE_COUNT {
            self.automatic = false;
            debug!("border chain complete");
            return None;
        }
        let duration = self.phase_duration(next);
        let event = self.apply(next, duration, now);
        if usize::from(next) < PHASE_COUNT {
            self.arm(scheduler, now, duration);
        } else {
            self.automatic = false;
        }
        Some(event)
    }

    /// Start the automatic chain from phase 1.
    pub fn start(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp) -> Option<Outbound> {
        self.cancel_pending(scheduler);
        self.current_phase = 0;
        self.automatic = true;
        self.paused = false;
        self.step(scheduler, now)
    }

    /// Handle a due continuation link.
    pub fn advance(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp) -> Option<Outbound> {
        self.pending = None;
        if !self.automatic || self.paused {
            return None;
        }
        self.step(scheduler, now)
    }

    /// Apply `phase` now, optionally with a custom duration. A running chain
    /// continues from the phase after it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingResource`] for a phase outside 1..=11.
    pub fn jump(
        &mut self,
        scheduler: &mut Scheduler<TimerTask>,
        phase: u8,
        seconds: Option<u64>,
        now: Timestamp,
    ) -> Result<Outbound, EngineError> {
        if phase == 0 || usize::from(phase) > PHASE_COUNT {
            return Err(EngineError::MissingResource(format!("border phase {phase}")));
        }
        let duration = seconds.map_or_else(|| self.phase_duration(phase), Duration::from_secs);
        let event = self.apply(phase, duration, now);
        if self.automatic && !self.paused {
            if usize::from(phase) < PHASE_COUNT {
                self.arm(scheduler, now, duration);
            } else {
                self.cancel_pending(scheduler);
                self.automatic = false;
            }
        }
        Ok(event)
    }

    /// Suspend the chain. Only the pending link is cancelled.
    pub fn pause(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        self.paused = true;
        self.cancel_pending(scheduler);
    }

    /// Resume a paused chain, applying the next phase immediately.
    pub fn resume(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp) -> Option<Outbound> {
        if !self.paused {
            return None;
        }
        self.paused = false;
        if !self.automatic {
            return None;
        }
        self.step(scheduler, now)
    }

    /// Stop the chain, leaving the radius where it is.
    pub fn halt(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        self.cancel_pending(scheduler);
        self.automatic = false;
        self.paused = false;
    }

    /// Stop the chain and restore the initial radius.
    pub fn reset(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        self.halt(scheduler);
        self.current_phase = 0;
        self.transition = Transition::fixed(self.config.initial_radius);
        info!(radius = self.config.initial_radius, "border reset");
    }

    fn cancel_pending(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (BorderSequencer, Scheduler<TimerTask>) {
        (BorderSequencer::new(BorderConfig::default()), Scheduler::new())
    }

    /// Fire every due border link up to `now`, collecting applied phases.
    fn run_until(
        border: &mut BorderSequencer,
        scheduler: &mut Scheduler<TimerTask>,
        now: Timestamp,
    ) -> Vec<u8> {
        let mut phases = Vec::new();
        while let Some((_, task)) = scheduler.pop_due(now) {
            assert_eq!(task, TimerTask::BorderAdvance);
            if let Some(Outbound::BorderPhaseChanged { phase, .. }) = border.advance(scheduler, now) {
                phases.push(phase);
            }
        }
        phases
    }

    #[test]
    fn test_start_applies_phase_one_and_arms_next() {
        let (mut border, mut scheduler) = setup();
        let event = border.start(&mut scheduler, Timestamp::ZERO);
        assert_eq!(
            event,
            Some(Outbound::BorderPhaseChanged {
                phase: 1,
                radius: 150.0,
                duration_secs: 60
            })
        );
        let pending = border.pending().unwrap();
        assert_eq!(scheduler.due_at(pending), Some(Timestamp::from_secs(62)));
    }

    #[test]
    fn test_next_phase_not_before_duration() {
        let (mut border, mut scheduler) = setup();
        border.start(&mut scheduler, Timestamp::ZERO);
        assert!(run_until(&mut border, &mut scheduler, Timestamp::from_secs(61)).is_empty());
        assert_eq!(
            run_until(&mut border, &mut scheduler, Timestamp::from_secs(62)),
            vec![2]
        );
        assert_eq!(border.current_phase(), 2);
    }

    #[test]
    fn test_pause_blocks_chain_until_resume() {
        let (mut border, mut scheduler) = setup();
        border.start(&mut scheduler, Timestamp::ZERO);
        border.pause(&mut scheduler);
        assert!(border.pending().is_none());
        assert!(scheduler.is_empty());
        assert!(run_until(&mut border, &mut scheduler, Timestamp::from_secs(600)).is_empty());
        assert_eq!(border.current_phase(), 1);

        let resumed = border.resume(&mut scheduler, Timestamp::from_secs(600));
        assert!(matches!(
            resumed,
            Some(Outbound::BorderPhaseChanged { phase: 2, .. })
        ));
        assert!(border.pending().is_some());
    }

    #[test]
    fn test_chain_halts_after_last_phase() {
        let (mut border, mut scheduler) = setup();
        border.start(&mut scheduler, Timestamp::ZERO);
        let mut all = Vec::new();
        for secs in 0..=1_000 {
            all.extend(run_until(&mut border, &mut scheduler, Timestamp::from_secs(secs)));
        }
        assert_eq!(all, (2..=11).collect::<Vec<u8>>());
        assert_eq!(border.current_phase(), 11);
        assert!(!border.is_automatic());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_jump_reanchors_running_chain() {
        let (mut border, mut scheduler) = setup();
        border.start(&mut scheduler, Timestamp::ZERO);
        let first = border.pending().unwrap();

        border
            .jump(&mut scheduler, 5, Some(10), Timestamp::from_secs(5))
            .unwrap();
        assert!(!scheduler.is_pending(first));
        let next = border.pending().unwrap();
        assert_eq!(scheduler.due_at(next), Some(Timestamp::from_secs(17)));

        assert_eq!(
            run_until(&mut border, &mut scheduler, Timestamp::from_secs(17)),
            vec![6]
        );
    }

    #[test]
    fn test_jump_without_chain_schedules_nothing() {
        let (mut border, mut scheduler) = setup();
        border.jump(&mut scheduler, 3, None, Timestamp::ZERO).unwrap();
        assert_eq!(border.current_phase(), 3);
        assert!(scheduler.is_empty());
        assert!(border.jump(&mut scheduler, 12, None, Timestamp::ZERO).is_err());
        assert!(border.jump(&mut scheduler, 0, None, Timestamp::ZERO).is_err());
    }

    #[test]
    fn test_radius_interpolates_and_contains() {
        let (mut border, mut scheduler) = setup();
        border.jump(&mut scheduler, 2, Some(10), Timestamp::ZERO).unwrap();
        assert!((border.radius_at(Timestamp::ZERO) - 150.0).abs() < 1e-9);
        assert!((border.radius_at(Timestamp::from_secs(5)) - 137.5).abs() < 1e-9);
        assert!((border.radius_at(Timestamp::from_secs(10)) - 125.0).abs() < 1e-9);

        let now = Timestamp::from_secs(10);
        assert!(border.contains(Vec2::new(100.0, 0.0), now));
        assert!(!border.contains(Vec2::new(100.0, 100.0), now));
    }

    #[test]
    fn test_short_phase_list_replaced() {
        let config = BorderConfig {
            phases: BorderConfig::default().phases[..3].to_vec(),
            ..BorderConfig::default()
        };
        let mut border = BorderSequencer::new(config);
        let mut scheduler = Scheduler::new();
        let event = border
            .jump(&mut scheduler, 11, None, Timestamp::ZERO)
            .unwrap();
        assert!(matches!(
            event,
            Outbound::BorderPhaseChanged { phase: 11, radius, .. } if (radius - 3.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_reset_restores_initial_radius() {
        let (mut border, mut scheduler) = setup();
        border.start(&mut scheduler, Timestamp::ZERO);
        border
            .jump(&mut scheduler, 11, Some(0), Timestamp::from_secs(1))
            .unwrap();
        border.reset(&mut scheduler);
        assert_eq!(border.current_phase(), 0);
        assert!(scheduler.is_empty());
        assert!((border.radius_at(Timestamp::from_secs(2)) - 150.0).abs() < 1e-9);
    }
}
