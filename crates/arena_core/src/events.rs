//! Stimuli consumed by the engine and events it emits.
//!
//! All types derive `Serialize` and `Deserialize` so they can travel over the
//! MessagePack transport in `arena_net`. [`Inbound`] values are delivered to
//! the engine's authority task; [`Outbound`] values are drained from it and
//! handed to presentation and telemetry collaborators.

use serde::{Deserialize, Serialize};

use crate::ids::{PartyId, PlayerId};
use crate::time::Timestamp;

// ── Shared vocabulary ───────────────────────────────────────────────────────

/// Win-condition strategy of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Last player standing wins.
    #[default]
    Individual,
    /// Last party standing wins. Unpartied players count as parties of one.
    Group,
}

impl MatchMode {
    /// Parse a mode tag as typed by operators (`"FFA"`, `"party"`, ...).
    ///
    /// Unknown tags fall back to [`MatchMode::Individual`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "PARTY" | "GROUP" | "TEAM" => Self::Group,
            _ => Self::Individual,
        }
    }

    /// Returns the canonical tag for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "FFA",
            Self::Group => "PARTY",
        }
    }
}

/// What caused a damage stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageCause {
    /// Melee hit from another entity.
    Attack,
    /// Projectile; the source is the shooter.
    Projectile,
    /// Falling.
    Fall,
    /// Falling out of the world. Never suppressed by the grace period.
    Void,
    /// Anything else the host reports (fire, drowning, ...).
    Environment,
}

/// The winner of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// A single player won.
    Player(PlayerId),
    /// A party won; every member is credited.
    Party {
        /// The winning party.
        party: PartyId,
        /// The nominal leader, announced by presentation layers.
        leader: PlayerId,
        /// Every member credited with the win.
        members: Vec<PlayerId>,
    },
}

// ── Inbound ─────────────────────────────────────────────────────────────────

/// Administrative overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdminCommand {
    /// Start a session. `grace_secs` falls back to the configured default.
    Start {
        force: bool,
        mode: MatchMode,
        grace_secs: Option<u64>,
    },
    Stop,
    Pause,
    Resume,
    /// Jump the border to `phase` (1..=11). `seconds` falls back to the
    /// phase's configured duration.
    SetPhase { phase: u8, seconds: Option<u64> },
    /// Start the automatic border chain from phase 1.
    StartBorder,
    /// Cancel the border chain and restore the initial radius.
    ResetBorder,
    SetSurgeThreshold(u32),
    ToggleSurge,
    Freeze(PlayerId, bool),
    Vanish(PlayerId, bool),
    Ban(PlayerId, bool),
    SetWhitelist(bool),
    Whitelist(PlayerId, bool),
    ResetCooldown(PlayerId),
    /// Move a spectator back onto the alive roster.
    Revive(PlayerId),
    /// Add a loadout to the catalog.
    AddLoadout(String),
    DisbandAllParties,
    /// Set or clear the title shown next to a player's name.
    SetTitle(PlayerId, Option<String>),
}

/// Party management requests. `actor` is the player issuing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    Create { actor: PlayerId },
    Invite { actor: PlayerId, target: PlayerId },
    Accept { actor: PlayerId, party: PartyId },
    Kick { actor: PlayerId, target: PlayerId },
    Leave { actor: PlayerId },
    Disband { actor: PlayerId },
}

/// A stimulus delivered to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inbound {
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    PlayerEliminated {
        victim: PlayerId,
        killer: Option<PlayerId>,
        assist: Option<PlayerId>,
    },
    PlayerDamaged {
        target: PlayerId,
        source: Option<PlayerId>,
        cause: DamageCause,
    },
    /// The player consumed a surge resource (totem pop, golden apple, ...).
    SurgePopped(PlayerId),
    LoadoutSelected {
        player: PlayerId,
        slot: usize,
        loadout: String,
    },
    LoadoutRequested {
        player: PlayerId,
        loadout: String,
    },
    Admin(AdminCommand),
    Party(PartyCommand),
}

impl Inbound {
    /// Short name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft(_) => "player_left",
            Self::PlayerEliminated { .. } => "player_eliminated",
            Self::PlayerDamaged { .. } => "player_damaged",
            Self::SurgePopped(_) => "surge_popped",
            Self::LoadoutSelected { .. } => "loadout_selected",
            Self::LoadoutRequested { .. } => "loadout_requested",
            Self::Admin(_) => "admin",
            Self::Party(_) => "party",
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// An event emitted by the engine for presentation and telemetry layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outbound {
    SessionStarted {
        mode: MatchMode,
        players: usize,
    },
    SessionStopped,
    SessionPaused,
    SessionResumed,
    WinnerDeclared(Winner),
    MatchEndedWithoutWinner,
    EliminationRecorded {
        victim: PlayerId,
        killer: Option<PlayerId>,
        assist: Option<PlayerId>,
        points_transferred: u32,
    },
    KillstreakMilestoneReached {
        player: PlayerId,
        streak: u32,
    },
    FirstBlood {
        player: PlayerId,
    },
    BorderPhaseChanged {
        phase: u8,
        radius: f64,
        duration_secs: u64,
    },
    GracePeriodEnded,
    PlayerEnteredSpectator {
        player: PlayerId,
    },
    CombatTagApplied {
        player: PlayerId,
        expires_at: Timestamp,
    },
    /// A player disconnected while combat-tagged.
    CombatLogout {
        player: PlayerId,
        eliminated: bool,
    },
    JoinDenied {
        player: PlayerId,
    },
    LoadoutGranted {
        player: PlayerId,
        loadout: String,
        forced: bool,
    },
    SurgeDamage {
        player: PlayerId,
        damage: f64,
        missing: u32,
    },
}

impl Outbound {
    /// Stable snake-case name, used as the last segment of the publish
    /// subject.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SessionStopped => "session_stopped",
            Self::SessionPaused => "session_paused",
            Self::SessionResumed => "session_resumed",
            Self::WinnerDeclared(_) => "winner_declared",
            Self::MatchEndedWithoutWinner => "match_ended_without_winner",
            Self::EliminationRecorded { .. } => "elimination_recorded",
            Self::KillstreakMilestoneReached { .. } => "killstreak_milestone",
            Self::FirstBlood { .. } => "first_blood",
            Self::BorderPhaseChanged { .. } => "border_phase_changed",
            Self::GracePeriodEnded => "grace_period_ended",
            Self::PlayerEnteredSpectator { .. } => "player_entered_spectator",
            Self::CombatTagApplied { .. } => "combat_tag_applied",
            Self::CombatLogout { .. } => "combat_logout",
            Self::JoinDenied { .. } => "join_denied",
            Self::LoadoutGranted { .. } => "loadout_granted",
            Self::SurgeDamage { .. } => "surge_damage",
        }
    }
}
