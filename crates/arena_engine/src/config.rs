//! Engine configuration.
//!
//! Every value has a documented default matching the event plugin this
//! engine grew out of. Configuration is read from a JSON file leniently: a
//! malformed value is replaced by its default (with a warning) and never
//! aborts startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// The environment variable used to locate the configuration file.
pub const CONFIG_PATH_ENV: &str = "ARENA_CONFIG";

/// Number of border phases.
pub const PHASE_COUNT: usize = 11;

/// Default target radius of each border phase, phase 1 first.
pub const DEFAULT_PHASE_RADII: [f64; PHASE_COUNT] =
    [150.0, 125.0, 100.0, 75.0, 60.0, 40.0, 20.0, 10.0, 7.0, 5.0, 3.0];

/// Default transition duration of each border phase.
pub const DEFAULT_PHASE_SECS: u64 = 60;

/// Session lifecycle settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Minimum connected players for a non-forced start. Default 2.
    pub min_players: usize,
    /// Grace period used when a start command does not give one. Default 0.
    pub grace_period_secs: u64,
    /// Delay between an elimination and win evaluation. Default 1000.
    pub win_check_delay_ms: u64,
    /// Delay between an alive player's disconnect and win evaluation.
    /// Default 250.
    pub quit_check_delay_ms: u64,
    /// Interval of the periodic win sweep; 0 disables it. Default 0.
    pub win_sweep_interval_secs: u64,
    /// Admit every joiner as a spectator, not only mid-session ones.
    /// Default false.
    pub join_as_spectator: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            grace_period_secs: 0,
            win_check_delay_ms: 1000,
            quit_check_delay_ms: 250,
            win_sweep_interval_secs: 0,
            join_as_spectator: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn win_check_delay(&self) -> Duration {
        Duration::from_millis(self.win_check_delay_ms)
    }

    #[must_use]
    pub fn quit_check_delay(&self) -> Duration {
        Duration::from_millis(self.quit_check_delay_ms)
    }
}

/// Combat tagging and PvP policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatConfig {
    /// Length of the combat tag window. Default 15.
    pub tag_duration_secs: u64,
    /// Flag disconnects of tagged players. Default true.
    pub prevent_logout: bool,
    /// Eliminate tagged players who disconnect. Default true.
    pub logout_kill: bool,
    /// Suppress player damage while no session is active. Default true.
    pub disable_pvp_outside_event: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tag_duration_secs: 15,
            prevent_logout: true,
            logout_kill: true,
            disable_pvp_outside_event: true,
        }
    }
}

impl CombatConfig {
    #[must_use]
    pub fn tag_duration(&self) -> Duration {
        Duration::from_secs(self.tag_duration_secs)
    }
}

/// Loadout catalog and cooldowns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KitConfig {
    /// Cooldown after an alive player takes a loadout. Default 45.
    pub cooldown_alive_secs: u64,
    /// Cooldown after a spectator takes a loadout. Default 0.
    pub cooldown_spectator_secs: u64,
    /// Reissue slot 1 every `auto_reissue_deaths` session deaths.
    /// Default false.
    pub auto_reissue_enabled: bool,
    /// Default 3.
    pub auto_reissue_deaths: u32,
    /// Delay between the qualifying death and the reissue. Default 500.
    pub reissue_delay_ms: u64,
    /// Known loadout names. Default empty.
    pub loadouts: Vec<String>,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            cooldown_alive_secs: 45,
            cooldown_spectator_secs: 0,
            auto_reissue_enabled: false,
            auto_reissue_deaths: 3,
            reissue_delay_ms: 500,
            loadouts: Vec::new(),
        }
    }
}

/// Party limits and policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyConfig {
    /// Default 4.
    pub max_size: usize,
    /// Allow party members to damage each other. Default false.
    pub friendly_fire: bool,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            friendly_fire: false,
        }
    }
}

/// One step of the border sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseConfig {
    /// Target radius once the transition completes.
    pub radius: f64,
    /// Transition length.
    pub duration_secs: u64,
}

/// Border sequence settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderConfig {
    /// Radius before any phase is applied. Default 150.
    pub initial_radius: f64,
    /// Arena center. Default origin.
    pub center: [f32; 2],
    /// Pause between a phase finishing and the next one starting. Default 2.
    pub buffer_secs: u64,
    /// Exactly [`PHASE_COUNT`] phases, monotonically shrinking.
    pub phases: Vec<PhaseConfig>,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            initial_radius: DEFAULT_PHASE_RADII[0],
            center: [0.0, 0.0],
            buffer_secs: 2,
            phases: DEFAULT_PHASE_RADII
                .iter()
                .map(|&radius| PhaseConfig {
                    radius,
                    duration_secs: DEFAULT_PHASE_SECS,
                })
                .collect(),
        }
    }
}

/// Surge pressure settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeConfig {
    /// Default true.
    pub enabled: bool,
    /// Pops needed to be safe from surge damage. Default 3.
    pub required_pops: u32,
    /// Damage per pulse. Default 1.0.
    pub damage: f64,
    /// Pulse interval. Default 3.
    pub interval_secs: u64,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            required_pops: 3,
            damage: 1.0,
            interval_secs: 3,
        }
    }
}

/// Killstreak announcements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillstreakConfig {
    /// Streak values that emit a milestone event. Default 5, 10, 15, 20.
    pub milestones: Vec<u32>,
    /// Default true.
    pub announce_first_blood: bool,
}

impl Default for KillstreakConfig {
    fn default() -> Self {
        Self {
            milestones: vec![5, 10, 15, 20],
            announce_first_blood: true,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub combat: CombatConfig,
    pub kits: KitConfig,
    pub party: PartyConfig,
    pub border: BorderConfig,
    pub surge: SurgeConfig,
    pub killstreak: KillstreakConfig,
}

impl EngineConfig {
    /// Override the loadout catalog.
    #[must_use]
    pub fn with_loadouts<I, S>(mut self, loadouts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kits.loadouts = loadouts.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the configuration path: the explicit path if given, else the
    /// `ARENA_CONFIG` environment variable.
    #[must_use]
    pub fn resolve_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
    }

    /// Load configuration from a JSON file.
    ///
    /// A missing path, unreadable file or invalid JSON yields the default
    /// configuration; individual malformed values fall back one by one.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no configuration file given, using defaults");
            return Self::default();
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), %e, "cannot read configuration, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                info!(path = %path.display(), "loaded configuration");
                Self::from_value(&value)
            }
            Err(e) => {
                warn!(path = %path.display(), %e, "invalid configuration JSON, using defaults");
                Self::default()
            }
        }
    }

    /// Build a configuration from a parsed JSON document, falling back to
    /// the default for every missing or malformed value.
    #[must_use]
    pub fn from_value(root: &Value) -> Self {
        let d = Self::default();

        let s = Section::new(root, "session");
        let session = SessionConfig {
            min_players: s.usize("min_players", d.session.min_players),
            grace_period_secs: s.u64("grace_period_secs", d.session.grace_period_secs),
            win_check_delay_ms: s.u64("win_check_delay_ms", d.session.win_check_delay_ms),
            quit_check_delay_ms: s.u64("quit_check_delay_ms", d.session.quit_check_delay_ms),
            win_sweep_interval_secs: s
                .u64("win_sweep_interval_secs", d.session.win_sweep_interval_secs),
            join_as_spectator: s.bool("join_as_spectator", d.session.join_as_spectator),
        };

        let s = Section::new(root, "combat");
        let combat = CombatConfig {
            tag_duration_secs: s.u64("tag_duration_secs", d.combat.tag_duration_secs),
            prevent_logout: s.bool("prevent_logout", d.combat.prevent_logout),
            logout_kill: s.bool("logout_kill", d.combat.logout_kill),
            disable_pvp_outside_event: s
                .bool("disable_pvp_outside_event", d.combat.disable_pvp_outside_event),
        };

        let s = Section::new(root, "kits");
        let kits = KitConfig {
            cooldown_alive_secs: s.u64("cooldown_alive_secs", d.kits.cooldown_alive_secs),
            cooldown_spectator_secs: s
                .u64("cooldown_spectator_secs", d.kits.cooldown_spectator_secs),
            auto_reissue_enabled: s.bool("auto_reissue_enabled", d.kits.auto_reissue_enabled),
            auto_reissue_deaths: s.positive_u32("auto_reissue_deaths", d.kits.auto_reissue_deaths),
            reissue_delay_ms: s.u64("reissue_delay_ms", d.kits.reissue_delay_ms),
            loadouts: s.strings("loadouts", &d.kits.loadouts),
        };

        let s = Section::new(root, "party");
        let party = PartyConfig {
            max_size: s.usize("max_size", d.party.max_size).max(1),
            friendly_fire: s.bool("friendly_fire", d.party.friendly_fire),
        };

        let s = Section::new(root, "border");
        let border = BorderConfig {
            initial_radius: s.f64("initial_radius", d.border.initial_radius),
            center: s.center("center", d.border.center),
            buffer_secs: s.u64("buffer_secs", d.border.buffer_secs),
            phases: s.phases("phases", &d.border.phases),
        };

        let s = Section::new(root, "surge");
        let surge = SurgeConfig {
            enabled: s.bool("enabled", d.surge.enabled),
            required_pops: s.u32("required_pops", d.surge.required_pops),
            damage: s.f64("damage", d.surge.damage),
            interval_secs: s.u64("interval_secs", d.surge.interval_secs).max(1),
        };

        let s = Section::new(root, "killstreak");
        let killstreak = KillstreakConfig {
            milestones: s.u32_list("milestones", &d.killstreak.milestones),
            announce_first_blood: s
                .bool("announce_first_blood", d.killstreak.announce_first_blood),
        };

        Self {
            session,
            combat,
            kits,
            party,
            border,
            surge,
            killstreak,
        }
    }
}

/// A named section of the configuration document with typed, lenient
/// accessors.
struct Section<'a> {
    name: &'static str,
    value: Option<&'a Value>,
}

impl<'a> Section<'a> {
    fn new(root: &'a Value, name: &'static str) -> Self {
        let value = root.get(name);
        if let Some(v) = value
            && !v.is_object()
        {
            warn!(section = name, "configuration section is not an object, using defaults");
            return Self { name, value: None };
        }
        Self { name, value }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.value.and_then(|v| v.get(key))
    }

    fn fallback<T: std::fmt::Debug>(&self, key: &str, default: T) -> T {
        warn!(
            section = self.name,
            key,
            default = ?default,
            "malformed configuration value, using default"
        );
        default
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            None => default,
            Some(v) => v.as_u64().unwrap_or_else(|| self.fallback(key, default)),
        }
    }

    fn u32(&self, key: &str, default: u32) -> u32 {
        match self.get(key) {
            None => default,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or_else(|| self.fallback(key, default)),
        }
    }

    fn positive_u32(&self, key: &str, default: u32) -> u32 {
        match self.u32(key, default) {
            0 => self.fallback(key, default),
            n => n,
        }
    }

    fn usize(&self, key: &str, default: usize) -> usize {
        match self.get(key) {
            None => default,
            Some(v) => v
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or_else(|| self.fallback(key, default)),
        }
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            None => default,
            Some(v) => match v.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => n,
                _ => self.fallback(key, default),
            },
        }
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(v) => v.as_bool().unwrap_or_else(|| self.fallback(key, default)),
        }
    }

    fn strings(&self, key: &str, default: &[String]) -> Vec<String> {
        let Some(v) = self.get(key) else {
            return default.to_vec();
        };
        let parsed: Option<Vec<String>> = v.as_array().map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_lowercase))
                .collect()
        });
        parsed.unwrap_or_else(|| self.fallback(key, default.to_vec()))
    }

    fn u32_list(&self, key: &str, default: &[u32]) -> Vec<u32> {
        let Some(v) = self.get(key) else {
            return default.to_vec();
        };
        let parsed: Option<Vec<u32>> = v.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_u64().and_then(|n| u32::try_from(n).ok()))
                .collect()
        });
        parsed.unwrap_or_else(|| self.fallback(key, default.to_vec()))
    }

    fn center(&self, key: &str, default: [f32; 2]) -> [f32; 2] {
        let Some(v) = self.get(key) else {
            return default;
        };
        let parsed = v.as_array().and_then(|items| match items.as_slice() {
            [x, z] => Some([x.as_f64()? as f32, z.as_f64()? as f32]),
            _ => None,
        });
        parsed.unwrap_or_else(|| self.fallback(key, default))
    }

    /// Phases must list exactly [`PHASE_COUNT`] entries with shrinking radii.
    /// A malformed entry falls back to that phase's default; a list of the
    /// wrong length or one that grows falls back entirely.
    fn phases(&self, key: &str, default: &[PhaseConfig]) -> Vec<PhaseConfig> {
        let Some(v) = self.get(key) else {
            return default.to_vec();
        };
        let Some(items) = v.as_array().filter(|items| items.len() == PHASE_COUNT) else {
            return self.fallback(key, default.to_vec());
        };

        let phases: Vec<PhaseConfig> = items
            .iter()
            .zip(default)
            .enumerate()
            .map(|(idx, (item, fallback))| {
                let radius = item.get("radius").and_then(Value::as_f64);
                let duration = item.get("duration_secs").and_then(Value::as_u64);
                match (radius, duration) {
                    (Some(radius), Some(duration_secs)) if radius.is_finite() && radius > 0.0 => {
                        PhaseConfig {
                            radius,
                            duration_secs,
                        }
                    }
                    _ => {
                        warn!(phase = idx + 1, "malformed border phase, using default");
                        *fallback
                    }
                }
            })
            .collect();

        if phases.windows(2).any(|pair| pair[1].radius > pair[0].radius) {
            return self.fallback(key, default.to_vec());
        }
        phases
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.session.min_players, 2);
        assert_eq!(config.combat.tag_duration_secs, 15);
        assert_eq!(config.kits.cooldown_alive_secs, 45);
        assert_eq!(config.kits.cooldown_spectator_secs, 0);
        assert_eq!(config.party.max_size, 4);
        assert_eq!(config.border.phases.len(), PHASE_COUNT);
        assert!((config.border.phases[10].radius - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.surge.required_pops, 3);
    }

    #[test]
    fn test_from_value_reads_overrides() {
        let value = json!({
            "session": { "min_players": 5, "join_as_spectator": true },
            "combat": { "friendly_fire": true, "tag_duration_secs": 20 },
            "party": { "max_size": 2, "friendly_fire": true },
            "kits": { "loadouts": ["Archer", "tank"] }
        });
        let config = EngineConfig::from_value(&value);
        assert_eq!(config.session.min_players, 5);
        assert!(config.session.join_as_spectator);
        assert_eq!(config.combat.tag_duration_secs, 20);
        assert_eq!(config.party.max_size, 2);
        assert!(config.party.friendly_fire);
        assert_eq!(config.kits.loadouts, vec!["archer", "tank"]);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let value = json!({
            "session": { "min_players": "lots", "win_check_delay_ms": -5 },
            "combat": "not a section",
            "surge": { "damage": "high", "required_pops": 7 },
            "kits": { "auto_reissue_deaths": 0 }
        });
        let config = EngineConfig::from_value(&value);
        let defaults = EngineConfig::default();
        assert_eq!(config.session.min_players, defaults.session.min_players);
        assert_eq!(
            config.session.win_check_delay_ms,
            defaults.session.win_check_delay_ms
        );
        assert_eq!(config.combat, defaults.combat);
        assert!((config.surge.damage - defaults.surge.damage).abs() < f64::EPSILON);
        assert_eq!(config.surge.required_pops, 7);
        assert_eq!(config.kits.auto_reissue_deaths, 3);
    }

    #[test]
    fn test_growing_phases_fall_back() {
        let mut phases: Vec<Value> = DEFAULT_PHASE_RADII
            .iter()
            .map(|r| json!({ "radius": r, "duration_secs": 30 }))
            .collect();
        phases[4] = json!({ "radius": 500.0, "duration_secs": 30 });
        let config = EngineConfig::from_value(&json!({ "border": { "phases": phases } }));
        assert_eq!(config.border.phases, BorderConfig::default().phases);
    }

    #[test]
    fn test_malformed_phase_entry_uses_that_default() {
        let mut phases: Vec<Value> = DEFAULT_PHASE_RADII
            .iter()
            .map(|r| json!({ "radius": r, "duration_secs": 30 }))
            .collect();
        phases[2] = json!({ "radius": "wide" });
        let config = EngineConfig::from_value(&json!({ "border": { "phases": phases } }));
        assert_eq!(config.border.phases[0].duration_secs, 30);
        assert_eq!(config.border.phases[2].duration_secs, DEFAULT_PHASE_SECS);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = EngineConfig::load(Some(Path::new("/nonexistent/arena.json")));
        assert_eq!(config, EngineConfig::default());
    }
}
