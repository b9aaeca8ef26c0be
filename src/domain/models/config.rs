//! Configuration tree for the harrow agent.
//!
//! Loaded by the figment-based loader in `infrastructure::config` with
//! hierarchical merging; every field has a serde default so partial files
//! and env overrides compose cleanly.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Game bridge endpoint settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Vision-language model settings
    #[serde(default)]
    pub vlm: VlmConfig,

    /// Agent loop tuning
    #[serde(default)]
    pub agent: AgentConfig,

    /// State directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Game bridge endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Base URL of the in-process bridge's HTTP side-channel
    #[serde(default = "default_bridge_url")]
    pub base_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_bridge_timeout")]
    pub request_timeout_secs: u64,

    /// The bridge's state-cache refresh interval; verification snapshots
    /// wait at least this long after a mutation
    #[serde(default = "default_cache_refresh_ms")]
    pub cache_refresh_ms: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8790".to_string()
}

const fn default_bridge_timeout() -> u64 {
    5
}

const fn default_cache_refresh_ms() -> u64 {
    250
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            request_timeout_secs: default_bridge_timeout(),
            cache_refresh_ms: default_cache_refresh_ms(),
        }
    }
}

/// Vision-language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VlmConfig {
    /// Chat-completions style endpoint URL
    #[serde(default = "default_vlm_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request
    #[serde(default = "default_vlm_model")]
    pub model: String,

    /// API key; usually supplied via HARROW_VLM__API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_vlm_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum tokens to generate
    #[serde(default = "default_vlm_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_vlm_temperature")]
    pub temperature: f32,
}

fn default_vlm_endpoint() -> String {
    "http://127.0.0.1:11434/v1/chat/completions".to_string()
}

fn default_vlm_model() -> String {
    "qwen2.5-vl".to_string()
}

const fn default_vlm_timeout() -> u64 {
    30
}

const fn default_vlm_max_tokens() -> u32 {
    1024
}

const fn default_vlm_temperature() -> f32 {
    0.4
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vlm_endpoint(),
            model: default_vlm_model(),
            api_key: None,
            request_timeout_secs: default_vlm_timeout(),
            max_tokens: default_vlm_max_tokens(),
            temperature: default_vlm_temperature(),
        }
    }
}

/// Agent loop tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Milliseconds between ticks
    #[serde(default = "default_think_interval_ms")]
    pub think_interval_ms: u64,

    /// Consecutive ticks without position change before a target is skipped
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,

    /// Per-target failures before the target goes to the skip-set
    #[serde(default = "default_target_failure_threshold")]
    pub target_failure_threshold: u32,

    /// Consecutive phantom failures before a skill hard-fails
    #[serde(default = "default_phantom_threshold")]
    pub phantom_threshold: u32,

    /// Consult the VLM for narration every Nth executor tick
    #[serde(default = "default_commentary_cadence")]
    pub commentary_cadence: u32,

    /// Game clock at which the bed override takes over
    #[serde(default = "default_late_night_time")]
    pub late_night_time: u32,

    /// Energy floor that forces bed
    #[serde(default = "default_critical_energy")]
    pub critical_energy: f32,

    /// Energy floor at which batch skills yield
    #[serde(default = "default_low_energy")]
    pub low_energy: f32,

    /// Re-plan cadence in game hours
    #[serde(default = "default_replan_interval_hours")]
    pub replan_interval_hours: u32,

    /// Consecutive VLM parse failures before falling back to overrides only
    #[serde(default = "default_parse_failure_fallback")]
    pub parse_failure_fallback: u32,

    /// Continuous bridge unreachability that counts as fatal, in seconds
    #[serde(default = "default_bridge_loss_fatal_secs")]
    pub bridge_loss_fatal_secs: u64,

    /// Shipping-bin proximity for the priority-ship override, in tiles
    #[serde(default = "default_ship_radius")]
    pub ship_radius: u32,

    /// Seed species the planner buys when stock runs out
    #[serde(default = "default_seed_species")]
    pub default_seed_species: String,

    /// Price assumed for the cheapest seed, for the buy gate
    #[serde(default = "default_seed_price")]
    pub cheapest_seed_price: u32,
}

const fn default_think_interval_ms() -> u64 {
    1500
}

const fn default_stuck_threshold() -> u32 {
    10
}

const fn default_target_failure_threshold() -> u32 {
    3
}

const fn default_phantom_threshold() -> u32 {
    2
}

const fn default_commentary_cadence() -> u32 {
    5
}

const fn default_late_night_time() -> u32 {
    2200
}

const fn default_critical_energy() -> f32 {
    15.0
}

const fn default_low_energy() -> f32 {
    30.0
}

const fn default_replan_interval_hours() -> u32 {
    2
}

const fn default_parse_failure_fallback() -> u32 {
    3
}

const fn default_bridge_loss_fatal_secs() -> u64 {
    60
}

const fn default_ship_radius() -> u32 {
    5
}

fn default_seed_species() -> String {
    "Parsnip".to_string()
}

const fn default_seed_price() -> u32 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            think_interval_ms: default_think_interval_ms(),
            stuck_threshold: default_stuck_threshold(),
            target_failure_threshold: default_target_failure_threshold(),
            phantom_threshold: default_phantom_threshold(),
            commentary_cadence: default_commentary_cadence(),
            late_night_time: default_late_night_time(),
            critical_energy: default_critical_energy(),
            low_energy: default_low_energy(),
            replan_interval_hours: default_replan_interval_hours(),
            parse_failure_fallback: default_parse_failure_fallback(),
            bridge_loss_fatal_secs: default_bridge_loss_fatal_secs(),
            ship_radius: default_ship_radius(),
            default_seed_species: default_seed_species(),
            cheapest_seed_price: default_seed_price(),
        }
    }
}

/// State directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    /// Root state directory
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Per-day plan files, relative to the state dir
    #[serde(default = "default_plans_dir")]
    pub plans_dir: String,

    /// Append-only lesson log, relative to the state dir
    #[serde(default = "default_lessons_file")]
    pub lessons_file: String,

    /// Carryover file for unfinished tasks, relative to the state dir
    #[serde(default = "default_carryover_file")]
    pub carryover_file: String,

    /// Telemetry event log used when the dashboard sink is on
    #[serde(default = "default_telemetry_file")]
    pub telemetry_file: String,
}

fn default_state_dir() -> String {
    ".harrow".to_string()
}

fn default_plans_dir() -> String {
    "plans".to_string()
}

fn default_lessons_file() -> String {
    "lessons.jsonl".to_string()
}

fn default_carryover_file() -> String {
    "carryover.json".to_string()
}

fn default_telemetry_file() -> String {
    "telemetry.jsonl".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            plans_dir: default_plans_dir(),
            lessons_file: default_lessons_file(),
            carryover_file: default_carryover_file(),
            telemetry_file: default_telemetry_file(),
        }
    }
}

impl PathsConfig {
    /// Absolute-ish path of the plans directory.
    pub fn plans_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(&self.plans_dir)
    }

    /// Path of the lessons log.
    pub fn lessons_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(&self.lessons_file)
    }

    /// Path of the carryover file.
    pub fn carryover_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(&self.carryover_file)
    }

    /// Path of the telemetry event log.
    pub fn telemetry_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(&self.telemetry_file)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Also write daily-rolled log files under the state dir
    #[serde(default)]
    pub file_logging: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_logging: false,
        }
    }
}
