//! Gate configuration: built-in defaults, an optional TOML file, and CLI
//! overrides on top.
//!
//! ```toml
//! [timings]
//! grant_settle_ms = 300
//! reset_cooldown_ms = 1800
//!
//! [beam]
//! scan_speed = 4.5
//!
//! [phrases]
//! granted = "Access granted. Opening the gate..."
//!
//! [voice]
//! program = "espeak-ng"
//!
//! [link]
//! port = "/dev/ttyACM0"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use door_link::DEFAULT_BAUD;
use scan_beam::{BeamParams, TICK_MS};

// ════════════════════════════════════════════════════════════════════════════
// ScanTimings
// ════════════════════════════════════════════════════════════════════════════

/// Every fixed delay of the scan cycle, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanTimings {
    /// Beam integration period.
    pub tick_ms:            u64,
    /// Success crossing → granted.
    pub grant_settle_ms:    u64,
    /// Granted → started, counted from the START_DOOR completion.
    pub started_delay_ms:   u64,
    /// Fail crossing → locked.
    pub fail_settle_ms:     u64,
    pub error_display_ms:   u64,
    /// Error hidden → idle.
    pub error_fade_ms:      u64,
    /// Input detached this long after a reset.
    pub input_debounce_ms:  u64,
    pub reset_cooldown_ms:  u64,
}

impl Default for ScanTimings {
    fn default() -> Self {
        ScanTimings {
            tick_ms:           TICK_MS,
            grant_settle_ms:   300,
            started_delay_ms:  3800,
            fail_settle_ms:    100,
            error_display_ms:  2200,
            error_fade_ms:     100,
            input_debounce_ms: 100,
            reset_cooldown_ms: 1800,
        }
    }
}

impl ScanTimings {
    pub fn tick(&self)            -> Duration { ms(self.tick_ms) }
    pub fn grant_settle(&self)    -> Duration { ms(self.grant_settle_ms) }
    pub fn started_delay(&self)   -> Duration { ms(self.started_delay_ms) }
    pub fn fail_settle(&self)     -> Duration { ms(self.fail_settle_ms) }
    pub fn error_display(&self)   -> Duration { ms(self.error_display_ms) }
    pub fn error_fade(&self)      -> Duration { ms(self.error_fade_ms) }
    pub fn input_debounce(&self)  -> Duration { ms(self.input_debounce_ms) }
    pub fn reset_cooldown(&self)  -> Duration { ms(self.reset_cooldown_ms) }
}

fn ms(n: u64) -> Duration { Duration::from_millis(n) }

// ════════════════════════════════════════════════════════════════════════════
// Phrases
// ════════════════════════════════════════════════════════════════════════════

/// What the gate says, and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub granted:        String,
    /// Spoken in order when START_DOOR could not be delivered.
    pub start_fallback: Vec<String>,
    pub failed:         String,
    pub closing:        String,
    pub close_fallback: String,
    pub ready:          String,
    pub connected:      String,
}

impl Default for Phrases {
    fn default() -> Self {
        Phrases {
            granted:        "Access granted. Opening the gate...".into(),
            start_fallback: vec![
                "Battle on Live".into(),
                "Battle Started..... Welcome to Roborover 2025".into(),
            ],
            failed:         "Hand removed. Scan failed. Try again.".into(),
            closing:        "Door closing.".into(),
            close_fallback: "Welcome to Roborover 2025".into(),
            ready:          "System reset. Ready for next scan.".into(),
            connected:      "Arduino connected.".into(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VoiceConfig / LinkConfig / PanelConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// Text-to-speech program; the phrase is passed as the last argument.
    pub program: String,
    /// Extra arguments placed before the prosody flags.
    pub args:    Vec<String>,
    pub rate:    f32,
    pub pitch:   f32,
    pub volume:  f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            enabled: true,
            program: default_speech_program().into(),
            args:    Vec::new(),
            rate:    0.9,
            pitch:   1.1,
            volume:  0.9,
        }
    }
}

fn default_speech_program() -> &'static str {
    if cfg!(target_os = "macos") { "say" } else { "espeak-ng" }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port of the door actuator.  `None` runs without a device.
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig { port: None, baud: DEFAULT_BAUD }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub width:  usize,
    pub height: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig { width: 420, height: 560 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GateConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub timings: ScanTimings,
    pub beam:    BeamParams,
    pub phrases: Phrases,
    pub voice:   VoiceConfig,
    pub link:    LinkConfig,
    pub panel:   PanelConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path:   PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg: GateConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would stall or invert the beam.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.beam;
        if self.timings.tick_ms == 0 {
            return Err(ConfigError::Invalid("timings.tick_ms must be > 0".into()));
        }
        if !(b.scan_speed > 0.0) || !(b.rewind_speed > 0.0) {
            return Err(ConfigError::Invalid("beam speeds must be > 0".into()));
        }
        if b.rewind_speed <= b.scan_speed {
            return Err(ConfigError::Invalid("beam.rewind_speed must exceed beam.scan_speed".into()));
        }
        if b.beam_height < 0.0 {
            return Err(ConfigError::Invalid("beam.beam_height must be >= 0".into()));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Cli
// ════════════════════════════════════════════════════════════════════════════

/// Palm-scan kiosk gate.
#[derive(Debug, Parser)]
#[command(name = "palm_gate", version, about)]
pub struct Cli {
    /// Serial port of the door actuator (e.g. /dev/ttyACM0, COM3).
    #[arg(long, env = "PALM_GATE_PORT")]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(long)]
    pub baud: Option<u32>,

    /// TOML config file.
    #[arg(long, env = "PALM_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable spoken feedback.
    #[arg(long)]
    pub mute: bool,

    /// Verbose (debug) logging.
    #[arg(long)]
    pub logs: bool,

    /// Write JSON logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print available serial ports and exit.
    #[arg(long)]
    pub list_ports: bool,
}

impl Cli {
    /// Defaults, then the config file, then command-line overrides.
    pub fn resolve(&self) -> Result<GateConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => GateConfig::load(path)?,
            None       => GateConfig::default(),
        };
        if let Some(port) = &self.port { cfg.link.port = Some(port.clone()); }
        if let Some(baud) = self.baud  { cfg.link.baud = baud; }
        if self.mute { cfg.voice.enabled = false; }
        Ok(cfg)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scan_cycle() {
        let t = ScanTimings::default();
        assert_eq!(t.tick(), Duration::from_millis(16));
        assert_eq!(t.grant_settle_ms + t.started_delay_ms, 4100);
        assert_eq!(t.error_display(), Duration::from_millis(2200));
        assert_eq!(t.reset_cooldown(), Duration::from_millis(1800));
        assert_eq!(GateConfig::default().link.baud, 115_200);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GateConfig = toml::from_str(
            r#"
            [timings]
            grant_settle_ms = 500

            [phrases]
            closing = "Bye."

            [link]
            port = "/dev/ttyUSB0"
            "#,
        ).unwrap();
        assert_eq!(cfg.timings.grant_settle_ms, 500);
        assert_eq!(cfg.timings.started_delay_ms, 3800);
        assert_eq!(cfg.phrases.closing, "Bye.");
        assert_eq!(cfg.phrases.ready, Phrases::default().ready);
        assert_eq!(cfg.link.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cfg.beam, BeamParams::default());
    }

    #[test]
    fn validate_rejects_zero_tick_and_speed() {
        let mut cfg = GateConfig::default();
        cfg.timings.tick_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = GateConfig::default();
        cfg.beam.scan_speed = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_rewind_no_faster_than_scan() {
        let mut cfg = GateConfig::default();
        cfg.beam.rewind_speed = cfg.beam.scan_speed;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("rewind_speed"));

        cfg.beam.rewind_speed = cfg.beam.scan_speed / 2.0;
        assert!(cfg.validate().is_err());

        cfg.beam.rewind_speed = cfg.beam.scan_speed * 2.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cli_overrides_port_baud_and_mute() {
        let cli = Cli::parse_from([
            "palm_gate", "--port", "COM7", "--baud", "9600", "--mute",
        ]);
        let cfg = cli.resolve().unwrap();
        assert_eq!(cfg.link.port.as_deref(), Some("COM7"));
        assert_eq!(cfg.link.baud, 9600);
        assert!(!cfg.voice.enabled);
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let err = GateConfig::load(Path::new("/nonexistent/palm_gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
