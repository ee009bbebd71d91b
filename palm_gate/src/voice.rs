//! Spoken feedback.
//!
//! Speech is best effort: nothing here ever reports failure to the caller.
//! A new utterance always cuts off the previous one, so the most recent call
//! is the one the user hears.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::config::VoiceConfig;

/// Fire-and-forget speaker.
pub trait Voice {
    /// Cancel whatever is being said and start saying `text`.
    fn speak(&mut self, text: &str);
}

impl<V: Voice + ?Sized> Voice for Box<V> {
    fn speak(&mut self, text: &str) { (**self).speak(text) }
}

/// Says nothing.  Used with `--mute`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Voice for Silent {
    fn speak(&mut self, text: &str) {
        tracing::debug!(text, "voice muted");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SpeechCommand — external TTS process
// ════════════════════════════════════════════════════════════════════════════

/// Speaks by running a text-to-speech program, one child process per
/// utterance.  Cancelling means killing the child.
pub struct SpeechCommand {
    program: String,
    args:    Vec<String>,
    child:   Option<Child>,
}

impl SpeechCommand {
    pub fn from_config(cfg: &VoiceConfig) -> Self {
        let mut args = cfg.args.clone();
        args.extend(prosody_args(&cfg.program, cfg.rate, cfg.pitch, cfg.volume));
        SpeechCommand { program: cfg.program.clone(), args, child: None }
    }

    /// Whether an utterance is still playing.
    pub fn is_speaking(&mut self) -> bool {
        match self.child.as_mut() {
            Some(c) => matches!(c.try_wait(), Ok(None)),
            None    => false,
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Voice for SpeechCommand {
    fn speak(&mut self, text: &str) {
        self.cancel();
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!(text, "speaking");
                self.child = Some(child);
            }
            Err(e) => tracing::debug!(program = %self.program, error = %e, "speech unavailable"),
        }
    }
}

impl Drop for SpeechCommand {
    fn drop(&mut self) { self.cancel(); }
}

/// Rate / pitch / volume (1.0 = normal) as flags for the TTS programs we know.
fn prosody_args(program: &str, rate: f32, pitch: f32, volume: f32) -> Vec<String> {
    let name = Path::new(program)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(program);

    match name {
        "espeak" | "espeak-ng" => vec![
            "-s".into(), format!("{}", (175.0 * rate).round() as u32),
            "-p".into(), format!("{}", (50.0 * pitch).round().clamp(0.0, 99.0) as u32),
            "-a".into(), format!("{}", (100.0 * volume).round().clamp(0.0, 200.0) as u32),
        ],
        "say" => vec!["-r".into(), format!("{}", (175.0 * rate).round() as u32)],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn espeak_gets_rate_pitch_and_amplitude() {
        assert_eq!(
            prosody_args("/usr/bin/espeak-ng", 0.8, 1.2, 0.5),
            vec!["-s", "140", "-p", "60", "-a", "50"]
        );
    }

    #[test]
    fn say_gets_rate_only_and_unknown_gets_nothing() {
        assert_eq!(prosody_args("say", 1.0, 1.0, 1.0), vec!["-r", "175"]);
        assert!(prosody_args("festival", 0.9, 1.1, 0.9).is_empty());
    }

    #[test]
    fn missing_program_is_swallowed() {
        let cfg = VoiceConfig {
            program: "/nonexistent/tts-binary".into(),
            ..VoiceConfig::default()
        };
        let mut voice = SpeechCommand::from_config(&cfg);
        voice.speak("hello");
        voice.speak("again");
        assert!(!voice.is_speaking());
    }
}
