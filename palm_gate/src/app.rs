//! Top-level kiosk.
//!
//! `Kiosk` owns the `InputAdapter`, the `GestureScanner`, the door link and
//! the voice.  It routes raw input into the scanner, carries out the
//! scanner's effects, and feeds link completions back in.  `run()` puts a
//! panel window around it and drives the whole thing at ~60 fps.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use door_link::{
    list_ports, Dispatcher, DoorCommand, DoorLink, LinkEvent, SerialTransport, Transport,
    TransportError,
};

use crate::config::GateConfig;
use crate::input::{InputAdapter, RawInput};
use crate::panel::{Panel, PanelInput};
use crate::scanner::{Effect, Event, GestureScanner, PanelState, PanelView, ResetSource};
use crate::voice::{Silent, SpeechCommand, Voice};

// ════════════════════════════════════════════════════════════════════════════
// Kiosk
// ════════════════════════════════════════════════════════════════════════════

pub struct Kiosk<L: DoorLink, V: Voice> {
    adapter:      InputAdapter,
    scanner:      GestureScanner,
    link:         L,
    voice:        V,
    connected:    String,
    port:         Option<String>,
    last_failure: Option<(DoorCommand, TransportError)>,
    /// One-line status for the panel's status bar.
    status:       String,
}

impl<L: DoorLink, V: Voice> Kiosk<L, V> {
    pub fn new(cfg: &GateConfig, panel_height: f64, link: L, voice: V) -> Self {
        Kiosk {
            adapter:      InputAdapter::new(),
            scanner:      GestureScanner::new(cfg.timings, cfg.beam, cfg.phrases.clone(), panel_height),
            link,
            voice,
            connected:    cfg.phrases.connected.clone(),
            port:         None,
            last_failure: None,
            status:       "Door link offline".to_string(),
        }
    }

    // ── inputs ────────────────────────────────────────────────────────────

    pub fn on_input(&mut self, raw: RawInput) {
        if let Some(contact) = self.adapter.handle(raw) {
            let fx = self.scanner.handle(Event::Contact(contact));
            self.apply(fx);
        }
    }

    pub fn request_reset(&mut self, source: ResetSource) {
        let fx = self.scanner.handle(Event::Reset(source));
        self.apply(fx);
    }

    pub fn resize(&mut self, panel_height: f64) {
        let fx = self.scanner.handle(Event::PanelResized(panel_height));
        self.apply(fx);
    }

    pub fn connect(&mut self, transport: Box<dyn Transport>) {
        self.status = format!("Connecting to {}...", transport.name());
        tracing::info!(port = %transport.name(), "connecting door link");
        self.link.connect(transport);
    }

    /// Fire every timer due by `now`, handling link events between them.
    pub fn pump(&mut self, now: Duration) {
        self.drain_link();
        while let Some(fx) = self.scanner.fire_next(now) {
            self.apply(fx);
            self.drain_link();
        }
        self.scanner.advance_clock(now);
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn state(&self)        -> PanelState      { self.scanner.state() }
    pub fn view(&self)         -> &PanelView      { self.scanner.view() }
    pub fn scanner(&self)      -> &GestureScanner { &self.scanner }
    pub fn adapter(&self)      -> &InputAdapter   { &self.adapter }
    pub fn port(&self)         -> Option<&str>    { self.port.as_deref() }
    pub fn status(&self)       -> &str            { &self.status }
    pub fn link(&self)         -> &L              { &self.link }
    pub fn voice(&self)        -> &V              { &self.voice }

    /// The most recent door command that could not be delivered.
    pub fn last_failure(&self) -> Option<&(DoorCommand, TransportError)> {
        self.last_failure.as_ref()
    }

    // ── plumbing ──────────────────────────────────────────────────────────

    fn drain_link(&mut self) {
        for event in self.link.drain() {
            match event {
                LinkEvent::Connected { port } => {
                    tracing::info!(%port, "door link connected");
                    self.status = format!("Connected: {}", port);
                    self.voice.speak(&self.connected);
                    self.port = Some(port);
                }
                LinkEvent::ConnectFailed(e) => {
                    tracing::warn!(error = %e, "door link connect failed");
                    self.status = format!("Connect failed: {}", e);
                }
                LinkEvent::SendCompleted { command, result } => {
                    if result.is_ok() {
                        tracing::info!(%command, "door command sent");
                    }
                    let fx = self.scanner.handle(Event::SendCompleted { command, result });
                    self.apply(fx);
                }
                LinkEvent::Inbound(line) => {
                    tracing::info!(target: "door", %line, "device says");
                }
                LinkEvent::Disconnected { port, error } => {
                    if self.port.as_deref() != Some(port.as_str()) {
                        tracing::debug!(%port, "hang-up from a replaced link ignored");
                        continue;
                    }
                    let why = match error {
                        Some(e) => e.to_string(),
                        None    => "device hung up".to_string(),
                    };
                    self.drop_link(&why);
                }
            }
        }
    }

    /// Forget the current device so `C` can connect again.
    fn drop_link(&mut self, why: &str) {
        tracing::warn!(port = ?self.port, reason = %why, "door link lost");
        self.port = None;
        self.link.disconnect();
        self.status = format!("Door link lost: {} (press C to reconnect)", why);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Dispatch(command) => self.link.submit(command),
                Effect::Speak(text)       => self.voice.speak(&text),
                Effect::DispatchFailed { command, error } => {
                    match &error {
                        TransportError::NotConnected => {
                            self.status = "Door link offline".to_string();
                        }
                        TransportError::Io(e) => {
                            self.drop_link(&format!("{} failed: {}", command, e));
                        }
                        other => self.status = format!("{} failed: {}", command, other),
                    }
                    self.last_failure = Some((command, error));
                }
                Effect::DetachInput => self.adapter.detach(),
                Effect::AttachInput => self.adapter.attach(),
                Effect::StateChanged { from, to } => {
                    tracing::info!(?from, ?to, "gate state");
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Open the panel window, connect the door link if a port is configured,
/// and drive the event/render loop until the window closes.
pub fn run(cfg: GateConfig) -> Result<()> {
    // ── Panel window ──────────────────────────────────────────────────────
    let mut panel = Panel::new(&cfg.panel, cfg.beam.beam_height)
        .context("failed to open the panel window")?;

    // ── Voice ─────────────────────────────────────────────────────────────
    let voice: Box<dyn Voice> = if cfg.voice.enabled {
        Box::new(SpeechCommand::from_config(&cfg.voice))
    } else {
        Box::new(Silent)
    };

    // ── Kiosk + link ──────────────────────────────────────────────────────
    let mut kiosk = Kiosk::new(&cfg, panel.panel_height(), Dispatcher::spawn(), voice);
    match &cfg.link.port {
        Some(port) => kiosk.connect(Box::new(SerialTransport::new(port.clone(), cfg.link.baud))),
        None => tracing::info!("no door port configured; press C to connect"),
    }

    // ── Main loop ─────────────────────────────────────────────────────────
    let start = Instant::now();
    while panel.is_open() {
        // 1. Poll window input
        let inputs = panel.poll(kiosk.view());

        // 2. Catch the scanner up to wall-clock time
        kiosk.pump(start.elapsed());

        // 3. Apply this frame's input
        for input in inputs {
            match input {
                PanelInput::Raw(raw)       => kiosk.on_input(raw),
                PanelInput::Reset(source)  => kiosk.request_reset(source),
                PanelInput::Resized(h)     => kiosk.resize(h),
                PanelInput::Connect        => connect_first_port(&mut kiosk, &cfg),
                PanelInput::Quit           => return Ok(()),
            }
        }

        // 4. Render
        panel.render(kiosk.view(), kiosk.state(), kiosk.status());
    }

    Ok(())
}

/// Connect to the configured port, or the first one the system reports.
fn connect_first_port<L: DoorLink, V: Voice>(kiosk: &mut Kiosk<L, V>, cfg: &GateConfig) {
    if kiosk.port().is_some() {
        kiosk.status = "Already connected".to_string();
        return;
    }
    let path = match &cfg.link.port {
        Some(p) => Some(p.clone()),
        None => match list_ports() {
            Ok(ports) => ports.into_iter().next().map(|p| p.path),
            Err(e) => {
                tracing::warn!(error = %e, "could not list serial ports");
                None
            }
        },
    };
    match path {
        Some(path) => kiosk.connect(Box::new(SerialTransport::new(path, cfg.link.baud))),
        None       => kiosk.status = "No serial ports found".to_string(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Phrases;
    use door_link::memory::MemoryTransport;
    use RawInput::*;

    const H: f64 = 300.0;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    /// Completes every command synchronously.  `offline` fails sends with
    /// `NotConnected`, `unplugged` with a broken-pipe `Io` error.
    #[derive(Default)]
    struct FakeLink {
        sent:        Vec<DoorCommand>,
        pending:     Vec<LinkEvent>,
        offline:     bool,
        unplugged:   bool,
        disconnects: usize,
    }

    impl DoorLink for FakeLink {
        fn connect(&mut self, transport: Box<dyn Transport>) {
            self.pending.push(LinkEvent::Connected { port: transport.name() });
        }
        fn submit(&mut self, command: DoorCommand) {
            self.sent.push(command);
            let result = if self.offline {
                Err(TransportError::NotConnected)
            } else if self.unplugged {
                Err(TransportError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged")))
            } else {
                Ok(())
            };
            self.pending.push(LinkEvent::SendCompleted { command, result });
        }
        fn disconnect(&mut self) { self.disconnects += 1; }
        fn drain(&mut self) -> Vec<LinkEvent> { std::mem::take(&mut self.pending) }
    }

    #[derive(Default)]
    struct RecordingVoice(Vec<String>);

    impl Voice for RecordingVoice {
        fn speak(&mut self, text: &str) { self.0.push(text.to_string()); }
    }

    fn make_kiosk(offline: bool) -> Kiosk<FakeLink, RecordingVoice> {
        let link = FakeLink { offline, ..FakeLink::default() };
        Kiosk::new(&GateConfig::default(), H, link, RecordingVoice::default())
    }

    fn hold_until_started(k: &mut Kiosk<FakeLink, RecordingVoice>) {
        k.on_input(PointerDown);
        k.pump(ms(5124));
        assert_eq!(k.state(), PanelState::Started);
    }

    #[test]
    fn held_palm_opens_the_door() {
        let mut k = make_kiosk(false);
        k.on_input(PointerDown);
        assert_eq!(k.state(), PanelState::Scanning);

        k.pump(ms(1323));
        assert_eq!(k.state(), PanelState::Scanning);
        assert!(k.link().sent.is_empty());

        k.pump(ms(1324));
        assert_eq!(k.state(), PanelState::Granted);
        assert_eq!(k.link().sent, vec![DoorCommand::StartDoor]);
        assert_eq!(k.voice().0, vec![Phrases::default().granted]);
        assert!(!k.adapter().is_attached());

        k.pump(ms(5123));
        assert_eq!(k.state(), PanelState::Granted);
        k.pump(ms(5124));
        assert_eq!(k.state(), PanelState::Started);
        assert!(k.view().reset_control);
        assert!(k.last_failure().is_none());
    }

    #[test]
    fn lifted_palm_fails_and_recovers() {
        let mut k = make_kiosk(false);
        k.on_input(PointerDown);
        k.on_input(PointerUp);

        k.pump(ms(116));
        assert_eq!(k.state(), PanelState::Locked);
        assert_eq!(k.voice().0, vec![Phrases::default().failed]);

        k.pump(ms(2315));
        assert!(k.view().error);
        k.pump(ms(2316));
        assert!(!k.view().error);
        k.pump(ms(2416));
        assert_eq!(k.state(), PanelState::Idle);
        assert!(k.link().sent.is_empty());

        // A fresh press scans again.
        k.on_input(PointerDown);
        assert_eq!(k.state(), PanelState::Scanning);
    }

    #[test]
    fn offline_link_degrades_to_fallback_phrases() {
        let mut k = make_kiosk(true);
        hold_until_started(&mut k);

        let p = Phrases::default();
        let mut expected = vec![p.granted];
        expected.extend(p.start_fallback);
        assert_eq!(k.voice().0, expected);
        assert!(matches!(
            k.last_failure(),
            Some((DoorCommand::StartDoor, TransportError::NotConnected))
        ));
        assert_eq!(k.status(), "Door link offline");
    }

    #[test]
    fn double_reset_sends_one_close() {
        let mut k = make_kiosk(false);
        hold_until_started(&mut k);

        k.request_reset(ResetSource::Control);
        k.request_reset(ResetSource::Keyboard);
        k.pump(ms(5200));
        k.request_reset(ResetSource::Keyboard);

        assert_eq!(k.link().sent, vec![DoorCommand::StartDoor, DoorCommand::CloseDoor]);
    }

    #[test]
    fn reset_round_trip_returns_to_idle() {
        let mut k = make_kiosk(false);
        hold_until_started(&mut k);

        k.request_reset(ResetSource::Control);
        assert_eq!(k.state(), PanelState::Locked);
        k.pump(ms(5124));

        let p = Phrases::default();
        let spoken = &k.voice().0;
        assert_eq!(&spoken[spoken.len() - 2..], &[p.closing, p.ready]);
        assert!(!k.adapter().is_attached());

        k.pump(ms(5224));
        assert!(k.adapter().is_attached());
        assert_eq!(k.state(), PanelState::Locked);

        k.pump(ms(6924));
        assert_eq!(k.state(), PanelState::Idle);
        assert!(k.scanner().session().is_none());
        assert!(k.view().idle_prompt);
        assert!(!k.view().started);
    }

    #[test]
    fn input_is_ignored_between_grant_and_reset() {
        let mut k = make_kiosk(false);
        hold_until_started(&mut k);
        k.on_input(PointerUp);
        k.on_input(PointerDown);
        assert_eq!(k.state(), PanelState::Started);
        assert!(!k.scanner().contact());
    }

    #[test]
    fn connect_speaks_and_records_port() {
        let mut k = make_kiosk(false);
        k.connect(Box::new(MemoryTransport::new()));
        assert!(k.status().starts_with("Connecting"));
        k.pump(ms(0));
        assert_eq!(k.port(), Some("memory"));
        assert_eq!(k.voice().0, vec![Phrases::default().connected]);
    }

    #[test]
    fn dispatcher_carries_start_door_to_the_wire() {
        let transport = MemoryTransport::new();
        let written   = transport.written();
        let mut k = Kiosk::new(&GateConfig::default(), H, Dispatcher::spawn(), RecordingVoice::default());
        k.connect(Box::new(transport));

        let deadline = Instant::now() + Duration::from_secs(2);
        while k.port().is_none() && Instant::now() < deadline {
            std::thread::sleep(ms(5));
            k.pump(ms(0));
        }
        assert_eq!(k.port(), Some("memory"));

        k.on_input(PointerDown);
        k.pump(ms(1324));
        assert_eq!(k.scanner().pending_send(), Some(DoorCommand::StartDoor));

        let deadline = Instant::now() + Duration::from_secs(2);
        while k.scanner().pending_send().is_some() && Instant::now() < deadline {
            std::thread::sleep(ms(5));
            k.pump(ms(1324));
        }
        assert!(k.scanner().pending_send().is_none());
        assert_eq!(written.contents(), b"START_DOOR\n".to_vec());
        assert!(k.last_failure().is_none());
    }

    type LiveKiosk = Kiosk<Dispatcher, RecordingVoice>;

    /// Pump at `now` until `done` holds or two seconds pass.
    fn wait_until(k: &mut LiveKiosk, now: Duration, done: impl Fn(&LiveKiosk) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done(k) && Instant::now() < deadline {
            std::thread::sleep(ms(5));
            k.pump(now);
        }
    }

    fn fake_port_config() -> GateConfig {
        let mut cfg = GateConfig::default();
        cfg.link.port = Some("/dev/ttyFAKE".to_string());
        cfg
    }

    #[test]
    fn write_failure_frees_the_link_for_reconnect() {
        let mut k = make_kiosk(false);
        k.connect(Box::new(MemoryTransport::new()));
        k.pump(ms(0));
        assert_eq!(k.port(), Some("memory"));

        k.link.unplugged = true;
        k.on_input(PointerDown);
        k.pump(ms(1324));
        assert_eq!(k.last_failure().map(|(c, _)| *c), Some(DoorCommand::StartDoor));
        assert_eq!(k.port(), None);
        assert_eq!(k.link().disconnects, 1);
        assert!(k.status().starts_with("Door link lost"));

        k.link.unplugged = false;
        connect_first_port(&mut k, &fake_port_config());
        assert!(k.status().starts_with("Connecting"));
        k.pump(ms(1324));
        assert_eq!(k.port(), Some("/dev/ttyFAKE"));
    }

    #[test]
    fn already_connected_link_is_left_alone() {
        let mut k = make_kiosk(false);
        k.connect(Box::new(MemoryTransport::new()));
        k.pump(ms(0));
        connect_first_port(&mut k, &fake_port_config());
        assert_eq!(k.status(), "Already connected");
        assert_eq!(k.port(), Some("memory"));
    }

    #[test]
    fn dispatcher_write_failure_allows_reconnect() {
        let mut k = Kiosk::new(&GateConfig::default(), H, Dispatcher::spawn(), RecordingVoice::default());
        k.connect(Box::new(MemoryTransport::failing_writes()));
        wait_until(&mut k, ms(0), |k| k.port().is_some());
        assert_eq!(k.port(), Some("memory"));

        k.on_input(PointerDown);
        k.pump(ms(1324));
        wait_until(&mut k, ms(1324), |k| k.last_failure().is_some());
        assert!(matches!(k.last_failure(), Some((DoorCommand::StartDoor, TransportError::Io(_)))));
        assert_eq!(k.port(), None);

        connect_first_port(&mut k, &fake_port_config());
        assert!(k.status().starts_with("Connecting"));
    }

    #[test]
    fn device_hang_up_clears_the_port() {
        let transport = MemoryTransport::new();
        let line      = transport.hang_up_handle();
        let mut k = Kiosk::new(&GateConfig::default(), H, Dispatcher::spawn(), RecordingVoice::default());
        k.connect(Box::new(transport));
        wait_until(&mut k, ms(0), |k| k.port().is_some());
        assert_eq!(k.port(), Some("memory"));

        line.hang_up();
        wait_until(&mut k, ms(0), |k| k.port().is_none());
        assert_eq!(k.port(), None);
        assert!(k.status().starts_with("Door link lost: device hung up"));
    }
}
