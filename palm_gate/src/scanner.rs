//! The gesture-scan state machine.
//!
//! [`GestureScanner`] owns the panel state, the current scan session and the
//! timer queue.  It is driven entirely by [`Event`]s and answers each with a
//! list of [`Effect`]s for the caller to carry out (dispatch a door command,
//! speak, detach input, …).  It never performs I/O and never reads the wall
//! clock, so every transition and delay can be stepped through in tests.
//!
//! ## Cycle
//!
//! ```text
//!            contact                  Success + 300ms          START_DOOR done + 3800ms
//!   Idle ───────────────▶ Scanning ─────────────────▶ Granted ──────────────────────▶ Started
//!    ▲                       │                                                          │
//!    │                       │ Fail + 100ms                                             │ reset
//!    │                       ▼                                                          ▼
//!    └──── 2200ms + 100ms ─ Locked (scan failed)        Locked (resetting) ◀────────────┘
//!    └──────────────────────────────── CLOSE_DOOR done + 1800ms ───┘
//! ```

use std::time::Duration;

use door_link::{DoorCommand, TransportError};
use scan_beam::{BeamParams, BeamSimulator, Crossing};

use crate::config::{Phrases, ScanTimings};
use crate::timers::TimerQueue;

// ════════════════════════════════════════════════════════════════════════════
// Public types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    Idle,
    Scanning,
    Granted,
    Started,
    Locked,
}

/// Where a reset request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetSource {
    /// Keyboard shortcut; honoured in any unlocked state.
    Keyboard,
    /// The on-panel reset control; only offered once Started.
    Control,
}

/// Scheduled continuations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timer {
    BeamTick,
    GrantSettled,
    ShowStarted,
    FailSettled,
    HideError,
    ReattachInput,
    Unlock,
}

#[derive(Debug)]
pub enum Event {
    /// Live contact signal from the input adapter.
    Contact(bool),
    Reset(ResetSource),
    /// Completion of a previously emitted [`Effect::Dispatch`].
    SendCompleted {
        command: DoorCommand,
        result:  Result<(), TransportError>,
    },
    PanelResized(f64),
    Timer(Timer),
}

#[derive(Debug)]
pub enum Effect {
    /// Send a command to the door; answer with [`Event::SendCompleted`].
    Dispatch(DoorCommand),
    Speak(String),
    /// A dispatch failed.  Already logged; the cycle carries on regardless.
    DispatchFailed {
        command: DoorCommand,
        error:   TransportError,
    },
    DetachInput,
    AttachInput,
    StateChanged {
        from: PanelState,
        to:   PanelState,
    },
}

/// What the panel should be showing.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelView {
    pub idle_prompt:    bool,
    pub scan_screen:    bool,
    /// Beam position while a session is live.
    pub beam:           Option<f64>,
    pub granted:        bool,
    pub started:        bool,
    pub reset_control:  bool,
    pub error:          bool,
    /// Bumped whenever the decorative sweep should restart.
    pub sweep_restarts: u32,
}

impl PanelView {
    fn idle() -> Self {
        PanelView {
            idle_prompt:    true,
            scan_screen:    true,
            beam:           None,
            granted:        false,
            started:        false,
            reset_control:  false,
            error:          false,
            sweep_restarts: 0,
        }
    }
}

/// One beam-integration attempt.
#[derive(Debug)]
pub struct ScanSession {
    beam:     BeamSimulator,
    /// A `BeamTick` is queued for this session.
    ticking:  bool,
    crossing: Option<Crossing>,
}

impl ScanSession {
    pub fn position(&self)   -> f64              { self.beam.position() }
    pub fn ticks(&self)      -> u64              { self.beam.ticks() }
    pub fn is_ticking(&self) -> bool             { self.ticking }
    pub fn crossing(&self)   -> Option<Crossing> { self.crossing }
}

// ════════════════════════════════════════════════════════════════════════════
// Internal phase
// ════════════════════════════════════════════════════════════════════════════

// The session lives inside `Scanning`, so it exists exactly while scanning.
#[derive(Debug)]
enum Phase {
    Idle,
    Scanning(ScanSession),
    Granted { awaiting_send: bool },
    Started,
    Locked(Lock),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lock {
    ScanFailed,
    Resetting { awaiting_send: bool },
}

// ════════════════════════════════════════════════════════════════════════════
// GestureScanner
// ════════════════════════════════════════════════════════════════════════════

pub struct GestureScanner {
    phase:        Phase,
    contact:      bool,
    panel_height: f64,
    params:       BeamParams,
    timings:      ScanTimings,
    phrases:      Phrases,
    timers:       TimerQueue<Timer>,
    view:         PanelView,
}

impl GestureScanner {
    pub fn new(timings: ScanTimings, params: BeamParams, phrases: Phrases, panel_height: f64) -> Self {
        GestureScanner {
            phase:        Phase::Idle,
            contact:      false,
            panel_height: panel_height.max(0.0),
            params,
            timings,
            phrases,
            timers:       TimerQueue::new(),
            view:         PanelView::idle(),
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn state(&self) -> PanelState {
        match self.phase {
            Phase::Idle          => PanelState::Idle,
            Phase::Scanning(_)   => PanelState::Scanning,
            Phase::Granted { .. } => PanelState::Granted,
            Phase::Started       => PanelState::Started,
            Phase::Locked(_)     => PanelState::Locked,
        }
    }

    pub fn is_locked(&self) -> bool { matches!(self.phase, Phase::Locked(_)) }

    pub fn session(&self) -> Option<&ScanSession> {
        match &self.phase {
            Phase::Scanning(s) => Some(s),
            _ => None,
        }
    }

    /// The door command whose completion is still outstanding, if any.
    pub fn pending_send(&self) -> Option<DoorCommand> {
        match self.phase {
            Phase::Granted { awaiting_send: true } => Some(DoorCommand::StartDoor),
            Phase::Locked(Lock::Resetting { awaiting_send: true }) => Some(DoorCommand::CloseDoor),
            _ => None,
        }
    }

    pub fn view(&self)         -> &PanelView { &self.view }
    pub fn contact(&self)      -> bool       { self.contact }
    pub fn panel_height(&self) -> f64        { self.panel_height }
    pub fn now(&self)          -> Duration   { self.timers.now() }

    // ── driving ───────────────────────────────────────────────────────────

    /// Begin a scan session.  A no-op unless the panel is Idle.
    pub fn start_scan(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.start_scan_into(&mut fx);
        fx
    }

    /// Feed one event through the transition table.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::Contact(contact) => {
                self.contact = contact;
                if contact { self.start_scan_into(&mut fx); }
            }
            Event::Reset(source)                    => self.reset(source, &mut fx),
            Event::SendCompleted { command, result } => self.send_completed(command, result, &mut fx),
            Event::PanelResized(h)                  => self.panel_height = h.max(0.0),
            Event::Timer(timer)                     => self.on_timer(timer, &mut fx),
        }
        fx
    }

    /// Fire the earliest timer due at or before `until`, if any.
    pub fn fire_next(&mut self, until: Duration) -> Option<Vec<Effect>> {
        let timer = self.timers.fire_next(until)?;
        let mut fx = Vec::new();
        self.on_timer(timer, &mut fx);
        Some(fx)
    }

    /// Move the virtual clock to `until` without firing anything.
    pub fn advance_clock(&mut self, until: Duration) {
        self.timers.advance_clock(until);
    }

    /// Fire everything due up to `until`, then move the clock there.
    pub fn advance_to(&mut self, until: Duration) -> Vec<Effect> {
        let mut fx = Vec::new();
        while let Some(more) = self.fire_next(until) {
            fx.extend(more);
        }
        self.advance_clock(until);
        fx
    }

    // ── transitions ───────────────────────────────────────────────────────

    fn start_scan_into(&mut self, fx: &mut Vec<Effect>) {
        if !matches!(self.phase, Phase::Idle) { return; }

        let from = self.state();
        let beam = BeamSimulator::new(self.params, self.panel_height);
        self.timers.schedule(self.timings.tick(), Timer::BeamTick);

        self.view.idle_prompt = false;
        self.view.beam        = Some(beam.position());
        self.phase = Phase::Scanning(ScanSession { beam, ticking: true, crossing: None });
        self.note_transition(from, fx);
    }

    fn on_timer(&mut self, timer: Timer, fx: &mut Vec<Effect>) {
        let from  = self.state();
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        self.phase = match (phase, timer) {
            (Phase::Scanning(mut s), Timer::BeamTick) => {
                self.beam_tick(&mut s);
                Phase::Scanning(s)
            }
            (Phase::Scanning(_), Timer::GrantSettled) => self.enter_granted(fx),
            (Phase::Scanning(_), Timer::FailSettled)  => self.enter_failed(fx),

            (Phase::Granted { awaiting_send: false }, Timer::ShowStarted) => {
                self.view.granted       = false;
                self.view.started       = true;
                self.view.reset_control = true;
                Phase::Started
            }

            (Phase::Locked(Lock::ScanFailed), Timer::HideError) => {
                self.view.error = false;
                self.timers.schedule(self.timings.error_fade(), Timer::Unlock);
                Phase::Locked(Lock::ScanFailed)
            }

            (Phase::Locked(lock @ Lock::Resetting { awaiting_send: false }), Timer::ReattachInput) => {
                fx.push(Effect::AttachInput);
                Phase::Locked(lock)
            }

            (Phase::Locked(Lock::ScanFailed | Lock::Resetting { awaiting_send: false }), Timer::Unlock) => {
                self.view.idle_prompt = true;
                Phase::Idle
            }

            (phase, timer) => {
                tracing::trace!(?timer, "timer has no transition in current phase");
                phase
            }
        };

        self.note_transition(from, fx);
    }

    fn beam_tick(&mut self, s: &mut ScanSession) {
        s.ticking = false;
        let t = s.beam.tick(self.contact, self.panel_height);
        self.view.beam = Some(t.position);

        match t.crossing {
            None => {
                self.timers.schedule(self.timings.tick(), Timer::BeamTick);
                s.ticking = true;
            }
            Some(c) => {
                tracing::debug!(crossing = ?c, ticks = s.beam.ticks(), "beam crossed");
                s.crossing = Some(c);
                let (delay, next) = match c {
                    Crossing::Success => (self.timings.grant_settle(), Timer::GrantSettled),
                    Crossing::Fail    => (self.timings.fail_settle(),  Timer::FailSettled),
                };
                self.timers.schedule(delay, next);
            }
        }
    }

    fn enter_granted(&mut self, fx: &mut Vec<Effect>) -> Phase {
        self.contact = false;
        self.view.scan_screen     = false;
        self.view.beam            = None;
        self.view.granted         = true;
        self.view.sweep_restarts += 1;
        fx.push(Effect::Speak(self.phrases.granted.clone()));
        fx.push(Effect::Dispatch(DoorCommand::StartDoor));
        Phase::Granted { awaiting_send: true }
    }

    fn enter_failed(&mut self, fx: &mut Vec<Effect>) -> Phase {
        self.view.beam  = None;
        self.view.error = true;
        fx.push(Effect::Speak(self.phrases.failed.clone()));
        self.timers.schedule(self.timings.error_display(), Timer::HideError);
        Phase::Locked(Lock::ScanFailed)
    }

    fn reset(&mut self, source: ResetSource, fx: &mut Vec<Effect>) {
        match (&self.phase, source) {
            (Phase::Locked(_), _) => {
                tracing::debug!(?source, "reset ignored while locked");
                return;
            }
            (Phase::Granted { awaiting_send: true }, _) => {
                tracing::debug!(?source, "reset ignored while START_DOOR is in flight");
                return;
            }
            (Phase::Started, ResetSource::Control) | (_, ResetSource::Keyboard) => {}
            (_, ResetSource::Control) => {
                tracing::debug!("reset control is not offered yet");
                return;
            }
        }

        let from = self.state();
        // Lock before anything can suspend; this also ends any live session.
        self.timers.clear();
        self.phase = Phase::Locked(Lock::Resetting { awaiting_send: true });
        self.note_transition(from, fx);
        fx.push(Effect::Dispatch(DoorCommand::CloseDoor));
    }

    fn send_completed(
        &mut self,
        command: DoorCommand,
        result:  Result<(), TransportError>,
        fx:      &mut Vec<Effect>,
    ) {
        if self.pending_send() != Some(command) {
            tracing::debug!(%command, "completion with no matching send ignored");
            return;
        }

        match command {
            DoorCommand::StartDoor => {
                if let Err(error) = result {
                    report_failure(command, error, fx);
                    for phrase in &self.phrases.start_fallback {
                        fx.push(Effect::Speak(phrase.clone()));
                    }
                }
                self.phase = Phase::Granted { awaiting_send: false };
                fx.push(Effect::DetachInput);
                self.timers.schedule(self.timings.started_delay(), Timer::ShowStarted);
            }
            DoorCommand::CloseDoor => {
                match result {
                    Ok(()) => fx.push(Effect::Speak(self.phrases.closing.clone())),
                    Err(error) => {
                        report_failure(command, error, fx);
                        fx.push(Effect::Speak(self.phrases.close_fallback.clone()));
                    }
                }
                self.phase   = Phase::Locked(Lock::Resetting { awaiting_send: false });
                self.contact = false;
                self.view    = PanelView {
                    sweep_restarts: self.view.sweep_restarts + 1,
                    ..PanelView::idle()
                };
                fx.push(Effect::Speak(self.phrases.ready.clone()));
                fx.push(Effect::DetachInput);
                self.timers.schedule(self.timings.input_debounce(), Timer::ReattachInput);
                self.timers.schedule(self.timings.reset_cooldown(), Timer::Unlock);
            }
        }
    }

    fn note_transition(&self, from: PanelState, fx: &mut Vec<Effect>) {
        let to = self.state();
        if from != to {
            tracing::debug!(?from, ?to, at_ms = self.timers.now().as_millis() as u64, "panel state");
            fx.push(Effect::StateChanged { from, to });
        }
    }
}

fn report_failure(command: DoorCommand, error: TransportError, fx: &mut Vec<Effect>) {
    tracing::warn!(%command, %error, "door command failed; continuing without the device");
    fx.push(Effect::DispatchFailed { command, error });
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
