//! Contact detection — pointer and touch streams folded into one boolean.
//!
//! The panel window (or any other front end) feeds [`RawInput`]s in; the
//! [`InputAdapter`] answers with the new contact value, or `None` when the
//! event says nothing about contact.  Consumers don't need to know whether
//! contact came from a mouse or a touch screen.

// ════════════════════════════════════════════════════════════════════════════
// RawInput
// ════════════════════════════════════════════════════════════════════════════

/// A pointer or touch event on the scan panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawInput {
    /// Primary button pressed over the panel.
    PointerDown,
    PointerMove,
    PointerUp,
    /// Pointer left the panel.
    PointerLeave,

    TouchStart,
    /// `touches` = touch points still on the panel after the event.
    TouchMove   { touches: usize },
    TouchEnd    { touches: usize },
    TouchCancel { touches: usize },
}

// ════════════════════════════════════════════════════════════════════════════
// InputAdapter
// ════════════════════════════════════════════════════════════════════════════

/// Folds pointer and touch events into a single contact signal.
///
/// Contact is true while any touch point is down, or while the primary button
/// is held with the pointer over the panel.  Sequences that make no sense
/// (release without press, end with no touches) come out as `false`.
#[derive(Debug)]
pub struct InputAdapter {
    attached:    bool,
    button_held: bool,
    touches:     usize,
}

impl Default for InputAdapter {
    fn default() -> Self {
        InputAdapter { attached: true, button_held: false, touches: 0 }
    }
}

impl InputAdapter {
    pub fn new() -> Self { Self::default() }

    pub fn is_attached(&self) -> bool { self.attached }

    pub fn contact(&self) -> bool {
        self.attached && (self.button_held || self.touches > 0)
    }

    /// Stop listening.  Held-button and touch state are forgotten.
    pub fn detach(&mut self) {
        self.attached    = false;
        self.button_held = false;
        self.touches     = 0;
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Apply one raw event.  Returns the contact value to publish, if any.
    pub fn handle(&mut self, input: RawInput) -> Option<bool> {
        if !self.attached { return None; }

        match input {
            RawInput::PointerDown => {
                self.button_held = true;
            }
            RawInput::PointerMove => {
                if !self.button_held { return None; }
            }
            RawInput::PointerUp => {
                self.button_held = false;
            }
            RawInput::PointerLeave => {
                if !self.button_held { return None; }
                self.button_held = false;
            }
            RawInput::TouchStart => {
                self.touches = self.touches.max(1);
            }
            RawInput::TouchMove { touches }
            | RawInput::TouchEnd { touches }
            | RawInput::TouchCancel { touches } => {
                self.touches = touches;
            }
        }

        Some(self.contact())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
