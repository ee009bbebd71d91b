//! Software-rendered scan panel using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  PALM GATE            STATE  │  header
//! ├──────────────────────────────┤
//! │                              │
//! │        [hand outline]        │  scan area: the beam travels from the
//! │  ══════ beam ══════════════  │  bottom edge up to the top edge
//! │                              │
//! │          [ RESET ]           │  (only once started)
//! ├──────────────────────────────┤
//! │  status bar / key legend     │
//! └──────────────────────────────┘
//! ```
//!
//! The window is resizable; the scan area's height is the panel height the
//! beam integrates against.

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::config::PanelConfig;
use crate::input::RawInput;
use crate::scanner::{PanelState, PanelView, ResetSource};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

const HEADER_H:      usize = 40;
const STATUS_H:      usize = 40;
const RESET_W:       usize = 140;
const RESET_H:       usize = 36;
const BG_COLOR:      u32   = 0xFF0B0F1A;
const HEADER_BG:     u32   = 0xFF16213E;
const SCAN_BG:       u32   = 0xFF101A2C;
const SCAN_BORDER:   u32   = 0xFF2A4A7A;
const BEAM_COLOR:    u32   = 0xFF00E5FF;
const SWEEP_COLOR:   u32   = 0xFF1E3A5F;
const GRANTED_BG:    u32   = 0xFF0F3D2A;
const GRANTED_FG:    u32   = 0xFF3CFF9A;
const ERROR_BG:      u32   = 0xFF4A1020;
const ERROR_FG:      u32   = 0xFFFF5A6E;
const GOLD:          u32   = 0xFFFFD700;
const TEXT_BG:       u32   = 0xFF0F3460;
const TEXT_FG:       u32   = 0xFFEEEEEE;
const LEGEND_FG:     u32   = 0xFF888888;

// ════════════════════════════════════════════════════════════════════════════
// Geometry
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Rect {
    pub fn contains(&self, (px, py): (f32, f32)) -> bool {
        px >= self.x as f32 && px < (self.x + self.w) as f32
            && py >= self.y as f32 && py < (self.y + self.h) as f32
    }
}

/// Where everything sits for a given window size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub scan:     Rect,
    pub reset:    Rect,
    pub status_y: usize,
}

impl Layout {
    pub fn for_size(w: usize, h: usize) -> Self {
        let scan_h = h.saturating_sub(HEADER_H + STATUS_H);
        let scan   = Rect { x: 0, y: HEADER_H, w, h: scan_h };
        let reset  = Rect {
            x: w.saturating_sub(RESET_W) / 2,
            y: (HEADER_H + scan_h).saturating_sub(RESET_H + 24),
            w: RESET_W,
            h: RESET_H,
        };
        Layout { scan, reset, status_y: HEADER_H + scan_h }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PanelInput + pointer tracking
// ════════════════════════════════════════════════════════════════════════════

/// What the window produced this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanelInput {
    Raw(RawInput),
    Reset(ResetSource),
    /// New scan-area height in pixels.
    Resized(f64),
    Connect,
    Quit,
}

/// Turns sampled mouse state into pointer events.  minifb only reports the
/// current button state and position, so press / release / leave are edges.
#[derive(Debug, Default)]
pub struct PointerTracker {
    was_down:   bool,
    was_inside: bool,
    last_pos:   Option<(f32, f32)>,
}

impl PointerTracker {
    pub fn update(
        &mut self,
        down:          bool,
        pos:           Option<(f32, f32)>,
        layout:        &Layout,
        reset_offered: bool,
    ) -> Vec<PanelInput> {
        let mut out = Vec::new();
        let inside = pos.map_or(false, |p| layout.scan.contains(p));

        if down && !self.was_down {
            let on_reset = reset_offered && pos.map_or(false, |p| layout.reset.contains(p));
            if on_reset {
                out.push(PanelInput::Reset(ResetSource::Control));
            } else if inside {
                out.push(PanelInput::Raw(RawInput::PointerDown));
            }
        } else if !down && self.was_down {
            out.push(PanelInput::Raw(RawInput::PointerUp));
        } else if down && inside && pos != self.last_pos {
            out.push(PanelInput::Raw(RawInput::PointerMove));
        }

        if self.was_inside && !inside {
            out.push(PanelInput::Raw(RawInput::PointerLeave));
        }

        self.was_down   = down;
        self.was_inside = inside;
        self.last_pos   = pos;
        out
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Panel
// ════════════════════════════════════════════════════════════════════════════

pub struct Panel {
    window:      Window,
    buf:         Vec<u32>,
    w:           usize,
    h:           usize,
    layout:      Layout,
    beam_height: usize,
    pointer:     PointerTracker,
    frame:       u64,
    sweep_from:  u64,
    last_sweep:  u32,
}

impl Panel {
    pub fn new(cfg: &PanelConfig, beam_height: f64) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "Palm Gate",
            cfg.width, cfg.height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )?;
        window.set_target_fps(60);

        Ok(Panel {
            window,
            buf:         vec![BG_COLOR; cfg.width * cfg.height],
            w:           cfg.width,
            h:           cfg.height,
            layout:      Layout::for_size(cfg.width, cfg.height),
            beam_height: beam_height.max(1.0).round() as usize,
            pointer:     PointerTracker::default(),
            frame:       0,
            sweep_from:  0,
            last_sweep:  0,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Height of the scan area, which is what the beam runs across.
    pub fn panel_height(&self) -> f64 { self.layout.scan.h as f64 }

    /// Collect this frame's input.
    pub fn poll(&mut self, view: &PanelView) -> Vec<PanelInput> {
        if !self.window.is_open() { return vec![PanelInput::Quit]; }
        let mut out = Vec::new();

        // ── Resize ────────────────────────────────────────────────────────
        let (w, h) = self.window.get_size();
        if (w, h) != (self.w, self.h) && w > 0 && h > 0 {
            self.w      = w;
            self.h      = h;
            self.layout = Layout::for_size(w, h);
            self.buf    = vec![BG_COLOR; w * h];
            out.push(PanelInput::Resized(self.panel_height()));
        }

        // ── Keys ──────────────────────────────────────────────────────────
        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        if one_shot(Key::Q) || one_shot(Key::Escape) {
            out.push(PanelInput::Quit);
            return out;
        }
        if one_shot(Key::R) { out.push(PanelInput::Reset(ResetSource::Keyboard)); }
        if one_shot(Key::C) { out.push(PanelInput::Connect); }

        // ── Mouse ─────────────────────────────────────────────────────────
        let down = self.window.get_mouse_down(MouseButton::Left);
        let pos  = self.window.get_mouse_pos(MouseMode::Discard);
        out.extend(self.pointer.update(down, pos, &self.layout, view.reset_control));

        out
    }

    /// Render one frame.
    pub fn render(&mut self, view: &PanelView, state: PanelState, status: &str) {
        self.frame += 1;
        if view.sweep_restarts != self.last_sweep {
            self.last_sweep = view.sweep_restarts;
            self.sweep_from = self.frame;
        }

        let w      = self.w;
        let scan   = self.layout.scan;
        self.buf.fill(BG_COLOR);

        // ── Header ────────────────────────────────────────────────────────
        self.fill_rect(0, 0, w, HEADER_H, HEADER_BG);
        self.draw_label("PALM GATE", 12, 12, 3, GOLD);
        let state_text = state_label(state);
        let sx = w.saturating_sub(label_width(state_text, 2) + 12);
        self.draw_label(state_text, sx, 14, 2, TEXT_FG);

        // ── Scan area ─────────────────────────────────────────────────────
        if view.scan_screen {
            self.fill_rect(scan.x, scan.y, scan.w, scan.h, SCAN_BG);
            if scan.h > 0 {
                let offset = ((self.frame - self.sweep_from) * 3) as usize % scan.h;
                self.fill_rect(scan.x, scan.y + offset, scan.w, 2, SWEEP_COLOR);
            }
            self.draw_border(scan.x, scan.y, scan.w, scan.h, SCAN_BORDER);
        }

        if view.idle_prompt {
            self.draw_hand(scan);
            self.draw_centered("PLACE PALM ON PANEL", scan.y + scan.h / 2 + 70, 2, TEXT_FG);
        }

        if let Some(pos) = view.beam {
            let y = scan.y + pos.max(0.0).round() as usize;
            let bottom = scan.y + scan.h;
            if y < bottom {
                let h = self.beam_height.min(bottom - y);
                self.fill_rect(scan.x, y, scan.w, h, BEAM_COLOR);
                self.fill_rect(scan.x, y + h / 2, scan.w, 1, 0xFFFFFFFF);
            }
        }

        if view.granted {
            self.fill_rect(scan.x, scan.y, scan.w, scan.h, GRANTED_BG);
            self.draw_centered("ACCESS GRANTED", scan.y + scan.h / 2 - 10, 3, GRANTED_FG);
        }

        if view.started {
            self.draw_centered("BATTLE STARTED", scan.y + scan.h / 3, 3, GOLD);
        }

        if view.reset_control {
            let r = self.layout.reset;
            self.fill_rect(r.x, r.y, r.w, r.h, TEXT_BG);
            self.draw_border(r.x, r.y, r.w, r.h, GOLD);
            let lx = r.x + r.w.saturating_sub(label_width("RESET", 2)) / 2;
            self.draw_label("RESET", lx, r.y + (r.h - 10) / 2, 2, GOLD);
        }

        if view.error {
            let bw = (scan.w * 3 / 4).max(1);
            let bx = scan.x + (scan.w - bw) / 2;
            let by = scan.y + scan.h / 2 - 40;
            self.fill_rect(bx, by, bw, 80, ERROR_BG);
            self.draw_border(bx, by, bw, 80, ERROR_FG);
            self.draw_centered("SCAN FAILED", by + 18, 3, ERROR_FG);
            self.draw_centered("TRY AGAIN", by + 50, 2, TEXT_FG);
        }

        // ── Status bar ────────────────────────────────────────────────────
        let sy = self.layout.status_y;
        self.fill_rect(0, sy, w, STATUS_H, TEXT_BG);
        self.draw_label(status, 10, sy + 8, 1, TEXT_FG);
        self.draw_label("HOLD MOUSE=SCAN  R=RESET  C=CONNECT  Q=QUIT", 10, sy + 24, 1, LEGEND_FG);

        if let Err(e) = self.window.update_with_buffer(&self.buf, self.w, self.h) {
            tracing::warn!(error = %e, "panel frame dropped");
        }
    }

    // ── Shapes ────────────────────────────────────────────────────────────

    fn draw_hand(&mut self, scan: Rect) {
        let cx = scan.x + scan.w / 2;
        let cy = scan.y + scan.h / 2;
        if cx < 60 || cy < 80 { return; }

        // Palm, four fingers, thumb.
        self.draw_border(cx - 40, cy - 10, 80, 70, SCAN_BORDER);
        for i in 0..4 {
            let fx = cx - 40 + i * 20 + 3;
            self.draw_border(fx, cy - 70, 14, 60, SCAN_BORDER);
        }
        self.draw_border(cx + 40, cy + 5, 40, 14, SCAN_BORDER);
    }

    fn draw_centered(&mut self, text: &str, y: usize, scale: usize, color: u32) {
        let x = self.w.saturating_sub(label_width(text, scale)) / 2;
        self.draw_label(text, x, y, scale, color);
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.h) {
            for col in x..(x + w).min(self.w) {
                self.buf[row * self.w + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..x + w {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..y + h {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.w && y < self.h {
            self.buf[y * self.w + x] = color;
        }
    }

    /// Minimal bitmap font: 3×5 glyphs, each pixel drawn as a `scale`² block.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            if cx + 4 * scale > self.w { break; }
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
        }
    }
}

fn state_label(state: PanelState) -> &'static str {
    match state {
        PanelState::Idle     => "READY",
        PanelState::Scanning => "SCANNING",
        PanelState::Granted  => "GRANTED",
        PanelState::Started  => "STARTED",
        PanelState::Locked   => "LOCKED",
    }
}

fn label_width(text: &str, scale: usize) -> usize {
    text.chars().count() * 4 * scale
}

// ────────────────────────────────────────────────────────────────────────────
// 3×5 status font
// ────────────────────────────────────────────────────────────────────────────

/// Drawn for anything not in [`FONT`].
const MISSING: [u8; 5] = [0b111, 0b101, 0b101, 0b101, 0b111];

/// Upper case only; lookups fold case first.  Covers what the status line
/// prints: port paths, error text and the reconnect hint.
const FONT: &[(char, [u8; 5])] = &[
    (' ', [0b000, 0b000, 0b000, 0b000, 0b000]),
    ('0', [0b010, 0b101, 0b111, 0b101, 0b010]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b110, 0b001, 0b010, 0b100, 0b111]),
    ('3', [0b110, 0b001, 0b010, 0b001, 0b110]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b110, 0b001, 0b110]),
    ('6', [0b011, 0b100, 0b111, 0b101, 0b111]),
    ('7', [0b111, 0b001, 0b010, 0b010, 0b010]),
    ('8', [0b111, 0b101, 0b111, 0b101, 0b111]),
    ('9', [0b111, 0b101, 0b111, 0b001, 0b110]),
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b110, 0b100, 0b110, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    ('!', [0b010, 0b010, 0b010, 0b000, 0b010]),
    ('?', [0b110, 0b001, 0b010, 0b000, 0b010]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    ('_', [0b000, 0b000, 0b000, 0b000, 0b111]),
    ('=', [0b000, 0b111, 0b000, 0b111, 0b000]),
    ('/', [0b001, 0b001, 0b010, 0b100, 0b100]),
    ('\\', [0b100, 0b100, 0b010, 0b001, 0b001]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('\'', [0b010, 0b010, 0b000, 0b000, 0b000]),
    ('"', [0b101, 0b101, 0b000, 0b000, 0b000]),
];

fn char_glyph(c: char) -> [u8; 5] {
    let c = c.to_ascii_uppercase();
    FONT.iter()
        .find(|(k, _)| *k == c)
        .map_or(MISSING, |(_, rows)| *rows)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout { Layout::for_size(420, 560) }

    #[test]
    fn status_text_has_glyphs_in_either_case() {
        let status = "Door link lost: START_DOOR failed (press C to reconnect) /dev/ttyACM0, COM3=ok?";
        for ch in status.chars() {
            assert_ne!(char_glyph(ch), MISSING, "no glyph for {:?}", ch);
        }
        assert_eq!(char_glyph('q'), char_glyph('Q'));
        assert_eq!(char_glyph('~'), MISSING);
    }

    #[test]
    fn scan_area_excludes_header_and_status() {
        let l = layout();
        assert_eq!(l.scan, Rect { x: 0, y: 40, w: 420, h: 480 });
        assert_eq!(l.status_y, 520);
        assert!(l.scan.contains((l.reset.x as f32, l.reset.y as f32)));
    }

    #[test]
    fn tiny_window_has_empty_scan_area() {
        assert_eq!(Layout::for_size(100, 50).scan.h, 0);
    }

    #[test]
    fn press_drag_leave_release() {
        let l = layout();
        let mut p = PointerTracker::default();
        let raw = |r| PanelInput::Raw(r);

        assert!(p.update(false, Some((10.0, 100.0)), &l, false).is_empty());
        assert_eq!(p.update(true,  Some((10.0, 100.0)), &l, false), vec![raw(RawInput::PointerDown)]);
        assert!(p.update(true, Some((10.0, 100.0)), &l, false).is_empty());
        assert_eq!(p.update(true,  Some((12.0, 110.0)), &l, false), vec![raw(RawInput::PointerMove)]);
        assert_eq!(p.update(true,  Some((12.0, 10.0)),  &l, false), vec![raw(RawInput::PointerLeave)]);
        assert_eq!(p.update(false, None, &l, false), vec![raw(RawInput::PointerUp)]);
    }

    #[test]
    fn press_outside_scan_area_is_not_contact() {
        let l = layout();
        let mut p = PointerTracker::default();
        assert!(p.update(true, Some((10.0, 10.0)), &l, false).is_empty());
    }

    #[test]
    fn reset_control_only_when_offered() {
        let l = layout();
        let on_button = ((l.reset.x + 5) as f32, (l.reset.y + 5) as f32);

        let mut p = PointerTracker::default();
        assert_eq!(
            p.update(true, Some(on_button), &l, true),
            vec![PanelInput::Reset(ResetSource::Control)]
        );

        let mut p = PointerTracker::default();
        assert_eq!(
            p.update(true, Some(on_button), &l, false),
            vec![PanelInput::Raw(RawInput::PointerDown)]
        );
    }
}
