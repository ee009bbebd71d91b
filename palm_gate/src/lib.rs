//! # palm_gate
//!
//! Palm-scan kiosk gate.  A visitor holds a palm on the panel while a beam
//! sweeps up from the bottom edge; if contact holds until the beam reaches
//! the top, the gate sends `START_DOOR` to the door actuator.  An operator
//! reset sends `CLOSE_DOOR` and re-arms the panel.
//!
//! ## States
//!
//! | State | Panel shows | Leaves on |
//! |---|---|---|
//! | Idle | hand prompt | contact |
//! | Scanning | beam | beam reaches top (granted) or bottom (failed) |
//! | Granted | "access granted" | `START_DOOR` completion + 3.8 s |
//! | Started | "battle started" + reset control | reset |
//! | Locked | error, or nothing while resetting | timed unlock |
//!
//! A missing or failing door link never stalls the cycle: the gate logs the
//! failure, speaks a fallback line and carries on.
//!
//! ## Panel keys
//!
//! | Key | Action |
//! |---|---|
//! | hold left mouse | palm contact |
//! | `R` | reset |
//! | `C` | connect the door link |
//! | `Q` / `Escape` | quit |

pub mod config;
pub mod timers;
pub mod input;
pub mod scanner;
pub mod voice;
pub mod panel;
pub mod telemetry;
pub mod app;
