//! # door_link
//!
//! Write-mostly command link to the door actuator.
//!
//! Commands are short uppercase tokens terminated by a single `\n`:
//!
//! | Command | Frame |
//! |---|---|
//! | [`DoorCommand::StartDoor`] | `START_DOOR\n` |
//! | [`DoorCommand::CloseDoor`] | `CLOSE_DOOR\n` |
//!
//! Nothing the device sends back is parsed for control purposes.  Inbound
//! text is split into lines and surfaced as diagnostics only.
//!
//! ## Layers
//!
//! * [`CommandChannel`] — owns the writer half of an opened [`Transport`] and
//!   a background read loop.
//! * [`Dispatcher`] — worker thread that owns a `CommandChannel` so the UI
//!   loop never blocks on a write.  Implements [`DoorLink`].
//! * [`SerialTransport`] — real serial port via the `serialport` crate.
//! * [`memory::MemoryTransport`] — in-memory transport for tests.

pub mod error;
pub mod command;
pub mod channel;
pub mod serial;
pub mod memory;
pub mod dispatcher;

pub use error::TransportError;
pub use command::{DoorCommand, UnknownCommand};
pub use channel::{CommandChannel, Connected, Halves, Inbound, Transport};
pub use serial::{SerialTransport, PortSummary, list_ports, DEFAULT_BAUD};
pub use dispatcher::{Dispatcher, DoorLink, LinkEvent};
