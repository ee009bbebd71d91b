//! Command-dispatch worker thread.
//!
//! The UI loop must never block on a serial write, so the [`CommandChannel`]
//! lives on its own thread.  Requests go in over one channel; completions and
//! inbound device lines come back over another and are drained once per
//! frame.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::channel::{CommandChannel, Inbound, Transport};
use crate::command::DoorCommand;
use crate::error::TransportError;

// ════════════════════════════════════════════════════════════════════════════
// Request / LinkEvent
// ════════════════════════════════════════════════════════════════════════════

enum Request {
    Connect(Box<dyn Transport>),
    Send(DoorCommand),
    Disconnect,
    Quit,
}

/// Something the link wants the UI loop to know about.
#[derive(Debug)]
pub enum LinkEvent {
    Connected { port: String },
    ConnectFailed(TransportError),
    /// Exactly one of these follows every [`DoorLink::submit`].
    SendCompleted {
        command: DoorCommand,
        result:  Result<(), TransportError>,
    },
    /// A trimmed, non-empty line from the device.
    Inbound(String),
    /// The device on `port` hung up or stopped reading.  Not sent for a
    /// channel closed through [`DoorLink::disconnect`].
    Disconnected {
        port:  String,
        error: Option<TransportError>,
    },
}

// ════════════════════════════════════════════════════════════════════════════
// DoorLink — what the gate needs from a link
// ════════════════════════════════════════════════════════════════════════════

/// Asynchronous command link as seen by the gate.
pub trait DoorLink {
    /// Open `transport`; answered later by `Connected` or `ConnectFailed`.
    fn connect(&mut self, transport: Box<dyn Transport>);

    /// Queue a command; answered later by exactly one `SendCompleted`.
    fn submit(&mut self, command: DoorCommand);

    /// Drop the open channel; later submits complete with `NotConnected`.
    fn disconnect(&mut self);

    /// Non-blocking drain of everything that has happened since last call.
    fn drain(&mut self) -> Vec<LinkEvent>;
}

// ════════════════════════════════════════════════════════════════════════════
// Dispatcher
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the link worker thread.
pub struct Dispatcher {
    req_tx:   Sender<Request>,
    event_rx: Receiver<LinkEvent>,
    /// Events synthesised on this side when the worker is unreachable.
    local:    Vec<LinkEvent>,
    handle:   Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the worker with a fresh, unconnected channel.
    pub fn spawn() -> Self {
        let (req_tx, req_rx)     = mpsc::channel::<Request>();
        let (event_tx, event_rx) = mpsc::channel::<LinkEvent>();

        let handle = thread::Builder::new()
            .name("door-link".into())
            .spawn(move || worker(req_rx, event_tx))
            .map_err(|e| tracing::error!(error = %e, "failed to spawn door link worker"))
            .ok();

        Dispatcher { req_tx, event_rx, local: Vec::new(), handle }
    }

    /// Block up to `timeout` for the next event.
    pub fn next_event(&mut self, timeout: Duration) -> Option<LinkEvent> {
        if !self.local.is_empty() {
            return Some(self.local.remove(0));
        }
        match self.event_rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop the worker and wait for it.
    pub fn quit(&mut self) {
        let _ = self.req_tx.send(Request::Quit);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl DoorLink for Dispatcher {
    fn connect(&mut self, transport: Box<dyn Transport>) {
        if self.req_tx.send(Request::Connect(transport)).is_err() {
            self.local.push(LinkEvent::ConnectFailed(TransportError::WorkerGone));
        }
    }

    fn submit(&mut self, command: DoorCommand) {
        if self.req_tx.send(Request::Send(command)).is_err() {
            tracing::warn!(%command, "door link worker gone; command dropped");
            self.local.push(LinkEvent::SendCompleted {
                command,
                result: Err(TransportError::WorkerGone),
            });
        }
    }

    fn disconnect(&mut self) {
        let _ = self.req_tx.send(Request::Disconnect);
    }

    fn drain(&mut self) -> Vec<LinkEvent> {
        let mut out = std::mem::take(&mut self.local);
        while let Ok(ev) = self.event_rx.try_recv() { out.push(ev); }
        out
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) { self.quit(); }
}

// ════════════════════════════════════════════════════════════════════════════
// worker — the actual loop
// ════════════════════════════════════════════════════════════════════════════

fn worker(req_rx: Receiver<Request>, event_tx: Sender<LinkEvent>) {
    let mut channel = CommandChannel::new();

    for req in req_rx {
        let event = match req {
            Request::Connect(transport) => {
                let inbound_tx = event_tx.clone();
                let port       = transport.name();
                let on_inbound = move |inbound: Inbound| {
                    let event = match inbound {
                        Inbound::Line(line)    => LinkEvent::Inbound(line),
                        Inbound::Closed(error) => LinkEvent::Disconnected {
                            port:  port.clone(),
                            error: error.map(TransportError::Io),
                        },
                    };
                    let _ = inbound_tx.send(event);
                };
                match channel.connect(transport, on_inbound) {
                    Ok(c)  => LinkEvent::Connected { port: c.port },
                    Err(e) => {
                        tracing::warn!(error = %e, "door link connect failed");
                        LinkEvent::ConnectFailed(e)
                    }
                }
            }
            Request::Send(command) => {
                let result = channel.send(command);
                LinkEvent::SendCompleted { command, result }
            }
            Request::Disconnect => { channel.disconnect(); continue; }
            Request::Quit       => return,
        };
        if event_tx.send(event).is_err() { return; }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
