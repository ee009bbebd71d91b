//! The command channel: one writer, one background reader.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::command::DoorCommand;
use crate::error::TransportError;

// ════════════════════════════════════════════════════════════════════════════
// Transport — anything that opens into a reader/writer pair
// ════════════════════════════════════════════════════════════════════════════

/// The two halves of an opened link.
pub struct Halves {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

/// A device link that can be opened once.
pub trait Transport: Send + 'static {
    /// Human-readable name (port path, `memory`, …).
    fn name(&self) -> String;

    fn open(self: Box<Self>) -> Result<Halves, TransportError>;
}

/// What the read loop hands to its callback.
#[derive(Debug)]
pub enum Inbound {
    /// A trimmed, non-empty line.
    Line(String),
    /// The device hung up (`None`) or a read failed.  Never sent once
    /// [`CommandChannel::disconnect`] has stopped the loop.
    Closed(Option<io::Error>),
}

/// Returned by a successful [`CommandChannel::connect`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connected {
    pub port: String,
}

// ════════════════════════════════════════════════════════════════════════════
// CommandChannel
// ════════════════════════════════════════════════════════════════════════════

/// Fire-and-forget command link.
///
/// `send` before `connect` fails with [`TransportError::NotConnected`].
/// Reconnecting replaces the writer and stops the previous read loop.
#[derive(Default)]
pub struct CommandChannel {
    writer: Option<Box<dyn Write + Send>>,
    port:   Option<String>,
    reader: Option<ReadLoop>,
}

struct ReadLoop {
    stop:   Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl CommandChannel {
    pub fn new() -> Self { Self::default() }

    pub fn is_connected(&self) -> bool { self.writer.is_some() }

    pub fn port(&self) -> Option<&str> { self.port.as_deref() }

    /// Open `transport`, keep its writer and start a read loop that hands
    /// every inbound line, and finally the hang-up, to `on_inbound`.
    pub fn connect<F>(
        &mut self,
        transport:  Box<dyn Transport>,
        on_inbound: F,
    ) -> Result<Connected, TransportError>
    where
        F: FnMut(Inbound) + Send + 'static,
    {
        let port = transport.name();
        let Halves { reader, writer } = transport.open()?;

        self.disconnect();

        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);
        let loop_port = port.clone();
        let handle = thread::Builder::new()
            .name("door-link-reader".into())
            .spawn(move || read_loop(reader, loop_stop, &loop_port, on_inbound))?;

        tracing::info!(port = %port, "door link connected");
        self.writer = Some(writer);
        self.port   = Some(port.clone());
        self.reader = Some(ReadLoop { stop, handle });
        Ok(Connected { port })
    }

    /// Write one command frame atomically.
    pub fn send(&mut self, command: DoorCommand) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        writer.write_all(&command.frame())?;
        writer.flush()?;
        tracing::debug!(%command, "sent door command");
        Ok(())
    }

    /// Drop the writer and ask the read loop to stop.
    pub fn disconnect(&mut self) {
        self.writer = None;
        if let Some(port) = self.port.take() {
            tracing::info!(port = %port, "door link disconnected");
        }
        if let Some(ReadLoop { stop, handle }) = self.reader.take() {
            stop.store(true, Ordering::Relaxed);
            // A reader blocked without a timeout never sees the flag; leave it
            // to finish on EOF rather than joining here.
            drop(handle);
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) { self.disconnect(); }
}

// ════════════════════════════════════════════════════════════════════════════
// read_loop
// ════════════════════════════════════════════════════════════════════════════

/// Longest unterminated run kept before it is surfaced as a line anyway.
const MAX_PENDING: usize = 4096;

/// Decode inbound bytes as UTF-8 and surface trimmed, non-empty lines.
///
/// Returns on EOF, on a hard read error, or once `stop` is set (checked
/// whenever the transport times out).  EOF and read errors are reported as
/// [`Inbound::Closed`] unless the loop was stopped.
fn read_loop<F>(mut reader: Box<dyn Read + Send>, stop: Arc<AtomicBool>, port: &str, mut on_inbound: F)
where
    F: FnMut(Inbound),
{
    let mut buf     = [0u8; 256];
    let mut pending = String::new();
    let mut closed  = None;

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => {
                closed = Some(None);
                break;
            }
            Ok(n) => {
                pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                while let Some(idx) = pending.find('\n') {
                    let line: String = pending.drain(..=idx).collect();
                    emit_line(&line, port, &mut on_inbound);
                }
                if pending.len() > MAX_PENDING {
                    tracing::warn!(port = %port, bytes = pending.len(), "unterminated inbound data; flushing");
                    emit_line(&pending, port, &mut on_inbound);
                    pending.clear();
                }
            }
            Err(e) if matches!(
                e.kind(),
                ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock
            ) => continue,
            Err(e) => {
                tracing::warn!(port = %port, error = %e, "door link read failed");
                closed = Some(Some(e));
                break;
            }
        }
    }

    emit_line(&pending, port, &mut on_inbound);

    if let Some(error) = closed {
        if !stop.load(Ordering::Relaxed) {
            tracing::info!(port = %port, "door link closed by device");
            on_inbound(Inbound::Closed(error));
        }
    }
}

fn emit_line<F: FnMut(Inbound)>(raw: &str, port: &str, on_inbound: &mut F) {
    let line = raw.trim();
    if line.is_empty() { return; }
    tracing::info!(port = %port, line = %line, "device says");
    on_inbound(Inbound::Line(line.to_string()));
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn send_before_connect_is_not_connected() {
        let mut ch = CommandChannel::new();
        let err = ch.send(DoorCommand::StartDoor).unwrap_err();
        assert!(err.is_not_connected());
    }

    #[test]
    fn send_writes_one_frame_per_command() {
        let transport = MemoryTransport::new();
        let written = transport.written();
        let mut ch = CommandChannel::new();
        let connected = ch.connect(Box::new(transport), |_| {}).unwrap();
        assert_eq!(connected.port, "memory");
        assert!(ch.is_connected());

        ch.send(DoorCommand::StartDoor).unwrap();
        ch.send(DoorCommand::CloseDoor).unwrap();
        assert_eq!(written.contents(), b"START_DOOR\nCLOSE_DOOR\n".to_vec());
    }

    #[test]
    fn write_failure_maps_to_io() {
        let mut ch = CommandChannel::new();
        ch.connect(Box::new(MemoryTransport::failing_writes()), |_| {}).unwrap();
        let err = ch.send(DoorCommand::CloseDoor).unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    /// Connect, hang up once the script is read, and collect everything the
    /// read loop reported.
    fn run_script(transport: MemoryTransport) -> (Vec<String>, Vec<Option<io::Error>>) {
        let plug = transport.hang_up_handle();
        let (tx, rx) = mpsc::channel();
        let mut ch = CommandChannel::new();
        ch.connect(Box::new(transport), move |inbound| { let _ = tx.send(inbound); }).unwrap();
        plug.hang_up();

        let (mut lines, mut closed) = (Vec::new(), Vec::new());
        while let Ok(inbound) = rx.recv_timeout(Duration::from_secs(2)) {
            match inbound {
                Inbound::Line(line)    => lines.push(line),
                Inbound::Closed(error) => closed.push(error),
            }
        }
        (lines, closed)
    }

    #[test]
    fn read_loop_surfaces_trimmed_lines() {
        let (lines, closed) = run_script(
            MemoryTransport::with_inbound(b"  ready \r\n\nDOOR OPEN\npartial"),
        );
        assert_eq!(lines, vec!["ready", "DOOR OPEN", "partial"]);
        assert_eq!(closed.len(), 1);
        assert!(closed[0].is_none());
    }

    #[test]
    fn unterminated_input_is_flushed_past_the_cap() {
        let (lines, _) = run_script(MemoryTransport::with_inbound(&[b'x'; 5000]));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].len() > MAX_PENDING);
        assert!(lines[0].len() < MAX_PENDING + 256 + 1);
        assert_eq!(lines.iter().map(String::len).sum::<usize>(), 5000);
    }

    #[test]
    fn no_closed_report_after_disconnect() {
        let transport = MemoryTransport::new();
        let plug = transport.hang_up_handle();
        let (tx, rx) = mpsc::channel();
        let mut ch = CommandChannel::new();
        ch.connect(Box::new(transport), move |inbound| { let _ = tx.send(inbound); }).unwrap();

        ch.disconnect();
        plug.hang_up();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }

    #[test]
    fn disconnect_drops_writer() {
        let mut ch = CommandChannel::new();
        ch.connect(Box::new(MemoryTransport::new()), |_| {}).unwrap();
        ch.disconnect();
        assert!(!ch.is_connected());
        assert_eq!(ch.port(), None);
        assert!(ch.send(DoorCommand::StartDoor).unwrap_err().is_not_connected());
    }
}
