//! In-memory transport, for tests and dry runs.

use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::channel::{Halves, Transport};
use crate::error::TransportError;

/// Bytes written to a [`MemoryTransport`], readable after the fact.
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(data);
        Ok(data.len())
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// Unplugs a [`MemoryTransport`] from the outside.
#[derive(Clone, Default, Debug)]
pub struct HangUp(Arc<AtomicBool>);

impl HangUp {
    /// Once the inbound script is exhausted the reader sees EOF.
    pub fn hang_up(&self) { self.0.store(true, Ordering::Release); }

    fn is_down(&self) -> bool { self.0.load(Ordering::Acquire) }
}

// Like a serial port with a read timeout: idles with `TimedOut` until hung up.
struct ScriptedReader {
    script:  Cursor<Vec<u8>>,
    hang_up: HangUp,
}

const IDLE_POLL: Duration = Duration::from_millis(10);

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.script.read(buf)?;
        if n > 0 || self.hang_up.is_down() {
            return Ok(n);
        }
        thread::sleep(IDLE_POLL);
        Err(io::Error::new(ErrorKind::TimedOut, "no inbound data"))
    }
}

/// A transport whose device "sends" a fixed byte script and records every
/// write.  The line stays up after the script until [`HangUp::hang_up`].
#[derive(Default)]
pub struct MemoryTransport {
    inbound:     Vec<u8>,
    written:     SharedBuffer,
    hang_up:     HangUp,
    fail_writes: bool,
}

impl MemoryTransport {
    pub fn new() -> Self { Self::default() }

    pub fn with_inbound(bytes: &[u8]) -> Self {
        MemoryTransport { inbound: bytes.to_vec(), ..Self::default() }
    }

    /// Every write fails with `BrokenPipe`.
    pub fn failing_writes() -> Self {
        MemoryTransport { fail_writes: true, ..Self::default() }
    }

    /// Handle to everything written through this transport.
    pub fn written(&self) -> SharedBuffer { self.written.clone() }

    pub fn hang_up_handle(&self) -> HangUp { self.hang_up.clone() }
}

impl Transport for MemoryTransport {
    fn name(&self) -> String { "memory".to_string() }

    fn open(self: Box<Self>) -> Result<Halves, TransportError> {
        let writer: Box<dyn Write + Send> = if self.fail_writes {
            Box::new(BrokenPipe)
        } else {
            Box::new(self.written.clone())
        };
        Ok(Halves {
            reader: Box::new(ScriptedReader {
                script:  Cursor::new(self.inbound),
                hang_up: self.hang_up,
            }),
            writer,
        })
    }
}
