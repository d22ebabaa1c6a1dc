//! Device channel: one open HID handle and its perpetual read loop.
//!
//! Lifecycle: `Closed → Opening → Connected → {Removed, Disposed}`, with
//! `Removed → Disposed` always following a removal. A dedicated reader thread
//! keeps exactly one read outstanding and issues the next one as soon as the
//! previous report has been handed to the [`ReportSink`], whatever the sink did
//! with it. The loop ends only on a read failure (the device went away) or on
//! disposal.
//!
//! Handle release is guarded by a single `closing` flag: whichever of the
//! removal path and [`DeviceChannel::dispose`] sets it first performs the
//! release, the other returns immediately.

use crate::error::{Error, Result};
use crate::transport::{DeviceCapabilities, DeviceDescriptor, HidBackend, HidHandle};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Default upper bound on a single blocking read before the reader re-checks
/// for disposal.
pub const DEFAULT_READ_POLL_MS: i32 = 50;

/// Name given to reader threads.
const READER_THREAD_NAME: &str = "buzz-reader";

/// Lifecycle state of a [`DeviceChannel`].
///
/// `Closed` and `Opening` describe a device before [`DeviceChannel::open`]
/// returns; a constructed channel starts at `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Closed = 0,
    Opening = 1,
    Connected = 2,
    Removed = 3,
    Disposed = 4,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Opening,
            2 => Self::Connected,
            3 => Self::Removed,
            4 => Self::Disposed,
            _ => Self::Closed,
        }
    }
}

/// Receives everything the reader thread produces.
///
/// Both methods run on the reader thread. A panic in `on_report` is logged and
/// the next read is issued regardless.
pub trait ReportSink: Send + 'static {
    /// A complete input report of exactly `input_report_len` bytes.
    fn on_report(&mut self, report: &[u8]);

    /// The device stopped answering. Called at most once, and nothing is
    /// delivered afterwards.
    fn on_removed(&mut self);
}

/// Builds the "all outputs off" report written when a connected channel is
/// disposed.
pub type Farewell = Box<dyn Fn(&DeviceCapabilities) -> Option<Vec<u8>> + Send + Sync>;

/// Options fixed at open time.
pub struct ChannelOptions {
    /// Maximum time a single read blocks, in milliseconds.
    pub read_poll_ms: i32,
    /// Shortest input report length the sink can use.
    pub min_input_report_len: usize,
    /// Shortest output report length the caller will write.
    pub min_output_report_len: usize,
    /// Report written on disposal while still connected.
    pub farewell: Option<Farewell>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            read_poll_ms: DEFAULT_READ_POLL_MS,
            min_input_report_len: 1,
            min_output_report_len: 1,
            farewell: None,
        }
    }
}

struct Shared {
    path: String,
    handle: Box<dyn HidHandle>,
    caps: DeviceCapabilities,
    state: AtomicU8,
    closing: AtomicBool,
    farewell: Option<Farewell>,
}

impl Shared {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Connected → Removed`. Returns true if this call made the transition.
    fn mark_removed(&self) -> bool {
        self.state
            .compare_exchange(
                ChannelState::Connected as u8,
                ChannelState::Removed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn write(&self, buf: &[u8]) -> Result<()> {
        if buf.len() != self.caps.output_report_len {
            return Err(Error::ReportLength {
                expected: self.caps.output_report_len,
                actual: buf.len(),
            });
        }

        if self.is_closing() || self.state() != ChannelState::Connected {
            debug!(path = %self.path, state = ?self.state(), "Dropping write to disconnected device");
            return Ok(());
        }

        match self.handle.write(buf) {
            Ok(_) => {
                trace!(report_hex = format_args!("{:02X?}", buf), "HID TX");
            }
            Err(e) => {
                if self.mark_removed() {
                    warn!(path = %self.path, error = %e, "Write failed, device no longer connected");
                }
            }
        }
        Ok(())
    }

    /// Release the handle once. Returns false if another path already did.
    fn release(&self) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            return false;
        }

        if self.state() == ChannelState::Connected {
            if let Some(farewell) = &self.farewell {
                let sent = panic::catch_unwind(AssertUnwindSafe(|| {
                    farewell(&self.caps).map(|report| self.handle.write(&report))
                }));
                match sent {
                    Ok(Some(Err(e))) => {
                        debug!(path = %self.path, error = %e, "Farewell report not delivered");
                    }
                    Err(_) => warn!(path = %self.path, "Farewell report builder panicked"),
                    Ok(_) => {}
                }
            }
        }

        self.handle.close();
        self.state
            .store(ChannelState::Disposed as u8, Ordering::Release);
        info!(path = %self.path, "HID handle released");
        true
    }
}

/// One open HID device and its reader thread.
pub struct DeviceChannel {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceChannel {
    /// Open `descriptor`, query its capabilities once, and arm the first read.
    ///
    /// Every report from then on goes to `sink` until the device is removed or
    /// the channel is disposed.
    pub fn open(
        backend: &dyn HidBackend,
        descriptor: DeviceDescriptor,
        sink: Box<dyn ReportSink>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let path = descriptor.path;
        debug!(path = %path, state = ?ChannelState::Opening, "Opening HID device");

        let handle = backend.open(&path)?;
        let caps = match handle.capabilities() {
            Ok(caps) => caps,
            Err(e) => {
                handle.close();
                return Err(Error::Open {
                    path,
                    reason: format!("capability query failed: {e}"),
                });
            }
        };
        let min_input = options.min_input_report_len.max(1);
        let min_output = options.min_output_report_len.max(1);
        if caps.input_report_len < min_input || caps.output_report_len < min_output {
            handle.close();
            return Err(Error::Open {
                path,
                reason: format!(
                    "report lengths {}/{} below the required {min_input}/{min_output}",
                    caps.input_report_len, caps.output_report_len
                ),
            });
        }

        info!(
            path = %path,
            product = %caps.product,
            vid = format_args!("0x{:04X}", descriptor.vendor_id),
            pid = format_args!("0x{:04X}", descriptor.product_id),
            input_len = caps.input_report_len,
            output_len = caps.output_report_len,
            "HID device connected"
        );

        let shared = Arc::new(Shared {
            path,
            handle,
            caps,
            state: AtomicU8::new(ChannelState::Connected as u8),
            closing: AtomicBool::new(false),
            farewell: options.farewell,
        });

        let reader_shared = Arc::clone(&shared);
        let poll_ms = options.read_poll_ms.max(1);
        let reader = thread::Builder::new()
            .name(READER_THREAD_NAME.into())
            .spawn(move || read_loop(reader_shared, sink, poll_ms))
            .map_err(|e| {
                shared.release();
                Error::Open {
                    path: shared.path.clone(),
                    reason: format!("failed to start reader thread: {e}"),
                }
            })?;

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Capabilities queried at open time.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.shared.caps
    }

    /// Platform path the channel was opened on.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Send one output report of exactly `output_report_len` bytes.
    ///
    /// Best effort: an I/O failure marks the channel as no longer connected
    /// but is not returned. Writes after removal or disposal are dropped. The
    /// only error is a buffer of the wrong length.
    pub fn write(&self, buf: &[u8]) -> Result<()> {
        self.shared.write(buf)
    }

    /// Write the farewell report if still connected, then release the handle.
    ///
    /// Safe to call repeatedly, after removal, and concurrently with the
    /// reader's own removal handling.
    pub fn dispose(&self) {
        if self.shared.release() {
            debug!(path = %self.shared.path, "Channel disposed");
        }
        self.join_reader();
    }

    fn join_reader(&self) {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(reader) = reader else {
            return;
        };
        // Disposing from inside a sink callback: the thread exits on its own.
        if reader.thread().id() == thread::current().id() {
            return;
        }
        if reader.join().is_err() {
            warn!(path = %self.shared.path, "Reader thread panicked");
        }
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn read_loop(shared: Arc<Shared>, mut sink: Box<dyn ReportSink>, poll_ms: i32) {
    let len = shared.caps.input_report_len;
    debug!(path = %shared.path, "Reader started");

    loop {
        if shared.is_closing() {
            debug!(path = %shared.path, "Reader stopping: channel disposed");
            return;
        }

        let mut buf = vec![0u8; len];
        match shared.handle.read(&mut buf, poll_ms) {
            Ok(0) => continue,
            Ok(n) => {
                trace!(len = n, report_hex = format_args!("{:02X?}", buf), "HID RX");
                if panic::catch_unwind(AssertUnwindSafe(|| sink.on_report(&buf))).is_err() {
                    warn!(path = %shared.path, "Report consumer panicked, continuing");
                }
            }
            Err(e) => {
                if shared.is_closing() {
                    debug!(path = %shared.path, error = %e, "Read ended by disposal");
                    return;
                }
                shared.mark_removed();
                info!(path = %shared.path, error = %e, "Read failed, device removed");
                if panic::catch_unwind(AssertUnwindSafe(|| sink.on_removed())).is_err() {
                    warn!(path = %shared.path, "Removal consumer panicked");
                }
                shared.release();
                return;
            }
        }
    }
}
