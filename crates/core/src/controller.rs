//! Buzz! controller: one device channel bound to the Buzz! report codec.
//!
//! Decoded snapshots and the removal signal are published to every
//! [`subscribe`](BuzzController::subscribe)r as [`BuzzEvent`]s. Each snapshot
//! carries all four handsets, not a delta; consumers diff against the last one
//! they saw if they need edges.

use crate::channel::{ChannelOptions, ChannelState, DeviceChannel, ReportSink};
use crate::config::BuzzConfig;
use crate::enumerate;
use crate::error::{Error, Result};
use crate::report::{self, ButtonSnapshot, LightStates};
use crate::transport::{DeviceCapabilities, DeviceDescriptor, HidBackend};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Something that happened on a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzEvent {
    /// A fresh input report was decoded.
    Buttons(ButtonSnapshot),
    /// The device is gone; no further events follow.
    Removed,
}

#[derive(Default)]
struct Subscribers {
    senders: Mutex<Vec<Sender<BuzzEvent>>>,
}

impl Subscribers {
    fn add(&self) -> Receiver<BuzzEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver to every live subscriber, dropping those that hung up.
    fn publish(&self, event: BuzzEvent) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event).is_ok());
    }
}

/// Decodes raw reports on the reader thread and fans them out.
struct DecodingSink {
    subscribers: Arc<Subscribers>,
}

impl ReportSink for DecodingSink {
    fn on_report(&mut self, raw: &[u8]) {
        match report::decode_input(raw) {
            Ok(snapshot) => {
                trace!(?snapshot, "Decoded Buzz report");
                self.subscribers.publish(BuzzEvent::Buttons(snapshot));
            }
            Err(e) => warn!(error = %e, "Dropping undecodable input report"),
        }
    }

    fn on_removed(&mut self) {
        self.subscribers.publish(BuzzEvent::Removed);
    }
}

/// An open Buzz! controller (one USB device, four handsets).
///
/// Dropping it turns all lights off (best effort) and releases the device.
pub struct BuzzController {
    channel: DeviceChannel,
    subscribers: Arc<Subscribers>,
}

impl BuzzController {
    /// Open a specific device.
    ///
    /// Fails with [`Error::Open`] if the device's report lengths are too short
    /// for the Buzz! report layout.
    pub fn open(
        backend: &dyn HidBackend,
        descriptor: DeviceDescriptor,
        config: &BuzzConfig,
    ) -> Result<Self> {
        let subscribers = Arc::new(Subscribers::default());
        let sink = DecodingSink {
            subscribers: Arc::clone(&subscribers),
        };
        let options = ChannelOptions {
            read_poll_ms: config.read_poll_ms,
            min_input_report_len: report::MIN_INPUT_REPORT_LEN,
            min_output_report_len: report::MIN_OUTPUT_REPORT_LEN,
            farewell: Some(Box::new(|caps: &DeviceCapabilities| {
                report::encode_lights(LightStates::all_off(), caps.output_report_len).ok()
            })),
        };
        let channel = DeviceChannel::open(backend, descriptor, Box::new(sink), options)?;
        Ok(Self {
            channel,
            subscribers,
        })
    }

    /// Open the first Buzz! device found, trying each configured product id in
    /// order (wired before wireless).
    ///
    /// `Ok(None)` if nothing is connected; an open failure on the first match
    /// is returned as an error.
    pub fn find_first(backend: &dyn HidBackend, config: &BuzzConfig) -> Result<Option<Self>> {
        for &pid in &config.product_ids {
            if let Some(descriptor) = enumerate::find_first(backend, config.vendor_id, pid)? {
                return Self::open(backend, descriptor, config).map(Some);
            }
        }
        debug!("No Buzz controller connected");
        Ok(None)
    }

    /// Like [`find_first`](Self::find_first), but a missing device is an
    /// [`Error::DeviceNotFound`].
    pub fn open_first(backend: &dyn HidBackend, config: &BuzzConfig) -> Result<Self> {
        Self::find_first(backend, config)?.ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "no Buzz! controller with VID 0x{:04X} and PID in {:04X?}",
                config.vendor_id, config.product_ids
            ))
        })
    }

    /// Open every connected Buzz! device. Devices that fail to open are
    /// logged and skipped.
    pub fn find_all(backend: &dyn HidBackend, config: &BuzzConfig) -> Result<Vec<Self>> {
        let mut controllers = Vec::new();
        for descriptor in discover(backend, config)? {
            let path = descriptor.path.clone();
            match Self::open(backend, descriptor, config) {
                Ok(controller) => controllers.push(controller),
                Err(e) => warn!(path = %path, error = %e, "Skipping Buzz controller that failed to open"),
            }
        }
        Ok(controllers)
    }

    /// Receive every subsequent [`BuzzEvent`]. Dropping the receiver
    /// unsubscribes.
    ///
    /// The queue is unbounded: a subscriber that keeps the receiver must keep
    /// draining it, or every report read from then on stays buffered.
    pub fn subscribe(&self) -> Receiver<BuzzEvent> {
        self.subscribers.add()
    }

    /// Set the four handset lights.
    ///
    /// Failures are not reported: the device may have just been removed,
    /// which surfaces as [`BuzzEvent::Removed`] instead.
    pub fn set_lights(&self, lights: LightStates) {
        let caps = self.channel.capabilities();
        match report::encode_lights(lights, caps.output_report_len) {
            Ok(buf) => {
                if let Err(e) = self.channel.write(&buf) {
                    warn!(error = %e, "Light report rejected");
                }
            }
            Err(e) => warn!(error = %e, "Cannot encode light report"),
        }
    }

    /// Product string read at open time.
    pub fn product_string(&self) -> &str {
        &self.channel.capabilities().product
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        self.channel.capabilities()
    }

    pub fn path(&self) -> &str {
        self.channel.path()
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// True until the device is removed or the controller closed.
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Turn the lights off and release the device.
    pub fn close(self) {
        self.channel.dispose();
    }
}

/// Descriptors for every connected Buzz! device, across all configured
/// product ids, without opening them.
pub fn discover(backend: &dyn HidBackend, config: &BuzzConfig) -> Result<Vec<DeviceDescriptor>> {
    let mut found = Vec::new();
    for &pid in &config.product_ids {
        found.extend(enumerate::find(backend, config.vendor_id, pid)?);
    }
    Ok(found)
}
