//! Buzz! report encoding and decoding.
//!
//! Both directions use fixed-length reports whose byte 0 is the report-ID slot
//! (always 0, the device does not number its reports).
//!
//! Output report (host → device), at least 6 bytes:
//! - byte 0: report ID slot, 0
//! - byte 1: unused, 0
//! - bytes 2..=5: light for handset 1..=4, `0xFF` on, `0x00` off
//!
//! Input report (device → host): buttons are packed into bytes 3..=5, five bits
//! per handset in the order red, yellow, green, orange, blue:
//!
//! | Handset | Red  | Yellow | Green | Orange | Blue |
//! |---------|------|--------|-------|--------|------|
//! | 0       | 3:0  | 3:1    | 3:2   | 3:3    | 3:4  |
//! | 1       | 3:5  | 3:6    | 3:7   | 4:0    | 4:1  |
//! | 2       | 4:2  | 4:3    | 4:4   | 4:5    | 4:6  |
//! | 3       | 4:7  | 5:0    | 5:1   | 5:2    | 5:3  |
//!
//! (`byte:bit`, bit 0 = LSB, set = pressed.)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of handsets served by one USB device.
pub const HANDSET_COUNT: usize = 4;

/// Minimum output report length (report ID slot, reserved byte, four lights).
pub const MIN_OUTPUT_REPORT_LEN: usize = 6;
/// Minimum input report length (the button bytes end at offset 5).
pub const MIN_INPUT_REPORT_LEN: usize = 6;

/// First byte of the packed button field.
const BUTTON_FIELD_OFFSET: usize = 3;
/// First byte of the light field.
const LIGHT_FIELD_OFFSET: usize = 2;
/// Bits used per handset in the packed button field.
const BITS_PER_HANDSET: usize = 5;

/// Light byte value for "on".
pub const LIGHT_ON: u8 = 0xFF;
/// Light byte value for "off".
pub const LIGHT_OFF: u8 = 0x00;

/// One coloured button on a handset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Red,
    Yellow,
    Green,
    Orange,
    Blue,
}

impl Button {
    /// Buttons in wire order (bit 0 first within a handset's field).
    pub const WIRE_ORDER: [Button; BITS_PER_HANDSET] = [
        Button::Red,
        Button::Yellow,
        Button::Green,
        Button::Orange,
        Button::Blue,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Orange => "Orange",
            Self::Blue => "Blue",
        }
    }
}

/// Pressed state of the five buttons on one handset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonState {
    pub red: bool,
    pub blue: bool,
    pub orange: bool,
    pub green: bool,
    pub yellow: bool,
}

impl ButtonState {
    /// True if any button on the handset is held.
    pub fn any(&self) -> bool {
        self.red || self.blue || self.orange || self.green || self.yellow
    }

    /// State of a single button.
    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Red => self.red,
            Button::Yellow => self.yellow,
            Button::Green => self.green,
            Button::Orange => self.orange,
            Button::Blue => self.blue,
        }
    }

    /// Held buttons, in display order.
    pub fn pressed(&self) -> Vec<Button> {
        [
            Button::Red,
            Button::Blue,
            Button::Orange,
            Button::Green,
            Button::Yellow,
        ]
        .into_iter()
        .filter(|b| self.is_pressed(*b))
        .collect()
    }

    fn set(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Red => self.red = pressed,
            Button::Yellow => self.yellow = pressed,
            Button::Green => self.green = pressed,
            Button::Orange => self.orange = pressed,
            Button::Blue => self.blue = pressed,
        }
    }
}

impl std::fmt::Display for ButtonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.pressed().iter().map(Button::label).collect();
        write!(f, "{}", labels.join(", "))
    }
}

/// Button state of all four handsets, decoded from one input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonSnapshot {
    pub handsets: [ButtonState; HANDSET_COUNT],
}

impl ButtonSnapshot {
    /// State of handset `index` (0-based), if in range.
    pub fn handset(&self, index: usize) -> Option<&ButtonState> {
        self.handsets.get(index)
    }

    /// Iterate handsets in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ButtonState> {
        self.handsets.iter()
    }

    /// True if any button on any handset is held.
    pub fn any(&self) -> bool {
        self.handsets.iter().any(ButtonState::any)
    }
}

/// On/off state of the four handset lights (handset 1..=4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightStates(pub [bool; HANDSET_COUNT]);

impl LightStates {
    pub fn new(l1: bool, l2: bool, l3: bool, l4: bool) -> Self {
        Self([l1, l2, l3, l4])
    }

    /// Every light off.
    pub fn all_off() -> Self {
        Self([false; HANDSET_COUNT])
    }

    /// Every light on.
    pub fn all_on() -> Self {
        Self([true; HANDSET_COUNT])
    }

    /// Only the light of handset `index` (0-based) on.
    pub fn only(index: usize) -> Self {
        let mut lights = [false; HANDSET_COUNT];
        if let Some(slot) = lights.get_mut(index) {
            *slot = true;
        }
        Self(lights)
    }

    /// Light the handsets that have any button held.
    pub fn from_held(snapshot: &ButtonSnapshot) -> Self {
        let mut lights = [false; HANDSET_COUNT];
        for (slot, state) in lights.iter_mut().zip(snapshot.iter()) {
            *slot = state.any();
        }
        Self(lights)
    }
}

/// Decode an input report into a snapshot of all four handsets.
///
/// Only bytes 3..=5 are inspected; any trailing bytes are ignored.
pub fn decode_input(report: &[u8]) -> Result<ButtonSnapshot> {
    if report.len() < MIN_INPUT_REPORT_LEN {
        return Err(Error::ReportLength {
            expected: MIN_INPUT_REPORT_LEN,
            actual: report.len(),
        });
    }

    // 24-bit little-endian view of the three button bytes.
    let packed = u32::from(report[BUTTON_FIELD_OFFSET])
        | (u32::from(report[BUTTON_FIELD_OFFSET + 1]) << 8)
        | (u32::from(report[BUTTON_FIELD_OFFSET + 2]) << 16);

    let mut snapshot = ButtonSnapshot::default();
    for (handset, state) in snapshot.handsets.iter_mut().enumerate() {
        let base = handset * BITS_PER_HANDSET;
        for (bit, button) in Button::WIRE_ORDER.iter().enumerate() {
            state.set(*button, packed & (1u32 << (base + bit)) != 0);
        }
    }
    Ok(snapshot)
}

/// Encode a light command into an output report of `report_len` bytes.
pub fn encode_lights(lights: LightStates, report_len: usize) -> Result<Vec<u8>> {
    if report_len < MIN_OUTPUT_REPORT_LEN {
        return Err(Error::ReportLength {
            expected: MIN_OUTPUT_REPORT_LEN,
            actual: report_len,
        });
    }

    let mut buf = vec![0u8; report_len];
    for (i, on) in lights.0.iter().enumerate() {
        buf[LIGHT_FIELD_OFFSET + i] = if *on { LIGHT_ON } else { LIGHT_OFF };
    }
    Ok(buf)
}
