//! Live audio input.

pub mod audio;

pub use audio::{list_input_devices, AudioCapture, DeviceInfo, InputDevice};
