//! Audio input device management and live sample capture.
//!
//! Opens an input device at its native configuration and forwards every
//! callback buffer to a [`SampleSink`] as an [`AudioFrame`]. Samples are
//! converted to `f32` in a fixed stack chunk so the callback never allocates
//! or locks.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use crate::pipeline::{AudioFrame, SampleSink};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Interleaved samples converted per step inside the callback.
const CONVERT_CHUNK: usize = 1024;

/// An input device resolved from the configuration, not yet streaming.
///
/// The sample rate is known before capture starts, so the ring can be sized
/// for the device rather than for what was requested.
pub struct InputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
}

impl InputDevice {
    /// Resolves `device_spec` to an input device.
    ///
    /// # Arguments
    /// * `device_spec` - "default", a device name, or an index from `specline list-devices`
    /// * `requested_sample_rate` - Logged against the device rate; the device rate wins
    ///
    /// # Errors
    /// - If the device is not available
    /// - If its default input configuration cannot be read
    pub fn open(device_spec: &str, requested_sample_rate: u32) -> Result<Self> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if device_spec == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, device_spec)
            }
        })?;

        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Input device: {}", name);

        let config = device
            .default_input_config()
            .map_err(|e| anyhow!("Failed to read input configuration for '{name}': {e}"))?;

        if config.sample_rate().0 != requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Capturing at device rate.",
                requested_sample_rate,
                config.sample_rate().0
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );

        Ok(Self {
            device,
            config,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }

    /// Starts streaming into `sink` from the audio thread.
    ///
    /// # Errors
    /// - If the device's sample format is not supported
    /// - If the stream cannot be built or started
    pub fn start<S>(self, sink: S) -> Result<AudioCapture>
    where
        S: SampleSink + 'static,
    {
        let sample_format = self.config.sample_format();
        let stream_config: cpal::StreamConfig = self.config.config();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, S>(&self.device, &stream_config, sink),
            SampleFormat::I16 => build_stream::<i16, S>(&self.device, &stream_config, sink),
            SampleFormat::U16 => build_stream::<u16, S>(&self.device, &stream_config, sink),
            SampleFormat::I32 => build_stream::<i32, S>(&self.device, &stream_config, sink),
            other => Err(anyhow!("Unsupported sample format: {other:?}")),
        }?;

        stream.play()?;
        tracing::debug!("Audio stream started");

        Ok(AudioCapture {
            _stream: stream,
            name: self.name,
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels as usize,
        })
    }
}

/// A running input stream. Capture stops when this is dropped.
pub struct AudioCapture {
    _stream: cpal::Stream,
    name: String,
    sample_rate: u32,
    channels: usize,
}

impl AudioCapture {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        tracing::debug!("Audio stream stopped");
    }
}

fn build_stream<T, S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut sink: S,
) -> Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
    S: SampleSink + 'static,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let mut scratch = [0.0f32; CONVERT_CHUNK];

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            forward_interleaved(data, channels, sample_rate, &mut scratch, &mut sink);
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

/// Converts one callback buffer and hands it to `sink` in whole frames.
///
/// Chunks are cut on frame boundaries. A trailing partial frame is dropped.
fn forward_interleaved<T, S>(
    data: &[T],
    channels: usize,
    sample_rate: u32,
    scratch: &mut [f32],
    sink: &mut S,
) where
    T: SizedSample,
    f32: FromSample<T>,
    S: SampleSink + ?Sized,
{
    if channels == 0 {
        return;
    }
    let chunk_len = scratch.len() - scratch.len() % channels;
    if chunk_len == 0 {
        return;
    }
    let whole = data.len() - data.len() % channels;

    for block in data[..whole].chunks(chunk_len) {
        let out = &mut scratch[..block.len()];
        for (converted, &sample) in out.iter_mut().zip(block) {
            *converted = f32::from_sample(sample);
        }
        if let Ok(frame) = AudioFrame::interleaved(out, channels, sample_rate) {
            sink.supply(&frame);
        }
    }
}

/// One row of `specline list-devices`.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// Native sample rate and channel count, when the device reports them
    pub config: Option<(u32, u16)>,
}

/// Enumerates input devices in the order `find_device_by_name` indexes them.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let (host, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .filter(|d| d.name().is_ok())
            .collect();
        Ok((host, devices))
    })?;

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    Ok(devices
        .iter()
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            DeviceInfo {
                index,
                is_default: default_name.as_ref() == Some(&name),
                config: device
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels())),
                name,
            }
        })
        .collect())
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the given name or index exists
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
        .filter(|d| d.name().is_ok())
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            )
        });
    }

    devices
        .into_iter()
        .find(|device| device.name().is_ok_and(|name| name == device_spec))
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use 'specline list-devices' to see available devices."
            )
        })
}

/// Runs `f` with stderr pointed at /dev/null.
///
/// ALSA prints warnings for every PCM it cannot open while cpal
/// enumerates or opens devices. That noise would land on top of the live
/// view, so device lookups run through here on Linux.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _silenced = StderrSilencer::new()?;
    f()
}

/// Restores the saved stderr descriptor when dropped, so stderr comes back
/// even if the wrapped call panics.
#[cfg(target_os = "linux")]
struct StderrSilencer {
    saved_stderr: libc::c_int,
}

#[cfg(target_os = "linux")]
impl StderrSilencer {
    fn new() -> Result<Self> {
        // Open /dev/null for writing
        let dev_null = OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

        // Save the current stderr file descriptor
        let saved_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
        if saved_stderr == -1 {
            return Err(anyhow!("Failed to duplicate stderr"));
        }

        // Redirect stderr to /dev/null; the dup'd descriptor outlives `dev_null`
        if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
            unsafe { libc::close(saved_stderr) };
            return Err(anyhow!("Failed to redirect stderr"));
        }

        Ok(Self { saved_stderr })
    }
}

#[cfg(target_os = "linux")]
impl Drop for StderrSilencer {
    fn drop(&mut self) {
        // Restore the original stderr
        unsafe {
            libc::dup2(self.saved_stderr, libc::STDERR_FILENO);
            libc::close(self.saved_stderr);
        }
    }
}

/// ALSA only exists on Linux.
#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
