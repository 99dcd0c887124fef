//! Borrowed audio buffers as delivered by the capture callback.

use crate::error::ConfigurationError;

/// How the channels of a buffer are laid out in memory.
#[derive(Debug, Clone, Copy)]
enum SampleLayout<'a> {
    /// `[l0, r0, l1, r1, ...]`
    Interleaved(&'a [f32]),
    /// One slice per channel, all the same length.
    Planar(&'a [&'a [f32]]),
}

/// One buffer of normalized samples in `[-1.0, 1.0]` from the audio input.
///
/// Frames borrow the callback's memory and are never copied; the ring writer
/// downmixes them through a stack chunk.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    layout: SampleLayout<'a>,
    sample_rate: u32,
    channels: usize,
}

impl<'a> AudioFrame<'a> {
    /// Wraps an interleaved buffer.
    ///
    /// # Errors
    /// - If `channels` or `sample_rate` is zero
    /// - If the buffer length is not a whole number of frames
    pub fn interleaved(
        samples: &'a [f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, ConfigurationError> {
        validate_format(channels, sample_rate)?;
        if samples.len() % channels != 0 {
            return Err(ConfigurationError::MalformedFrame(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            layout: SampleLayout::Interleaved(samples),
            sample_rate,
            channels,
        })
    }

    /// Wraps a single-channel buffer.
    pub fn mono(samples: &'a [f32], sample_rate: u32) -> Result<Self, ConfigurationError> {
        Self::interleaved(samples, 1, sample_rate)
    }

    /// Wraps a planar buffer, one slice per channel.
    ///
    /// # Errors
    /// - If there are no channels or `sample_rate` is zero
    /// - If the channel slices differ in length
    pub fn planar(planes: &'a [&'a [f32]], sample_rate: u32) -> Result<Self, ConfigurationError> {
        validate_format(planes.len(), sample_rate)?;
        let frames = planes[0].len();
        if let Some(bad) = planes.iter().position(|p| p.len() != frames) {
            return Err(ConfigurationError::MalformedFrame(format!(
                "planar channel {} has {} samples, expected {}",
                bad,
                planes[bad].len(),
                frames
            )));
        }
        Ok(Self {
            layout: SampleLayout::Planar(planes),
            sample_rate,
            channels: planes.len(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.layout {
            SampleLayout::Interleaved(samples) => samples.len() / self.channels,
            SampleLayout::Planar(planes) => planes[0].len(),
        }
    }

    /// Averages all channels of frames `start..` into `out`.
    ///
    /// Returns how many frames were written, which is `out.len()` unless the
    /// frame runs out first. Does not allocate.
    pub fn downmix_into(&self, start: usize, out: &mut [f32]) -> usize {
        if start >= self.frames() {
            return 0;
        }
        let count = (self.frames() - start).min(out.len());
        let scale = 1.0 / self.channels as f32;

        match self.layout {
            SampleLayout::Interleaved(samples) if self.channels == 1 => {
                out[..count].copy_from_slice(&samples[start..start + count]);
            }
            SampleLayout::Interleaved(samples) => {
                let chunks = samples[start * self.channels..].chunks_exact(self.channels);
                for (slot, chunk) in out[..count].iter_mut().zip(chunks) {
                    *slot = chunk.iter().sum::<f32>() * scale;
                }
            }
            SampleLayout::Planar(planes) => {
                for (i, slot) in out[..count].iter_mut().enumerate() {
                    *slot = planes.iter().map(|p| p[start + i]).sum::<f32>() * scale;
                }
            }
        }

        count
    }
}

fn validate_format(channels: usize, sample_rate: u32) -> Result<(), ConfigurationError> {
    if channels == 0 {
        return Err(ConfigurationError::InvalidChannelCount);
    }
    if sample_rate == 0 {
        return Err(ConfigurationError::InvalidSampleRate);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_stereo_downmix() {
        let samples = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let frame = AudioFrame::interleaved(&samples, 2, 48000).unwrap();
        assert_eq!(frame.frames(), 3);

        let mut out = [9.0; 4];
        let written = frame.downmix_into(0, &mut out);
        assert_eq!(written, 3);
        assert_eq!(&out[..3], &[0.5, 0.5, 0.0]);
        assert_eq!(out[3], 9.0);
    }

    #[test]
    fn test_downmix_from_offset() {
        let samples = [0.1, 0.2, 0.3, 0.4];
        let frame = AudioFrame::mono(&samples, 44100).unwrap();
        let mut out = [0.0; 2];
        assert_eq!(frame.downmix_into(2, &mut out), 2);
        assert_eq!(out, [0.3, 0.4]);
        assert_eq!(frame.downmix_into(4, &mut out), 0);
    }

    #[test]
    fn test_downmix_past_the_end_writes_nothing() {
        let samples = [0.1, 0.2, 0.3, 0.4];
        let mut out = [7.0; 2];

        let stereo = AudioFrame::interleaved(&samples, 2, 44100).unwrap();
        assert_eq!(stereo.downmix_into(5, &mut out), 0);

        let mono = AudioFrame::mono(&samples, 44100).unwrap();
        assert_eq!(mono.downmix_into(9, &mut out), 0);

        let planes: [&[f32]; 2] = [&samples[..2], &samples[2..]];
        let planar = AudioFrame::planar(&planes, 44100).unwrap();
        assert_eq!(planar.downmix_into(3, &mut out), 0);
        assert_eq!(out, [7.0; 2]);
    }

    #[test]
    fn test_planar_downmix() {
        let left = [1.0, 1.0];
        let right = [0.0, -1.0];
        let planes: [&[f32]; 2] = [&left, &right];
        let frame = AudioFrame::planar(&planes, 44100).unwrap();
        let mut out = [0.0; 2];
        assert_eq!(frame.downmix_into(0, &mut out), 2);
        assert_eq!(out, [0.5, 0.0]);
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert_eq!(
            AudioFrame::interleaved(&[0.0; 3], 0, 44100).unwrap_err(),
            ConfigurationError::InvalidChannelCount
        );
        assert_eq!(
            AudioFrame::mono(&[0.0; 3], 0).unwrap_err(),
            ConfigurationError::InvalidSampleRate
        );
        assert!(matches!(
            AudioFrame::interleaved(&[0.0; 3], 2, 44100),
            Err(ConfigurationError::MalformedFrame(_))
        ));

        let a = [0.0; 2];
        let b = [0.0; 3];
        let planes: [&[f32]; 2] = [&a, &b];
        assert!(matches!(
            AudioFrame::planar(&planes, 44100),
            Err(ConfigurationError::MalformedFrame(_))
        ));
    }
}
