//! Lock-free single-producer/single-consumer sample ring.
//!
//! The capture callback owns the [`SampleWriter`] and pushes samples into a
//! `ringbuf` queue without locking or allocating. The render loop owns the
//! [`SampleReader`], which drains that queue into a fixed window holding the
//! newest `capacity` samples. The window is only touched by the render
//! thread, so a snapshot is always whole: it is either current or strictly
//! older, never torn.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::error::ConfigurationError;
use crate::pipeline::frame::AudioFrame;
use crate::pipeline::SampleSink;

/// Stack chunk used to downmix multi-channel frames without allocating.
const DOWNMIX_CHUNK: usize = 256;

/// Queue length in windows, so a slow frame does not lose samples.
const QUEUE_WINDOWS: usize = 8;

/// Counters shared by both halves.
#[derive(Default)]
struct RingStats {
    written: AtomicU64,
    dropped_writes: AtomicU64,
}

/// Creates a ring holding the most recent `capacity` mono samples at
/// `sample_rate`, split into its writing and reading halves.
///
/// The queue between the halves holds at least half a second of audio.
///
/// # Errors
/// - If `capacity` or `sample_rate` is zero
pub fn sample_ring(
    capacity: usize,
    sample_rate: u32,
) -> Result<(SampleWriter, SampleReader), ConfigurationError> {
    if capacity == 0 {
        return Err(ConfigurationError::InvalidCapacity);
    }
    if sample_rate == 0 {
        return Err(ConfigurationError::InvalidSampleRate);
    }

    let queue_len = (capacity * QUEUE_WINDOWS).max(sample_rate as usize / 2);
    let (producer, consumer) = HeapRb::<f32>::new(queue_len).split();
    let stats = Arc::new(RingStats::default());

    Ok((
        SampleWriter {
            producer,
            stats: Arc::clone(&stats),
            capacity,
            sample_rate,
        },
        SampleReader {
            consumer,
            window: vec![0.0; capacity].into_boxed_slice(),
            head: 0,
            drained: 0,
            stats,
            sample_rate,
        },
    ))
}

/// Producer half. Lives in the audio callback.
pub struct SampleWriter {
    producer: HeapProd<f32>,
    stats: Arc<RingStats>,
    capacity: usize,
    sample_rate: u32,
}

impl SampleWriter {
    /// Appends mono samples; the reader keeps only the newest `capacity`.
    ///
    /// An empty slice is a no-op. Only the newest `capacity` samples of a
    /// longer slice are queued, though all of them count as written. If the
    /// reader has fallen so far behind that the queue is full, the samples
    /// that do not fit are discarded and the write is counted as dropped.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let tail = &samples[samples.len().saturating_sub(self.capacity)..];
        let pushed = self.producer.push_slice(tail);
        if pushed < tail.len() {
            self.stats.dropped_writes.fetch_add(1, Ordering::Relaxed);
        }
        self.stats
            .written
            .fetch_add(samples.len() as u64, Ordering::Release);
    }

    /// Downmixes `frame` to mono and writes it.
    ///
    /// Frames at a sample rate other than the ring's are dropped and counted
    /// in [`SampleReader::dropped_writes`]; nothing is reported to the caller.
    pub fn write_frame(&mut self, frame: &AudioFrame<'_>) {
        if frame.sample_rate() != self.sample_rate {
            self.stats.dropped_writes.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut chunk = [0.0f32; DOWNMIX_CHUNK];
        let mut offset = 0;
        loop {
            let count = frame.downmix_into(offset, &mut chunk);
            if count == 0 {
                break;
            }
            self.write(&chunk[..count]);
            offset += count;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SampleSink for SampleWriter {
    fn supply(&mut self, frame: &AudioFrame<'_>) {
        self.write_frame(frame);
    }
}

/// Outcome of an allocation-free snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// The output buffer holds the most recent samples, oldest first.
    Primed,
    /// Fewer samples than requested have reached the reader.
    NotPrimed { available: usize },
}

/// Owned copy of the ring's most recent window.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Primed(Vec<f32>),
    NotPrimed { available: usize },
}

/// Consumer half. Lives in the render loop.
pub struct SampleReader {
    consumer: HeapCons<f32>,
    window: Box<[f32]>,
    /// Next window slot to overwrite, which is also the oldest sample.
    head: usize,
    drained: u64,
    stats: Arc<RingStats>,
    sample_rate: u32,
}

impl SampleReader {
    /// Returns a copy of the most recent `capacity` samples.
    pub fn snapshot(&mut self) -> Snapshot {
        let mut window = vec![0.0f32; self.capacity()];
        match self.snapshot_into(&mut window) {
            SnapshotStatus::Primed => Snapshot::Primed(window),
            SnapshotStatus::NotPrimed { available } => Snapshot::NotPrimed { available },
        }
    }

    /// Copies the most recent `out.len()` samples into `out`, oldest first.
    ///
    /// Only the first `capacity` slots of `out` are used if it is longer than
    /// the ring. When not primed the contents of `out` are unspecified.
    pub fn snapshot_into(&mut self, out: &mut [f32]) -> SnapshotStatus {
        self.drain();

        let capacity = self.window.len();
        let len = out.len().min(capacity);
        if self.drained < len as u64 {
            return SnapshotStatus::NotPrimed {
                available: self.drained as usize,
            };
        }

        let start = (self.head + capacity - len) % capacity;
        let first = len.min(capacity - start);
        out[..first].copy_from_slice(&self.window[start..start + first]);
        out[first..len].copy_from_slice(&self.window[..len - first]);
        SnapshotStatus::Primed
    }

    /// Moves everything queued by the writer into the window.
    fn drain(&mut self) {
        let capacity = self.window.len();
        let pending = self.consumer.occupied_len();
        if pending > capacity {
            // Older than one window; would be overwritten anyway.
            let skipped = self.consumer.skip(pending - capacity);
            self.drained += skipped as u64;
        }

        loop {
            let popped = self.consumer.pop_slice(&mut self.window[self.head..]);
            if popped == 0 {
                break;
            }
            self.head = (self.head + popped) % capacity;
            self.drained += popped as u64;
        }
    }

    /// Total samples written since construction.
    pub fn written(&self) -> u64 {
        self.stats.written.load(Ordering::Acquire)
    }

    /// Writes rejected for their sample rate or cut short by a full queue.
    pub fn dropped_writes(&self) -> u64 {
        self.stats.dropped_writes.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.window.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_snapshot_before_any_write() {
        let (_writer, mut reader) = sample_ring(8, 44100).unwrap();
        assert_eq!(reader.snapshot(), Snapshot::NotPrimed { available: 0 });
    }

    #[test]
    fn test_primes_exactly_at_capacity() {
        let (mut writer, mut reader) = sample_ring(4, 44100).unwrap();
        writer.write(&[0.1, 0.2, 0.3]);
        assert_eq!(reader.snapshot(), Snapshot::NotPrimed { available: 3 });

        writer.write(&[0.4]);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_empty_write_is_noop() {
        let (mut writer, mut reader) = sample_ring(4, 44100).unwrap();
        writer.write(&[]);
        assert_eq!(reader.written(), 0);
        assert_eq!(reader.snapshot(), Snapshot::NotPrimed { available: 0 });
    }

    #[test]
    fn test_overwrites_oldest() {
        let (mut writer, mut reader) = sample_ring(4, 44100).unwrap();
        writer.write(&[1.0, 2.0, 3.0]);
        writer.write(&[4.0, 5.0, 6.0]);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_write_longer_than_capacity_keeps_newest() {
        let (mut writer, mut reader) = sample_ring(3, 44100).unwrap();
        writer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(reader.written(), 7);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![5.0, 6.0, 7.0]));
    }

    #[test]
    fn test_partial_snapshot_takes_most_recent() {
        let (mut writer, mut reader) = sample_ring(4, 44100).unwrap();
        writer.write(&[1.0, 2.0, 3.0]);
        let mut out = [0.0; 2];
        assert_eq!(reader.snapshot_into(&mut out), SnapshotStatus::Primed);
        assert_eq!(out, [2.0, 3.0]);
    }

    #[test]
    fn test_write_frame_downmixes_and_drops_rate_mismatch() {
        let (mut writer, mut reader) = sample_ring(2, 48000).unwrap();

        let stereo = [1.0, 0.0, 0.0, -1.0];
        writer.write_frame(&AudioFrame::interleaved(&stereo, 2, 48000).unwrap());
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![0.5, -0.5]));

        writer.write_frame(&AudioFrame::mono(&[0.9, 0.9], 44100).unwrap());
        assert_eq!(reader.dropped_writes(), 1);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![0.5, -0.5]));
    }

    #[test]
    fn test_write_frame_spans_multiple_chunks() {
        let samples: Vec<f32> = (0..DOWNMIX_CHUNK * 2 + 10).map(|i| i as f32).collect();
        let (mut writer, mut reader) = sample_ring(samples.len(), 44100).unwrap();
        writer.write_frame(&AudioFrame::mono(&samples, 44100).unwrap());
        assert_eq!(reader.snapshot(), Snapshot::Primed(samples));
    }

    #[test]
    fn test_invalid_construction() {
        assert_eq!(
            sample_ring(0, 44100).err(),
            Some(ConfigurationError::InvalidCapacity)
        );
        assert_eq!(
            sample_ring(16, 0).err(),
            Some(ConfigurationError::InvalidSampleRate)
        );
    }

    #[test]
    fn test_concurrent_snapshots_are_never_torn() {
        const TOTAL: usize = 1 << 20;
        let (mut writer, mut reader) = sample_ring(64, 44100).unwrap();

        let producer = thread::spawn(move || {
            let ramp: Vec<f32> = (0..TOTAL).map(|i| i as f32).collect();
            let mut pos = 0;
            let mut chunk = 1;
            while pos < TOTAL {
                let end = (pos + chunk).min(TOTAL);
                writer.write(&ramp[pos..end]);
                pos = end;
                chunk = chunk % 97 + 1;
            }
        });

        // A full queue may leave gaps, but samples never arrive out of order.
        let mut window = [0.0f32; 64];
        while reader.written() < TOTAL as u64 {
            if reader.snapshot_into(&mut window) == SnapshotStatus::Primed {
                for pair in window.windows(2) {
                    assert!(pair[1] > pair[0], "torn window: {window:?}");
                }
            }
        }
        producer.join().unwrap();

        assert_eq!(reader.snapshot_into(&mut window), SnapshotStatus::Primed);
        if reader.dropped_writes() == 0 {
            assert_eq!(window[63], (TOTAL - 1) as f32);
        }
    }

    #[test]
    fn test_reader_catching_up_keeps_newest_window() {
        let (mut writer, mut reader) = sample_ring(4, 8000).unwrap();
        for block in (0..40).collect::<Vec<_>>().chunks(5) {
            let samples: Vec<f32> = block.iter().map(|&i| i as f32).collect();
            writer.write(&samples);
        }
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![36.0, 37.0, 38.0, 39.0]));

        writer.write(&[40.0, 41.0]);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![38.0, 39.0, 40.0, 41.0]));
        assert_eq!(reader.dropped_writes(), 0);
    }

    #[test]
    fn test_full_queue_counts_dropped_write() {
        // A 4-sample window at 8 Hz queues 32 samples.
        let (mut writer, mut reader) = sample_ring(4, 8).unwrap();
        for _ in 0..8 {
            writer.write(&[0.5; 4]);
        }
        assert_eq!(reader.dropped_writes(), 0);

        writer.write(&[1.0; 4]);
        assert_eq!(reader.dropped_writes(), 1);
        assert_eq!(reader.snapshot(), Snapshot::Primed(vec![0.5; 4]));
    }
}
