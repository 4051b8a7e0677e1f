//! Two-source audio mixing
//!
//! Sources are summed sample by sample with clipping. A source that falls
//! silent (or lags) by more than the allowed skew is padded with silence so
//! the other one keeps flowing.

use std::collections::VecDeque;

use rubato::{FftFixedIn, Resampler};

use crate::domain::error::CaptureError;

/// Frames handed to the resampler per call
const RESAMPLER_CHUNK: usize = 1024;

/// Sample-aligned mix of two mono sources
#[derive(Debug)]
pub struct MixBuffer {
    queues: Vec<VecDeque<f32>>,
    max_skew: usize,
}

impl MixBuffer {
    /// `max_skew` is the number of samples one source may run ahead of a
    /// silent one before the silent one is padded
    pub fn new(sources: usize, max_skew: usize) -> Self {
        Self {
            queues: (0..sources).map(|_| VecDeque::new()).collect(),
            max_skew,
        }
    }

    pub fn push(&mut self, source: usize, samples: &[f32]) {
        if let Some(queue) = self.queues.get_mut(source) {
            queue.extend(samples.iter().copied());
        }
    }

    /// Pop every sample that can be mixed now
    pub fn mix_ready(&mut self) -> Vec<f32> {
        let longest = self.queues.iter().map(VecDeque::len).max().unwrap_or(0);
        let shortest = self.queues.iter().map(VecDeque::len).min().unwrap_or(0);

        let ready = if longest - shortest > self.max_skew {
            longest - self.max_skew
        } else {
            shortest
        };
        self.take(ready)
    }

    fn take(&mut self, count: usize) -> Vec<f32> {
        (0..count)
            .map(|_| {
                let sum: f32 = self
                    .queues
                    .iter_mut()
                    .map(|queue| queue.pop_front().unwrap_or(0.0))
                    .sum();
                sum.clamp(-1.0, 1.0)
            })
            .collect()
    }
}

/// Incremental mono resampler on top of rubato
pub struct StreamResampler {
    resampler: FftFixedIn<f32>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, CaptureError> {
        let resampler = FftFixedIn::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            RESAMPLER_CHUNK,
            2,
            1,
        )
        .map_err(|e| CaptureError::StreamFailed(format!("Resampler init failed: {}", e)))?;

        Ok(Self {
            resampler,
            pending: Vec::new(),
        })
    }

    /// Resample whatever full chunks are available; the rest waits
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, CaptureError> {
        self.pending.extend_from_slice(input);
        let mut output = Vec::new();

        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let frames = vec![self.pending.drain(..needed).collect::<Vec<f32>>()];
            let resampled = self
                .resampler
                .process(&frames, None)
                .map_err(|e| CaptureError::StreamFailed(format!("Resampling failed: {}", e)))?;
            if let Some(channel) = resampled.into_iter().next() {
                output.extend(channel);
            }
        }

        Ok(output)
    }
}
