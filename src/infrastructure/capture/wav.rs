//! WAV container helpers
//!
//! 16-bit little-endian PCM behind the standard 44-byte RIFF header.

/// Size of the RIFF header in bytes
pub const HEADER_SIZE: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// Size field used while the final length is unknown
const STREAMING_SIZE: u32 = u32::MAX;

/// Build a RIFF header.
///
/// With `data_len` the size fields are exact. Without it they hold the
/// streaming placeholder, which players read as "until end of file".
pub fn header(sample_rate: u32, channels: u16, data_len: Option<usize>) -> Vec<u8> {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = channels * BITS_PER_SAMPLE / 8;
    let (chunk_size, data_size) = match data_len {
        Some(len) => {
            let len = u32::try_from(len).unwrap_or(STREAMING_SIZE - 36);
            (36u32.saturating_add(len), len)
        }
        None => (STREAMING_SIZE, STREAMING_SIZE),
    };

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&chunk_size.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    header
}

/// Little-endian bytes of 16-bit samples
pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert float samples in `[-1, 1]` to 16-bit, clamping out-of-range values
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
        .collect()
}

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
