//! Raw PCM decoding
//!
//! Speech synthesis returns headerless signed 16-bit little-endian mono PCM at
//! 24 kHz. Decoding is total: any byte slice produces a buffer, and a trailing
//! odd byte is ignored.

use super::types::{PcmBuffer, SAMPLE_RATE};

/// Normalization divisor mapping i16 onto [-1.0, 1.0)
const I16_SCALE: f32 = 32768.0;

/// Decode signed 16-bit little-endian mono PCM into a normalized float buffer
pub fn decode_pcm16le(bytes: &[u8]) -> PcmBuffer {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE)
        .collect();

    PcmBuffer::new(samples, SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_zero_and_minimum() {
        let buffer = decode_pcm16le(&[0x00, 0x00, 0x00, 0x80]);
        assert_eq!(buffer.samples, vec![0.0, -1.0]);
        assert_eq!(buffer.sample_rate, 24_000);
    }

    #[test]
    fn test_decode_maximum_is_just_below_one() {
        let buffer = decode_pcm16le(&[0xFF, 0x7F]);
        assert_eq!(buffer.samples, vec![32767.0 / 32768.0]);
    }

    #[test]
    fn test_decode_is_little_endian() {
        // 0x0100 = 256
        let buffer = decode_pcm16le(&[0x00, 0x01]);
        assert_eq!(buffer.samples, vec![256.0 / 32768.0]);
    }

    #[test]
    fn test_trailing_odd_byte_dropped() {
        let buffer = decode_pcm16le(&[0x00, 0x00, 0x00, 0x80, 0x7F]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_empty_and_single_byte_input() {
        assert!(decode_pcm16le(&[]).is_empty());
        assert!(decode_pcm16le(&[0x12]).is_empty());
    }

    #[test]
    fn test_samples_within_range() {
        let bytes: Vec<u8> = (0..=255u8).flat_map(|b| [b, b]).collect();
        let buffer = decode_pcm16le(&bytes);
        assert_eq!(buffer.len(), 256);
        assert!(buffer.samples.iter().all(|s| (-1.0..1.0).contains(s)));
    }
}
