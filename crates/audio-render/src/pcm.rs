//! Small conversions between s16le byte buffers, `i16` and `f32` samples.

/// Decode little-endian s16 bytes into samples. Trailing odd bytes are
/// ignored.
pub fn decode_s16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

pub fn encode_s16(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

pub fn s16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect()
}

/// Round and saturate one float sample (±1.0 nominal range) to i16.
pub fn f32_to_s16(sample: f32) -> i16 {
    (sample * 32_768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn f32_to_s16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&f32_to_s16(*sample).to_le_bytes());
    }
    out
}

/// A zeroed s16 buffer of `len` bytes.
pub fn silence(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16_round_trips_through_f32() {
        let samples = [i16::MIN, -12_345, -1, 0, 1, 12_345, i16::MAX];
        let bytes = encode_s16(&samples);
        let floats = s16_to_f32(&bytes);
        let back = f32_to_s16_bytes(&floats);
        assert_eq!(bytes, back);
    }

    #[test]
    fn f32_to_s16_saturates() {
        assert_eq!(f32_to_s16(2.0), i16::MAX);
        assert_eq!(f32_to_s16(-2.0), i16::MIN);
    }

    #[test]
    fn decode_encode_round_trip() {
        let samples = [100i16, -200, 300];
        assert_eq!(decode_s16(&encode_s16(&samples)), samples);
    }

    #[test]
    fn silence_is_zeroed() {
        assert!(decode_s16(&silence(8)).iter().all(|s| *s == 0));
    }
}
