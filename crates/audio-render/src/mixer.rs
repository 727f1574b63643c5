//! Sample-wise additive mixing of s16le chunks.

/// Mix chunks into one `out_len`-byte buffer with saturating i16 addition.
///
/// Shorter inputs contribute their prefix only; missing data is never
/// treated as an explicit zero contributor, it simply adds nothing.
pub fn mix_chunks(chunks: &[Vec<u8>], out_len: usize) -> Vec<u8> {
    let mut acc = vec![0i32; out_len / 2];
    for chunk in chunks {
        for (slot, pair) in acc.iter_mut().zip(chunk.chunks_exact(2)) {
            *slot += i16::from_le_bytes([pair[0], pair[1]]) as i32;
        }
    }
    let mut out = Vec::with_capacity(out_len);
    for value in acc {
        let sample = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm;

    #[test]
    fn mixing_silence_yields_silence() {
        let silent = pcm::silence(64);
        let out = mix_chunks(&[silent.clone(), silent.clone(), silent], 64);
        assert_eq!(out, pcm::silence(64));
    }

    #[test]
    fn single_chunk_passes_through_unchanged() {
        let chunk = pcm::encode_s16(&[100, -200, 300, -400]);
        let out = mix_chunks(std::slice::from_ref(&chunk), chunk.len());
        assert_eq!(out, chunk);
    }

    #[test]
    fn addition_saturates() {
        let loud = pcm::encode_s16(&[30_000, -30_000]);
        let out = mix_chunks(&[loud.clone(), loud], 4);
        assert_eq!(pcm::decode_s16(&out), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn short_input_pads_with_silence() {
        let long = pcm::encode_s16(&[1_000, 1_000, 1_000, 1_000]);
        let short = pcm::encode_s16(&[500]);
        let out = mix_chunks(&[long, short], 8);
        assert_eq!(pcm::decode_s16(&out), vec![1_500, 1_000, 1_000, 1_000]);
    }

    #[test]
    fn no_inputs_produce_silence() {
        assert_eq!(mix_chunks(&[], 16), pcm::silence(16));
    }
}
