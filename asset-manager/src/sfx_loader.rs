use crate::sfx::{PcmSample, RawSample};
use crate::util::AssetError;

/// Parse a raw sample lump and convert it to `output_rate`.
///
/// Samples already at the output rate are copied as-is; everything else goes
/// through [`resample_u8`].
pub fn decode_for_output(bytes: &[u8], output_rate: u32) -> Result<PcmSample, AssetError> {
    if output_rate == 0 {
        return Err(AssetError::BadSampleRate);
    }
    let raw = RawSample::parse(bytes)?;
    let data = if raw.sample_rate == output_rate {
        raw.samples.to_vec()
    } else {
        resample_u8(raw.samples, raw.sample_rate, output_rate)
    };
    if data.is_empty() {
        return Err(AssetError::Empty);
    }
    Ok(PcmSample { sample_rate: output_rate, data })
}

/// Output length for a `len`-sample buffer converted from `from_rate` to `to_rate`,
/// rounded to nearest.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    let from = from_rate as u64;
    ((len as u64 * to_rate as u64 + from / 2) / from) as usize
}

/// Linear interpolation resampler for unsigned 8-bit mono data.
///
/// Walks the source with a 16.16 step/remainder accumulator. Each interpolated
/// value is clamped to `0..=255`.
pub fn resample_u8(src: &[u8], from_rate: u32, to_rate: u32) -> Vec<u8> {
    if src.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return src.to_vec();
    }

    let out_len = resampled_len(src.len(), from_rate, to_rate);
    let step = ((from_rate as u64) << 16) / to_rate as u64;
    let last = src.len() - 1;

    let mut out = Vec::with_capacity(out_len);
    let mut pos = 0usize;
    let mut remainder = 0u64;
    for _ in 0..out_len {
        let i0 = pos.min(last);
        let i1 = (pos + 1).min(last);
        let s0 = src[i0] as i32;
        let s1 = src[i1] as i32;
        let frac = remainder as i32;
        let v = s0 + (((s1 - s0) * frac) >> 16);
        out.push(v.clamp(0, 255) as u8);

        remainder += step;
        pos += (remainder >> 16) as usize;
        remainder &= 0xffff;
    }
    out
}
