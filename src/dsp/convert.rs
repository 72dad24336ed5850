//! Sample-format conversion (spec §4.E "aformat"): packs planar `f64`
//! filter-graph samples into the raw bytes a [`Buffer`](crate::buffer::Buffer)
//! carries, in the target [`AudioFormat`]'s sample format and interleaving.
//!
//! Full-scale values follow the usual signed-PCM convention: each integer
//! format's positive full scale is `2^(bits-1) - 1`.

use crate::format::{AudioFormat, SampleFormat};

fn full_scale(format: SampleFormat) -> f64 {
    match format {
        SampleFormat::U8 => 127.0,
        SampleFormat::S16 => 32_767.0,
        SampleFormat::S24 => 8_388_607.0,
        SampleFormat::S32 => 2_147_483_647.0,
        SampleFormat::F32 | SampleFormat::F64 => 1.0,
    }
}

fn write_sample(out: &mut Vec<u8>, value: f64, format: SampleFormat) {
    let scale = full_scale(format);
    match format {
        SampleFormat::U8 => {
            let v = ((value.clamp(-1.0, 1.0) * scale) as i32 + 128) as u8;
            out.push(v);
        }
        SampleFormat::S16 => {
            let v = (value.clamp(-1.0, 1.0) * scale).round() as i16;
            out.extend_from_slice(&v.to_ne_bytes());
        }
        SampleFormat::S24 => {
            let v = (value.clamp(-1.0, 1.0) * scale).round() as i32;
            let bytes = v.to_ne_bytes();
            // Low three bytes of the native i32 representation.
            if cfg!(target_endian = "little") {
                out.extend_from_slice(&bytes[0..3]);
            } else {
                out.extend_from_slice(&bytes[1..4]);
            }
        }
        SampleFormat::S32 => {
            let v = (value.clamp(-1.0, 1.0) * scale).round() as i32;
            out.extend_from_slice(&v.to_ne_bytes());
        }
        SampleFormat::F32 => {
            let v = value as f32;
            out.extend_from_slice(bytemuck::bytes_of(&v));
        }
        SampleFormat::F64 => {
            out.extend_from_slice(bytemuck::bytes_of(&value));
        }
    }
}

/// Packs a planar `f64` frame (`samples[channel][frame]`) into raw bytes
/// matching `format`'s sample format and planarity.
pub fn pack_samples(samples: &[Vec<f64>], format: &AudioFormat) -> Vec<u8> {
    let channel_count = samples.len();
    let frame_count = samples.first().map(|c| c.len()).unwrap_or(0);
    let mut out = Vec::with_capacity(frame_count * format.bytes_per_frame());

    if format.is_planar {
        for channel in samples {
            for &sample in channel {
                write_sample(&mut out, sample, format.sample_format);
            }
        }
    } else {
        for frame_idx in 0..frame_count {
            for channel in samples.iter().take(channel_count) {
                write_sample(&mut out, channel[frame_idx], format.sample_format);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ChannelLayout;

    #[test]
    fn interleaved_s16_has_expected_byte_length() {
        let samples = vec![vec![0.5, -0.5], vec![0.25, -0.25]];
        let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
        let bytes = pack_samples(&samples, &fmt);
        assert_eq!(bytes.len(), 2 /* frames */ * 2 /* channels */ * 2 /* bytes */);
    }

    #[test]
    fn planar_f32_round_trips_through_native_bytes() {
        let samples = vec![vec![1.0, -1.0]];
        let fmt = AudioFormat::new(44_100, ChannelLayout::mono(), SampleFormat::F32, true);
        let bytes = pack_samples(&samples, &fmt);
        let first: f32 = f32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(first, 1.0);
    }
}
