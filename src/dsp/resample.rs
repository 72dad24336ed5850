//! Resampler (part of spec §4.E "aformat" / §6 "resampler/remixer
//! /format-converter"), backed by `soxr` the same way the teacher's
//! `dsp::resampling` wraps it — generalized here from a hardcoded stereo
//! pair to an arbitrary channel count by running one mono `Soxr` instance
//! per channel vector.

use soxr::format::Mono;
use soxr::params::{QualityRecipe, QualitySpec, RuntimeSpec};
use soxr::Soxr;

/// Resamples a planar frame from `source_rate` to `target_rate` through
/// libsoxr at high quality. A no-op when the rates already match. Falls
/// back to passing the channel through unresampled if `soxr` fails to
/// build or process it — a decode error shouldn't be fatal to the stream,
/// matching spec §4.F's "errors are local, the decoder continues" rule.
pub fn resample(samples: &[Vec<f64>], source_rate: u32, target_rate: u32) -> Vec<Vec<f64>> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    let source_len = samples.first().map(|c| c.len()).unwrap_or(0);
    if source_len == 0 {
        return samples.iter().map(|_| Vec::new()).collect();
    }
    let output_len = ((source_len as f64) * target_rate as f64 / source_rate as f64).ceil() as usize;

    samples
        .iter()
        .map(|channel| resample_channel(channel, source_rate, target_rate, output_len))
        .collect()
}

fn resample_channel(channel: &[f64], source_rate: u32, target_rate: u32, output_len: usize) -> Vec<f64> {
    let quality = QualitySpec::new(QualityRecipe::high());
    let rt = RuntimeSpec::default();
    let mut soxr = match Soxr::<Mono<f32>>::new_with_params(source_rate as f64, target_rate as f64, quality, rt) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(error = %err, source_rate, target_rate, "soxr init failed, passing channel through unresampled");
            return channel.to_vec();
        }
    };

    let input: Vec<f32> = channel.iter().map(|&s| s as f32).collect();
    let mut output = vec![0.0f32; output_len];
    if let Err(err) = soxr.process(&input, &mut output) {
        tracing::warn!(error = %err, source_rate, target_rate, "soxr resample failed, passing channel through unresampled");
        return channel.to_vec();
    }
    output.into_iter().map(|s| s as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rates_are_a_no_op() {
        let samples = vec![vec![1.0, 2.0, 3.0]];
        let out = resample(&samples, 44_100, 44_100);
        assert_eq!(out, samples);
    }

    #[test]
    fn upsampling_roughly_scales_frame_count() {
        let samples = vec![(0..1000).map(|i| i as f64).collect::<Vec<_>>()];
        let out = resample(&samples, 44_100, 48_000);
        let expected = (1000.0 * 48_000.0 / 44_100.0) as usize;
        assert!((out[0].len() as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn downsampling_halves_the_frame_count() {
        let samples = vec![(0..2000).map(|i| (i as f64 / 100.0).sin()).collect::<Vec<_>>()];
        let out = resample(&samples, 4, 2);
        assert_eq!(out[0].len(), 1000);
    }

    #[test]
    fn every_channel_is_resampled_independently() {
        let samples = vec![
            (0..1000).map(|i| i as f64).collect::<Vec<_>>(),
            (0..1000).map(|i| -(i as f64)).collect::<Vec<_>>(),
        ];
        let out = resample(&samples, 44_100, 22_050);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), out[1].len());
    }
}
