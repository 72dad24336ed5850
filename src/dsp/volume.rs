//! Linear gain stage (spec §4.E "Volume node").
//!
//! Samples inside the filter graph are planar `f64`, normalized to
//! `[-1.0, 1.0]`. Applying a linear gain here is a plain scalar multiply —
//! fixed-point integer tricks buy nothing once samples are already
//! floating point, so this stays a straight multiply-and-clamp.

/// Converts a decibel gain to a linear multiplier.
pub fn db_to_linear(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}

/// Applies `gain` (linear, not dB) in place to every channel of a planar
/// frame, clamping to the representable range.
pub fn apply_gain(samples: &mut [Vec<f64>], gain: f64) {
    for channel in samples.iter_mut() {
        for sample in channel.iter_mut() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }
}
