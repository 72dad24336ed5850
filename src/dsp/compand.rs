//! Soft-limiting compander (spec §4.E "compand"), substituted for the
//! linear volume node whenever the combined gain exceeds 1.0 so
//! amplification can't clip.
//!
//! Parameters are hard-coded policy values, not tunable at construction:
//! attack 0.1s, decay 0.2s, a single knee point at -2dB/-2dB, knee width
//! 0.02, lookahead delay 0.2s. Exposed as `PARAMS` rather than as a
//! constructor argument.

/// Fixed policy constants for the soft-limiter curve.
#[derive(Debug, Clone, Copy)]
pub struct CompandParams {
    pub attack_seconds: f64,
    pub decay_seconds: f64,
    pub knee_point_db: f64,
    pub knee_width_db: f64,
    pub delay_seconds: f64,
}

pub const PARAMS: CompandParams = CompandParams {
    attack_seconds: 0.1,
    decay_seconds: 0.2,
    knee_point_db: -2.0,
    knee_width_db: 0.02,
    delay_seconds: 0.2,
};

/// Per-item envelope state; carried across buffers of the same decode head
/// so attack/decay behave continuously instead of resetting every block.
#[derive(Debug, Clone, Copy)]
pub struct CompandState {
    envelope_db: f64,
}

impl CompandState {
    pub fn new() -> CompandState {
        CompandState {
            envelope_db: -120.0,
        }
    }
}

impl Default for CompandState {
    fn default() -> Self {
        CompandState::new()
    }
}

fn linear_to_db(x: f64) -> f64 {
    20.0 * x.abs().max(1e-9).log10()
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Target gain reduction (dB, ≤ 0) for an instantaneous signal level,
/// softened across `knee_width_db` around `knee_point_db`.
fn target_gain_db(level_db: f64, params: &CompandParams) -> f64 {
    let over = level_db - params.knee_point_db;
    if over <= -params.knee_width_db / 2.0 {
        0.0
    } else if over >= params.knee_width_db / 2.0 {
        -over
    } else {
        let knee_pos = over + params.knee_width_db / 2.0;
        -(knee_pos * knee_pos) / (2.0 * params.knee_width_db)
    }
}

/// Applies the compander to a planar frame, updating `state` in place so
/// the envelope carries over to the next buffer of the same item.
pub fn apply_compand(
    samples: &mut [Vec<f64>],
    pre_gain: f64,
    sample_rate: u32,
    state: &mut CompandState,
    params: &CompandParams,
) {
    let frame_count = samples.first().map(|c| c.len()).unwrap_or(0);
    let attack_coef = 1.0 - (-1.0 / (params.attack_seconds * sample_rate as f64)).exp();
    let decay_coef = 1.0 - (-1.0 / (params.decay_seconds * sample_rate as f64)).exp();

    for i in 0..frame_count {
        let peak = samples
            .iter()
            .map(|ch| ch[i].abs() * pre_gain)
            .fold(0.0f64, f64::max);
        let level_db = linear_to_db(peak);
        let target_db = target_gain_db(level_db, params);

        let coef = if target_db < state.envelope_db {
            attack_coef
        } else {
            decay_coef
        };
        state.envelope_db += (target_db - state.envelope_db) * coef;
        let gain = pre_gain * db_to_linear(state.envelope_db);

        for channel in samples.iter_mut() {
            channel[i] = (channel[i] * gain).clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_signal_passes_near_unity_after_settling() {
        let mut samples = vec![vec![0.1; 2000]];
        let mut state = CompandState::new();
        apply_compand(&mut samples, 1.0, 44_100, &mut state, &PARAMS);
        assert!((samples[0].last().unwrap() - 0.1).abs() < 0.02);
    }

    #[test]
    fn loud_amplified_signal_never_exceeds_unity() {
        let mut samples = vec![vec![0.95; 4000]];
        let mut state = CompandState::new();
        apply_compand(&mut samples, 2.0, 44_100, &mut state, &PARAMS);
        assert!(samples[0].iter().all(|s| s.abs() <= 1.0));
    }
}
