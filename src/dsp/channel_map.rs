//! Channel remapping (part of spec §4.E "aformat"): reshapes a planar
//! frame from one [`ChannelLayout`] to another.

use crate::format::{Channel, ChannelLayout};

/// Builds a `target.channel_count()`-long frame from `source`, taking each
/// target channel from the matching source channel when present, and
/// falling back to the nearest front channel (or silence for LFE) when it
/// isn't — the same "best effort, never fail" rule the original's
/// `aformat`/`channelmap` nodes apply rather than rejecting the stream.
pub fn remap(samples: &[Vec<f64>], source: &ChannelLayout, target: &ChannelLayout) -> Vec<Vec<f64>> {
    if source == target {
        return samples.to_vec();
    }
    let frame_count = samples.first().map(|c| c.len()).unwrap_or(0);
    target
        .channels()
        .iter()
        .map(|&ch| match source.channels().iter().position(|&c| c == ch) {
            Some(idx) => samples[idx].clone(),
            None => fallback_channel(samples, source, ch, frame_count),
        })
        .collect()
}

fn fallback_channel(
    samples: &[Vec<f64>],
    source: &ChannelLayout,
    target_channel: Channel,
    frame_count: usize,
) -> Vec<f64> {
    if target_channel == Channel::LowFrequency {
        return vec![0.0; frame_count];
    }
    // Source is already mono: reuse its one channel directly (this is what
    // lets mono-to-stereo duplicate the source into both target channels).
    if source.channel_count() == 1 {
        return samples[0].clone();
    }
    // Otherwise reuse front-left as the closest available source.
    let idx = source
        .channels()
        .iter()
        .position(|&c| c == Channel::FrontLeft)
        .unwrap_or(0);
    samples[idx].clone()
}
