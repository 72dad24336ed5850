//! The rebuildable filter-graph chain (spec §4.E).
//!
//! Rather than a string-configured external graph, this crate realizes the
//! chain directly as typed Rust stages (spec §9 C.2): volume-or-compand →
//! optional split → per-group volume → optional aformat. "Rebuilding" the
//! graph is cheap here — there is no external graph object to recompile —
//! but the shape (which gain stage, whether a split exists, which groups
//! need `aformat`) is still tracked so a transition can be logged the way
//! the original logs an actual `avfilter_graph` rebuild.

use crate::codec::DecodedFrame;
use crate::dsp::{channel_map, compand, convert, resample, volume};
use crate::format::AudioFormat;

/// Per-group gain and target output format, supplied by the decoder loop
/// from the current sink map (spec §4.D, §4.E "per-group aformat").
#[derive(Debug, Clone)]
pub struct GroupTarget {
    pub gain: f64,
    pub format: AudioFormat,
}

/// One group's filtered, converted output, ready to wrap as a `Buffer`.
pub struct GroupOutput {
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
    pub frame_count: usize,
}

/// A coarse description of the chain currently in effect, compared against
/// the previous call to decide whether a rebuild happened (spec §4.E
/// "Built on demand whenever ... differ from the last-built values").
#[derive(Debug, Clone, PartialEq)]
struct GraphShape {
    uses_compand: bool,
    group_count: usize,
    input_format: (u32, usize, bool),
}

/// Owns the state that must persist across frames: the compander's
/// envelope follower and the last-seen shape (for rebuild logging).
pub struct FilterGraph {
    compand_state: compand::CompandState,
    last_shape: Option<GraphShape>,
}

impl FilterGraph {
    pub fn new() -> FilterGraph {
        FilterGraph {
            compand_state: compand::CompandState::new(),
            last_shape: None,
        }
    }

    /// Forces the next `process()` call to log a rebuild even if the shape
    /// it computes happens to match the previous frame's — how the
    /// decoder honors `rebuild_graph` being set by attach/detach or a gain
    /// change (spec §4.E "Built on demand whenever ... a rebuild flag is
    /// set by attach/detach or by a gain change").
    pub fn force_rebuild(&mut self) {
        self.last_shape = None;
    }

    /// Runs one decoded frame through the chain and produces one output
    /// per group. `combined_gain` is `playlist_gain * item_gain *
    /// min(1, item_peak)` (spec §4.E "Volume node").
    pub fn process(
        &mut self,
        frame: &DecodedFrame,
        combined_gain: f64,
        groups: &[GroupTarget],
    ) -> Vec<GroupOutput> {
        let uses_compand = combined_gain > 1.0;
        let shape = GraphShape {
            uses_compand,
            group_count: groups.len(),
            input_format: (
                frame.sample_rate,
                frame.channel_layout.channel_count(),
                uses_compand,
            ),
        };
        if self.last_shape.as_ref() != Some(&shape) {
            tracing::debug!(
                uses_compand,
                groups = groups.len(),
                sample_rate = frame.sample_rate,
                "filter graph rebuilt"
            );
            self.last_shape = Some(shape);
        }

        let mut samples = frame.samples.clone();
        if uses_compand {
            compand::apply_compand(
                &mut samples,
                combined_gain,
                frame.sample_rate,
                &mut self.compand_state,
                &compand::PARAMS,
            );
        } else {
            volume::apply_gain(&mut samples, combined_gain);
        }

        groups
            .iter()
            .map(|group| self.finish_group(&samples, frame, group))
            .collect()
    }

    fn finish_group(
        &self,
        samples: &[Vec<f64>],
        frame: &DecodedFrame,
        group: &GroupTarget,
    ) -> GroupOutput {
        let mut gained = samples.to_vec();
        volume::apply_gain(&mut gained, group.gain);

        let needs_remap = frame.channel_layout != group.format.channel_layout;
        let remapped = if needs_remap {
            channel_map::remap(&gained, &frame.channel_layout, &group.format.channel_layout)
        } else {
            gained
        };

        let needs_resample = frame.sample_rate != group.format.sample_rate;
        let resampled = if needs_resample {
            resample::resample(&remapped, frame.sample_rate, group.format.sample_rate)
        } else {
            remapped
        };

        let frame_count = resampled.first().map(|c| c.len()).unwrap_or(0);
        let bytes = convert::pack_samples(&resampled, &group.format);

        GroupOutput {
            format: group.format.clone(),
            bytes,
            frame_count,
        }
    }
}

impl Default for FilterGraph {
    fn default() -> Self {
        FilterGraph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, SampleFormat};

    fn frame() -> DecodedFrame {
        DecodedFrame {
            samples: vec![vec![0.5, 0.4, 0.3], vec![-0.5, -0.4, -0.3]],
            sample_rate: 44_100,
            channel_layout: ChannelLayout::stereo(),
            pts: Some(0),
        }
    }

    #[test]
    fn single_group_passthrough_format_keeps_frame_count() {
        let mut graph = FilterGraph::new();
        let target = GroupTarget {
            gain: 1.0,
            format: AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false),
        };
        let outputs = graph.process(&frame(), 1.0, std::slice::from_ref(&target));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].frame_count, 3);
        assert_eq!(outputs[0].bytes.len(), 3 * 2 * 2);
    }

    #[test]
    fn two_groups_receive_independently_shaped_output() {
        let mut graph = FilterGraph::new();
        let a = GroupTarget {
            gain: 1.0,
            format: AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false),
        };
        let b = GroupTarget {
            gain: 1.0,
            format: AudioFormat::new(48_000, ChannelLayout::mono(), SampleFormat::F32, false),
        };
        let outputs = graph.process(&frame(), 1.0, &[a, b]);
        assert_eq!(outputs.len(), 2);
        assert_ne!(outputs[0].format, outputs[1].format);
    }

    #[test]
    fn gain_above_unity_routes_through_compand_not_volume() {
        let mut graph = FilterGraph::new();
        let target = GroupTarget {
            gain: 1.0,
            format: AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::F32, false),
        };
        let outputs = graph.process(&frame(), 1.5, std::slice::from_ref(&target));
        assert_eq!(outputs.len(), 1);
    }
}
