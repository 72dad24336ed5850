//! `SinkMap`: groups attached sinks by compatible output format so they
//! can share one filter-graph branch (spec §3 "SinkMap", §4.D).

use std::sync::Arc;

use crate::format::AudioFormat;
use crate::sink::{Sink, SinkFormatSpec, SinkId};

/// A set of sinks that all accept one common output format. `example`'s
/// spec is the most restrictive in the group — its resolved format is the
/// one `aformat` targets for every member.
pub struct SinkGroup {
    pub example: Arc<Sink>,
    pub members: Vec<Arc<Sink>>,
}

impl SinkGroup {
    fn new(sink: Arc<Sink>) -> SinkGroup {
        SinkGroup {
            example: sink,
            members: Vec::new(),
        }
    }

    /// Every sink this group feeds: the example plus its stacked members.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Sink>> {
        std::iter::once(&self.example).chain(self.members.iter())
    }

    /// The format the group's filter-graph branch should emit, resolved
    /// against a decoder-side candidate input format (spec §4.E "per-group
    /// aformat").
    pub fn output_format(&self, input: &AudioFormat) -> AudioFormat {
        self.example.spec().preferred_format(input)
    }
}

/// Whether `new_sink`'s acceptance set is a superset of `existing`'s — the
/// "accepted" test spec §4.D defines: block size, gain, and every format
/// axis of `existing` must fall inside what `new_sink` allows.
fn accepts(new_sink: &Sink, existing: &Sink) -> bool {
    if (new_sink.gain() - existing.gain()).abs() > f64::EPSILON {
        return false;
    }
    let new_spec = new_sink.spec();
    let existing_spec = existing.spec();
    if !new_spec.block_size_compatible(existing_spec.block_size) {
        return false;
    }
    existing_spec
        .sample_rates
        .iter()
        .all(|r| {
            new_spec
                .sample_rates
                .iter()
                .any(|nr| *nr.start() <= *r.start() && *r.end() <= *nr.end())
        })
        && existing_spec
            .sample_formats
            .iter()
            .all(|f| new_spec.sample_formats.contains(f))
        && existing_spec
            .channel_layouts
            .iter()
            .all(|l| new_spec.channel_layouts.contains(l))
        && ((existing_spec.planar_ok && new_spec.planar_ok)
            || (existing_spec.interleaved_ok && new_spec.interleaved_ok))
}

/// Built from the attached sinks; one group per distinct output format
/// (spec §3 "SinkMap").
pub struct SinkMap {
    groups: Vec<SinkGroup>,
}

impl SinkMap {
    pub fn new() -> SinkMap {
        SinkMap { groups: Vec::new() }
    }

    pub fn groups(&self) -> &[SinkGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn all_sinks(&self) -> Vec<Arc<Sink>> {
        self.groups.iter().flat_map(|g| g.all().cloned()).collect()
    }

    /// Place `sink` according to spec §4.D's three-way rule, evaluated
    /// against each existing group in order.
    pub fn attach(&mut self, sink: Arc<Sink>) {
        for group in self.groups.iter_mut() {
            if accepts(&sink, &group.example) {
                group.members.push(sink);
                return;
            }
            if accepts(&group.example, &sink) {
                let old_example = std::mem::replace(&mut group.example, sink);
                group.members.push(old_example);
                return;
            }
        }
        self.groups.push(SinkGroup::new(sink));
    }

    /// Remove `id` from whichever group holds it. An emptied group
    /// disappears.
    pub fn detach(&mut self, id: SinkId) -> bool {
        for idx in 0..self.groups.len() {
            let group = &mut self.groups[idx];
            if group.example.id() == id {
                if let Some(new_example) = group.members.pop() {
                    group.example = new_example;
                } else {
                    self.groups.remove(idx);
                }
                return true;
            }
            if let Some(pos) = group.members.iter().position(|s| s.id() == id) {
                group.members.remove(pos);
                return true;
            }
        }
        false
    }
}

impl Default for SinkMap {
    fn default() -> Self {
        SinkMap::new()
    }
}
