//! Audio format value types (spec §3 "AudioFormat").

/// One sample encoding. Mirrors the set `libgroove` exposes through
/// `libav`'s `AVSampleFormat`, trimmed to the planar-agnostic subset the
/// core actually needs to reason about (planarity is tracked separately on
/// [`AudioFormat`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S16,
    S24,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// Size in bytes of one sample in this format.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
            SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

/// A single loudspeaker position. Ordering within a [`ChannelLayout`]
/// matters: it defines the interleaving order of a multi-channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    SideLeft,
    SideRight,
}

/// Ordered list of channel positions. Two layouts are the same layout iff
/// they contain the same channels in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelLayout(Vec<Channel>);

impl ChannelLayout {
    pub fn new(channels: Vec<Channel>) -> Self {
        ChannelLayout(channels)
    }

    pub fn mono() -> Self {
        ChannelLayout(vec![Channel::FrontCenter])
    }

    pub fn stereo() -> Self {
        ChannelLayout(vec![Channel::FrontLeft, Channel::FrontRight])
    }

    /// Fallback layout derived from a bare channel count, used when a
    /// container doesn't carry an explicit layout tag (spec §4.C "Opening").
    pub fn from_channel_count(count: usize) -> Self {
        match count {
            1 => ChannelLayout::mono(),
            2 => ChannelLayout::stereo(),
            n => ChannelLayout(
                std::iter::repeat(Channel::FrontLeft)
                    .take(n)
                    .collect::<Vec<_>>(),
            ),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.0.len()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.0
    }

    pub fn contains_set(&self, other: &ChannelLayout) -> bool {
        other.0.iter().all(|c| self.0.contains(c))
    }
}

/// A fully-specified PCM shape: rate, channel layout, sample encoding, and
/// interleaving. Two formats compare equal iff all four fields match
/// (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    pub sample_format: SampleFormat,
    pub is_planar: bool,
}

impl AudioFormat {
    pub fn new(
        sample_rate: u32,
        channel_layout: ChannelLayout,
        sample_format: SampleFormat,
        is_planar: bool,
    ) -> Self {
        AudioFormat {
            sample_rate,
            channel_layout,
            sample_format,
            is_planar,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_layout.channel_count()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channel_count()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_requires_all_four_fields() {
        let a = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
        let b = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
        let c = AudioFormat::new(48_000, ChannelLayout::stereo(), SampleFormat::S16, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fallback_layout_from_channel_count() {
        assert_eq!(ChannelLayout::from_channel_count(1), ChannelLayout::mono());
        assert_eq!(ChannelLayout::from_channel_count(2), ChannelLayout::stereo());
    }

    #[test]
    fn bytes_per_frame_accounts_for_channels_and_format() {
        let fmt = AudioFormat::new(48_000, ChannelLayout::stereo(), SampleFormat::S16, false);
        assert_eq!(fmt.bytes_per_frame(), 4);
        assert_eq!(fmt.bytes_per_second(), 192_000);
    }
}
