// w3d-parsers/src/scene/animation.rs
//! Animation decoding: channel blobs to per-frame vectors bound to pivots

use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::pivots::PivotForest;
use crate::registry::ChunkKind;
use crate::traits::{ParseError, ParseResult};
use crate::w3d::{AnimationChannel, AnimationHeader, BitChannel, ChunkTree};

/// Property driven by an animation channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChannelKind {
    X,
    Y,
    Z,
    XRotation,
    YRotation,
    ZRotation,
    Quaternion,
}

impl ChannelKind {
    pub fn from_flags(flags: u16) -> Option<Self> {
        Some(match flags {
            0 => ChannelKind::X,
            1 => ChannelKind::Y,
            2 => ChannelKind::Z,
            3 => ChannelKind::XRotation,
            4 => ChannelKind::YRotation,
            5 => ChannelKind::ZRotation,
            6 => ChannelKind::Quaternion,
            _ => return None,
        })
    }

    /// Short label: X, Y, Z, XR, YR, ZR or Q
    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::X => "X",
            ChannelKind::Y => "Y",
            ChannelKind::Z => "Z",
            ChannelKind::XRotation => "XR",
            ChannelKind::YRotation => "YR",
            ChannelKind::ZRotation => "ZR",
            ChannelKind::Quaternion => "Q",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pivot an animation channel drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotTarget {
    /// Pivot tree name
    pub tree: String,
    pub index: usize,
    pub name: String,
}

/// One frame's vector; 1 component for translation and Euler channels, 4
/// for quaternions
pub type Frame = SmallVec<[f32; 4]>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedChannel {
    pub kind: ChannelKind,
    /// Pivot index as stored in the channel
    pub pivot: u16,
    /// `None` when no pivot tree matches the animation's hierarchy
    pub target: Option<PivotTarget>,
    pub first_frame: u16,
    pub last_frame: u16,
    pub vector_len: u16,
    /// Frames `first_frame..=last_frame`
    pub frames: Vec<Frame>,
}

impl DecodedChannel {
    /// Decode the sample blob of a raw channel. The blob must hold exactly
    /// one vector per frame.
    pub fn decode(channel: &AnimationChannel, kind: ChannelKind) -> ParseResult<Self> {
        let expected = channel.expected_data_len();
        if channel.last_frame < channel.first_frame || channel.data.len() != expected {
            return Err(ParseError::LengthMismatch {
                context: format!("{kind} channel of pivot {}", channel.pivot),
                expected,
                actual: channel.data.len(),
            });
        }

        let frame_bytes = usize::from(channel.vector_len) * 4;
        let frames = if frame_bytes == 0 {
            Vec::new()
        } else {
            channel
                .data
                .chunks_exact(frame_bytes)
                .map(|frame| {
                    frame
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect()
                })
                .collect()
        };

        Ok(Self {
            kind,
            pivot: channel.pivot,
            target: None,
            first_frame: channel.first_frame,
            last_frame: channel.last_frame,
            vector_len: channel.vector_len,
            frames,
        })
    }

    /// Vector at `frame`, clamped to the defined range
    pub fn sample(&self, frame: u32) -> Option<&Frame> {
        let first = u32::from(self.first_frame);
        let last = u32::from(self.last_frame);
        let index = frame.clamp(first, last) - first;
        self.frames.get(index as usize)
    }
}

/// Per-frame visibility of a pivot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilityTrack {
    pub pivot: u16,
    pub target: Option<PivotTarget>,
    pub first_frame: u16,
    pub last_frame: u16,
    pub default_visible: bool,
    /// One bit per frame, least significant bit first
    pub bits: Vec<u8>,
}

impl VisibilityTrack {
    pub fn new(channel: &BitChannel) -> Self {
        Self {
            pivot: channel.pivot,
            target: None,
            first_frame: channel.first_frame,
            last_frame: channel.last_frame,
            default_visible: channel.default_value != 0,
            bits: channel.bits.clone(),
        }
    }

    pub fn is_visible(&self, frame: u32) -> bool {
        if frame < u32::from(self.first_frame) || frame > u32::from(self.last_frame) {
            return self.default_visible;
        }
        let bit = (frame - u32::from(self.first_frame)) as usize;
        self.bits
            .get(bit / 8)
            .map_or(self.default_visible, |byte| (*byte >> (bit % 8)) & 1 == 1)
    }
}

/// A decoded ANIMATION
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Animation {
    pub name: String,
    pub hierarchy_name: String,
    pub num_frames: u32,
    pub frame_rate: u32,
    pub channels: Vec<DecodedChannel>,
    pub visibility: Vec<VisibilityTrack>,
}

fn resolve_target(forest: &PivotForest, hierarchy: &str, pivot: u16) -> Option<PivotTarget> {
    let tree = forest.for_hierarchy(hierarchy)?;
    let p = tree.get(usize::from(pivot))?;
    Some(PivotTarget {
        tree: tree.name.clone(),
        index: p.index,
        name: p.name.clone(),
    })
}

/// Decode every top-level ANIMATION and bind its channels to pivots.
pub fn decode_animations(tree: &ChunkTree, forest: &PivotForest) -> ParseResult<Vec<Animation>> {
    let mut animations = Vec::new();

    for anim in tree.find(None, ChunkKind::Animation) {
        let header = tree
            .get_record::<AnimationHeader>(Some(anim), ChunkKind::AnimationHeader)
            .ok_or_else(|| ParseError::MissingField("ANIMATION_HEADER of animation".to_string()))?;

        let mut channels = Vec::new();
        for id in tree.find(Some(anim), ChunkKind::AnimationChannel) {
            let Some(raw) = tree.record::<AnimationChannel>(id) else {
                continue;
            };
            let Some(kind) = ChannelKind::from_flags(raw.flags) else {
                warn!(animation = %header.name, flags = raw.flags, pivot = raw.pivot, "Skipping channel of unknown type");
                continue;
            };

            let mut channel = DecodedChannel::decode(raw, kind)
                .map_err(|e| e.with_context(format!("animation {}", header.name)))?;
            channel.target = resolve_target(forest, &header.hierarchy_name, raw.pivot);
            if channel.target.is_none() {
                warn!(
                    animation = %header.name,
                    hierarchy = %header.hierarchy_name,
                    pivot = raw.pivot,
                    "Channel pivot not found"
                );
            }
            channels.push(channel);
        }

        let visibility = tree
            .find_records_rec::<BitChannel>(Some(anim), ChunkKind::BitChannel)
            .into_iter()
            .map(|raw| {
                let mut track = VisibilityTrack::new(raw);
                track.target = resolve_target(forest, &header.hierarchy_name, raw.pivot);
                track
            })
            .collect();

        debug!(animation = %header.name, channels = channels.len(), "Decoded animation");
        animations.push(Animation {
            name: header.name.clone(),
            hierarchy_name: header.hierarchy_name.clone(),
            num_frames: header.num_frames,
            frame_rate: header.frame_rate,
            channels,
            visibility,
        });
    }

    Ok(animations)
}
