//! Grouping raw transcript segments into retrievable units.
//!
//! Whisper segments are often a handful of words long. Indexing them one by
//! one makes every hit too short to answer anything, so consecutive segments
//! are combined into fixed-size windows.

use crate::transcription::TranscriptSegment;
use serde::{Deserialize, Serialize};

/// The retrievable unit: several consecutive transcript segments of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentGroup {
    /// Display name of the video the group came from.
    pub video_id: String,
    /// Contiguous sequence number within the collection (0, 1, 2, ...).
    pub group_index: u32,
    /// Start of the first member segment, in seconds.
    pub start_time: f64,
    /// End of the last member segment, in seconds.
    pub end_time: f64,
    /// Member texts joined with single spaces.
    pub text: String,
}

impl SegmentGroup {
    /// Entry id inside a collection.
    pub fn entry_id(group_index: u32) -> String {
        format!("g{:08}", group_index)
    }
}

/// Combine consecutive segments into windows of `group_size`.
///
/// Produces `ceil(N / group_size)` groups; the last one may be shorter.
/// A `group_size` of zero is treated as one.
pub fn group_segments(
    video_id: &str,
    segments: &[TranscriptSegment],
    group_size: usize,
) -> Vec<SegmentGroup> {
    segments
        .chunks(group_size.max(1))
        .enumerate()
        .filter_map(|(index, members)| {
            let first = members.first()?;
            let last = members.last()?;
            let text = members
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            Some(SegmentGroup {
                video_id: video_id.to_string(),
                group_index: index as u32,
                start_time: first.start_seconds,
                end_time: last.end_seconds,
                text,
            })
        })
        .collect()
}
