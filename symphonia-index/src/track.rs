// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `track` module defines `Track`, a per-stream ordered frame directory, and the lookups a
//! frame reader uses to seek within it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::{parser_error, ErrorKind, Result};
use crate::frame::FrameInfo;
use crate::units::Timebase;

/// The kind of stream a `Track` indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackType {
    Unknown,
    Video,
    Audio,
    Data,
    /// No indexing behaviour of its own; kept so that a container's subtitle streams are
    /// represented as a real track rather than collapsed into `Data`.
    Subtitle,
}

/// A per-stream ordered frame directory.
///
/// Constructed empty and appended to monotonically while indexing. Possibly reordered once, at
/// finalization (`crate::index::Index::sort`), and immutable thereafter.
#[derive(Clone, Debug)]
pub struct Track {
    pub track_type: TrackType,
    pub timebase: Timebase,
    /// `true` if the indexer stored DTS in `pts` because PTS was absent on at least one packet.
    pub use_dts: bool,
    /// `true` if any usable timestamp was observed for this track.
    pub has_ts: bool,
    frames: Vec<FrameInfo>,
}

impl Track {
    pub fn new(track_type: TrackType, timebase: Timebase) -> Self {
        Track { track_type, timebase, use_dts: false, has_ts: false, frames: Vec::new() }
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut Vec<FrameInfo> {
        &mut self.frames
    }

    pub fn push(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns the index of the first frame with an exact `pts` match.
    pub fn frame_from_pts(&self, pts: i64) -> Option<usize> {
        self.frames.iter().position(|f| f.pts == pts)
    }

    /// Returns the index of the first frame with an exact `file_pos` match.
    pub fn frame_from_pos(&self, pos: i64) -> Option<usize> {
        self.frames.iter().position(|f| f.file_pos == pos)
    }

    /// Returns the index of the frame whose `pts` is closest to the target, assuming the track
    /// is in presentation order. Ties are broken toward the lower index.
    pub fn closest_frame_from_pts(&self, pts: i64) -> usize {
        assert!(!self.frames.is_empty(), "closest_frame_from_pts on an empty track");

        if self.frames.len() == 1 {
            return 0;
        }

        if pts <= self.frames[0].pts {
            return 0;
        }

        let last = self.frames.len() - 1;
        if pts >= self.frames[last].pts {
            return last;
        }

        // Binary search for the first frame whose pts is >= target.
        let mut lo = 0usize;
        let mut hi = last;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.frames[mid].pts < pts {
                lo = mid + 1;
            }
            else {
                hi = mid;
            }
        }

        if lo == 0 {
            return 0;
        }

        let next = lo;
        let prev = lo - 1;

        let d_next = (self.frames[next].pts - pts).abs();
        let d_prev = (pts - self.frames[prev].pts).abs();

        if d_next < d_prev {
            next
        }
        else {
            prev
        }
    }

    /// Given a presentation-order frame index, returns the index of the key frame that must be
    /// decoded from in order to display it.
    ///
    /// Scans backward in presentation order to the first key frame, then follows that frame's
    /// `original_pos` back into decode order and scans backward again, since a key frame's
    /// decode-order predecessors may themselves need to be skipped past to find the true
    /// decode-order key frame boundary.
    pub fn find_closest_video_keyframe(&self, frame: usize) -> usize {
        assert!(!self.frames.is_empty(), "find_closest_video_keyframe on an empty track");

        let clamped = frame.min(self.frames.len() - 1);

        let mut presentation_kf = clamped;
        while !self.frames[presentation_kf].key_frame && presentation_kf > 0 {
            presentation_kf -= 1;
        }

        let decode_pos = self.frames[presentation_kf].original_pos.min(self.frames.len() - 1);

        let mut decode_kf = decode_pos;
        while !self.frames[decode_kf].key_frame && decode_kf > 0 {
            decode_kf -= 1;
        }

        decode_kf
    }

    /// Writes a "timecode format v2" text file: a literal header line, then one line per frame
    /// containing that frame's presentation time in seconds, in decode order.
    pub fn write_timecodes(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| parser_error(ErrorKind::FileRead, format!("failed to create '{}': {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_all(b"# timecode format v2\n")
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;

        for frame in &self.frames {
            let seconds = self.timebase.ticks_to_seconds_f64(frame.pts);
            writeln!(writer, "{:.6}", seconds)
                .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;
        }

        writer
            .flush()
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;

        Ok(())
    }

    /// Writes a "keyframe format v1" text file: a literal header, an `fps 0` line, then one
    /// decode-order frame index per line for every key frame.
    pub fn write_keyframes(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| parser_error(ErrorKind::FileRead, format!("failed to create '{}': {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_all(b"# keyframe format v1\nfps 0\n")
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;

        for (i, frame) in self.frames.iter().enumerate() {
            if frame.key_frame {
                writeln!(writer, "{}", i)
                    .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;
            }
        }

        writer
            .flush()
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write '{}': {}", path.display(), e)))?;

        Ok(())
    }
}
