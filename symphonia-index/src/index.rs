// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `index` module defines `Index`, the assembled set of tracks and file-identity stamps
//! produced by an indexing pass, and `IndexRef`, its shared-ownership handle.

use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use crate::errors::Result;
use crate::reorder::maybe_reorder;
use crate::signature::calculate_file_signature;
use crate::track::{Track, TrackType};

/// Identifies which packet source produced an `Index`, so that a decoder bound to a different
/// source refuses to consume it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecoderSource {
    Default,
    Lavf,
    Matroska,
    HaaliMpeg,
    HaaliOgg,
}

impl DecoderSource {
    /// The bit this source occupies in an "enabled sources" mask.
    pub fn bit(self) -> u32 {
        match self {
            DecoderSource::Default => 1 << 0,
            DecoderSource::Lavf => 1 << 1,
            DecoderSource::Matroska => 1 << 2,
            DecoderSource::HaaliMpeg => 1 << 3,
            DecoderSource::HaaliOgg => 1 << 4,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(DecoderSource::Default),
            1 => Some(DecoderSource::Lavf),
            2 => Some(DecoderSource::Matroska),
            3 => Some(DecoderSource::HaaliMpeg),
            4 => Some(DecoderSource::HaaliOgg),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            DecoderSource::Default => 0,
            DecoderSource::Lavf => 1,
            DecoderSource::Matroska => 2,
            DecoderSource::HaaliMpeg => 3,
            DecoderSource::HaaliOgg => 4,
        }
    }
}

/// The set of tracks produced by one indexing pass, plus the file identity that binds the
/// index to the file it was built from.
#[derive(Debug)]
pub struct Index {
    pub tracks: Vec<Track>,
    pub decoder_source: DecoderSource,
    pub file_size: i64,
    pub digest: [u8; 20],
}

impl Index {
    pub fn new(tracks: Vec<Track>, decoder_source: DecoderSource, file_size: i64, digest: [u8; 20]) -> Self {
        Index { tracks, decoder_source, file_size, digest }
    }

    /// Recomputes the signature of `path` and compares it against the signature this index was
    /// built from.
    pub fn compare_file_signature(&self, path: &Path) -> Result<bool> {
        let sig = calculate_file_signature(path)?;
        Ok(sig.file_size == self.file_size && sig.digest == self.digest)
    }

    /// Finalizes every track: trims a defensive trailing phantom frame, stamps decode-order
    /// positions, and for video tracks, reorders to presentation order.
    ///
    /// The `size > 2` guard on the phantom-frame trim is preserved exactly as observed in the
    /// source this is grounded on; tracks of size 0, 1, or 2 are never trimmed even when
    /// `front().pts >= back().pts` (see DESIGN.md).
    pub fn sort(&mut self) {
        for track in &mut self.tracks {
            sort_track(track);
        }
    }
}

fn sort_track(track: &mut Track) {
    let len = track.len();
    if len > 2 {
        let first_pts = track.frames()[0].pts;
        let last_pts = track.frames()[len - 1].pts;
        if first_pts >= last_pts {
            track.frames_mut().pop();
        }
    }

    for (i, frame) in track.frames_mut().iter_mut().enumerate() {
        frame.original_pos = i;
    }

    if track.track_type != TrackType::Video {
        return;
    }

    maybe_reorder(track.frames_mut());

    track.frames_mut().sort_by_key(|f| f.pts);

    let decode_positions: Vec<usize> = track.frames().iter().map(|f| f.original_pos).collect();
    for (presentation_pos, decode_pos) in decode_positions.into_iter().enumerate() {
        track.frames_mut()[decode_pos].original_pos = presentation_pos;
    }
}

/// A reference-counted, single-threaded handle to an `Index`.
///
/// Frame readers (out of scope here) hold long-lived handles to a finished index; since the
/// core runs single-threaded and indexes are never shared across threads, this is a plain `Rc`
/// rather than an `Arc`.
#[derive(Clone, Debug)]
pub struct IndexRef(Rc<RefCell<Index>>);

impl IndexRef {
    pub fn new(index: Index) -> Self {
        IndexRef(Rc::new(RefCell::new(index)))
    }

    /// Returns a new handle to the same index, incrementing the reference count.
    pub fn add_ref(&self) -> IndexRef {
        IndexRef(Rc::clone(&self.0))
    }

    /// Drops this handle. The index is deallocated once the last handle is released.
    pub fn release(self) {
        drop(self)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn borrow(&self) -> Ref<'_, Index> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Index> {
        self.0.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameInfo, FrameType};
    use crate::units::Timebase;

    fn video_frame(pts: i64, frame_type: FrameType) -> FrameInfo {
        FrameInfo::video(pts, 0, frame_type == FrameType::I, frame_type, 0, 0)
    }

    #[test]
    fn sort_reorders_single_b_gop_and_stamps_original_pos() {
        // S3: decode-order PTS [0, 20, 10, 40, 30], types [I, P, B, P, B].
        //
        // The PTS-swap leaves the sequence already ascending ([0, 10, 20, 30, 40]), so the
        // subsequent stable sort by PTS does not move any record; `original_pos` for this
        // particular input therefore comes out as the identity permutation. This differs from
        // the permutation figure given in the distilled scenario text, which does not reproduce
        // from the grounding algorithm for this input; see DESIGN.md.
        let mut track = Track::new(TrackType::Video, Timebase::new(1, 1000));
        track.push(video_frame(0, FrameType::I));
        track.push(video_frame(20, FrameType::P));
        track.push(video_frame(10, FrameType::B));
        track.push(video_frame(40, FrameType::P));
        track.push(video_frame(30, FrameType::B));

        let mut index = Index::new(vec![track], DecoderSource::Default, 0, [0; 20]);
        index.sort();

        let pts: Vec<i64> = index.tracks[0].frames().iter().map(|f| f.pts).collect();
        assert_eq!(pts, vec![0, 10, 20, 30, 40]);

        let original_pos: Vec<usize> = index.tracks[0].frames().iter().map(|f| f.original_pos).collect();
        assert_eq!(original_pos, vec![0, 1, 2, 3, 4]);

        for (i, f) in index.tracks[0].frames().iter().enumerate() {
            assert_eq!(index.tracks[0].frames()[f.original_pos].original_pos, i);
        }
    }

    #[test]
    fn sort_trims_trailing_phantom_frame() {
        let mut track = Track::new(TrackType::Video, Timebase::new(1, 1000));
        track.push(video_frame(10, FrameType::I));
        track.push(video_frame(20, FrameType::P));
        track.push(video_frame(30, FrameType::P));
        // Trailing phantom frame: pts 0 <= front pts (10).
        track.push(video_frame(0, FrameType::P));

        let mut index = Index::new(vec![track], DecoderSource::Default, 0, [0; 20]);
        index.sort();

        assert_eq!(index.tracks[0].len(), 3);
    }

    #[test]
    fn sort_does_not_trim_size_two_track() {
        // Open question resolution: the `size > 2` guard leaves size-2 tracks undefended even
        // when `front().pts >= back().pts`.
        let mut track = Track::new(TrackType::Video, Timebase::new(1, 1000));
        track.push(video_frame(10, FrameType::I));
        track.push(video_frame(0, FrameType::P));

        let mut index = Index::new(vec![track], DecoderSource::Default, 0, [0; 20]);
        index.sort();

        assert_eq!(index.tracks[0].len(), 2);
    }

    #[test]
    fn index_ref_tracks_reference_count() {
        let index = Index::new(Vec::new(), DecoderSource::Default, 0, [0; 20]);
        let handle = IndexRef::new(index);
        assert_eq!(handle.ref_count(), 1);

        let second = handle.add_ref();
        assert_eq!(handle.ref_count(), 2);

        second.release();
        assert_eq!(handle.ref_count(), 1);
    }
}
