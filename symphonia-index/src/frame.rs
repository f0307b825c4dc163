// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frame` module defines `FrameInfo`, one record per packet admitted to a track.

/// A coarse classification of a video frame's prediction structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    I,
    P,
    B,
    Other,
}

/// One record per packet admitted to a track.
///
/// `original_pos` starts out as the frame's decode-order index and is rewritten, once, at
/// finalization (`Track::sort`) to become the permutation that maps a presentation-order index
/// back to its decode-order index (see `reorder` module).
#[derive(Clone, Debug)]
pub struct FrameInfo {
    /// Presentation timestamp, in the track's timebase.
    pub pts: i64,
    /// Byte offset of the packet in the source file, or 0 if unknown.
    pub file_pos: i64,
    /// Packet payload length, or 0 if unknown.
    pub frame_size: u32,
    /// This frame's position in decode order, once the track has been reordered to
    /// presentation order.
    pub original_pos: usize,
    pub frame_type: FrameType,
    /// Video only; 0 for audio.
    pub repeat_pict: i32,
    pub key_frame: bool,
    /// Audio only: cumulative sample index at the start of this packet.
    pub sample_start: i64,
    /// Audio only: number of samples decoded from this packet.
    pub sample_count: u32,
}

impl FrameInfo {
    pub fn video(
        pts: i64,
        repeat_pict: i32,
        key_frame: bool,
        frame_type: FrameType,
        file_pos: i64,
        frame_size: u32,
    ) -> Self {
        FrameInfo {
            pts,
            file_pos,
            frame_size,
            original_pos: 0,
            frame_type,
            repeat_pict,
            key_frame,
            sample_start: 0,
            sample_count: 0,
        }
    }

    pub fn audio(
        pts: i64,
        sample_start: i64,
        sample_count: u32,
        key_frame: bool,
        file_pos: i64,
        frame_size: u32,
    ) -> Self {
        FrameInfo {
            pts,
            file_pos,
            frame_size,
            original_pos: 0,
            frame_type: FrameType::Other,
            repeat_pict: 0,
            key_frame,
            sample_start,
            sample_count,
        }
    }
}
