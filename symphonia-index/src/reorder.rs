// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `reorder` module converts a video track's decode-order presentation timestamps into
//! presentation order where it is safe to do so, in place, leaving the subsequent stable sort
//! (in `Index::sort`) to complete the reordering.

use crate::frame::{FrameInfo, FrameType};

/// Swaps each isolated B frame's PTS with that of the frame immediately before it.
///
/// Returns without modifying `frames` in three cases:
/// - The stream already carries presentation-order timestamps (an out-of-order adjacent pair
///   was observed), in which case nothing further is needed.
/// - Two adjacent B frames were observed ("multi-B"); reordering such streams is not supported.
/// - The track has no B frames at all, since decode order already equals presentation order.
pub fn maybe_reorder(frames: &mut [FrameInfo]) {
    let mut has_b_frames = false;

    for i in 1..frames.len() {
        if frames[i].pts < frames[i - 1].pts {
            return;
        }

        if frames[i].frame_type == FrameType::B {
            has_b_frames = true;

            if frames[i - 1].frame_type == FrameType::B {
                return;
            }
        }
    }

    if !has_b_frames {
        return;
    }

    for i in 1..frames.len() {
        if frames[i].frame_type == FrameType::B {
            let tmp = frames[i - 1].pts;
            frames[i - 1].pts = frames[i].pts;
            frames[i].pts = tmp;
        }
    }
}
