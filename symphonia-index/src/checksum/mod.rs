// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `checksum` module provides the hashing algorithm used to bind an index to the media
//! file it describes.
//!
//! This mirrors `symphonia_core::checksum`, which hand-rolls its own CRC and MD5
//! implementations rather than depending on an external hashing crate; SHA-1 is added here in
//! the same style.

mod sha1;

pub use sha1::Sha1;
