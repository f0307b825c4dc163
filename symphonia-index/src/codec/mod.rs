// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codec` module implements the on-disk index format: a framed compressed stream
//! (`stream`) carrying a validating fixed-layout header and delta-coded frame records
//! (`format`).

pub mod format;
pub mod stream;

pub use format::{read_index, write_index, EnabledSources};
