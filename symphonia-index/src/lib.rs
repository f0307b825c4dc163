// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `symphonia-index` is the media indexing core of Project Symphonia: it scans a container
//! file, builds a per-track frame directory for random access by presentation timestamp, and
//! persists that directory to a compact, versioned on-disk file restorable byte-exactly.
//!
//! Demuxing and decoding are external collaborators, named here as the [`indexer::PacketSource`]
//! and [`indexer::PacketDecoder`] capability traits. This crate owns the data model
//! ([`frame`], [`track`], [`index`]), the on-disk format ([`codec`]), the file-signature
//! algorithm ([`signature`]), the presentation reordering pass ([`reorder`]), and the indexer
//! state machine ([`indexer`]) that ties them together.

pub mod checksum;
pub mod codec;
pub mod errors;
pub mod frame;
pub mod index;
pub mod indexer;
pub mod reorder;
pub mod signature;
pub mod track;
pub mod units;
pub mod wave64;

pub use errors::{ErrorCategory, ErrorKind, IndexError, Result};
pub use frame::{FrameInfo, FrameType};
pub use index::{DecoderSource, Index, IndexRef};
pub use indexer::{ErrorHandlingMode, Indexer, IndexerOptions, PacketDecoder, PacketSource};
pub use signature::{calculate_file_signature, FileSignature};
pub use track::{Track, TrackType};
pub use units::Timebase;
