// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the error taxonomy surfaced by the indexing core.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// Broad category of an `IndexError`, matching the subsystem that raised it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An error reading or writing the media file, index file, or timecode/keyframe files.
    Parser,
    /// An error from the packet decoder while indexing.
    Codec,
    /// An error writing a Wave64 audio dump.
    WaveWriter,
    /// An error reading or validating a persisted index.
    Index,
    /// An invalid indexer configuration or invocation.
    Indexing,
    /// A runtime condition the indexer deliberately does not support.
    Unsupported,
}

/// Specific reason within an `ErrorCategory`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    FileRead,
    FileWrite,
    Decoding,
    InvalidArgument,
    NotAvailable,
    /// The indexing pass was cancelled by the progress callback.
    Cancelled,
}

/// `IndexError` is the single error type returned by every fallible operation in this crate.
///
/// Every error carries a `category`, a `kind`, and a human-readable message, per the error
/// model surfaced to callers.
#[derive(Debug)]
pub struct IndexError {
    category: ErrorCategory,
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl IndexError {
    pub fn new(category: ErrorCategory, kind: ErrorKind, message: impl Into<String>) -> Self {
        IndexError { category, kind, message: message.into(), source: None }
    }

    fn with_source(
        category: ErrorCategory,
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        IndexError { category, kind, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for IndexError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

pub type Result<T> = result::Result<T, IndexError>;

/// Convenience constructor for a `Parser`/`FileRead` error wrapping an I/O failure.
pub fn file_read_error(context: impl Into<String>, source: io::Error) -> IndexError {
    let message = format!("{}: {}", context.into(), source);
    IndexError::with_source(ErrorCategory::Parser, ErrorKind::FileRead, message, source)
}

/// Convenience constructor for a `Parser`/`FileWrite` error wrapping an I/O failure.
pub fn file_write_error(context: impl Into<String>, source: io::Error) -> IndexError {
    let message = format!("{}: {}", context.into(), source);
    IndexError::with_source(ErrorCategory::Parser, ErrorKind::FileWrite, message, source)
}

pub fn parser_error(kind: ErrorKind, message: impl Into<String>) -> IndexError {
    IndexError::new(ErrorCategory::Parser, kind, message)
}

pub fn index_error(kind: ErrorKind, message: impl Into<String>) -> IndexError {
    IndexError::new(ErrorCategory::Index, kind, message)
}

pub fn indexing_error(kind: ErrorKind, message: impl Into<String>) -> IndexError {
    IndexError::new(ErrorCategory::Indexing, kind, message)
}

pub fn codec_error(message: impl Into<String>) -> IndexError {
    IndexError::new(ErrorCategory::Codec, ErrorKind::Decoding, message)
}

pub fn unsupported_error(message: impl Into<String>) -> IndexError {
    IndexError::new(ErrorCategory::Unsupported, ErrorKind::Decoding, message)
}

pub fn wave_writer_error(context: impl Into<String>, source: io::Error) -> IndexError {
    let message = format!("{}: {}", context.into(), source);
    IndexError::with_source(ErrorCategory::WaveWriter, ErrorKind::FileWrite, message, source)
}

pub fn cancelled_error() -> IndexError {
    IndexError::new(ErrorCategory::Indexing, ErrorKind::Cancelled, "indexing was cancelled")
}
