// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A streaming compressor/decompressor that frames an index file's payload through a single
//! compressed `zstd` stream (see `DESIGN.md` for the choice of codec).

use std::io::{self, BufReader, Read, Write};

use crate::errors::{parser_error, ErrorKind, Result};

/// The chunk size used when copying bytes through the compressor.
const CHUNK_LEN: usize = 64 * 1024;

/// `CodecStreamWriter` wraps a byte sink in a compressor, exposing `write` and `finish` so that
/// callers can emit a header struct and each track block as discrete writes while still
/// producing a single compressed frame.
pub struct CodecStreamWriter<W: Write> {
    encoder: Option<zstd::Encoder<'static, W>>,
}

impl<W: Write> CodecStreamWriter<W> {
    pub fn new(sink: W) -> Result<Self> {
        let level = *zstd::compression_level_range().end();
        let encoder = zstd::Encoder::new(sink, level)
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to initialize compressor: {}", e)))?;
        Ok(CodecStreamWriter { encoder: Some(encoder) })
    }

    /// Writes `bytes` into the compressed stream. Does not start a new compression frame; the
    /// whole payload remains one continuous stream until `finish` is called.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let encoder = self.encoder.as_mut().expect("writer already finished");

        for chunk in bytes.chunks(CHUNK_LEN) {
            encoder
                .write_all(chunk)
                .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to write index data: {}", e)))?;
        }

        Ok(())
    }

    /// Flushes the compressed trailer and returns the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        let encoder = self.encoder.take().expect("writer already finished");
        encoder
            .finish()
            .map_err(|e| parser_error(ErrorKind::FileWrite, format!("failed to finalize index data: {}", e)))
    }
}

/// `CodecStreamReader` wraps a byte source in a decompressor, exposing `read_exact` for the
/// fixed-layout header and track-block reads that make up the index file format.
pub struct CodecStreamReader<R: Read> {
    decoder: zstd::Decoder<'static, BufReader<R>>,
}

impl<R: Read> CodecStreamReader<R> {
    pub fn new(source: R) -> Result<Self> {
        let decoder = zstd::Decoder::new(source).map_err(map_decompress_error)?;
        Ok(CodecStreamReader { decoder })
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.decoder.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                parser_error(ErrorKind::FileRead, "failed to read data: unexpected end of index file")
            }
            _ => map_decompress_error(e),
        })
    }
}

fn map_decompress_error(e: io::Error) -> crate::errors::IndexError {
    // zstd reports malformed streams and allocation failures as plain `io::Error`s; the
    // message text is used to classify them into "dictionary"/"data"/"memory" failures.
    let text = e.to_string();
    let suffix = if text.contains("alloc") {
        "memory"
    }
    else if text.contains("dictionary") {
        "dictionary"
    }
    else {
        "data"
    };

    parser_error(ErrorKind::FileRead, format!("failed to read data: {} error ({})", suffix, text))
}
