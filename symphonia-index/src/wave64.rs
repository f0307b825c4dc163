// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `wave64` module implements `Wave64Sink`, a minimal Sony Wave64 (RIFF64) PCM container
//! writer used only by the indexer's audio-dump path. It is not a general audio file format
//! library: once opened, it is a pure byte appender with two size fields patched at close time.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::errors::{wave_writer_error, Result};

const RIFF_GUID: [u8; 16] = [
    0x72, 0x69, 0x66, 0x66, 0x2e, 0x91, 0xcf, 0x11, 0xa5, 0xd6, 0x28, 0xdb, 0x04, 0xc1, 0x00, 0x00,
];
const WAVE_GUID: [u8; 16] = [
    0x77, 0x61, 0x76, 0x65, 0xf3, 0xac, 0xd3, 0x11, 0x8c, 0xd1, 0x00, 0xc0, 0x4f, 0x8e, 0xdb, 0x8a,
];
const FMT_GUID: [u8; 16] = [
    0x66, 0x6d, 0x74, 0x20, 0xf3, 0xac, 0xd3, 0x11, 0x8c, 0xd1, 0x00, 0xc0, 0x4f, 0x8e, 0xdb, 0x8a,
];
const DATA_GUID: [u8; 16] = [
    0x64, 0x61, 0x74, 0x61, 0xf3, 0xac, 0xd3, 0x11, 0x8c, 0xd1, 0x00, 0xc0, 0x4f, 0x8e, 0xdb, 0x8a,
];

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Byte offset of the RIFF chunk's 64-bit size field, measured from the start of the file.
const RIFF_SIZE_OFFSET: u64 = 16;
/// Byte offset of the data chunk's 64-bit size field.
const DATA_SIZE_OFFSET_FROM_DATA_GUID: u64 = 16;

/// A minimal Sony Wave64 container writer for dumping raw PCM audio during indexing.
pub struct Wave64Sink {
    file: File,
    bytes_per_sample: u32,
    channels: u16,
    bytes_written: u64,
    data_chunk_offset: u64,
}

impl Wave64Sink {
    /// Creates `path`, writes the RIFF64/WAVE64 header with placeholder sizes, and returns a
    /// sink ready to receive PCM bytes via `write_data`.
    pub fn create(
        path: &Path,
        bits_per_sample: u16,
        channels: u16,
        samples_per_sec: u32,
        is_float: bool,
    ) -> Result<Self> {
        let context = || format!("failed to create '{}'", path.display());

        let mut file = File::create(path).map_err(|e| wave_writer_error(context(), e))?;

        let bytes_per_sample = (bits_per_sample as u32) / 8;
        let block_align = bytes_per_sample * channels as u32;
        let avg_bytes_per_sec = samples_per_sec * block_align;

        let format_tag = if is_float { WAVE_FORMAT_IEEE_FLOAT } else { WAVE_FORMAT_PCM };

        // RIFF GUID + placeholder 64-bit size (patched on close) + WAVE GUID.
        file.write_all(&RIFF_GUID).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&0u64.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&WAVE_GUID).map_err(|e| wave_writer_error(context(), e))?;

        // fmt chunk: GUID, chunk size (fixed, includes the 24-byte GUID+size header), body.
        let fmt_body_len: u64 = 2 + 2 + 4 + 4 + 2 + 2 + 2;
        file.write_all(&FMT_GUID).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&(24 + fmt_body_len).to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&format_tag.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&channels.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&samples_per_sec.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&avg_bytes_per_sec.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&(block_align as u16).to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&bits_per_sample.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&0u16.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;

        // data chunk: GUID, placeholder 64-bit size (patched on close).
        let data_chunk_offset = file.stream_position().map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&DATA_GUID).map_err(|e| wave_writer_error(context(), e))?;
        file.write_all(&0u64.to_le_bytes()).map_err(|e| wave_writer_error(context(), e))?;

        Ok(Wave64Sink { file, bytes_per_sample, channels, bytes_written: 0, data_chunk_offset })
    }

    /// Appends raw PCM bytes to the data chunk.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).map_err(|e| wave_writer_error("failed to write wave64 data", e))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn bytes_per_frame(&self) -> u32 {
        self.bytes_per_sample * self.channels as u32
    }

    /// Patches the RIFF and data chunk size fields and flushes the file.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let context = "failed to finalize wave64 file";

        let header_len = self.data_chunk_offset + 16 + 8;
        let total_len = header_len + self.bytes_written;

        self.file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET)).map_err(|e| wave_writer_error(context, e))?;
        self.file.write_all(&total_len.to_le_bytes()).map_err(|e| wave_writer_error(context, e))?;

        self.file
            .seek(SeekFrom::Start(self.data_chunk_offset + DATA_SIZE_OFFSET_FROM_DATA_GUID))
            .map_err(|e| wave_writer_error(context, e))?;
        let data_chunk_len = 24 + self.bytes_written;
        self.file.write_all(&data_chunk_len.to_le_bytes()).map_err(|e| wave_writer_error(context, e))?;

        self.file.flush().map_err(|e| wave_writer_error(context, e))?;
        Ok(())
    }
}
