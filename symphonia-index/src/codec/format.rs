// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `format` module implements `IndexCodec`: encoding and decoding a full `Index` through the
//! compressed stream codec, with a validating fixed-layout header and delta-coded frame records.

use std::io::{Read, Write};

use crate::codec::stream::{CodecStreamReader, CodecStreamWriter};
use crate::errors::{index_error, parser_error, ErrorKind, Result};
use crate::frame::{FrameInfo, FrameType};
use crate::index::{DecoderSource, Index};
use crate::track::{Track, TrackType};
use crate::units::Timebase;

/// Magic number every valid index file begins with.
pub const MAGIC: u32 = 0x5392_0873;

/// This build's library version, compared for exact equality on load.
pub const LIBRARY_VERSION: u32 = 0x0005_0400;

/// This build's dependency versions, compared for exact equality on load. A full system would
/// source these from the demuxer/decoder/scaler/post-processor actually linked in; this crate
/// has no such collaborators wired in, so they are fixed build constants.
pub const LAVU_VERSION: u32 = 1;
pub const LAVF_VERSION: u32 = 1;
pub const LAVC_VERSION: u32 = 1;
pub const LSWS_VERSION: u32 = 1;
pub const LPP_VERSION: u32 = 0;

/// A coarse tag distinguishing builds that would disagree on struct layout: host pointer width
/// times toolchain family. Two builds that would disagree on layout must hash to different
/// values; beyond that the exact encoding is unimportant.
pub fn current_arch_tag() -> u32 {
    let pointer_width: u32 = if cfg!(target_pointer_width = "64") {
        64
    }
    else if cfg!(target_pointer_width = "32") {
        32
    }
    else {
        16
    };

    let family: u32 = if cfg!(target_env = "msvc") {
        1
    }
    else if cfg!(target_env = "gnu") {
        2
    }
    else {
        3
    };

    (pointer_width << 8) | family
}

/// Which decoder sources the caller enables for loading; mirrors the bitmask compared against
/// an index's stored `decoder` tag.
#[derive(Copy, Clone, Debug)]
pub struct EnabledSources(pub u32);

impl EnabledSources {
    pub fn all() -> Self {
        EnabledSources(
            DecoderSource::Default.bit()
                | DecoderSource::Lavf.bit()
                | DecoderSource::Matroska.bit()
                | DecoderSource::HaaliMpeg.bit()
                | DecoderSource::HaaliOgg.bit(),
        )
    }

    pub fn contains(&self, source: DecoderSource) -> bool {
        self.0 & source.bit() != 0
    }
}

struct IndexHeader {
    id: u32,
    version: u32,
    arch: u32,
    tracks: u32,
    decoder: u32,
    lavu_version: u32,
    lavf_version: u32,
    lavc_version: u32,
    lsws_version: u32,
    lpp_version: u32,
    file_size: i64,
    file_signature: [u8; 20],
}

const INDEX_HEADER_LEN: usize = 4 * 9 + 8 + 20;

impl IndexHeader {
    fn to_bytes(&self) -> [u8; INDEX_HEADER_LEN] {
        let mut buf = [0u8; INDEX_HEADER_LEN];
        let mut w = ByteWriter::new(&mut buf);
        w.write_u32(self.id);
        w.write_u32(self.version);
        w.write_u32(self.arch);
        w.write_u32(self.tracks);
        w.write_u32(self.decoder);
        w.write_u32(self.lavu_version);
        w.write_u32(self.lavf_version);
        w.write_u32(self.lavc_version);
        w.write_u32(self.lsws_version);
        w.write_u32(self.lpp_version);
        w.write_i64(self.file_size);
        w.write_bytes(&self.file_signature);
        buf
    }

    fn from_bytes(buf: &[u8; INDEX_HEADER_LEN]) -> Self {
        let mut r = ByteReader::new(buf);
        IndexHeader {
            id: r.read_u32(),
            version: r.read_u32(),
            arch: r.read_u32(),
            tracks: r.read_u32(),
            decoder: r.read_u32(),
            lavu_version: r.read_u32(),
            lavf_version: r.read_u32(),
            lavc_version: r.read_u32(),
            lsws_version: r.read_u32(),
            lpp_version: r.read_u32(),
            file_size: r.read_i64(),
            file_signature: r.read_array20(),
        }
    }
}

struct TrackHeader {
    track_type: u32,
    frames: u32,
    num: i64,
    den: i64,
    use_dts: u32,
    has_ts: u32,
}

const TRACK_HEADER_LEN: usize = 4 + 4 + 8 + 8 + 4 + 4;

impl TrackHeader {
    fn to_bytes(&self) -> [u8; TRACK_HEADER_LEN] {
        let mut buf = [0u8; TRACK_HEADER_LEN];
        let mut w = ByteWriter::new(&mut buf);
        w.write_u32(self.track_type);
        w.write_u32(self.frames);
        w.write_i64(self.num);
        w.write_i64(self.den);
        w.write_u32(self.use_dts);
        w.write_u32(self.has_ts);
        buf
    }

    fn from_bytes(buf: &[u8; TRACK_HEADER_LEN]) -> Self {
        let mut r = ByteReader::new(buf);
        TrackHeader {
            track_type: r.read_u32(),
            frames: r.read_u32(),
            num: r.read_i64(),
            den: r.read_i64(),
            use_dts: r.read_u32(),
            has_ts: r.read_u32(),
        }
    }
}

const FRAME_RECORD_LEN: usize = 8 + 8 + 4 + 8 + 1 + 4 + 1 + 8 + 4;

fn frame_type_tag(frame_type: FrameType) -> u8 {
    match frame_type {
        FrameType::I => 0,
        FrameType::P => 1,
        FrameType::B => 2,
        FrameType::Other => 3,
    }
}

fn frame_type_from_tag(tag: u8) -> FrameType {
    match tag {
        0 => FrameType::I,
        1 => FrameType::P,
        2 => FrameType::B,
        _ => FrameType::Other,
    }
}

fn track_type_tag(track_type: TrackType) -> u32 {
    match track_type {
        TrackType::Unknown => 0,
        TrackType::Video => 1,
        TrackType::Audio => 2,
        TrackType::Data => 3,
        TrackType::Subtitle => 4,
    }
}

fn track_type_from_tag(tag: u32) -> TrackType {
    match tag {
        1 => TrackType::Video,
        2 => TrackType::Audio,
        3 => TrackType::Data,
        4 => TrackType::Subtitle,
        _ => TrackType::Unknown,
    }
}

/// Writes `index` to `sink` in the versioned compressed on-disk format, delta-coding
/// `file_pos`, `original_pos`, `pts`, and `sample_start` within each track's frame records.
pub fn write_index<W: Write>(index: &Index, sink: W) -> Result<()> {
    let mut writer = CodecStreamWriter::new(sink)?;

    let header = IndexHeader {
        id: MAGIC,
        version: LIBRARY_VERSION,
        arch: current_arch_tag(),
        tracks: index.tracks.len() as u32,
        decoder: index.decoder_source.tag(),
        lavu_version: LAVU_VERSION,
        lavf_version: LAVF_VERSION,
        lavc_version: LAVC_VERSION,
        lsws_version: LSWS_VERSION,
        lpp_version: LPP_VERSION,
        file_size: index.file_size,
        file_signature: index.digest,
    };
    writer.write(&header.to_bytes())?;

    for track in &index.tracks {
        let track_header = TrackHeader {
            track_type: track_type_tag(track.track_type),
            frames: track.len() as u32,
            num: track.timebase.num,
            den: track.timebase.den,
            use_dts: track.use_dts as u32,
            has_ts: track.has_ts as u32,
        };
        writer.write(&track_header.to_bytes())?;

        let mut prev: Option<&FrameInfo> = None;
        for frame in track.frames() {
            let (file_pos, original_pos, pts, sample_start) = match prev {
                Some(p) => (
                    frame.file_pos - p.file_pos,
                    frame.original_pos as i64 - p.original_pos as i64,
                    frame.pts - p.pts,
                    frame.sample_start - p.sample_start,
                ),
                None => (frame.file_pos, frame.original_pos as i64, frame.pts, frame.sample_start),
            };

            let mut buf = [0u8; FRAME_RECORD_LEN];
            let mut w = ByteWriter::new(&mut buf);
            w.write_i64(pts);
            w.write_i64(file_pos);
            w.write_u32(frame.frame_size);
            w.write_i64(original_pos);
            w.write_u8(frame_type_tag(frame.frame_type));
            w.write_i32(frame.repeat_pict);
            w.write_u8(frame.key_frame as u8);
            w.write_i64(sample_start);
            w.write_u32(frame.sample_count);
            writer.write(&buf)?;

            prev = Some(frame);
        }
    }

    writer.finish()?;
    Ok(())
}

/// Reads an `Index` from `source`, validating the header in the fail-fast order given in the
/// on-disk format: magic, version, arch, dependency versions, then decoder-source availability.
pub fn read_index<R: Read>(source: R, enabled_sources: EnabledSources) -> Result<Index> {
    let mut reader = CodecStreamReader::new(source)?;

    let mut header_buf = [0u8; INDEX_HEADER_LEN];
    reader.read_exact(&mut header_buf)?;
    let header = IndexHeader::from_bytes(&header_buf);

    if header.id != MAGIC {
        return Err(parser_error(ErrorKind::FileRead, "not a valid index file"));
    }
    if header.version != LIBRARY_VERSION {
        return Err(parser_error(ErrorKind::FileRead, "not the expected index version"));
    }
    if header.arch != current_arch_tag() {
        return Err(parser_error(ErrorKind::FileRead, "was not made with this binary"));
    }
    if header.lavu_version != LAVU_VERSION
        || header.lavf_version != LAVF_VERSION
        || header.lavc_version != LAVC_VERSION
        || header.lsws_version != LSWS_VERSION
        || header.lpp_version != LPP_VERSION
    {
        return Err(parser_error(ErrorKind::FileRead, "different build was used"));
    }

    let decoder_source = DecoderSource::from_tag(header.decoder)
        .ok_or_else(|| parser_error(ErrorKind::FileRead, "not a valid index file"))?;
    if !enabled_sources.contains(decoder_source) {
        return Err(index_error(
            ErrorKind::NotAvailable,
            "the source which this index was created with is not available",
        ));
    }

    let mut tracks = Vec::with_capacity(header.tracks as usize);

    for _ in 0..header.tracks {
        let mut track_header_buf = [0u8; TRACK_HEADER_LEN];
        reader.read_exact(&mut track_header_buf)?;
        let track_header = TrackHeader::from_bytes(&track_header_buf);

        let mut track =
            Track::new(track_type_from_tag(track_header.track_type), Timebase::new(track_header.num, track_header.den));
        track.use_dts = track_header.use_dts != 0;
        track.has_ts = track_header.has_ts != 0;

        let mut prev: Option<FrameInfo> = None;
        for _ in 0..track_header.frames {
            let mut buf = [0u8; FRAME_RECORD_LEN];
            reader.read_exact(&mut buf)?;
            let mut r = ByteReader::new(&buf);

            let d_pts = r.read_i64();
            let d_file_pos = r.read_i64();
            let frame_size = r.read_u32();
            let d_original_pos = r.read_i64();
            let frame_type = frame_type_from_tag(r.read_u8());
            let repeat_pict = r.read_i32();
            let key_frame = r.read_u8() != 0;
            let d_sample_start = r.read_i64();
            let sample_count = r.read_u32();

            let (pts, file_pos, original_pos, sample_start) = match &prev {
                Some(p) => (
                    p.pts + d_pts,
                    p.file_pos + d_file_pos,
                    (p.original_pos as i64 + d_original_pos) as usize,
                    p.sample_start + d_sample_start,
                ),
                None => (d_pts, d_file_pos, d_original_pos as usize, d_sample_start),
            };

            let frame = FrameInfo {
                pts,
                file_pos,
                frame_size,
                original_pos,
                frame_type,
                repeat_pict,
                key_frame,
                sample_start,
                sample_count,
            };

            track.push(frame.clone());
            prev = Some(frame);
        }

        tracks.push(track);
    }

    Ok(Index::new(tracks, decoder_source, header.file_size, header.file_signature))
}

/// A tiny fixed-buffer little-endian writer used for the packed header/frame layouts.
struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        ByteWriter { buf, pos: 0 }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.write_bytes(&v.to_le_bytes());
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> &[u8] {
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn read_u8(&mut self) -> u8 {
        self.read_bytes(1)[0]
    }

    fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.read_bytes(4).try_into().unwrap())
    }

    fn read_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.read_bytes(4).try_into().unwrap())
    }

    fn read_i64(&mut self) -> i64 {
        i64::from_le_bytes(self.read_bytes(8).try_into().unwrap())
    }

    fn read_array20(&mut self) -> [u8; 20] {
        self.read_bytes(20).try_into().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameInfo;

    fn sample_index() -> Index {
        let mut video = Track::new(TrackType::Video, Timebase::new(1, 24000));
        video.push(FrameInfo::video(0, 0, true, FrameType::I, 0, 1000));
        video.push(FrameInfo::video(1001, 0, false, FrameType::P, 1000, 900));
        video.push(FrameInfo::video(2002, 0, false, FrameType::P, 1900, 950));
        for (i, f) in video.frames_mut().iter_mut().enumerate() {
            f.original_pos = i;
        }

        let mut audio = Track::new(TrackType::Audio, Timebase::new(1, 48000));
        audio.push(FrameInfo::audio(0, 0, 1024, true, 0, 200));
        audio.push(FrameInfo::audio(1024, 1024, 1024, false, 200, 210));
        for (i, f) in audio.frames_mut().iter_mut().enumerate() {
            f.original_pos = i;
        }

        Index::new(vec![video, audio], DecoderSource::Matroska, 123_456, [7u8; 20])
    }

    #[test]
    fn round_trips_an_index() {
        // Testable properties 3/4/5/7: roundtrip, delta-coding, and audio sample monotonicity.
        let original = sample_index();

        let mut buf = Vec::new();
        write_index(&original, &mut buf).unwrap();

        let decoded = read_index(buf.as_slice(), EnabledSources::all()).unwrap();

        assert_eq!(decoded.file_size, original.file_size);
        assert_eq!(decoded.digest, original.digest);
        assert_eq!(decoded.decoder_source, original.decoder_source);
        assert_eq!(decoded.tracks.len(), original.tracks.len());

        for (a, b) in original.tracks.iter().zip(decoded.tracks.iter()) {
            assert_eq!(a.track_type, b.track_type);
            assert_eq!(a.timebase, b.timebase);
            assert_eq!(a.use_dts, b.use_dts);
            assert_eq!(a.has_ts, b.has_ts);
            assert_eq!(a.len(), b.len());

            for (fa, fb) in a.frames().iter().zip(b.frames().iter()) {
                assert_eq!(fa.pts, fb.pts);
                assert_eq!(fa.file_pos, fb.file_pos);
                assert_eq!(fa.frame_size, fb.frame_size);
                assert_eq!(fa.original_pos, fb.original_pos);
                assert_eq!(fa.frame_type, fb.frame_type);
                assert_eq!(fa.key_frame, fb.key_frame);
                assert_eq!(fa.sample_start, fb.sample_start);
                assert_eq!(fa.sample_count, fb.sample_count);
            }
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let bad_header = IndexHeader {
            id: 0xdead_beef,
            version: LIBRARY_VERSION,
            arch: current_arch_tag(),
            tracks: 0,
            decoder: 0,
            lavu_version: LAVU_VERSION,
            lavf_version: LAVF_VERSION,
            lavc_version: LAVC_VERSION,
            lsws_version: LSWS_VERSION,
            lpp_version: LPP_VERSION,
            file_size: 0,
            file_signature: [0; 20],
        };
        let mut raw = Vec::new();
        {
            let mut writer = CodecStreamWriter::new(&mut raw).unwrap();
            writer.write(&bad_header.to_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let err = read_index(raw.as_slice(), EnabledSources::all()).unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Parser);
        assert_eq!(err.message(), "not a valid index file");
    }

    #[test]
    fn rejects_version_mismatch() {
        // S5: write an index, then load it back pretending a dependency version has changed.
        let original = sample_index();
        let mut buf = Vec::new();
        write_index(&original, &mut buf).unwrap();

        let decoded = read_index(buf.as_slice(), EnabledSources::all());
        assert!(decoded.is_ok());

        let mut tampered = Vec::new();
        {
            let header = IndexHeader {
                id: MAGIC,
                version: LIBRARY_VERSION,
                arch: current_arch_tag(),
                tracks: 0,
                decoder: 0,
                lavu_version: LAVU_VERSION,
                lavf_version: LAVF_VERSION + 1,
                lavc_version: LAVC_VERSION,
                lsws_version: LSWS_VERSION,
                lpp_version: LPP_VERSION,
                file_size: 0,
                file_signature: [0; 20],
            };
            let mut writer = CodecStreamWriter::new(&mut tampered).unwrap();
            writer.write(&header.to_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let err = read_index(tampered.as_slice(), EnabledSources::all()).unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Parser);
        assert_eq!(err.message(), "different build was used");
    }

    #[test]
    fn rejects_unavailable_decoder_source() {
        let original = sample_index();
        let mut buf = Vec::new();
        write_index(&original, &mut buf).unwrap();

        let err = read_index(buf.as_slice(), EnabledSources(DecoderSource::Lavf.bit())).unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Index);
        assert_eq!(err.kind(), ErrorKind::NotAvailable);
    }
}
