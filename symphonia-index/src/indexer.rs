// Symphonia
// Copyright (c) 2019-2024 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `indexer` module drives a `PacketSource` through one indexing pass, routing packets to
//! per-track audio/video handling, applying the configured error policy, and yielding a
//! finished `Index`.

use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use crate::errors::{cancelled_error, codec_error, indexing_error, unsupported_error, ErrorKind, Result};
use crate::frame::{FrameInfo, FrameType};
use crate::index::{DecoderSource, Index};
use crate::signature::calculate_file_signature;
use crate::track::{Track, TrackType};
use crate::units::Timebase;
use crate::wave64::Wave64Sink;

/// One packet yielded by a `PacketSource`.
pub struct Packet {
    pub stream_index: usize,
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub file_pos: i64,
    pub key_frame: bool,
}

/// The minimal capability a demuxer implementation must expose to the indexer.
///
/// A real system plugs in a concrete implementation (LAVF, Matroska, Haali, ...); none is
/// provided by this crate, which treats the demuxer as an external collaborator.
pub trait PacketSource {
    fn format_name(&self) -> &str;
    fn num_streams(&self) -> usize;
    fn stream_type(&self, index: usize) -> TrackType;
    fn stream_timebase(&self, index: usize) -> Timebase;

    /// Returns the next packet, or `None` once the source is exhausted.
    fn next_packet(&mut self) -> Result<Option<Packet>>;
}

/// A decoded chunk of PCM audio yielded by one call to `PacketDecoder::decode_audio`.
pub struct AudioChunk {
    pub pcm: Vec<u8>,
    pub properties: AudioProperties,
    pub bytes_per_sample: u32,
}

/// The audio format observed on a track, used to detect mid-stream format changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioProperties {
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub channels: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    fn bytes_per_sample(self) -> u32 {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 => 4,
            SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, SampleFormat::F32 | SampleFormat::F64)
    }
}

/// Video metadata extracted from a packet by an attached parser.
pub struct VideoMeta {
    pub repeat_pict: i32,
    pub frame_type: FrameType,
}

/// The packet-decoder capability: turns packet payloads into sample counts / PCM (audio) or
/// frame-type metadata (video). An external collaborator, not implemented by this crate.
pub trait PacketDecoder {
    /// Decodes `data` in full, yielding zero or more chunks of PCM audio.
    fn decode_audio(&mut self, stream_index: usize, data: &[u8]) -> Result<Vec<AudioChunk>>;

    /// Extracts `repeat_pict` / `pict_type` from a video packet, if a parser is attached to
    /// this stream.
    fn parse_video(&mut self, stream_index: usize, data: &[u8]) -> Option<VideoMeta>;
}

/// The policy applied when a decode call fails while indexing a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorHandlingMode {
    /// Abort the entire indexing pass.
    Abort,
    /// Discard all frames recorded for this track and exclude it from the index.
    ClearTrack,
    /// Exclude the track from the index but keep frames already recorded.
    StopTrack,
    /// Stop decoding this packet and continue with the next.
    Ignore,
}

/// Per-run indexer configuration.
pub struct IndexerOptions {
    pub error_handling: ErrorHandlingMode,
    /// Bitmask of stream indices to include in the index.
    pub index_mask: u32,
    /// Bitmask of audio stream indices to additionally dump as PCM to disk.
    pub dump_mask: u32,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        IndexerOptions { error_handling: ErrorHandlingMode::Abort, index_mask: u32::MAX, dump_mask: 0 }
    }
}

/// `progress(current, total) -> cancel_flag`, where `current` is the byte position of the
/// packet just processed and `total` is the indexed file's size, both in bytes. Called at most
/// once per completed packet; the indexer does not itself throttle or coalesce calls.
pub type ProgressCallback<'a> = Box<dyn FnMut(i64, i64) -> bool + 'a>;

/// `audio_name(stream_index, properties) -> Some(path)` to begin dumping PCM for a track, or
/// `None` to decline.
pub type AudioNameCallback<'a> = Box<dyn FnMut(usize, &AudioProperties) -> Option<PathBuf> + 'a>;

struct AudioTrackState {
    properties: Option<AudioProperties>,
    current_sample: i64,
    sink: Option<Wave64Sink>,
    sink_attempted: bool,
}

impl Default for AudioTrackState {
    fn default() -> Self {
        AudioTrackState { properties: None, current_sample: 0, sink: None, sink_attempted: false }
    }
}

/// Closes every open audio dump sink, patching its RIFF/data-chunk size fields. Called on every
/// exit path out of `Indexer::run` so a cancelled or completed pass never leaves a `.w64` file
/// with its placeholder `0` size fields.
fn close_audio_sinks(audio_state: &mut [AudioTrackState]) -> Result<()> {
    for state in audio_state.iter_mut() {
        if let Some(sink) = state.sink.take() {
            sink.close()?;
        }
    }
    Ok(())
}

/// Drives a `PacketSource` through one indexing pass, parameterized by a packet-source and
/// packet-decoder implementation rather than a hierarchy of per-demuxer indexer types.
pub struct Indexer<'a, S, D> {
    source: S,
    decoder: D,
    options: IndexerOptions,
    progress_callback: Option<ProgressCallback<'a>>,
    audio_name_callback: Option<AudioNameCallback<'a>>,
    decoder_source: DecoderSource,
    file_size: i64,
    digest: [u8; 20],
}

impl<'a, S: PacketSource, D: PacketDecoder> Indexer<'a, S, D> {
    /// Constructs an indexer bound to `path`, `source`, and `decoder`. Runs the file signer
    /// once; the resulting `(file_size, digest)` are stored for inclusion in the final index.
    pub fn new(path: &Path, source: S, decoder: D, decoder_source: DecoderSource) -> Result<Self> {
        let sig = calculate_file_signature(path)?;
        debug!("signed '{}': {} bytes", path.display(), sig.file_size);

        Ok(Indexer {
            source,
            decoder,
            options: IndexerOptions::default(),
            progress_callback: None,
            audio_name_callback: None,
            decoder_source,
            file_size: sig.file_size,
            digest: sig.digest,
        })
    }

    pub fn set_index_mask(&mut self, mask: u32) {
        self.options.index_mask = mask;
    }

    pub fn set_dump_mask(&mut self, mask: u32) {
        self.options.dump_mask = mask;
    }

    pub fn set_error_handling(&mut self, mode: ErrorHandlingMode) {
        self.options.error_handling = mode;
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback<'a>) {
        self.progress_callback = Some(callback);
    }

    pub fn set_audio_name_callback(&mut self, callback: AudioNameCallback<'a>) {
        self.audio_name_callback = Some(callback);
    }

    /// Runs the indexing pass to completion, returning the finished `Index`.
    pub fn run(mut self) -> Result<Index> {
        let num_streams = self.source.num_streams();

        let mut tracks: Vec<Track> = (0..num_streams)
            .map(|i| Track::new(self.source.stream_type(i), self.source.stream_timebase(i)))
            .collect();
        let mut audio_state: Vec<AudioTrackState> = (0..num_streams).map(|_| AudioTrackState::default()).collect();
        let mut included = vec![true; num_streams];

        let mut packets_seen: i64 = 0;

        loop {
            let packet = match self.source.next_packet()? {
                Some(p) => p,
                None => break,
            };

            let stream_index = packet.stream_index;
            if stream_index >= num_streams {
                continue;
            }

            if tracks[stream_index].track_type == TrackType::Audio {
                self.process_audio_packet(stream_index, &packet, &mut tracks, &mut audio_state, &mut included)?;
            }
            else if tracks[stream_index].track_type == TrackType::Video {
                self.process_video_packet(stream_index, &packet, &mut tracks)?;
            }

            packets_seen += 1;

            if let Some(callback) = self.progress_callback.as_mut() {
                if callback(packet.file_pos, self.file_size) {
                    warn!("indexing cancelled at packet {}", packets_seen);
                    close_audio_sinks(&mut audio_state)?;
                    return Err(cancelled_error());
                }
            }
        }

        close_audio_sinks(&mut audio_state)?;

        let mut kept_tracks = Vec::with_capacity(num_streams);
        for (i, mut track) in tracks.into_iter().enumerate() {
            if !(included[i] && self.options.index_mask & (1 << i.min(31)) != 0) {
                track.frames_mut().clear();
            }
            kept_tracks.push(track);
        }

        let mut index = Index::new(kept_tracks, self.decoder_source, self.file_size, self.digest);
        index.sort();

        trace!("indexing pass complete: {} tracks", index.tracks.len());
        Ok(index)
    }

    fn process_video_packet(&mut self, stream_index: usize, packet: &Packet, tracks: &mut [Track]) -> Result<()> {
        let meta = self.decoder.parse_video(stream_index, &packet.data);
        let (repeat_pict, frame_type) = match meta {
            Some(m) => (m.repeat_pict, m.frame_type),
            None => (0, FrameType::Other),
        };

        let track = &mut tracks[stream_index];

        let (pts, use_dts) = match (packet.pts, packet.dts) {
            (Some(pts), _) => (pts, false),
            (None, Some(dts)) => (dts, true),
            (None, None) => (0, false),
        };
        if use_dts {
            track.use_dts = true;
        }
        if packet.pts.is_some() || packet.dts.is_some() {
            track.has_ts = true;
        }

        track.push(FrameInfo::video(pts, repeat_pict, packet.key_frame, frame_type, packet.file_pos, packet.data.len() as u32));
        Ok(())
    }

    fn process_audio_packet(
        &mut self,
        stream_index: usize,
        packet: &Packet,
        tracks: &mut [Track],
        audio_state: &mut [AudioTrackState],
        included: &mut [bool],
    ) -> Result<()> {
        if let Some(pts) = packet.pts.or(packet.dts) {
            tracks[stream_index].has_ts = true;
            if packet.pts.is_none() {
                tracks[stream_index].use_dts = true;
            }
            let _ = pts;
        }

        let chunks = match self.decoder.decode_audio(stream_index, &packet.data) {
            Ok(chunks) => chunks,
            Err(e) => return self.apply_error_policy(stream_index, tracks, included, e),
        };

        for chunk in chunks {
            let state = &mut audio_state[stream_index];

            match state.properties {
                None => state.properties = Some(chunk.properties),
                Some(prev) if prev != chunk.properties => {
                    return Err(unsupported_error(format!(
                        "audio format changed mid-stream on track {}: {:?} -> {:?}",
                        stream_index, prev, chunk.properties
                    )));
                }
                Some(_) => {}
            }

            let channels = chunk.properties.channels as u32;
            let frame_bytes = (chunk.bytes_per_sample * channels).max(1);
            let sample_count = chunk.pcm.len() as u32 / frame_bytes;

            let track = &mut tracks[stream_index];
            let sample_start = state.current_sample;
            track.push(FrameInfo::audio(
                sample_start,
                sample_start,
                sample_count,
                packet.key_frame,
                packet.file_pos,
                packet.data.len() as u32,
            ));
            state.current_sample += sample_count as i64;

            if self.options.dump_mask & (1 << stream_index.min(31)) != 0 {
                if state.sink.is_none() && !state.sink_attempted {
                    state.sink_attempted = true;
                    let name = self.audio_name_callback.as_mut().and_then(|cb| cb(stream_index, &chunk.properties));
                    match name {
                        Some(path) => {
                            let sink = Wave64Sink::create(
                                &path,
                                (chunk.bytes_per_sample * 8) as u16,
                                chunk.properties.channels,
                                chunk.properties.sample_rate,
                                chunk.properties.sample_format.is_float(),
                            )?;
                            state.sink = Some(sink);
                        }
                        None => {
                            self.options.dump_mask &= !(1 << stream_index.min(31));
                        }
                    }
                }

                if let Some(sink) = state.sink.as_mut() {
                    sink.write_data(&chunk.pcm)?;
                }
            }
        }

        Ok(())
    }

    fn apply_error_policy(
        &mut self,
        stream_index: usize,
        tracks: &mut [Track],
        included: &mut [bool],
        error: crate::errors::IndexError,
    ) -> Result<()> {
        match self.options.error_handling {
            ErrorHandlingMode::Abort => Err(codec_error(format!("decode failed on track {}: {}", stream_index, error))),
            ErrorHandlingMode::ClearTrack => {
                tracks[stream_index].frames_mut().clear();
                included[stream_index] = false;
                Ok(())
            }
            ErrorHandlingMode::StopTrack => {
                included[stream_index] = false;
                Ok(())
            }
            ErrorHandlingMode::Ignore => Ok(()),
        }
    }
}

/// Validates a raw mode tag from an external configuration surface into an `ErrorHandlingMode`.
///
/// The typed `ErrorHandlingMode` enum already makes invalid in-process values unrepresentable;
/// this remains for boundary code (e.g. a CLI flag or config file parser, out of scope here)
/// that still needs to reject arbitrary integers.
pub fn error_handling_mode_from_tag(tag: u32) -> Result<ErrorHandlingMode> {
    match tag {
        0 => Ok(ErrorHandlingMode::Abort),
        1 => Ok(ErrorHandlingMode::ClearTrack),
        2 => Ok(ErrorHandlingMode::StopTrack),
        3 => Ok(ErrorHandlingMode::Ignore),
        _ => Err(indexing_error(ErrorKind::InvalidArgument, format!("invalid error handling mode: {}", tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        packets: Vec<Packet>,
        pos: usize,
        types: Vec<TrackType>,
    }

    impl PacketSource for FixedSource {
        fn format_name(&self) -> &str {
            "test"
        }

        fn num_streams(&self) -> usize {
            self.types.len()
        }

        fn stream_type(&self, index: usize) -> TrackType {
            self.types[index]
        }

        fn stream_timebase(&self, _index: usize) -> Timebase {
            Timebase::new(1, 48000)
        }

        fn next_packet(&mut self) -> Result<Option<Packet>> {
            if self.pos >= self.packets.len() {
                return Ok(None);
            }
            let p = Packet {
                stream_index: self.packets[self.pos].stream_index,
                data: self.packets[self.pos].data.clone(),
                pts: self.packets[self.pos].pts,
                dts: self.packets[self.pos].dts,
                file_pos: self.packets[self.pos].file_pos,
                key_frame: self.packets[self.pos].key_frame,
            };
            self.pos += 1;
            Ok(Some(p))
        }
    }

    struct FixedDecoder {
        formats: Vec<AudioProperties>,
        call: usize,
    }

    impl PacketDecoder for FixedDecoder {
        fn decode_audio(&mut self, _stream_index: usize, data: &[u8]) -> Result<Vec<AudioChunk>> {
            let properties = self.formats[self.call.min(self.formats.len() - 1)];
            self.call += 1;
            Ok(vec![AudioChunk { pcm: data.to_vec(), properties, bytes_per_sample: properties.sample_format.bytes_per_sample() }])
        }

        fn parse_video(&mut self, _stream_index: usize, _data: &[u8]) -> Option<VideoMeta> {
            None
        }
    }

    fn audio_packet(stream_index: usize, pts: i64, len: usize) -> Packet {
        Packet { stream_index, data: vec![0u8; len], pts: Some(pts), dts: None, file_pos: 0, key_frame: true }
    }

    #[test]
    fn detects_mid_stream_audio_format_change() {
        // S6: first packet is 48000 Hz stereo, a later packet is 44100 Hz stereo.
        let source = FixedSource {
            types: vec![TrackType::Audio],
            packets: vec![audio_packet(0, 0, 4096), audio_packet(0, 1024, 4096)],
            pos: 0,
        };
        let decoder = FixedDecoder {
            formats: vec![
                AudioProperties { sample_rate: 48000, sample_format: SampleFormat::S16, channels: 2 },
                AudioProperties { sample_rate: 44100, sample_format: SampleFormat::S16, channels: 2 },
            ],
            call: 0,
        };

        let indexer = Indexer::new_for_test(source, decoder);
        let err = indexer.run().unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Unsupported);
    }

    #[test]
    fn audio_sample_start_is_monotonic() {
        let source = FixedSource {
            types: vec![TrackType::Audio],
            packets: vec![audio_packet(0, 0, 4096), audio_packet(0, 1024, 4096)],
            pos: 0,
        };
        let decoder = FixedDecoder {
            formats: vec![AudioProperties { sample_rate: 48000, sample_format: SampleFormat::S16, channels: 2 }],
            call: 0,
        };

        let indexer = Indexer::new_for_test(source, decoder);
        let index = indexer.run().unwrap();

        let track = &index.tracks[0];
        for i in 0..track.len() - 1 {
            let f = &track.frames()[i];
            let next = &track.frames()[i + 1];
            assert_eq!(next.sample_start, f.sample_start + f.sample_count as i64);
        }
    }

    impl<'a> Indexer<'a, FixedSource, FixedDecoder> {
        fn new_for_test(source: FixedSource, decoder: FixedDecoder) -> Self {
            Indexer {
                source,
                decoder,
                options: IndexerOptions::default(),
                progress_callback: None,
                audio_name_callback: None,
                decoder_source: DecoderSource::Default,
                file_size: 0,
                digest: [0; 20],
            }
        }
    }
}
