use std::io::Write as IoWrite;

use symphonia_index::codec::{read_index, write_index, EnabledSources};
use symphonia_index::index::DecoderSource;
use symphonia_index::indexer::{Indexer, Packet, PacketDecoder, PacketSource, VideoMeta};
use symphonia_index::track::TrackType;
use symphonia_index::units::Timebase;
use symphonia_index::{FrameType, Index};

/// A packet source replaying a fixed decode-order video GOP: I P B P B, mirroring the layout
/// used to validate presentation reordering.
struct GopSource {
    packets: Vec<Packet>,
    pos: usize,
}

impl PacketSource for GopSource {
    fn format_name(&self) -> &str {
        "test-container"
    }

    fn num_streams(&self) -> usize {
        1
    }

    fn stream_type(&self, _index: usize) -> TrackType {
        TrackType::Video
    }

    fn stream_timebase(&self, _index: usize) -> Timebase {
        Timebase::new(1, 24000)
    }

    fn next_packet(&mut self) -> symphonia_index::Result<Option<Packet>> {
        if self.pos >= self.packets.len() {
            return Ok(None);
        }
        let p = Packet {
            stream_index: 0,
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

/// A decoder whose video parser reads a single byte of frame-type tag out of the packet
/// payload, standing in for a real bitstream parser.
struct TaggedVideoDecoder;

impl PacketDecoder for TaggedVideoDecoder {
    fn decode_audio(&mut self, _stream_index: usize, _data: &[u8]) -> symphonia_index::Result<Vec<symphonia_index::indexer::AudioChunk>> {
        Ok(Vec::new())
    }

    fn parse_video(&mut self, _stream_index: usize, data: &[u8]) -> Option<VideoMeta> {
        let frame_type = match data[0] {
            b'I' => FrameType::I,
            b'P' => FrameType::P,
            b'B' => FrameType::B,
            _ => FrameType::Other,
        };
        Some(VideoMeta { repeat_pict: 0, frame_type })
    }
}

fn video_packet(pts: i64, file_pos: i64, tag: u8, key_frame: bool) -> Packet {
    Packet { stream_index: 0, data: vec![tag], pts: Some(pts), dts: None, file_pos, key_frame }
}

/// Indexes a small in-memory GOP end to end, sorts it into presentation order, persists it
/// through the on-disk codec, and restores it byte-exactly.
#[test]
fn indexes_and_round_trips_a_gop() {
    let mut source_file = tempfile::NamedTempFile::new().unwrap();
    source_file.write_all(&[0u8; 64]).unwrap();
    source_file.flush().unwrap();

    let source = GopSource {
        pos: 0,
        packets: vec![
            video_packet(0, 0, b'I', true),
            video_packet(20, 1, b'P', false),
            video_packet(10, 2, b'B', false),
            video_packet(40, 3, b'P', false),
            video_packet(30, 4, b'B', false),
        ],
    };

    let indexer = Indexer::new(source_file.path(), source, TaggedVideoDecoder, DecoderSource::Default).unwrap();
    let index = indexer.run().unwrap();

    let track = &index.tracks[0];
    let pts: Vec<i64> = track.frames().iter().map(|f| f.pts).collect();
    assert_eq!(pts, vec![0, 10, 20, 30, 40], "frames should be in presentation order after sort()");

    let mut buf = Vec::new();
    write_index(&index, &mut buf).unwrap();

    let restored: Index = read_index(buf.as_slice(), EnabledSources::all()).unwrap();
    assert_eq!(restored.tracks.len(), index.tracks.len());
    assert_eq!(restored.tracks[0].frames().len(), track.frames().len());
    for (a, b) in restored.tracks[0].frames().iter().zip(track.frames().iter()) {
        assert_eq!(a.pts, b.pts);
        assert_eq!(a.file_pos, b.file_pos);
        assert_eq!(a.frame_type, b.frame_type);
        assert_eq!(a.original_pos, b.original_pos);
    }

    assert!(restored.compare_file_signature(source_file.path()).unwrap());
}
