//! In-process decoding through ffmpeg-the-third.
//!
//! [`FfmpegSource`] implements the engine's [`FrameSource`] on top of
//! libavformat and libavcodec. Requires the `native-ffmpeg` feature.

use crate::{Error, Result};
use ffmpeg_the_third as ffmpeg;
use frameseek_core::{
    Decoded, DecodedFrame, FrameSource, Picture, Plane, SeekDirection, StreamInfo,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Outcome of the one-time library init, replayed to every caller.
static FFMPEG_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

fn init_ffmpeg() -> Result<()> {
    FFMPEG_INIT
        .get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(Error::FFmpeg)
}

/// One video stream of a file, decoded with FFmpeg.
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    info: StreamInfo,
    frame: ffmpeg::frame::Video,
    /// Position and size of the last packet sent to the decoder.
    last_packet: (Option<i64>, usize),
    draining: bool,
}

impl FfmpegSource {
    /// Open `path` and prepare a decoder for its video stream `track`, or
    /// the best video stream when `track` is `None`.
    pub fn open(path: &Path, track: Option<u32>) -> Result<Self> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(path).map_err(|e| {
            if e.to_string().contains("No such file") {
                Error::media_not_found(path)
            } else {
                Error::from(e)
            }
        })?;

        let no_track = || Error::NoVideoTrack {
            path: path.to_path_buf(),
            track: track.unwrap_or(0),
        };
        let stream = match track {
            Some(index) => input.stream(index as usize).ok_or_else(no_track)?,
            None => input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(no_track)?,
        };
        let stream_index = stream.index();

        let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        if codec_ctx.medium() != ffmpeg::media::Type::Video {
            return Err(no_track());
        }
        let codec_name = format!("{:?}", codec_ctx.id()).to_lowercase();
        let decoder = codec_ctx.decoder().video()?;

        let mut info = StreamInfo::new(path, stream_index as u32, codec_name);
        info.decoder_version = format!("libavcodec-{}", ffmpeg::codec::version());
        info.byte_len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        info.frame_rate = rational(stream.avg_frame_rate()).or_else(|| rational(stream.rate()));
        let time_base = rational(stream.time_base());
        info.duration_secs = match (stream.duration(), time_base) {
            (d, Some(tb)) if d > 0 => Some(d as f64 * tb),
            _ if input.duration() > 0 => Some(input.duration() as f64 / 1_000_000.0),
            _ => None,
        };

        debug!(
            path = %path.display(),
            track = stream_index,
            decoder = %info.decoder,
            delay = decoder.delay(),
            "opened ffmpeg source"
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            info,
            frame: ffmpeg::frame::Video::empty(),
            last_packet: (None, 0),
            draining: false,
        })
    }

    /// Seek the demuxer, then drop everything buffered in the decoder.
    fn seek_file(&mut self, min: i64, ts: i64, max: i64, flags: i32, stream: i32) -> Result<()> {
        // SAFETY: the context pointer is valid for the lifetime of `self.input`
        // and no packet borrowed from it is alive.
        let ret = unsafe {
            ffmpeg::ffi::avformat_seek_file(self.input.as_mut_ptr(), stream, min, ts, max, flags)
        };
        if ret < 0 {
            return Err(Error::from(ffmpeg::Error::from(ret)));
        }
        self.decoder.flush();
        self.last_packet = (None, 0);
        self.draining = false;
        Ok(())
    }

    fn convert(&self) -> DecodedFrame {
        let frame = &self.frame;
        let planes = (0..frame.planes())
            .map(|i| Plane {
                data: frame.data(i).to_vec(),
                stride: frame.stride(i) as isize,
                width: frame.plane_width(i) as usize,
                height: frame.plane_height(i) as usize,
            })
            .collect();
        let (byte_offset, packet_size) = self.last_packet;
        DecodedFrame {
            timestamp: frame.timestamp().or_else(|| frame.pts()),
            byte_offset,
            packet_size,
            is_keyframe: frame.is_key(),
            picture: Picture { planes },
        }
    }

    /// Read the next packet of our stream into the decoder.
    fn feed(&mut self) -> frameseek_core::Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() != self.stream_index => continue,
                Ok(()) => {
                    let position = packet.position() as i64;
                    self.last_packet = ((position >= 0).then_some(position), packet.size());
                    return self
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| frameseek_core::Error::decode(e.to_string()));
                }
                Err(ffmpeg::Error::Eof) => {
                    trace!("demuxer at end of file, draining decoder");
                    self.draining = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|e| frameseek_core::Error::backend(e.to_string()));
                }
                Err(e) => return Err(frameseek_core::Error::backend(e.to_string())),
            }
        }
    }
}

fn rational(r: ffmpeg::Rational) -> Option<f64> {
    if r.denominator() != 0 && r.numerator() > 0 {
        Some(r.numerator() as f64 / r.denominator() as f64)
    } else {
        None
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn seek_to_timestamp(
        &mut self,
        timestamp: i64,
        direction: SeekDirection,
    ) -> frameseek_core::Result<()> {
        let stream = self.stream_index as i32;
        let result = match direction {
            SeekDirection::Backward => self.seek_file(
                i64::MIN,
                timestamp,
                timestamp,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD as i32,
                stream,
            ),
            SeekDirection::Forward => self.seek_file(timestamp, timestamp, i64::MAX, 0, stream),
        };
        Ok(result?)
    }

    fn seek_to_byte_offset(&mut self, offset: i64) -> frameseek_core::Result<()> {
        let stream = self.stream_index as i32;
        Ok(self.seek_file(
            offset,
            offset,
            i64::MAX,
            ffmpeg::ffi::AVSEEK_FLAG_BYTE as i32,
            stream,
        )?)
    }

    fn rewind(&mut self) -> frameseek_core::Result<()> {
        let stream = self.stream_index as i32;
        Ok(self.seek_file(
            i64::MIN,
            i64::MIN,
            i64::MAX,
            ffmpeg::ffi::AVSEEK_FLAG_BACKWARD as i32,
            stream,
        )?)
    }

    fn decode_next_frame(&mut self) -> frameseek_core::Result<Decoded> {
        loop {
            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => return Ok(Decoded::Frame(self.convert())),
                Err(ffmpeg::Error::Eof) => return Ok(Decoded::Eof),
                Err(ffmpeg::Error::Other { errno }) if errno == libc::EAGAIN => {}
                Err(e) => return Err(frameseek_core::Error::decode(e.to_string())),
            }
            if self.draining {
                return Ok(Decoded::Eof);
            }
            self.feed()?;
        }
    }

    fn decoder_delay(&self) -> usize {
        self.decoder.delay()
    }
}
