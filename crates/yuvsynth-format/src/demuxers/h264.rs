//! H.264 Annex B 裸流解封装器.
//!
//! 裸流没有容器头部: 宽高、像素宽高比与帧率取自第一个 SPS,
//! SPS 没有 timing_info 时帧率按 [`DEFAULT_FRAME_RATE`] 处理.
//! 数据按访问单元切分, 每个数据包恰好是一帧, pts 即帧号.

use log::{debug, trace};
use yuvsynth_codec::parsers::h264::{
    NalUnitType, Sps, contains_idr, find_start_codes, next_access_unit, parse_sps, split_annex_b,
};
use yuvsynth_codec::{CodecId, Packet};
use yuvsynth_core::{PixelFormat, Rational, SynthError, SynthResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::{Stream, VideoStreamParams};

/// SPS 未携带帧率时使用的帧率
pub const DEFAULT_FRAME_RATE: Rational = Rational::new(25, 1);

/// 每次从输入读取的字节数
const READ_CHUNK: usize = 64 * 1024;

/// 查找 SPS 时最多读入的字节数
const MAX_SPS_SEARCH: usize = 4 * 1024 * 1024;

/// H.264 裸流解封装器
pub struct H264Demuxer {
    streams: Vec<Stream>,
    /// 已读入、尚未切分出去的数据, 总是从访问单元开头开始
    pending: Vec<u8>,
    /// `pending[0]` 在输入中的偏移
    pending_pos: u64,
    eof: bool,
    chunk_size: usize,
    next_frame: i64,
}

impl H264Demuxer {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::with_chunk_size(READ_CHUNK)))
    }

    fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            streams: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
            eof: false,
            chunk_size,
            next_frame: 0,
        }
    }

    /// 追加读入一块数据, 返回读入的字节数
    fn fill(&mut self, io: &mut IoContext) -> SynthResult<usize> {
        let old_len = self.pending.len();
        self.pending.resize(old_len + self.chunk_size, 0);
        let n = io.read_full(&mut self.pending[old_len..])?;
        self.pending.truncate(old_len + n);
        if n < self.chunk_size {
            self.eof = true;
        }
        Ok(n)
    }

    /// 在已读入的完整 NAL 单元中查找第一个可解析的 SPS
    ///
    /// 未到末尾时缓冲区里最后一个 NAL 可能被截断, 不参与查找.
    fn find_sps(&self) -> SynthResult<Option<Sps>> {
        let complete = if self.eof {
            self.pending.len()
        } else {
            find_start_codes(&self.pending).last().copied().unwrap_or(0)
        };
        let Some(nalu) = split_annex_b(&self.pending[..complete])
            .into_iter()
            .find(|n| n.nal_type == NalUnitType::Sps)
        else {
            return Ok(None);
        };
        parse_sps(&nalu.rbsp()).map(Some)
    }
}

fn stream_params(sps: &Sps) -> SynthResult<VideoStreamParams> {
    if sps.chroma_format_idc != 1 || sps.bit_depth_luma != 8 {
        return Err(SynthError::Unsupported(format!(
            "H.264: 只支持 8 位 4:2:0, 实际 chroma_format_idc={} bit_depth={}",
            sps.chroma_format_idc, sps.bit_depth_luma
        )));
    }
    let frame_rate = sps.fps.filter(Rational::is_positive).unwrap_or(DEFAULT_FRAME_RATE);
    let sample_aspect_ratio = if sps.sar.is_positive() {
        sps.sar
    } else {
        Rational::new(1, 1)
    };
    Ok(VideoStreamParams {
        width: sps.width,
        height: sps.height,
        pixel_format: PixelFormat::Yuv420p,
        frame_rate,
        sample_aspect_ratio,
    })
}

impl Demuxer for H264Demuxer {
    fn format_id(&self) -> FormatId {
        FormatId::H264
    }

    fn name(&self) -> &str {
        "h264"
    }

    fn open(&mut self, io: &mut IoContext) -> SynthResult<()> {
        self.pending.clear();
        self.pending_pos = io.position()?;
        self.eof = false;
        self.next_frame = 0;

        let sps = loop {
            if let Some(sps) = self.find_sps()? {
                break sps;
            }
            if self.eof || self.pending.len() >= MAX_SPS_SEARCH {
                return Err(if self.pending.is_empty() {
                    SynthError::InvalidData("H.264 输入为空".into())
                } else {
                    SynthError::InvalidData("H.264 裸流中没有找到 SPS".into())
                });
            }
            self.fill(io)?;
        };
        if find_start_codes(&self.pending).first() != Some(&0) {
            return Err(SynthError::InvalidData("H.264 裸流不以起始码开头".into()));
        }

        let video = stream_params(&sps)?;
        debug!(
            "打开 H.264 裸流: profile={} level={} {}x{} @ {} fps{}",
            sps.profile_idc,
            sps.level_idc,
            video.width,
            video.height,
            video.frame_rate,
            if sps.fps.is_none() { " (默认)" } else { "" }
        );
        let mut stream = Stream::raw_video(0, video);
        stream.codec_id = CodecId::H264;
        self.streams = vec![stream];
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> SynthResult<Packet> {
        let time_base = self
            .streams
            .first()
            .map(|s| s.time_base)
            .ok_or_else(|| SynthError::InvalidArgument("解封装器尚未打开".into()))?;

        let end = loop {
            if let Some(end) = next_access_unit(&self.pending) {
                break end;
            }
            if self.eof {
                if self.pending.is_empty() {
                    return Err(SynthError::Eof);
                }
                break self.pending.len();
            }
            self.fill(io)?;
        };

        let data: Vec<u8> = self.pending.drain(..end).collect();
        let mut pkt = Packet::video_frame(data, self.next_frame, time_base);
        pkt.is_keyframe = contains_idr(&pkt.data);
        pkt.pos = Some(self.pending_pos);
        trace!(
            "H.264 访问单元 {}: {} 字节 key={}",
            self.next_frame,
            end,
            pkt.is_keyframe
        );

        self.pending_pos += end as u64;
        self.next_frame += 1;
        Ok(pkt)
    }
}
