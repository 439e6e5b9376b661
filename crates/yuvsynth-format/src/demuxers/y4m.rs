//! YUV4MPEG2 (Y4M) 解封装器.
//!
//! 头部与帧标记由 `y4m` crate 解析, 只接受 4:2:0 色彩空间.
//! 每个 `FRAME` 之后是一帧平面数据, 帧头中的附加参数被忽略.

use std::io::Read;

use log::debug;
use yuvsynth_codec::Packet;
use yuvsynth_core::{PixelFormat, Rational, SynthError, SynthResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::{Stream, VideoStreamParams};

/// Y4M 文件魔数
pub const Y4M_MAGIC: &str = "YUV4MPEG2";

/// 头部行的最大长度, 与 `y4m` crate 的参数缓冲区一致
const MAX_HEADER_LEN: usize = 1024;

/// 把 `y4m` crate 的错误映射为统一错误
pub(crate) fn map_y4m_error(err: y4m::Error) -> SynthError {
    match err {
        y4m::Error::EOF => SynthError::Eof,
        y4m::Error::UnknownColorspace => {
            SynthError::Unsupported("Y4M 色彩空间无法识别".into())
        }
        y4m::Error::IoError(e) => SynthError::Io(e),
        other => SynthError::InvalidData(format!("Y4M 数据无效: {:?}", other)),
    }
}

fn to_rational(ratio: y4m::Ratio) -> Option<Rational> {
    let num = i32::try_from(ratio.num).ok()?;
    let den = i32::try_from(ratio.den).ok()?;
    Some(Rational::new(num, den))
}

/// 从已解析头部的 `y4m::Decoder` 中取出流参数
fn stream_params<R: Read>(decoder: &y4m::Decoder<R>) -> SynthResult<VideoStreamParams> {
    match decoder.get_colorspace() {
        y4m::Colorspace::C420
        | y4m::Colorspace::C420jpeg
        | y4m::Colorspace::C420paldv
        | y4m::Colorspace::C420mpeg2 => {}
        other => {
            return Err(SynthError::Unsupported(format!(
                "Y4M 色彩空间 {:?} 不受支持, 仅支持 8 位 4:2:0",
                other
            )));
        }
    }

    let width = u32::try_from(decoder.get_width())
        .map_err(|_| SynthError::InvalidData("Y4M 宽度越界".into()))?;
    let height = u32::try_from(decoder.get_height())
        .map_err(|_| SynthError::InvalidData("Y4M 高度越界".into()))?;
    // 缺少 F 参数时 y4m crate 取 25 fps
    let frame_rate = to_rational(decoder.get_framerate())
        .filter(Rational::is_positive)
        .ok_or_else(|| {
            let rate = decoder.get_framerate();
            SynthError::InvalidData(format!("无效帧率: {}:{}", rate.num, rate.den))
        })?;
    // A0:0 表示未知
    let sample_aspect_ratio = to_rational(decoder.get_pixel_aspect())
        .filter(Rational::is_positive)
        .unwrap_or(Rational::new(1, 1));

    Ok(VideoStreamParams {
        width,
        height,
        pixel_format: PixelFormat::Yuv420p,
        frame_rate,
        sample_aspect_ratio,
    })
}

/// 解析 Y4M 头部行 (含结尾换行符)
pub fn parse_header(header: &[u8]) -> SynthResult<VideoStreamParams> {
    let decoder = y4m::decode(header).map_err(map_y4m_error)?;
    stream_params(&decoder)
}

/// Y4M 解封装器
pub struct Y4mDemuxer {
    /// 流信息
    streams: Vec<Stream>,
    /// 原始头部 (含换行符), 每帧都要交给 `y4m::Decoder` 重新解析
    header: Vec<u8>,
    /// 下一帧的帧号
    next_frame: i64,
}

impl Y4mDemuxer {
    /// 创建 Y4M 解封装器实例 (工厂函数)
    pub fn create() -> SynthResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self {
            streams: Vec::new(),
            header: Vec::new(),
            next_frame: 0,
        }))
    }
}

impl Demuxer for Y4mDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Y4m
    }

    fn name(&self) -> &str {
        "yuv4mpegpipe"
    }

    fn open(&mut self, io: &mut IoContext) -> SynthResult<()> {
        let mut header = match io.read_line(MAX_HEADER_LEN) {
            Err(SynthError::Eof) => {
                return Err(SynthError::InvalidData("Y4M 输入为空".into()));
            }
            other => other?,
        };
        header.push(b'\n');
        let params = parse_header(&header)?;
        let frame_size = params.frame_size()?;

        let mut stream = Stream::raw_video(0, params);
        if let Some(size) = io.size() {
            // 每帧 = "FRAME\n" + 负载
            let per_frame = (frame_size + "FRAME\n".len()) as u64;
            let body = size.saturating_sub(header.len() as u64);
            stream.nb_frames = body / per_frame;
        }
        debug!(
            "打开 Y4M: {}x{} @ {} fps, 约 {} 帧",
            params.width, params.height, params.frame_rate, stream.nb_frames
        );

        self.streams = vec![stream];
        self.header = header;
        self.next_frame = 0;
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> SynthResult<Packet> {
        let stream = self
            .streams
            .first()
            .ok_or_else(|| SynthError::InvalidArgument("解封装器尚未打开".into()))?;
        let time_base = stream.time_base;

        // y4m::Decoder 独占读取端, 每帧在上下文前拼接头部重建
        let pos = io.position()?;
        let result = y4m::decode(self.header.as_slice().chain(&mut *io)).and_then(|mut decoder| {
            let frame = decoder.read_frame()?;
            let (y, u, v) = (frame.get_y_plane(), frame.get_u_plane(), frame.get_v_plane());
            let mut data = Vec::with_capacity(y.len() + u.len() + v.len());
            data.extend_from_slice(y);
            data.extend_from_slice(u);
            data.extend_from_slice(v);
            Ok(data)
        });

        let data = match result {
            Ok(data) => data,
            Err(y4m::Error::EOF) if io.position()? > pos => {
                return Err(SynthError::InvalidData(format!(
                    "第 {} 帧不完整",
                    self.next_frame
                )));
            }
            Err(y4m::Error::ParseError(_)) => {
                return Err(SynthError::InvalidData(format!(
                    "第 {} 帧缺少 FRAME 标记",
                    self.next_frame
                )));
            }
            Err(e) => return Err(map_y4m_error(e)),
        };

        let mut pkt = Packet::video_frame(data, self.next_frame, time_base);
        pkt.pos = Some(pos);
        self.next_frame += 1;
        Ok(pkt)
    }

    fn duration(&self) -> Option<f64> {
        let stream = self.streams.first()?;
        if stream.nb_frames == 0 {
            return None;
        }
        Some(stream.nb_frames as f64 * stream.time_base.to_f64())
    }
}
