//! YUV4MPEG2 (Y4M) 封装器.
//!
//! 文件结构:
//! ```text
//! YUV4MPEG2 W<宽> H<高> F<分子>:<分母> A<分子>:<分母> C420jpeg\n
//! FRAME\n <Y 平面><U 平面><V 平面>
//! FRAME\n ...
//! ```
//!
//! 头部与帧标记由 `y4m` crate 写出.

use std::io::Write;

use log::debug;
use yuvsynth_codec::{CodecId, FrameLayout, Packet};
use yuvsynth_core::{PixelFormat, Rational, SynthError, SynthResult};

use crate::demuxers::y4m::map_y4m_error;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::{Stream, VideoStreamParams};

/// Y4M 封装器
pub struct Y4mMuxer {
    /// 流参数, 写入头部后有效
    video: Option<VideoStreamParams>,
    /// 头部字节数
    header_len: usize,
    /// 已写入的帧数
    frames_written: u64,
}

impl Y4mMuxer {
    /// 创建 Y4M 封装器实例 (工厂函数)
    pub fn create() -> SynthResult<Box<dyn Muxer>> {
        Ok(Box::new(Self {
            video: None,
            header_len: 0,
            frames_written: 0,
        }))
    }
}

fn to_ratio(rational: Rational) -> y4m::Ratio {
    y4m::Ratio::new(rational.num as usize, rational.den as usize)
}

/// 写出 Y4M 头部, 返回可继续写帧的编码器
fn start_encoder<W: Write>(video: &VideoStreamParams, writer: W) -> SynthResult<y4m::Encoder<W>> {
    if video.pixel_format != PixelFormat::Yuv420p {
        return Err(SynthError::Unsupported(format!(
            "Y4M 仅支持 yuv420p, 实际 {}",
            video.pixel_format
        )));
    }
    let rate = video.frame_rate.reduce();
    if !rate.is_positive() {
        return Err(SynthError::InvalidArgument(format!(
            "无效帧率: {}",
            video.frame_rate
        )));
    }
    let sar = if video.sample_aspect_ratio.is_positive() {
        video.sample_aspect_ratio.reduce()
    } else {
        Rational::new(1, 1)
    };

    y4m::encode(video.width as usize, video.height as usize, to_ratio(rate))
        .with_colorspace(y4m::Colorspace::C420jpeg)
        .with_pixel_aspect(to_ratio(sar))
        .write_header(writer)
        .map_err(map_y4m_error)
}

impl Muxer for Y4mMuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Y4m
    }

    fn name(&self) -> &str {
        "yuv4mpegpipe"
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> SynthResult<()> {
        if streams.len() != 1 {
            return Err(SynthError::InvalidArgument("Y4M 仅支持单个视频流".into()));
        }
        let stream = &streams[0];
        if stream.codec_id != CodecId::RawVideo {
            return Err(SynthError::Unsupported(format!(
                "Y4M 只能承载 rawvideo, 实际 {}",
                stream.codec_id
            )));
        }

        let mut header = Vec::new();
        start_encoder(&stream.video, &mut header)?;
        io.write_all(&header)?;

        self.video = Some(stream.video);
        self.header_len = header.len();
        self.frames_written = 0;
        debug!(
            "Y4M 写入头部: {}",
            String::from_utf8_lossy(&header).trim_end()
        );
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> SynthResult<()> {
        let video = self
            .video
            .as_ref()
            .ok_or_else(|| SynthError::InvalidArgument("Y4M 头部尚未写入".into()))?;
        let layout = FrameLayout::new(video.pixel_format, video.width, video.height)?;
        let planes = layout.split(&packet.data)?;
        let frame = y4m::Frame::new([planes[0], planes[1], planes[2]], None);

        // y4m::Encoder 独占写入端且总会先写头部, 在暂存区写完后跳过重复的头部
        let mut scratch = Vec::with_capacity(self.header_len + "FRAME\n".len() + packet.data.len());
        start_encoder(video, &mut scratch)?
            .write_frame(&frame)
            .map_err(map_y4m_error)?;
        io.write_all(&scratch[self.header_len..])?;
        self.frames_written += 1;
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> SynthResult<()> {
        io.flush()?;
        debug!("Y4M 封装完成: {} 帧", self.frames_written);
        Ok(())
    }
}
