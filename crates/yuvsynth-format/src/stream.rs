//! 流信息定义.
//!
//! 对标 FFmpeg 的 `AVStream`. 这里的容器只承载单条视频流.

use yuvsynth_codec::{CodecId, CodecParameters};
use yuvsynth_core::{PixelFormat, Rational, SynthError, SynthResult};

/// 流信息
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// 流索引 (在容器中的位置, 从 0 开始)
    pub index: usize,
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 时间基
    pub time_base: Rational,
    /// 总帧数 (0 表示未知)
    pub nb_frames: u64,
    /// 视频参数
    pub video: VideoStreamParams,
}

/// 视频流参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
}

impl VideoStreamParams {
    /// 创建 YUV420P 视频参数, SAR 为 1:1
    pub fn yuv420p(width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate,
            sample_aspect_ratio: Rational::new(1, 1),
        }
    }

    /// 单帧原始数据的字节数
    pub fn frame_size(&self) -> SynthResult<usize> {
        self.pixel_format.check_dimensions(self.width, self.height)?;
        self.pixel_format
            .frame_size(self.width, self.height)
            .ok_or_else(|| {
                SynthError::InvalidArgument(format!("无法计算 {} 的帧大小", self.pixel_format))
            })
    }
}

impl Stream {
    /// 创建 rawvideo 视频流, 时间基为帧率的倒数
    pub fn raw_video(index: usize, video: VideoStreamParams) -> Self {
        Self {
            index,
            codec_id: CodecId::RawVideo,
            time_base: video.frame_rate.invert(),
            nb_frames: 0,
            video,
        }
    }

    /// 转换为编解码器参数, 用于打开解码器
    pub fn codec_parameters(&self) -> CodecParameters {
        let mut params = CodecParameters::video(
            self.codec_id,
            self.video.width,
            self.video.height,
            self.video.pixel_format,
            self.video.frame_rate,
        );
        params.video.sample_aspect_ratio = self.video.sample_aspect_ratio;
        params
    }
}
