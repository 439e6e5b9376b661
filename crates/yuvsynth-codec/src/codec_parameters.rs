//! 打开编解码器所需的参数.
//!
//! 来源有两处: 编码时由图案配置构造, 解码时由容器的流信息转换而来.

use yuvsynth_core::{PixelFormat, Rational};

use crate::codec_id::CodecId;

#[derive(Debug, Clone)]
pub struct CodecParameters {
    pub codec_id: CodecId,
    /// bits/s, 0 表示未知. rawvideo 由帧大小与帧率推算
    pub bit_rate: u64,
    pub video: VideoCodecParams,
}

#[derive(Debug, Clone)]
pub struct VideoCodecParams {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub frame_rate: Rational,
    pub sample_aspect_ratio: Rational,
}

impl CodecParameters {
    /// 视频参数, 像素宽高比 1:1, 码率未知
    pub fn video(
        codec_id: CodecId,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        frame_rate: Rational,
    ) -> Self {
        let video = VideoCodecParams {
            width,
            height,
            pixel_format,
            frame_rate,
            sample_aspect_ratio: Rational::new(1, 1),
        };
        Self {
            codec_id,
            bit_rate: 0,
            video,
        }
    }

    /// 帧率的倒数, 已约分
    pub fn time_base(&self) -> Rational {
        self.video.frame_rate.invert().reduce()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_时间基() {
        let params = CodecParameters::video(
            CodecId::RawVideo,
            352,
            288,
            PixelFormat::Yuv420p,
            Rational::new(50, 2),
        );
        assert_eq!(params.time_base(), Rational::new(1, 25));
        assert_eq!(params.video.sample_aspect_ratio, Rational::new(1, 1));
        assert_eq!(params.bit_rate, 0);
    }
}
