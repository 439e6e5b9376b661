//! 未压缩的视频帧.

use yuvsynth_core::{PixelFormat, Rational, SynthResult, timestamp::NOPTS_VALUE};

use crate::layout::FrameLayout;

/// 一帧原始像素, 每个平面一个缓冲区
///
/// yuv420p 依次为 Y, U, V 三个平面; `linesize[i]` 是平面 i 每行的字节数,
/// 可以大于可见宽度 (行尾填充).
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub data: Vec<Vec<u8>>,
    pub linesize: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pts: i64,
    pub time_base: Rational,
    /// 以 time_base 为单位, 0 表示未知
    pub duration: i64,
    pub is_keyframe: bool,
    pub picture_type: PictureType,
}

impl VideoFrame {
    /// 平面为空、时间戳未设置的帧
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let planes = pixel_format.plane_count() as usize;
        Self {
            data: vec![Vec::new(); planes],
            linesize: vec![0; planes],
            width,
            height,
            pixel_format,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
        }
    }

    /// 按紧凑布局分配零填充的平面
    pub fn alloc(width: u32, height: u32, pixel_format: PixelFormat) -> SynthResult<Self> {
        Ok(FrameLayout::new(pixel_format, width, height)?.alloc_frame())
    }
}

/// 帧类型. 未压缩的帧都是 I 帧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    #[default]
    None,
    I,
    P,
    B,
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvsynth_core::SynthError;

    #[test]
    fn test_分配_yuv420p() {
        let frame = VideoFrame::alloc(8, 4, PixelFormat::Yuv420p).unwrap();
        assert_eq!(frame.linesize, vec![8, 4, 4]);
        let sizes: Vec<usize> = frame.data.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 8, 8]);
        assert!(frame.data.iter().flatten().all(|&b| b == 0));
        assert_eq!(frame.pts, NOPTS_VALUE);
        assert_eq!(frame.picture_type, PictureType::None);
    }

    #[test]
    fn test_奇数尺寸被拒绝() {
        let err = VideoFrame::alloc(7, 4, PixelFormat::Yuv420p).unwrap_err();
        assert!(matches!(err, SynthError::InvalidDimension(_)));
    }

    #[test]
    fn test_空帧() {
        let frame = VideoFrame::new(4, 2, PixelFormat::Gray8);
        assert_eq!(frame.data, vec![Vec::<u8>::new()]);
        assert_eq!(frame.linesize, vec![0]);
    }
}
