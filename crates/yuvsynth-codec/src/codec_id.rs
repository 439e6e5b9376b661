//! 编解码器标识符.
//!
//! rawvideo 与 h264 有实现 (h264 需要 `h264` 特性); hevc 只用于命令行选择
//! 与输出命名, 创建时返回 `CodecNotFound`.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// H.264 / AVC (openh264)
    H264,
    /// H.265 / HEVC (仅标识, 无内置实现)
    Hevc,
    /// Raw 视频 (未压缩)
    RawVideo,
}

impl CodecId {
    /// 所有已知编解码器标识
    pub const ALL: &[CodecId] = &[Self::H264, Self::Hevc, Self::RawVideo];

    /// 获取编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::RawVideo => "rawvideo",
        }
    }

    /// 编码输出文件的默认扩展名
    pub const fn default_extension(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::RawVideo => "yuv",
        }
    }

    /// 按名称查找编解码器
    ///
    /// 名称中包含 "h264" / "hevc" / "rawvideo" 即可匹配, 不区分大小写,
    /// 因此 "libx264"、"h265" 之类的别名也能识别.
    pub fn from_name(name: &str) -> Option<CodecId> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("h264") || lower.contains("x264") || lower == "avc" {
            Some(Self::H264)
        } else if lower.contains("hevc") || lower.contains("h265") || lower.contains("x265") {
            Some(Self::Hevc)
        } else if lower.contains("rawvideo") || lower == "raw" {
            Some(Self::RawVideo)
        } else {
            None
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
