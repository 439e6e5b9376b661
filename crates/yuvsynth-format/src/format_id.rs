//! 容器格式标识与扩展名映射.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// 无头部, 逐帧紧凑存放的 yuv420p
    RawVideo,
    /// YUV4MPEG2: 一行文本头部, 每帧前有 `FRAME` 标记
    Y4m,
    /// H.264 Annex B 裸流: 起始码分隔的 NAL 单元, 没有容器头部
    H264,
}

impl FormatId {
    pub const ALL: &[FormatId] = &[Self::RawVideo, Self::Y4m, Self::H264];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::RawVideo => "rawvideo",
            Self::Y4m => "yuv4mpegpipe",
            Self::H264 => "h264",
        }
    }

    /// 识别的扩展名, 第一个是写出时的默认扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::RawVideo => &["yuv", "bin", "rawvideo"],
            Self::Y4m => &["y4m"],
            Self::H264 => &["h264", "264"],
        }
    }

    /// 扩展名不含 `.`, 不区分大小写
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        Self::ALL.iter().copied().find(|id| {
            id.extensions()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }

    pub fn from_filename(filename: &str) -> Option<FormatId> {
        let ext = Path::new(filename).extension()?.to_str()?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
