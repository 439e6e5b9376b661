//! 格式探测.
//!
//! 魔数匹配得满分, 仅扩展名匹配得 [`SCORE_EXTENSION`]. raw video 没有魔数,
//! 只能靠扩展名识别.

use crate::format_id::FormatId;

/// 探测置信度, 越高越可信
pub type ProbeScore = u32;

/// 仅扩展名匹配
pub const SCORE_EXTENSION: ProbeScore = 50;

/// 魔数完全匹配
pub const SCORE_MAX: ProbeScore = 100;

/// 探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub format_id: FormatId,
    pub score: ProbeScore,
}

/// 格式探测器 trait
pub trait FormatProbe {
    /// 根据文件开头的字节和可选的文件名打分, 不是此格式返回 `None`
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore>;

    /// 此探测器对应的格式
    fn format_id(&self) -> FormatId;
}

/// 按魔数与扩展名打分的探测器
#[derive(Debug, Clone, Copy)]
pub struct SignatureProbe {
    format_id: FormatId,
    magic: Option<&'static [u8]>,
}

impl SignatureProbe {
    /// 只按扩展名识别
    pub const fn extension_only(format_id: FormatId) -> Self {
        Self {
            format_id,
            magic: None,
        }
    }

    /// 数据以 `magic` 开头时得满分, 否则退回扩展名匹配
    pub const fn with_magic(format_id: FormatId, magic: &'static [u8]) -> Self {
        Self {
            format_id,
            magic: Some(magic),
        }
    }
}

impl FormatProbe for SignatureProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        match self.magic {
            Some(magic) if data.starts_with(magic) => Some(SCORE_MAX),
            _ => {
                let by_extension = filename.and_then(FormatId::from_filename);
                (by_extension == Some(self.format_id)).then_some(SCORE_EXTENSION)
            }
        }
    }

    fn format_id(&self) -> FormatId {
        self.format_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_魔数优先() {
        let probe = SignatureProbe::with_magic(FormatId::Y4m, b"YUV4MPEG2");
        assert_eq!(probe.probe(b"YUV4MPEG2 W4", None), Some(SCORE_MAX));
        assert_eq!(probe.probe(b"YUV4MPEG2 W4", Some("x.yuv")), Some(SCORE_MAX));
        assert_eq!(probe.probe(b"garbage", Some("x.y4m")), Some(SCORE_EXTENSION));
        assert_eq!(probe.probe(b"garbage", Some("x.yuv")), None);
        assert_eq!(probe.probe(b"", None), None);
    }

    #[test]
    fn test_仅扩展名() {
        let probe = SignatureProbe::extension_only(FormatId::RawVideo);
        assert_eq!(probe.probe(&[], Some("a.yuv")), Some(SCORE_EXTENSION));
        assert_eq!(probe.probe(&[], Some("A.BIN")), Some(SCORE_EXTENSION));
        assert_eq!(probe.probe(b"YUV4MPEG2", Some("a.y4m")), None);
        assert_eq!(probe.probe(&[], None), None);
        assert_eq!(probe.format_id(), FormatId::RawVideo);
    }
}
