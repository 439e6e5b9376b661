//! 图案生成配置.
//!
//! 视频体的尺寸、帧率与色度填充策略都是显式配置值, 由调用方传入.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use yuvsynth_core::{PixelFormat, Rational, SynthError, SynthResult};

/// 默认宽度 (CIF)
pub const DEFAULT_WIDTH: u32 = 352;
/// 默认高度 (CIF)
pub const DEFAULT_HEIGHT: u32 = 288;
/// 默认帧数
pub const DEFAULT_DEPTH: u32 = 25;
/// 默认帧率
pub const DEFAULT_FRAME_RATE: u32 = 25;

/// 色度填充策略
///
/// 两种策略来自两条不同的使用路径, 互不兼容, 因此都作为配置项保留.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaFill {
    /// U = V = 128 (中性色度, 原始 YUV 转储路径)
    #[default]
    Neutral,
    /// 随帧变化的渐变: U = 128 + cy + 2z, V = 64 + cx + 5z (编码器示例路径)
    ///
    /// cx / cy 为色度平面内的列 / 行坐标, 结果按 8 位回绕.
    Gradient,
}

impl ChromaFill {
    /// 策略名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Gradient => "gradient",
        }
    }
}

impl fmt::Display for ChromaFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ChromaFill {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" | "flat" => Ok(Self::Neutral),
            "gradient" | "varying" => Ok(Self::Gradient),
            other => Err(SynthError::InvalidArgument(format!(
                "未知的色度填充策略: {other} (可选 neutral / gradient)"
            ))),
        }
    }
}

/// 图案生成配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// 宽度 (像素), 必须为正偶数
    pub width: u32,
    /// 高度 (像素), 必须为正偶数
    pub height: u32,
    /// 帧数 (视频体深度)
    pub depth: u32,
    /// 帧率 (fps), 仅影响时间戳与容器头部
    pub frame_rate: u32,
    /// 色度填充策略
    pub chroma: ChromaFill,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            depth: DEFAULT_DEPTH,
            frame_rate: DEFAULT_FRAME_RATE,
            chroma: ChromaFill::default(),
        }
    }
}

impl PatternConfig {
    /// 以指定尺寸创建配置, 其余字段取默认值
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
            ..Self::default()
        }
    }

    /// 设置色度填充策略
    pub fn with_chroma(mut self, chroma: ChromaFill) -> Self {
        self.chroma = chroma;
        self
    }

    /// 设置帧率
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// 校验配置
    ///
    /// 宽高必须为正偶数 (4:2:0 子采样要求), 帧数与帧率必须为正.
    pub fn validate(&self) -> SynthResult<()> {
        PixelFormat::Yuv420p.check_dimensions(self.width, self.height)?;
        if self.depth == 0 {
            return Err(SynthError::InvalidDimension("帧数必须为正数".into()));
        }
        if self.frame_rate == 0 || self.frame_rate > i32::MAX as u32 {
            return Err(SynthError::InvalidDimension(format!(
                "无效帧率: {}",
                self.frame_rate
            )));
        }
        Ok(())
    }

    /// 亮度平面字节数: 宽 * 高
    pub fn luma_plane_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 单个色度平面字节数: (宽 / 2) * (高 / 2)
    pub fn chroma_plane_size(&self) -> usize {
        self.chroma_width() * self.chroma_height()
    }

    /// 色度平面宽度
    pub fn chroma_width(&self) -> usize {
        self.width as usize / 2
    }

    /// 色度平面高度
    pub fn chroma_height(&self) -> usize {
        self.height as usize / 2
    }

    /// 单帧字节数: 宽 * 高 * 3 / 2
    pub fn frame_size(&self) -> usize {
        self.luma_plane_size() + 2 * self.chroma_plane_size()
    }

    /// 整个视频体的字节数: 帧数 * 单帧字节数
    pub fn volume_size(&self) -> usize {
        self.depth as usize * self.frame_size()
    }

    /// 帧率 (有理数形式)
    pub fn frame_rate_rational(&self) -> Rational {
        Rational::new(self.frame_rate as i32, 1)
    }

    /// 时间基 (帧率的倒数), pts 以帧为单位
    pub fn time_base(&self) -> Rational {
        Rational::new(1, self.frame_rate as i32)
    }

    /// 原始 YUV 转储的默认文件名, 如 `yuv420p_25f_352x288.bin`
    pub fn default_file_name(&self) -> String {
        format!(
            "yuv420p_{}f_{}x{}.bin",
            self.depth, self.width, self.height
        )
    }
}
