//! # yuvsynth
//!
//! 确定性 YUV 4:2:0 测试图案生成, 以及围绕它的编码 / 封装 / 解码流水线.
//!
//! # 快速开始
//!
//! ```rust
//! use yuvsynth::pattern::{PatternConfig, PatternGenerator};
//!
//! let config = PatternConfig::new(64, 48, 5);
//! let generator = PatternGenerator::new(config).unwrap();
//! let volume = generator.generate();
//! assert_eq!(volume.len(), 5 * 64 * 48 * 3 / 2);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yuvsynth-core` | 错误类型、像素格式、有理数 |
//! | `yuvsynth-codec` | 帧 / 数据包, rawvideo 与 H.264 (openh264) 编解码器 |
//! | `yuvsynth-pattern` | 测试图案生成器 |
//! | `yuvsynth-format` | raw YUV / Y4M / H.264 裸流容器与 PGM 转储 |

pub mod pipeline;

/// 核心类型与工具
pub use yuvsynth_core as core;

/// 编解码器框架
pub use yuvsynth_codec as codec;

/// 测试图案生成
pub use yuvsynth_pattern as pattern;

/// 容器格式框架
pub use yuvsynth_format as format;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编解码器的注册表
pub fn default_codec_registry() -> yuvsynth_codec::CodecRegistry {
    let mut registry = yuvsynth_codec::CodecRegistry::new();
    yuvsynth_codec::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置容器格式的注册表
pub fn default_format_registry() -> yuvsynth_format::FormatRegistry {
    let mut registry = yuvsynth_format::FormatRegistry::new();
    yuvsynth_format::register_all(&mut registry);
    registry
}
