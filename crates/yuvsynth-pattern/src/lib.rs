//! # yuvsynth-pattern
//!
//! 确定性合成测试图案生成器.
//!
//! 针对 宽 x 高 x 帧数 的视频体生成平面 YUV 4:2:0 采样:
//! - 亮度为 `(x + y + 3z) mod 256` 的斜向渐变
//! - 叠加一条每 5 帧下移 `0.05 * 高度`、可见宽度随帧号线性增长的水平条纹 (值 16)
//! - 色度按 [`ChromaFill`] 策略填充
//!
//! 输出顺序为帧优先、平面优先: 每帧依次写出 Y、U、V 三个平面, 平面内按行优先.
//!
//! ```rust
//! use yuvsynth_pattern::{PatternConfig, PatternGenerator};
//!
//! let config = PatternConfig::default();
//! let generator = PatternGenerator::new(config).unwrap();
//! let volume = generator.generate();
//! assert_eq!(volume.len(), 25 * 352 * 288 * 3 / 2);
//! assert_eq!(generator.luma_sample(0, 45, 6), 16);
//! ```

pub mod config;
pub mod generator;

pub use config::{ChromaFill, PatternConfig};
pub use generator::{ChromaPlane, Frames, PatternGenerator, StripeBand};
