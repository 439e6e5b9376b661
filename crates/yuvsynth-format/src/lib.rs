//! # yuvsynth-format
//!
//! 容器格式库, 提供封装/解封装框架与 I/O 抽象.
//!
//! 支持的格式:
//! - raw video (`.yuv` / `.bin` / `.rawvideo`): 无头部, 参数需带外指定
//! - YUV4MPEG2 (`.y4m`): 文本头部携带宽高、帧率与色彩空间
//! - H.264 裸流 (`.h264` / `.264`): Annex B 字节流, 参数取自 SPS
//!
//! 另提供把单帧亮度平面转储为 PGM 图像的工具函数 (见 [`pgm`]).

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod muxer;
pub mod muxers;
pub mod pgm;
pub mod probe;
pub mod registry;
pub mod stream;

// 重导出常用类型
pub use demuxer::Demuxer;
pub use format_id::FormatId;
pub use io::{IoBackend, IoContext, MemoryBackend};
pub use muxer::Muxer;
pub use probe::{ProbeResult, SignatureProbe};
pub use registry::FormatRegistry;
pub use stream::{Stream, VideoStreamParams};

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
    muxers::register_all_muxers(registry);
}
