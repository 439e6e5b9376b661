//! # yuvsynth-codec
//!
//! 编解码器框架, 提供 Packet/Frame 抽象与编解码流程的核心 trait.
//!
//! 内置两种编解码器:
//! - rawvideo: 把一帧的各平面拼接成一个数据包, 解码时再按像素格式拆分
//! - H.264: 基于 openh264 (`h264` 特性, 默认开启), 数据包为 Annex B 访问单元
//!
//! HEVC 只保留标识符, 创建时返回 `CodecNotFound`.
//!
//! ## 使用示例
//!
//! ```rust
//! use yuvsynth_codec::{CodecId, CodecRegistry};
//!
//! let mut reg = CodecRegistry::new();
//! yuvsynth_codec::register_all(&mut reg);
//!
//! let encoder = reg.create_encoder(CodecId::RawVideo).unwrap();
//! assert_eq!(encoder.name(), "rawvideo");
//! assert!(reg.create_encoder(CodecId::Hevc).is_err());
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod frame;
pub mod layout;
pub mod packet;
pub mod parsers;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{CodecParameters, VideoCodecParams};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use frame::{PictureType, VideoFrame};
pub use layout::{FrameLayout, PlaneLayout};
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
