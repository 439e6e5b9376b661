//! 编码器实现模块.

#[cfg(feature = "h264")]
pub mod h264;
pub mod rawvideo;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_encoder(
        CodecId::RawVideo,
        "rawvideo",
        rawvideo::RawVideoEncoder::create,
    );
    #[cfg(feature = "h264")]
    registry.register_encoder(CodecId::H264, "libopenh264", h264::H264Encoder::create);
}
