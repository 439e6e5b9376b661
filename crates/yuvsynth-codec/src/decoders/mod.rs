//! 解码器实现模块.

#[cfg(feature = "h264")]
pub mod h264;
pub mod rawvideo;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut CodecRegistry) {
    registry.register_decoder(
        CodecId::RawVideo,
        "rawvideo",
        rawvideo::RawVideoDecoder::create,
    );
    #[cfg(feature = "h264")]
    registry.register_decoder(CodecId::H264, "libopenh264", h264::H264Decoder::create);
}
