//! 封装器实现模块.

pub mod h264;
pub mod rawvideo;
pub mod y4m;

use crate::format_id::FormatId;
use crate::registry::FormatRegistry;

/// 注册所有内置封装器
pub fn register_all_muxers(registry: &mut FormatRegistry) {
    registry.register_muxer(FormatId::RawVideo, "rawvideo", rawvideo::RawVideoMuxer::create);
    registry.register_muxer(FormatId::Y4m, "yuv4mpegpipe", y4m::Y4mMuxer::create);
    registry.register_muxer(FormatId::H264, "h264", h264::H264Muxer::create);
}
