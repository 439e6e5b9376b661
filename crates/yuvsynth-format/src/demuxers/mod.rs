//! 解封装器实现模块.

pub mod h264;
pub mod rawvideo;
pub mod y4m;

use yuvsynth_codec::parsers::h264::START_CODE;

use crate::format_id::FormatId;
use crate::probe::SignatureProbe;
use crate::registry::FormatRegistry;

/// 注册所有内置解封装器
pub fn register_all_demuxers(registry: &mut FormatRegistry) {
    registry.register_demuxer(
        FormatId::RawVideo,
        "rawvideo",
        rawvideo::RawVideoDemuxer::create,
    );
    // 没有魔数, 只能按扩展名识别
    registry.register_probe(Box::new(SignatureProbe::extension_only(FormatId::RawVideo)));

    registry.register_demuxer(FormatId::Y4m, "yuv4mpegpipe", y4m::Y4mDemuxer::create);
    registry.register_probe(Box::new(SignatureProbe::with_magic(
        FormatId::Y4m,
        y4m::Y4M_MAGIC.as_bytes(),
    )));

    registry.register_demuxer(FormatId::H264, "h264", h264::H264Demuxer::create);
    registry.register_probe(Box::new(SignatureProbe::with_magic(
        FormatId::H264,
        &START_CODE,
    )));
}
