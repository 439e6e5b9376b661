//! H.264 Annex B 裸流封装器.
//!
//! 没有头部和尾部, 数据包本身就是带起始码的访问单元, 按顺序写出即可.

use log::debug;
use yuvsynth_codec::parsers::h264::START_CODE;
use yuvsynth_codec::{CodecId, Packet};
use yuvsynth_core::{SynthError, SynthResult};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::Stream;

/// H.264 裸流封装器
#[derive(Default)]
pub struct H264Muxer {
    header_written: bool,
    packets_written: u64,
    bytes_written: u64,
}

impl H264Muxer {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::default()))
    }
}

fn starts_with_start_code(data: &[u8]) -> bool {
    data.starts_with(&START_CODE) || data.starts_with(&START_CODE[1..])
}

impl Muxer for H264Muxer {
    fn format_id(&self) -> FormatId {
        FormatId::H264
    }

    fn name(&self) -> &str {
        "h264"
    }

    fn write_header(&mut self, _io: &mut IoContext, streams: &[Stream]) -> SynthResult<()> {
        let [stream] = streams else {
            return Err(SynthError::InvalidArgument(
                "H.264 裸流仅支持单个视频流".into(),
            ));
        };
        if stream.codec_id != CodecId::H264 {
            return Err(SynthError::Unsupported(format!(
                "H.264 裸流只能承载 h264, 实际 {}",
                stream.codec_id
            )));
        }
        debug!(
            "H.264 裸流输出: {}x{} @ {} fps",
            stream.video.width, stream.video.height, stream.video.frame_rate
        );
        self.header_written = true;
        self.packets_written = 0;
        self.bytes_written = 0;
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> SynthResult<()> {
        if !self.header_written {
            return Err(SynthError::InvalidArgument("尚未写入头部".into()));
        }
        if packet.data.is_empty() {
            return Ok(());
        }
        if !starts_with_start_code(&packet.data) {
            return Err(SynthError::InvalidData(format!(
                "数据包 pts={} 不是 Annex B 格式",
                packet.pts
            )));
        }
        io.write_all(&packet.data)?;
        self.packets_written += 1;
        self.bytes_written += packet.data.len() as u64;
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> SynthResult<()> {
        io.flush()?;
        debug!(
            "H.264 裸流封装完成: {} 个访问单元, {} 字节",
            self.packets_written, self.bytes_written
        );
        Ok(())
    }
}
