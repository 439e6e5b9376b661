//! Raw video 封装器.
//!
//! 没有头部和尾部, 直接顺序追加每个数据包的负载.
//! 读取方必须通过带外方式得知宽高、帧率与像素格式.

use log::debug;
use yuvsynth_codec::Packet;
use yuvsynth_core::{SynthError, SynthResult};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::Stream;

/// Raw video 封装器
pub struct RawVideoMuxer {
    /// 已写入的数据包数
    packets_written: u64,
    /// 已写入的字节数
    bytes_written: u64,
}

impl RawVideoMuxer {
    /// 创建 raw video 封装器实例 (工厂函数)
    pub fn create() -> SynthResult<Box<dyn Muxer>> {
        Ok(Box::new(Self {
            packets_written: 0,
            bytes_written: 0,
        }))
    }
}

impl Muxer for RawVideoMuxer {
    fn format_id(&self) -> FormatId {
        FormatId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn write_header(&mut self, _io: &mut IoContext, streams: &[Stream]) -> SynthResult<()> {
        if streams.len() != 1 {
            return Err(SynthError::InvalidArgument(
                "raw video 仅支持单个视频流".into(),
            ));
        }
        let video = &streams[0].video;
        debug!(
            "raw video 输出: {}x{} {} @ {} fps ({})",
            video.width, video.height, video.pixel_format, video.frame_rate, streams[0].codec_id,
        );
        self.packets_written = 0;
        self.bytes_written = 0;
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> SynthResult<()> {
        io.write_all(&packet.data)?;
        self.packets_written += 1;
        self.bytes_written += packet.data.len() as u64;
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> SynthResult<()> {
        io.flush()?;
        debug!(
            "raw video 封装完成: {} 个数据包, {} 字节",
            self.packets_written, self.bytes_written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::VideoStreamParams;
    use yuvsynth_core::Rational;

    #[test]
    fn test_负载按顺序追加() {
        let stream = Stream::raw_video(0, VideoStreamParams::yuv420p(2, 2, Rational::new(25, 1)));
        let mut io = IoContext::memory_writer();
        let mut muxer = RawVideoMuxer::create().unwrap();

        muxer.write_header(&mut io, &[stream]).unwrap();
        muxer
            .write_packet(&mut io, &Packet::from_data(vec![1u8, 2, 3, 4, 5, 6]))
            .unwrap();
        muxer
            .write_packet(&mut io, &Packet::from_data(vec![7u8, 8, 9, 10, 11, 12]))
            .unwrap();
        muxer.write_trailer(&mut io).unwrap();

        assert_eq!(io.into_data().unwrap(), (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_拒绝多个流() {
        let params = VideoStreamParams::yuv420p(2, 2, Rational::new(25, 1));
        let streams = [Stream::raw_video(0, params), Stream::raw_video(1, params)];
        let mut io = IoContext::memory_writer();
        let mut muxer = RawVideoMuxer::create().unwrap();
        assert!(matches!(
            muxer.write_header(&mut io, &streams),
            Err(SynthError::InvalidArgument(_))
        ));
    }
}
