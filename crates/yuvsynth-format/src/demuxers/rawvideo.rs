//! Raw video 解封装器.
//!
//! 文件没有头部, 宽高、像素格式与帧率必须显式提供.
//! 数据按单帧大小切分为数据包, pts 即帧号.

use log::debug;
use yuvsynth_codec::Packet;
use yuvsynth_core::{SynthError, SynthResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::{Stream, VideoStreamParams};

/// Raw video 解封装器
pub struct RawVideoDemuxer {
    /// 带外提供的视频参数
    params: Option<VideoStreamParams>,
    /// 流信息
    streams: Vec<Stream>,
    /// 单帧字节数
    frame_size: usize,
    /// 下一帧的帧号
    next_frame: i64,
}

impl RawVideoDemuxer {
    /// 创建未指定参数的实例 (工厂函数)
    ///
    /// 这样创建的解封装器在 `open()` 时返回 `InvalidArgument`.
    pub fn create() -> SynthResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new(None)))
    }

    /// 以显式参数创建解封装器
    pub fn with_params(params: VideoStreamParams) -> Box<dyn Demuxer> {
        Box::new(Self::new(Some(params)))
    }

    fn new(params: Option<VideoStreamParams>) -> Self {
        Self {
            params,
            streams: Vec::new(),
            frame_size: 0,
            next_frame: 0,
        }
    }
}

impl Demuxer for RawVideoDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, io: &mut IoContext) -> SynthResult<()> {
        let params = self.params.ok_or_else(|| {
            SynthError::InvalidArgument("raw video 没有头部, 必须显式指定宽高与帧率".into())
        })?;
        if !params.frame_rate.is_positive() {
            return Err(SynthError::InvalidArgument(format!(
                "无效帧率: {}",
                params.frame_rate
            )));
        }
        self.frame_size = params.frame_size()?;

        let mut stream = Stream::raw_video(0, params);
        if let Some(size) = io.size() {
            stream.nb_frames = size / self.frame_size as u64;
            if size % self.frame_size as u64 != 0 {
                debug!(
                    "raw video 输入大小 {} 不是帧大小 {} 的整数倍",
                    size, self.frame_size
                );
            }
        }
        debug!(
            "打开 raw video: {}x{} {}, 每帧 {} 字节, {} 帧",
            params.width, params.height, params.pixel_format, self.frame_size, stream.nb_frames
        );

        self.streams = vec![stream];
        self.next_frame = 0;
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> SynthResult<Packet> {
        let stream = self
            .streams
            .first()
            .ok_or_else(|| SynthError::InvalidArgument("解封装器尚未打开".into()))?;
        let time_base = stream.time_base;

        let pos = io.position()?;
        let mut data = vec![0u8; self.frame_size];
        let n = io.read_full(&mut data)?;
        if n == 0 {
            return Err(SynthError::Eof);
        }
        if n < self.frame_size {
            return Err(SynthError::InvalidData(format!(
                "第 {} 帧不完整: {} / {} 字节",
                self.next_frame, n, self.frame_size
            )));
        }

        let mut pkt = Packet::video_frame(data, self.next_frame, time_base);
        pkt.pos = Some(pos);
        self.next_frame += 1;
        Ok(pkt)
    }

    fn duration(&self) -> Option<f64> {
        let stream = self.streams.first()?;
        if stream.nb_frames == 0 {
            return None;
        }
        Some(stream.nb_frames as f64 * stream.time_base.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvsynth_core::Rational;

    fn params_4x2() -> VideoStreamParams {
        VideoStreamParams::yuv420p(4, 2, Rational::new(25, 1))
    }

    #[test]
    fn test_按帧切分() {
        let data: Vec<u8> = (0..36).collect();
        let mut io = IoContext::from_memory(data.clone());
        let mut demuxer = RawVideoDemuxer::with_params(params_4x2());
        demuxer.open(&mut io).unwrap();

        let stream = &demuxer.streams()[0];
        assert_eq!(stream.nb_frames, 3);
        assert_eq!(stream.time_base, Rational::new(1, 25));
        assert!((demuxer.duration().unwrap() - 0.12).abs() < 1e-9);

        for z in 0..3 {
            let pkt = demuxer.read_packet(&mut io).unwrap();
            assert_eq!(pkt.pts, z);
            assert_eq!(pkt.pos, Some(z as u64 * 12));
            assert!(pkt.is_keyframe);
            assert_eq!(&pkt.data[..], &data[z as usize * 12..(z as usize + 1) * 12]);
        }
        assert!(matches!(demuxer.read_packet(&mut io), Err(SynthError::Eof)));
    }

    #[test]
    fn test_末帧不完整() {
        let mut io = IoContext::from_memory(vec![0u8; 12 + 5]);
        let mut demuxer = RawVideoDemuxer::with_params(params_4x2());
        demuxer.open(&mut io).unwrap();
        demuxer.read_packet(&mut io).unwrap();
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(SynthError::InvalidData(_))
        ));
    }

    #[test]
    fn test_缺少参数() {
        let mut io = IoContext::from_memory(vec![0u8; 12]);
        let mut demuxer = RawVideoDemuxer::create().unwrap();
        assert!(matches!(
            demuxer.open(&mut io),
            Err(SynthError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_奇数尺寸() {
        let mut io = IoContext::from_memory(vec![0u8; 12]);
        let params = VideoStreamParams::yuv420p(3, 2, Rational::new(25, 1));
        let mut demuxer = RawVideoDemuxer::with_params(params);
        assert!(matches!(
            demuxer.open(&mut io),
            Err(SynthError::InvalidDimension(_))
        ));
    }
}
