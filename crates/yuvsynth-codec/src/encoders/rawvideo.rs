//! rawvideo 编码器.
//!
//! 把一帧的各平面紧凑拼接为一个关键帧数据包, 不做任何压缩.
//! 没有编码延迟: 每送入一帧立即排队一个数据包.

use std::collections::VecDeque;

use log::{debug, trace};
use yuvsynth_core::{SynthError, SynthResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::encoder::Encoder;
use crate::frame::VideoFrame;
use crate::layout::FrameLayout;
use crate::packet::Packet;

/// rawvideo 编码器
#[derive(Default)]
pub struct RawVideoEncoder {
    /// `open()` 之后才有值
    layout: Option<FrameLayout>,
    /// 待取出的数据包
    queue: VecDeque<Packet>,
    /// 已收到 flush 信号
    draining: bool,
}

impl RawVideoEncoder {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Encoder>> {
        Ok(Box::new(Self::default()))
    }

    fn encode(&self, frame: &VideoFrame) -> SynthResult<Packet> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| SynthError::Codec("编码器未打开, 请先调用 open()".into()))?;

        let mut buf = Vec::with_capacity(layout.frame_size());
        layout.pack_into(frame, &mut buf)?;

        let mut pkt = Packet::video_frame(buf, frame.pts, frame.time_base);
        if frame.duration > 0 {
            pkt.duration = frame.duration;
        }
        Ok(pkt)
    }
}

impl Encoder for RawVideoEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &CodecParameters) -> SynthResult<()> {
        let layout = FrameLayout::from_params(params)?;
        debug!(
            "打开 rawvideo 编码器: {}x{} {}, 每帧 {} 字节",
            layout.width,
            layout.height,
            layout.pixel_format,
            layout.frame_size()
        );
        self.layout = Some(layout);
        self.flush();
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> SynthResult<()> {
        if self.layout.is_none() {
            return Err(SynthError::Codec("编码器未打开, 请先调用 open()".into()));
        }
        if self.draining {
            return Err(SynthError::Codec("编码器已 flush, 不能再送入帧".into()));
        }

        let Some(frame) = frame else {
            self.draining = true;
            return Ok(());
        };
        let pkt = self.encode(frame)?;
        trace!("rawvideo 编码: pts={} size={}", pkt.pts, pkt.size());
        self.queue.push_back(pkt);
        Ok(())
    }

    fn receive_packet(&mut self) -> SynthResult<Packet> {
        match self.queue.pop_front() {
            Some(pkt) => Ok(pkt),
            None if self.draining => Err(SynthError::Eof),
            None => Err(SynthError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.queue.clear();
        self.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvsynth_core::{PixelFormat, Rational};

    fn open_encoder(w: u32, h: u32) -> Box<dyn Encoder> {
        let mut enc = RawVideoEncoder::create().unwrap();
        enc.open(&CodecParameters::video(
            CodecId::RawVideo,
            w,
            h,
            PixelFormat::Yuv420p,
            Rational::new(25, 1),
        ))
        .unwrap();
        enc
    }

    fn filled_frame(w: u32, h: u32, fill: [u8; 3]) -> VideoFrame {
        let mut frame = VideoFrame::alloc(w, h, PixelFormat::Yuv420p).unwrap();
        for (plane, value) in frame.data.iter_mut().zip(fill) {
            plane.fill(value);
        }
        frame
    }

    #[test]
    fn test_平面按顺序拼接() {
        let mut enc = open_encoder(4, 4);
        let mut frame = filled_frame(4, 4, [10, 20, 30]);
        frame.pts = 42;
        frame.time_base = Rational::new(1, 25);

        enc.send_frame(Some(&frame)).unwrap();
        let pkt = enc.receive_packet().unwrap();
        assert_eq!(pkt.size(), 24);
        assert_eq!(&pkt.data[..16], &[10u8; 16]);
        assert_eq!(&pkt.data[16..20], &[20u8; 4]);
        assert_eq!(&pkt.data[20..], &[30u8; 4]);
        assert_eq!((pkt.pts, pkt.dts), (42, 42));
        assert!(pkt.is_keyframe);
        assert!(matches!(enc.receive_packet(), Err(SynthError::NeedMoreData)));
    }

    #[test]
    fn test_未打开() {
        let mut enc = RawVideoEncoder::create().unwrap();
        let frame = filled_frame(2, 2, [0, 0, 0]);
        assert!(matches!(
            enc.send_frame(Some(&frame)),
            Err(SynthError::Codec(_))
        ));
    }

    #[test]
    fn test_帧参数不一致() {
        let mut enc = open_encoder(4, 4);
        let frame = filled_frame(8, 4, [1, 2, 3]);
        assert!(matches!(
            enc.send_frame(Some(&frame)),
            Err(SynthError::InvalidArgument(_))
        ));

        let mut short = filled_frame(4, 4, [1, 2, 3]);
        short.data[2].pop();
        assert!(matches!(
            enc.send_frame(Some(&short)),
            Err(SynthError::InvalidData(_))
        ));
    }

    #[test]
    fn test_连续送帧按顺序输出() {
        let mut enc = open_encoder(2, 2);
        for pts in 0..3 {
            let mut frame = filled_frame(2, 2, [pts as u8, 0, 0]);
            frame.pts = pts;
            enc.send_frame(Some(&frame)).unwrap();
        }
        enc.send_frame(None).unwrap();

        let pts: Vec<i64> = std::iter::from_fn(|| enc.receive_packet().ok())
            .map(|pkt| pkt.pts)
            .collect();
        assert_eq!(pts, vec![0, 1, 2]);
        assert!(matches!(enc.receive_packet(), Err(SynthError::Eof)));
    }

    #[test]
    fn test_flush_后拒绝新帧() {
        let mut enc = open_encoder(2, 2);
        enc.send_frame(None).unwrap();
        let frame = filled_frame(2, 2, [1, 2, 3]);
        assert!(enc.send_frame(Some(&frame)).is_err());

        // 重置后可以继续编码
        enc.flush();
        enc.send_frame(Some(&frame)).unwrap();
        assert!(enc.receive_packet().is_ok());
    }

    #[test]
    fn test_编解码往返() {
        use crate::decoders::rawvideo::RawVideoDecoder;

        let params = CodecParameters::video(
            CodecId::RawVideo,
            4,
            4,
            PixelFormat::Yuv420p,
            Rational::new(25, 1),
        );
        let mut enc = RawVideoEncoder::create().unwrap();
        enc.open(&params).unwrap();
        let mut frame = filled_frame(4, 4, [10, 20, 30]);
        frame.pts = 7;
        enc.send_frame(Some(&frame)).unwrap();

        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&params).unwrap();
        dec.send_packet(&enc.receive_packet().unwrap()).unwrap();
        let decoded = dec.receive_frame().unwrap();
        assert_eq!(decoded.data, frame.data);
        assert_eq!(decoded.linesize, vec![4, 2, 2]);
        assert_eq!(decoded.pts, 7);
    }
}
