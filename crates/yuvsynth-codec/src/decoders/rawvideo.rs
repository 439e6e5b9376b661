//! rawvideo 解码器.
//!
//! 按 [`FrameLayout`] 把数据包拆回各平面. 每个数据包必须恰好是一整帧.

use std::collections::VecDeque;

use log::{debug, trace};
use yuvsynth_core::{SynthError, SynthResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PictureType, VideoFrame};
use crate::layout::FrameLayout;
use crate::packet::Packet;

/// rawvideo 解码器
#[derive(Default)]
pub struct RawVideoDecoder {
    layout: Option<FrameLayout>,
    /// 待取出的帧
    queue: VecDeque<VideoFrame>,
    /// 已收到空包
    draining: bool,
}

impl RawVideoDecoder {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::default()))
    }

    fn decode(&self, packet: &Packet) -> SynthResult<VideoFrame> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| SynthError::Codec("解码器未打开, 请先调用 open()".into()))?;

        let mut frame = layout.unpack(&packet.data)?;
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = true;
        frame.picture_type = PictureType::I;
        Ok(frame)
    }
}

impl Decoder for RawVideoDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &CodecParameters) -> SynthResult<()> {
        let layout = FrameLayout::from_params(params)?;
        debug!(
            "打开 rawvideo 解码器: {}x{} {}, 每帧 {} 字节",
            layout.width,
            layout.height,
            layout.pixel_format,
            layout.frame_size()
        );
        self.layout = Some(layout);
        self.flush();
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> SynthResult<()> {
        if self.layout.is_none() {
            return Err(SynthError::Codec("解码器未打开, 请先调用 open()".into()));
        }
        if packet.is_flush() {
            self.draining = true;
            return Ok(());
        }
        if self.draining {
            return Err(SynthError::Codec("解码器已 flush, 不能再送入数据包".into()));
        }

        let frame = self.decode(packet)?;
        trace!("rawvideo 解码: pts={}", frame.pts);
        self.queue.push_back(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> SynthResult<VideoFrame> {
        match self.queue.pop_front() {
            Some(frame) => Ok(frame),
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

    fn open_decoder(w: u32, h: u32, pf: PixelFormat) -> Box<dyn Decoder> {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&CodecParameters::video(
            CodecId::RawVideo,
            w,
            h,
            pf,
            Rational::new(25, 1),
        ))
        .unwrap();
        dec
    }

    #[test]
    fn test_拆分_yuv420p() {
        let mut dec = open_decoder(4, 4, PixelFormat::Yuv420p);
        let data: Vec<u8> = (0..24).collect();
        dec.send_packet(&Packet::video_frame(data, 100, Rational::new(1, 25)))
            .unwrap();

        let frame = dec.receive_frame().unwrap();
        assert_eq!(frame.data[0], (0..16).collect::<Vec<u8>>());
        assert_eq!(frame.data[1], vec![16, 17, 18, 19]);
        assert_eq!(frame.data[2], vec![20, 21, 22, 23]);
        assert_eq!(frame.linesize, vec![4, 2, 2]);
        assert!(frame.is_keyframe);
        assert_eq!(frame.picture_type, PictureType::I);
        assert_eq!((frame.pts, frame.duration), (100, 1));
    }

    #[test]
    fn test_未打开() {
        let mut dec = RawVideoDecoder::create().unwrap();
        assert!(matches!(
            dec.send_packet(&Packet::from_data(vec![0u8; 6])),
            Err(SynthError::Codec(_))
        ));
    }

    #[test]
    fn test_数据包大小不符() {
        let mut dec = open_decoder(2, 2, PixelFormat::Yuv420p);
        assert!(matches!(
            dec.send_packet(&Packet::from_data(vec![0u8; 5])),
            Err(SynthError::InvalidData(_))
        ));
    }

    #[test]
    fn test_空包进入_flush() {
        let mut dec = open_decoder(2, 2, PixelFormat::Yuv420p);
        assert!(matches!(dec.receive_frame(), Err(SynthError::NeedMoreData)));

        dec.send_packet(&Packet::from_data(vec![0u8; 6])).unwrap();
        dec.send_packet(&Packet::flush()).unwrap();
        // flush 前送入的帧仍然可以取出
        assert!(dec.receive_frame().is_ok());
        assert!(matches!(dec.receive_frame(), Err(SynthError::Eof)));
        assert!(dec.send_packet(&Packet::from_data(vec![0u8; 6])).is_err());
    }

    #[test]
    fn test_gray8_连续解码() {
        let mut dec = open_decoder(2, 2, PixelFormat::Gray8);
        for i in 0..5u8 {
            let data = vec![i; 4];
            dec.send_packet(&Packet::video_frame(data.clone(), i64::from(i), Rational::new(1, 25)))
                .unwrap();
            let frame = dec.receive_frame().unwrap();
            assert_eq!(frame.data[0], data);
            assert_eq!(frame.pts, i64::from(i));
        }
    }
}
