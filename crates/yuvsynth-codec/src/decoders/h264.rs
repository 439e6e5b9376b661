//! H.264 解码器, 基于 openh264.
//!
//! 每个数据包应是一个完整的 Annex B 访问单元. 只含参数集的包不产生帧.
//! openh264 不输出 B 帧, 解码没有延迟, 收到 flush 包后不会再吐出缓存帧.

use std::collections::VecDeque;

use log::{debug, trace, warn};
use openh264::decoder::Decoder as OpenH264Decoder;
use openh264::formats::YUVSource;
use yuvsynth_core::{PixelFormat, SynthError, SynthResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PictureType, VideoFrame};
use crate::packet::Packet;
use crate::parsers::h264::contains_idr;

/// H.264 解码器
#[derive(Default)]
pub struct H264Decoder {
    inner: Option<OpenH264Decoder>,
    /// 容器声明的宽高, 仅用于核对
    expected: Option<(u32, u32)>,
    /// 待取出的帧
    queue: VecDeque<VideoFrame>,
    /// 已收到空包
    draining: bool,
}

// SAFETY: openh264 解码器实例只通过 &mut self 访问, 不会被多个线程同时使用;
// 内部状态不依赖创建它的线程.
unsafe impl Send for H264Decoder {}

impl H264Decoder {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::default()))
    }
}

/// 把解码输出按紧凑 linesize 复制为 yuv420p 帧
fn copy_planes(yuv: &impl YUVSource) -> SynthResult<VideoFrame> {
    let (width, height) = yuv.dimensions();
    let (y_stride, u_stride, v_stride) = yuv.strides();
    let (chroma_width, chroma_height) = (width.div_ceil(2), height.div_ceil(2));

    let to_u32 = |v: usize| {
        u32::try_from(v).map_err(|_| SynthError::InvalidData(format!("H.264 帧尺寸越界: {}", v)))
    };
    let mut frame = VideoFrame::new(to_u32(width)?, to_u32(height)?, PixelFormat::Yuv420p);
    let planes = [
        (yuv.y(), y_stride, width, height),
        (yuv.u(), u_stride, chroma_width, chroma_height),
        (yuv.v(), v_stride, chroma_width, chroma_height),
    ];
    for (index, (src, stride, row_bytes, rows)) in planes.into_iter().enumerate() {
        if rows > 0 && src.len() < stride * (rows - 1) + row_bytes {
            return Err(SynthError::InvalidData(format!(
                "H.264 解码输出平面 {} 数据不足",
                index
            )));
        }
        let mut plane = Vec::with_capacity(row_bytes * rows);
        for row in src.chunks(stride).take(rows) {
            plane.extend_from_slice(&row[..row_bytes]);
        }
        frame.data[index] = plane;
        frame.linesize[index] = row_bytes;
    }
    Ok(frame)
}

impl Decoder for H264Decoder {
    fn codec_id(&self) -> CodecId {
        CodecId::H264
    }

    fn name(&self) -> &str {
        "libopenh264"
    }

    fn open(&mut self, params: &CodecParameters) -> SynthResult<()> {
        let inner = OpenH264Decoder::new()
            .map_err(|e| SynthError::Codec(format!("创建 H.264 解码器失败: {e}")))?;
        let video = &params.video;
        self.expected = (video.width > 0 && video.height > 0).then_some((video.width, video.height));
        debug!("打开 H.264 解码器: 声明尺寸 {:?}", self.expected);
        self.inner = Some(inner);
        self.flush();
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> SynthResult<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(SynthError::Codec("解码器未打开, 请先调用 open()".into()));
        };
        if packet.is_flush() {
            self.draining = true;
            return Ok(());
        }
        if self.draining {
            return Err(SynthError::Codec("解码器已 flush, 不能再送入数据包".into()));
        }

        let decoded = inner
            .decode(&packet.data)
            .map_err(|e| SynthError::InvalidData(format!("H.264 解码失败: {e}")))?;
        let Some(yuv) = decoded else {
            trace!("H.264 数据包未产生帧: pts={} size={}", packet.pts, packet.size());
            return Ok(());
        };

        let mut frame = copy_planes(&yuv)?;
        if let Some((w, h)) = self.expected {
            if (frame.width, frame.height) != (w, h) {
                warn!(
                    "H.264 帧尺寸 {}x{} 与声明的 {}x{} 不一致",
                    frame.width, frame.height, w, h
                );
            }
        }
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = contains_idr(&packet.data);
        frame.picture_type = if frame.is_keyframe {
            PictureType::I
        } else {
            PictureType::P
        };
        trace!("H.264 解码: pts={} key={}", frame.pts, frame.is_keyframe);
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
    use crate::encoders::h264::H264Encoder;
    use yuvsynth_core::Rational;

    fn params(w: u32, h: u32) -> CodecParameters {
        CodecParameters::video(CodecId::H264, w, h, PixelFormat::Yuv420p, Rational::new(25, 1))
    }

    fn flat_frame(w: u32, h: u32, luma: u8, pts: i64) -> VideoFrame {
        let mut frame = VideoFrame::alloc(w, h, PixelFormat::Yuv420p).unwrap();
        frame.data[0].fill(luma);
        frame.data[1].fill(128);
        frame.data[2].fill(128);
        frame.pts = pts;
        frame.time_base = Rational::new(1, 25);
        frame
    }

    #[test]
    fn test_编解码往返() {
        let (w, h) = (64, 48);
        let mut enc = H264Encoder::create().unwrap();
        enc.open(&params(w, h)).unwrap();
        let mut dec = H264Decoder::create().unwrap();
        dec.open(&params(w, h)).unwrap();

        for pts in 0..3 {
            enc.send_frame(Some(&flat_frame(w, h, 100, pts))).unwrap();
            dec.send_packet(&enc.receive_packet().unwrap()).unwrap();
        }
        dec.send_packet(&Packet::flush()).unwrap();

        let frames: Vec<VideoFrame> = std::iter::from_fn(|| dec.receive_frame().ok()).collect();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_keyframe);
        for (pts, frame) in frames.iter().enumerate() {
            assert_eq!(frame.pts, pts as i64);
            assert_eq!((frame.width, frame.height), (w, h));
            assert_eq!(frame.linesize, vec![64, 32, 32]);
            assert_eq!(frame.data[0].len(), 64 * 48);
            // 平坦画面几乎无损
            let max_err = frame.data[0].iter().map(|&v| v.abs_diff(100)).max().unwrap();
            assert!(max_err <= 2, "亮度误差 {}", max_err);
        }
        assert!(matches!(dec.receive_frame(), Err(SynthError::Eof)));
    }

    #[test]
    fn test_未打开与损坏数据() {
        let mut dec = H264Decoder::create().unwrap();
        assert!(matches!(
            dec.send_packet(&Packet::from_data(vec![0, 0, 0, 1, 0x65])),
            Err(SynthError::Codec(_))
        ));

        dec.open(&params(16, 16)).unwrap();
        // 没有 SPS/PPS 的切片无法解码, 不应产生帧
        let _ = dec.send_packet(&Packet::from_data(vec![0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00]));
        assert!(matches!(
            dec.receive_frame(),
            Err(SynthError::NeedMoreData)
        ));
    }
}
