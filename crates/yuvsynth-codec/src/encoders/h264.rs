//! H.264 编码器, 基于 openh264.
//!
//! openh264 的源码随 crate 一起编译 (`source` 特性), 不依赖系统动态库.
//! 输出 Annex B 格式: 每送入一帧得到一个完整的访问单元, IDR 帧前带 SPS/PPS.
//! 关闭跳帧, 保证输出包数与输入帧数一致; 没有 B 帧, 也就没有编码延迟.

use std::collections::VecDeque;

use log::{debug, trace};
use openh264::OpenH264API;
use openh264::encoder::{BitRate, Encoder as OpenH264Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use yuvsynth_core::{PixelFormat, SynthError, SynthResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::encoder::Encoder;
use crate::frame::VideoFrame;
use crate::layout::FrameLayout;
use crate::packet::Packet;
use crate::parsers::h264::contains_idr;

/// 未指定码率时的目标码率 (bits/s)
pub const DEFAULT_BIT_RATE: u32 = 400_000;

/// H.264 编码器
#[derive(Default)]
pub struct H264Encoder {
    inner: Option<OpenH264Encoder>,
    layout: Option<FrameLayout>,
    /// 待取出的数据包
    queue: VecDeque<Packet>,
    /// 已收到 flush 信号
    draining: bool,
    frames_encoded: u64,
}

// SAFETY: openh264 编码器实例只通过 &mut self 访问, 不会被多个线程同时使用;
// 内部状态不依赖创建它的线程.
unsafe impl Send for H264Encoder {}

impl H264Encoder {
    /// 工厂函数
    pub fn create() -> SynthResult<Box<dyn Encoder>> {
        Ok(Box::new(Self::default()))
    }

    fn encode(&mut self, frame: &VideoFrame) -> SynthResult<Packet> {
        let (Some(inner), Some(layout)) = (self.inner.as_mut(), self.layout.as_ref()) else {
            return Err(SynthError::Codec("编码器未打开, 请先调用 open()".into()));
        };

        let mut yuv = Vec::with_capacity(layout.frame_size());
        layout.pack_into(frame, &mut yuv)?;
        let source = YUVBuffer::from_vec(yuv, layout.width as usize, layout.height as usize);

        let data = inner
            .encode(&source)
            .map_err(|e| SynthError::Codec(format!("H.264 编码失败: {e}")))?
            .to_vec();
        if data.is_empty() {
            return Err(SynthError::Codec(format!(
                "H.264 编码器丢弃了第 {} 帧",
                self.frames_encoded
            )));
        }

        let mut pkt = Packet::video_frame(data, frame.pts, frame.time_base);
        pkt.is_keyframe = contains_idr(&pkt.data);
        if frame.duration > 0 {
            pkt.duration = frame.duration;
        }
        self.frames_encoded += 1;
        Ok(pkt)
    }
}

impl Encoder for H264Encoder {
    fn codec_id(&self) -> CodecId {
        CodecId::H264
    }

    fn name(&self) -> &str {
        "libopenh264"
    }

    fn open(&mut self, params: &CodecParameters) -> SynthResult<()> {
        if params.video.pixel_format != PixelFormat::Yuv420p {
            return Err(SynthError::Unsupported(format!(
                "H.264 编码器只接受 yuv420p, 实际 {}",
                params.video.pixel_format
            )));
        }
        let layout = FrameLayout::from_params(params)?;
        let frame_rate = params.video.frame_rate;
        if !frame_rate.is_positive() {
            return Err(SynthError::InvalidArgument(format!("无效帧率: {}", frame_rate)));
        }
        let bit_rate = match u32::try_from(params.bit_rate) {
            Ok(0) | Err(_) => DEFAULT_BIT_RATE,
            Ok(rate) => rate,
        };

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bit_rate))
            .max_frame_rate(FrameRate::from_hz(frame_rate.to_f64() as f32))
            .skip_frames(false);
        let inner = OpenH264Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| SynthError::Codec(format!("创建 H.264 编码器失败: {e}")))?;

        debug!(
            "打开 H.264 编码器: {}x{} @ {} fps, {} bps",
            layout.width, layout.height, frame_rate, bit_rate
        );
        self.inner = Some(inner);
        self.layout = Some(layout);
        self.frames_encoded = 0;
        self.flush();
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> SynthResult<()> {
        if self.inner.is_none() {
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
        trace!(
            "H.264 编码: pts={} size={} key={}",
            pkt.pts,
            pkt.size(),
            pkt.is_keyframe
        );
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
