//! 数据包 (Packet).
//!
//! 编码器输出、封装器写入、解封装器读出的最小单位. rawvideo 下一个数据包就是一整帧.

use bytes::Bytes;
use yuvsynth_core::{Rational, Timestamp, timestamp::NOPTS_VALUE};

/// 数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 负载
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 时长 (以 time_base 为单位)
    pub duration: i64,
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    pub is_keyframe: bool,
    /// 在容器中的字节偏移, 未知为 `None`
    pub pos: Option<u64>,
}

impl Packet {
    /// flush 信号: 没有负载的数据包
    pub fn flush() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            is_keyframe: false,
            pos: None,
        }
    }

    /// 只有负载、其余字段未设置的数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::flush()
        }
    }

    /// 一整帧未压缩视频: 关键帧, DTS = PTS, 时长 1 帧
    pub fn video_frame(data: impl Into<Bytes>, index: i64, time_base: Rational) -> Self {
        Self {
            data: data.into(),
            pts: index,
            dts: index,
            duration: 1,
            time_base,
            is_keyframe: true,
            ..Self::flush()
        }
    }

    /// 负载字节数
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为 flush 信号
    pub fn is_flush(&self) -> bool {
        self.data.is_empty()
    }

    /// 显示时间戳
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::new(self.pts, self.time_base)
    }
}
