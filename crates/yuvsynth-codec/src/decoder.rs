//! 解码器 trait 定义.
//!
//! 所有解码器实现必须实现 `Decoder` trait.

use yuvsynth_core::SynthResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `send_packet()` 送入数据包
/// 2. 调用 `receive_frame()` 取出解码后的帧
/// 3. 重复以上步骤直到所有数据处理完毕
/// 4. 送入空包 (flush) 以获取解码器中缓存的帧
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用参数配置解码器
    ///
    /// rawvideo 没有码流头部, 必须在解码前通过此方法提供宽高与像素格式.
    fn open(&mut self, params: &CodecParameters) -> SynthResult<()>;

    /// 送入一个数据包进行解码, 空包 (`Packet::flush()`) 表示输入结束
    fn send_packet(&mut self, packet: &Packet) -> SynthResult<()>;

    /// 从解码器取出一帧解码数据
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(SynthError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(SynthError::Eof)`: 所有帧已取出
    fn receive_frame(&mut self) -> SynthResult<VideoFrame>;

    /// 刷新解码器, 清空内部状态
    fn flush(&mut self);
}
