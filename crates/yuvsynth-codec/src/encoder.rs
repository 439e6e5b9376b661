//! 编码器 trait 定义.
//!
//! 所有编码器实现必须实现 `Encoder` trait.

use yuvsynth_core::SynthResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. 调用 `send_frame()` 送入原始帧数据
/// 2. 调用 `receive_packet()` 取出数据包
/// 3. 重复以上步骤直到所有数据处理完毕
/// 4. 送入 None 表示编码结束, 取出编码器缓存的延迟数据包
pub trait Encoder: Send {
    /// 获取编码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 使用参数配置编码器, 必须在编码前调用
    fn open(&mut self, params: &CodecParameters) -> SynthResult<()>;

    /// 送入一帧原始数据进行编码
    ///
    /// # 参数
    /// - `frame`: 原始帧数据. `None` 表示刷新 (flush), 取出缓存的数据包.
    ///
    /// flush 之后再送入帧是错误, 需要先调用 `flush()` 重置.
    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> SynthResult<()>;

    /// 从编码器取出一个数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功取出一个数据包
    /// - `Err(SynthError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(SynthError::Eof)`: 所有数据包已取出
    fn receive_packet(&mut self) -> SynthResult<Packet>;

    /// 刷新编码器, 清空内部状态
    fn flush(&mut self);
}
