//! 错误类型.
//!
//! 各 crate 共用 [`SynthError`]; `NeedMoreData` 与 `Eof` 是编解码收发协议的
//! 正常信号, 不代表失败.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    /// 宽高为 0 或为奇数, 帧数为 0
    #[error("无效尺寸: {0}")]
    InvalidDimension(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("不支持: {0}")]
    Unsupported(String),

    /// 编解码器状态错误, 如未 open 就送数据
    #[error("编解码器错误: {0}")]
    Codec(String),

    #[error("格式错误: {0}")]
    Format(String),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 编解码器暂时没有输出, 需要继续送入
    #[error("需要更多输入")]
    NeedMoreData,

    /// 输出已全部取完, 或输入读到末尾
    #[error("流已结束")]
    Eof,

    /// 只有标识符、没有实现的编解码器 (hevc, 未启用 `h264` 特性时的 h264) 也返回此错误
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    #[error("未找到容器格式: {0}")]
    FormatNotFound(String),

    /// 截断的帧, 损坏的头部
    #[error("无效数据: {0}")]
    InvalidData(String),
}

pub type SynthResult<T> = Result<T, SynthError>;
