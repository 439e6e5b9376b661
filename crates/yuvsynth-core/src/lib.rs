//! # yuvsynth-core
//!
//! yuvsynth 核心库, 提供错误类型、像素格式几何计算、有理数、时间戳与比特流读取.
//!
//! 其余 crate (codec / pattern / format) 都建立在这里的类型之上.

pub mod bitreader;
pub mod error;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{SynthError, SynthResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
pub use timestamp::Timestamp;
