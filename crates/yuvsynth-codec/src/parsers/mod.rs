//! 码流解析器.
//!
//! 只做语法层面的拆分与参数集解析, 不解码图像.

pub mod h264;
