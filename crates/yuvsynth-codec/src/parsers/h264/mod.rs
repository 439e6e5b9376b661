//! H.264/AVC Annex B 码流解析.
//!
//! - NAL 单元分割与类型识别
//! - 按访问单元 (一帧) 切分裸流
//! - SPS 解析, 取出宽高、帧率与像素宽高比

pub mod nal;
pub mod sps;

pub use nal::{
    NalUnit, NalUnitType, START_CODE, contains_idr, find_start_codes, next_access_unit,
    split_annex_b,
};
pub use sps::{Sps, parse_sps};
