//! H.264 NAL (Network Abstraction Layer) 单元解析.
//!
//! # Annex B 格式
//!
//! 起始码分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # NAL 头部 (1 字节)
//! ```text
//! | forbidden(1) | ref_idc(2) | type(5) |
//! ```

use std::fmt;

use yuvsynth_core::{SynthError, SynthResult};

/// 写出时使用的 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A/B/C
    SliceDp(u8),
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    EndOfSequence,
    EndOfStream,
    FillerData,
    Unknown(u8),
}

impl NalUnitType {
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2..=4 => Self::SliceDp(type_id),
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            _ => Self::Unknown(type_id),
        }
    }

    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDp(id) => *id,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(self, Self::Slice | Self::SliceDp(_) | Self::SliceIdr)
    }

    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDp(id) => write!(f, "SliceDP({id})"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 解析后的 NAL 单元
#[derive(Debug, Clone)]
pub struct NalUnit {
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
    /// 不含起始码, 含 NAL 头部字节
    pub data: Vec<u8>,
}

impl NalUnit {
    /// 从 NAL 数据 (含头部字节) 解析
    pub fn parse(data: &[u8]) -> SynthResult<Self> {
        let Some(&header) = data.first() else {
            return Err(SynthError::InvalidData("H.264: NAL 单元数据为空".into()));
        };
        if header & 0x80 != 0 {
            return Err(SynthError::InvalidData(
                "H.264: forbidden_zero_bit 非法".into(),
            ));
        }

        Ok(Self {
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            data: data.to_vec(),
        })
    }

    /// 去掉头部字节和防竞争字节后的 RBSP, 参数集解析用
    pub fn rbsp(&self) -> Vec<u8> {
        remove_emulation_prevention(&self.data[1..])
    }
}

/// 查找所有起始码的位置 (4 字节起始码指向其首个 0x00)
pub fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push(i);
                i += 3;
                continue;
            }
            if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }
    positions
}

/// 起始码之后 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&START_CODE) {
        pos + 4
    } else if data[pos..].starts_with(&START_CODE[1..]) {
        pos + 3
    } else {
        pos
    }
}

/// 从 Annex B 字节流中分割出所有 NAL 单元 (不含起始码)
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit> {
    let offsets = find_start_codes(data);
    let mut nalus = Vec::with_capacity(offsets.len());

    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        let nal_start = skip_start_code(data, start);

        // 去除 trailing zeros
        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        if nal_end > nal_start {
            if let Ok(nalu) = NalUnit::parse(&data[nal_start..nal_end]) {
                nalus.push(nalu);
            }
        }
    }
    nalus
}

/// 数据中是否含 IDR 切片
pub fn contains_idr(data: &[u8]) -> bool {
    split_annex_b(data)
        .iter()
        .any(|nalu| nalu.nal_type.is_idr())
}

/// 在以访问单元开头的缓冲区中查找下一个访问单元的起始偏移
///
/// 当前访问单元出现过 VCL NAL 之后, 遇到 AUD / SPS / PPS / SEI
/// 或新一帧的第一个切片即视为下一个访问单元开始. 缓冲区内找不到边界时返回 `None`.
pub fn next_access_unit(data: &[u8]) -> Option<usize> {
    let offsets = find_start_codes(data);
    let mut seen_vcl = false;

    for &start in &offsets {
        let nal_start = skip_start_code(data, start);
        let Some(&header) = data.get(nal_start) else {
            continue;
        };
        let nal_type = NalUnitType::from_type_id(header & 0x1F);
        let starts_new = match nal_type {
            NalUnitType::Aud | NalUnitType::Sps | NalUnitType::Pps | NalUnitType::Sei => true,
            // first_mb_in_slice 为 ue(v), 值 0 编码为单个 1 位
            t if t.is_vcl() => data.get(nal_start + 1).is_some_and(|b| b & 0x80 != 0),
            _ => false,
        };
        if seen_vcl && starts_new {
            return Some(start);
        }
        if nal_type.is_vcl() {
            seen_vcl = true;
        }
    }
    None
}

/// 移除防竞争字节 (`00 00 03` -> `00 00`)
fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            rbsp.extend_from_slice(&[0x00, 0x00]);
            i += 3;
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }
    rbsp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_类型() {
        assert_eq!(NalUnitType::from_type_id(7), NalUnitType::Sps);
        assert_eq!(NalUnitType::from_type_id(5), NalUnitType::SliceIdr);
        assert!(NalUnitType::SliceIdr.is_vcl() && NalUnitType::SliceIdr.is_idr());
        assert!(NalUnitType::Slice.is_vcl() && !NalUnitType::Slice.is_idr());
        assert!(!NalUnitType::Pps.is_vcl());
        for id in 0..32 {
            assert_eq!(NalUnitType::from_type_id(id).type_id(), id);
        }
    }

    #[test]
    fn test_nal_头部解析() {
        // forbidden=0, ref_idc=3, type=7 (SPS)
        let nalu = NalUnit::parse(&[0x67, 0x42, 0x00, 0x1E]).unwrap();
        assert_eq!(nalu.nal_type, NalUnitType::Sps);
        assert_eq!(nalu.ref_idc, 3);

        assert!(NalUnit::parse(&[]).is_err());
        assert!(matches!(
            NalUnit::parse(&[0xE7]),
            Err(SynthError::InvalidData(_))
        ));
    }

    #[test]
    fn test_annex_b_混合起始码() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // SPS (4 字节)
            0x00, 0x00, 0x01, 0x68, 0xBB, // PPS (3 字节)
            0x00, 0x00, 0x01, 0x65, 0xDD, 0xEE, 0x00, // IDR, 尾随 0
        ];
        let nalus = split_annex_b(&data);
        let types: Vec<_> = nalus.iter().map(|n| n.nal_type).collect();
        assert_eq!(
            types,
            vec![NalUnitType::Sps, NalUnitType::Pps, NalUnitType::SliceIdr]
        );
        assert_eq!(nalus[2].data, vec![0x65, 0xDD, 0xEE]);
        assert!(contains_idr(&data));
        assert!(!contains_idr(&data[..11]));
    }

    #[test]
    fn test_防竞争字节() {
        let nalu = NalUnit::parse(&[0x67, 0x42, 0x00, 0x00, 0x03, 0x01, 0xAA]).unwrap();
        assert_eq!(nalu.rbsp(), vec![0x42, 0x00, 0x00, 0x01, 0xAA]);
        assert_eq!(
            remove_emulation_prevention(&[0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01]),
            vec![0x00, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_访问单元边界() {
        let mut data = Vec::new();
        // 第 0 帧: SPS PPS IDR(两个切片)
        data.extend_from_slice(&[0, 0, 0, 1, 0x67, 0x42]);
        data.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xCE]);
        data.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88, 0x01]);
        data.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x40, 0x02]);
        let second = data.len();
        // 第 1 帧: P 切片, first_mb_in_slice = 0
        data.extend_from_slice(&[0, 0, 0, 1, 0x41, 0x9A, 0x03]);

        assert_eq!(next_access_unit(&data), Some(second));
        assert_eq!(next_access_unit(&data[second..]), None);
        // 还没有出现 VCL 时参数集不会切分
        assert_eq!(next_access_unit(&data[..12]), None);
    }
}
