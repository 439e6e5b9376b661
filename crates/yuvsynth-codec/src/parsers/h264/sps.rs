//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 只解析到 VUI 的 timing_info 为止, 取出容器需要的字段:
//! profile / level、色度格式、位深、裁剪后的宽高、像素宽高比与帧率.
//! 量化矩阵只做跳过.

use yuvsynth_core::bitreader::BitReader;
use yuvsynth_core::{Rational, SynthError, SynthResult};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Sps {
    /// 66=Baseline, 77=Main, 100=High
    pub profile_idc: u8,
    pub level_idc: u8,
    pub sps_id: u32,
    /// 0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4
    pub chroma_format_idc: u32,
    pub bit_depth_luma: u32,
    /// 已应用裁剪
    pub width: u32,
    /// 已应用裁剪
    pub height: u32,
    pub frame_mbs_only: bool,
    /// VUI timing_info 给出的帧率
    pub fps: Option<Rational>,
    pub sar: Rational,
}

/// ITU-T H.264 表 E-1
const SAR_TABLE: [(i32, i32); 17] = [
    (0, 1),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// aspect_ratio_idc 的扩展取值, 后跟显式的 16 位宽高
const EXTENDED_SAR: u32 = 255;

fn invalid(msg: String) -> SynthError {
    SynthError::InvalidData(format!("H.264: {}", msg))
}

/// 从 RBSP 数据解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> SynthResult<Sps> {
    if rbsp.len() < 3 {
        return Err(invalid("SPS RBSP 太短".into()));
    }
    parse_sps_inner(&mut BitReader::new(rbsp)).map_err(|e| match e {
        SynthError::Eof => invalid("SPS 数据截断".into()),
        other => other,
    })
}

fn parse_sps_inner(br: &mut BitReader) -> SynthResult<Sps> {
    let profile_idc = br.read_bits(8)? as u8;
    br.skip_bits(8)?; // constraint_set 标志位
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue()?;
    if sps_id > 31 {
        return Err(invalid(format!("sps_id 超出范围: {}", sps_id)));
    }

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    let mut bit_depth_luma = 8;
    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue()?;
        if chroma_format_idc > 3 {
            return Err(invalid(format!("chroma_format_idc 非法: {}", chroma_format_idc)));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = br.read_flag()?;
        }
        bit_depth_luma = br.read_ue()? + 8;
        let _bit_depth_chroma = br.read_ue()? + 8;
        if !(8..=14).contains(&bit_depth_luma) {
            return Err(invalid(format!("bit_depth_luma 非法: {}", bit_depth_luma)));
        }
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag
        if br.read_flag()? {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for index in 0..list_count {
                if br.read_flag()? {
                    skip_scaling_list(br, if index < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let log2_max_frame_num_minus4 = br.read_ue()?;
    if log2_max_frame_num_minus4 > 12 {
        return Err(invalid(format!(
            "log2_max_frame_num_minus4 超出范围: {}",
            log2_max_frame_num_minus4
        )));
    }

    match br.read_ue()? {
        0 => {
            br.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            br.skip_bits(1)?; // delta_pic_order_always_zero_flag
            br.read_se()?; // offset_for_non_ref_pic
            br.read_se()?; // offset_for_top_to_bottom_field
            let cycle = br.read_ue()?;
            if cycle > 255 {
                return Err(invalid(format!(
                    "num_ref_frames_in_pic_order_cnt_cycle 超出范围: {}",
                    cycle
                )));
            }
            for _ in 0..cycle {
                br.read_se()?;
            }
        }
        2 => {}
        other => return Err(invalid(format!("pic_order_cnt_type 非法: {}", other))),
    }

    br.read_ue()?; // max_num_ref_frames
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = br.read_ue()? + 1;
    let pic_height_in_map_units = br.read_ue()? + 1;
    let frame_mbs_only = br.read_flag()?;
    if !frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if br.read_flag()? {
        crop_left = br.read_ue()?;
        crop_right = br.read_ue()?;
        crop_top = br.read_ue()?;
        crop_bottom = br.read_ue()?;
    }

    let chroma_array_type = if separate_colour_plane { 0 } else { chroma_format_idc };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let raw_width = u64::from(pic_width_in_mbs) * 16;
    let raw_height =
        u64::from(pic_height_in_map_units) * if frame_mbs_only { 16 } else { 32 };
    let crop_x = (u64::from(crop_left) + u64::from(crop_right)) * crop_unit_x;
    let crop_y = (u64::from(crop_top) + u64::from(crop_bottom)) * crop_unit_y;
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(invalid(format!(
            "裁剪参数非法: raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }
    let width = u32::try_from(raw_width - crop_x)
        .map_err(|_| invalid(format!("宽度越界: {}", raw_width - crop_x)))?;
    let height = u32::try_from(raw_height - crop_y)
        .map_err(|_| invalid(format!("高度越界: {}", raw_height - crop_y)))?;

    let mut fps = None;
    let mut sar = Rational::new(1, 1);
    // VUI 之后的字段不影响尺寸, 截断的 VUI 按缺省处理
    if br.read_flag().unwrap_or(false) {
        if let Ok((parsed_sar, parsed_fps)) = parse_vui(br) {
            sar = parsed_sar;
            fps = parsed_fps;
        }
    }

    Ok(Sps {
        profile_idc,
        level_idc,
        sps_id,
        chroma_format_idc,
        bit_depth_luma,
        width,
        height,
        frame_mbs_only,
        fps,
        sar,
    })
}

/// 解析 VUI 中的 SAR 与 timing_info
fn parse_vui(br: &mut BitReader) -> SynthResult<(Rational, Option<Rational>)> {
    let mut sar = Rational::new(1, 1);
    if br.read_flag()? {
        let idc = br.read_bits(8)?;
        if idc == EXTENDED_SAR {
            let w = br.read_bits(16)? as i32;
            let h = br.read_bits(16)? as i32;
            if w > 0 && h > 0 {
                sar = Rational::new(w, h).reduce();
            }
        } else if let Some(&(w, h)) = SAR_TABLE.get(idc as usize) {
            if w > 0 {
                sar = Rational::new(w, h);
            }
        }
    }

    if br.read_flag()? {
        br.skip_bits(1)?; // overscan_appropriate_flag
    }
    if br.read_flag()? {
        // video_format(3) + video_full_range_flag(1)
        br.skip_bits(4)?;
        if br.read_flag()? {
            // colour_primaries + transfer_characteristics + matrix_coefficients
            br.skip_bits(24)?;
        }
    }
    if br.read_flag()? {
        br.read_ue()?; // chroma_sample_loc_type_top_field
        br.read_ue()?; // chroma_sample_loc_type_bottom_field
    }

    let mut fps = None;
    if br.read_flag()? {
        let num_units_in_tick = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        br.skip_bits(1)?; // fixed_frame_rate_flag
        // 一帧两个场
        let den = u64::from(num_units_in_tick) * 2;
        if num_units_in_tick > 0 && time_scale > 0 {
            if let (Ok(num), Ok(den)) = (i32::try_from(time_scale), i32::try_from(den)) {
                fps = Some(Rational::new(num, den).reduce());
            }
        }
    }
    Ok((sar, fps))
}

/// 跳过一组量化矩阵
fn skip_scaling_list(br: &mut BitReader, size: usize) -> SynthResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = br.read_se()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 是否为 High Profile 或更高
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// 裁剪单位 (亮度采样)
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u64, u64) {
    let sub_width = match chroma_array_type {
        1 | 2 => 2,
        _ => 1,
    };
    let sub_height = if chroma_array_type == 1 { 2 } else { 1 };
    let height_mult = if frame_mbs_only { 1 } else { 2 };
    (sub_width, sub_height * height_mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 按位拼接测试用 SPS
    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        bits: usize,
    }

    impl BitWriter {
        fn bit(&mut self, bit: bool) -> &mut Self {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if bit {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
            self
        }

        fn bits(&mut self, value: u32, n: u32) -> &mut Self {
            for i in (0..n).rev() {
                self.bit((value >> i) & 1 == 1);
            }
            self
        }

        fn ue(&mut self, value: u32) -> &mut Self {
            let code = value + 1;
            let len = 32 - code.leading_zeros();
            self.bits(0, len - 1).bits(code, len)
        }

        /// 追加 rbsp_stop_one_bit 并补齐字节
        fn finish(&mut self) -> Vec<u8> {
            self.bit(true);
            self.bytes.clone()
        }
    }

    /// Baseline SPS: 宽高以宏块对齐后再按需裁剪, 可选 VUI 帧率
    fn baseline_sps(width: u32, height: u32, fps: Option<(u32, u32)>) -> Vec<u8> {
        let mbs_w = width.div_ceil(16);
        let mbs_h = height.div_ceil(16);
        let crop_right = (mbs_w * 16 - width) / 2;
        let crop_bottom = (mbs_h * 16 - height) / 2;

        let mut w = BitWriter::default();
        w.bits(66, 8).bits(0xC0, 8).bits(30, 8);
        w.ue(0); // sps_id
        w.ue(0); // log2_max_frame_num_minus4
        w.ue(0).ue(0); // poc_type 0, log2_max_poc_lsb_minus4
        w.ue(1).bit(false); // max_num_ref_frames, gaps
        w.ue(mbs_w - 1).ue(mbs_h - 1);
        w.bit(true).bit(true); // frame_mbs_only, direct_8x8
        let cropping = crop_right > 0 || crop_bottom > 0;
        w.bit(cropping);
        if cropping {
            w.ue(0).ue(crop_right).ue(0).ue(crop_bottom);
        }
        match fps {
            Some((time_scale, num_units)) => {
                w.bit(true); // vui_parameters_present_flag
                w.bit(false).bit(false).bit(false).bit(false);
                w.bit(true).bits(num_units, 32).bits(time_scale, 32).bit(true);
            }
            None => {
                w.bit(false);
            }
        }
        w.finish()
    }

    #[test]
    fn test_解析_baseline_sps() {
        let sps = parse_sps(&baseline_sps(352, 288, None)).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!((sps.width, sps.height), (352, 288));
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.bit_depth_luma, 8);
        assert!(sps.frame_mbs_only);
        assert_eq!(sps.fps, None);
        assert_eq!(sps.sar, Rational::new(1, 1));
    }

    #[test]
    fn test_裁剪后的尺寸() {
        let sps = parse_sps(&baseline_sps(100, 50, None)).unwrap();
        assert_eq!((sps.width, sps.height), (100, 50));
    }

    #[test]
    fn test_vui_帧率() {
        // time_scale=50, num_units_in_tick=1 -> 25 fps
        let sps = parse_sps(&baseline_sps(64, 48, Some((50, 1)))).unwrap();
        assert_eq!(sps.fps, Some(Rational::new(25, 1)));

        let sps = parse_sps(&baseline_sps(64, 48, Some((60000, 1001)))).unwrap();
        assert_eq!(sps.fps, Some(Rational::new(30000, 1001)));
    }

    #[test]
    fn test_截断的_sps() {
        let data = baseline_sps(352, 288, None);
        assert!(matches!(
            parse_sps(&data[..4]),
            Err(SynthError::InvalidData(_))
        ));
        assert!(parse_sps(&[66, 0]).is_err());
    }
}
