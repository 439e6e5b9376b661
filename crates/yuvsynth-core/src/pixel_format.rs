//! 像素格式与平面几何.
//!
//! 只有两种格式: 测试图案输出的 yuv420p, 以及单独导出亮度平面时的 gray8.

use std::fmt;

use crate::error::{SynthError, SynthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// 8 位 Y/U/V 三平面, 色度宽高各为亮度的一半
    Yuv420p,
    /// 8 位单平面灰度
    Gray8,
}

impl PixelFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Gray8 => "gray8",
        }
    }

    /// 色度平面相对亮度的缩小倍数 (水平, 垂直), 以 2 的幂表示
    pub const fn chroma_shift(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p => (1, 1),
            Self::None | Self::Gray8 => (0, 0),
        }
    }

    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p => 3,
            Self::Gray8 => 1,
        }
    }

    /// 宽高必须为正, 并能被色度缩小倍数整除
    pub fn check_dimensions(&self, width: u32, height: u32) -> SynthResult<()> {
        if width == 0 || height == 0 {
            return Err(SynthError::InvalidDimension(format!(
                "宽高必须为正数, 实际 {}x{}",
                width, height
            )));
        }
        let (shift_x, shift_y) = self.chroma_shift();
        if width % (1 << shift_x) != 0 || height % (1 << shift_y) != 0 {
            return Err(SynthError::InvalidDimension(format!(
                "{} 要求宽高为偶数, 实际 {}x{}",
                self, width, height
            )));
        }
        Ok(())
    }

    /// 紧凑存储时第 `plane` 个平面的 (每行字节数, 行数)
    ///
    /// 平面 0 为亮度, 其余为色度. 平面不存在时返回 `None`.
    pub fn plane_dims(&self, plane: usize, width: u32, height: u32) -> Option<(usize, usize)> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let (w, h) = (width as usize, height as usize);
        if plane == 0 {
            return Some((w, h));
        }
        let (shift_x, shift_y) = self.chroma_shift();
        Some((w >> shift_x, h >> shift_y))
    }

    /// 紧凑存储的整帧字节数
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let count = self.plane_count() as usize;
        if count == 0 {
            return None;
        }
        (0..count)
            .map(|plane| {
                self.plane_dims(plane, width, height)
                    .map(|(row_bytes, rows)| row_bytes * rows)
            })
            .sum()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
