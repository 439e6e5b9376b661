//! 测试图案生成器.
//!
//! 亮度规则 (帧号 z, 行 y, 列 x, 均从 0 开始):
//! 1. 基础值 `(x + y + 3z) mod 256`
//! 2. 条纹带: `offset = 0.05 * floor(z / 5) * H`, `ymin = 0.10H + offset`, `ymax = 0.13H + offset`
//! 3. 若 `ymin < y < ymax` 且 `x mod 4 < 2` 且 `x <= 5(z + 1)`, 采样值为 16
//!
//! 所有帧互相独立, 并行生成与顺序生成的输出逐字节一致.

use std::io::Write;

use log::{debug, info};
use rayon::prelude::*;
use yuvsynth_codec::VideoFrame;
use yuvsynth_core::{PixelFormat, SynthError, SynthResult};

use crate::config::{ChromaFill, PatternConfig};

/// 条纹像素的亮度值
pub const STRIPE_LUMA: u8 = 16;
/// 中性色度值
pub const NEUTRAL_CHROMA: u8 = 128;

/// 色度平面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaPlane {
    U,
    V,
}

impl ChromaPlane {
    /// 在帧数据中的平面索引
    pub fn index(self) -> usize {
        match self {
            Self::U => 1,
            Self::V => 2,
        }
    }
}

/// 单帧内的条纹带
///
/// 行范围是开区间 (ymin, ymax), 以浮点数比较.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripeBand {
    /// 行下界 (不含)
    pub ymin: f64,
    /// 行上界 (不含)
    pub ymax: f64,
    /// 条纹可见的最大列 (含)
    pub x_max: u64,
}

impl StripeBand {
    /// 计算第 z 帧的条纹带
    pub fn for_frame(z: u32, height: u32) -> Self {
        let h = f64::from(height);
        let offset = 0.05 * f64::from(z / 5) * h;
        Self {
            ymin: 0.10 * h + offset,
            ymax: 0.13 * h + offset,
            x_max: 5 * (u64::from(z) + 1),
        }
    }

    /// 行 y 是否落在条纹带内
    pub fn contains_row(&self, y: u32) -> bool {
        let y = f64::from(y);
        y > self.ymin && y < self.ymax
    }

    /// 列 x 是否被条纹覆盖 (不检查行)
    pub fn covers_column(&self, x: u32) -> bool {
        x % 4 < 2 && u64::from(x) <= self.x_max
    }

    /// (x, y) 是否为条纹像素
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.contains_row(y) && self.covers_column(x)
    }
}

/// 基础亮度值 `(x + y + 3z) mod 256`
#[inline]
fn base_luma(x: u32, y: u32, z: u32) -> u8 {
    x.wrapping_add(y).wrapping_add(z.wrapping_mul(3)) as u8
}

/// 测试图案生成器
///
/// 持有一份已校验的配置, 生成过程是 (x, y, z, 配置) 的纯函数.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    config: PatternConfig,
}

impl PatternGenerator {
    /// 创建生成器
    ///
    /// 配置无效时立即返回 `InvalidDimension`, 不会产生任何输出.
    pub fn new(config: PatternConfig) -> SynthResult<Self> {
        config.validate()?;
        debug!(
            "创建图案生成器: {}x{}, {} 帧, {} fps, 色度={}",
            config.width, config.height, config.depth, config.frame_rate, config.chroma,
        );
        Ok(Self { config })
    }

    /// 获取配置
    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// 计算亮度采样
    pub fn luma_sample(&self, x: u32, y: u32, z: u32) -> u8 {
        if self.in_stripe(x, y, z) {
            STRIPE_LUMA
        } else {
            base_luma(x, y, z)
        }
    }

    /// (x, y, z) 是否为条纹像素
    pub fn in_stripe(&self, x: u32, y: u32, z: u32) -> bool {
        StripeBand::for_frame(z, self.config.height).contains(x, y)
    }

    /// 计算色度采样
    ///
    /// # 参数
    /// - `plane`: U 或 V
    /// - `cx` / `cy`: 色度平面内的列 / 行
    /// - `z`: 帧号
    pub fn chroma_sample(&self, plane: ChromaPlane, cx: u32, cy: u32, z: u32) -> u8 {
        match self.config.chroma {
            ChromaFill::Neutral => NEUTRAL_CHROMA,
            ChromaFill::Gradient => match plane {
                ChromaPlane::U => 128u32.wrapping_add(cy).wrapping_add(z.wrapping_mul(2)) as u8,
                ChromaPlane::V => 64u32.wrapping_add(cx).wrapping_add(z.wrapping_mul(5)) as u8,
            },
        }
    }

    /// 将第 z 帧写入调用方提供的缓冲区
    ///
    /// 缓冲区长度必须等于 `config.frame_size()`, 布局为 Y | U | V.
    pub fn fill_frame(&self, z: u32, buf: &mut [u8]) -> SynthResult<()> {
        self.check_frame_index(z)?;
        if buf.len() != self.config.frame_size() {
            return Err(SynthError::InvalidArgument(format!(
                "帧缓冲区大小 {} 与预期 {} 不匹配",
                buf.len(),
                self.config.frame_size()
            )));
        }
        self.render_into(z, buf);
        Ok(())
    }

    /// 顺序生成整个视频体
    pub fn generate(&self) -> Vec<u8> {
        let frame_size = self.config.frame_size();
        let mut volume = vec![0u8; self.config.volume_size()];
        for (z, frame) in volume.chunks_exact_mut(frame_size).enumerate() {
            self.render_into(z as u32, frame);
        }
        debug!("顺序生成完成: {} 字节", volume.len());
        volume
    }

    /// 并行生成整个视频体, 每帧一个任务
    ///
    /// 输出与 [`generate`](Self::generate) 逐字节一致.
    pub fn generate_parallel(&self) -> Vec<u8> {
        let frame_size = self.config.frame_size();
        let mut volume = vec![0u8; self.config.volume_size()];
        volume
            .par_chunks_exact_mut(frame_size)
            .enumerate()
            .for_each(|(z, frame)| self.render_into(z as u32, frame));
        debug!("并行生成完成: {} 字节", volume.len());
        volume
    }

    /// 逐帧写出视频体, 只复用一个帧缓冲区
    ///
    /// 返回写出的字节数.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> SynthResult<u64> {
        let mut frame = vec![0u8; self.config.frame_size()];
        let mut written = 0u64;
        for z in 0..self.config.depth {
            self.render_into(z, &mut frame);
            writer.write_all(&frame)?;
            written += frame.len() as u64;
        }
        writer.flush()?;
        info!(
            "{} 帧 ({}x{}) 已写出, 共 {} 字节",
            self.config.depth, self.config.width, self.config.height, written
        );
        Ok(written)
    }

    /// 生成第 z 帧的 VideoFrame (编码器输入)
    ///
    /// pts = z, time_base = 1 / 帧率, 时长 1 帧.
    pub fn render_frame(&self, z: u32) -> SynthResult<VideoFrame> {
        self.check_frame_index(z)?;
        Ok(self.build_frame(z))
    }

    /// 按帧号顺序迭代所有帧
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            generator: self,
            next: 0,
        }
    }

    fn check_frame_index(&self, z: u32) -> SynthResult<()> {
        if z >= self.config.depth {
            return Err(SynthError::InvalidArgument(format!(
                "帧号 {} 超出范围 (共 {} 帧)",
                z, self.config.depth
            )));
        }
        Ok(())
    }

    fn build_frame(&self, z: u32) -> VideoFrame {
        let mut frame = VideoFrame::new(
            self.config.width,
            self.config.height,
            PixelFormat::Yuv420p,
        );
        let mut luma = vec![0u8; self.config.luma_plane_size()];
        let mut u = vec![0u8; self.config.chroma_plane_size()];
        let mut v = vec![0u8; self.config.chroma_plane_size()];
        self.render_planes(z, &mut luma, &mut u, &mut v);

        frame.data = vec![luma, u, v];
        frame.linesize = vec![
            self.config.width as usize,
            self.config.chroma_width(),
            self.config.chroma_width(),
        ];
        frame.pts = i64::from(z);
        frame.time_base = self.config.time_base();
        frame.duration = 1;
        frame
    }

    /// 把一帧渲染进长度为 frame_size 的连续缓冲区
    fn render_into(&self, z: u32, buf: &mut [u8]) {
        let (luma, chroma) = buf.split_at_mut(self.config.luma_plane_size());
        let (u, v) = chroma.split_at_mut(self.config.chroma_plane_size());
        self.render_planes(z, luma, u, v);
    }

    fn render_planes(&self, z: u32, luma: &mut [u8], u: &mut [u8], v: &mut [u8]) {
        let width = self.config.width as usize;
        let band = StripeBand::for_frame(z, self.config.height);

        for (y, row) in luma.chunks_exact_mut(width).enumerate() {
            let y = y as u32;
            let row_in_band = band.contains_row(y);
            for (x, sample) in row.iter_mut().enumerate() {
                let x = x as u32;
                *sample = if row_in_band && band.covers_column(x) {
                    STRIPE_LUMA
                } else {
                    base_luma(x, y, z)
                };
            }
        }

        match self.config.chroma {
            ChromaFill::Neutral => {
                u.fill(NEUTRAL_CHROMA);
                v.fill(NEUTRAL_CHROMA);
            }
            ChromaFill::Gradient => {
                let chroma_width = self.config.chroma_width();
                for (plane, data) in [(ChromaPlane::U, u), (ChromaPlane::V, v)] {
                    for (cy, row) in data.chunks_exact_mut(chroma_width).enumerate() {
                        for (cx, sample) in row.iter_mut().enumerate() {
                            *sample = self.chroma_sample(plane, cx as u32, cy as u32, z);
                        }
                    }
                }
            }
        }
    }
}

/// 帧迭代器, 由 [`PatternGenerator::frames`] 创建
pub struct Frames<'a> {
    generator: &'a PatternGenerator,
    next: u32,
}

impl Iterator for Frames<'_> {
    type Item = VideoFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.generator.config.depth {
            return None;
        }
        let frame = self.generator.build_frame(self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.generator.config.depth - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}
