//! 帧的平面布局.
//!
//! rawvideo 的码流就是各平面按顺序紧凑拼接的像素数据.
//! [`FrameLayout`] 描述这种拼接方式: 打包时去掉 linesize 填充, 拆分时按紧凑 linesize 还原.

use yuvsynth_core::{PixelFormat, SynthError, SynthResult};

use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;

/// 单个平面的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// 每行有效字节数
    pub row_bytes: usize,
    /// 行数
    pub rows: usize,
}

impl PlaneLayout {
    /// 紧凑存储时的平面字节数
    pub fn size(&self) -> usize {
        self.row_bytes * self.rows
    }
}

/// 一帧的平面布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    planes: Vec<PlaneLayout>,
    frame_size: usize,
}

impl FrameLayout {
    /// 按像素格式与尺寸计算布局
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32) -> SynthResult<Self> {
        if pixel_format == PixelFormat::None {
            return Err(SynthError::InvalidArgument("像素格式不能为 None".into()));
        }
        pixel_format.check_dimensions(width, height)?;

        let planes = (0..pixel_format.plane_count() as usize)
            .map(|plane| {
                pixel_format
                    .plane_dims(plane, width, height)
                    .map(|(row_bytes, rows)| PlaneLayout { row_bytes, rows })
                    .ok_or_else(|| {
                        SynthError::InvalidArgument(format!(
                            "无法计算 {} 平面 {} 的尺寸",
                            pixel_format, plane
                        ))
                    })
            })
            .collect::<SynthResult<Vec<_>>>()?;
        let frame_size = planes.iter().map(PlaneLayout::size).sum();

        Ok(Self {
            width,
            height,
            pixel_format,
            planes,
            frame_size,
        })
    }

    /// 从编解码参数计算布局
    pub fn from_params(params: &CodecParameters) -> SynthResult<Self> {
        let video = &params.video;
        Self::new(video.pixel_format, video.width, video.height)
    }

    pub fn planes(&self) -> &[PlaneLayout] {
        &self.planes
    }

    /// 紧凑打包后的单帧字节数
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// 分配零填充、紧凑 linesize 的帧
    pub fn alloc_frame(&self) -> VideoFrame {
        let mut frame = VideoFrame::new(self.width, self.height, self.pixel_format);
        for (index, plane) in self.planes.iter().enumerate() {
            frame.data[index] = vec![0u8; plane.size()];
            frame.linesize[index] = plane.row_bytes;
        }
        frame
    }

    /// 把帧的各平面按顺序追加到 `out`, 去掉每行末尾的 linesize 填充
    ///
    /// 帧的尺寸或像素格式与布局不一致时返回 `InvalidArgument`,
    /// 平面数据不足时返回 `InvalidData`.
    pub fn pack_into(&self, frame: &VideoFrame, out: &mut Vec<u8>) -> SynthResult<()> {
        if frame.width != self.width
            || frame.height != self.height
            || frame.pixel_format != self.pixel_format
        {
            return Err(SynthError::InvalidArgument(format!(
                "帧参数 {}x{} {} 与布局 {}x{} {} 不一致",
                frame.width,
                frame.height,
                frame.pixel_format,
                self.width,
                self.height,
                self.pixel_format,
            )));
        }
        if frame.data.len() != self.planes.len() || frame.linesize.len() != self.planes.len() {
            return Err(SynthError::InvalidData(format!(
                "帧有 {} 个平面, 预期 {}",
                frame.data.len(),
                self.planes.len()
            )));
        }

        out.reserve(self.frame_size);
        for (index, plane) in self.planes.iter().enumerate() {
            let data = &frame.data[index];
            let stride = frame.linesize[index];
            let needed = match plane.rows {
                0 => 0,
                rows => stride * (rows - 1) + plane.row_bytes,
            };
            if stride < plane.row_bytes || data.len() < needed {
                return Err(SynthError::InvalidData(format!(
                    "平面 {} 数据不足: {} 字节 (linesize {}), 需要 {}",
                    index,
                    data.len(),
                    stride,
                    needed
                )));
            }

            if stride == plane.row_bytes {
                out.extend_from_slice(&data[..plane.size()]);
            } else {
                for row in data.chunks(stride).take(plane.rows) {
                    out.extend_from_slice(&row[..plane.row_bytes]);
                }
            }
        }
        Ok(())
    }

    /// 把紧凑字节流按平面切分 (不复制), 长度必须恰好等于 `frame_size()`
    pub fn split<'a>(&self, data: &'a [u8]) -> SynthResult<Vec<&'a [u8]>> {
        if data.len() != self.frame_size {
            return Err(SynthError::InvalidData(format!(
                "数据大小 {} 与预期帧大小 {} 不匹配",
                data.len(),
                self.frame_size
            )));
        }

        let mut rest = data;
        let mut planes = Vec::with_capacity(self.planes.len());
        for plane in &self.planes {
            let (head, tail) = rest.split_at(plane.size());
            planes.push(head);
            rest = tail;
        }
        Ok(planes)
    }

    /// 把紧凑字节流拆分为一帧, 长度必须恰好等于 `frame_size()`
    pub fn unpack(&self, data: &[u8]) -> SynthResult<VideoFrame> {
        let mut frame = VideoFrame::new(self.width, self.height, self.pixel_format);
        for (index, (plane, bytes)) in self.planes.iter().zip(self.split(data)?).enumerate() {
            frame.data[index] = bytes.to_vec();
            frame.linesize[index] = plane.row_bytes;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420p_布局() {
        let layout = FrameLayout::new(PixelFormat::Yuv420p, 352, 288).unwrap();
        assert_eq!(
            layout.planes(),
            &[
                PlaneLayout { row_bytes: 352, rows: 288 },
                PlaneLayout { row_bytes: 176, rows: 144 },
                PlaneLayout { row_bytes: 176, rows: 144 },
            ]
        );
        assert_eq!(layout.frame_size(), 152_064);
    }

    #[test]
    fn test_按平面切分() {
        let layout = FrameLayout::new(PixelFormat::Yuv420p, 4, 2).unwrap();
        let data: Vec<u8> = (0..12).collect();
        let planes = layout.split(&data).unwrap();
        assert_eq!(planes, vec![&data[..8], &data[8..10], &data[10..]]);
        assert!(matches!(
            layout.split(&data[..11]),
            Err(SynthError::InvalidData(_))
        ));
    }

    #[test]
    fn test_拒绝无效参数() {
        assert!(matches!(
            FrameLayout::new(PixelFormat::None, 4, 4),
            Err(SynthError::InvalidArgument(_))
        ));
        assert!(matches!(
            FrameLayout::new(PixelFormat::Yuv420p, 5, 4),
            Err(SynthError::InvalidDimension(_))
        ));
    }

    #[test]
    fn test_打包去掉填充() {
        let layout = FrameLayout::new(PixelFormat::Gray8, 3, 2).unwrap();
        let mut frame = VideoFrame::new(3, 2, PixelFormat::Gray8);
        // linesize 4, 每行末尾 1 字节填充
        frame.data[0] = vec![1, 2, 3, 99, 4, 5, 6, 99];
        frame.linesize[0] = 4;

        let mut out = Vec::new();
        layout.pack_into(&frame, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);

        let unpacked = layout.unpack(&out).unwrap();
        assert_eq!(unpacked.linesize, vec![3]);
        assert_eq!(unpacked.data[0], out);
    }

    #[test]
    fn test_平面数据不足() {
        let layout = FrameLayout::new(PixelFormat::Yuv420p, 4, 4).unwrap();
        let mut frame = layout.alloc_frame();
        frame.data[2].pop();
        let err = layout.pack_into(&frame, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidData(_)));
    }

    #[test]
    fn test_尺寸不一致() {
        let layout = FrameLayout::new(PixelFormat::Yuv420p, 4, 4).unwrap();
        let frame = FrameLayout::new(PixelFormat::Yuv420p, 8, 4).unwrap().alloc_frame();
        let err = layout.pack_into(&frame, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidArgument(_)));
    }

    #[test]
    fn test_拆分长度不符() {
        let layout = FrameLayout::new(PixelFormat::Yuv420p, 2, 2).unwrap();
        assert!(matches!(
            layout.unpack(&[0u8; 5]),
            Err(SynthError::InvalidData(_))
        ));
    }
}
