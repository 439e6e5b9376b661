//! 亮度平面的 PGM 转储.
//!
//! 把一帧的 Y 平面写成二进制 PGM (P5) 图像, 便于逐帧检查解码结果.
//! 文件名沿用 `<前缀>-slice<帧号>.ppm` 的命名.

use std::path::PathBuf;

use log::debug;
use yuvsynth_codec::VideoFrame;
use yuvsynth_core::{SynthError, SynthResult};

use crate::io::IoContext;

/// 生成转储文件名: `<base>-slice<n>.ppm`
pub fn slice_file_name(base: &str, n: u64) -> String {
    format!("{}-slice{}.ppm", base, n)
}

/// 把帧的亮度平面编码为 PGM 字节流
///
/// 头部为 `P5\n<宽>\n<高>\n255\n`, 之后是逐行的亮度数据 (去掉 linesize 填充).
pub fn encode_pgm(frame: &VideoFrame) -> SynthResult<Vec<u8>> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let (Some(luma), Some(&linesize)) = (frame.data.first(), frame.linesize.first()) else {
        return Err(SynthError::InvalidArgument("帧没有亮度平面".into()));
    };
    if linesize < width || luma.len() < linesize * height.saturating_sub(1) + width {
        return Err(SynthError::InvalidData(format!(
            "亮度平面大小 {} 不足以容纳 {}x{}",
            luma.len(),
            width,
            height
        )));
    }

    let header = format!("P5\n{}\n{}\n255\n", width, height);
    let mut out = Vec::with_capacity(header.len() + width * height);
    out.extend_from_slice(header.as_bytes());
    for y in 0..height {
        out.extend_from_slice(&luma[y * linesize..y * linesize + width]);
    }
    Ok(out)
}

/// 把帧的亮度平面写入 `<base>-slice<n>.ppm`, 返回文件路径
pub fn save_luma_pgm(frame: &VideoFrame, base: &str, n: u64) -> SynthResult<PathBuf> {
    let path = PathBuf::from(slice_file_name(base, n));
    let bytes = encode_pgm(frame)?;
    let mut io = IoContext::open_write(&path)?;
    io.write_all(&bytes)?;
    io.flush()?;
    debug!("已保存 {} ({} 字节)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvsynth_core::PixelFormat;

    fn gradient_frame(width: u32, height: u32) -> VideoFrame {
        let mut frame = VideoFrame::alloc(width, height, PixelFormat::Yuv420p).unwrap();
        for (i, sample) in frame.data[0].iter_mut().enumerate() {
            *sample = i as u8;
        }
        frame
    }

    #[test]
    fn test_文件名() {
        assert_eq!(slice_file_name("test", 0), "test-slice0.ppm");
        assert_eq!(slice_file_name("buffered-test", 12), "buffered-test-slice12.ppm");
    }

    #[test]
    fn test_pgm_头部与负载() {
        let frame = gradient_frame(4, 2);
        let pgm = encode_pgm(&frame).unwrap();
        assert_eq!(&pgm[..11], b"P5\n4\n2\n255\n");
        assert_eq!(&pgm[11..], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_去掉行填充() {
        let mut frame = VideoFrame::new(2, 2, PixelFormat::Gray8);
        frame.data[0] = vec![1, 2, 0xEE, 3, 4, 0xEE];
        frame.linesize[0] = 3;
        let pgm = encode_pgm(&frame).unwrap();
        assert_eq!(&pgm[pgm.len() - 4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_平面过小() {
        let mut frame = VideoFrame::new(4, 4, PixelFormat::Gray8);
        frame.data[0] = vec![0; 8];
        frame.linesize[0] = 4;
        assert!(matches!(encode_pgm(&frame), Err(SynthError::InvalidData(_))));
    }

    #[test]
    fn test_写入文件() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("test");
        let frame = gradient_frame(4, 2);

        let path = save_luma_pgm(&frame, base.to_str().unwrap(), 3).unwrap();
        assert!(path.ends_with("test-slice3.ppm"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, encode_pgm(&frame).unwrap());
    }
}
