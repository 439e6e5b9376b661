//! 编码 / 解码流水线.
//!
//! 生成器 -> 编码器 -> 封装器, 以及 解封装器 -> 解码器 -> 回调.
//! 文件输出、内存输出和命令行的各个子命令都复用这里的两条流水线.

use log::{debug, info};
use yuvsynth_codec::{CodecId, CodecParameters, Decoder, Encoder, Packet, VideoFrame};
use yuvsynth_core::{PixelFormat, SynthError, SynthResult};
use yuvsynth_format::stream::{Stream, VideoStreamParams};
use yuvsynth_format::{Demuxer, IoContext, Muxer};
use yuvsynth_pattern::PatternGenerator;

/// 编码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// 送入编码器的帧数
    pub frames: u64,
    /// 写出的数据包数
    pub packets: u64,
    /// 写出的负载字节数 (不含容器头部)
    pub bytes: u64,
}

/// 生成器对应的输出流描述
pub fn pattern_stream(generator: &PatternGenerator, encoder: &dyn Encoder) -> Stream {
    let config = generator.config();
    let mut stream = Stream::raw_video(
        0,
        VideoStreamParams::yuv420p(config.width, config.height, config.frame_rate_rational()),
    );
    stream.codec_id = encoder.codec_id();
    stream.nb_frames = u64::from(config.depth);
    stream
}

/// 把生成器的全部帧编码并写入容器
///
/// 每写出一个数据包记录一条 `Write frame N (size=S)` 日志,
/// 所有帧送完后发送 flush 信号, 继续写出延迟的数据包直到 `Eof`.
pub fn encode_pattern(
    generator: &PatternGenerator,
    encoder: &mut dyn Encoder,
    muxer: &mut dyn Muxer,
    io: &mut IoContext,
) -> SynthResult<EncodeStats> {
    let config = generator.config();
    let mut params = CodecParameters::video(
        encoder.codec_id(),
        config.width,
        config.height,
        PixelFormat::Yuv420p,
        config.frame_rate_rational(),
    );
    // 压缩编码器使用自己的默认码率
    if encoder.codec_id() == CodecId::RawVideo {
        params.bit_rate = config.frame_size() as u64 * 8 * u64::from(config.frame_rate);
    }
    encoder.open(&params)?;

    let stream = pattern_stream(generator, encoder);
    muxer.write_header(io, std::slice::from_ref(&stream))?;

    let mut stats = EncodeStats::default();
    for frame in generator.frames() {
        encoder.send_frame(Some(&frame))?;
        stats.frames += 1;
        drain_packets(encoder, muxer, io, &mut stats, false)?;
    }

    encoder.send_frame(None)?;
    drain_packets(encoder, muxer, io, &mut stats, true)?;
    muxer.write_trailer(io)?;

    debug!(
        "{} 编码完成: {} 帧, {} 个数据包, {} 字节",
        encoder.name(),
        stats.frames,
        stats.packets,
        stats.bytes
    );
    Ok(stats)
}

fn drain_packets(
    encoder: &mut dyn Encoder,
    muxer: &mut dyn Muxer,
    io: &mut IoContext,
    stats: &mut EncodeStats,
    delayed: bool,
) -> SynthResult<()> {
    loop {
        match encoder.receive_packet() {
            Ok(pkt) => {
                if delayed {
                    info!("Write frame {:3} (size={:5}) [delayed]", pkt.pts, pkt.size());
                } else {
                    info!("Write frame {:3} (size={:5})", pkt.pts, pkt.size());
                }
                muxer.write_packet(io, &pkt)?;
                stats.packets += 1;
                stats.bytes += pkt.size() as u64;
            }
            Err(SynthError::NeedMoreData) | Err(SynthError::Eof) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// 解码输出帧的附加信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// 输出顺序中的帧序号 (从 0 开始)
    pub index: u64,
    /// 是否在 flush 之后才输出
    pub delayed: bool,
}

/// 从已打开的解封装器中读取全部数据包并解码
///
/// 每解出一帧调用一次 `on_frame`, 返回解出的帧数.
pub fn decode_stream<F>(
    demuxer: &mut dyn Demuxer,
    io: &mut IoContext,
    decoder: &mut dyn Decoder,
    mut on_frame: F,
) -> SynthResult<u64>
where
    F: FnMut(DecodedFrame, &VideoFrame) -> SynthResult<()>,
{
    let stream = demuxer
        .streams()
        .first()
        .cloned()
        .ok_or_else(|| SynthError::Format("输入中没有视频流".into()))?;
    if stream.codec_id != decoder.codec_id() {
        return Err(SynthError::InvalidArgument(format!(
            "流的编解码器 {} 与解码器 {} 不一致",
            stream.codec_id,
            decoder.codec_id()
        )));
    }
    decoder.open(&stream.codec_parameters())?;

    let mut decoded = 0u64;
    loop {
        let pkt = match demuxer.read_packet(io) {
            Ok(pkt) => pkt,
            Err(SynthError::Eof) => break,
            Err(e) => return Err(e),
        };
        decoder.send_packet(&pkt)?;
        drain_frames(decoder, &mut decoded, false, &mut on_frame)?;
    }

    decoder.send_packet(&Packet::flush())?;
    drain_frames(decoder, &mut decoded, true, &mut on_frame)?;

    debug!("{} 解码完成: {} 帧", decoder.name(), decoded);
    Ok(decoded)
}

fn drain_frames<F>(
    decoder: &mut dyn Decoder,
    decoded: &mut u64,
    delayed: bool,
    on_frame: &mut F,
) -> SynthResult<()>
where
    F: FnMut(DecodedFrame, &VideoFrame) -> SynthResult<()>,
{
    loop {
        match decoder.receive_frame() {
            Ok(frame) => {
                let info = DecodedFrame {
                    index: *decoded,
                    delayed,
                };
                on_frame(info, &frame)?;
                *decoded += 1;
            }
            Err(SynthError::NeedMoreData) | Err(SynthError::Eof) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// 有损编码时亮度 PSNR 的下限 (dB)
pub const MIN_LOSSY_PSNR: f64 = 20.0;

/// 解码结果的校验方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifyMode {
    /// 逐字节一致
    Exact,
    /// 尺寸一致, 亮度 PSNR 不低于 `min_psnr`
    Lossy { min_psnr: f64 },
}

impl VerifyMode {
    /// rawvideo 无损, 其余编解码器按有损处理
    pub fn for_codec(codec_id: CodecId) -> Self {
        match codec_id {
            CodecId::RawVideo => Self::Exact,
            _ => Self::Lossy {
                min_psnr: MIN_LOSSY_PSNR,
            },
        }
    }

    /// 用生成器的第 z 帧校验解码得到的帧
    pub fn verify(&self, generator: &PatternGenerator, z: u64, frame: &VideoFrame) -> SynthResult<()> {
        match *self {
            Self::Exact => verify_frame(generator, z, frame),
            Self::Lossy { min_psnr } => verify_frame_lossy(generator, z, frame, min_psnr).map(|_| ()),
        }
    }
}

fn expected_frame(generator: &PatternGenerator, z: u64, frame: &VideoFrame) -> SynthResult<VideoFrame> {
    let index = u32::try_from(z)
        .map_err(|_| SynthError::InvalidData(format!("帧号 {} 超出范围", z)))?;
    let expected = generator.render_frame(index)?;
    if frame.width != expected.width || frame.height != expected.height {
        return Err(SynthError::InvalidData(format!(
            "第 {} 帧尺寸 {}x{} 与预期 {}x{} 不一致",
            z, frame.width, frame.height, expected.width, expected.height
        )));
    }
    Ok(expected)
}

/// 检查解码得到的帧是否与生成器的第 z 帧逐字节一致
pub fn verify_frame(generator: &PatternGenerator, z: u64, frame: &VideoFrame) -> SynthResult<()> {
    let expected = expected_frame(generator, z, frame)?;
    if frame.data != expected.data {
        return Err(SynthError::InvalidData(format!("第 {} 帧像素数据不一致", z)));
    }
    Ok(())
}

/// 检查有损解码的帧: 尺寸一致且亮度 PSNR 不低于 `min_psnr`, 返回 PSNR
pub fn verify_frame_lossy(
    generator: &PatternGenerator,
    z: u64,
    frame: &VideoFrame,
    min_psnr: f64,
) -> SynthResult<f64> {
    let expected = expected_frame(generator, z, frame)?;
    let psnr = luma_psnr(&expected, frame)?;
    debug!("第 {} 帧亮度 PSNR: {:.2} dB", z, psnr);
    if psnr < min_psnr {
        return Err(SynthError::InvalidData(format!(
            "第 {} 帧亮度 PSNR {:.2} dB 低于下限 {:.2} dB",
            z, psnr, min_psnr
        )));
    }
    Ok(psnr)
}

/// 两帧亮度平面的 PSNR (dB), 完全相同时为无穷大
///
/// 按可见宽度逐行比较, 行尾填充不参与计算.
pub fn luma_psnr(reference: &VideoFrame, distorted: &VideoFrame) -> SynthResult<f64> {
    if reference.width != distorted.width || reference.height != distorted.height {
        return Err(SynthError::InvalidArgument(format!(
            "尺寸不一致: {}x{} 与 {}x{}",
            reference.width, reference.height, distorted.width, distorted.height
        )));
    }
    let (width, height) = (reference.width as usize, reference.height as usize);
    let mut sum_sq = 0u64;
    for (a, b) in luma_rows(reference, width, height)?
        .into_iter()
        .zip(luma_rows(distorted, width, height)?)
    {
        sum_sq += a
            .iter()
            .zip(b)
            .map(|(&x, &y)| u64::from(x.abs_diff(y)).pow(2))
            .sum::<u64>();
    }
    let samples = (width * height) as f64;
    if sum_sq == 0 || samples == 0.0 {
        return Ok(f64::INFINITY);
    }
    let mse = sum_sq as f64 / samples;
    Ok(10.0 * (255.0 * 255.0 / mse).log10())
}

/// 亮度平面的可见部分, 按行切片
fn luma_rows(frame: &VideoFrame, width: usize, height: usize) -> SynthResult<Vec<&[u8]>> {
    let (Some(plane), Some(&stride)) = (frame.data.first(), frame.linesize.first()) else {
        return Err(SynthError::InvalidData("帧缺少亮度平面".into()));
    };
    if stride < width || plane.len() < stride * height.saturating_sub(1) + width {
        return Err(SynthError::InvalidData("亮度平面数据不足".into()));
    }
    Ok((0..height)
        .map(|y| &plane[y * stride..y * stride + width])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvsynth_pattern::PatternConfig;

    fn generator() -> PatternGenerator {
        PatternGenerator::new(PatternConfig::new(32, 16, 3)).unwrap()
    }

    #[test]
    fn test_亮度_psnr() {
        let reference = generator().render_frame(0).unwrap();
        assert!(luma_psnr(&reference, &reference).unwrap().is_infinite());

        // 每个亮度样本偏差 1: MSE = 1
        let mut distorted = reference.clone();
        for v in distorted.data[0].iter_mut() {
            *v = if *v == 255 { 254 } else { *v + 1 };
        }
        let psnr = luma_psnr(&reference, &distorted).unwrap();
        assert!((psnr - 48.13).abs() < 0.01, "psnr={psnr}");

        // 色度差异不计入
        let mut chroma_only = reference.clone();
        chroma_only.data[1].fill(0);
        assert!(luma_psnr(&reference, &chroma_only).unwrap().is_infinite());

        let other = PatternGenerator::new(PatternConfig::new(16, 16, 1))
            .unwrap()
            .render_frame(0)
            .unwrap();
        assert!(matches!(
            luma_psnr(&reference, &other),
            Err(SynthError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_按编解码器选择校验方式() {
        assert_eq!(VerifyMode::for_codec(CodecId::RawVideo), VerifyMode::Exact);
        assert_eq!(
            VerifyMode::for_codec(CodecId::H264),
            VerifyMode::Lossy {
                min_psnr: MIN_LOSSY_PSNR
            }
        );

        let generator = generator();
        let mut frame = generator.render_frame(1).unwrap();
        frame.data[0][0] ^= 0x01;
        assert!(VerifyMode::Exact.verify(&generator, 1, &frame).is_err());
        VerifyMode::for_codec(CodecId::H264)
            .verify(&generator, 1, &frame)
            .unwrap();

        // 换成另一帧的内容, PSNR 远低于下限
        let wrong = generator.render_frame(2).unwrap();
        let strict = VerifyMode::Lossy { min_psnr: 99.0 };
        assert!(matches!(
            strict.verify(&generator, 1, &wrong),
            Err(SynthError::InvalidData(_))
        ));
    }
}
