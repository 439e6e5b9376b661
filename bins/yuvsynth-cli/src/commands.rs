//! 子命令实现.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};
use yuvsynth::pipeline::{self, DecodedFrame, EncodeStats, VerifyMode};
use yuvsynth_codec::{CodecId, CodecRegistry, VideoFrame};
use yuvsynth_core::{SynthError, Timestamp};
use yuvsynth_format::demuxers::rawvideo::RawVideoDemuxer;
use yuvsynth_format::{Demuxer, FormatId, FormatRegistry, IoContext, Muxer, VideoStreamParams, pgm};
use yuvsynth_pattern::{PatternConfig, PatternGenerator};

use crate::options::{PatternArgs, parse_rate, parse_size};

/// decode 子命令参数
#[derive(Debug, Clone)]
pub(crate) struct DecodeArgs {
    pub input: PathBuf,
    pub size: Option<String>,
    pub rate: String,
    pub prefix: Option<String>,
    pub dump: bool,
}

/// 输出文件已存在且未指定 -y 时报错
fn check_output(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", path.display());
    }
    Ok(())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("路径不是有效的 UTF-8: {}", path.display()))
}

/// 去掉扩展名后的路径, 用作 PGM 前缀
fn dump_base(path: &Path) -> String {
    path.with_extension("").display().to_string()
}

fn build_generator(args: &PatternArgs) -> Result<PatternGenerator> {
    let config = args.resolve()?;
    debug!("图案配置: {:?}", config);
    Ok(PatternGenerator::new(config)?)
}

/// 按扩展名创建封装器, 无法识别时写裸数据
fn muxer_for_output(registry: &FormatRegistry, path: &Path) -> Result<Box<dyn Muxer>> {
    match registry.create_muxer_for_filename(path_str(path)?) {
        Ok(muxer) => Ok(muxer),
        Err(SynthError::FormatNotFound(_)) => {
            debug!("未知输出扩展名, 按裸数据写出: {}", path.display());
            Ok(registry.create_muxer(FormatId::RawVideo)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn encode_to_file(
    generator: &PatternGenerator,
    codecs: &CodecRegistry,
    formats: &FormatRegistry,
    codec_id: CodecId,
    path: &Path,
) -> Result<EncodeStats> {
    let mut encoder = codecs.create_encoder(codec_id)?;
    let mut muxer = muxer_for_output(formats, path)?;
    let mut io = IoContext::open_write(path)
        .with_context(|| format!("创建输出文件失败: {}", path.display()))?;
    let stats = pipeline::encode_pattern(generator, encoder.as_mut(), muxer.as_mut(), &mut io)?;
    io.flush()?;
    Ok(stats)
}

fn parse_codec(name: &str) -> Result<CodecId> {
    CodecId::from_name(name).ok_or_else(|| anyhow!("未知编解码器: {name}"))
}

/// 打印播放 raw 文件所需的 ffmpeg 命令
fn print_playback_hint(config: &PatternConfig, path: &Path) {
    println!(
        "ffmpeg -f rawvideo -pix_fmt yuv420p -s {}x{} -r {} -i {} -vframes {} raw_yuv.mp4",
        config.width,
        config.height,
        config.frame_rate,
        path.display(),
        config.depth
    );
}

/// dump: 把整个视频体写入文件
pub(crate) fn dump(args: &PatternArgs, output: Option<PathBuf>, overwrite: bool) -> Result<()> {
    let generator = build_generator(args)?;
    let config = *generator.config();
    let path = output.unwrap_or_else(|| PathBuf::from(config.default_file_name()));
    check_output(&path, overwrite)?;

    let is_y4m = FormatId::from_filename(path_str(&path)?) == Some(FormatId::Y4m);
    if is_y4m {
        let codecs = yuvsynth::default_codec_registry();
        let formats = yuvsynth::default_format_registry();
        encode_to_file(&generator, &codecs, &formats, CodecId::RawVideo, &path)?;
    } else {
        let file = File::create(&path)
            .with_context(|| format!("创建输出文件失败: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        if args.parallel {
            writer.write_all(&generator.generate_parallel())?;
        } else {
            generator.write_to(&mut writer)?;
        }
        writer.flush()?;
    }

    println!(
        "{} frames ({}x{}) written to {}",
        config.depth,
        config.width,
        config.height,
        path.display()
    );
    if !is_y4m {
        print_playback_hint(&config, &path);
    }
    Ok(())
}

/// encode: 图案 -> 编码器 -> 输出文件
pub(crate) fn encode(
    args: &PatternArgs,
    codec: &str,
    output: Option<PathBuf>,
    overwrite: bool,
) -> Result<()> {
    let codec_id = parse_codec(codec)?;
    let generator = build_generator(args)?;
    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("test.{}", codec_id.default_extension())));
    check_output(&path, overwrite)?;

    let codecs = yuvsynth::default_codec_registry();
    let formats = yuvsynth::default_format_registry();
    let stats = encode_to_file(&generator, &codecs, &formats, codec_id, &path)?;
    info!(
        "{} 帧编码为 {} 个数据包 ({} 字节), 写入 {}",
        stats.frames,
        stats.packets,
        stats.bytes,
        path.display()
    );
    Ok(())
}

/// 打开输入: Y4M 与 H.264 裸流靠探测识别, 其他按 raw video 处理 (需要带外参数)
fn open_demuxer(
    formats: &FormatRegistry,
    io: &mut IoContext,
    filename: Option<&str>,
    raw_params: Option<VideoStreamParams>,
) -> Result<Box<dyn Demuxer>> {
    let probed = match formats.probe_input(io, filename) {
        Ok(result) => Some(result.format_id),
        Err(SynthError::FormatNotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let mut demuxer = match probed {
        Some(id @ (FormatId::Y4m | FormatId::H264)) => formats.create_demuxer(id)?,
        _ => {
            let params =
                raw_params.ok_or_else(|| anyhow!("raw video 输入需要用 --size 指定分辨率"))?;
            RawVideoDemuxer::with_params(params)
        }
    };
    demuxer.open(io)?;
    match demuxer.duration() {
        Some(secs) => debug!("输入格式: {}, 时长 {:.3}s", demuxer.name(), secs),
        None => debug!("输入格式: {}", demuxer.name()),
    }
    Ok(demuxer)
}

/// 解码整个输入, 每帧可选地转储 PGM, 返回帧数
fn decode_input<F>(
    codecs: &CodecRegistry,
    demuxer: &mut dyn Demuxer,
    io: &mut IoContext,
    dump_prefix: Option<&str>,
    mut check: F,
) -> Result<u64>
where
    F: FnMut(u64, &VideoFrame) -> yuvsynth_core::SynthResult<()>,
{
    let codec_id = demuxer
        .streams()
        .first()
        .map(|s| s.codec_id)
        .ok_or_else(|| anyhow!("输入中没有视频流"))?;
    let mut decoder = codecs.create_decoder(codec_id)?;

    let frames = pipeline::decode_stream(demuxer, io, decoder.as_mut(), |info: DecodedFrame, frame| {
        info!(
            "{}:\tkeyframe: {}\tpts: {} ({}){}",
            info.index,
            u8::from(frame.is_keyframe),
            frame.pts,
            Timestamp::new(frame.pts, frame.time_base),
            if info.delayed { " [delayed]" } else { "" }
        );
        check(info.index, frame)?;
        if let Some(prefix) = dump_prefix {
            pgm::save_luma_pgm(frame, prefix, info.index)?;
        }
        Ok(())
    })?;
    Ok(frames)
}

/// decode: 解码输入文件
pub(crate) fn decode(args: &DecodeArgs) -> Result<()> {
    let raw_params = match &args.size {
        Some(size) => {
            let (width, height) =
                parse_size(size).ok_or_else(|| anyhow!("无效分辨率: {size}"))?;
            let rate = parse_rate(&args.rate).ok_or_else(|| anyhow!("无效帧率: {}", args.rate))?;
            Some(VideoStreamParams::yuv420p(width, height, rate))
        }
        None => None,
    };

    let codecs = yuvsynth::default_codec_registry();
    let formats = yuvsynth::default_format_registry();
    let mut io = IoContext::open_read(&args.input)
        .with_context(|| format!("打开输入文件失败: {}", args.input.display()))?;
    let mut demuxer = open_demuxer(&formats, &mut io, args.input.to_str(), raw_params)?;

    let prefix = args.prefix.clone().unwrap_or_else(|| dump_base(&args.input));
    let dump_prefix = args.dump.then_some(prefix.as_str());
    let frames = decode_input(&codecs, demuxer.as_mut(), &mut io, dump_prefix, |_, _| Ok(()))?;

    info!("解码 {} 帧: {}", frames, args.input.display());
    Ok(())
}

/// roundtrip: 编码到文件并从文件解码, 再编码到内存缓冲区并从内存解码, 两次都校验每一帧
///
/// rawvideo 要求逐字节一致, 有损编解码器按亮度 PSNR 校验.
pub(crate) fn roundtrip(
    args: &PatternArgs,
    codec: &str,
    dir: &Path,
    dump: bool,
    overwrite: bool,
) -> Result<()> {
    let codec_id = parse_codec(codec)?;
    let generator = build_generator(args)?;
    let config = *generator.config();
    let codecs = yuvsynth::default_codec_registry();
    let formats = yuvsynth::default_format_registry();

    std::fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {}", dir.display()))?;
    let path = dir.join(format!("test.{}", codec_id.default_extension()));
    check_output(&path, overwrite)?;

    let stats = encode_to_file(&generator, &codecs, &formats, codec_id, &path)?;
    info!("编码完成: {} 帧 -> {}", stats.frames, path.display());

    let params = VideoStreamParams::yuv420p(config.width, config.height, config.frame_rate_rational());
    let mode = VerifyMode::for_codec(codec_id);
    debug!("校验方式: {:?}", mode);
    let verify = |z: u64, frame: &VideoFrame| mode.verify(&generator, z, frame);

    // 从文件解码
    let file_base = dir.join("test").display().to_string();
    let mut io = IoContext::open_read(&path)?;
    let mut demuxer = open_demuxer(&formats, &mut io, path.to_str(), Some(params))?;
    let decoded = decode_input(
        &codecs,
        demuxer.as_mut(),
        &mut io,
        dump.then_some(file_base.as_str()),
        verify,
    )?;
    check_frame_count(decoded, &config, "文件")?;

    // 编码到内存缓冲区, 再从缓冲区解码
    let mut encoder = codecs.create_encoder(codec_id)?;
    let mut muxer = muxer_for_output(&formats, &path)?;
    let mut out = IoContext::memory_writer();
    pipeline::encode_pattern(&generator, encoder.as_mut(), muxer.as_mut(), &mut out)?;
    let data = out.into_data()?;
    debug!("内存编码: {} 字节", data.len());

    let buffered_base = dir.join("buffered-test").display().to_string();
    let mut io = IoContext::from_memory(data);
    let mut demuxer = open_demuxer(&formats, &mut io, path.to_str(), Some(params))?;
    let decoded = decode_input(
        &codecs,
        demuxer.as_mut(),
        &mut io,
        dump.then_some(buffered_base.as_str()),
        verify,
    )?;
    check_frame_count(decoded, &config, "内存")?;

    println!(
        "roundtrip OK: {} frames ({}x{}) via {}",
        config.depth,
        config.width,
        config.height,
        path.display()
    );
    Ok(())
}

fn check_frame_count(decoded: u64, config: &PatternConfig, source: &str) -> Result<()> {
    if decoded != u64::from(config.depth) {
        bail!("{}解码得到 {} 帧, 预期 {} 帧", source, decoded, config.depth);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pattern() -> PatternArgs {
        PatternArgs {
            width: Some(32),
            height: Some(16),
            depth: Some(4),
            ..PatternArgs::default()
        }
    }

    #[test]
    fn test_dump_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yuv");
        dump(&small_pattern(), Some(path.clone()), false).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 * 32 * 16 * 3 / 2);

        // 已存在且未指定 -y
        assert!(dump(&small_pattern(), Some(path.clone()), false).is_err());
        dump(&small_pattern(), Some(path), true).unwrap();
    }

    #[test]
    fn test_dump_parallel_一致() {
        let dir = tempfile::tempdir().unwrap();
        let seq = dir.path().join("seq.bin");
        let par = dir.path().join("par.bin");
        dump(&small_pattern(), Some(seq.clone()), false).unwrap();
        let parallel = PatternArgs {
            parallel: true,
            ..small_pattern()
        };
        dump(&parallel, Some(par.clone()), false).unwrap();
        assert_eq!(std::fs::read(seq).unwrap(), std::fs::read(par).unwrap());
    }

    #[test]
    fn test_dump_y4m() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.y4m");
        dump(&small_pattern(), Some(path.clone()), false).unwrap();
        let data = std::fs::read(path).unwrap();
        assert!(data.starts_with(b"YUV4MPEG2 W32 H16 F25:1"));
    }

    #[test]
    fn test_encode_未实现的编解码器() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.hevc");
        let err = encode(&small_pattern(), "hevc", Some(path), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SynthError>(),
            Some(SynthError::CodecNotFound(_))
        ));
        assert!(encode(&small_pattern(), "vp9", None, false).is_err());
    }

    #[test]
    fn test_encode_decode_y4m() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.y4m");
        encode(&small_pattern(), "rawvideo", Some(path.clone()), false).unwrap();

        let prefix = dir.path().join("frame").display().to_string();
        decode(&DecodeArgs {
            input: path,
            size: None,
            rate: "25".into(),
            prefix: Some(prefix.clone()),
            dump: true,
        })
        .unwrap();
        for n in 0..4 {
            assert!(PathBuf::from(pgm::slice_file_name(&prefix, n)).exists());
        }
    }

    #[test]
    fn test_decode_raw_需要分辨率() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.yuv");
        dump(&small_pattern(), Some(path.clone()), false).unwrap();

        let mut args = DecodeArgs {
            input: path,
            size: None,
            rate: "25".into(),
            prefix: None,
            dump: false,
        };
        assert!(decode(&args).is_err());
        args.size = Some("32x16".into());
        decode(&args).unwrap();
    }

    #[test]
    fn test_roundtrip_rawvideo() {
        let dir = tempfile::tempdir().unwrap();
        roundtrip(&small_pattern(), "rawvideo", dir.path(), true, false).unwrap();
        assert!(dir.path().join("test.yuv").exists());
        assert!(dir.path().join("test-slice0.ppm").exists());
        assert!(dir.path().join("buffered-test-slice3.ppm").exists());
    }

    #[test]
    fn test_roundtrip_h264() {
        let dir = tempfile::tempdir().unwrap();
        let args = PatternArgs {
            width: Some(64),
            height: Some(48),
            depth: Some(5),
            ..PatternArgs::default()
        };
        roundtrip(&args, "h264", dir.path(), true, false).unwrap();
        let data = std::fs::read(dir.path().join("test.h264")).unwrap();
        assert!(data.starts_with(&[0, 0, 0, 1]));
        assert!(dir.path().join("test-slice4.ppm").exists());
        assert!(dir.path().join("buffered-test-slice0.ppm").exists());
    }

    #[test]
    fn test_encode_decode_h264() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.264");
        encode(&small_pattern(), "libx264", Some(path.clone()), false).unwrap();
        // 裸流自带 SPS, 不需要 --size
        decode(&DecodeArgs {
            input: path,
            size: None,
            rate: "25".into(),
            prefix: None,
            dump: false,
        })
        .unwrap();
    }

    #[test]
    fn test_roundtrip_内存输出与文件一致() {
        let dir = tempfile::tempdir().unwrap();
        roundtrip(&small_pattern(), "rawvideo", dir.path(), false, false).unwrap();

        let generator = build_generator(&small_pattern()).unwrap();
        let codecs = yuvsynth::default_codec_registry();
        let formats = yuvsynth::default_format_registry();
        let mut encoder = codecs.create_encoder(CodecId::RawVideo).unwrap();
        let mut muxer = muxer_for_output(&formats, Path::new("test.yuv")).unwrap();
        let mut out = IoContext::memory_writer();
        pipeline::encode_pattern(&generator, encoder.as_mut(), muxer.as_mut(), &mut out).unwrap();
        assert_eq!(
            out.into_data().unwrap(),
            std::fs::read(dir.path().join("test.yuv")).unwrap()
        );
    }
}
