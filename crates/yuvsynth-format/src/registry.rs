//! 容器格式注册表.
//!
//! 解封装器/封装器按注册顺序保存, 同一格式取最先注册的实现.
//! 输入格式由探测器打分决定, 同分时先注册的探测器胜出.

use std::io::SeekFrom;

use log::debug;
use yuvsynth_core::{SynthError, SynthResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::probe::{FormatProbe, ProbeResult};

/// 解封装器工厂函数类型
pub type DemuxerFactory = fn() -> SynthResult<Box<dyn Demuxer>>;

/// 封装器工厂函数类型
pub type MuxerFactory = fn() -> SynthResult<Box<dyn Muxer>>;

/// 探测时读取的最大头部字节数
const PROBE_SIZE: usize = 8192;

struct Entry<F> {
    format_id: FormatId,
    name: &'static str,
    factory: F,
}

fn lookup<F: Copy>(entries: &[Entry<F>], format_id: FormatId, kind: &str) -> SynthResult<F> {
    entries
        .iter()
        .find(|e| e.format_id == format_id)
        .map(|e| e.factory)
        .ok_or_else(|| SynthError::FormatNotFound(format!("未找到 {} 的{}", format_id, kind)))
}

fn names<F>(entries: &[Entry<F>]) -> Vec<(FormatId, &'static str)> {
    entries.iter().map(|e| (e.format_id, e.name)).collect()
}

/// 容器格式注册表
#[derive(Default)]
pub struct FormatRegistry {
    demuxers: Vec<Entry<DemuxerFactory>>,
    muxers: Vec<Entry<MuxerFactory>>,
    probes: Vec<Box<dyn FormatProbe + Send + Sync>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_demuxer(
        &mut self,
        format_id: FormatId,
        name: &'static str,
        factory: DemuxerFactory,
    ) {
        self.demuxers.push(Entry {
            format_id,
            name,
            factory,
        });
    }

    pub fn register_muxer(
        &mut self,
        format_id: FormatId,
        name: &'static str,
        factory: MuxerFactory,
    ) {
        self.muxers.push(Entry {
            format_id,
            name,
            factory,
        });
    }

    pub fn register_probe(&mut self, probe: Box<dyn FormatProbe + Send + Sync>) {
        self.probes.push(probe);
    }

    /// 创建指定格式的解封装器, 未注册为 `FormatNotFound`
    pub fn create_demuxer(&self, format_id: FormatId) -> SynthResult<Box<dyn Demuxer>> {
        lookup(&self.demuxers, format_id, "解封装器")?()
    }

    /// 创建指定格式的封装器, 未注册为 `FormatNotFound`
    pub fn create_muxer(&self, format_id: FormatId) -> SynthResult<Box<dyn Muxer>> {
        lookup(&self.muxers, format_id, "封装器")?()
    }

    /// 按输出文件的扩展名选择封装器
    pub fn create_muxer_for_filename(&self, filename: &str) -> SynthResult<Box<dyn Muxer>> {
        match FormatId::from_filename(filename) {
            Some(format_id) => self.create_muxer(format_id),
            None => Err(SynthError::FormatNotFound(format!(
                "无法从文件名推断输出格式: {}",
                filename
            ))),
        }
    }

    /// 对头部数据打分, 返回得分最高的格式
    pub fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeResult> {
        self.probes
            .iter()
            .filter_map(|p| {
                p.probe(data, filename).map(|score| ProbeResult {
                    format_id: p.format_id(),
                    score,
                })
            })
            .fold(None, |best: Option<ProbeResult>, candidate| match best {
                Some(b) if b.score >= candidate.score => Some(b),
                _ => Some(candidate),
            })
    }

    pub fn list_demuxers(&self) -> Vec<(FormatId, &'static str)> {
        names(&self.demuxers)
    }

    pub fn list_muxers(&self) -> Vec<(FormatId, &'static str)> {
        names(&self.muxers)
    }

    /// 读取最多 [`PROBE_SIZE`] 字节探测格式, 之后回到起始位置
    pub fn probe_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> SynthResult<ProbeResult> {
        let mut head = vec![0u8; PROBE_SIZE];
        let n = io.read_full(&mut head)?;
        head.truncate(n);
        io.seek(SeekFrom::Start(0))?;

        let result = self
            .probe(&head, filename)
            .ok_or_else(|| SynthError::FormatNotFound("无法识别输入文件格式".into()))?;
        debug!(
            "探测到 {} (分数 {}, 读取 {} 字节)",
            result.format_id, result.score, n
        );
        Ok(result)
    }

    /// 探测格式, 创建解封装器并解析头部
    ///
    /// raw video 没有头部, 这样打开会得到 `InvalidArgument`;
    /// 需要用 `RawVideoDemuxer::with_params` 显式给出参数.
    pub fn open_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> SynthResult<Box<dyn Demuxer>> {
        let format_id = self.probe_input(io, filename)?.format_id;
        let mut demuxer = self.create_demuxer(format_id)?;
        demuxer.open(io)?;
        Ok(demuxer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SignatureProbe;

    fn full_registry() -> FormatRegistry {
        let mut reg = FormatRegistry::new();
        crate::register_all(&mut reg);
        reg
    }

    #[test]
    fn test_按注册顺序列举() {
        let reg = full_registry();
        assert_eq!(
            reg.list_muxers(),
            vec![
                (FormatId::RawVideo, "rawvideo"),
                (FormatId::Y4m, "yuv4mpegpipe"),
                (FormatId::H264, "h264"),
            ]
        );
        assert_eq!(reg.list_demuxers().len(), 3);
    }

    #[test]
    fn test_空注册表返回格式未找到() {
        let reg = FormatRegistry::new();
        assert!(matches!(
            reg.create_muxer(FormatId::Y4m),
            Err(SynthError::FormatNotFound(_))
        ));
        assert!(matches!(
            reg.create_demuxer(FormatId::RawVideo),
            Err(SynthError::FormatNotFound(_))
        ));
        assert!(reg.probe(b"YUV4MPEG2", None).is_none());
    }

    #[test]
    fn test_y4m_魔数优先于扩展名() {
        let reg = full_registry();
        let data = b"YUV4MPEG2 W2 H2 F25:1 Ip A1:1 C420jpeg\n";
        let result = reg.probe(data, Some("clip.yuv")).unwrap();
        assert_eq!(result.format_id, FormatId::Y4m);
    }

    #[test]
    fn test_同分时先注册者胜出() {
        let mut reg = FormatRegistry::new();
        reg.register_probe(Box::new(SignatureProbe::with_magic(FormatId::Y4m, b"AB")));
        reg.register_probe(Box::new(SignatureProbe::with_magic(FormatId::RawVideo, b"AB")));
        assert_eq!(reg.probe(b"ABC", None).unwrap().format_id, FormatId::Y4m);
    }

    #[test]
    fn test_raw_仅按扩展名识别() {
        let reg = full_registry();
        let data = [0u8; 64];
        let result = reg.probe(&data, Some("clip.bin")).unwrap();
        assert_eq!(result.format_id, FormatId::RawVideo);
        assert!(reg.probe(&data, None).is_none());
        assert!(reg.probe(&data, Some("clip.hevc")).is_none());
    }

    #[test]
    fn test_h264_起始码识别() {
        let reg = full_registry();
        let data = [0x00, 0x00, 0x00, 0x01, 0x67, 0x42];
        let result = reg.probe(&data, Some("clip.yuv")).unwrap();
        assert_eq!(result.format_id, FormatId::H264);
        assert_eq!(
            reg.probe(&[0x10; 8], Some("clip.264")).unwrap().format_id,
            FormatId::H264
        );
    }

    #[test]
    fn test_识别输入后回到起始位置() {
        let reg = full_registry();
        let mut io = IoContext::from_memory(b"YUV4MPEG2 W2 H2 F25:1 C420jpeg\n".to_vec());
        let result = reg.probe_input(&mut io, None).unwrap();
        assert_eq!(result.format_id, FormatId::Y4m);
        assert_eq!(io.position().unwrap(), 0);
    }

    #[test]
    fn test_raw_无法自动打开() {
        let reg = full_registry();
        let mut io = IoContext::from_memory(vec![0u8; 6]);
        let err = reg.open_input(&mut io, Some("frame.yuv")).err().unwrap();
        assert!(matches!(err, SynthError::InvalidArgument(_)));
    }

    #[test]
    fn test_按文件名创建封装器() {
        let reg = full_registry();
        assert_eq!(
            reg.create_muxer_for_filename("out.y4m").unwrap().format_id(),
            FormatId::Y4m
        );
        assert_eq!(
            reg.create_muxer_for_filename("out.h264").unwrap().format_id(),
            FormatId::H264
        );
        assert!(matches!(
            reg.create_muxer_for_filename("out.hevc"),
            Err(SynthError::FormatNotFound(_))
        ));
    }
}
