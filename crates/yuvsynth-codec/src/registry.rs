//! 编解码器注册表.
//!
//! 按 [`CodecId`] 保存工厂函数, 查找时取最先注册的实现.
//! 只登记了标识符而没有实现的编解码器 (H.264 / HEVC) 返回 `CodecNotFound`.

use yuvsynth_core::{SynthError, SynthResult};

use crate::codec_id::CodecId;
use crate::decoder::Decoder;
use crate::encoder::Encoder;

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> SynthResult<Box<dyn Decoder>>;

/// 编码器工厂函数类型
pub type EncoderFactory = fn() -> SynthResult<Box<dyn Encoder>>;

/// 按注册顺序保存的工厂表
struct FactoryTable<F> {
    entries: Vec<(CodecId, &'static str, F)>,
}

impl<F: Copy> FactoryTable<F> {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn register(&mut self, codec_id: CodecId, name: &'static str, factory: F) {
        self.entries.push((codec_id, name, factory));
    }

    fn find(&self, codec_id: CodecId) -> Option<F> {
        self.entries
            .iter()
            .find(|(id, _, _)| *id == codec_id)
            .map(|(_, _, factory)| *factory)
    }

    fn list(&self) -> Vec<(CodecId, &'static str)> {
        self.entries.iter().map(|(id, name, _)| (*id, *name)).collect()
    }

    fn not_found(&self, codec_id: CodecId, kind: &str) -> SynthError {
        let available: Vec<&str> = self.entries.iter().map(|(_, name, _)| *name).collect();
        SynthError::CodecNotFound(format!(
            "未找到 {} 的{} (可用: {})",
            codec_id,
            kind,
            if available.is_empty() {
                "无".to_string()
            } else {
                available.join(", ")
            }
        ))
    }
}

/// 编解码器注册表
pub struct CodecRegistry {
    decoders: FactoryTable<DecoderFactory>,
    encoders: FactoryTable<EncoderFactory>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub const fn new() -> Self {
        Self {
            decoders: FactoryTable::new(),
            encoders: FactoryTable::new(),
        }
    }

    /// 注册一个解码器
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: &'static str,
        factory: DecoderFactory,
    ) {
        self.decoders.register(codec_id, name, factory);
    }

    /// 注册一个编码器
    pub fn register_encoder(
        &mut self,
        codec_id: CodecId,
        name: &'static str,
        factory: EncoderFactory,
    ) {
        self.encoders.register(codec_id, name, factory);
    }

    /// 创建解码器实例
    pub fn create_decoder(&self, codec_id: CodecId) -> SynthResult<Box<dyn Decoder>> {
        let factory = self
            .decoders
            .find(codec_id)
            .ok_or_else(|| self.decoders.not_found(codec_id, "解码器"))?;
        factory()
    }

    /// 创建编码器实例
    pub fn create_encoder(&self, codec_id: CodecId) -> SynthResult<Box<dyn Encoder>> {
        let factory = self
            .encoders
            .find(codec_id)
            .ok_or_else(|| self.encoders.not_found(codec_id, "编码器"))?;
        factory()
    }

    pub fn has_decoder(&self, codec_id: CodecId) -> bool {
        self.decoders.find(codec_id).is_some()
    }

    pub fn has_encoder(&self, codec_id: CodecId) -> bool {
        self.encoders.find(codec_id).is_some()
    }

    /// 已注册的解码器 (按注册顺序)
    pub fn list_decoders(&self) -> Vec<(CodecId, &'static str)> {
        self.decoders.list()
    }

    /// 已注册的编码器 (按注册顺序)
    pub fn list_encoders(&self) -> Vec<(CodecId, &'static str)> {
        self.encoders.list()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
