//! 命令行参数与配置分层.
//!
//! 优先级: 命令行参数 > `--config` JSON 文件 > 内置默认值.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use yuvsynth_core::Rational;
use yuvsynth_pattern::{ChromaFill, PatternConfig};

/// 图案参数 (dump / encode / roundtrip 共用)
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct PatternArgs {
    /// 宽度 (像素, 正偶数)
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// 高度 (像素, 正偶数)
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// 帧数
    #[arg(short = 'd', long)]
    pub depth: Option<u32>,

    /// 帧率 (fps)
    #[arg(long)]
    pub rate: Option<u32>,

    /// 色度填充策略 (neutral / gradient)
    #[arg(long)]
    pub chroma: Option<ChromaFill>,

    /// JSON 配置文件, 命令行参数会覆盖其中的同名字段
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 使用多线程生成 (输出与单线程一致)
    #[arg(long)]
    pub parallel: bool,
}

impl PatternArgs {
    /// 合并配置文件与命令行参数, 并校验结果
    pub fn resolve(&self) -> Result<PatternConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => PatternConfig::default(),
        };
        self.apply_overrides(&mut config);
        config
            .validate()
            .with_context(|| format!("无效的图案配置: {:?}", config))?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut PatternConfig) {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(rate) = self.rate {
            config.frame_rate = rate;
        }
        if let Some(chroma) = self.chroma {
            config.chroma = chroma;
        }
    }
}

/// 读取 JSON 配置文件, 缺省字段取默认值
pub(crate) fn load_config(path: &Path) -> Result<PatternConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("解析配置文件失败: {}", path.display()))
}

/// 解析分辨率字符串 (如 "352x288")
pub(crate) fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// 解析帧率字符串 (如 "25" 或 "30000/1001")
pub(crate) fn parse_rate(s: &str) -> Option<Rational> {
    s.parse::<Rational>().ok().filter(Rational::is_positive)
}
