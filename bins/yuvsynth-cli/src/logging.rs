//! 日志初始化模块.
//!
//! 双输出:
//! - console: 彩色, 默认 info, -v 提升到 debug
//! - file: 无色, 默认 info, 可通过 -v/-vv 或 YUVSYNTH_LOG 环境变量调整
//!
//! 日志文件输出到 $cwd/logs/{prefix}.{date}.log, 按天滚动.
//! 启动时整理历史日志: 早于保留期的删除, 之前日期的压缩为 .gz.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 日志目录
const LOG_DIR: &str = "logs";
/// 历史日志保留天数
const RETENTION_DAYS: i64 = 14;
/// 文件日志级别的环境变量
const LOG_ENV: &str = "YUVSYNTH_LOG";

/// 初始化日志系统
///
/// - `file_prefix`: 日志文件前缀 (如 "yuvsynth-cli")
/// - `verbosity`: 0=info, 1=debug, 2+=trace (由 -v/-vv 控制)
pub fn init(file_prefix: &str, verbosity: u8) -> Result<()> {
    fs::create_dir_all(LOG_DIR).with_context(|| format!("创建日志目录失败: {}", LOG_DIR))?;

    // 整理失败不影响本次运行
    let maintenance = maintain_history(Path::new(LOG_DIR), file_prefix, RETENTION_DAYS, today());

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build(LOG_DIR)
        .context("创建日志文件失败")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let console_filter = EnvFilter::new(if verbosity == 0 { "info" } else { "debug" });
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormatter::Console)
        .with_filter(console_filter);

    let file_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LineFormatter::File)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("初始化日志订阅器失败: {e}"))?;

    tracing::debug!(
        "日志文件: {}",
        log_path(Path::new(LOG_DIR), file_prefix, today()).display()
    );

    match maintenance {
        Ok(report) if report.removed + report.compressed > 0 => tracing::debug!(
            "历史日志整理: 删除 {} 个, 压缩 {} 个",
            report.removed,
            report.compressed
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!("历史日志整理失败: {e:#}"),
    }
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 历史日志整理结果
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct MaintenanceReport {
    /// 删除的文件数
    pub removed: usize,
    /// 压缩的文件数
    pub compressed: usize,
}

/// 构造某一天的日志文件路径: `{dir}/{prefix}.{YYYY-MM-DD}.log`
pub(crate) fn log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

/// 解析日志文件名, 返回 (日期, 是否已压缩)
fn parse_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date, compressed) = match rest.strip_suffix(".log.gz") {
        Some(date) => (date, true),
        None => (rest.strip_suffix(".log")?, false),
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

/// 整理历史日志
///
/// 早于 `today - retention_days` 的文件删除; 今天之前的未压缩文件压缩为 `.log.gz`.
pub(crate) fn maintain_history(
    directory: &Path,
    prefix: &str,
    retention_days: i64,
    today: NaiveDate,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    if !directory.exists() {
        return Ok(report);
    }
    let cutoff = today - Duration::days(retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_log_name(&file_name, prefix) else {
            continue;
        };
        let path = entry.path();

        if date < cutoff {
            fs::remove_file(&path)
                .with_context(|| format!("删除过期日志失败: {}", path.display()))?;
            report.removed += 1;
        } else if !compressed && date < today {
            compress_to_gz(&path)?;
            report.compressed += 1;
        }
    }
    Ok(report)
}

/// 把日志文件压缩为同名 `.gz` 并删除原文件
fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败: {}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败: {}", gz_path.display()))?;

    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)?;
    Ok(())
}

/// 单行日志格式
///
/// console 只带时刻并按级别着色; 文件带完整日期与 target, 不着色.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineFormatter {
    Console,
    File,
}

impl LineFormatter {
    fn level_color(level: tracing::Level) -> &'static str {
        match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }

    /// 行首: 时间 + 级别 (+ target)
    fn prefix(self, now: DateTime<Local>, level: tracing::Level, target: &str) -> String {
        match self {
            Self::Console => format!(
                "[{}] {}{:5}\x1b[0m > ",
                now.format("%H:%M:%S%.3f"),
                Self::level_color(level),
                level
            ),
            Self::File => format!(
                "[{}] {:5} {} > ",
                now.format("%Y-%m-%d %H:%M:%S%.3f"),
                level,
                target
            ),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let prefix = self.prefix(Local::now(), *meta.level(), meta.target());
        write!(writer, "{}", prefix)?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
