//! yuvsynth - 测试图案命令行工具
//!
//! 生成确定性的 YUV 4:2:0 测试图案, 并提供编码、解码与往返校验子命令.

mod commands;
mod logging;
mod options;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use options::PatternArgs;

#[derive(Parser, Debug)]
#[command(name = "yuvsynth", version, about = "确定性 YUV 4:2:0 测试图案工具")]
struct Cli {
    /// 覆盖已存在的输出文件
    #[arg(short = 'y', long, global = true)]
    overwrite: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 把测试图案写入 raw YUV 文件 (扩展名为 .y4m 时写 Y4M)
    Dump {
        /// 输出文件, 默认 yuv420p_<帧数>f_<宽>x<高>.bin
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pattern: PatternArgs,
    },

    /// 编码测试图案并写入输出文件
    Encode {
        /// 编解码器名称 (rawvideo / h264; hevc 不可用)
        #[arg(short, long, default_value = "rawvideo")]
        codec: String,

        /// 输出文件, 容器按扩展名选择, 未知扩展名写裸数据
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pattern: PatternArgs,
    },

    /// 解码输入文件, 把每帧亮度转储为 PGM
    Decode {
        /// 输入文件 (Y4M 与 H.264 裸流自动识别, 其他按 raw video 处理)
        input: PathBuf,

        /// raw video 输入的分辨率 (如 "352x288")
        #[arg(short = 's', long)]
        size: Option<String>,

        /// raw video 输入的帧率 (如 "25" 或 "30000/1001")
        #[arg(short = 'r', long, default_value = "25")]
        rate: String,

        /// PGM 文件名前缀, 默认为去掉扩展名的输入路径
        #[arg(long)]
        prefix: Option<String>,

        /// 只解码, 不写 PGM
        #[arg(long)]
        no_dump: bool,
    },

    /// 分别编码到文件和内存, 两路解码并逐帧校验
    Roundtrip {
        /// 编解码器名称 (rawvideo / h264; hevc 不可用)
        codec: String,

        /// 输出目录
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// 只校验, 不写 PGM
        #[arg(long)]
        no_dump: bool,

        #[command(flatten)]
        pattern: PatternArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("yuvsynth-cli", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overwrite = cli.overwrite;
    match cli.command {
        Command::Dump { output, pattern } => commands::dump(&pattern, output, overwrite),
        Command::Encode {
            codec,
            output,
            pattern,
        } => commands::encode(&pattern, &codec, output, overwrite),
        Command::Decode {
            input,
            size,
            rate,
            prefix,
            no_dump,
        } => commands::decode(&commands::DecodeArgs {
            input,
            size,
            rate,
            prefix,
            dump: !no_dump,
        }),
        Command::Roundtrip {
            codec,
            dir,
            no_dump,
            pattern,
        } => commands::roundtrip(&pattern, &codec, &dir, !no_dump, overwrite),
    }
}
