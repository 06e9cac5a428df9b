//! pcmogg-cli - PCM 到 Ogg/Vorbis 命令行工具
//!
//! - `encode`: 原始 f32 小端交错 PCM → .ogg
//! - `inspect`: 列出 Ogg 文件的页面并校验流结构

mod logging;

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use pcmogg::{EncodeRequest, EncodeSettings, encode_with_settings};
use pcmogg_codec::{MAX_QUALITY, MIN_QUALITY};
use pcmogg_format::{OggPage, PageFlags, parse_pages, validate_stream};

#[derive(Parser, Debug)]
#[command(name = "pcmogg-cli", version, about = "纯 Rust PCM 到 Ogg/Vorbis 编码工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 日志级别 (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 日志文件目录, 不指定时只输出到控制台
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 编码原始 f32le 交错 PCM
    Encode(EncodeArgs),
    /// 查看 Ogg 文件的页面
    Inspect(InspectArgs),
}

#[derive(clap::Args, Debug)]
struct EncodeArgs {
    /// 输入文件 (f32 小端, 按声道交错)
    input: PathBuf,

    /// 输出文件
    #[arg(short, long)]
    output: PathBuf,

    /// 声道数
    #[arg(short, long, default_value_t = 2)]
    channels: i32,

    /// 采样率 (Hz)
    #[arg(short = 'r', long, default_value_t = 44100)]
    rate: i64,

    /// 质量 [-0.1, 1.0]
    #[arg(short, long, default_value_t = 0.5, allow_hyphen_values = true)]
    quality: f32,

    /// 平均码率 (比特/秒), 设置后覆盖 --quality
    #[arg(short, long)]
    bitrate: Option<u32>,

    /// 固定流序列号
    #[arg(long)]
    serial: Option<u32>,

    /// JSON 配置文件, 命令行参数优先
    #[arg(long)]
    config: Option<PathBuf>,

    /// 追加注释标签 (KEY=value), 可重复
    #[arg(long = "comment")]
    comments: Vec<String>,

    /// 覆盖已存在的输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,
}

#[derive(clap::Args, Debug)]
struct InspectArgs {
    /// Ogg 文件
    input: PathBuf,

    /// 输出 JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("pcmogg-cli", cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    let result = match &cli.command {
        Command::Encode(args) => run_encode(args),
        Command::Inspect(args) => run_inspect(args),
    };
    if let Err(e) = result {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

/// 读取 f32 小端采样
fn read_f32le(path: &Path) -> Result<Vec<f32>> {
    let raw = fs::read(path).with_context(|| format!("读取输入失败: {}", path.display()))?;
    if raw.len() % 4 != 0 {
        bail!("输入长度 {} 不是 4 的整数倍, 不是 f32 PCM", raw.len());
    }
    let mut samples = vec![0.0f32; raw.len() / 4];
    Cursor::new(&raw).read_f32_into::<LittleEndian>(&mut samples)?;
    Ok(samples)
}

fn run_encode(args: &EncodeArgs) -> Result<()> {
    if args.output.exists() && !args.overwrite {
        bail!("输出文件已存在: {} (使用 -y 覆盖)", args.output.display());
    }
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&args.quality) {
        bail!("质量 {} 超出范围 [{MIN_QUALITY}, {MAX_QUALITY}]", args.quality);
    }

    let mut settings = match &args.config {
        Some(path) => EncodeSettings::from_json_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => EncodeSettings::default(),
    };
    if args.serial.is_some() {
        settings.serial = args.serial;
    }
    if args.bitrate.is_some() {
        settings.average_bitrate = args.bitrate;
    }
    settings.comments.extend(args.comments.iter().cloned());
    debug!("编码配置: {settings:?}");

    let samples = read_f32le(&args.input)?;
    info!(
        "输入 {}: {} 个采样, {} 声道, {} Hz",
        args.input.display(),
        samples.len(),
        args.channels,
        args.rate
    );

    let started = Instant::now();
    let request = EncodeRequest::new(&samples, args.channels, args.rate, args.quality);
    let output = encode_with_settings(&request, &settings).context("编码失败")?;
    let elapsed = started.elapsed();

    fs::write(&args.output, output.as_bytes())
        .with_context(|| format!("写入输出失败: {}", args.output.display()))?;

    let seconds = output.frames() as f64 / args.rate as f64;
    let kbps = if seconds > 0.0 {
        output.len() as f64 * 8.0 / seconds / 1000.0
    } else {
        0.0
    };
    println!(
        "{} → {}: {:.2} 秒, {} 字节, {:.1} kbps, 序列号 0x{:08X}, 用时 {:.2?}",
        args.input.display(),
        args.output.display(),
        seconds,
        output.len(),
        kbps,
        output.serial(),
        elapsed
    );
    Ok(())
}

/// 页面信息 (JSON 输出)
#[derive(Serialize)]
struct PageInfo {
    offset: usize,
    sequence: u32,
    granule_position: i64,
    flags: String,
    segments: usize,
    body_size: usize,
    packets: usize,
}

/// 检查结果 (JSON 输出)
#[derive(Serialize)]
struct InspectOutput {
    file: String,
    serial: u32,
    pages: Vec<PageInfo>,
    packets: usize,
    last_granule: i64,
}

fn flag_string(flags: PageFlags) -> String {
    let mut s = String::with_capacity(3);
    s.push(if flags.contains(PageFlags::CONTINUED) { 'c' } else { '-' });
    s.push(if flags.contains(PageFlags::FIRST) { 'b' } else { '-' });
    s.push(if flags.contains(PageFlags::LAST) { 'e' } else { '-' });
    s
}

fn page_info(page: &OggPage) -> PageInfo {
    PageInfo {
        offset: page.offset,
        sequence: page.sequence,
        granule_position: page.granule_position,
        flags: flag_string(page.flags),
        segments: page.lacing.len(),
        body_size: page.body.len(),
        packets: page.packets_completed(),
    }
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let data =
        fs::read(&args.input).with_context(|| format!("读取失败: {}", args.input.display()))?;
    let pages = parse_pages(&data).context("页面解析失败")?;
    let summary = validate_stream(&pages).context("流结构校验失败")?;

    let output = InspectOutput {
        file: args.input.display().to_string(),
        serial: summary.serial,
        pages: pages.iter().map(page_info).collect(),
        packets: summary.packets,
        last_granule: summary.last_granule,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("文件: {}", output.file);
    println!("序列号: 0x{:08X}", output.serial);
    println!(
        "{:>10} {:>6} {:>12} {:>5} {:>4} {:>6} {:>4}",
        "偏移", "序号", "granule", "标志", "段", "字节", "包"
    );
    for p in &output.pages {
        println!(
            "{:>10} {:>6} {:>12} {:>5} {:>4} {:>6} {:>4}",
            p.offset,
            p.sequence,
            p.granule_position,
            p.flags,
            p.segments,
            p.body_size,
            p.packets
        );
    }
    println!(
        "共 {} 页, {} 个包, 最后 granule {}",
        output.pages.len(),
        output.packets,
        output.last_granule
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_标志字符串() {
        assert_eq!(flag_string(PageFlags::FIRST), "-b-");
        assert_eq!(flag_string(PageFlags::CONTINUED | PageFlags::LAST), "c-e");
        assert_eq!(flag_string(PageFlags::empty()), "---");
    }

    #[test]
    fn test_读取_f32le() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.f32");
        let mut raw = Vec::new();
        for v in [0.5f32, -1.0, 0.25] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(&path, &raw).unwrap();
        assert_eq!(read_f32le(&path).unwrap(), vec![0.5, -1.0, 0.25]);

        fs::write(&path, [0u8; 5]).unwrap();
        assert!(read_f32le(&path).is_err());
    }

    #[test]
    fn test_命令行解析() {
        let cli = Cli::try_parse_from([
            "pcmogg-cli", "encode", "in.f32", "-o", "out.ogg", "-c", "1", "-r", "22050", "-q",
            "-0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.channels, 1);
                assert_eq!(args.rate, 22050);
                assert_eq!(args.quality, -0.1);
            }
            Command::Inspect(_) => panic!("应解析为 encode"),
        }
    }
}
