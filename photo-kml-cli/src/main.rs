use anyhow::{Context, Result};
use clap::Parser;
use photo_kml::admission::{file_extension, DEFAULT_MAX_FILE_SIZE};
use photo_kml::{BatchConfig, BatchProcessor, ImageFormat, Upload, ZipHandler};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 入力画像ファイル、ZIPファイル、またはディレクトリ
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// 写真の保存先ディレクトリ
    #[arg(short, long, value_name = "DIR", default_value = "uploads")]
    uploads: PathBuf,

    /// KMLの出力先ファイル（未指定なら --kml-dir に自動命名で保存）
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// KMLの出力先ディレクトリ
    #[arg(long, value_name = "DIR", default_value = "kml_files")]
    kml_dir: PathBuf,

    /// 写真リンクのベースURL（デフォルト: 保存先ディレクトリのパス）
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// KMLドキュメント名
    #[arg(long)]
    name: Option<String>,

    /// 1ファイルあたりの最大サイズ（バイト）
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // 入力パスの処理
    let mut uploads = Vec::new();
    let mut unreadable_inputs = Vec::new();
    for input in &args.inputs {
        let collected =
            collect_uploads(input, args.max_file_size, &mut uploads, &mut unreadable_inputs);
        if let Err(e) = collected {
            error!("Failed to read input {:?}: {:#}", input, e);
            unreadable_inputs.push(format!("{}: {:#}", input.display(), e));
        }
    }

    if uploads.is_empty() {
        anyhow::bail!("No image files found in the given inputs");
    }
    info!("Collected {} uploads", uploads.len());

    let config = BatchConfig {
        upload_dir: args.uploads.clone(),
        kml_dir: args.kml_dir.clone(),
        base_url: args.base_url.clone(),
        document_name: args.name.clone(),
        max_file_size: args.max_file_size,
    };
    let processor = BatchProcessor::new(config);
    let report = processor.process(uploads)?;

    // ファイルごとの結果を表示
    for outcome in &report.outcomes {
        println!("{}: {}", outcome.filename, outcome.status);
    }
    for input in &unreadable_inputs {
        println!("{}", input);
    }

    // KMLの書き出し
    let kml_path = match &args.output {
        Some(path) => {
            write_kml(path, &report.kml)?;
            path.clone()
        }
        None => processor.save(&report)?,
    };

    println!(
        "KML: {} ({} placemarks, {} of {} files stored)",
        kml_path.display(),
        report.located_count(),
        report.records.len(),
        report.outcomes.len()
    );

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    if report.records.is_empty() {
        let failed = report.failures().count();
        anyhow::bail!("None of the {} files could be processed", failed);
    }

    Ok(())
}

fn write_kml(path: &Path, kml: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create output directory {}", parent.display())
        })?;
    }
    fs::write(path, kml).with_context(|| format!("Failed to write KML to {}", path.display()))
}

/// 入力パスを読み込む。ディレクトリ内で読めなかったファイルは `failures` に記録して続行する
fn collect_uploads(
    path: &Path,
    max_file_size: u64,
    uploads: &mut Vec<Upload>,
    failures: &mut Vec<String>,
) -> Result<()> {
    if path.is_file() {
        // 対象外の拡張子もここで読み込み、受付チェックで拒否として報告する
        let kind = input_kind(path).unwrap_or(InputKind::Image);
        uploads.extend(read_input(path, kind, max_file_size)?);
    } else if path.is_dir() {
        // ディレクトリの処理
        info!("Processing directory: {:?}", path);
        for (file, kind) in collect_input_files(path)? {
            match read_input(&file, kind, max_file_size) {
                Ok(found) => uploads.extend(found),
                Err(e) => {
                    error!("Failed to read input {:?}: {:#}", file, e);
                    failures.push(format!("{}: {:#}", file.display(), e));
                }
            }
        }
    } else {
        anyhow::bail!("Input path must be a file or directory");
    }

    Ok(())
}

fn read_input(path: &Path, kind: InputKind, max_file_size: u64) -> Result<Vec<Upload>> {
    match kind {
        InputKind::Zip => {
            info!("Processing ZIP file: {:?}", path);
            let handler = ZipHandler::new(path).with_max_entry_size(max_file_size);
            Ok(handler.read_uploads()?)
        }
        InputKind::Image => Ok(vec![read_upload(path, max_file_size)?]),
    }
}

/// 上限を超えるファイルは `max_file_size + 1` バイトまでしか読まない
fn read_upload(path: &Path, max_file_size: u64) -> Result<Upload> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut bytes = Vec::new();
    file.take(max_file_size.saturating_add(1))
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(filename, bytes))
}

fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, InputKind)>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    // 実行ごとに処理順が変わらないように並べる
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            // サブディレクトリを再帰的に探索
            files.extend(collect_input_files(&path)?);
        } else if let Some(kind) = input_kind(&path) {
            files.push((path, kind));
        } else {
            debug!("Skipping {:?}", path);
        }
    }

    Ok(files)
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let name = path.file_name()?.to_str()?;
    let ext = file_extension(name)?;
    if ext.eq_ignore_ascii_case("zip") {
        Some(InputKind::Zip)
    } else {
        ImageFormat::from_extension(ext).map(|_| InputKind::Image)
    }
}

#[derive(Debug, Clone, Copy)]
enum InputKind {
    Image,
    Zip,
}
