use anyhow::{bail, Result};
use std::path::PathBuf;

use imgdex::{logging, Config, ImageIndex, RecordSelector, SearchMode};

enum Command {
    Index { path: PathBuf, external_ref: String },
    IndexFolder { dir: PathBuf },
    Similar { path: PathBuf, threshold: Option<u32>, max: Option<usize> },
    Search { keywords: String, mode: SearchMode, max: Option<usize> },
    OcrRun { batch: Option<usize>, retries: Option<u32>, drain: bool },
    SetText { selector: RecordSelector, text: String },
    ClearText { selector: RecordSelector },
    BindRef { content_hash: String, external_ref: String },
    Status,
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    match args.get(*i) {
        Some(v) => Ok(v.clone()),
        None => bail!("{flag} requires a value"),
    }
}

fn parse_selector(args: &[String], i: &mut usize) -> Result<RecordSelector> {
    match args.get(*i).map(String::as_str) {
        Some("--ref") => Ok(RecordSelector::ExternalRef(next_value(args, i, "--ref")?)),
        Some("--hash") => Ok(RecordSelector::ContentHash(next_value(args, i, "--hash")?)),
        _ => bail!("expected --ref REF or --hash HASH"),
    }
}

fn parse_args() -> Result<Cli> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("imgdex {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(next_value(&args, &mut i, "--config")?));
            }
            subcommand => {
                let command = parse_command(subcommand, &args, i)?;
                return Ok(Cli {
                    config_path,
                    command,
                });
            }
        }
        i += 1;
    }

    print_help();
    std::process::exit(1);
}

fn parse_command(name: &str, args: &[String], mut i: usize) -> Result<Command> {
    i += 1;
    match name {
        "index" => {
            let mut path = None;
            let mut external_ref = String::new();
            while i < args.len() {
                match args[i].as_str() {
                    "--ref" => external_ref = next_value(args, &mut i, "--ref")?,
                    p => path = Some(PathBuf::from(p)),
                }
                i += 1;
            }
            match path {
                Some(path) => Ok(Command::Index { path, external_ref }),
                None => bail!("index requires an image path"),
            }
        }
        "index-folder" => match args.get(i) {
            Some(dir) => Ok(Command::IndexFolder {
                dir: PathBuf::from(dir),
            }),
            None => bail!("index-folder requires a directory"),
        },
        "similar" => {
            let mut path = None;
            let mut threshold = None;
            let mut max = None;
            while i < args.len() {
                match args[i].as_str() {
                    "--threshold" => threshold = Some(next_value(args, &mut i, "--threshold")?.parse()?),
                    "--max" => max = Some(next_value(args, &mut i, "--max")?.parse()?),
                    p => path = Some(PathBuf::from(p)),
                }
                i += 1;
            }
            match path {
                Some(path) => Ok(Command::Similar { path, threshold, max }),
                None => bail!("similar requires an image path"),
            }
        }
        "search" => {
            let mut keywords = Vec::new();
            let mut mode = SearchMode::default();
            let mut max = None;
            while i < args.len() {
                match args[i].as_str() {
                    "--mode" => {
                        let value = next_value(args, &mut i, "--mode")?;
                        mode = match value.parse() {
                            Ok(mode) => mode,
                            Err(e) => bail!(e),
                        };
                    }
                    "--max" => max = Some(next_value(args, &mut i, "--max")?.parse()?),
                    word => keywords.push(word.to_string()),
                }
                i += 1;
            }
            if keywords.is_empty() {
                bail!("search requires keywords");
            }
            Ok(Command::Search {
                keywords: keywords.join(" "),
                mode,
                max,
            })
        }
        "ocr-run" => {
            let mut batch = None;
            let mut retries = None;
            let mut drain = false;
            while i < args.len() {
                match args[i].as_str() {
                    "--batch" => batch = Some(next_value(args, &mut i, "--batch")?.parse()?),
                    "--retries" => retries = Some(next_value(args, &mut i, "--retries")?.parse()?),
                    "--drain" => drain = true,
                    other => bail!("unknown ocr-run argument: {other}"),
                }
                i += 1;
            }
            Ok(Command::OcrRun { batch, retries, drain })
        }
        "set-text" => {
            let selector = parse_selector(args, &mut i)?;
            i += 1;
            let text = args[i..].join(" ");
            if text.is_empty() {
                bail!("set-text requires the replacement text");
            }
            Ok(Command::SetText { selector, text })
        }
        "clear-text" => {
            let selector = parse_selector(args, &mut i)?;
            Ok(Command::ClearText { selector })
        }
        "bind-ref" => match (args.get(i), args.get(i + 1)) {
            (Some(hash), Some(external_ref)) => Ok(Command::BindRef {
                content_hash: hash.clone(),
                external_ref: external_ref.clone(),
            }),
            _ => bail!("bind-ref requires CONTENT_HASH and REF"),
        },
        "status" => Ok(Command::Status),
        other => bail!("unknown command: {other}"),
    }
}

fn print_help() {
    println!(
        r#"imgdex - image fingerprinting, OCR and search index

USAGE:
    imgdex [OPTIONS] <COMMAND>

COMMANDS:
    index PATH [--ref REF]                Index one image
    index-folder DIR                      Index every image under a folder
    similar PATH [--threshold N] [--max N]
                                          Find perceptually similar images
    search WORDS.. [--mode M] [--max N]   Search OCR text
                                          (modes: smart, comprehensive, ranked, substring)
    ocr-run [--batch N] [--retries N] [--drain]
                                          Process queued OCR jobs
    set-text (--ref REF | --hash HASH) TEXT
                                          Replace a record's OCR text
    clear-text (--ref REF | --hash HASH)  Clear OCR text and re-queue
    bind-ref CONTENT_HASH REF             Attach an external reference
    status                                Show index counters

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    IMGDEX_LOG          Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/imgdex/config.toml"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args()?;

    let _ = logging::init(None);

    let config = match cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let index = ImageIndex::open(config)?;

    match cli.command {
        Command::Index { path, external_ref } => {
            let id = index.add_image(&path, &external_ref)?;
            println!("indexed {} as record {id}", path.display());
        }
        Command::IndexFolder { dir } => {
            let stats = index.index_folder(&dir)?;
            println!(
                "indexed {} image(s), skipped {} already known, {} failed",
                stats.indexed, stats.skipped, stats.failed
            );
        }
        Command::Similar { path, threshold, max } => {
            let threshold = threshold.unwrap_or(index.config().search.similarity_threshold);
            let max = max.unwrap_or(index.config().search.max_results);
            let matches = index.find_similar(&path, threshold, max)?;
            if matches.is_empty() {
                println!("no similar images");
            }
            for m in matches {
                println!("{:.3}  {}  {}", m.similarity, m.file_path, m.external_ref);
            }
        }
        Command::Search { keywords, mode, max } => {
            let max = max.unwrap_or(index.config().search.max_results);
            let hits = index.search_by_text(&keywords, max, mode)?;
            if hits.is_empty() {
                println!("no matches");
            }
            for hit in hits {
                println!("{}  {}  {}", hit.id, hit.file_path, hit.external_ref);
            }
        }
        Command::OcrRun { batch, retries, drain } => {
            let batch = batch.unwrap_or(index.config().ocr.batch_size);
            let retries = retries.unwrap_or(index.config().ocr.max_retries);
            let stats = if drain {
                index.run_ocr_until_drained(batch, retries)?
            } else {
                index.run_ocr_batch(batch, retries)?
            };
            println!(
                "processed {}: {} succeeded, {} failed, {} skipped",
                stats.processed, stats.succeeded, stats.failed, stats.skipped
            );
        }
        Command::SetText { selector, text } => {
            if index.set_ocr_text(&selector, &text)? {
                println!("text updated");
            } else {
                bail!("no matching record");
            }
        }
        Command::ClearText { selector } => {
            if index.clear_ocr(&selector)? {
                println!("text cleared, record re-queued for OCR");
            } else {
                bail!("no matching record");
            }
        }
        Command::BindRef {
            content_hash,
            external_ref,
        } => {
            if index.bind_external_ref(&content_hash, &external_ref)? {
                println!("reference bound");
            } else {
                bail!("no record with that content hash");
            }
        }
        Command::Status => {
            println!("records: {}", index.store().record_count()?);
            println!("pending OCR: {}", index.pending_ocr_count()?);
        }
    }

    Ok(())
}
