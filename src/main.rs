use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use facewatch::config::Config;
use facewatch::db::{Database, Metadata};
use facewatch::export::{export_gallery, ExportFormat};
use facewatch::faces::{enroll_from_image, providers, Matcher};
use facewatch::session::{Session, SessionOptions, StopReason};
use facewatch::{camera, display, logging};

#[derive(Debug)]
enum Command {
    Run,
    Enroll {
        label: String,
        image: PathBuf,
        meta: Vec<(String, String)>,
    },
    List,
    Delete {
        label: String,
    },
    Export {
        path: PathBuf,
        format: Option<ExportFormat>,
    },
    #[cfg(feature = "postgres")]
    Migrate {
        sqlite_path: Option<PathBuf>,
    },
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("Run 'facewatch --help' for usage.");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();
    let mut meta = Vec::new();
    let mut format = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("facewatch {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            "--meta" | "-m" => {
                if i + 1 < args.len() {
                    match args[i + 1].split_once('=') {
                        Some((key, value)) if !key.is_empty() => {
                            meta.push((key.to_string(), value.to_string()));
                        }
                        _ => usage_error("--meta expects KEY=VALUE"),
                    }
                    i += 1;
                } else {
                    usage_error("--meta requires a KEY=VALUE argument");
                }
            }
            "--format" | "-f" => {
                if i + 1 < args.len() {
                    match ExportFormat::parse(&args[i + 1]) {
                        Ok(f) => format = Some(f),
                        Err(e) => usage_error(&e.to_string()),
                    }
                    i += 1;
                } else {
                    usage_error("--format requires json or csv");
                }
            }
            arg if arg.starts_with('-') => usage_error(&format!("Unknown argument: {}", arg)),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("run") => Command::Run,
        Some("enroll") => {
            let (Some(label), Some(image)) = (positional.next(), positional.next()) else {
                usage_error("enroll requires LABEL and IMAGE");
            };
            Command::Enroll {
                label,
                image: PathBuf::from(image),
                meta,
            }
        }
        Some("list") => Command::List,
        Some("delete") => {
            let Some(label) = positional.next() else {
                usage_error("delete requires LABEL");
            };
            Command::Delete { label }
        }
        Some("export") => {
            let Some(path) = positional.next() else {
                usage_error("export requires PATH");
            };
            Command::Export {
                path: PathBuf::from(path),
                format,
            }
        }
        #[cfg(feature = "postgres")]
        Some("migrate") => Command::Migrate {
            sqlite_path: positional.next().map(PathBuf::from),
        },
        Some(other) => usage_error(&format!("Unknown command: {}", other)),
    };

    if let Some(extra) = positional.next() {
        usage_error(&format!("Unexpected argument: {}", extra));
    }

    Args {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"facewatch - live face identity matching

USAGE:
    facewatch [OPTIONS] [COMMAND]

COMMANDS:
    run                         Start a live session (default)
    enroll LABEL IMAGE          Enroll the single face in IMAGE under LABEL
        --meta, -m KEY=VALUE    Attach metadata (repeatable)
    list                        List enrolled identities
    delete LABEL                Remove every entry with exactly this label
    export PATH                 Export the gallery
        --format, -f FORMAT     json or csv (default: from extension)
    migrate [SQLITE_PATH]       Copy a SQLite gallery into PostgreSQL
                                (requires the postgres feature)

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

SESSION KEYS:
    r                   Reload the gallery from the store
    q, Esc, Ctrl-C      Quit

ENVIRONMENT:
    FACEWATCH_CONFIG    Path to config file (overrides default location)
    FACEWATCH_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/facewatch/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match args.command {
        Command::Run => run_session(&config),
        Command::Enroll { label, image, meta } => enroll(&config, &label, image, meta),
        Command::List => list(&config),
        Command::Delete { label } => delete(&config, &label),
        Command::Export { path, format } => export(&config, path, format),
        #[cfg(feature = "postgres")]
        Command::Migrate { sqlite_path } => migrate(&config, sqlite_path),
    }
}

fn run_session(config: &Config) -> Result<()> {
    let matcher = Matcher::new(config.matching.tolerance)?;
    let embedder = providers::select(&config.detector)?;
    let camera = camera::from_config(&config.camera)?;
    let sink = display::from_config(&config.display)?;

    let session = Session::open(
        camera,
        &config.store,
        embedder,
        sink,
        matcher,
        SessionOptions::from_config(config),
    )
    .context("Failed to start session")?;

    let report = session.run()?;

    println!(
        "Stopped after {} frames ({:.1} fps average): {} faces, {} unknown, {} skipped frames",
        report.frames,
        report.average_fps,
        report.faces_seen,
        report.unknown,
        report.skipped_frames
    );
    for (label, count) in &report.recognized {
        println!("  {:<24} {}", label, count);
    }
    if let StopReason::CameraReadFailed(reason) = &report.stop_reason {
        eprintln!("Camera stopped delivering frames: {}", reason);
    }

    Ok(())
}

fn enroll(config: &Config, label: &str, image: PathBuf, meta: Vec<(String, String)>) -> Result<()> {
    let db = Database::open(&config.store)?;
    let mut embedder = providers::select(&config.detector)?;

    let metadata: Metadata = meta
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let id = enroll_from_image(&db, embedder.as_mut(), label, &image, metadata)?;
    println!("Enrolled {} from {} (entry {})", label.trim(), image.display(), id);

    db.close()?;
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let db = Database::open(&config.store)?;
    let labels = db.labels()?;

    if labels.is_empty() {
        println!("Gallery is empty");
    } else {
        println!("{:<32} {}", "LABEL", "ENTRIES");
        for (label, count) in &labels {
            println!("{:<32} {}", label, count);
        }
        println!("\n{} identities, {} entries", labels.len(), db.count()?);
    }

    db.close()?;
    Ok(())
}

fn delete(config: &Config, label: &str) -> Result<()> {
    let db = Database::open(&config.store)?;
    let deleted = db.delete_by_label(label)?;

    if deleted == 0 {
        println!("No entries labelled {:?}", label);
    } else {
        println!("Deleted {} entries labelled {:?}", deleted, label);
    }

    db.close()?;
    Ok(())
}

fn export(config: &Config, path: PathBuf, format: Option<ExportFormat>) -> Result<()> {
    let format = format.unwrap_or_else(|| ExportFormat::from_path(&path));
    let db = Database::open(&config.store)?;

    let count = export_gallery(&db, &path, format)
        .with_context(|| format!("Failed to export gallery to {}", path.display()))?;
    println!("Exported {} entries as {} to {}", count, format.name(), path.display());

    db.close()?;
    Ok(())
}

#[cfg(feature = "postgres")]
fn migrate(config: &Config, sqlite_path: Option<PathBuf>) -> Result<()> {
    let sqlite_path = sqlite_path.unwrap_or_else(|| config.store.sqlite_path.clone());
    let url = config
        .store
        .postgresql_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("store.postgresql_url must be set to migrate"))?;

    let count = facewatch::db::migrate::migrate_sqlite_to_postgres(&sqlite_path, url)?;
    println!("Migrated {} entries from {}", count, sqlite_path.display());
    Ok(())
}
