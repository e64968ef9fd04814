//! Kumiki command-line binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kumiki_cache::{ArtifactKind, CacheError, CacheStatus, Caches};
use kumiki_media::FfmpegEncoder;
use kumiki_models::{validate_assets, validate_project, Project};
use kumiki_render::{load_project, RenderConfig, RenderError, RenderOptions, Renderer, Services};

#[derive(Parser)]
#[command(name = "kumiki", version, about = "Assemble videos from declarative scene lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a project file to a video
    Render {
        project: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Scenes rendered at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Parent directory for scratch files
        #[arg(long)]
        temp_dir: Option<PathBuf>,
        /// Keep scratch files after the render
        #[arg(long)]
        keep_temp: bool,
    },
    /// Check a project file without rendering
    Validate { project: PathBuf },
    /// Print the JSON Schema of the project format
    Schema,
    /// Inspect or clear the generation caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Status {
        #[arg(long)]
        kind: Option<ArtifactKind>,
    },
    Clear {
        /// Only remove entries unused for this many days
        #[arg(long)]
        older_than_days: Option<i64>,
        #[arg(long)]
        kind: Option<ArtifactKind>,
    },
}

#[tokio::main]
async fn main() {
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = RenderConfig::from_env();
    debug!("Render config: {:?}", config);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("error[{}]: {:#}", error_code(&e), e);
        std::process::exit(1);
    }
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "kumiki=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(command: Command, config: RenderConfig) -> anyhow::Result<()> {
    match command {
        Command::Render {
            project,
            output,
            concurrency,
            temp_dir,
            keep_temp,
        } => {
            let mut options = RenderOptions::new(output, &config).keep_temp(keep_temp);
            if let Some(n) = concurrency {
                options = options.with_concurrency(n);
            }
            if let Some(dir) = temp_dir {
                options = options.with_temp_dir(dir);
            }
            options = options.with_progress(|percent| debug!(percent, "Render progress"));

            let services = Services::from_config(&config)?;
            services.caches.initialize().await?;
            let outcome = Renderer::new(services)
                .render_file(&project, &options)
                .await?;

            info!(
                scenes = outcome.scenes,
                narrated = outcome.narrated_scenes,
                music = outcome.has_music,
                duration = outcome.duration,
                "Render finished"
            );
            println!("{}", outcome.output.display());
        }
        Command::Validate { project: path } => {
            let project = load_project(&path).await?;
            let mut issues = validate_project(&project);
            issues.extend(validate_assets(&project));
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("  {}", issue);
                }
                return Err(RenderError::Validation(issues).into());
            }
            println!(
                "{}: {} scenes, {:.1}s",
                path.display(),
                project.scenes.len(),
                project.total_duration()
            );
        }
        Command::Schema => {
            let schema = schemars::schema_for!(Project);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Cache { action } => {
            let caches = Caches::open(&config.cache_dir, Arc::new(FfmpegEncoder::default()));
            match action {
                CacheAction::Status { kind } => {
                    for kind in selected(kind) {
                        print_status(&caches.get(kind).status().await?);
                    }
                }
                CacheAction::Clear {
                    older_than_days,
                    kind,
                } => {
                    let older_than = older_than_days
                        .map(|days| {
                            chrono::Duration::try_days(days)
                                .filter(|_| days >= 0)
                                .with_context(|| format!("invalid day count {}", days))
                        })
                        .transpose()?;
                    for kind in selected(kind) {
                        let removed = caches.get(kind).clear(older_than).await?;
                        println!("{}: removed {} entries", kind, removed);
                    }
                }
            }
        }
    }
    Ok(())
}

fn selected(kind: Option<ArtifactKind>) -> Vec<ArtifactKind> {
    match kind {
        Some(kind) => vec![kind],
        None => ArtifactKind::ALL.to_vec(),
    }
}

fn print_status(status: &CacheStatus) {
    let date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "{:<10} {:>5} entries {:>10}  oldest {}  newest {}  {}",
        status.kind.as_str(),
        status.entries,
        format_bytes(status.size.total_bytes),
        date(status.oldest),
        date(status.newest),
        status.dir.display()
    );
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<RenderError>() {
        e.code()
    } else if err.downcast_ref::<CacheError>().is_some() {
        "CACHE_ERROR"
    } else if err.downcast_ref::<serde_json::Error>().is_some() {
        "PARSE_ERROR"
    } else {
        "ERROR"
    }
}
