use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use depthcap::{
    raster::inspect_depth_raster, CaptureSession, CapturedFrame, ColorBuffer, DepthBuffer,
    DepthcapConfig, FrameDisposition, FrameIntrinsics, Manifest, PixelFormat, ProjectCatalog,
    Transform,
};

#[derive(Parser, Debug)]
#[command(name = "depthcap")]
#[command(about = "Depth capture dataset writer and project catalog")]
#[command(version)]
#[command(long_about = "Records synchronized color, depth and camera pose frames into \
project directories with a transforms.json manifest, packages them into zip archives, \
and manages previously recorded projects.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "depthcap.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List recorded projects, newest first
    List,
    /// Show the summary and manifest details of a project
    Inspect { project: String },
    /// Archive a project into <project>.zip next to it
    Export { project: String },
    /// Delete a project directory
    Delete { project: String },
    /// Report dimensions and value range of a depth TIFF
    DepthInfo { file: PathBuf },
    /// Record a synthetic session end to end
    Synthetic {
        #[arg(long, default_value_t = 10)]
        frames: usize,
        /// Keep the project directory instead of archiving it
        #[arg(long)]
        no_archive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting depthcap v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match DepthcapConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().context("Invalid configuration")?;

    let catalog = ProjectCatalog::from_config(&config);
    match args.command.unwrap_or(Command::List) {
        Command::List => list_projects(&catalog).await,
        Command::Inspect { project } => inspect_project(&catalog, &project).await,
        Command::Export { project } => {
            let archive = catalog.export_project(&project).await?;
            println!("{}", archive.display());
            Ok(())
        }
        Command::Delete { project } => {
            let freed = catalog.delete_project(&project).await?;
            println!(
                "Deleted {} ({})",
                project,
                depthcap::catalog::format_size(freed)
            );
            Ok(())
        }
        Command::DepthInfo { file } => depth_info(&file).await,
        Command::Synthetic { frames, no_archive } => {
            let archive = config.archive.enabled && !no_archive;
            record_synthetic(&config, frames, archive).await
        }
    }
}

async fn list_projects(catalog: &ProjectCatalog) -> Result<()> {
    let projects = catalog.list_projects().await?;
    if projects.is_empty() {
        println!("No projects in {}", catalog.root().display());
        return Ok(());
    }

    for project in projects {
        println!(
            "{:<16} {:>6} frames {:>10}  {}",
            project.name,
            project.frame_count,
            project.human_size(),
            project.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

async fn inspect_project(catalog: &ProjectCatalog, name: &str) -> Result<()> {
    let path = catalog.project_path(name);
    let summary = catalog
        .summarize(&path)
        .await
        .with_context(|| format!("Failed to read project {}", path.display()))?;
    let manifest = Manifest::load(&path.join(depthcap::manifest::MANIFEST_FILE_NAME)).await?;
    let intrinsics = &manifest.intrinsics;

    println!("Project:    {}", summary.name);
    println!("Path:       {}", summary.path.display());
    println!("Created:    {}", summary.created_at.to_rfc3339());
    println!("Frames:     {}", summary.frame_count);
    println!("Size:       {}", summary.human_size());
    println!("Profile:    {:?}", manifest.profile);
    println!(
        "Intrinsics: {}x{} fl=({:.2}, {:.2}) c=({:.2}, {:.2})",
        intrinsics.w, intrinsics.h, intrinsics.fl_x, intrinsics.fl_y, intrinsics.cx, intrinsics.cy
    );
    match &summary.thumbnail {
        Some(thumbnail) => {
            let (w, h) = thumbnail.dimensions();
            println!("Thumbnail:  {}x{}", w, h);
        }
        None => println!("Thumbnail:  none"),
    }
    Ok(())
}

async fn depth_info(file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let info = inspect_depth_raster(&bytes)?;

    println!("Size:   {}x{}", info.width, info.height);
    println!(
        "Finite: {} of {}",
        info.finite_count,
        info.width as usize * info.height as usize
    );
    match (info.min, info.max) {
        (Some(min), Some(max)) => println!("Range:  {:.4} .. {:.4} m", min, max),
        _ => println!("Range:  no finite samples"),
    }
    Ok(())
}

/// Drive a full session with generated NV12 color and ramp depth frames
async fn record_synthetic(config: &DepthcapConfig, frames: usize, archive: bool) -> Result<()> {
    const WIDTH: u32 = 192;
    const HEIGHT: u32 = 144;
    const DEPTH_WIDTH: u32 = 64;
    const DEPTH_HEIGHT: u32 = 48;

    let session = CaptureSession::new(config.capture.clone(), config.archive.clone());
    let handle = session.start().await?;
    info!("Recording {} synthetic frames into {}", frames, handle.root.display());

    let interval = (config.capture.min_frame_interval_ms as f64 / 1000.0).max(1.0 / 30.0) * 1.5;
    for i in 0..frames {
        let shade = ((i * 16) % 256) as u8;
        let luma_len = (WIDTH * HEIGHT) as usize;
        let mut color = vec![shade; luma_len];
        color.extend(std::iter::repeat(128u8).take(luma_len / 2));

        let depth = (0..DEPTH_WIDTH * DEPTH_HEIGHT)
            .map(|p| 0.5 + (p % DEPTH_WIDTH) as f32 * 0.05 + i as f32 * 0.01)
            .collect();

        let mut transform = Transform::IDENTITY;
        transform.0[0][3] = i as f32 * 0.05;

        let frame = CapturedFrame {
            color: ColorBuffer::new(WIDTH, HEIGHT, PixelFormat::Nv12, color),
            depth: DepthBuffer::new(DEPTH_WIDTH, DEPTH_HEIGHT, depth),
            intrinsics: FrameIntrinsics {
                fx: 160.0,
                fy: 160.0,
                cx: WIDTH as f32 / 2.0,
                cy: HEIGHT as f32 / 2.0,
                width: WIDTH,
                height: HEIGHT,
            },
            transform,
            timestamp: i as f64 * interval,
        };

        match session.add_frame(frame)? {
            FrameDisposition::Queued => {}
            FrameDisposition::Throttled => info!("Synthetic frame {} throttled", i),
            FrameDisposition::Dropped => info!("Synthetic frame {} dropped", i),
        }
    }

    let project = session.finalize(archive).await?;
    let stats = session.stats();
    println!(
        "Recorded {} frames ({} failed, {} dropped) into {}",
        project.frame_count,
        stats.frames_failed,
        stats.frames_dropped,
        project.root.display()
    );
    if let Some(archive_path) = project.archive_path {
        println!("Archive: {}", archive_path.display());
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("depthcap={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# depthcap configuration file");
    println!("# Environment overrides use the DEPTHCAP_ prefix, e.g. DEPTHCAP_CAPTURE__PATH");
    println!();
    println!("{}", DepthcapConfig::default().to_toml()?);
    Ok(())
}
