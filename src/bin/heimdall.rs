//! heimdall: vision analysis CLI.
//!
//! Runs the pipeline in-process against the configured Azure deployment
//! and prints results as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use heimdall::config::{Config, Secrets};
use heimdall::types::mime_from_extension;
use heimdall::{
    AnalysisOptions, Audience, DetailLevel, HeimdallError, ImageData, PassMode, Purpose, Tone,
    VideoFrame, VisionPipeline,
};

/// Heimdall: resilient vision analysis.
#[derive(Parser)]
#[command(name = "heimdall")]
#[command(version = heimdall::PKG_VERSION)]
#[command(about = "Describe images and video frames with a remote vision model")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HEIMDALL_CONFIG")]
    config: Option<PathBuf>,

    /// Media library root (overrides [library] root).
    #[arg(short, long)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe one to ten images from the library
    Analyze {
        /// Image ids (paths relative to the library root)
        #[arg(required = true)]
        ids: Vec<String>,
        #[command(flatten)]
        options: OptionArgs,
    },

    /// Describe a video from a directory of frames named `<seconds>.<ext>`
    Video {
        /// Directory holding the extracted frames
        dir: PathBuf,
        /// Video id used for caching (default: directory name)
        #[arg(long)]
        id: Option<String>,
        /// auto, single_pass or two_pass
        #[arg(long, default_value = "auto", value_parser = parse_enum::<PassMode>)]
        pass_mode: PassMode,
        #[command(flatten)]
        options: OptionArgs,
    },

    /// Probe the vision endpoint and print a health report
    Health,
}

#[derive(ClapArgs)]
struct OptionArgs {
    /// general, accessibility, marketing or education
    #[arg(long, default_value = "general", value_parser = parse_enum::<Purpose>)]
    purpose: Purpose,
    /// general, children, professional or technical
    #[arg(long, default_value = "general", value_parser = parse_enum::<Audience>)]
    audience: Audience,
    /// brief, standard, detailed or comprehensive
    #[arg(long, default_value = "standard", value_parser = parse_enum::<DetailLevel>)]
    detail: DetailLevel,
    /// neutral, formal, casual or playful
    #[arg(long, default_value = "neutral", value_parser = parse_enum::<Tone>)]
    tone: Tone,
    /// Output language
    #[arg(long, default_value = "en")]
    language: String,
    /// Focus tag (repeatable)
    #[arg(long)]
    focus: Vec<String>,
    /// Question for the model to answer (repeatable)
    #[arg(short, long)]
    question: Vec<String>,
    /// Age of the youngest expected reader
    #[arg(long)]
    target_age: Option<u8>,
    /// Skip content moderation
    #[arg(long)]
    no_moderation: bool,
    /// Ignore cached results
    #[arg(long)]
    force_refresh: bool,
}

impl OptionArgs {
    fn into_options(self) -> AnalysisOptions {
        let mut options = AnalysisOptions::default()
            .purpose(self.purpose)
            .audience(self.audience)
            .detail(self.detail)
            .tone(self.tone)
            .language(self.language)
            .moderation(!self.no_moderation)
            .force_refresh(self.force_refresh);
        for tag in self.focus {
            options = options.focus(tag);
        }
        for question in self.question {
            options = options.question(question);
        }
        if let Some(age) = self.target_age {
            options = options.target_age(age);
        }
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = e.report();
            match serde_json::to_string_pretty(&report) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> heimdall::Result<()> {
    let pipeline = build_pipeline(args.config.as_deref(), args.library)?;
    info!(version = heimdall::version_string(), "heimdall starting");

    match args.command {
        Command::Analyze { ids, options } => {
            let description = pipeline.analyze_images(ids, options.into_options()).await?;
            print_json(&description)
        }

        Command::Video {
            dir,
            id,
            pass_mode,
            options,
        } => {
            let video_id = match id {
                Some(id) => id,
                None => dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        HeimdallError::InvalidInput(format!("cannot derive a video id from {dir:?}"))
                    })?,
            };
            let frames = load_frames(&dir).await?;
            let options = options.into_options().pass_mode(pass_mode);
            let analysis = pipeline
                .analyze_video_frames(&video_id, frames, options)
                .await?;
            print_json(&analysis)
        }

        Command::Health => {
            let report = pipeline.health_check().await;
            print_json(&report)?;
            if report.healthy {
                Ok(())
            } else {
                Err(HeimdallError::Unclassified("pipeline unhealthy".into()))
            }
        }
    }
}

/// Build a [`VisionPipeline`] from configuration and secrets.
fn build_pipeline(
    config_path: Option<&Path>,
    library: Option<PathBuf>,
) -> heimdall::Result<VisionPipeline> {
    let config = Config::load(config_path)?;
    let secrets = Secrets::load()?;
    let mut builder = config.builder(&secrets)?;
    if let Some(root) = library {
        builder = builder.library_root(root);
    }
    builder.build()
}

/// Read every `<seconds>.<ext>` image in `dir` as a frame.
async fn load_frames(dir: &Path) -> heimdall::Result<Vec<VideoFrame>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| HeimdallError::InvalidInput(format!("cannot read {dir:?}: {e}")))?;

    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(HeimdallError::unclassified)?
    {
        let path = entry.path();
        let Some((timestamp, mime)) = frame_info(&path) else {
            debug!(path = %path.display(), "skipping non-frame file");
            continue;
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(HeimdallError::unclassified)?;
        frames.push(VideoFrame::new(timestamp, ImageData::new(bytes, mime)));
    }
    Ok(frames)
}

/// Timestamp and MIME type encoded in a frame file name.
fn frame_info(path: &Path) -> Option<(f64, &'static str)> {
    let mime = mime_from_extension(path.extension()?.to_str()?)?;
    let timestamp = path.file_stem()?.to_str()?.parse().ok()?;
    Some((timestamp, mime))
}

fn print_json<T: Serialize>(value: &T) -> heimdall::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a snake_case enum value through its serde representation.
fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unrecognised value '{s}'"))
}
