use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use razmetka_core::{
    Annotator, AnnotatorConfig, BatchSummary, Campaign, MediaTransport, MultimodalModel,
    OmniClient, PromptTemplate, RecordOutcome, ResultNaming, SkipReason, find_pending,
};

/// CLI wrapper for Campaign enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliCampaign {
    #[default]
    Supplements,
    Timeout,
}

impl From<CliCampaign> for Campaign {
    fn from(cli: CliCampaign) -> Self {
        match cli {
            CliCampaign::Supplements => Campaign::Supplements,
            CliCampaign::Timeout => Campaign::Timeout,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CliMedia {
    /// Send a file:// URL; the model server reads the video itself
    File,
    /// Send the video base64-encoded in the request
    Inline,
}

impl From<CliMedia> for MediaTransport {
    fn from(cli: CliMedia) -> Self {
        match cli {
            CliMedia::File => MediaTransport::FileUrl,
            CliMedia::Inline => MediaTransport::Inline,
        }
    }
}

#[derive(Parser)]
#[command(name = "razmetka")]
#[command(about = "Annotate downloaded videos with a multimodal model and save the JSON it returns")]
struct Cli {
    /// Directory with <id>.info.json metadata files and the videos next to them
    input_dir: Option<PathBuf>,

    /// Where <id>.result.json files go. Defaults to the input directory with "videos" replaced by "results"
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Built-in prompt to use
    #[arg(short, long, default_value = "supplements")]
    campaign: CliCampaign,

    /// Prompt template file with {field} placeholders, replaces the built-in campaign prompt
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Model id as served by the inference server
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API, e.g. http://localhost:8000/v1
    #[arg(long)]
    api_base: Option<String>,

    /// How the video is handed to the server
    #[arg(long)]
    media: Option<CliMedia>,

    /// Do not feed the audio track to the model
    #[arg(long)]
    no_audio: bool,

    /// Process at most this many records
    #[arg(short, long)]
    limit: Option<usize>,

    /// List pending records and exit without contacting the model
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn apply(&self, config: &mut AnnotatorConfig) {
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.model.api_base = api_base.clone();
        }
        if let Some(media) = &self.media {
            config.model.media = media.clone().into();
        }
        if self.no_audio {
            config.use_audio_in_video = false;
        }
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    } else {
        format!("{:.0}h {:.0}m", (secs / 3600.0).floor(), (secs % 3600.0) / 60.0)
    }
}

fn create_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn create_progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg:.dim} [{elapsed}<{eta}]")?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Used when `RUST_LOG` is unset: progress from this tool, warnings from dependencies.
const DEFAULT_LOG_FILTER: &str = "warn,razmetka=info,razmetka_core=info";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

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
                    .with_target(false),
            )
            .with(env_filter)
            .init();
    }
}

fn record_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn report_outcome(bar: &ProgressBar, path: &Path, outcome: &RecordOutcome, started: Instant) {
    let name = record_name(path);
    match outcome {
        RecordOutcome::Success { result_path, bytes } => bar.println(format!(
            "{} {} → {} {}",
            style("✓").green().bold(),
            name,
            style(result_path.display()).cyan(),
            style(format!("[{} B, {}]", bytes, format_duration(started.elapsed()))).dim()
        )),
        RecordOutcome::Skipped {
            reason: SkipReason::AlreadyAnnotated,
        } => bar.println(format!(
            "{} {} {}",
            style("✓").green().bold(),
            name,
            style("(already annotated)").dim()
        )),
        RecordOutcome::Skipped {
            reason: SkipReason::MediaRejected(reason),
        } => bar.println(format!(
            "{} {} skipped: {}",
            style("⚠").yellow().bold(),
            name,
            style(reason).yellow()
        )),
        RecordOutcome::Fatal(e) => bar.println(format!(
            "{} {} {}",
            style("✗").red().bold(),
            name,
            style(e).red()
        )),
    }
    bar.set_message(name);
    bar.inc(1);
}

fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} written, {} already annotated, {} skipped {}",
        style(summary.written).green().bold(),
        summary.already_done,
        style(summary.skipped.len()).yellow(),
        style(format!("[{}]", format_duration(elapsed))).dim()
    );
    for (path, reason) in &summary.skipped {
        println!("  {} {}: {}", style("⚠").yellow(), path.display(), reason);
    }
    if !summary.skipped.is_empty() {
        println!(
            "{}",
            style("Skipped records have no result file and will be retried on the next run.")
                .dim()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let mut config = AnnotatorConfig::from_env()?;
    cli.apply(&mut config);
    let output_dir = config.output_dir();

    let (template, prompt_source) = match &cli.prompt_file {
        Some(path) => (
            PromptTemplate::from_file(path).await?,
            path.display().to_string(),
        ),
        None => {
            let campaign = Campaign::from(cli.campaign.clone());
            (campaign.template(), format!("{} campaign", campaign.name()))
        }
    };
    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %output_dir.display(),
        model = %config.model.model,
        api_base = %config.model.api_base,
        prompt = %prompt_source,
        "Starting batch"
    );

    println!(
        "\n{}  {}\n",
        style("razmetka").cyan().bold(),
        style("Video Annotator").dim()
    );

    let naming = ResultNaming::default();
    let pending = find_pending(&config.input_dir, &output_dir, &naming).await?;
    println!(
        "{} {} pending in {} {}",
        style("✓").green().bold(),
        style(pending.len()).bold(),
        style(config.input_dir.display()).cyan(),
        style(format!("→ {}", output_dir.display())).dim()
    );
    println!(
        "{} Prompt: {}",
        style("✓").green().bold(),
        style(&prompt_source).dim()
    );

    if pending.is_empty() {
        return Ok(());
    }

    if cli.dry_run {
        for path in pending.iter().take(cli.limit.unwrap_or(usize::MAX)) {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    // The model is acquired once and shared by reference for the whole batch
    let spinner = create_spinner(&format!("Connecting to {}...", config.model.model))?;
    let model = match OmniClient::connect(config.model.clone()).await {
        Ok(model) => model,
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };
    spinner.finish_with_message(format!(
        "{} Model ready: {} {}",
        style("✓").green().bold(),
        model.model_id(),
        style(&config.model.api_base).dim()
    ));

    println!("{}", style("─".repeat(60)).dim());

    let annotator = Annotator::new(&model, template, &output_dir)
        .with_naming(naming)
        .with_audio(config.use_audio_in_video)
        .with_limit(cli.limit);

    let total = cli.limit.map_or(pending.len(), |l| l.min(pending.len()));
    let bar = create_progress_bar(total as u64)?;
    let total_start = Instant::now();
    let mut step_start = Instant::now();

    let result = annotator
        .run(&pending, |path, outcome| {
            report_outcome(&bar, path, outcome, step_start);
            step_start = Instant::now();
        })
        .await;
    bar.finish_and_clear();

    match result {
        Ok(summary) => {
            print_summary(&summary, total_start.elapsed());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            eprintln!(
                "{}",
                style("Results written so far are kept; rerun to continue after fixing the input.")
                    .dim()
            );
            std::process::exit(1);
        }
    }
}
