use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use temporal_context::{
    truncate_with_fallback, ContextEngine, ContextError, ContextOptions, DateAnnotator, Grain,
    Section, TemporalAnnotation, TemporalExtractor, WeekStartDay,
};
use tracing::info;

use crate::config::{load_options, parse_reference, parse_timezone};
use crate::duckling_client::DucklingClient;
use crate::replay::ReplayExtractor;

#[derive(Parser, Debug)]
#[command(
    name = "tcx",
    version,
    about = "Resolve date and time mentions in text with context chaining"
)]
pub struct Cli {
    /// Default log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn", env = "TCX_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every date/time mention in a text and print them as JSON
    Resolve(ResolveArgs),
    /// Truncate a date to a grain, stepping down when the grain is unsupported
    Truncate(TruncateArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Language of the text
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Reference time (RFC 3339); defaults to now
    #[arg(long)]
    pub reference: Option<String>,

    /// IANA timezone the results are expressed in
    #[arg(long, default_value = "UTC")]
    pub tz: String,

    /// Text to scan
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    /// File whose contents are scanned
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Base URL of a Duckling server
    #[arg(
        long,
        env = "DUCKLING_URL",
        conflicts_with = "replay",
        required_unless_present = "replay"
    )]
    pub duckling_url: Option<String>,

    /// Recorded Duckling response for the whole text, used instead of a server
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Duckling request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Keep latent (low-confidence) matches
    #[arg(long)]
    pub include_latent: bool,

    /// JSON file with engine options
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TruncateArgs {
    /// Date to truncate (RFC 3339)
    #[arg(long)]
    pub date: String,

    /// IANA timezone the date is truncated in
    #[arg(long, default_value = "UTC")]
    pub tz: String,

    /// Grain to truncate to
    #[arg(long)]
    pub grain: Grain,

    /// Start weeks on Sunday instead of Monday
    #[arg(long)]
    pub sunday_weeks: bool,
}

#[derive(Serialize)]
struct TruncateOutput {
    date: String,
    grain: Grain,
    requested: Grain,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Resolve(args) => run_resolve(args),
            Command::Truncate(args) => run_truncate(args),
        }
    }
}

fn run_resolve(args: ResolveArgs) -> Result<()> {
    let mut options = match &args.config {
        Some(path) => load_options(path)?,
        None => ContextOptions::default(),
    };
    if args.include_latent {
        options.include_latent = true;
    }

    let tz = parse_timezone(&args.tz)?;
    let reference = parse_reference(args.reference.as_deref(), tz)?;
    let content = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading input file {}", path.display()))?,
        (None, None) => bail!("either --text or --file is required"),
    };

    let annotations = match (&args.replay, &args.duckling_url) {
        (Some(path), _) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("reading replay file {}", path.display()))?;
            let extractor = ReplayExtractor::from_response(content.as_str(), &body)?;
            annotate(extractor, options, &args.lang, content, reference)?
        }
        (None, Some(url)) => {
            let extractor = DucklingClient::new(url, Duration::from_secs(args.timeout));
            annotate(extractor, options, &args.lang, content, reference)?
        }
        (None, None) => bail!("either --duckling-url or --replay is required"),
    };

    println!("{}", serde_json::to_string_pretty(&annotations)?);
    Ok(())
}

fn annotate<E: TemporalExtractor>(
    extractor: E,
    options: ContextOptions,
    lang: &str,
    content: String,
    reference: chrono::DateTime<chrono_tz::Tz>,
) -> Result<Vec<TemporalAnnotation>> {
    let annotator = DateAnnotator::new(ContextEngine::with_options(extractor, options)?);
    let sections = [Section::new(content, 0, reference)];
    let mut annotations: Vec<TemporalAnnotation> = Vec::new();

    let report = annotator.process(lang, &sections, &mut annotations);
    if !report.language_supported {
        return Err(ContextError::UnsupportedLanguage(lang.to_string()).into());
    }
    if report.sections_failed > 0 {
        bail!("extraction failed, see the log for details");
    }

    info!(annotations = report.annotations, "resolved");
    Ok(annotations)
}

fn run_truncate(args: TruncateArgs) -> Result<()> {
    let tz = parse_timezone(&args.tz)?;
    let date = parse_reference(Some(args.date.as_str()), tz)?;
    let week_start = if args.sunday_weeks {
        WeekStartDay::Sunday
    } else {
        WeekStartDay::Monday
    };

    let Some((truncated, grain)) = truncate_with_fallback(&date, args.grain, week_start) else {
        bail!("{} cannot be truncated at {} or any finer grain", date, args.grain);
    };

    let output = TruncateOutput {
        date: truncated.to_rfc3339(),
        grain,
        requested: args.grain,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
