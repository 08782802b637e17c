use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use fitmark_core::{ConvertConfig, GenerationResult, MarkdownGenerator, ThresholdType};
use owo_colors::OwoColorize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod echo;

use echo::{
    format_size, print_banner, print_generation_details, print_info, print_step, print_success, print_timing,
    print_warning,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which part of the generation result to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Markdown of the pruned main content
    Fit,
    /// Markdown of the whole page
    Raw,
    /// Whole-page Markdown with citation markers, followed by the references
    Citations,
    /// Only the reference block
    References,
    /// The pruned main content as HTML
    Html,
    /// Every field as JSON
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fit" | "markdown" | "md" => Ok(Self::Fit),
            "raw" => Ok(Self::Raw),
            "citations" => Ok(Self::Citations),
            "references" | "refs" => Ok(Self::References),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid format: {}. Valid options: fit, raw, citations, references, html, json",
                s
            )),
        }
    }
}

/// Distill an HTML document into Markdown with numbered citations
#[derive(Parser, Debug)]
#[command(name = "fitmark")]
#[command(version)]
#[command(about = "Distill HTML into cited Markdown", long_about = None)]
struct Args {
    /// Local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (fit, raw, citations, references, html, json)
    #[arg(short, long, default_value = "fit", value_name = "FORMAT")]
    format: OutputFormat,

    /// JSON file with conversion settings; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base URL used to resolve relative links
    #[arg(short, long, value_name = "URL")]
    base_url: Option<String>,

    /// Pruning threshold mode (fixed, dynamic)
    #[arg(long, value_name = "TYPE")]
    threshold_type: Option<ThresholdType>,

    /// Pruning threshold
    #[arg(long, value_name = "NUM")]
    threshold: Option<f64>,

    /// Minimum words for a node to be kept
    #[arg(long, value_name = "NUM")]
    min_words: Option<usize>,

    /// Skip pruning; fit output is empty
    #[arg(long)]
    no_pruning: bool,

    /// Keep inline links instead of citations
    #[arg(long)]
    no_citations: bool,

    /// Wrap plain lines at this width (0 disables)
    #[arg(long, value_name = "NUM")]
    body_width: Option<usize>,

    /// Drop link markup, keeping link text
    #[arg(long)]
    ignore_links: bool,

    /// Drop images
    #[arg(long)]
    ignore_images: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides
    fn convert_config(&self) -> anyhow::Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                debug!(path = %path.display(), "loaded config file");
                serde_json::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => ConvertConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(threshold_type) = self.threshold_type {
            config.threshold_type = threshold_type;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.min_words.is_some() {
            config.min_word_threshold = self.min_words;
        }
        if let Some(body_width) = self.body_width {
            config.render.body_width = body_width;
        }
        config.use_pruning &= !self.no_pruning;
        config.use_citations &= !self.no_citations;
        config.render.ignore_links |= self.ignore_links;
        config.render.ignore_images |= self.ignore_images;

        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "fitmark_core=debug,fitmark=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

/// Fail on an error-bearing result, or when fit output was asked for and pruning left nothing
fn ensure_usable(result: &GenerationResult, format: OutputFormat, use_pruning: bool) -> anyhow::Result<()> {
    if let Some(message) = result.error_message() {
        anyhow::bail!("Generation failed: {}", message.trim_start_matches("Error: "));
    }
    if use_pruning && matches!(format, OutputFormat::Fit | OutputFormat::Html) && result.fit_html.is_empty() {
        anyhow::bail!("No main content survived pruning");
    }
    Ok(())
}

fn render_output(result: &GenerationResult, format: OutputFormat) -> anyhow::Result<String> {
    let output = match format {
        OutputFormat::Fit => format!("{}\n", result.fit_markdown.trim()),
        OutputFormat::Raw => result.raw_markdown.clone(),
        OutputFormat::Citations => format!("{}{}", result.markdown_with_citations, result.references_markdown),
        OutputFormat::References => result.references_markdown.clone(),
        OutputFormat::Html => result.fit_html.clone(),
        OutputFormat::Json => result.to_json().context("Failed to serialize result")?,
    };
    Ok(output)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let config = args.convert_config()?;

    let html = if args.input == "-" {
        if args.verbose {
            print_step(1, 3, "Reading from stdin");
        }
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        if args.verbose {
            print_step(1, 3, &format!("Reading from file {}", args.input.bright_white()));
        }
        fs::read_to_string(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?
    };

    if args.verbose {
        eprintln!("  {} {}", "Size:".dimmed(), format_size(html.len()).bright_white());
        eprintln!();
        print_step(2, 3, "Generating Markdown");
        eprintln!(
            "  {} {}",
            "Threshold:".dimmed(),
            format!("{} {:.2}", config.threshold_type, config.threshold).bright_white()
        );
    }

    if !config.use_pruning && matches!(args.format, OutputFormat::Fit | OutputFormat::Html) {
        print_warning("Pruning is disabled; fit output will be empty");
    }

    let started = Instant::now();
    let pruning = config.pruning_config();
    debug!(
        threshold_type = %config.threshold_type,
        threshold = config.threshold,
        pruning = pruning.is_some(),
        citations = config.use_citations,
        "generating markdown"
    );
    let result = MarkdownGenerator::new().generate_markdown(
        &html,
        &config.base_url,
        &config.render,
        pruning.as_ref(),
        config.use_citations,
    );

    if args.verbose {
        print_timing("Generation", started.elapsed());
        print_generation_details(&result);
    }

    ensure_usable(&result, args.format, config.use_pruning)?;

    let output = render_output(&result, args.format)?;

    if args.verbose {
        print_step(3, 3, "Writing output");
        eprintln!(
            "  {} {}",
            "Format:".dimmed(),
            format!("{:?}", args.format).bright_white()
        );
        eprintln!();
    }

    match args.output {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    Ok(())
}
