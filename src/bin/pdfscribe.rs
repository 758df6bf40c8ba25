//! CLI binary for pdfscribe.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` / `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfscribe::config::{
    ARTICLE_LENGTH_STEP, DEFAULT_STORAGE_DIR, MAX_ARTICLE_LENGTH, MIN_ARTICLE_LENGTH,
};
use pdfscribe::pipeline::package::write_artifact;
use pdfscribe::{
    analyze, generate_article, inspect, read_file, AnalysisConfig, AnalysisRequest, ApiKey,
    DownloadArtifact, EmbedderKind, FailurePolicy, GenerationConfig, GenerationProgressCallback,
    GenerationRequest, IndexAction, ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per section.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_generation_start` reports the section count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading sample…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sections  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
    }

    fn elapsed_ms(&self, index: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }

    /// Clear the bar if generation never started (e.g. fatal error).
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_sections: usize) {
        self.activate_bar(total_sections);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Writing {total_sections} sections…"))
        ));
    }

    fn on_section_start(&self, index: usize, _total: usize, heading: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(heading.to_string());
    }

    fn on_section_complete(&self, index: usize, total: usize, heading: &str, body_len: usize) {
        let elapsed_ms = self.elapsed_ms(index);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {:<8}  {}",
            green("✓"),
            index,
            total,
            truncate(heading, 32),
            dim(&format!("{body_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, index: usize, total: usize, heading: &str, error: &str) {
        let elapsed_ms = self.elapsed_ms(index);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            truncate(heading, 32),
            red(&truncate(error, 80)),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_sections: usize, success_count: usize) {
        let failed = total_sections.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} sections written",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sections written  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_sections,
                red(&failed.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Article from a sample PDF (stdout)
  pdfscribe generate --pdf sample.pdf --keyword "solar panels" \
      --length 1500 --headings "Intro, Benefits, Conclusion"

  # Write the article to a file and print a download link
  pdfscribe generate --pdf sample.pdf --keyword solar --length 1000 \
      --headings "Intro, Costs" -o article.txt --link

  # Keep going when a heading fails
  pdfscribe generate --keyword solar --length 1500 --headings "A, B, C" --partial

  # Query a template + data document (index built once under ./storage)
  pdfscribe analyze --template template.pdf --data report.docx \
      --query "Summarise the March totals"

  # Page and character counts (no API key needed)
  pdfscribe inspect sample.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Per-session key for the OpenAI-compatible endpoint
  PDFSCRIBE_BASE_URL      Alternative OpenAI-compatible endpoint
  ANTHROPIC_API_KEY       Used by provider auto-detection when no key is given
  GEMINI_API_KEY          Used by provider auto-detection when no key is given
  EDGEQUAKE_LLM_PROVIDER  Provider for --provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Overrides the log filter

STORAGE:
  `analyze` keeps its index in ./storage/index.json (see --index-dir). The
  index is built from the first template + data pair and reloaded afterwards;
  delete the directory to rebuild it from new documents.
"#;

/// Generate keyword-focused articles and query document indexes with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscribe",
    version,
    about = "Generate keyword-focused articles from PDF samples and query document indexes with LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    backend: BackendArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFSCRIBE_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFSCRIBE_NO_PROGRESS")]
    no_progress: bool,
}

/// Backend selection shared by `generate` and `analyze`.
#[derive(Args, Debug)]
struct BackendArgs {
    /// API key for the OpenAI-compatible endpoint. Used for this run only.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible base URL.
    #[arg(long, global = true, env = "PDFSCRIBE_BASE_URL")]
    base_url: Option<String>,

    /// LLM model ID. Default: gpt-4.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama. Takes precedence over
    /// --api-key; the provider reads its own key from the environment.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Per-call LLM timeout in seconds. Default: none.
    #[arg(long, global = true, env = "PDFSCRIBE_API_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an article, one LLM call per heading.
    Generate(GenerateArgs),
    /// Answer a query from an index over a template and a data document.
    Analyze(AnalyzeArgs),
    /// Print page and character counts of a document (no API key needed).
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Sample article (.pdf, .docx or .txt) passed to every prompt.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Keyword the article focuses on.
    #[arg(short, long)]
    keyword: String,

    /// Article length in tokens: 500–10000 in steps of 500.
    #[arg(short, long, value_parser = parse_length)]
    length: usize,

    /// Comma-separated headings, e.g. "Intro, Benefits, Conclusion".
    #[arg(long)]
    headings: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSCRIBE_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Retries per heading on LLM failure.
    #[arg(long, env = "PDFSCRIBE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Keep successful sections when a heading fails.
    #[arg(long)]
    partial: bool,

    /// Path to a text file with custom writing guidelines.
    #[arg(long, env = "PDFSCRIBE_GUIDELINES")]
    guidelines: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Report template document.
    #[arg(long)]
    template: PathBuf,

    /// Data document.
    #[arg(long)]
    data: PathBuf,

    /// Free-text question.
    #[arg(long)]
    query: String,

    /// Directory holding the persisted index.
    #[arg(long, env = "PDFSCRIBE_INDEX_DIR", default_value = DEFAULT_STORAGE_DIR)]
    index_dir: PathBuf,

    /// Chunks retrieved per query.
    #[arg(long, env = "PDFSCRIBE_TOP_K", default_value_t = 2)]
    top_k: usize,

    /// Use the endpoint's embeddings with this model instead of local hashing.
    #[arg(long, env = "PDFSCRIBE_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print an HTML download link (base64 data URI).
    #[arg(long)]
    link: bool,

    /// Output structured JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Document to inspect.
    file: PathBuf,

    /// Print the extracted text after the counts.
    #[arg(long)]
    text: bool,

    /// Output structured JSON.
    #[arg(long)]
    json: bool,
}

fn parse_length(s: &str) -> std::result::Result<usize, String> {
    let n: usize = s.trim().parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(MIN_ARTICLE_LENGTH..=MAX_ARTICLE_LENGTH).contains(&n) || n % ARTICLE_LENGTH_STEP != 0 {
        return Err(format!(
            "must be {MIN_ARTICLE_LENGTH}–{MAX_ARTICLE_LENGTH} in steps of {ARTICLE_LENGTH_STEP}"
        ));
    }
    Ok(n)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let json = match &cli.command {
        Command::Generate(a) => a.output.json,
        Command::Analyze(a) => a.output.json,
        Command::Inspect(a) => a.json,
    };
    let show_progress = !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Generate(ref args) => run_generate(&cli, args, show_progress).await,
        Command::Analyze(ref args) => run_analyze(&cli, args, show_progress).await,
        Command::Inspect(ref args) => run_inspect(args).await,
    }
}

async fn run_generate(cli: &Cli, args: &GenerateArgs, show_progress: bool) -> Result<()> {
    let document = match args.pdf {
        Some(ref path) => Some(
            read_file(path).with_context(|| format!("Failed to read sample {}", path.display()))?,
        ),
        None => None,
    };

    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_generation_config(cli, args, progress.clone()).await?;

    let request = GenerationRequest {
        document,
        keyword: args.keyword.clone(),
        article_length: args.length,
        headings: args.headings.clone(),
    };

    let result = generate_article(request, &config).await;
    if let Some(ref p) = progress {
        p.abandon();
    }
    let output = result.context("Article generation failed")?;

    if let Some(ref failure) = output.extraction_error {
        if !cli.quiet {
            eprintln!(
                "{} Sample could not be fully read ({}); article written without it",
                cyan("⚠"),
                failure
            );
        }
    }

    if args.output.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        emit(&args.output, &output.article, &output.artifact).await?;
    }

    if !cli.quiet && !args.output.json {
        let s = &output.stats;
        eprintln!(
            "   {}/{} sections  {} tokens in  /  {} tokens out  |  {}ms total",
            s.generated_sections,
            s.heading_count,
            dim(&s.total_input_tokens.to_string()),
            dim(&s.total_output_tokens.to_string()),
            s.total_duration_ms,
        );
    }
    Ok(())
}

async fn run_analyze(cli: &Cli, args: &AnalyzeArgs, show_progress: bool) -> Result<()> {
    let template = read_file(&args.template)
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    let data = read_file(&args.data)
        .with_context(|| format!("Failed to read data {}", args.data.display()))?;

    let config = build_analysis_config(cli, args)?;
    let request = AnalysisRequest {
        template,
        data,
        query: args.query.clone(),
    };

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Analyzing");
        bar.set_message(args.query.clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = analyze(request, &config).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let output = result.context("Analysis failed")?;

    if args.output.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        emit(&args.output, &output.result, &output.artifact).await?;
    }

    if !cli.quiet && !args.output.json {
        let action = match output.index_action {
            IndexAction::Built => "built",
            IndexAction::Loaded => "loaded",
            IndexAction::Reused => "reused",
        };
        eprintln!(
            "{}  index {} at {}  |  {}ms",
            green("✔"),
            action,
            bold(&args.index_dir.display().to_string()),
            output.duration_ms
        );
    }
    Ok(())
}

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let (info, extracted) = inspect(&args.file)
        .await
        .with_context(|| format!("Failed to inspect {}", args.file.display()))?;

    if args.json {
        let value = serde_json::json!({ "info": info, "text": extracted.text });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", args.file.display());
    println!("Kind:         {:?}", info.kind);
    println!("Size:         {} bytes", info.bytes);
    println!("Pages:        {}", info.page_count);
    println!("Characters:   {}", info.char_count);
    if let Some(ref failure) = info.failure {
        println!("Error:        {}", red(&failure.to_string()));
    }
    if args.text {
        println!();
        println!("{}", extracted.text);
    }
    Ok(())
}

/// Print or write `result`, then the download link if asked.
async fn emit(args: &OutputArgs, result: &str, artifact: &DownloadArtifact) -> Result<()> {
    match args.output {
        Some(ref path) => {
            write_artifact(path, result)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(result.as_bytes())
                .context("Failed to write to stdout")?;
            if !result.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    if args.link {
        println!("{}", artifact.html_link());
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_generation_config(
    cli: &Cli,
    args: &GenerateArgs,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<GenerationConfig> {
    let guidelines = match args.guidelines {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read guidelines from {:?}", path))?,
        ),
        None => None,
    };

    let policy = if args.partial {
        FailurePolicy::Partial
    } else {
        FailurePolicy::WholeBatch
    };

    let mut builder = GenerationConfig::builder()
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .failure_policy(policy);

    let b = &cli.backend;
    if let Some(ref key) = b.api_key {
        builder = builder.api_key(ApiKey::new(key.as_str()));
    }
    if let Some(ref url) = b.base_url {
        builder = builder.base_url(url.as_str());
    }
    if let Some(ref model) = b.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = b.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(secs) = b.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(g) = guidelines {
        builder = builder.guidelines(g);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `AnalysisConfig`.
fn build_analysis_config(cli: &Cli, args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .storage_dir(args.index_dir.as_path())
        .top_k(args.top_k);

    let b = &cli.backend;
    if let Some(ref key) = b.api_key {
        builder = builder.api_key(ApiKey::new(key.as_str()));
    }
    if let Some(ref url) = b.base_url {
        builder = builder.base_url(url.as_str());
    }
    if let Some(ref model) = b.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = b.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(secs) = b.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref model) = args.embedding_model {
        builder = builder.embedder(EmbedderKind::Remote {
            model: model.clone(),
        });
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_accepts_steps_of_500_within_range() {
        assert_eq!(parse_length("500"), Ok(500));
        assert_eq!(parse_length(" 1500 "), Ok(1500));
        assert_eq!(parse_length("10000"), Ok(10_000));
    }

    #[test]
    fn length_rejects_out_of_range_or_off_step() {
        for bad in ["0", "499", "750", "10500", "abc", "-500"] {
            assert!(parse_length(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
