//! CLI binary for pagesum.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and prints the per-page results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagesum::{
    analyze, analyze_to_file, inspect, AnalysisConfig, AnalysisProgress, PageSelection,
    ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page
/// log lines using [indicatif]. The pipeline is sequential, so events
/// always arrive in page order.
struct CliProgress {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Wall-clock start of the page currently in flight.
    page_start: Mutex<Option<Instant>>,
    /// Count of pages that errored out.
    errors: AtomicUsize,
}

impl CliProgress {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_run_start` (called before any page is processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_start: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analysing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.page_start
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl AnalysisProgress for CliProgress {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        *self.page_start.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, _done: usize, total: usize, summary_len: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, _done: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            let end = error
                .char_indices()
                .nth(79)
                .map(|(i, _)| i)
                .unwrap_or(error.len());
            format!("{}\u{2026}", &error[..end])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages analysed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages analysed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic analysis (stdout, one block per page)
  pagesum invoice.pdf

  # Write the report to a file
  pagesum invoice.pdf -o report.md

  # Specific pages
  pagesum --pages 1-5 statement.pdf

  # Abort on the first failed page instead of continuing
  pagesum --fail-fast invoice.pdf

  # Analyse a PDF from a URL
  pagesum https://example.com/invoices/march.pdf

  # Inspect PDF metadata (no API keys needed)
  pagesum --inspect-only invoice.pdf

  # JSON output with per-page records and stats
  pagesum --json invoice.pdf > output.json

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY  Cloud Vision API key (OCR)
  OPENAI_API_KEY         OpenAI API key (summaries)
  PDFIUM_LIB_PATH        Path to an existing libpdfium

SETUP:
  1. Set the keys:   export GOOGLE_VISION_API_KEY=AIza... OPENAI_API_KEY=sk-...
  2. Analyse:        pagesum invoice.pdf
"#;

/// Summarise PDF documents page by page using cloud OCR and LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pagesum",
    version,
    about = "Summarise PDF documents page by page using cloud OCR and LLMs",
    long_about = "Extract the text of each PDF page with the Cloud Vision OCR service and \
summarise it into an invoice-style report with an OpenAI chat model. Pages are processed \
strictly in order, one at a time.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the report to this file instead of stdout.
    #[arg(short, long, env = "PAGESUM_OUTPUT")]
    output: Option<PathBuf>,

    /// Cloud Vision API key for OCR.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,

    /// OpenAI API key for summary generation.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Generation model ID.
    #[arg(long, env = "PAGESUM_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PAGESUM_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAGESUM_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "PAGESUM_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max generated tokens per page summary.
    #[arg(long, env = "PAGESUM_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Generation temperature (0.0–2.0).
    #[arg(long, env = "PAGESUM_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per remote call on transient failure.
    #[arg(long, env = "PAGESUM_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "PAGESUM_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Abort the run at the first failed page.
    #[arg(long, env = "PAGESUM_FAIL_FAST")]
    fail_fast: bool,

    /// Output structured JSON (AnalysisOutput) instead of the report.
    #[arg(long, env = "PAGESUM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAGESUM_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no analysis.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGESUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGESUM_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAGESUM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-service-call timeout in seconds.
    #[arg(long, env = "PAGESUM_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new_dynamic() as Arc<dyn AnalysisProgress>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run analysis ─────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = analyze_to_file(&cli.input, output_path, &config)
            .await
            .context("Analysis failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {}ms  →  {}",
                if stats.failed_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.processed_pages,
                stats.processed_pages + stats.failed_pages,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    } else {
        let output = analyze(&cli.input, &config)
            .await
            .context("Analysis failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let report = output.render_report();
            handle
                .write_all(report.as_bytes())
                .context("Failed to write to stdout")?;
            if !report.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Analysed {}/{} pages in {}ms",
                output.stats.processed_pages,
                output.stats.processed_pages + output.stats.failed_pages,
                output.stats.total_duration_ms
            );
            if output.stats.failed_pages > 0 {
                eprintln!("  {} pages failed", output.stats.failed_pages);
            }
        } else if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let pages = parse_pages(&cli.pages)?;

    let mut builder = AnalysisConfig::builder()
        .model(&cli.model)
        .pages(pages)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .max_rendered_pixels(cli.max_pixels)
        .fail_fast(cli.fail_fast)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.vision_api_key {
        builder = builder.vision_api_key(key);
    }
    if let Some(ref key) = cli.openai_api_key {
        builder = builder.openai_api_key(key);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pages_variants() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(
            parse_pages("5").unwrap(),
            PageSelection::Single(5)
        ));
        assert!(matches!(
            parse_pages("3-15").unwrap(),
            PageSelection::Range(3, 15)
        ));
        assert!(matches!(
            parse_pages("1,3,5").unwrap(),
            PageSelection::Set(_)
        ));
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-2").is_err());
        assert!(parse_pages("x").is_err());
    }
}
