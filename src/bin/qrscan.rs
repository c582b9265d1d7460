//! CLI binary for qrscan.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`,
//! prints the payload and turns the outcome into an exit status.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use qrscan::{
    acquire, inspect, FramePolicy, InversionMode, Orchestrator, PageSelection, ProgressCallback,
    ScanConfig, ScanOutcome, ScanProgressCallback,
};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const EXIT_FOUND: u8 = 0;
const EXIT_NOT_FOUND: u8 = 1;
const EXIT_FAILURE: u8 = 2;

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

/// Terminal progress callback: a spinner while the input is opened, then a
/// bar over the frames with one log line per frame.
struct CliProgressCallback {
    bar: ProgressBar,
    /// End of the previous frame; the next frame's render and decode time
    /// is measured from here.
    last_mark: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner-only until `on_scan_start` tells us the frame count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            last_mark: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} frames  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
    }

    /// Seconds since the previous mark, then re-mark.
    fn frame_elapsed(&self) -> f64 {
        let now = Instant::now();
        self.last_mark
            .lock()
            .ok()
            .and_then(|mut t| t.replace(now))
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar if the scan never reached `on_scan_complete`.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_frames: usize) {
        if let Ok(mut t) = self.last_mark.lock() {
            *t = Some(Instant::now());
        }
        self.activate_bar(total_frames);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning up to {total_frames} frame(s)…"))
        ));
    }

    fn on_frame_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("frame {page_num}"));
    }

    fn on_frame_scanned(&self, page_num: usize, total: usize, found: bool) {
        let elapsed = self.frame_elapsed();
        self.bar.println(format!(
            "  {} Frame {:>3}/{:<3}  {:<10}  {}",
            if found { green("✓") } else { dim("·") },
            page_num,
            total,
            if found { green("QR found") } else { dim("no symbol") },
            dim(&format!("{elapsed:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_frame_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let elapsed = self.frame_elapsed();

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Frame {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, frames_scanned: usize, found: bool) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        let tail = if errors > 0 {
            format!("  ({} failed to render)", red(&errors.to_string()))
        } else {
            String::new()
        };

        if found {
            eprintln!(
                "{} QR code found after {} frame(s){}",
                green("✔"),
                bold(&frames_scanned.to_string()),
                tail
            );
        } else {
            eprintln!(
                "{} No QR code in {} frame(s){}",
                cyan("⚠"),
                bold(&frames_scanned.to_string()),
                tail
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the payload of the first QR code in an image
  qrscan ticket.png

  # Scan a PDF, first match wins
  qrscan boarding-pass.pdf

  # Only pages 2-4, rendered at twice the natural size
  qrscan --pages 2-4 --scale 2 invoice.pdf

  # Scan a download, overriding a wrong Content-Type
  qrscan --mime application/pdf https://example.com/download?id=42

  # Light-on-dark codes
  qrscan --inversion inverted-first dark-mode.png

  # Structured output
  qrscan --json ticket.pdf > outcome.json

  # Classify and count frames without decoding
  qrscan --inspect-only ticket.pdf

EXIT STATUS:
  0  a QR code was found (payload on stdout)
  1  no QR code was found
  2  the input could not be read, opened or rendered

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Overrides the log filter (e.g. qrscan=debug)
"#;

/// Find and decode the first QR code in an image or PDF.
#[derive(Parser, Debug)]
#[command(
    name = "qrscan",
    version,
    about = "Find and decode the first QR code in an image or PDF",
    long_about = "Scan an image or a multi-page PDF (local file or URL) for a QR code. \
Images are scanned as one frame; PDF pages are rendered one at a time and the first \
page carrying a decodable symbol wins.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    /// Declared MIME type, overriding extension and Content-Type.
    #[arg(long, env = "QRSCAN_MIME")]
    mime: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "QRSCAN_PAGES", default_value = "all")]
    pages: String,

    /// Page render scale relative to natural size (0.25–8.0).
    #[arg(long, env = "QRSCAN_SCALE", default_value_t = 1.0)]
    scale: f32,

    /// Abort on the first page that fails to render instead of skipping it.
    #[arg(long, env = "QRSCAN_FAIL_FAST")]
    fail_fast: bool,

    /// Luminance polarity to try.
    #[arg(long, env = "QRSCAN_INVERSION", value_enum, default_value = "both")]
    inversion: InversionArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "QRSCAN_PASSWORD")]
    password: Option<String>,

    /// Output the structured ScanOutcome as JSON.
    #[arg(long, env = "QRSCAN_JSON")]
    json: bool,

    /// Print input kind and frame count only, no decoding.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "QRSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "QRSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the payload and errors.
    #[arg(short, long, env = "QRSCAN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "QRSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum InversionArg {
    Normal,
    Inverted,
    Both,
    InvertedFirst,
}

impl From<InversionArg> for InversionMode {
    fn from(v: InversionArg) -> Self {
        match v {
            InversionArg::Normal => InversionMode::Normal,
            InversionArg::Inverted => InversionMode::Inverted,
            InversionArg::Both => InversionMode::Both,
            InversionArg::InvertedFirst => InversionMode::InvertedFirst,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    match run(&cli, show_progress).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<u8> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(cli, None)?;
        let summary = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect input")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("Input:   {}", summary.name);
            println!("Kind:    {}", summary.media_kind.as_str());
            println!("Bytes:   {}", summary.byte_len);
            println!("Frames:  {}", summary.frame_count);
        }
        return Ok(EXIT_FOUND);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;

    // ── Acquire input ────────────────────────────────────────────────────
    let file = match acquire(&cli.input, &config).await {
        Ok(file) => file,
        Err(e) => {
            if let Some(cb) = &progress {
                cb.finish();
            }
            return Err(e).context("Failed to read input");
        }
    };

    // ── Scan ─────────────────────────────────────────────────────────────
    let outcome = Orchestrator::new(config).submit(file).await;
    if let Some(cb) = &progress {
        cb.finish();
    }

    report(cli, &outcome)?;

    Ok(match (&outcome.failure, outcome.result.is_found()) {
        (Some(_), _) => EXIT_FAILURE,
        (None, true) => EXIT_FOUND,
        (None, false) => EXIT_NOT_FOUND,
    })
}

/// Print the outcome: payload or JSON on stdout, diagnostics on stderr.
fn report(cli: &Cli, outcome: &ScanOutcome) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(outcome).context("Failed to serialise outcome")?;
        println!("{json}");
        return Ok(());
    }

    if let Some(payload) = outcome.payload() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(payload.as_bytes())
            .context("Failed to write to stdout")?;
        if !payload.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if let Some(err) = &outcome.failure {
        eprintln!("{} {}", red("error:"), err);
    } else if outcome.is_unsupported() && !cli.quiet {
        eprintln!(
            "{} '{}' is neither an image nor a PDF",
            cyan("⚠"),
            outcome.report.input_name
        );
    } else if !cli.quiet && outcome.payload().is_none() {
        eprintln!("No QR code found");
    }

    if !cli.quiet {
        let r = &outcome.report;
        eprintln!(
            "   {}",
            dim(&format!(
                "{} · {}/{} frames · render {}ms · decode {}ms · total {}ms",
                r.media_kind.as_str(),
                r.frames_scanned,
                r.total_frames,
                r.render_duration_ms,
                r.decode_duration_ms,
                r.total_duration_ms
            ))
        );
    }
    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ScanConfig::builder()
        .render_scale(cli.scale)
        .pages(pages)
        .frame_policy(if cli.fail_fast {
            FramePolicy::FailFast
        } else {
            FramePolicy::SkipAndContinue
        })
        .inversion(cli.inversion.into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref mime) = cli.mime {
        builder = builder.declared_mime(mime.clone());
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
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
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
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
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
