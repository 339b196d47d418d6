//! CLI binary for gatepass.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `Submission`, `GatePassConfig` and `Stores`, and prints the outcome.
//! A rejected submission prints its one message and exits with status 2.

use anyhow::{Context, Result};
use clap::Parser;
use gatepass::pipeline::input::read_upload;
use gatepass::{
    check_submission, submit, write_download, GatePassConfig, GatePassError, ProgressCallback,
    Rejection, Stage, Stores, Submission, SubmissionProgressCallback, UploadedDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status for a submission that failed validation.
const EXIT_REJECTED: i32 = 2;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that shows the current stage and ticks off finished ones.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SubmissionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar.println(format!("  {} {}", green("✓"), stage));
    }

    fn on_rejected(&self, _rejection: &Rejection) {
        self.bar.finish_and_clear();
    }

    fn on_issued(&self, _reg_no: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Issue a pass, storing everything under ./gatepass-data
  gatepass --name "Asha Rao" --reg-no SS-2024-001 --phone 9876543210 \
           --email asha@example.com --passport photo.jpg --identity aadhar.pdf

  # Check the uploads without generating or storing anything
  gatepass --validate-only --name ... --passport photo.jpg --identity aadhar.pdf

  # Store in a Google Cloud Storage bucket (build with --features gcs)
  gatepass --store gcs --bucket my-bucket ...

  # Show the stored record for a registration number
  gatepass --lookup SS-2024-001 --json

CHECKS (first failure wins, nothing is stored):
  1. all fields present, registration number usable as a key
  2. uploads are PNG, JPEG or PDF, each between 100 KB and 500 KB
  3. passport photo corners are white
  4. identity document has more than 50 characters of readable text

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (vision OCR)
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  AWS_* / GOOGLE_*        Cloud credentials for --store s3 / gcs
"#;

/// Validate applicant uploads and issue a QR-encoded gate pass PDF.
#[derive(Parser, Debug)]
#[command(
    name = "gatepass",
    version,
    about = "Validate applicant uploads and issue a QR-encoded gate pass PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Applicant's full name.
    #[arg(long)]
    name: Option<String>,

    /// Registration number; keys every stored artifact.
    #[arg(long)]
    reg_no: Option<String>,

    /// Phone number.
    #[arg(long)]
    phone: Option<String>,

    /// Email address.
    #[arg(long)]
    email: Option<String>,

    /// Passport-style photo (PNG, JPEG or PDF) with a white background.
    #[arg(long)]
    passport: Option<PathBuf>,

    /// Identity document photo or scan (PNG, JPEG or PDF).
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Directory for the downloadable GatePass_{reg_no}.pdf.
    #[arg(short, long, env = "GATEPASS_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Where blobs and records go.
    #[arg(long, env = "GATEPASS_STORE", value_enum, default_value = "local")]
    store: StoreArg,

    /// Root directory for --store local.
    #[arg(long, env = "GATEPASS_DATA_DIR", default_value = "gatepass-data")]
    data_dir: PathBuf,

    /// Bucket name for --store s3 / gcs.
    #[arg(long, env = "GATEPASS_BUCKET")]
    bucket: Option<String>,

    /// S3 region.
    #[arg(long, env = "AWS_REGION")]
    #[cfg_attr(not(feature = "s3"), allow(dead_code))]
    region: Option<String>,

    /// S3-compatible endpoint URL (MinIO, R2, …).
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    #[cfg_attr(not(feature = "s3"), allow(dead_code))]
    endpoint: Option<String>,

    /// Record collection (key prefix of the JSON records).
    #[arg(long, env = "GATEPASS_COLLECTION", default_value = "gatepasses")]
    collection: String,

    /// Blob key prefix.
    #[arg(long, env = "GATEPASS_PREFIX", default_value = "gatepasses")]
    prefix: String,

    /// Vision model ID used for OCR.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Run the checks only; generate and store nothing.
    #[arg(long)]
    validate_only: bool,

    /// Print the stored record for this registration number and exit.
    #[arg(long, value_name = "REG_NO")]
    lookup: Option<String>,

    /// Print the stored record as JSON.
    #[arg(long, env = "GATEPASS_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "GATEPASS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GATEPASS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GATEPASS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StoreArg {
    /// Process memory; nothing survives the run.
    Memory,
    /// A local directory (--data-dir).
    Local,
    /// Amazon S3 or compatible (--bucket).
    S3,
    /// Google Cloud Storage (--bucket).
    Gcs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters, so library INFO logs
    // are only shown when it is off.
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

    // ── Lookup mode ──────────────────────────────────────────────────────
    if let Some(ref reg_no) = cli.lookup {
        let stores = build_stores(&cli)?;
        let record = stores
            .records
            .get(reg_no)
            .await
            .context("Failed to read record")?;
        match record {
            Some(record) if cli.json => println!(
                "{}",
                serde_json::to_string_pretty(&record).context("Failed to serialise record")?
            ),
            Some(record) => {
                println!("Name:             {}", record.name);
                println!("Registration No:  {}", record.reg_no);
                println!("Email:            {}", record.email);
                println!("Phone:            {}", record.phone);
                println!("QR:               {}", record.qr_path);
                println!("Gate pass:        {}", record.pdf_path);
                println!("Issued:           {}", record.created_at.to_rfc3339());
            }
            None => anyhow::bail!("No gate pass record for '{}'", reg_no),
        }
        return Ok(());
    }

    // ── Build inputs ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SubmissionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let submission = build_submission(&cli).await?;

    // ── Validate-only mode ───────────────────────────────────────────────
    if cli.validate_only {
        match check_submission(submission, &config).await {
            Ok(app) => {
                if !cli.quiet {
                    eprintln!(
                        "{} Submission for {} passes all checks",
                        green("✔"),
                        bold(&app.registration_number)
                    );
                }
                return Ok(());
            }
            Err(e) => return exit_on_rejection(e).context("Validation failed"),
        }
    }

    // ── Issue ────────────────────────────────────────────────────────────
    let stores = build_stores(&cli)?;
    let pass = match submit(submission, &stores, &config).await {
        Ok(pass) => pass,
        Err(e) => return exit_on_rejection(e).context("Failed to issue gate pass"),
    };

    let path = write_download(&pass, &cli.output_dir)
        .await
        .context("Failed to write gate pass")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&pass.record).context("Failed to serialise record")?
        );
    }
    if !cli.quiet {
        eprintln!(
            "{} Gate pass issued for {}  →  {}",
            green("✔"),
            bold(&pass.record.reg_no),
            bold(&path.display().to_string())
        );
    }

    Ok(())
}

/// Print a rejection's message and exit with [`EXIT_REJECTED`]; hand any
/// other error back to the caller.
fn exit_on_rejection(err: GatePassError) -> Result<()> {
    if let Some(rejection) = err.rejection() {
        eprintln!("{} {}", red("✘"), rejection);
        std::process::exit(EXIT_REJECTED);
    }
    Err(err.into())
}

/// Map CLI args to `GatePassConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GatePassConfig> {
    let mut builder = GatePassConfig::builder().blob_prefix(cli.prefix.clone());

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to a `Submission`; missing flags stay `None` so the
/// collector reports them.
async fn build_submission(cli: &Cli) -> Result<Submission> {
    Ok(Submission {
        name: cli.name.clone(),
        reg_no: cli.reg_no.clone(),
        phone: cli.phone.clone(),
        email: cli.email.clone(),
        passport: load_upload(cli.passport.as_deref()).await?,
        identity: load_upload(cli.identity.as_deref()).await?,
    })
}

async fn load_upload(path: Option<&Path>) -> Result<Option<UploadedDocument>> {
    match path {
        Some(path) => Ok(Some(read_upload(path).await?)),
        None => Ok(None),
    }
}

fn build_stores(cli: &Cli) -> Result<Stores> {
    let stores = match cli.store {
        StoreArg::Memory => Stores::in_memory(&cli.collection),
        StoreArg::Local => Stores::local(&cli.data_dir, &cli.collection)
            .with_context(|| format!("Failed to open store at {}", cli.data_dir.display()))?,
        StoreArg::S3 => s3_stores(cli)?,
        StoreArg::Gcs => gcs_stores(cli)?,
    };
    Ok(stores)
}

fn require_bucket(cli: &Cli) -> Result<&str> {
    cli.bucket
        .as_deref()
        .context("--bucket is required for cloud stores")
}

#[cfg(feature = "s3")]
fn s3_stores(cli: &Cli) -> Result<Stores> {
    let bucket = require_bucket(cli)?;
    Stores::s3(
        bucket,
        cli.region.as_deref(),
        cli.endpoint.as_deref(),
        &cli.collection,
    )
    .context("Failed to configure S3 store")
}

#[cfg(not(feature = "s3"))]
fn s3_stores(cli: &Cli) -> Result<Stores> {
    require_bucket(cli)?;
    anyhow::bail!("gatepass was built without S3 support; rebuild with --features s3")
}

#[cfg(feature = "gcs")]
fn gcs_stores(cli: &Cli) -> Result<Stores> {
    let bucket = require_bucket(cli)?;
    Stores::gcs(bucket, &cli.collection).context("Failed to configure GCS store")
}

#[cfg(not(feature = "gcs"))]
fn gcs_stores(cli: &Cli) -> Result<Stores> {
    require_bucket(cli)?;
    anyhow::bail!("gatepass was built without GCS support; rebuild with --features gcs")
}
