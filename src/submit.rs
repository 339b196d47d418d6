//! Submission entry points.
//!
//! [`submit`] runs the whole pipeline for one applicant: collect, validate,
//! generate, persist. [`check_submission`] stops after validation and touches
//! no store, which is what the CLI's `--validate-only` uses.
//!
//! Every rejection is reported before anything is written; see
//! [`crate::pipeline::persist`] for what happens when a write itself fails.

use crate::config::GatePassConfig;
use crate::error::GatePassError;
use crate::model::{download_name, Application, GeneratedArtifacts, IssuedPass, Submission};
use crate::pipeline::input::CollectedInput;
use crate::pipeline::qr::{render_qr_png, QrPayload};
use crate::pipeline::validate::ValidatedUploads;
use crate::pipeline::document::{PassComposer, PdfiumComposer};
use crate::pipeline::{input, ocr, persist, validate};
use crate::progress::Stage;
use crate::store::Stores;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Validate a submission, generate its gate pass and store everything.
///
/// # Returns
/// `Ok(IssuedPass)` with the stored record and the PDF bytes to offer as
/// `GatePass_{reg_no}.pdf`.
///
/// # Errors
/// * [`GatePassError::Rejected`]: a check failed. Show
///   [`GatePassError::user_message`] to the applicant; nothing was written.
/// * Storage, OCR and composition failures as their own variants.
///
/// # Example
/// ```rust,no_run
/// use gatepass::{submit, GatePassConfig, Stores, Submission, UploadedDocument};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let submission = Submission {
///     name: Some("Asha Rao".into()),
///     reg_no: Some("SS-2024-001".into()),
///     phone: Some("9876543210".into()),
///     email: Some("asha@example.com".into()),
///     passport: Some(UploadedDocument::new(std::fs::read("photo.jpg")?, "image/jpeg")),
///     identity: Some(UploadedDocument::new(std::fs::read("aadhar.pdf")?, "application/pdf")),
/// };
/// let stores = Stores::local("./data", "gatepasses")?;
/// let pass = submit(submission, &stores, &GatePassConfig::default()).await?;
/// std::fs::write(&pass.download_name, &pass.document)?;
/// # Ok(())
/// # }
/// ```
pub async fn submit(
    submission: Submission,
    stores: &Stores,
    config: &GatePassConfig,
) -> Result<IssuedPass, GatePassError> {
    let result = issue(submission, stores, config).await;
    report(config, &result);
    result
}

async fn issue(
    submission: Submission,
    stores: &Stores,
    config: &GatePassConfig,
) -> Result<IssuedPass, GatePassError> {
    let total_start = Instant::now();

    // ── Step 1: Collect ──────────────────────────────────────────────────
    let collected = run_collect(submission, config)?;
    let reg_no = collected.application.registration_number.clone();
    info!("Processing submission {}", reg_no);

    // ── Step 2: Validate ─────────────────────────────────────────────────
    let validated = run_validate(&collected, config).await?;

    // ── Step 3: Generate ─────────────────────────────────────────────────
    stage_start(config, Stage::Generate);
    let artifacts = generate(&collected.application, validated, config).await?;
    stage_complete(config, Stage::Generate);

    // ── Step 4: Persist ──────────────────────────────────────────────────
    stage_start(config, Stage::Persist);
    let record = persist::persist(
        stores,
        &config.blob_prefix,
        &collected.application,
        &collected.passport,
        &collected.identity,
        &artifacts,
    )
    .await?;
    stage_complete(config, Stage::Persist);

    info!(
        "Gate pass issued for {} in {}ms",
        reg_no,
        total_start.elapsed().as_millis()
    );

    Ok(IssuedPass {
        download_name: download_name(&record.reg_no),
        record,
        document: artifacts.document_pdf,
        qr_png: artifacts.qr_png,
        qr_payload: artifacts.qr_payload,
    })
}

/// Run collection and validation only.
///
/// Needs a recognizer for the legibility check but no store; nothing is
/// generated or written.
pub async fn check_submission(
    submission: Submission,
    config: &GatePassConfig,
) -> Result<Application, GatePassError> {
    let result = collect_and_validate(submission, config).await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        if let Some(rejection) = e.rejection() {
            cb.on_rejected(rejection);
        }
    }
    result
}

/// Synchronous wrapper around [`submit`].
///
/// Creates a temporary tokio runtime internally.
pub fn submit_sync(
    submission: Submission,
    stores: &Stores,
    config: &GatePassConfig,
) -> Result<IssuedPass, GatePassError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| GatePassError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(submit(submission, stores, config))
}

/// Write the downloadable copy of an issued pass into `dir`.
///
/// Uses atomic write (temp file + rename) so a reader never sees a partial PDF.
pub async fn write_download(pass: &IssuedPass, dir: impl AsRef<Path>) -> Result<PathBuf, GatePassError> {
    let dir = dir.as_ref();
    let path = dir.join(&pass.download_name);
    let write_err = |e: std::io::Error| GatePassError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &pass.document)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

    debug!("Wrote {} ({} bytes)", path.display(), pass.document.len());
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn collect_and_validate(
    submission: Submission,
    config: &GatePassConfig,
) -> Result<Application, GatePassError> {
    let collected = run_collect(submission, config)?;
    run_validate(&collected, config).await?;
    Ok(collected.application)
}

fn run_collect(
    submission: Submission,
    config: &GatePassConfig,
) -> Result<CollectedInput, GatePassError> {
    stage_start(config, Stage::Collect);
    let collected = input::collect(submission)?;
    stage_complete(config, Stage::Collect);
    Ok(collected)
}

async fn run_validate(
    collected: &CollectedInput,
    config: &GatePassConfig,
) -> Result<ValidatedUploads, GatePassError> {
    stage_start(config, Stage::Validate);
    let recognizer = ocr::resolve_recognizer(config)?;
    let validated = validate::validate_uploads(collected, recognizer.as_ref(), config).await?;
    stage_complete(config, Stage::Validate);
    Ok(validated)
}

async fn generate(
    app: &Application,
    validated: ValidatedUploads,
    config: &GatePassConfig,
) -> Result<GeneratedArtifacts, GatePassError> {
    let qr_payload = QrPayload::from_application(app).encode();
    let qr_png = render_qr_png(&qr_payload, config.qr_size_px)?;
    let photo = Some(validated.photo);
    let document_pdf = match &config.composer {
        Some(composer) => composer.compose(app, photo, &qr_png, config).await?,
        None => PdfiumComposer.compose(app, photo, &qr_png, config).await?,
    };
    Ok(GeneratedArtifacts {
        qr_payload,
        qr_png,
        document_pdf,
    })
}

fn stage_start(config: &GatePassConfig, stage: Stage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(config: &GatePassConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage);
    }
}

fn report(config: &GatePassConfig, result: &Result<IssuedPass, GatePassError>) {
    match result {
        Ok(pass) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_issued(&pass.record.reg_no);
            }
        }
        Err(GatePassError::Rejected(rejection)) => {
            info!("Submission rejected: {}", rejection);
            if let Some(ref cb) = config.progress_callback {
                cb.on_rejected(rejection);
            }
        }
        Err(_) => {}
    }
}
