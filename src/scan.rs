//! One-shot entry points.
//!
//! Each call builds a fresh [`Orchestrator`] with the production backends
//! (PDFium and `rqrr`), submits a single input and returns its outcome.
//! Hold an [`Orchestrator`] yourself when you want to observe state changes,
//! cancel a scan, or reuse one configuration across many files.

use crate::config::ScanConfig;
use crate::error::QrScanError;
use crate::orchestrator::Orchestrator;
use crate::output::{InputSummary, ScanOutcome};
use crate::pipeline::document::{DocumentRenderer, PdfiumRenderer};
use crate::pipeline::frames::FrameSource;
use crate::pipeline::input::{self, InputFile, MediaKind};
use tracing::info;

/// Scan a local file or HTTP/HTTPS URL for a QR symbol.
///
/// # Returns
/// `Ok(ScanOutcome)` once the input was acquired. Decoding and rendering
/// problems are reported inside the outcome (`outcome.failure`), not as
/// `Err`.
///
/// # Errors
/// Only input acquisition fails here:
/// - File not found / permission denied
/// - Download failure or timeout
/// - Empty input string
///
/// # Example
/// ```rust,no_run
/// use qrscan::{scan, ScanConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = scan("ticket.pdf", &ScanConfig::default()).await?;
/// match outcome.payload() {
///     Some(text) => println!("{text}"),
///     None => eprintln!("no QR code"),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn scan(
    input_str: impl AsRef<str>,
    config: &ScanConfig,
) -> Result<ScanOutcome, QrScanError> {
    let file = acquire(input_str, config).await?;
    Ok(scan_file(file, config).await)
}

/// Read a local file or download a URL, honouring the config's download
/// timeout and `declared_mime` override.
pub async fn acquire(
    input_str: impl AsRef<str>,
    config: &ScanConfig,
) -> Result<InputFile, QrScanError> {
    let file = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    Ok(match &config.declared_mime {
        Some(mime) => file.declare_mime(mime.clone()),
        None => file,
    })
}

/// Scan an already-acquired [`InputFile`].
pub async fn scan_file(file: InputFile, config: &ScanConfig) -> ScanOutcome {
    Orchestrator::new(config.clone()).submit(file).await
}

/// Scan bytes held in memory.
///
/// `declared_mime` plays the role of an upload's declared content type;
/// pass `None` to classify by content sniffing alone.
pub async fn scan_bytes(
    bytes: impl Into<Vec<u8>>,
    declared_mime: Option<&str>,
    config: &ScanConfig,
) -> ScanOutcome {
    let file = InputFile::new("<memory>", bytes.into(), declared_mime.map(str::to_string));
    scan_file(file, config).await
}

/// Synchronous wrapper around [`scan`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync(
    input_str: impl AsRef<str>,
    config: &ScanConfig,
) -> Result<ScanOutcome, QrScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QrScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan(input_str, config))
}

/// Classify an input and count its frames without decoding anything.
///
/// Documents are opened (not rendered) to read the page count, using
/// `config.password` for encrypted ones. Acquisition follows [`acquire`].
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ScanConfig,
) -> Result<InputSummary, QrScanError> {
    let file = acquire(input_str, config).await?;
    inspect_file(file, &PdfiumRenderer, config.password.clone()).await
}

pub(crate) async fn inspect_file<R>(
    file: InputFile,
    renderer: &R,
    password: Option<String>,
) -> Result<InputSummary, QrScanError>
where
    R: DocumentRenderer + Clone + 'static,
{
    let kind = file.classify();
    let renderer = renderer.clone();

    let summary = tokio::task::spawn_blocking(move || {
        let (media_kind, frame_count) =
            match FrameSource::new(&renderer).count(&file, kind, password.as_deref()) {
                Ok(count) => (kind, count),
                Err(e) if e.is_unsupported() => (MediaKind::Unsupported, 0),
                Err(e) => return Err(e),
            };
        Ok::<_, QrScanError>(InputSummary {
            name: file.name().to_string(),
            media_kind,
            byte_len: file.bytes().len(),
            frame_count,
        })
    })
    .await
    .map_err(|e| QrScanError::Internal(format!("Inspect task panicked: {}", e)))??;

    info!(
        "Inspected '{}': {} with {} frame(s)",
        summary.name,
        summary.media_kind.as_str(),
        summary.frame_count
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ScanResult;
    use crate::pipeline::testing::{png_bytes, qr_png, FakeRenderer};
    use image::Rgba;
    use std::io::Write;

    #[tokio::test]
    async fn scan_bytes_finds_symbol() {
        let outcome = scan_bytes(qr_png("from memory"), Some("image/png"), &ScanConfig::default()).await;
        assert_eq!(outcome.result, ScanResult::Found("from memory".into()));
        assert_eq!(outcome.report.input_name, "<memory>");
    }

    #[tokio::test]
    async fn scan_bytes_blank_image_is_not_found() {
        let bytes = png_bytes(32, 32, Rgba([255, 255, 255, 255]));
        let outcome = scan_bytes(bytes, None, &ScanConfig::default()).await;
        assert_eq!(outcome.result, ScanResult::NotFound);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn scan_reads_local_file() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&qr_png("on disk")).unwrap();

        let outcome = scan(tmp.path().to_str().unwrap(), &ScanConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.payload(), Some("on disk"));
    }

    #[tokio::test]
    async fn scan_missing_file_is_err() {
        let err = scan("/definitely/not/here.png", &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QrScanError::FileNotFound { .. }));
    }

    #[test]
    fn scan_sync_runs_without_runtime() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&qr_png("sync")).unwrap();

        let outcome = scan_sync(tmp.path().to_str().unwrap(), &ScanConfig::default()).unwrap();
        assert_eq!(outcome.payload(), Some("sync"));
    }

    #[tokio::test]
    async fn inspect_counts_document_pages() {
        let file = InputFile::with_kind("doc.pdf", b"%PDF-1.7".to_vec(), MediaKind::Document);
        let summary = inspect_file(file, &FakeRenderer::new(7), None).await.unwrap();
        assert_eq!(summary.media_kind, MediaKind::Document);
        assert_eq!(summary.frame_count, 7);
        assert_eq!(summary.byte_len, 8);
    }

    #[tokio::test]
    async fn inspect_unsupported_has_no_frames() {
        let file = InputFile::new("notes.txt", b"hello".to_vec(), Some("text/plain".into()));
        let summary = inspect_file(file, &FakeRenderer::new(0), None).await.unwrap();
        assert_eq!(summary.media_kind, MediaKind::Unsupported);
        assert_eq!(summary.frame_count, 0);
    }

    #[tokio::test]
    async fn inspect_opens_encrypted_document_with_password() {
        let renderer = FakeRenderer::new(3).encrypted("s3cret");
        let file = InputFile::with_kind("locked.pdf", b"%PDF-1.7".to_vec(), MediaKind::Document);

        let summary = inspect_file(file.clone(), &renderer, Some("s3cret".into()))
            .await
            .unwrap();
        assert_eq!(summary.frame_count, 3);

        let err = inspect_file(file.clone(), &renderer, None).await.unwrap_err();
        assert!(matches!(err, QrScanError::PasswordRequired { .. }));
        let err = inspect_file(file, &renderer, Some("guess".into())).await.unwrap_err();
        assert!(matches!(err, QrScanError::WrongPassword { .. }));
    }

    #[tokio::test]
    async fn acquire_applies_declared_mime_override() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&qr_png("relabelled")).unwrap();
        let path = tmp.path().to_str().unwrap();

        let plain = acquire(path, &ScanConfig::default()).await.unwrap();
        assert_eq!(plain.classify(), MediaKind::Image);

        let config = ScanConfig::builder().declared_mime("text/plain").build().unwrap();
        let relabelled = acquire(path, &config).await.unwrap();
        assert_eq!(relabelled.declared_mime(), Some("text/plain"));
        assert_eq!(relabelled.classify(), MediaKind::Unsupported);
    }

    #[tokio::test]
    async fn inspect_honours_declared_mime() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&qr_png("relabelled")).unwrap();
        let config = ScanConfig::builder().declared_mime("text/plain").build().unwrap();

        let summary = inspect(tmp.path().to_str().unwrap(), &config).await.unwrap();
        assert_eq!(summary.media_kind, MediaKind::Unsupported);
        assert_eq!(summary.frame_count, 0);
    }

    #[tokio::test]
    async fn scan_honours_declared_mime() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&qr_png("relabelled")).unwrap();
        let config = ScanConfig::builder().declared_mime("text/plain").build().unwrap();

        let outcome = scan(tmp.path().to_str().unwrap(), &config).await.unwrap();
        assert_eq!(outcome.result, ScanResult::NotFound);
        assert!(outcome.is_unsupported());
    }
}
