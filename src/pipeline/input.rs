//! Input acquisition and classification.
//!
//! Turns a user-supplied path or URL into an [`InputFile`]: the raw bytes,
//! the media type the source declared (HTTP `Content-Type`, or one chosen by
//! the caller) and a display name. Classification into [`MediaKind`] is an
//! explicit three-way decision: declared MIME type first, then the file
//! extension, then magic bytes.

use crate::error::QrScanError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Three-way classification of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A single raster image (PNG, JPEG, GIF, BMP, WebP).
    Image,
    /// A multi-page document (PDF).
    Document,
    /// Anything else.
    #[default]
    Unsupported,
}

impl MediaKind {
    /// Classify from a MIME type such as `image/png` or `application/pdf`.
    ///
    /// Returns `None` when the MIME type is absent or too generic to decide
    /// (`application/octet-stream`).
    pub fn from_mime(mime: &str) -> Option<MediaKind> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "" | "application/octet-stream" | "binary/octet-stream" => None,
            "application/pdf" | "application/x-pdf" => Some(MediaKind::Document),
            "image/png" | "image/jpeg" | "image/jpg" | "image/pjpeg" | "image/gif"
            | "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" | "image/webp" | "image/*" => {
                Some(MediaKind::Image)
            }
            _ => Some(MediaKind::Unsupported),
        }
    }

    /// Classify from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<MediaKind> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(MediaKind::Document),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => Some(MediaKind::Image),
            _ => None,
        }
    }

    /// Classify from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> MediaKind {
        if bytes.starts_with(b"%PDF") {
            MediaKind::Document
        } else if image::guess_format(bytes).is_ok_and(is_decodable_image) {
            MediaKind::Image
        } else {
            MediaKind::Unsupported
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Document => "document",
            MediaKind::Unsupported => "unsupported",
        }
    }
}

/// Whether the enabled `image` codecs can decode `format`.
pub fn is_decodable_image(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::WebP
    )
}

/// An immutable input: bytes plus what the source said they are.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    bytes: Arc<[u8]>,
    declared_mime: Option<String>,
}

impl InputFile {
    /// Wrap in-memory bytes. `declared_mime` is what the supplier claims the
    /// bytes are; pass `None` to rely on extension and magic bytes.
    pub fn new(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        declared_mime: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            declared_mime,
        }
    }

    /// Shorthand for an input whose kind is already known.
    pub fn with_kind(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, kind: MediaKind) -> Self {
        let mime = match kind {
            MediaKind::Image => "image/*",
            MediaKind::Document => "application/pdf",
            MediaKind::Unsupported => "application/x-unsupported",
        };
        Self::new(name, bytes, Some(mime.to_string()))
    }

    /// Replace the declared MIME type.
    pub fn declare_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    /// Resolve the media kind: declared MIME, then extension, then magic bytes.
    pub fn classify(&self) -> MediaKind {
        if let Some(kind) = self.declared_mime.as_deref().and_then(MediaKind::from_mime) {
            return kind;
        }
        let ext_kind = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaKind::from_extension);
        if let Some(kind) = ext_kind {
            return kind;
        }
        MediaKind::sniff(&self.bytes)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an [`InputFile`].
///
/// URLs are downloaded (their `Content-Type` becomes the declared MIME
/// type); anything else is read from the local file system.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, QrScanError> {
    if input.trim().is_empty() {
        return Err(QrScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file into memory.
pub async fn read_local(path: &Path) -> Result<InputFile, QrScanError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => QrScanError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => QrScanError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => QrScanError::Internal(format!("reading {}: {}", path.display(), e)),
    })?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(InputFile::new(path.display().to_string(), bytes, None))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, QrScanError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QrScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QrScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            QrScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(QrScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let name = filename_from_url(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| QrScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!(
        "Downloaded {} bytes ({})",
        bytes.len(),
        declared_mime.as_deref().unwrap_or("no content type")
    );

    Ok(InputFile::new(name, bytes.to_vec(), declared_mime))
}

/// Last path segment of a URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    url.to_string()
}
