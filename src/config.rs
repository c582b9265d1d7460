//! Configuration types for QR scanning.
//!
//! All scan behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. Every knob lives in one struct so a config can be
//! shared with the blocking scan task, logged, and compared between runs.

use crate::error::QrScanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a scan.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use qrscan::{FramePolicy, ScanConfig};
///
/// let config = ScanConfig::builder()
///     .render_scale(2.0)
///     .frame_policy(FramePolicy::FailFast)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Scale factor applied to each PDF page's natural size. Range: 0.25–8.0. Default: 1.0.
    ///
    /// At 1.0 one PDF point becomes one pixel. Raise it for documents with
    /// small printed codes whose modules fall below a pixel at that size.
    pub render_scale: f32,

    /// Page selection for documents. Default: all pages. Ignored for images.
    pub pages: PageSelection,

    /// What to do when a single page fails to render. Default: skip it.
    pub frame_policy: FramePolicy,

    /// Which luminance polarities the decoder tries. Default: [`InversionMode::Both`].
    pub inversion: InversionMode,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Content type to classify acquired inputs by, replacing whatever the
    /// file extension or a download's `Content-Type` header says.
    pub declared_mime: Option<String>,

    /// Optional per-frame progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            pages: PageSelection::default(),
            frame_policy: FramePolicy::default(),
            inversion: InversionMode::default(),
            password: None,
            download_timeout_secs: 120,
            declared_mime: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("render_scale", &self.render_scale)
            .field("pages", &self.pages)
            .field("frame_policy", &self.frame_policy)
            .field("inversion", &self.inversion)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("declared_mime", &self.declared_mime)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = if scale.is_finite() {
            scale.clamp(0.25, 8.0)
        } else {
            scale
        };
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn frame_policy(mut self, policy: FramePolicy) -> Self {
        self.config.frame_policy = policy;
        self
    }

    pub fn inversion(mut self, mode: InversionMode) -> Self {
        self.config.inversion = mode;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn declared_mime(mut self, mime: impl Into<String>) -> Self {
        self.config.declared_mime = Some(mime.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, QrScanError> {
        let c = &self.config;
        if !c.render_scale.is_finite() {
            return Err(QrScanError::InvalidConfig(format!(
                "render scale must be a finite number, got {}",
                c.render_scale
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(QrScanError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start > end {
                return Err(QrScanError::InvalidConfig(format!(
                    "page range {start}-{end} is reversed"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a page that fails to render affects the rest of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FramePolicy {
    /// Record the failure and keep scanning later pages. (default)
    #[default]
    SkipAndContinue,
    /// Abort the whole scan on the first page that fails to render.
    FailFast,
}

/// Which polarity of the frame the decoder looks at.
///
/// Dark-on-light is the printed norm, but screenshots of dark-mode apps and
/// some tickets carry light-on-dark symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InversionMode {
    /// Only the frame as-is.
    Normal,
    /// Only the inverted frame.
    Inverted,
    /// As-is first, then inverted. (default)
    #[default]
    Both,
    /// Inverted first, then as-is.
    InvertedFirst,
}

impl InversionMode {
    /// The passes to attempt, in order. `true` means "invert luminance".
    pub fn passes(self) -> &'static [bool] {
        match self {
            InversionMode::Normal => &[false],
            InversionMode::Inverted => &[true],
            InversionMode::Both => &[false, true],
            InversionMode::InvertedFirst => &[true, false],
        }
    }
}

/// Specifies which pages of a document to scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Scan all pages (default).
    #[default]
    All,
    /// Scan a single page (1-indexed).
    Single(usize),
    /// Scan a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Scan specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    ///
    /// Sorting keeps scan order equal to page order regardless of how the
    /// set was written.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// First requested page (1-indexed), used for out-of-range diagnostics.
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }
}
