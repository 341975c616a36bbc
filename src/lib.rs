mod canvas;
mod debug;
mod error;
mod external;
mod glyph;
mod html;
mod inspect;
mod job;
mod layout;
mod logo;
mod metrics;
mod pdf;
mod png;
mod types;

pub use canvas::{Command, Page, PageSet};
pub use error::{PngError, ReportError};
pub use external::{BrowserLocator, DEFAULT_BROWSER_ENV, DEFAULT_TIMEOUT, default_candidates, file_url};
pub use glyph::{IconKind, IconSpacing, normalize_text, pdf_safe, substitute_icons};
pub use html::{build_report_html, escape_html, markdown_to_html};
pub use inspect::{InspectError, InspectErrorCode, PdfSummary, inspect_pdf_bytes, require_usable_pdf};
pub use job::{ReportJob, report_filename, split_markup_lines};
pub use layout::{
    Block, BlockKind, BulletIcon, LayoutConfig, LayoutEngine, classify, clean_line, layout_report,
    line_height, max_chars, wrap_text,
};
pub use logo::{EMBEDDED_LOGO, LogoSource, embedded_logo};
pub use metrics::RenderMetrics;
pub use pdf::{ObjectGraph, SerializedPdf, build_document, build_object_graph};
pub use png::{DecodedImage, decode_png};
pub use types::{Color, FontFace, Margins, Rect, Size};

use debug::{TraceEvent, TraceLog};
use error::ExternalError;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStrategy {
    /// Headless browser first, built-in writer when that fails.
    #[default]
    Auto,
    ManualOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyUsed {
    External,
    Manual,
}

impl StrategyUsed {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyUsed::External => "external",
            StrategyUsed::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub strategy: StrategyUsed,
}

#[derive(Debug, Clone)]
pub struct ReportRenderer {
    strategy: RenderStrategy,
    locator: BrowserLocator,
    external_timeout: Duration,
    validate_external_output: bool,
    logo: LogoSource,
    layout: LayoutConfig,
    trace: Option<TraceLog>,
}

#[derive(Clone)]
pub struct ReportRendererBuilder {
    strategy: RenderStrategy,
    locator: BrowserLocator,
    external_timeout: Duration,
    validate_external_output: bool,
    logo_png: Option<Vec<u8>>,
    logo_disabled: bool,
    layout: LayoutConfig,
    debug_path: Option<PathBuf>,
}

struct ExternalOutput {
    bytes: Vec<u8>,
    page_count: usize,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            strategy: RenderStrategy::Auto,
            locator: BrowserLocator::default(),
            external_timeout: DEFAULT_TIMEOUT,
            validate_external_output: true,
            logo: LogoSource::Embedded,
            layout: LayoutConfig::default(),
            trace: None,
        }
    }
}

impl ReportRenderer {
    pub fn builder() -> ReportRendererBuilder {
        ReportRendererBuilder::new()
    }

    pub fn render(&self, job: &ReportJob) -> Result<RenderedReport, ReportError> {
        self.render_with_metrics(job).map(|(report, _)| report)
    }

    /// Renders `job`, preferring the external browser unless configured
    /// otherwise. Browser failures of any kind fall through to the built-in
    /// writer; the only error a caller can see is an inconsistent object graph.
    pub fn render_with_metrics(
        &self,
        job: &ReportJob,
    ) -> Result<(RenderedReport, RenderMetrics), ReportError> {
        let started = Instant::now();
        let filename = report_filename(&job.domain);
        let mut fallback_reason = None;

        if self.strategy == RenderStrategy::Auto {
            match self.try_external(job) {
                Ok(output) => {
                    let metrics = RenderMetrics {
                        strategy: StrategyUsed::External,
                        page_count: output.page_count,
                        object_count: None,
                        total_bytes: output.bytes.len(),
                        render_ms: started.elapsed().as_secs_f64() * 1000.0,
                        logo_embedded: self.logo.png_bytes().is_some(),
                        fallback_reason: None,
                    };
                    self.trace_strategy(job, &metrics);
                    let report = RenderedReport {
                        bytes: output.bytes,
                        filename,
                        strategy: StrategyUsed::External,
                    };
                    return Ok((report, metrics));
                }
                Err(err) => {
                    match &err {
                        ExternalError::NotFound => {
                            log::debug!("no browser available for {}, using built-in writer", job.domain)
                        }
                        _ => log::warn!(
                            "browser rendering failed for {}: {err}; using built-in writer",
                            job.domain
                        ),
                    }
                    let reason = err.to_string();
                    if let Some(trace) = &self.trace {
                        trace.record(TraceEvent::Fallback {
                            domain: &job.domain,
                            reason: &reason,
                        });
                    }
                    fallback_reason = Some(reason);
                }
            }
        }

        let image = self.logo.image();
        let pages = layout_report(job, image, self.layout);
        let pdf = pdf::build_document(&pages, image)?;
        log::debug!(
            "built {} page(s), {} objects, {} bytes for {}",
            pages.len(),
            pdf.object_count(),
            pdf.bytes.len(),
            job.domain
        );
        if let Some(trace) = &self.trace {
            trace.record(TraceEvent::PdfSummary {
                pages: pages.len(),
                objects: pdf.object_count(),
                commands: pages.command_count(),
                bytes: pdf.bytes.len(),
                xref_offset: pdf.xref_start,
            });
        }

        let metrics = RenderMetrics {
            strategy: StrategyUsed::Manual,
            page_count: pages.len(),
            object_count: Some(pdf.object_count()),
            total_bytes: pdf.bytes.len(),
            render_ms: started.elapsed().as_secs_f64() * 1000.0,
            logo_embedded: image.is_some(),
            fallback_reason,
        };
        self.trace_strategy(job, &metrics);
        let report = RenderedReport {
            bytes: pdf.bytes,
            filename,
            strategy: StrategyUsed::Manual,
        };
        Ok((report, metrics))
    }

    fn try_external(&self, job: &ReportJob) -> Result<ExternalOutput, ExternalError> {
        let binary = self.locator.resolve().ok_or(ExternalError::NotFound)?;
        log::debug!("printing {} with {}", job.domain, binary.display());
        let html = build_report_html(job, self.logo.png_bytes());
        let bytes = external::render_with_browser(&binary, &html, self.external_timeout)?;
        let page_count = if self.validate_external_output {
            require_usable_pdf(&bytes)
                .map_err(|err| ExternalError::InvalidOutput(err.to_string()))?
                .page_count
        } else {
            if !bytes.starts_with(b"%PDF-") {
                return Err(ExternalError::InvalidOutput(
                    "missing %PDF- signature".to_string(),
                ));
            }
            inspect_pdf_bytes(&bytes).map_or(0, |summary| summary.page_count)
        };
        Ok(ExternalOutput { bytes, page_count })
    }

    fn trace_strategy(&self, job: &ReportJob, metrics: &RenderMetrics) {
        let Some(trace) = &self.trace else {
            return;
        };
        trace.record(TraceEvent::Strategy {
            domain: &job.domain,
            strategy: metrics.strategy,
            pages: metrics.page_count,
            bytes: metrics.total_bytes,
            logo: metrics.logo_embedded,
        });
        trace.finish_render(&job.domain);
    }
}

impl Default for ReportRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRendererBuilder {
    pub fn new() -> Self {
        Self {
            strategy: RenderStrategy::Auto,
            locator: BrowserLocator::default(),
            external_timeout: DEFAULT_TIMEOUT,
            validate_external_output: true,
            logo_png: None,
            logo_disabled: false,
            layout: LayoutConfig::default(),
            debug_path: None,
        }
    }

    pub fn strategy(mut self, strategy: RenderStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    // Checked before the environment override and the candidate list.
    pub fn browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.locator.explicit = Some(path.into());
        self
    }

    // `None` turns the environment lookup off.
    pub fn browser_env_var(mut self, name: Option<&str>) -> Self {
        self.locator.env_var = name.map(str::to_string);
        self
    }

    pub fn browser_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.locator.candidates = candidates;
        self
    }

    pub fn external_timeout(mut self, timeout: Duration) -> Self {
        self.external_timeout = timeout;
        self
    }

    pub fn validate_external_output(mut self, enabled: bool) -> Self {
        self.validate_external_output = enabled;
        self
    }

    // Replaces the embedded logo. Decoded once in `build()`.
    pub fn logo_bytes(mut self, png: Vec<u8>) -> Self {
        self.logo_png = Some(png);
        self.logo_disabled = false;
        self
    }

    pub fn no_logo(mut self) -> Self {
        self.logo_png = None;
        self.logo_disabled = true;
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    // JSONL trace of strategy decisions, fallbacks and writer summaries.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ReportRenderer, ReportError> {
        if self.external_timeout.is_zero() {
            return Err(ReportError::InvalidConfiguration(
                "external_timeout must be greater than zero".to_string(),
            ));
        }
        let content_width = self.layout.content_width();
        if !content_width.is_finite() || content_width <= 0.0 {
            return Err(ReportError::InvalidConfiguration(
                "layout margins leave no room for content".to_string(),
            ));
        }
        let trace = match &self.debug_path {
            Some(path) => Some(TraceLog::create(path)?),
            None => None,
        };
        let logo = if self.logo_disabled {
            LogoSource::Disabled
        } else {
            match self.logo_png {
                Some(png) => LogoSource::custom(png),
                None => LogoSource::Embedded,
            }
        };
        Ok(ReportRenderer {
            strategy: self.strategy,
            locator: self.locator,
            external_timeout: self.external_timeout,
            validate_external_output: self.validate_external_output,
            logo,
            layout: self.layout,
            trace,
        })
    }
}

/// Renders with default settings: browser when one is installed, built-in
/// writer otherwise.
pub fn render_report(job: &ReportJob) -> Result<RenderedReport, ReportError> {
    ReportRenderer::default().render(job)
}
