use std::io;
use thiserror::Error;

/// Failures while decoding a PNG container. These never escape a render call:
/// the renderer treats any of them as "no logo available".
#[derive(Debug, Error)]
pub enum PngError {
    #[error("png: invalid signature")]
    InvalidSignature,
    #[error("png: missing IHDR chunk")]
    MissingHeader,
    #[error("png: interlace method {0} not supported")]
    InterlaceUnsupported(u8),
    #[error("png: bit depth {0} not supported")]
    BitDepthUnsupported(u8),
    #[error("png: color type {0} not supported")]
    ColorTypeUnsupported(u8),
    #[error("png: unknown scanline filter {0}")]
    UnknownFilter(u8),
    #[error("png: truncated data")]
    Truncated,
    #[error("png: inflate failed: {0}")]
    Inflate(#[source] io::Error),
}

/// Failures of the headless-browser path. Absorbed by the renderer, which
/// falls back to the built-in PDF writer on every variant.
#[derive(Debug, Error)]
pub(crate) enum ExternalError {
    #[error("no browser binary found")]
    NotFound,
    #[error("failed to prepare scratch directory: {0}")]
    Workspace(#[source] io::Error),
    #[error("failed to spawn browser: {0}")]
    Spawn(#[source] io::Error),
    #[error("browser did not finish within {0} ms")]
    Timeout(u128),
    #[error("browser exited with status {0:?}")]
    Failed(Option<i32>),
    #[error("failed to read browser output: {0}")]
    Read(#[source] io::Error),
    #[error("browser output rejected: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    /// An object id inside the document's id range has no content. The
    /// writer itself is inconsistent, so no document can be produced.
    #[error("pdf object {0} missing from object graph")]
    MissingObject(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
