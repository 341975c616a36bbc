use crate::png::{DecodedImage, decode_png};
use std::sync::OnceLock;

/// Brand logo compiled into the binary.
pub const EMBEDDED_LOGO: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/logo-transparent.png"
));

static EMBEDDED_LOGO_DECODED: OnceLock<Option<DecodedImage>> = OnceLock::new();

/// Decoded embedded logo, shared read-only by every render in the process.
/// The first caller decodes; a decode failure is remembered as `None`.
pub fn embedded_logo() -> Option<&'static DecodedImage> {
    EMBEDDED_LOGO_DECODED
        .get_or_init(|| match decode_png(EMBEDDED_LOGO) {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("embedded logo unavailable: {err}");
                None
            }
        })
        .as_ref()
}

/// Where a renderer gets its logo from.
#[derive(Debug, Clone, Default)]
pub enum LogoSource {
    #[default]
    Embedded,
    /// Caller-supplied PNG, decoded once when the renderer is built.
    Custom {
        png: Vec<u8>,
        decoded: Option<DecodedImage>,
    },
    Disabled,
}

impl LogoSource {
    pub fn custom(png: Vec<u8>) -> Self {
        let decoded = match decode_png(&png) {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("custom logo unavailable: {err}");
                None
            }
        };
        LogoSource::Custom { png, decoded }
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        match self {
            LogoSource::Embedded => embedded_logo(),
            LogoSource::Custom { decoded, .. } => decoded.as_ref(),
            LogoSource::Disabled => None,
        }
    }

    /// Original PNG bytes, used to inline the logo into the browser document.
    pub fn png_bytes(&self) -> Option<&[u8]> {
        match self {
            LogoSource::Embedded => Some(EMBEDDED_LOGO),
            LogoSource::Custom { png, .. } => Some(png.as_slice()),
            LogoSource::Disabled => None,
        }
    }
}
