//! QR code encoder

use crate::error::{Error, Result};
use crate::qr::ModuleMatrix;
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode, Version};

/// QR encoder producing module matrices at error-correction level H.
///
/// Level H is the only level offered. The compositor perturbs every
/// non-finder module (dots, partial opacity, exposed background), and only
/// the ~30% recovery budget of level H absorbs that.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrEncoder;

impl QrEncoder {
    /// Error-correction level used for every encode.
    pub const EC_LEVEL: EcLevel = EcLevel::H;

    /// Create a new encoder
    pub fn new() -> Self {
        Self
    }

    /// Encode a text payload into a module matrix.
    pub fn encode(&self, payload: &str) -> Result<ModuleMatrix> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), Self::EC_LEVEL)
            .map_err(|e| match e {
                QrError::DataTooLong => Error::PayloadTooLong {
                    length: payload.len(),
                },
                other => Error::QrEncode(format!("Failed to create QR code: {other}")),
            })?;

        let version = match code.version() {
            Version::Normal(v) | Version::Micro(v) => v,
        };
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();

        tracing::debug!(
            version,
            width = code.width(),
            length = payload.len(),
            "Encoded QR payload"
        );

        ModuleMatrix::from_modules(code.width(), version, modules)
    }
}
