//! QR payload encoding and QR image rendering.
//!
//! The payload is a fixed-order, pipe-delimited key/value string:
//!
//! ```text
//! Name:Asha Rao|RegNo:SS-2024-001|Email:asha@example.com|Phone:9876543210
//! ```
//!
//! `\`, `|` and `:` inside a value are escaped with a backslash, so a name
//! containing a pipe still parses back to the same four fields. Values without
//! those characters produce exactly the plain string above.

use crate::error::GatePassError;
use crate::model::Application;
use crate::pipeline::encode::encode_png;
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use tracing::debug;

const FIELD_NAMES: [&str; 4] = ["Name", "RegNo", "Email", "Phone"];

/// The four applicant fields carried by the QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub phone: String,
}

impl QrPayload {
    pub fn from_application(app: &Application) -> Self {
        Self {
            name: app.name.clone(),
            reg_no: app.registration_number.clone(),
            email: app.email.clone(),
            phone: app.phone.clone(),
        }
    }

    /// Serialise to the pipe-delimited payload string.
    pub fn encode(&self) -> String {
        let values = [&self.name, &self.reg_no, &self.email, &self.phone];
        FIELD_NAMES
            .iter()
            .zip(values)
            .map(|(key, value)| format!("{}:{}", key, escape(value)))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Parse a payload produced by [`QrPayload::encode`].
    ///
    /// Returns `None` if the string does not have exactly the four expected
    /// keys in order.
    pub fn parse(payload: &str) -> Option<Self> {
        let fields = split_unescaped(payload, '|');
        if fields.len() != FIELD_NAMES.len() {
            return None;
        }
        let mut values = Vec::with_capacity(4);
        for (field, expected) in fields.iter().zip(FIELD_NAMES) {
            let parts = split_unescaped(field, ':');
            match parts.as_slice() {
                [key, value] if unescape(key) == expected => values.push(unescape(value)),
                _ => return None,
            }
        }
        let mut values = values.into_iter();
        Some(Self {
            name: values.next()?,
            reg_no: values.next()?,
            email: values.next()?,
            phone: values.next()?,
        })
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '|' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split on `sep` where it is not preceded by an escaping backslash.
/// Escapes are left in place for [`unescape`].
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Render `payload` as a black-on-white QR code PNG at least `size_px` wide.
pub fn render_qr_png(payload: &str, size_px: u32) -> Result<Vec<u8>, GatePassError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| GatePassError::QrEncodingFailed(e.to_string()))?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(size_px, size_px)
        .build();
    debug!(
        "QR code version {:?} rendered at {}x{} px",
        code.version(),
        img.width(),
        img.height()
    );
    encode_png(&DynamicImage::ImageLuma8(img))
        .map_err(|e| GatePassError::QrEncodingFailed(e.to_string()))
}
