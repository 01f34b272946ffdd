//! Numeric user id extraction from profile lookup responses.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;

/// Response paths that may carry the id, highest precedence first.
const ID_PATHS: &[&str] = &[
    "/data/user_result_by_screen_name/result/rest_id",
    "/data/user_result_by_screen_name/result/id",
    "/data/user/result/rest_id",
    "/data/user/rest_id",
];

/// base64 of `User`; ids starting with this are encoded `User:<digits>` composites.
const ENCODED_ID_PREFIX: &str = "VXNlc";

/// Standard alphabet, lenient like a browser `atob`: padding is optional and
/// non-zero trailing bits are accepted.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// First non-empty id found along [`ID_PATHS`], decoded when encoded.
pub fn extract_user_id(body: &Value) -> Option<String> {
    let raw = ID_PATHS
        .iter()
        .filter_map(|path| body.pointer(path))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })?;

    Some(decode_user_id(&raw))
}

/// Turn an encoded `User:<digits>` id into `<digits>`.
///
/// Anything that does not carry the encoded prefix, or fails to decode, is
/// returned unchanged.
pub fn decode_user_id(raw: &str) -> String {
    if !raw.starts_with(ENCODED_ID_PREFIX) {
        return raw.to_string();
    }

    let decoded = match LENIENT.decode(raw) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to decode user ID {:?}: {}", raw, e);
            return raw.to_string();
        }
    };

    let decoded = match String::from_utf8(decoded) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Decoded user ID {:?} is not UTF-8: {}", raw, e);
            return raw.to_string();
        }
    };

    match decoded.split(':').nth(1).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            tracing::warn!("Decoded user ID {:?} has no numeric part", decoded);
            raw.to_string()
        }
    }
}
