use base64::Engine;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::CodecError;

/// Characters left untouched when encoding a single query component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn url_encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Malformed escapes are kept verbatim and invalid UTF-8 is replaced.
pub fn url_decode_str(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

pub fn base64_encode_bytes(input: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

pub fn base64_encode_str(input: &str) -> String {
    base64_encode_bytes(input.as_bytes())
}

pub fn base64_decode_bytes(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|err| CodecError::Base64(err.to_string()))
}

pub fn base64_decode_str(input: &str) -> Result<Vec<u8>, CodecError> {
    base64_decode_bytes(input.as_bytes())
}

pub fn bytes_to_string_lossy(input: &[u8]) -> String {
    String::from_utf8_lossy(input).into_owned()
}
