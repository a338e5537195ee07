//! Strict URI component coding.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::BridgeError;

/// Characters left unescaped by a URI component encoder.
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

/// Percent-encode a cookie value the way the page stores it.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Decode a percent-encoded URI component.
///
/// Unlike form decoding this is strict: a stray `%` or an escape sequence that
/// does not decode to UTF-8 is an error.
pub fn decode_component(encoded: &str) -> Result<String, BridgeError> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !valid {
                return Err(BridgeError::MalformedEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| BridgeError::InvalidUtf8)
}
