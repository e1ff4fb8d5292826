pub(crate) const CSRF_COOKIE: &str = "csrftoken";

/// Finds `name` in a raw `document.cookie` string. Values are
/// percent-decoded the way the server wrote them.
pub(crate) fn cookie_value(raw: &str, name: &str) -> Option<String> {
    for part in raw.split(';') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if key == name {
            return Some(percent_decode(value));
        }
    }
    None
}

pub(crate) fn csrf_token() -> Option<String> {
    cookie_named(CSRF_COOKIE)
}

/// Reads a cookie from the live document; the editor config names its own
/// anti-forgery cookie.
pub(crate) fn cookie_named(name: &str) -> Option<String> {
    use wasm_bindgen::JsCast;
    let document = crate::dom::document()?;
    let html = document.dyn_ref::<web_sys::HtmlDocument>()?;
    let raw = html.cookie().ok()?;
    cookie_value(&raw, name)
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        // Byte-wise so a '%' followed by multi-byte UTF-8 passes through
        // untouched instead of slicing mid-character.
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_token_among_cookies() {
        let raw = "sessionid=abc123; csrftoken=tok%3D1; theme=dark";
        assert_eq!(cookie_value(raw, "csrftoken").as_deref(), Some("tok=1"));
        assert_eq!(cookie_value(raw, "sessionid").as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_cookie_is_none() {
        assert_eq!(cookie_value("a=1; b=2", "csrftoken"), None);
        assert_eq!(cookie_value("", "csrftoken"), None);
    }

    #[test]
    fn name_must_match_exactly() {
        // "csrftoken2" must not satisfy a lookup for "csrftoken".
        assert_eq!(cookie_value("csrftoken2=zzz", "csrftoken"), None);
    }

    #[test]
    fn decodes_percent_sequences() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("plain"), "plain");
        assert_eq!(percent_decode("bad%zz"), "bad%zz");
        // '%' directly before a multi-byte character is not a hex escape.
        assert_eq!(percent_decode("a%\u{1d11e}"), "a%\u{1d11e}");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn multibyte_cookie_values_survive_lookup() {
        assert_eq!(
            cookie_value("csrftoken=a%\u{1d11e}", "csrftoken").as_deref(),
            Some("a%\u{1d11e}")
        );
    }
}
