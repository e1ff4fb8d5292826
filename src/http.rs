use gloo::timers::callback::Timeout;
use js_sys::Promise;
use serde::Deserialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Headers, Request, RequestCredentials, RequestInit, Response};

use crate::cookies;
use crate::dom::js_err;

/// Outstanding requests are never cancelled; a fetch that loses the race
/// keeps running and its settlement is ignored.
pub(crate) const REQUEST_TIMEOUT_MS: u32 = 10_000;

pub(crate) const CSRF_HEADER: &str = "X-CSRFToken";
pub(crate) const AJAX_HEADER: &str = "X-Requested-With";
pub(crate) const AJAX_HEADER_VALUE: &str = "XMLHttpRequest";

const GENERIC_SERVER_ERROR: &str = "Server error";
const GENERIC_TRANSPORT_ERROR: &str = "Could not reach the server";
const MALFORMED_RESPONSE: &str = "Malformed server response";

/// Wire envelope for the toggle endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ToggleResult {
    #[serde(default)]
    pub(crate) success: bool,
    pub(crate) liked: Option<bool>,
    pub(crate) favorited: Option<bool>,
    pub(crate) likes_count: Option<i64>,
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthBody {
    error: Option<String>,
    redirect: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct ToggleApplied {
    /// Server-confirmed relation state (liked / favorited).
    pub(crate) active: bool,
    /// Authoritative count; `None` for controls that do not track one.
    pub(crate) count: Option<i64>,
    pub(crate) message: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ToggleOutcome {
    Applied(ToggleApplied),
    AuthRequired {
        message: Option<String>,
        redirect: Option<String>,
    },
    Rejected(String),
    Unreachable(String),
}

/// Maps an HTTP status plus body text onto the outcome taxonomy. Pure so the
/// ordering rules (auth before generic, envelope errors before success) stay
/// testable off-browser.
pub(crate) fn classify_response(status: u16, body: &str) -> ToggleOutcome {
    if status == 401 || status == 403 {
        let parsed: Option<AuthBody> = serde_json::from_str(body).ok();
        let (message, redirect) = match parsed {
            Some(auth) => (auth.error, auth.redirect),
            None => (None, None),
        };
        return ToggleOutcome::AuthRequired { message, redirect };
    }
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<AuthBody>(body)
            .ok()
            .and_then(|auth| auth.error)
            .unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string());
        return ToggleOutcome::Rejected(message);
    }
    let Ok(result) = serde_json::from_str::<ToggleResult>(body) else {
        return ToggleOutcome::Unreachable(MALFORMED_RESPONSE.to_string());
    };
    if let Some(error) = result.error {
        return ToggleOutcome::Rejected(error);
    }
    if !result.success {
        return ToggleOutcome::Rejected(GENERIC_SERVER_ERROR.to_string());
    }
    ToggleOutcome::Applied(ToggleApplied {
        active: result.liked.or(result.favorited).unwrap_or(false),
        count: result.likes_count,
        message: result.message,
    })
}

/// Seam between the toggle controller and the network so browser tests can
/// substitute a recording fake.
pub(crate) trait ToggleTransport {
    fn post_toggle(&self, url: &str, done: Box<dyn FnOnce(ToggleOutcome)>);
}

/// Body-less POST with the anti-forgery token and ajax marker headers,
/// same-origin credentials, raced against a fixed timeout.
pub(crate) struct FetchTransport {
    csrf_token: Option<String>,
}

impl FetchTransport {
    pub(crate) fn new() -> Self {
        // Read once per page load; the token does not rotate mid-page.
        Self {
            csrf_token: cookies::csrf_token(),
        }
    }

    fn build_request(&self, url: &str) -> Result<Request, JsValue> {
        let headers = Headers::new()?;
        if let Some(token) = self.csrf_token.as_deref() {
            headers.set(CSRF_HEADER, token)?;
        }
        headers.set(AJAX_HEADER, AJAX_HEADER_VALUE)?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_credentials(RequestCredentials::SameOrigin);
        init.set_headers(&headers);
        Request::new_with_str_and_init(url, &init)
    }
}

impl ToggleTransport for FetchTransport {
    fn post_toggle(&self, url: &str, done: Box<dyn FnOnce(ToggleOutcome)>) {
        let request = match self.build_request(url) {
            Ok(request) => request,
            Err(error) => {
                done(ToggleOutcome::Unreachable(js_err(error)));
                return;
            }
        };
        spawn_local(async move {
            done(run_toggle_request(request).await);
        });
    }
}

async fn run_toggle_request(request: Request) -> ToggleOutcome {
    let Some(window) = crate::dom::window() else {
        return ToggleOutcome::Unreachable(GENERIC_TRANSPORT_ERROR.to_string());
    };
    let race = Promise::race(&js_sys::Array::of2(
        &window.fetch_with_request(&request),
        &timeout_rejection(REQUEST_TIMEOUT_MS),
    ));
    let settled = match JsFuture::from(race).await {
        Ok(value) => value,
        Err(error) => {
            let detail = js_err(error);
            let message = if detail == "timeout" {
                "Request timed out".to_string()
            } else {
                GENERIC_TRANSPORT_ERROR.to_string()
            };
            return ToggleOutcome::Unreachable(message);
        }
    };
    let Ok(response) = settled.dyn_into::<Response>() else {
        return ToggleOutcome::Unreachable(MALFORMED_RESPONSE.to_string());
    };
    let status = response.status();
    let body = match response.text() {
        Ok(promise) => JsFuture::from(promise)
            .await
            .ok()
            .and_then(|value| value.as_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    };
    classify_response(status, &body)
}

/// encodeURIComponent-compatible escaping for query values and redirect
/// targets. One shared implementation, pure so callers stay testable
/// off-browser.
pub(crate) fn uri_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Best-effort GET returning the body text of a 2xx response. Used by the
/// suggestion endpoints, where any failure degrades to an empty result.
pub(crate) async fn get_json(url: &str) -> Option<String> {
    let init = RequestInit::new();
    init.set_method("GET");
    init.set_credentials(RequestCredentials::SameOrigin);
    let request = Request::new_with_str_and_init(url, &init).ok()?;
    fetch_body(request).await
}

/// Best-effort JSON POST with the anti-forgery token, same contract as
/// [`get_json`].
pub(crate) async fn post_json(url: &str, payload: &str) -> Option<String> {
    let headers = Headers::new().ok()?;
    headers.set("Content-Type", "application/json").ok()?;
    if let Some(token) = cookies::csrf_token() {
        headers.set(CSRF_HEADER, &token).ok()?;
    }
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_credentials(RequestCredentials::SameOrigin);
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(payload));
    let request = Request::new_with_str_and_init(url, &init).ok()?;
    fetch_body(request).await
}

async fn fetch_body(request: Request) -> Option<String> {
    let window = crate::dom::window()?;
    let race = Promise::race(&js_sys::Array::of2(
        &window.fetch_with_request(&request),
        &timeout_rejection(REQUEST_TIMEOUT_MS),
    ));
    let settled = JsFuture::from(race).await.ok()?;
    let response = settled.dyn_into::<Response>().ok()?;
    if !response.ok() {
        return None;
    }
    let body = JsFuture::from(response.text().ok()?).await.ok()?;
    body.as_string()
}

fn timeout_rejection(duration_ms: u32) -> Promise {
    Promise::new(&mut |_resolve, reject| {
        Timeout::new(duration_ms, move || {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("timeout"));
        })
        .forget();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_encode_matches_encode_uri_component() {
        assert_eq!(uri_encode("hello-world_1.0"), "hello-world_1.0");
        assert_eq!(uri_encode("/post/ada/x/"), "%2Fpost%2Fada%2Fx%2F");
        assert_eq!(uri_encode("a b&c=d"), "a%20b%26c%3Dd");
        // Unreserved marks stay literal, exactly as encodeURIComponent.
        assert_eq!(uri_encode("!~*'()"), "!~*'()");
        // Non-ASCII is escaped per UTF-8 byte.
        assert_eq!(uri_encode("café"), "caf%C3%A9");
    }

    #[test]
    fn auth_statuses_win_over_everything_else() {
        let outcome = classify_response(401, r#"{"error":"login first","redirect":"/login/"}"#);
        assert_eq!(
            outcome,
            ToggleOutcome::AuthRequired {
                message: Some("login first".to_string()),
                redirect: Some("/login/".to_string()),
            }
        );
        // A 403 with an unparseable body is still an auth signal.
        assert_eq!(
            classify_response(403, "<html>forbidden</html>"),
            ToggleOutcome::AuthRequired {
                message: None,
                redirect: None,
            }
        );
    }

    #[test]
    fn non_2xx_prefers_server_error_field() {
        assert_eq!(
            classify_response(500, r#"{"error":"boom"}"#),
            ToggleOutcome::Rejected("boom".to_string())
        );
        assert_eq!(
            classify_response(502, "bad gateway"),
            ToggleOutcome::Rejected(GENERIC_SERVER_ERROR.to_string())
        );
    }

    #[test]
    fn envelope_failure_rejects_even_on_2xx() {
        assert_eq!(
            classify_response(200, r#"{"success":false,"error":"already liked"}"#),
            ToggleOutcome::Rejected("already liked".to_string())
        );
        assert_eq!(
            classify_response(200, r#"{"success":false}"#),
            ToggleOutcome::Rejected(GENERIC_SERVER_ERROR.to_string())
        );
    }

    #[test]
    fn success_carries_server_authoritative_state() {
        let outcome =
            classify_response(200, r#"{"success":true,"liked":true,"likes_count":5}"#);
        assert_eq!(
            outcome,
            ToggleOutcome::Applied(ToggleApplied {
                active: true,
                count: Some(5),
                message: None,
            })
        );
    }

    #[test]
    fn favorite_envelope_has_no_count() {
        let outcome = classify_response(
            200,
            r#"{"success":true,"favorited":false,"message":"Removed from favorites"}"#,
        );
        assert_eq!(
            outcome,
            ToggleOutcome::Applied(ToggleApplied {
                active: false,
                count: None,
                message: Some("Removed from favorites".to_string()),
            })
        );
    }

    #[test]
    fn malformed_2xx_body_is_a_transport_failure() {
        assert_eq!(
            classify_response(200, "not json"),
            ToggleOutcome::Unreachable(MALFORMED_RESPONSE.to_string())
        );
    }
}
