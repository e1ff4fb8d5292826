use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::console::warn;
use gloo::events::{EventListener, EventListenerOptions};
use gloo::timers::callback::Timeout;
use web_sys::{Document, Element, Event};

use crate::dom;
use crate::http::{ToggleApplied, ToggleOutcome, ToggleTransport};
use crate::notify::{Notify, Severity};

pub(crate) const BUSY_ATTR: &str = "data-processing";
pub(crate) const AUTH_REDIRECT_DELAY_MS: u32 = 1500;
pub(crate) const LOGIN_PATH: &str = "/accounts/login/";

const POST_LIKE_SELECTOR: &str = ".like-button";
const COMMENT_LIKE_SELECTOR: &str = ".comment-like-button";
const FAVORITE_SELECTOR: &str = "#favorite-button, .favorite-button";
const COUNT_SELECTOR: &str = ".likes-count";
const ICON_SELECTOR: &str = "i, svg";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ToggleKind {
    PostLike,
    CommentLike,
    Favorite,
}

impl ToggleKind {
    fn tracks_count(self) -> bool {
        matches!(self, ToggleKind::PostLike | ToggleKind::CommentLike)
    }

    fn active_icon_classes(self) -> [&'static str; 2] {
        match self {
            ToggleKind::PostLike | ToggleKind::CommentLike => ["text-red-500", "fill-current"],
            ToggleKind::Favorite => ["text-amber-500", "fill-current"],
        }
    }
}

pub(crate) fn post_like_url(username: &str, slug: &str) -> String {
    format!("/post/{username}/{slug}/like/")
}

pub(crate) fn comment_like_url(comment_id: &str) -> String {
    format!("/comment/{comment_id}/like/")
}

pub(crate) fn login_redirect_url(current_path: &str) -> String {
    format!("{LOGIN_PATH}?next={}", crate::http::uri_encode(current_path))
}

pub(crate) fn default_message(kind: ToggleKind, active: bool) -> &'static str {
    match (kind, active) {
        (ToggleKind::PostLike, true) => "Post liked",
        (ToggleKind::PostLike, false) => "Like removed from the post",
        (ToggleKind::CommentLike, true) => "Comment liked",
        (ToggleKind::CommentLike, false) => "Like removed from the comment",
        (ToggleKind::Favorite, true) => "Post added to favorites",
        (ToggleKind::Favorite, false) => "Post removed from favorites",
    }
}

/// Like/favorite buttons over server-rendered markup. One delegated capture
/// point on the body handles every control, including ones inserted after
/// load; per-control `data-processing` acts as an in-flight mutex.
pub(crate) struct ToggleController {
    document: Document,
    notify: Rc<dyn Notify>,
    transport: Rc<dyn ToggleTransport>,
    navigate: Rc<dyn Fn(String)>,
    listener: RefCell<Option<EventListener>>,
    redirect_timer: RefCell<Option<Timeout>>,
    initialized: Cell<bool>,
}

impl ToggleController {
    pub(crate) fn new(
        document: Document,
        notify: Rc<dyn Notify>,
        transport: Rc<dyn ToggleTransport>,
    ) -> Rc<Self> {
        Rc::new(Self {
            document,
            notify,
            transport,
            navigate: Rc::new(|url: String| {
                if let Some(window) = dom::window() {
                    let _ = window.location().set_href(&url);
                }
            }),
            listener: RefCell::new(None),
            redirect_timer: RefCell::new(None),
            initialized: Cell::new(false),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_navigate(
        document: Document,
        notify: Rc<dyn Notify>,
        transport: Rc<dyn ToggleTransport>,
        navigate: Rc<dyn Fn(String)>,
    ) -> Rc<Self> {
        Rc::new(Self {
            document,
            notify,
            transport,
            navigate,
            listener: RefCell::new(None),
            redirect_timer: RefCell::new(None),
            initialized: Cell::new(false),
        })
    }

    /// Idempotent: a second call leaves the single delegated listener as is.
    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        let Some(body) = self.document.body() else {
            warn!("toggle controller: document has no body");
            return;
        };
        let controller = Rc::clone(self);
        let listener = EventListener::new_with_options(
            &body,
            "click",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                controller.handle_click(event);
            },
        );
        *self.listener.borrow_mut() = Some(listener);
        self.initialized.set(true);
    }

    fn handle_click(self: &Rc<Self>, event: &Event) {
        let Some((button, kind)) = resolve_control(event) else {
            return;
        };
        event.prevent_default();
        event.stop_propagation();
        self.activate(button, kind);
    }

    fn activate(self: &Rc<Self>, button: Element, kind: ToggleKind) {
        if button.has_attribute(BUSY_ATTR) {
            // One in-flight request per control; extra clicks are dropped,
            // not queued.
            return;
        }
        let url = match request_url(&button, kind) {
            Some(url) => url,
            None => {
                self.notify
                    .toast("This button is missing its target data", Severity::Error);
                return;
            }
        };

        begin_busy(&button);
        let controller = Rc::clone(self);
        self.transport.post_toggle(
            &url,
            Box::new(move |outcome| {
                controller.finish(button, kind, outcome);
            }),
        );
    }

    /// Runs exactly once per request; the busy teardown happens before any
    /// outcome branching so every exit path clears it.
    fn finish(self: &Rc<Self>, button: Element, kind: ToggleKind, outcome: ToggleOutcome) {
        end_busy(&button);
        match outcome {
            ToggleOutcome::Applied(applied) => self.apply_confirmed(&button, kind, applied),
            ToggleOutcome::AuthRequired { message, redirect } => {
                self.require_login(message, redirect)
            }
            ToggleOutcome::Rejected(message) | ToggleOutcome::Unreachable(message) => {
                self.notify.toast(&message, Severity::Error);
            }
        }
    }

    fn apply_confirmed(&self, button: &Element, kind: ToggleKind, applied: ToggleApplied) {
        if let Ok(Some(icon)) = button.query_selector(ICON_SELECTOR) {
            for class in kind.active_icon_classes() {
                dom::set_class(&icon, class, applied.active);
            }
        }
        dom::set_class(button, "active", applied.active);
        let _ = button.set_attribute("aria-pressed", if applied.active { "true" } else { "false" });

        if kind.tracks_count() {
            if let (Ok(Some(count_el)), Some(count)) =
                (button.query_selector(COUNT_SELECTOR), applied.count)
            {
                // Always the server's number; the client never does count
                // arithmetic of its own.
                count_el.set_text_content(Some(&count.to_string()));
            }
        }

        let severity = if applied.active {
            Severity::Success
        } else {
            Severity::Info
        };
        match applied.message {
            Some(message) => self.notify.toast(&message, severity),
            None => self
                .notify
                .toast(default_message(kind, applied.active), severity),
        }
    }

    fn require_login(self: &Rc<Self>, message: Option<String>, redirect: Option<String>) {
        let text = message.unwrap_or_else(|| "Sign in to do that".to_string());
        self.notify.toast(&text, Severity::Warning);

        let target = redirect.unwrap_or_else(|| {
            let path = dom::window()
                .and_then(|window| window.location().pathname().ok())
                .unwrap_or_else(|| "/".to_string());
            login_redirect_url(&path)
        });
        let navigate = Rc::clone(&self.navigate);
        let timer = Timeout::new(AUTH_REDIRECT_DELAY_MS, move || {
            navigate(target);
        });
        // Only the most recent auth failure drives the redirect.
        *self.redirect_timer.borrow_mut() = Some(timer);
    }

    #[cfg(test)]
    pub(crate) fn uninstall(&self) {
        self.listener.borrow_mut().take();
        self.redirect_timer.borrow_mut().take();
        self.initialized.set(false);
    }
}

fn resolve_control(event: &Event) -> Option<(Element, ToggleKind)> {
    if let Some(button) = dom::closest_from_target(event, POST_LIKE_SELECTOR) {
        return Some((button, ToggleKind::PostLike));
    }
    if let Some(button) = dom::closest_from_target(event, COMMENT_LIKE_SELECTOR) {
        return Some((button, ToggleKind::CommentLike));
    }
    if let Some(button) = dom::closest_from_target(event, FAVORITE_SELECTOR) {
        return Some((button, ToggleKind::Favorite));
    }
    None
}

/// Derives the endpoint, or `None` when the rendered control is missing
/// required data; in that case no request is attempted.
fn request_url(button: &Element, kind: ToggleKind) -> Option<String> {
    match kind {
        ToggleKind::PostLike => {
            let username = non_empty_attr(button, "data-username")?;
            let slug = non_empty_attr(button, "data-slug")?;
            Some(post_like_url(&username, &slug))
        }
        ToggleKind::CommentLike => {
            let comment_id = non_empty_attr(button, "data-comment-id")?;
            Some(comment_like_url(&comment_id))
        }
        ToggleKind::Favorite => non_empty_attr(button, "data-url"),
    }
}

fn non_empty_attr(element: &Element, name: &str) -> Option<String> {
    let value = element.get_attribute(name)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn begin_busy(button: &Element) {
    let _ = button.set_attribute(BUSY_ATTR, "true");
    dom::set_style(button, "pointer-events", "none");
    dom::set_style(button, "opacity", "0.6");
}

fn end_busy(button: &Element) {
    let _ = button.remove_attribute(BUSY_ATTR);
    dom::clear_style(button, "pointer-events");
    dom::clear_style(button, "opacity");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_endpoint_urls() {
        assert_eq!(
            post_like_url("ada", "first-post"),
            "/post/ada/first-post/like/"
        );
        assert_eq!(comment_like_url("42"), "/comment/42/like/");
    }

    #[test]
    fn login_redirect_encodes_the_return_path() {
        assert_eq!(
            login_redirect_url("/post/ada/first post/"),
            "/accounts/login/?next=%2Fpost%2Fada%2Ffirst%20post%2F"
        );
    }

    #[test]
    fn default_messages_distinguish_kind_and_direction() {
        assert_eq!(default_message(ToggleKind::PostLike, true), "Post liked");
        assert_eq!(
            default_message(ToggleKind::CommentLike, false),
            "Like removed from the comment"
        );
        assert_eq!(
            default_message(ToggleKind::Favorite, true),
            "Post added to favorites"
        );
    }

    #[test]
    fn only_like_kinds_track_counts() {
        assert!(ToggleKind::PostLike.tracks_count());
        assert!(ToggleKind::CommentLike.tracks_count());
        assert!(!ToggleKind::Favorite.tracks_count());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use crate::http::ToggleApplied;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;
    use web_sys::HtmlElement;

    wasm_bindgen_test_configure!(run_in_browser);

    struct FakeTransport {
        calls: RefCell<Vec<String>>,
        pending: RefCell<Vec<Box<dyn FnOnce(ToggleOutcome)>>>,
    }

    impl FakeTransport {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                calls: RefCell::new(Vec::new()),
                pending: RefCell::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn complete_next(&self, outcome: ToggleOutcome) {
            let done = self.pending.borrow_mut().remove(0);
            done(outcome);
        }
    }

    impl ToggleTransport for FakeTransport {
        fn post_toggle(&self, url: &str, done: Box<dyn FnOnce(ToggleOutcome)>) {
            self.calls.borrow_mut().push(url.to_string());
            self.pending.borrow_mut().push(done);
        }
    }

    struct FakeNotify {
        messages: RefCell<Vec<(String, Severity)>>,
    }

    impl FakeNotify {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                messages: RefCell::new(Vec::new()),
            })
        }
    }

    impl Notify for FakeNotify {
        fn toast_for(&self, message: &str, severity: Severity, _duration_ms: u32) {
            self.messages.borrow_mut().push((message.to_string(), severity));
        }
    }

    fn make_like_button(document: &Document) -> Element {
        let button = document.create_element("button").unwrap();
        button.set_class_name("like-button");
        button.set_attribute("data-username", "ada").unwrap();
        button.set_attribute("data-slug", "first-post").unwrap();
        let icon = document.create_element("i").unwrap();
        button.append_child(&icon).unwrap();
        let count = document.create_element("span").unwrap();
        count.set_class_name("likes-count");
        count.set_text_content(Some("5"));
        button.append_child(&count).unwrap();
        document.body().unwrap().append_child(&button).unwrap();
        button
    }

    fn click(element: &Element) {
        element.dyn_ref::<HtmlElement>().unwrap().click();
    }

    #[wasm_bindgen_test]
    fn second_click_while_busy_is_dropped() {
        let document = crate::dom::document().unwrap();
        let notify = FakeNotify::new();
        let transport = FakeTransport::new();
        let controller = ToggleController::new(
            document.clone(),
            notify.clone(),
            transport.clone(),
        );
        controller.install();
        let button = make_like_button(&document);

        click(&button);
        click(&button);
        assert_eq!(transport.call_count(), 1);

        // Completion clears the busy flag, so the next click goes through.
        transport.complete_next(ToggleOutcome::Applied(ToggleApplied {
            active: true,
            count: Some(6),
            message: None,
        }));
        click(&button);
        assert_eq!(transport.call_count(), 2);

        button.remove();
        controller.uninstall();
    }

    #[wasm_bindgen_test]
    fn reinstall_does_not_duplicate_the_listener() {
        let document = crate::dom::document().unwrap();
        let notify = FakeNotify::new();
        let transport = FakeTransport::new();
        let controller = ToggleController::new(
            document.clone(),
            notify.clone(),
            transport.clone(),
        );
        controller.install();
        controller.install();
        let button = make_like_button(&document);

        click(&button);
        assert_eq!(transport.call_count(), 1);

        button.remove();
        controller.uninstall();
    }

    #[wasm_bindgen_test]
    fn confirmed_state_comes_from_the_server() {
        let document = crate::dom::document().unwrap();
        let notify = FakeNotify::new();
        let transport = FakeTransport::new();
        let controller = ToggleController::new(
            document.clone(),
            notify.clone(),
            transport.clone(),
        );
        controller.install();
        let button = make_like_button(&document);

        click(&button);
        // No optimistic paint while the request is out.
        assert!(!dom::has_class(&button, "active"));
        let count = button.query_selector(".likes-count").unwrap().unwrap();
        assert_eq!(count.text_content().as_deref(), Some("5"));

        // The server says 9, not the local 5 + 1.
        transport.complete_next(ToggleOutcome::Applied(ToggleApplied {
            active: true,
            count: Some(9),
            message: None,
        }));
        assert!(dom::has_class(&button, "active"));
        assert_eq!(button.get_attribute("aria-pressed").as_deref(), Some("true"));
        assert_eq!(count.text_content().as_deref(), Some("9"));
        assert_eq!(
            notify.messages.borrow().last().cloned(),
            Some(("Post liked".to_string(), Severity::Success))
        );

        button.remove();
        controller.uninstall();
    }

    #[wasm_bindgen_test]
    fn failure_restores_the_control() {
        let document = crate::dom::document().unwrap();
        let notify = FakeNotify::new();
        let transport = FakeTransport::new();
        let controller = ToggleController::new(
            document.clone(),
            notify.clone(),
            transport.clone(),
        );
        controller.install();
        let button = make_like_button(&document);

        click(&button);
        assert!(button.has_attribute(BUSY_ATTR));
        transport.complete_next(ToggleOutcome::Unreachable("Request timed out".to_string()));

        assert!(!button.has_attribute(BUSY_ATTR));
        assert!(!dom::has_class(&button, "active"));
        let style = button.dyn_ref::<HtmlElement>().unwrap().style();
        assert_eq!(style.get_property_value("opacity").unwrap(), "");
        assert_eq!(style.get_property_value("pointer-events").unwrap(), "");
        assert_eq!(
            notify.messages.borrow().last().cloned(),
            Some(("Request timed out".to_string(), Severity::Error))
        );

        // The control is usable again.
        click(&button);
        assert_eq!(transport.call_count(), 2);

        button.remove();
        controller.uninstall();
    }

    #[wasm_bindgen_test]
    async fn auth_failure_redirects_to_login_with_return_path() {
        let document = crate::dom::document().unwrap();
        let notify = FakeNotify::new();
        let transport = FakeTransport::new();
        let navigated: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&navigated);
        let controller = ToggleController::with_navigate(
            document.clone(),
            notify.clone(),
            transport.clone(),
            Rc::new(move |url: String| {
                *sink.borrow_mut() = Some(url);
            }),
        );
        controller.install();
        let button = make_like_button(&document);

        click(&button);
        transport.complete_next(ToggleOutcome::AuthRequired {
            message: None,
            redirect: None,
        });
        assert_eq!(
            notify.messages.borrow().last().cloned(),
            Some(("Sign in to do that".to_string(), Severity::Warning))
        );
        assert!(navigated.borrow().is_none());

        gloo::timers::future::TimeoutFuture::new(AUTH_REDIRECT_DELAY_MS + 100).await;
        let current_path = dom::window().unwrap().location().pathname().unwrap();
        assert_eq!(
            navigated.borrow().as_deref(),
            Some(login_redirect_url(&current_path).as_str())
        );

        button.remove();
        controller.uninstall();
    }
}
