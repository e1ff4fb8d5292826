use gloo::timers::callback::Timeout;
use web_sys::{Document, Element};

use crate::dom;

pub(crate) const TOAST_DURATION_MS: u32 = 3000;
const TOAST_ENTER_MS: u32 = 100;
const TOAST_EXIT_MS: u32 = 300;
const TOAST_CONTAINER_ID: &str = "toast-container";
const TOAST_HIDDEN_CLASSES: [&str; 2] = ["translate-x-full", "opacity-0"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn accent_class(self) -> &'static str {
        match self {
            Severity::Info => "toast-info",
            Severity::Success => "toast-success",
            Severity::Warning => "toast-warning",
            Severity::Error => "toast-error",
        }
    }
}

/// Cross-controller message surface. Controllers receive this injected
/// rather than reaching for a page-global function.
pub(crate) trait Notify {
    fn toast_for(&self, message: &str, severity: Severity, duration_ms: u32);

    fn toast(&self, message: &str, severity: Severity) {
        self.toast_for(message, severity, TOAST_DURATION_MS);
    }
}

/// Queue-less transient messages. Concurrent calls produce concurrently
/// visible, independently timed elements.
pub(crate) struct ToastNotifier {
    document: Document,
}

impl ToastNotifier {
    pub(crate) fn new(document: Document) -> Self {
        Self { document }
    }

    fn host(&self) -> Option<Element> {
        // The designated container may not exist on every page; body-level
        // insertion keeps the call safe either way.
        self.document
            .get_element_by_id(TOAST_CONTAINER_ID)
            .or_else(|| self.document.body().map(Element::from))
    }

    fn build_toast(&self, message: &str, severity: Severity) -> Option<Element> {
        let toast = self.document.create_element("div").ok()?;
        toast.set_class_name(&format!(
            "toast {} {} {}",
            severity.accent_class(),
            TOAST_HIDDEN_CLASSES[0],
            TOAST_HIDDEN_CLASSES[1]
        ));
        toast.set_text_content(Some(message));
        Some(toast)
    }
}

impl Notify for ToastNotifier {
    fn toast_for(&self, message: &str, severity: Severity, duration_ms: u32) {
        let Some(host) = self.host() else {
            return;
        };
        let Some(toast) = self.build_toast(message, severity) else {
            return;
        };
        if host.append_child(&toast).is_err() {
            return;
        }

        let enter = toast.clone();
        Timeout::new(TOAST_ENTER_MS, move || {
            for class in TOAST_HIDDEN_CLASSES {
                dom::remove_class(&enter, class);
            }
        })
        .forget();

        let exit = toast.clone();
        Timeout::new(duration_ms, move || {
            for class in TOAST_HIDDEN_CLASSES {
                dom::add_class(&exit, class);
            }
            Timeout::new(TOAST_EXIT_MS, move || {
                exit.remove();
            })
            .forget();
        })
        .forget();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use gloo::timers::future::TimeoutFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn toast_lands_in_the_designated_container() {
        let document = crate::dom::document().unwrap();
        let container = document.create_element("div").unwrap();
        container.set_id(TOAST_CONTAINER_ID);
        document.body().unwrap().append_child(&container).unwrap();

        let notifier = ToastNotifier::new(document.clone());
        notifier.toast("saved", Severity::Success);

        let toast = container.query_selector(".toast").unwrap().unwrap();
        assert_eq!(toast.text_content().as_deref(), Some("saved"));
        assert!(dom::has_class(&toast, "toast-success"));
        // Enters hidden; the slide-in runs on a timer.
        assert!(dom::has_class(&toast, "translate-x-full"));

        container.remove();
    }

    #[wasm_bindgen_test]
    async fn without_a_container_the_body_hosts_and_the_toast_expires() {
        let document = crate::dom::document().unwrap();
        assert!(document.get_element_by_id(TOAST_CONTAINER_ID).is_none());

        let notifier = ToastNotifier::new(document.clone());
        notifier.toast_for("fleeting", Severity::Info, 200);

        let body = document.body().unwrap();
        assert!(body.query_selector(".toast-info").unwrap().is_some());

        TimeoutFuture::new(200 + TOAST_EXIT_MS + 100).await;
        assert!(body.query_selector(".toast-info").unwrap().is_none());
    }
}
