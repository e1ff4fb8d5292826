use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use web_sys::{Document, Element, ScrollBehavior, ScrollToOptions};

use crate::dom;

const INDICATOR_ID: &str = "scroll-indicator";
const BACK_TO_TOP_ID: &str = "back-to-top";
const BACK_TO_TOP_THRESHOLD_PX: f64 = 300.0;
const SCROLL_THROTTLE_MS: u32 = 16;

/// Fraction of the page scrolled through, clamped to [0, 1].
pub(crate) fn scroll_progress(scroll_top: f64, scroll_height: f64, viewport: f64) -> f64 {
    let track = scroll_height - viewport;
    if track <= 0.0 {
        return 0.0;
    }
    (scroll_top / track).clamp(0.0, 1.0)
}

/// One throttled scroll listener drives both the top progress bar and the
/// back-to-top button visibility.
pub(crate) struct ScrollEffects {
    indicator: Option<Element>,
    back_to_top: Option<Element>,
    throttled: Cell<bool>,
    throttle_timer: RefCell<Option<Timeout>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl ScrollEffects {
    pub(crate) fn new(document: &Document) -> Rc<Self> {
        Rc::new(Self {
            indicator: document.get_element_by_id(INDICATOR_ID),
            back_to_top: document.get_element_by_id(BACK_TO_TOP_ID),
            throttled: Cell::new(false),
            throttle_timer: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        if self.indicator.is_none() && self.back_to_top.is_none() {
            return;
        }
        self.initialized.set(true);
        let Some(window) = dom::window() else {
            return;
        };

        let effects = Rc::clone(self);
        let scroll_listener = EventListener::new(&window, "scroll", move |_event| {
            if effects.throttled.get() {
                return;
            }
            effects.throttled.set(true);
            effects.update();
            let effects_inner = Rc::clone(&effects);
            let timer = Timeout::new(SCROLL_THROTTLE_MS, move || {
                effects_inner.throttled.set(false);
            });
            *effects.throttle_timer.borrow_mut() = Some(timer);
        });
        self.listeners.borrow_mut().push(scroll_listener);

        if let Some(button) = self.back_to_top.as_ref() {
            let click_listener = EventListener::new(button, "click", move |_event| {
                if let Some(window) = dom::window() {
                    let options = ScrollToOptions::new();
                    options.set_top(0.0);
                    options.set_behavior(ScrollBehavior::Smooth);
                    window.scroll_to_with_scroll_to_options(&options);
                }
            });
            self.listeners.borrow_mut().push(click_listener);
        }

        // Paint the initial state before the first scroll event.
        self.update();
    }

    fn update(&self) {
        let Some(window) = dom::window() else {
            return;
        };
        let scroll_top = window.page_y_offset().unwrap_or(0.0);

        if let Some(indicator) = self.indicator.as_ref() {
            let scroll_height = window
                .document()
                .and_then(|document| document.document_element())
                .map(|root| root.scroll_height() as f64)
                .unwrap_or(0.0);
            let viewport = window
                .inner_height()
                .ok()
                .and_then(|value| value.as_f64())
                .unwrap_or(0.0);
            let progress = scroll_progress(scroll_top, scroll_height, viewport);
            dom::set_style(indicator, "transform", &format!("scaleX({progress})"));
        }

        if let Some(button) = self.back_to_top.as_ref() {
            let visible = scroll_top > BACK_TO_TOP_THRESHOLD_PX;
            dom::set_class(button, "opacity-100", visible);
            dom::set_class(button, "visible", visible);
            dom::set_class(button, "opacity-0", !visible);
            dom::set_class(button, "invisible", !visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_spans_zero_to_one() {
        assert_eq!(scroll_progress(0.0, 2000.0, 800.0), 0.0);
        assert_eq!(scroll_progress(600.0, 2000.0, 800.0), 0.5);
        assert_eq!(scroll_progress(1200.0, 2000.0, 800.0), 1.0);
    }

    #[test]
    fn overscroll_clamps() {
        assert_eq!(scroll_progress(5000.0, 2000.0, 800.0), 1.0);
        assert_eq!(scroll_progress(-10.0, 2000.0, 800.0), 0.0);
    }

    #[test]
    fn short_pages_report_zero() {
        // Content fits in the viewport, nothing to indicate.
        assert_eq!(scroll_progress(0.0, 600.0, 800.0), 0.0);
    }
}
