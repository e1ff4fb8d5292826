use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlTextAreaElement, KeyboardEvent};

use crate::dom;
use crate::notify::{Notify, Severity};

const BUTTON_SELECTOR: &str = "[data-share-button]";
const MENU_SELECTOR: &str = "[data-share-menu]";
const COPY_SELECTOR: &str = "[data-copy-link]";
const CLOSE_ANIMATION_MS: u32 = 150;

const COPY_OK: &str = "Link copied to clipboard";
const COPY_FAILED: &str = "Could not copy the link";

struct SharePair {
    button: Element,
    menu: Element,
    open: Cell<bool>,
    hide_timer: RefCell<Option<Timeout>>,
}

impl SharePair {
    fn set_open(self: &Rc<Self>, open: bool) {
        self.open.set(open);
        if open {
            self.hide_timer.borrow_mut().take();
            dom::set_style(&self.menu, "display", "block");
            dom::remove_class(&self.menu, "opacity-0");
            dom::remove_class(&self.menu, "scale-95");
            dom::add_class(&self.menu, "opacity-100");
            dom::add_class(&self.menu, "scale-100");
        } else {
            dom::remove_class(&self.menu, "opacity-100");
            dom::remove_class(&self.menu, "scale-100");
            dom::add_class(&self.menu, "opacity-0");
            dom::add_class(&self.menu, "scale-95");
            let pair = Rc::clone(self);
            // Hide after the scale-out transition, unless reopened meanwhile.
            let timer = Timeout::new(CLOSE_ANIMATION_MS, move || {
                if !pair.open.get() {
                    dom::set_style(&pair.menu, "display", "none");
                }
            });
            *self.hide_timer.borrow_mut() = Some(timer);
        }
    }

    fn contains_event(&self, event: &Event) -> bool {
        dom::contains_target(&self.button, event) || dom::contains_target(&self.menu, event)
    }
}

/// Share popovers, one per button+menu pair matched by DOM order, with the
/// same outside-click/Escape rules as the nav menus, plus clipboard copy for
/// `[data-copy-link]` elements.
pub(crate) struct ShareMenuController {
    document: Document,
    notify: Rc<dyn Notify>,
    pairs: RefCell<Vec<Rc<SharePair>>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl ShareMenuController {
    pub(crate) fn new(document: Document, notify: Rc<dyn Notify>) -> Rc<Self> {
        Rc::new(Self {
            document,
            notify,
            pairs: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        self.initialized.set(true);

        let buttons = self.document.query_selector_all(BUTTON_SELECTOR).ok();
        let menus = self.document.query_selector_all(MENU_SELECTOR).ok();
        if let (Some(buttons), Some(menus)) = (buttons, menus) {
            let count = buttons.length().min(menus.length());
            for index in 0..count {
                let (Some(button), Some(menu)) = (buttons.item(index), menus.item(index)) else {
                    continue;
                };
                let (Ok(button), Ok(menu)) =
                    (button.dyn_into::<Element>(), menu.dyn_into::<Element>())
                else {
                    continue;
                };
                let pair = Rc::new(SharePair {
                    button,
                    menu,
                    open: Cell::new(false),
                    hide_timer: RefCell::new(None),
                });
                self.wire_pair(&pair);
                self.pairs.borrow_mut().push(pair);
            }
        }

        let controller = Rc::clone(self);
        let outside = EventListener::new(&self.document, "click", move |event| {
            controller.handle_document_click(event);
        });
        let controller = Rc::clone(self);
        let escape = EventListener::new(&self.document, "keydown", move |event| {
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if key_event.key() == "Escape" {
                controller.close_open_pairs();
            }
        });
        self.listeners.borrow_mut().extend([outside, escape]);
    }

    fn wire_pair(self: &Rc<Self>, pair: &Rc<SharePair>) {
        let target = Rc::clone(pair);
        let listener = EventListener::new(&pair.button, "click", move |event| {
            event.prevent_default();
            event.stop_propagation();
            target.set_open(!target.open.get());
        });
        self.listeners.borrow_mut().push(listener);
    }

    fn handle_document_click(self: &Rc<Self>, event: &Event) {
        if let Some(trigger) = dom::closest_from_target(event, COPY_SELECTOR) {
            event.prevent_default();
            if let Some(text) = trigger.get_attribute("data-copy-link") {
                copy_to_clipboard(&self.document, Rc::clone(&self.notify), text);
            }
            return;
        }
        self.close_open_pairs_except(event);
    }

    fn close_open_pairs(&self) {
        for pair in self.pairs.borrow().iter() {
            if pair.open.get() {
                pair.set_open(false);
            }
        }
    }

    fn close_open_pairs_except(&self, event: &Event) {
        for pair in self.pairs.borrow().iter() {
            if pair.open.get() && !pair.contains_event(event) {
                pair.set_open(false);
            }
        }
    }
}

/// Async clipboard write with the hidden-textarea execCommand fallback;
/// either path reports through the notifier.
pub(crate) fn copy_to_clipboard(document: &Document, notify: Rc<dyn Notify>, text: String) {
    let clipboard = dom::window().map(|window| window.navigator().clipboard());
    match clipboard {
        Some(clipboard) if !wasm_bindgen::JsValue::from(clipboard.clone()).is_undefined() => {
            let document = document.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let wrote =
                    wasm_bindgen_futures::JsFuture::from(clipboard.write_text(&text)).await;
                match wrote {
                    Ok(_) => notify.toast(COPY_OK, Severity::Success),
                    Err(_) => fallback_copy(&document, notify, &text),
                }
            });
        }
        _ => fallback_copy(document, notify, &text),
    }
}

fn fallback_copy(document: &Document, notify: Rc<dyn Notify>, text: &str) {
    let copied = exec_command_copy(document, text);
    if copied {
        notify.toast(COPY_OK, Severity::Success);
    } else {
        notify.toast(COPY_FAILED, Severity::Error);
    }
}

fn exec_command_copy(document: &Document, text: &str) -> bool {
    let Some(body) = document.body() else {
        return false;
    };
    let Ok(element) = document.create_element("textarea") else {
        return false;
    };
    let Ok(textarea) = element.dyn_into::<HtmlTextAreaElement>() else {
        return false;
    };
    textarea.set_value(text);
    // Keep it out of view without scrolling the page.
    dom::set_style(&textarea, "position", "fixed");
    dom::set_style(&textarea, "left", "-9999px");
    dom::set_style(&textarea, "top", "-9999px");
    if body.append_child(&textarea).is_err() {
        return false;
    }
    let _ = textarea.focus();
    textarea.select();
    let copied = document
        .dyn_ref::<web_sys::HtmlDocument>()
        .and_then(|html| html.exec_command("copy").ok())
        .unwrap_or(false);
    textarea.remove();
    copied
}
