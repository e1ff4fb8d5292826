use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, KeyboardEvent};

use crate::dom;

const MOBILE_TOGGLE_ID: &str = "mobile-menu-toggle";
const MOBILE_MENU_ID: &str = "mobile-menu";
const USER_WRAPPER_ID: &str = "user-menu-dropdown";
const USER_BUTTON_ID: &str = "user-menu-button";
const USER_MENU_ID: &str = "user-menu";

/// One open/closed state machine: trigger button plus the panel it reveals.
/// `aria-expanded` and the `hidden` class move together, always.
struct Disclosure {
    button: Element,
    panel: Element,
    /// Extra containment root for outside-click checks; the user dropdown
    /// passes its wrapper so clicks between button and panel do not close it.
    boundary: Option<Element>,
    open: Cell<bool>,
}

impl Disclosure {
    fn new(button: Element, panel: Element, boundary: Option<Element>) -> Self {
        let disclosure = Self {
            button,
            panel,
            boundary,
            open: Cell::new(false),
        };
        disclosure.set_open(false);
        disclosure
    }

    fn set_open(&self, open: bool) {
        self.open.set(open);
        let _ = self
            .button
            .set_attribute("aria-expanded", if open { "true" } else { "false" });
        dom::set_class(&self.panel, "hidden", !open);
    }

    fn toggle(&self) {
        self.set_open(!self.open.get());
    }

    fn close_returning_focus(&self) {
        self.set_open(false);
        if let Some(button) = self.button.dyn_ref::<web_sys::HtmlElement>() {
            let _ = button.focus();
        }
    }

    fn contains_event(&self, event: &Event) -> bool {
        if let Some(boundary) = self.boundary.as_ref() {
            if dom::contains_target(boundary, event) {
                return true;
            }
        }
        dom::contains_target(&self.button, event) || dom::contains_target(&self.panel, event)
    }
}

/// Mobile nav and user dropdown. Independent machines with identical rules:
/// button toggles, outside click closes, Escape closes and refocuses.
pub(crate) struct NavigationMenuController {
    document: Document,
    mobile: RefCell<Option<Rc<Disclosure>>>,
    user: RefCell<Option<Rc<Disclosure>>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl NavigationMenuController {
    pub(crate) fn new(document: Document) -> Rc<Self> {
        Rc::new(Self {
            document,
            mobile: RefCell::new(None),
            user: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        self.initialized.set(true);

        if let (Some(button), Some(panel)) = (
            self.document.get_element_by_id(MOBILE_TOGGLE_ID),
            self.document.get_element_by_id(MOBILE_MENU_ID),
        ) {
            let disclosure = Rc::new(Disclosure::new(button, panel, None));
            self.wire_button(&disclosure);
            *self.mobile.borrow_mut() = Some(disclosure);
        }

        if let (Some(button), Some(panel)) = (
            self.document.get_element_by_id(USER_BUTTON_ID),
            self.document.get_element_by_id(USER_MENU_ID),
        ) {
            let boundary = self.document.get_element_by_id(USER_WRAPPER_ID);
            let disclosure = Rc::new(Disclosure::new(button, panel, boundary));
            self.wire_button(&disclosure);
            *self.user.borrow_mut() = Some(disclosure);
        }

        let controller = Rc::clone(self);
        let outside = EventListener::new(&self.document, "click", move |event| {
            controller.close_unless_contained(event);
        });
        let controller = Rc::clone(self);
        let escape = EventListener::new(&self.document, "keydown", move |event| {
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if key_event.key() == "Escape" {
                controller.close_all_with_focus();
            }
        });
        self.listeners.borrow_mut().extend([outside, escape]);
    }

    fn wire_button(self: &Rc<Self>, disclosure: &Rc<Disclosure>) {
        let target = Rc::clone(disclosure);
        let listener = EventListener::new(&disclosure.button, "click", move |event| {
            event.stop_propagation();
            target.toggle();
        });
        self.listeners.borrow_mut().push(listener);
    }

    fn close_unless_contained(&self, event: &Event) {
        for slot in [&self.mobile, &self.user] {
            let Some(disclosure) = slot.borrow().clone() else {
                continue;
            };
            if disclosure.open.get() && !disclosure.contains_event(event) {
                disclosure.set_open(false);
            }
        }
    }

    fn close_all_with_focus(&self) {
        for slot in [&self.mobile, &self.user] {
            let Some(disclosure) = slot.borrow().clone() else {
                continue;
            };
            if disclosure.open.get() {
                disclosure.close_returning_focus();
            }
        }
    }
}
