use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::console::warn;
use gloo::events::EventListener;
use serde::Deserialize;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, MessageEvent, WebSocket};

use crate::dom;
use crate::notify::{Notify, Severity};

const SOCKET_PATH: &str = "/ws/notifications/";
const BADGE_SELECTOR: &str = ".notification-badge";
const UNREAD_SELECTOR: &str = "[data-unread-count]";

#[derive(Deserialize)]
struct NotificationEnvelope {
    message: String,
}

/// Increments a numeric badge in place and unhides it; non-numeric text
/// counts as zero.
pub(crate) fn bump_badge(badge: &Element) {
    let current = badge
        .text_content()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .unwrap_or(0);
    badge.set_text_content(Some(&(current + 1).to_string()));
    dom::remove_class(badge, "hidden");
}

/// Live notification channel: one server push becomes an info toast plus a
/// bump of whichever badges the page carries.
pub(crate) struct NotificationChannel {
    document: Document,
    notify: Rc<dyn Notify>,
    socket: RefCell<Option<WebSocket>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl NotificationChannel {
    pub(crate) fn new(document: Document, notify: Rc<dyn Notify>) -> Rc<Self> {
        Rc::new(Self {
            document,
            notify,
            socket: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        let Some(window) = dom::window() else {
            return;
        };
        let Ok(host) = window.location().host() else {
            return;
        };
        let url = format!("ws://{host}{SOCKET_PATH}");
        let socket = match WebSocket::new(&url) {
            Ok(socket) => socket,
            Err(error) => {
                warn!(format!("notification socket: {}", dom::js_err(error)));
                return;
            }
        };
        self.initialized.set(true);

        let channel = Rc::clone(self);
        let message_listener = EventListener::new(&socket, "message", move |event| {
            let Some(message_event) = event.dyn_ref::<MessageEvent>() else {
                return;
            };
            let Some(text) = message_event.data().as_string() else {
                return;
            };
            channel.handle_payload(&text);
        });

        let close_listener = EventListener::new(&socket, "close", move |_event| {
            warn!("notification socket closed");
        });

        self.listeners
            .borrow_mut()
            .extend([message_listener, close_listener]);
        *self.socket.borrow_mut() = Some(socket);
    }

    fn handle_payload(&self, text: &str) {
        let Ok(envelope) = serde_json::from_str::<NotificationEnvelope>(text) else {
            warn!("notification payload unreadable");
            return;
        };
        self.notify.toast(&envelope.message, Severity::Info);
        if let Ok(Some(badge)) = self.document.query_selector(BADGE_SELECTOR) {
            bump_badge(&badge);
        }
        if let Ok(Some(counter)) = self.document.query_selector(UNREAD_SELECTOR) {
            bump_badge(&counter);
        }
    }
}
