use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use wasm_bindgen::JsValue;

use crate::dom;
use crate::editor::RichTextEditorManager;
use crate::effects::ScrollEffects;
use crate::http::FetchTransport;
use crate::nav::NavigationMenuController;
use crate::notifications::NotificationChannel;
use crate::notify::{Notify, Severity, ToastNotifier};
use crate::prefs::{LocalStore, PreferenceStore, VISITED_KEY};
use crate::share::ShareMenuController;
use crate::tags::{FetchTagApi, TagAutocompleteController};
use crate::theme::ThemeController;
use crate::toggle::ToggleController;

const WELCOME_DELAY_MS: u32 = 1000;
const WELCOME_DURATION_MS: u32 = 5000;
const WELCOME_MESSAGE: &str = "Welcome to DevBlog! 👋";

thread_local! {
    // The page owns exactly one app for its lifetime; dropping it would
    // detach every listener.
    static APP: RefCell<Option<Rc<App>>> = const { RefCell::new(None) };
}

/// Explicit owner of every controller on the page. Constructed once at
/// module start; controllers carry their own `initialized` guards so a
/// second `install` is a no-op rather than a double registration.
pub(crate) struct App {
    store: Rc<dyn PreferenceStore>,
    notify: Rc<dyn Notify>,
    toggles: Rc<ToggleController>,
    theme: Rc<ThemeController>,
    nav: Rc<NavigationMenuController>,
    share: Rc<ShareMenuController>,
    tags: Rc<TagAutocompleteController>,
    editors: Rc<RichTextEditorManager>,
    notifications: Rc<NotificationChannel>,
    effects: Rc<ScrollEffects>,
    welcome_timer: RefCell<Option<Timeout>>,
    teardown_listener: RefCell<Option<EventListener>>,
    installed: Cell<bool>,
}

impl App {
    fn new() -> Result<Rc<Self>, JsValue> {
        let document = dom::document().ok_or_else(|| JsValue::from_str("document missing"))?;
        let store: Rc<dyn PreferenceStore> = Rc::new(LocalStore);
        let notify: Rc<dyn Notify> = Rc::new(ToastNotifier::new(document.clone()));
        let transport = Rc::new(FetchTransport::new());

        Ok(Rc::new(Self {
            toggles: ToggleController::new(document.clone(), Rc::clone(&notify), transport),
            theme: ThemeController::new(document.clone(), Rc::clone(&store), Rc::clone(&notify)),
            nav: NavigationMenuController::new(document.clone()),
            share: ShareMenuController::new(document.clone(), Rc::clone(&notify)),
            tags: TagAutocompleteController::new(
                document.clone(),
                Rc::clone(&notify),
                Rc::new(FetchTagApi),
            ),
            editors: RichTextEditorManager::new(document.clone()),
            notifications: NotificationChannel::new(document.clone(), Rc::clone(&notify)),
            effects: ScrollEffects::new(&document),
            store,
            notify,
            welcome_timer: RefCell::new(None),
            teardown_listener: RefCell::new(None),
            installed: Cell::new(false),
        }))
    }

    fn install(self: &Rc<Self>) {
        if self.installed.get() {
            return;
        }
        self.installed.set(true);

        self.theme.install();
        self.nav.install();
        self.toggles.install();
        self.share.install();
        self.tags.install();
        self.editors.install();
        self.notifications.install();
        self.effects.install();

        // Editor content feeds the tag keyword suggestions.
        let editors = Rc::clone(&self.editors);
        self.tags
            .set_content_provider(Rc::new(move || editors.combined_data()));
        let tags = Rc::clone(&self.tags);
        self.editors
            .add_change_hook(Rc::new(move || tags.note_content_edited()));

        self.wire_teardown();
        self.greet_first_visit();
    }

    fn wire_teardown(self: &Rc<Self>) {
        let Some(window) = dom::window() else {
            return;
        };
        let editors = Rc::clone(&self.editors);
        let listener = EventListener::new(&window, "pagehide", move |_event| {
            editors.teardown();
        });
        *self.teardown_listener.borrow_mut() = Some(listener);
    }

    fn greet_first_visit(self: &Rc<Self>) {
        if self.store.get(VISITED_KEY).is_some() {
            return;
        }
        let notify = Rc::clone(&self.notify);
        let store = Rc::clone(&self.store);
        let timer = Timeout::new(WELCOME_DELAY_MS, move || {
            notify.toast_for(WELCOME_MESSAGE, Severity::Success, WELCOME_DURATION_MS);
            store.set(VISITED_KEY, "true");
        });
        *self.welcome_timer.borrow_mut() = Some(timer);
    }
}

/// Module entry point: builds the app once and parks it for the page's
/// lifetime.
pub(crate) fn start() -> Result<(), JsValue> {
    APP.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Ok(());
        }
        let app = App::new()?;
        app.install();
        *slot = Some(app);
        Ok(())
    })
}
