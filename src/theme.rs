use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::EventListener;
use web_sys::{Document, MediaQueryList};

use crate::dom;
use crate::notify::{Notify, Severity};
use crate::prefs::{PreferenceStore, THEME_KEY};

const DARK_CLASS: &str = "dark";
const DARK_SCHEME_QUERY: &str = "(prefers-color-scheme: dark)";
const TOGGLE_BUTTON_ID: &str = "theme-toggle";
const DARK_ICON_ID: &str = "theme-toggle-dark-icon";
const LIGHT_ICON_ID: &str = "theme-toggle-light-icon";
const THEME_TOAST_MS: u32 = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Theme> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    fn flipped(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Persisted choice wins; otherwise the OS preference; otherwise light.
pub(crate) fn resolve_theme(stored: Option<Theme>, system_dark: bool) -> Theme {
    match stored {
        Some(theme) => theme,
        None if system_dark => Theme::Dark,
        None => Theme::Light,
    }
}

/// Light/dark switching over the root element's `dark` marker class. The OS
/// preference is followed live only until the user picks a theme explicitly.
pub(crate) struct ThemeController {
    document: Document,
    store: Rc<dyn PreferenceStore>,
    notify: Rc<dyn Notify>,
    media: RefCell<Option<MediaQueryList>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl ThemeController {
    pub(crate) fn new(
        document: Document,
        store: Rc<dyn PreferenceStore>,
        notify: Rc<dyn Notify>,
    ) -> Rc<Self> {
        Rc::new(Self {
            document,
            store,
            notify,
            media: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        self.initialized.set(true);

        *self.media.borrow_mut() = dom::window()
            .and_then(|window| window.match_media(DARK_SCHEME_QUERY).ok())
            .flatten();

        // Initial render applies but does not persist, so a visitor with no
        // stored choice keeps following the OS.
        self.apply(self.current_theme(), false);

        if let Some(button) = self.document.get_element_by_id(TOGGLE_BUTTON_ID) {
            let controller = Rc::clone(self);
            let listener = EventListener::new(&button, "click", move |_event| {
                let next = controller.current_theme().flipped();
                controller.apply(next, true);
                controller.announce(next);
            });
            self.listeners.borrow_mut().push(listener);
        }

        let media = self.media.borrow().clone();
        if let Some(media) = media {
            let controller = Rc::clone(self);
            let listener = EventListener::new(&media, "change", move |_event| {
                if controller.stored_theme().is_some() {
                    // Explicit preference disables auto-follow.
                    return;
                }
                controller.apply(controller.current_theme(), false);
            });
            self.listeners.borrow_mut().push(listener);
        }
    }

    pub(crate) fn current_theme(&self) -> Theme {
        resolve_theme(self.stored_theme(), self.system_prefers_dark())
    }

    fn stored_theme(&self) -> Option<Theme> {
        self.store
            .get(THEME_KEY)
            .and_then(|value| Theme::parse(&value))
    }

    fn system_prefers_dark(&self) -> bool {
        self.media
            .borrow()
            .as_ref()
            .map(MediaQueryList::matches)
            .unwrap_or(false)
    }

    fn apply(&self, theme: Theme, persist: bool) {
        if let Some(root) = self.document.document_element() {
            dom::set_class(&root, DARK_CLASS, theme == Theme::Dark);
            dom::set_style(&root, "color-scheme", theme.as_str());
        }
        self.update_icons(theme);
        if persist {
            self.store.set(THEME_KEY, theme.as_str());
        }
    }

    fn update_icons(&self, theme: Theme) {
        let is_dark = theme == Theme::Dark;
        if let Some(dark_icon) = self.document.get_element_by_id(DARK_ICON_ID) {
            dom::set_class(&dark_icon, "hidden", is_dark);
        }
        if let Some(light_icon) = self.document.get_element_by_id(LIGHT_ICON_ID) {
            dom::set_class(&light_icon, "hidden", !is_dark);
        }
    }

    fn announce(&self, theme: Theme) {
        let (message, severity) = match theme {
            Theme::Dark => ("Dark theme enabled", Severity::Info),
            Theme::Light => ("Light theme enabled", Severity::Success),
        };
        self.notify.toast_for(message, severity, THEME_TOAST_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryStore;

    #[test]
    fn os_preference_fills_in_when_nothing_is_stored() {
        assert_eq!(resolve_theme(None, true), Theme::Dark);
        assert_eq!(resolve_theme(None, false), Theme::Light);
    }

    #[test]
    fn stored_choice_overrides_the_os() {
        assert_eq!(resolve_theme(Some(Theme::Light), true), Theme::Light);
        assert_eq!(resolve_theme(Some(Theme::Dark), false), Theme::Dark);
    }

    #[test]
    fn persisted_value_round_trips_through_the_store() {
        let store = MemoryStore::default();
        let stored = store.get(THEME_KEY).and_then(|value| Theme::parse(&value));
        assert_eq!(resolve_theme(stored, true), Theme::Dark);

        store.set(THEME_KEY, Theme::Light.as_str());
        let stored = store.get(THEME_KEY).and_then(|value| Theme::parse(&value));
        // OS still reports dark; the explicit choice wins.
        assert_eq!(resolve_theme(stored, true), Theme::Light);
    }

    #[test]
    fn unknown_stored_values_fall_back() {
        assert_eq!(Theme::parse("solarized"), None);
        assert_eq!(resolve_theme(Theme::parse("solarized"), false), Theme::Light);
    }
}
