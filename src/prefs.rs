#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::HashMap;

pub(crate) const THEME_KEY: &str = "devblog-theme";
pub(crate) const VISITED_KEY: &str = "devblog-visited";

/// Persisted client state: single string values under namespaced keys,
/// no versioning. The browser owns the data; we read and write directly.
pub(crate) trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

pub(crate) struct LocalStore;

impl PreferenceStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        let storage = crate::dom::window()?.local_storage().ok()??;
        storage.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) {
        let Some(storage) =
            crate::dom::window().and_then(|window| window.local_storage().ok().flatten())
        else {
            return;
        };
        let _ = storage.set_item(key, value);
    }
}

/// In-memory stand-in used where real storage is unavailable.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

#[cfg(test)]
impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::default();
        assert_eq!(store.get(THEME_KEY), None);
        store.set(THEME_KEY, "dark");
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
        store.set(THEME_KEY, "light");
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));
    }
}
