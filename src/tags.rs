use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::console::warn;
use gloo::events::{EventListener, EventListenerOptions};
use gloo::timers::callback::Timeout;
use serde::Deserialize;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlInputElement, KeyboardEvent};

use crate::dom;
use crate::notify::{Notify, Severity};

pub(crate) const MAX_TAGS: usize = 10;
pub(crate) const MIN_TAG_LEN: usize = 2;
pub(crate) const SUGGEST_DEBOUNCE_MS: u32 = 300;
pub(crate) const CONTENT_DEBOUNCE_MS: u32 = 2000;
const POPULAR_STRIP_LIMIT: usize = 8;

const HIDDEN_INPUT_ID: &str = "id_tags";
const TITLE_INPUT_ID: &str = "id_title";

// ---------------------------------------------------------------------------
// Pure tag set
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TagRejection {
    TooShort,
    Duplicate,
    CapReached,
}

impl TagRejection {
    fn message(&self, max: usize) -> String {
        match self {
            TagRejection::TooShort => {
                format!("Tags need at least {MIN_TAG_LEN} characters")
            }
            TagRejection::Duplicate => "That tag is already added".to_string(),
            TagRejection::CapReached => format!("At most {max} tags are allowed"),
        }
    }
}

/// Selected tags: lowercase-normalized, unique, insertion-ordered, capped.
/// Mirrored into the hidden form field as a comma-joined string — the only
/// channel back to form submission.
pub(crate) struct TagSet {
    tags: Vec<String>,
    max: usize,
}

impl TagSet {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            tags: Vec::new(),
            max,
        }
    }

    /// Seeds from an existing comma-joined field value; entries that fail
    /// normalization are dropped silently.
    pub(crate) fn from_serialized(raw: &str, max: usize) -> Self {
        let mut set = Self::new(max);
        for part in raw.split(',') {
            let _ = set.add(part);
        }
        set
    }

    pub(crate) fn add(&mut self, raw: &str) -> Result<String, TagRejection> {
        let tag = normalize_tag(raw);
        if tag.chars().count() < MIN_TAG_LEN {
            return Err(TagRejection::TooShort);
        }
        if self.tags.iter().any(|existing| existing == &tag) {
            return Err(TagRejection::Duplicate);
        }
        if self.tags.len() >= self.max {
            return Err(TagRejection::CapReached);
        }
        self.tags.push(tag.clone());
        Ok(tag)
    }

    pub(crate) fn remove(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag);
        self.tags.len() != before
    }

    pub(crate) fn pop_last(&mut self) -> Option<String> {
        self.tags.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.tags.len()
    }

    pub(crate) fn serialized(&self) -> String {
        self.tags.join(", ")
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

pub(crate) fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Wire types and API seam
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TagSuggestion {
    name: Option<String>,
    tag: Option<String>,
    pub(crate) usage_count: Option<u64>,
    pub(crate) is_trending: Option<bool>,
}

impl TagSuggestion {
    pub(crate) fn label(&self) -> Option<&str> {
        self.name.as_deref().or(self.tag.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeywordSuggestion {
    pub(crate) keyword: String,
    pub(crate) score: Option<f64>,
}

/// Suggestion endpoints behind a seam so tests can feed canned data. Every
/// failure surfaces as an empty list: suggestions are best-effort and must
/// never break tag editing itself.
pub(crate) trait TagApi {
    fn suggest(&self, query: &str, done: Box<dyn FnOnce(Vec<TagSuggestion>)>);
    fn popular(&self, done: Box<dyn FnOnce(Vec<String>)>);
    fn keywords(&self, title: &str, content: &str, done: Box<dyn FnOnce(Vec<KeywordSuggestion>)>);
}

pub(crate) struct FetchTagApi;

const SUGGEST_ENDPOINT: &str = "/api/tags/suggest/";
const POPULAR_ENDPOINT: &str = "/api/tags/popular/";
const KEYWORDS_ENDPOINT: &str = "/api/tags/keywords/";

#[derive(Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    suggestions: Vec<TagSuggestion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PopularTag {
    Plain(String),
    Named { name: String },
}

#[derive(Deserialize)]
struct PopularResponse {
    #[serde(default)]
    tags: Vec<PopularTag>,
}

#[derive(Deserialize)]
struct KeywordsResponse {
    #[serde(default)]
    suggestions: Vec<KeywordSuggestion>,
}

impl TagApi for FetchTagApi {
    fn suggest(&self, query: &str, done: Box<dyn FnOnce(Vec<TagSuggestion>)>) {
        let url = format!("{SUGGEST_ENDPOINT}?q={}", crate::http::uri_encode(query));
        wasm_bindgen_futures::spawn_local(async move {
            let body = crate::http::get_json(&url).await;
            let suggestions = body
                .and_then(|text| serde_json::from_str::<SuggestResponse>(&text).ok())
                .map(|response| response.suggestions)
                .unwrap_or_default();
            done(suggestions);
        });
    }

    fn popular(&self, done: Box<dyn FnOnce(Vec<String>)>) {
        wasm_bindgen_futures::spawn_local(async move {
            let body = crate::http::get_json(POPULAR_ENDPOINT).await;
            let tags = body
                .and_then(|text| serde_json::from_str::<PopularResponse>(&text).ok())
                .map(|response| {
                    response
                        .tags
                        .into_iter()
                        .map(|tag| match tag {
                            PopularTag::Plain(name) => name,
                            PopularTag::Named { name } => name,
                        })
                        .collect()
                })
                .unwrap_or_default();
            done(tags);
        });
    }

    fn keywords(
        &self,
        title: &str,
        content: &str,
        done: Box<dyn FnOnce(Vec<KeywordSuggestion>)>,
    ) {
        let payload = serde_json::json!({ "title": title, "content": content }).to_string();
        wasm_bindgen_futures::spawn_local(async move {
            let body = crate::http::post_json(KEYWORDS_ENDPOINT, &payload).await;
            let suggestions = body
                .and_then(|text| serde_json::from_str::<KeywordsResponse>(&text).ok())
                .map(|response| response.suggestions)
                .unwrap_or_default();
            done(suggestions);
        });
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Chip editor over the hidden tags field: debounced suggestion lookups,
/// popular-tags fallback, keyboard navigation, and a secondary content-keyword
/// fetch whose failures never touch the primary flow.
pub(crate) struct TagAutocompleteController {
    document: Document,
    notify: Rc<dyn Notify>,
    api: Rc<dyn TagApi>,
    tags: RefCell<TagSet>,
    hidden_input: RefCell<Option<HtmlInputElement>>,
    visual_input: RefCell<Option<HtmlInputElement>>,
    chips: RefCell<Option<Element>>,
    panel: RefCell<Option<Element>>,
    popular_strip: RefCell<Option<Element>>,
    popular_tags: RefCell<Vec<String>>,
    highlight: Cell<Option<usize>>,
    suggestion_labels: RefCell<Vec<String>>,
    suggest_timer: RefCell<Option<Timeout>>,
    content_timer: RefCell<Option<Timeout>>,
    content_provider: RefCell<Option<Rc<dyn Fn() -> String>>>,
    listeners: RefCell<Vec<EventListener>>,
    initialized: Cell<bool>,
}

impl TagAutocompleteController {
    pub(crate) fn new(
        document: Document,
        notify: Rc<dyn Notify>,
        api: Rc<dyn TagApi>,
    ) -> Rc<Self> {
        Rc::new(Self {
            document,
            notify,
            api,
            tags: RefCell::new(TagSet::new(MAX_TAGS)),
            hidden_input: RefCell::new(None),
            visual_input: RefCell::new(None),
            chips: RefCell::new(None),
            panel: RefCell::new(None),
            popular_strip: RefCell::new(None),
            popular_tags: RefCell::new(Vec::new()),
            highlight: Cell::new(None),
            suggestion_labels: RefCell::new(Vec::new()),
            suggest_timer: RefCell::new(None),
            content_timer: RefCell::new(None),
            content_provider: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    /// Source for the body text behind the content-keyword fetch; wired to
    /// the editor registry at bootstrap.
    pub(crate) fn set_content_provider(&self, provider: Rc<dyn Fn() -> String>) {
        *self.content_provider.borrow_mut() = Some(provider);
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        let Some(hidden) = self
            .document
            .get_element_by_id(HIDDEN_INPUT_ID)
            .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
        else {
            // Not a post form page.
            return;
        };
        self.initialized.set(true);

        *self.tags.borrow_mut() = TagSet::from_serialized(&hidden.value(), MAX_TAGS);
        dom::set_style(&hidden, "display", "none");
        *self.hidden_input.borrow_mut() = Some(hidden);

        if self.build_ui().is_none() {
            warn!("tag editor: could not build the chip UI");
            return;
        }
        self.render_chips();
        self.mirror_hidden_field();
        self.wire_events();
        self.load_popular();
        self.wire_content_watch();
    }

    fn build_ui(self: &Rc<Self>) -> Option<()> {
        let hidden = self.hidden_input.borrow().clone()?;
        let container = self.document.create_element("div").ok()?;
        container.set_class_name("tag-editor");

        let chips = self.document.create_element("div").ok()?;
        chips.set_class_name("tag-chips");

        let visual = self
            .document
            .create_element("input")
            .ok()?
            .dyn_into::<HtmlInputElement>()
            .ok()?;
        visual.set_type("text");
        visual.set_class_name(&hidden.class_name());
        visual.set_placeholder("Type to search tags or add new ones");

        let panel = self.document.create_element("div").ok()?;
        panel.set_class_name("tag-suggestions hidden");

        let popular = self.document.create_element("div").ok()?;
        popular.set_class_name("tag-popular");

        container.append_child(&chips).ok()?;
        container.append_child(&visual).ok()?;
        container.append_child(&panel).ok()?;
        container.append_child(&popular).ok()?;

        let parent = hidden.parent_node()?;
        parent
            .insert_before(&container, hidden.next_sibling().as_ref())
            .ok()?;

        *self.chips.borrow_mut() = Some(chips);
        *self.visual_input.borrow_mut() = Some(visual);
        *self.panel.borrow_mut() = Some(panel);
        *self.popular_strip.borrow_mut() = Some(popular);
        Some(())
    }

    fn wire_events(self: &Rc<Self>) {
        let Some(visual) = self.visual_input.borrow().clone() else {
            return;
        };

        let controller = Rc::clone(self);
        let input_listener = EventListener::new(&visual, "input", move |_event| {
            controller.handle_input();
        });

        let controller = Rc::clone(self);
        let key_listener = EventListener::new_with_options(
            &visual,
            "keydown",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                if let Some(key_event) = event.dyn_ref::<KeyboardEvent>() {
                    controller.handle_keydown(key_event);
                }
            },
        );

        // Chip removal, suggestion picks, and popular picks are delegated so
        // re-rendered children need no listener bookkeeping.
        let controller = Rc::clone(self);
        let pick_listener = EventListener::new(&self.document, "click", move |event| {
            if let Some(chip) = dom::closest_from_target(event, "[data-remove-tag]") {
                if let Some(tag) = chip.get_attribute("data-remove-tag") {
                    controller.remove_tag(&tag);
                }
                return;
            }
            if let Some(item) = dom::closest_from_target(event, "[data-suggest]") {
                if let Some(tag) = item.get_attribute("data-suggest") {
                    controller.commit_tag(&tag);
                    controller.clear_input_and_panel();
                }
                return;
            }
            if let Some(chip) = dom::closest_from_target(event, "[data-popular-tag]") {
                if let Some(tag) = chip.get_attribute("data-popular-tag") {
                    controller.commit_tag(&tag);
                }
                return;
            }
            if let Some(panel) = controller.panel.borrow().as_ref() {
                if !dom::contains_target(panel, event) {
                    dom::add_class(panel, "hidden");
                }
            }
        });

        self.listeners
            .borrow_mut()
            .extend([input_listener, key_listener, pick_listener]);
    }

    fn handle_input(self: &Rc<Self>) {
        let Some(visual) = self.visual_input.borrow().clone() else {
            return;
        };
        let value = visual.value();
        let query = value.trim().to_string();
        self.suggest_timer.borrow_mut().take();

        if query.is_empty() {
            self.show_popular_fallback();
            return;
        }
        if query.chars().count() < MIN_TAG_LEN {
            self.hide_panel();
            return;
        }
        let controller = Rc::clone(self);
        let timer = Timeout::new(SUGGEST_DEBOUNCE_MS, move || {
            let inner = Rc::clone(&controller);
            controller.api.suggest(
                &query,
                Box::new(move |suggestions| {
                    inner.render_suggestions(&suggestions);
                }),
            );
        });
        *self.suggest_timer.borrow_mut() = Some(timer);
    }

    fn handle_keydown(self: &Rc<Self>, event: &KeyboardEvent) {
        let Some(visual) = self.visual_input.borrow().clone() else {
            return;
        };
        match event.key().as_str() {
            "Enter" | "," => {
                event.prevent_default();
                let value = visual.value();
                if !value.trim().is_empty() {
                    self.commit_tag(&value);
                    self.clear_input_and_panel();
                }
            }
            "Backspace" => {
                if visual.value().is_empty() {
                    let popped = self.tags.borrow_mut().pop_last();
                    if popped.is_some() {
                        self.render_chips();
                        self.mirror_hidden_field();
                    }
                }
            }
            "ArrowDown" => {
                event.prevent_default();
                self.move_highlight(1);
            }
            "ArrowUp" => {
                event.prevent_default();
                self.move_highlight(-1);
            }
            "Escape" => {
                self.hide_panel();
            }
            _ => {}
        }
    }

    fn commit_tag(self: &Rc<Self>, raw: &str) {
        let added = self.tags.borrow_mut().add(raw);
        match added {
            Ok(tag) => {
                self.render_chips();
                self.mirror_hidden_field();
                self.notify
                    .toast(&format!("Tag \"{tag}\" added"), Severity::Success);
            }
            Err(rejection) => {
                let severity = match rejection {
                    TagRejection::Duplicate => Severity::Info,
                    _ => Severity::Warning,
                };
                self.notify.toast(&rejection.message(MAX_TAGS), severity);
            }
        }
    }

    fn remove_tag(self: &Rc<Self>, tag: &str) {
        if self.tags.borrow_mut().remove(tag) {
            self.render_chips();
            self.mirror_hidden_field();
        }
    }

    fn render_chips(&self) {
        let Some(chips) = self.chips.borrow().clone() else {
            return;
        };
        chips.set_inner_html("");
        for tag in self.tags.borrow().iter() {
            let Ok(chip) = self.document.create_element("span") else {
                continue;
            };
            chip.set_class_name("tag-chip");
            chip.set_text_content(Some(tag));
            if let Ok(remove) = self.document.create_element("button") {
                let _ = remove.set_attribute("type", "button");
                let _ = remove.set_attribute("data-remove-tag", tag);
                let _ = remove.set_attribute("aria-label", &format!("Remove tag {tag}"));
                remove.set_text_content(Some("×"));
                let _ = chip.append_child(&remove);
            }
            let _ = chips.append_child(&chip);
        }
    }

    /// The single write path into form submission.
    fn mirror_hidden_field(&self) {
        if let Some(hidden) = self.hidden_input.borrow().as_ref() {
            hidden.set_value(&self.tags.borrow().serialized());
        }
    }

    fn render_suggestions(&self, suggestions: &[TagSuggestion]) {
        let Some(panel) = self.panel.borrow().clone() else {
            return;
        };
        panel.set_inner_html("");
        self.highlight.set(None);
        let mut labels = Vec::new();
        for suggestion in suggestions {
            let Some(label) = suggestion.label() else {
                continue;
            };
            let Ok(item) = self.document.create_element("div") else {
                continue;
            };
            item.set_class_name("suggestion-item");
            let _ = item.set_attribute("data-suggest", label);
            let text = match suggestion.usage_count {
                Some(count) => format!("{label} · {count} posts"),
                None => label.to_string(),
            };
            item.set_text_content(Some(&text));
            if suggestion.is_trending == Some(true) {
                dom::add_class(&item, "trending");
            }
            let _ = panel.append_child(&item);
            labels.push(label.to_string());
        }
        if labels.is_empty() {
            let Ok(empty) = self.document.create_element("div") else {
                return;
            };
            empty.set_class_name("suggestion-empty");
            empty.set_text_content(Some("No matching tags"));
            let _ = panel.append_child(&empty);
        }
        *self.suggestion_labels.borrow_mut() = labels;
        dom::remove_class(&panel, "hidden");
    }

    fn show_popular_fallback(&self) {
        let popular = self.popular_tags.borrow();
        let suggestions: Vec<TagSuggestion> = popular
            .iter()
            .take(POPULAR_STRIP_LIMIT)
            .map(|name| TagSuggestion {
                name: Some(name.clone()),
                tag: None,
                usage_count: None,
                is_trending: None,
            })
            .collect();
        drop(popular);
        self.render_suggestions(&suggestions);
    }

    fn move_highlight(&self, delta: i32) {
        let labels = self.suggestion_labels.borrow();
        if labels.is_empty() {
            return;
        }
        let next = match self.highlight.get() {
            Some(index) => {
                let moved = index as i32 + delta;
                moved.clamp(0, labels.len() as i32 - 1) as usize
            }
            None => {
                if delta > 0 {
                    0
                } else {
                    labels.len() - 1
                }
            }
        };
        self.highlight.set(Some(next));
        drop(labels);
        self.apply_highlight(next);
    }

    fn apply_highlight(&self, index: usize) {
        let Some(panel) = self.panel.borrow().clone() else {
            return;
        };
        let Ok(items) = panel.query_selector_all(".suggestion-item") else {
            return;
        };
        for i in 0..items.length() {
            let Some(item) = items.item(i).and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            dom::set_class(&item, "active", i as usize == index);
            if i as usize == index {
                if let Some(visual) = self.visual_input.borrow().as_ref() {
                    // Highlighted suggestion becomes the pending text so
                    // Enter commits it.
                    if let Some(label) = item.get_attribute("data-suggest") {
                        visual.set_value(&label);
                    }
                }
            }
        }
    }

    fn clear_input_and_panel(&self) {
        if let Some(visual) = self.visual_input.borrow().as_ref() {
            visual.set_value("");
        }
        self.hide_panel();
    }

    fn hide_panel(&self) {
        if let Some(panel) = self.panel.borrow().as_ref() {
            dom::add_class(panel, "hidden");
        }
        self.highlight.set(None);
    }

    fn load_popular(self: &Rc<Self>) {
        let controller = Rc::clone(self);
        self.api.popular(Box::new(move |tags| {
            controller.render_popular_strip(&tags);
            *controller.popular_tags.borrow_mut() = tags;
        }));
    }

    fn render_popular_strip(&self, tags: &[String]) {
        let Some(strip) = self.popular_strip.borrow().clone() else {
            return;
        };
        strip.set_inner_html("");
        for tag in tags.iter().take(POPULAR_STRIP_LIMIT) {
            let Ok(chip) = self.document.create_element("button") else {
                continue;
            };
            let _ = chip.set_attribute("type", "button");
            let _ = chip.set_attribute("data-popular-tag", tag);
            chip.set_class_name("tag-popular-chip");
            chip.set_text_content(Some(tag));
            let _ = strip.append_child(&chip);
        }
    }

    fn wire_content_watch(self: &Rc<Self>) {
        let Some(title) = self.document.get_element_by_id(TITLE_INPUT_ID) else {
            return;
        };
        let controller = Rc::clone(self);
        let listener = EventListener::new(&title, "input", move |_event| {
            controller.note_content_edited();
        });
        self.listeners.borrow_mut().push(listener);
    }

    /// Debounces the secondary content-keyword fetch. Called for title edits
    /// and, via bootstrap wiring, for editor changes.
    pub(crate) fn note_content_edited(self: &Rc<Self>) {
        let controller = Rc::clone(self);
        let timer = Timeout::new(CONTENT_DEBOUNCE_MS, move || {
            controller.fetch_content_keywords();
        });
        *self.content_timer.borrow_mut() = Some(timer);
    }

    fn fetch_content_keywords(self: &Rc<Self>) {
        let title = self
            .document
            .get_element_by_id(TITLE_INPUT_ID)
            .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
            .unwrap_or_default();
        let content = self
            .content_provider
            .borrow()
            .as_ref()
            .map(|provider| provider())
            .unwrap_or_default();
        if title.is_empty() && content.is_empty() {
            return;
        }
        let controller = Rc::clone(self);
        self.api.keywords(
            &title,
            &content,
            Box::new(move |keywords| {
                controller.render_content_keywords(&keywords);
            }),
        );
    }

    fn render_content_keywords(&self, keywords: &[KeywordSuggestion]) {
        let Some(strip) = self.popular_strip.borrow().clone() else {
            return;
        };
        // Content-derived keywords share the strip below the input, after
        // the popular chips.
        let existing = strip.query_selector_all("[data-keyword]").ok();
        if let Some(existing) = existing {
            for i in 0..existing.length() {
                if let Some(node) = existing.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                    node.remove();
                }
            }
        }
        for keyword in keywords.iter().take(MAX_TAGS) {
            let Ok(chip) = self.document.create_element("button") else {
                continue;
            };
            let _ = chip.set_attribute("type", "button");
            let _ = chip.set_attribute("data-popular-tag", &keyword.keyword);
            let _ = chip.set_attribute("data-keyword", "true");
            chip.set_class_name("tag-keyword-chip");
            let text = match keyword.score {
                Some(score) => format!("{} {}%", keyword.keyword, (score * 100.0).round()),
                None => keyword.keyword.clone(),
            };
            chip.set_text_content(Some(&text));
            let _ = strip.append_child(&chip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_before_storing() {
        let mut tags = TagSet::new(MAX_TAGS);
        assert_eq!(tags.add("  JavaScript  ").unwrap(), "javascript");
        assert_eq!(tags.serialized(), "javascript");
    }

    #[test]
    fn rejects_duplicates_after_normalization() {
        let mut tags = TagSet::new(MAX_TAGS);
        tags.add("Rust").unwrap();
        assert_eq!(tags.add("  rust "), Err(TagRejection::Duplicate));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn rejects_below_minimum_length() {
        let mut tags = TagSet::new(MAX_TAGS);
        assert_eq!(tags.add("a"), Err(TagRejection::TooShort));
        assert_eq!(tags.add("  "), Err(TagRejection::TooShort));
        assert_eq!(tags.len(), 0);
    }

    #[test]
    fn cap_leaves_the_serialized_field_unchanged() {
        let mut tags = TagSet::new(MAX_TAGS);
        for i in 0..MAX_TAGS {
            tags.add(&format!("tag{i:02}")).unwrap();
        }
        let before = tags.serialized();
        assert_eq!(tags.add("overflow"), Err(TagRejection::CapReached));
        assert_eq!(tags.serialized(), before);
        assert_eq!(before.split(", ").count(), MAX_TAGS);
    }

    #[test]
    fn backspace_pop_removes_most_recent() {
        let mut tags = TagSet::new(MAX_TAGS);
        tags.add("first").unwrap();
        tags.add("second").unwrap();
        assert_eq!(tags.pop_last().as_deref(), Some("second"));
        assert_eq!(tags.serialized(), "first");
    }

    #[test]
    fn seeds_from_existing_field_value() {
        let tags = TagSet::from_serialized("Rust, WebAssembly,  rust , x", MAX_TAGS);
        let collected: Vec<&str> = tags.iter().collect();
        // Duplicate and too-short entries are dropped.
        assert_eq!(collected, vec!["rust", "webassembly"]);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut tags = TagSet::new(MAX_TAGS);
        tags.add("zeta").unwrap();
        tags.add("alpha").unwrap();
        assert_eq!(tags.serialized(), "zeta, alpha");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::*;
    use web_sys::KeyboardEventInit;

    wasm_bindgen_test_configure!(run_in_browser);

    struct SilentNotify;

    impl Notify for SilentNotify {
        fn toast_for(&self, _message: &str, _severity: Severity, _duration_ms: u32) {}
    }

    struct EmptyApi;

    impl TagApi for EmptyApi {
        fn suggest(&self, _query: &str, done: Box<dyn FnOnce(Vec<TagSuggestion>)>) {
            done(Vec::new());
        }

        fn popular(&self, done: Box<dyn FnOnce(Vec<String>)>) {
            done(Vec::new());
        }

        fn keywords(
            &self,
            _title: &str,
            _content: &str,
            done: Box<dyn FnOnce(Vec<KeywordSuggestion>)>,
        ) {
            done(Vec::new());
        }
    }

    fn mount_form(document: &Document, seeded: &str) -> (Element, HtmlInputElement) {
        let wrapper = document.create_element("div").unwrap();
        let hidden = document
            .create_element("input")
            .unwrap()
            .dyn_into::<HtmlInputElement>()
            .unwrap();
        hidden.set_id(HIDDEN_INPUT_ID);
        hidden.set_value(seeded);
        wrapper.append_child(&hidden).unwrap();
        document.body().unwrap().append_child(&wrapper).unwrap();
        (wrapper, hidden)
    }

    fn press(input: &HtmlInputElement, key: &str) {
        let init = KeyboardEventInit::new();
        init.set_key(key);
        init.set_bubbles(true);
        init.set_cancelable(true);
        let event =
            KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
        input.dispatch_event(&event).unwrap();
    }

    fn visual_input(wrapper: &Element) -> HtmlInputElement {
        wrapper
            .query_selector(".tag-editor input[type=text]")
            .unwrap()
            .unwrap()
            .dyn_into::<HtmlInputElement>()
            .unwrap()
    }

    #[wasm_bindgen_test]
    fn commits_mirror_into_the_hidden_field() {
        let document = crate::dom::document().unwrap();
        let (wrapper, hidden) = mount_form(&document, "rust");
        let controller = TagAutocompleteController::new(
            document.clone(),
            Rc::new(SilentNotify),
            Rc::new(EmptyApi),
        );
        controller.install();

        // Seeded from the existing field value.
        assert_eq!(hidden.value(), "rust");

        let visual = visual_input(&wrapper);
        visual.set_value("WebAssembly");
        press(&visual, "Enter");
        assert_eq!(hidden.value(), "rust, webassembly");
        assert_eq!(visual.value(), "");

        // Backspace on an empty input pops the newest tag.
        press(&visual, "Backspace");
        assert_eq!(hidden.value(), "rust");

        wrapper.remove();
    }

    #[wasm_bindgen_test]
    fn rejected_additions_leave_the_field_untouched() {
        let document = crate::dom::document().unwrap();
        let seeded: Vec<String> = (0..MAX_TAGS).map(|i| format!("tag{i:02}")).collect();
        let (wrapper, hidden) = mount_form(&document, &seeded.join(", "));
        let controller = TagAutocompleteController::new(
            document.clone(),
            Rc::new(SilentNotify),
            Rc::new(EmptyApi),
        );
        controller.install();

        let before = hidden.value();
        let visual = visual_input(&wrapper);
        visual.set_value("overflow");
        press(&visual, "Enter");
        assert_eq!(hidden.value(), before);

        wrapper.remove();
    }
}
