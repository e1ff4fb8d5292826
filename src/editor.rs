use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gloo::console::warn;
use gloo::timers::callback::Timeout;
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlTextAreaElement, MutationObserver, MutationObserverInit};

use crate::cookies;

const PLACEHOLDER_SELECTOR: &str = ".django_ckeditor_5";
const PROCESSED_ATTR: &str = "data-processed";
const TEMPLATE_MARKER: &str = "__prefix__";
const MIRROR_DEBOUNCE_MS: u32 = 100;
const MUTATION_THROTTLE_MS: u32 = 50;

#[wasm_bindgen]
extern "C" {
    /// The rich-text library is an opaque collaborator: one constructor in,
    /// `getData`/`destroy` out. Its plugin set is not modelled here.
    type ClassicEditor;

    #[wasm_bindgen(static_method_of = ClassicEditor, catch)]
    fn create(element: &Element, config: &JsValue) -> Result<Promise, JsValue>;
}

// ---------------------------------------------------------------------------
// Per-instance configuration
// ---------------------------------------------------------------------------

struct EditorMetadata {
    upload_url: String,
    file_types: Vec<String>,
    csrf_cookie: String,
    options_json: String,
}

/// Reads the sibling metadata elements the server renders next to each
/// placeholder: `#{id}_script-ck-editor-5-upload-url` carries the upload
/// attributes, `#{id}_script-span` carries the JSON options blob.
fn read_metadata(document: &Document, script_id: &str) -> Result<EditorMetadata, String> {
    let upload = document
        .get_element_by_id(&format!("{script_id}-ck-editor-5-upload-url"))
        .ok_or_else(|| format!("missing upload metadata for {script_id}"))?;
    let upload_url = upload
        .get_attribute("data-upload-url")
        .ok_or_else(|| format!("missing data-upload-url for {script_id}"))?;
    let csrf_cookie = upload
        .get_attribute("data-csrf_cookie_name")
        .ok_or_else(|| format!("missing data-csrf_cookie_name for {script_id}"))?;
    let file_types = upload
        .get_attribute("data-upload-file-types")
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default();
    let options_json = document
        .get_element_by_id(&format!("{script_id}-span"))
        .and_then(|span| span.text_content())
        .ok_or_else(|| format!("missing options blob for {script_id}"))?;
    Ok(EditorMetadata {
        upload_url,
        file_types,
        csrf_cookie,
        options_json,
    })
}

/// Merges the upload endpoint, anti-forgery header, and allowed file types
/// into the server-provided options object. Pure on JSON text so the merge
/// rules are testable off-browser.
fn augment_options(
    options_json: &str,
    upload_url: &str,
    csrf_token: Option<&str>,
    file_types: &[String],
) -> Result<String, String> {
    let mut options: serde_json::Value =
        serde_json::from_str(options_json).map_err(|error| error.to_string())?;
    let object = options
        .as_object_mut()
        .ok_or_else(|| "options blob is not a JSON object".to_string())?;
    let mut headers = serde_json::Map::new();
    if let Some(token) = csrf_token {
        headers.insert(
            crate::http::CSRF_HEADER.to_string(),
            serde_json::Value::String(token.to_string()),
        );
    }
    object.insert(
        "simpleUpload".to_string(),
        serde_json::json!({ "uploadUrl": upload_url, "headers": headers }),
    );
    object.insert(
        "fileUploader".to_string(),
        serde_json::json!({ "fileTypes": file_types }),
    );
    object.insert(
        "licenseKey".to_string(),
        serde_json::Value::String("GPL".to_string()),
    );
    Ok(options.to_string())
}

fn build_config(document: &Document, script_id: &str) -> Result<JsValue, String> {
    let metadata = read_metadata(document, script_id)?;
    let token = cookies::cookie_named(&metadata.csrf_cookie);
    let merged = augment_options(
        &metadata.options_json,
        &metadata.upload_url,
        token.as_deref(),
        &metadata.file_types,
    )?;
    js_sys::JSON::parse(&merged).map_err(|error| crate::dom::js_err(error))
}

// ---------------------------------------------------------------------------
// Instance handle
// ---------------------------------------------------------------------------

/// Opaque editor instance plus the change closure that must outlive it.
struct EditorHandle {
    raw: JsValue,
    _change_hook: Option<Closure<dyn FnMut()>>,
}

impl EditorHandle {
    fn data(&self) -> String {
        call_method(&self.raw, "getData")
            .and_then(|value| value.as_string())
            .unwrap_or_default()
    }

    fn destroy(&self) {
        if call_method(&self.raw, "destroy").is_none() {
            warn!("editor destroy failed");
        }
    }
}

fn call_method(target: &JsValue, name: &str) -> Option<JsValue> {
    let method = Reflect::get(target, &JsValue::from_str(name)).ok()?;
    let method: Function = method.dyn_into().ok()?;
    method.call0(target).ok()
}

/// Subscribes to the editor's `change:data` event. Returns the closure so the
/// caller can keep it alive for the instance's lifetime.
fn wire_change_hook(
    raw: &JsValue,
    on_change: impl Fn() + 'static,
) -> Option<Closure<dyn FnMut()>> {
    let model = Reflect::get(raw, &JsValue::from_str("model")).ok()?;
    let model_document = Reflect::get(&model, &JsValue::from_str("document")).ok()?;
    let on: Function = Reflect::get(&model_document, &JsValue::from_str("on"))
        .ok()?
        .dyn_into()
        .ok()?;
    let hook = Closure::<dyn FnMut()>::new(move || on_change());
    on.call2(
        &model_document,
        &JsValue::from_str("change:data"),
        hook.as_ref(),
    )
    .ok()?;
    Some(hook)
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns every rich-text instance on the page: creates editors for matching
/// placeholders, mirrors their content back into the form fields, watches for
/// dynamically inserted placeholders, and destroys everything at teardown.
pub(crate) struct RichTextEditorManager {
    document: Document,
    editors: RefCell<HashMap<String, EditorHandle>>,
    observer: RefCell<Option<MutationObserver>>,
    observer_hook: RefCell<Option<Closure<dyn FnMut(js_sys::Array, MutationObserver)>>>,
    mutation_timer: Rc<RefCell<Option<Timeout>>>,
    change_hooks: RefCell<Vec<Rc<dyn Fn()>>>,
    initialized: Cell<bool>,
}

impl RichTextEditorManager {
    pub(crate) fn new(document: Document) -> Rc<Self> {
        Rc::new(Self {
            document,
            editors: RefCell::new(HashMap::new()),
            observer: RefCell::new(None),
            observer_hook: RefCell::new(None),
            mutation_timer: Rc::new(RefCell::new(None)),
            change_hooks: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    /// Runs after editor content changes (debounced per instance). Used to
    /// feed the content-keyword suggestions.
    pub(crate) fn add_change_hook(&self, hook: Rc<dyn Fn()>) {
        self.change_hooks.borrow_mut().push(hook);
    }

    pub(crate) fn install(self: &Rc<Self>) {
        if self.initialized.get() {
            return;
        }
        self.initialized.set(true);
        self.create_all();
        self.observe_insertions();
    }

    /// Serialized content of every live instance; the body half of the
    /// content-keyword payload.
    pub(crate) fn combined_data(&self) -> String {
        let editors = self.editors.borrow();
        let mut parts: Vec<String> = editors.values().map(EditorHandle::data).collect();
        parts.sort();
        parts.join("\n\n")
    }

    pub(crate) fn teardown(&self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        self.observer_hook.borrow_mut().take();
        self.mutation_timer.borrow_mut().take();
        for (_, handle) in self.editors.borrow_mut().drain() {
            handle.destroy();
        }
    }

    fn create_all(self: &Rc<Self>) {
        let Ok(placeholders) = self.document.query_selector_all(PLACEHOLDER_SELECTOR) else {
            return;
        };
        for index in 0..placeholders.length() {
            let Some(element) = placeholders
                .item(index)
                .and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            self.create_for(&element);
        }
    }

    fn create_for(self: &Rc<Self>, element: &Element) {
        let id = element.id();
        if id.is_empty()
            || id.contains(TEMPLATE_MARKER)
            || element.get_attribute(PROCESSED_ATTR).as_deref() == Some("1")
        {
            return;
        }
        // Marked before the await so a mutation rescan cannot double-create.
        let _ = element.set_attribute(PROCESSED_ATTR, "1");

        let script_id = format!("{id}_script");
        let config = match build_config(&self.document, &script_id) {
            Ok(config) => config,
            Err(why) => {
                warn!(format!("editor {id} skipped: {why}"));
                return;
            }
        };
        let promise = match ClassicEditor::create(element, &config) {
            Ok(promise) => promise,
            Err(error) => {
                warn!(format!(
                    "editor {id} create threw: {}",
                    crate::dom::js_err(error)
                ));
                return;
            }
        };

        let manager = Rc::clone(self);
        wasm_bindgen_futures::spawn_local(async move {
            match wasm_bindgen_futures::JsFuture::from(promise).await {
                Ok(raw) => manager.adopt(raw, id),
                Err(error) => {
                    warn!(format!("editor {id} failed: {}", crate::dom::js_err(error)));
                }
            }
        });
    }

    fn adopt(self: &Rc<Self>, raw: JsValue, id: String) {
        let source = self
            .document
            .get_element_by_id(&id)
            .and_then(|element| element.dyn_into::<HtmlTextAreaElement>().ok());

        let manager = Rc::clone(self);
        let mirror_timer: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));
        let hook = wire_change_hook(&raw, {
            let mirror_timer = Rc::clone(&mirror_timer);
            let raw = raw.clone();
            move || {
                let manager = Rc::clone(&manager);
                let raw = raw.clone();
                let source = source.clone();
                let timer = Timeout::new(MIRROR_DEBOUNCE_MS, move || {
                    let data = call_method(&raw, "getData")
                        .and_then(|value| value.as_string())
                        .unwrap_or_default();
                    if let Some(source) = source.as_ref() {
                        source.set_value(&data);
                    }
                    for hook in manager.change_hooks.borrow().iter() {
                        hook();
                    }
                });
                *mirror_timer.borrow_mut() = Some(timer);
            }
        });

        self.editors.borrow_mut().insert(
            id,
            EditorHandle {
                raw,
                _change_hook: hook,
            },
        );
    }

    fn observe_insertions(self: &Rc<Self>) {
        let Some(body) = self.document.body() else {
            return;
        };
        let manager = Rc::clone(self);
        let timer_slot = Rc::clone(&self.mutation_timer);
        let hook = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                // Throttled full rescan; the processed marker keeps it
                // idempotent across bursts.
                let manager = Rc::clone(&manager);
                let timer = Timeout::new(MUTATION_THROTTLE_MS, move || {
                    manager.create_all();
                });
                *timer_slot.borrow_mut() = Some(timer);
            },
        );
        let Ok(observer) = MutationObserver::new(hook.as_ref().unchecked_ref()) else {
            return;
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if observer.observe_with_options(&body, &init).is_ok() {
            *self.observer.borrow_mut() = Some(observer);
            *self.observer_hook.borrow_mut() = Some(hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augment_merges_upload_sections() {
        let merged = augment_options(
            r#"{"toolbar":["bold","italic"]}"#,
            "/upload/",
            Some("tok123"),
            &["image/png".to_string()],
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["toolbar"][0], "bold");
        assert_eq!(value["simpleUpload"]["uploadUrl"], "/upload/");
        assert_eq!(value["simpleUpload"]["headers"]["X-CSRFToken"], "tok123");
        assert_eq!(value["fileUploader"]["fileTypes"][0], "image/png");
        assert_eq!(value["licenseKey"], "GPL");
    }

    #[test]
    fn augment_without_token_sends_no_header() {
        let merged = augment_options("{}", "/upload/", None, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert!(value["simpleUpload"]["headers"]
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn augment_rejects_non_object_options() {
        assert!(augment_options("[1,2]", "/upload/", None, &[]).is_err());
        assert!(augment_options("not json", "/upload/", None, &[]).is_err());
    }
}
