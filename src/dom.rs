use wasm_bindgen::JsValue;
use web_sys::{Document, Element, HtmlElement, Window};

pub(crate) fn window() -> Option<Window> {
    web_sys::window()
}

pub(crate) fn document() -> Option<Document> {
    web_sys::window().and_then(|window| window.document())
}

pub(crate) fn add_class(element: &Element, class: &str) {
    let _ = element.class_list().add_1(class);
}

pub(crate) fn remove_class(element: &Element, class: &str) {
    let _ = element.class_list().remove_1(class);
}

pub(crate) fn set_class(element: &Element, class: &str, on: bool) {
    if on {
        add_class(element, class);
    } else {
        remove_class(element, class);
    }
}

pub(crate) fn has_class(element: &Element, class: &str) -> bool {
    element.class_list().contains(class)
}

pub(crate) fn set_style(element: &Element, property: &str, value: &str) {
    use wasm_bindgen::JsCast;
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        let _ = html.style().set_property(property, value);
    }
}

pub(crate) fn clear_style(element: &Element, property: &str) {
    use wasm_bindgen::JsCast;
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        let _ = html.style().remove_property(property);
    }
}

/// Walks from an event target up to the nearest ancestor matching `selector`.
pub(crate) fn closest_from_target(event: &web_sys::Event, selector: &str) -> Option<Element> {
    use wasm_bindgen::JsCast;
    let target = event.target()?;
    let element = target.dyn_ref::<Element>()?;
    element.closest(selector).ok().flatten()
}

pub(crate) fn contains_target(container: &Element, event: &web_sys::Event) -> bool {
    use wasm_bindgen::JsCast;
    let Some(target) = event.target() else {
        return false;
    };
    let Some(node) = target.dyn_ref::<web_sys::Node>() else {
        return false;
    };
    container.contains(Some(node))
}

pub(crate) fn js_err(error: JsValue) -> String {
    if let Some(value) = error.as_string() {
        return value;
    }
    if let Ok(json) = js_sys::JSON::stringify(&error) {
        if let Some(value) = json.as_string() {
            return value;
        }
    }
    "js error".to_string()
}
