//! Client-side behavior layer for DevBlog, a server-rendered blog. The
//! server owns markup and state; this module attaches the interactive
//! parts: like/favorite toggles, toasts, theming, menus, sharing, the tag
//! editor, rich-text lifecycle, and the live notification channel.

use wasm_bindgen::prelude::*;

mod bootstrap;
mod cookies;
mod dom;
mod editor;
mod effects;
mod http;
mod nav;
mod notifications;
mod notify;
mod prefs;
mod share;
mod tags;
mod theme;
mod toggle;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    bootstrap::start()
}
