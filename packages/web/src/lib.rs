//! # Ant Web
//!
//! Runs the Ant runtime against the browser: [`WebDocument`] implements the
//! host document over `web_sys`, while [`BrowserIdleHost`] and
//! [`BrowserFrameHost`] drive the scheduler and the patch queue from
//! `requestIdleCallback` and `requestAnimationFrame`.

pub mod document;
pub mod hosts;

pub use document::WebDocument;
pub use hosts::{performance_clock, BrowserFrameHost, BrowserIdleHost};

use ant_dom::DomResult;
use ant_runtime::{App, RuntimeConfig};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// App bound to the current window, with metrics timed by `performance.now()`
pub fn browser_app(config: RuntimeConfig) -> DomResult<App> {
    let document = Rc::new(WebDocument::new()?);
    let idle = Rc::new(BrowserIdleHost::new(config.idle_slice_budget_ms)?);
    let frames = Rc::new(BrowserFrameHost::new()?);
    Ok(App::with_options(document, idle, frames, config, performance_clock()))
}

/// Validate an `ant.config.json` document and return it with defaults filled in
#[wasm_bindgen(js_name = resolveConfig)]
pub fn resolve_config(json: &str) -> Result<String, JsValue> {
    let config = RuntimeConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&config).map_err(|e| JsValue::from_str(&format!("Serialize error: {}", e)))
}
