//! Idle and frame hosts backed by `window`.

use ant_dom::{Clock, DomError, DomResult, FrameCallback, FrameHost};
use ant_scheduler::{IdleCallback, IdleDeadline, IdleHost};
use js_sys::Reflect;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

fn window() -> DomResult<Window> {
    web_sys::window().ok_or_else(|| DomError::host("no window"))
}

/// Millisecond clock over `performance.now()`
pub fn performance_clock() -> Option<Clock> {
    let performance = web_sys::window()?.performance()?;
    Some(Rc::new(move || performance.now()))
}

struct NativeDeadline(web_sys::IdleDeadline);

impl IdleDeadline for NativeDeadline {
    fn time_remaining(&self) -> Duration {
        Duration::from_secs_f64(self.0.time_remaining().max(0.0) / 1000.0)
    }

    fn did_timeout(&self) -> bool {
        self.0.did_timeout()
    }
}

/// Fixed-length slice for browsers without `requestIdleCallback`
struct ClockDeadline {
    clock: Clock,
    end_ms: f64,
}

impl IdleDeadline for ClockDeadline {
    fn time_remaining(&self) -> Duration {
        let left = self.end_ms - (self.clock)();
        Duration::from_secs_f64(left.max(0.0) / 1000.0)
    }
}

/// Grants idle slices through `requestIdleCallback`, or a zero-delay
/// `setTimeout` with a fixed budget where it is missing
pub struct BrowserIdleHost {
    window: Window,
    clock: Clock,
    budget_ms: f64,
    native: bool,
}

impl BrowserIdleHost {
    pub fn new(budget_ms: u64) -> DomResult<Self> {
        let window = window()?;
        let native = Reflect::has(&window, &JsValue::from_str("requestIdleCallback")).unwrap_or(false);
        let clock = performance_clock().ok_or_else(|| DomError::host("performance is unavailable"))?;
        debug!(native, budget_ms, "Created idle host");
        Ok(Self {
            window,
            clock,
            budget_ms: budget_ms as f64,
            native,
        })
    }

    pub fn is_native(&self) -> bool {
        self.native
    }
}

impl IdleHost for BrowserIdleHost {
    fn request_idle(&self, callback: IdleCallback) {
        let result = if self.native {
            let js = Closure::once_into_js(move |deadline: web_sys::IdleDeadline| {
                callback(&NativeDeadline(deadline));
            });
            self.window.request_idle_callback(js.unchecked_ref()).map(|_| ())
        } else {
            let clock = self.clock.clone();
            let budget_ms = self.budget_ms;
            let js = Closure::once_into_js(move || {
                let end_ms = clock() + budget_ms;
                callback(&ClockDeadline { clock, end_ms });
            });
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(js.unchecked_ref(), 0)
                .map(|_| ())
        };
        if let Err(err) = result {
            error!(error = ?err, "Failed to request an idle slice");
        }
    }
}

pub struct BrowserFrameHost {
    window: Window,
}

impl BrowserFrameHost {
    pub fn new() -> DomResult<Self> {
        Ok(Self { window: window()? })
    }
}

impl FrameHost for BrowserFrameHost {
    fn request_frame(&self, callback: FrameCallback) {
        let js = Closure::once_into_js(move |_timestamp: f64| callback());
        if let Err(err) = self.window.request_animation_frame(js.unchecked_ref()) {
            error!(error = ?err, "Failed to request an animation frame");
        }
    }
}
