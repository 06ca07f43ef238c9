//! Host primitives injected into every session's global scope.
//!
//! Primitives reach the evaluation that invoked them through runtime userdata
//! ([`ActiveEval`]), which is present only while [`crate::Session::eval`] is
//! running. Each session owns its own runtime, so bindings never cross sessions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Instant;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, JsLifetime, Object, Value};
use tracing::{debug, warn};

use crate::sandbox::console::ConsoleBuffer;
use crate::sandbox::marshal::{coerced_text, script_bytes};
use crate::sandbox::traits::{HttpCallback, HttpRequest};

/// Global the native fetch is installed under before the prelude wraps it.
const NATIVE_FETCH: &str = "__sandbox_fetch";

/// Gives every response `text()` and `json()` over its plain `body`.
const FETCH_PRELUDE: &str = r#"
(() => {
    const nativeFetch = globalThis.__sandbox_fetch;
    delete globalThis.__sandbox_fetch;
    globalThis.fetch = function fetch(...args) {
        const response = nativeFetch(...args);
        response.text = function text() { return this.body; };
        response.json = function json() { return JSON.parse(this.body); };
        return response;
    };
})();
"#;

const DISABLED: [&str; 3] = ["load", "setTimeout", "clearTimeout"];

/// State primitives share with the owning session.
pub struct SessionState {
    pub console: RefCell<ConsoleBuffer>,
    pub http_callback: RefCell<Option<Rc<dyn HttpCallback>>>,
}

impl SessionState {
    pub fn new(console: ConsoleBuffer) -> Self {
        Self {
            console: RefCell::new(console),
            http_callback: RefCell::new(None),
        }
    }
}

/// Runtime userdata marking the evaluation currently in flight.
pub struct ActiveEval(Rc<SessionState>);

// SAFETY: `ActiveEval` holds no engine values, so it is valid for any `'js`.
unsafe impl<'js> JsLifetime<'js> for ActiveEval {
    type Changed<'to> = ActiveEval;
}

/// Binds a session to its runtime for the lifetime of the guard.
pub struct ActiveEvalGuard<'a, 'js> {
    ctx: &'a Ctx<'js>,
}

impl<'a, 'js> ActiveEvalGuard<'a, 'js> {
    pub fn bind(ctx: &'a Ctx<'js>, state: Rc<SessionState>) -> Self {
        if ctx.store_userdata(ActiveEval(state)).is_err() {
            warn!("Could not bind evaluation state; primitives will see no session");
        }
        Self { ctx }
    }
}

impl Drop for ActiveEvalGuard<'_, '_> {
    fn drop(&mut self) {
        let _ = self.ctx.remove_userdata::<ActiveEval>();
    }
}

fn active_session(ctx: &Ctx<'_>) -> Option<Rc<SessionState>> {
    ctx.userdata::<ActiveEval>().map(|active| active.0.clone())
}

/// Install every primitive into the context's global object.
pub fn install<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let print = Function::new(ctx.clone(), js_print)?.with_name("print")?;
    globals.set("print", print.clone())?;

    let console = match globals.get::<_, Option<Object>>("console")? {
        Some(console) => console,
        None => {
            let console = Object::new(ctx.clone())?;
            globals.set("console", console.clone())?;
            console
        }
    };
    console.set("log", print)?;

    globals.set("gc", Function::new(ctx.clone(), js_gc)?.with_name("gc")?)?;

    for name in DISABLED {
        let message = format!("{}() is disabled in sandbox mode", name);
        let stub = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                Err(Exception::throw_message(&ctx, &message))
            },
        )?
        .with_name(name)?;
        globals.set(name, stub)?;
    }

    install_clocks(ctx, &globals)?;

    globals.set(NATIVE_FETCH, Function::new(ctx.clone(), js_fetch)?)?;
    ctx.eval::<(), _>(FETCH_PRELUDE)?;

    Ok(())
}

fn install_clocks<'js>(ctx: &Ctx<'js>, globals: &Object<'js>) -> rquickjs::Result<()> {
    let date: Object = globals.get("Date")?;
    date.set(
        "now",
        Function::new(ctx.clone(), js_date_now)?.with_name("now")?,
    )?;

    // The engine's own `performance.now` is read-only, so the object is replaced.
    let performance = Object::new(ctx.clone())?;
    performance.set(
        "now",
        Function::new(ctx.clone(), js_performance_now)?.with_name("now")?,
    )?;
    globals.set("performance", performance)?;
    Ok(())
}

/// `print(...values)`: space separated, newline terminated, into the console buffer.
fn js_print<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) -> rquickjs::Result<()> {
    let Some(state) = active_session(&ctx) else {
        return Ok(());
    };

    for (idx, arg) in args.0.into_iter().enumerate() {
        if idx > 0 {
            state.console.borrow_mut().append(b" ");
        }
        // A value whose coercion throws is skipped.
        match script_bytes(&ctx, arg) {
            Ok(bytes) => state.console.borrow_mut().append(&bytes),
            Err(err) if err.is_exception() => {
                let _ = ctx.catch();
            }
            Err(err) => return Err(err),
        }
    }
    state.console.borrow_mut().append(b"\n");
    Ok(())
}

fn js_gc(ctx: Ctx<'_>) {
    ctx.run_gc();
}

fn js_date_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn js_performance_now() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Native half of `fetch(url, options?)`.
fn js_fetch<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) -> rquickjs::Result<Object<'js>> {
    let Some(state) = active_session(&ctx) else {
        return Err(Exception::throw_message(
            &ctx,
            "fetch() called outside sandbox context",
        ));
    };

    let callback = state.http_callback.borrow().clone();
    let Some(callback) = callback else {
        return Err(Exception::throw_message(
            &ctx,
            "fetch() is not enabled - HTTP callback not configured",
        ));
    };

    let mut args = args.0.into_iter();
    let Some(url) = args.next() else {
        return Err(Exception::throw_type(
            &ctx,
            "fetch() requires at least 1 argument (url)",
        ));
    };

    let url = match coerced_text(&ctx, url) {
        Ok(url) => url,
        Err(err) if err.is_exception() => {
            let _ = ctx.catch();
            return Err(Exception::throw_type(&ctx, "fetch() url must be a string"));
        }
        Err(err) => return Err(err),
    };

    let mut method = "GET".to_string();
    let mut body = None;
    if let Some(options) = args.next().and_then(|options| options.into_object()) {
        if let Some(value) = present(options.get("method")?) {
            method = coerced_text(&ctx, value)?;
        }
        if let Some(value) = present(options.get("body")?) {
            body = Some(coerced_text(&ctx, value)?);
        }
    }

    let request = HttpRequest {
        method,
        url,
        body,
        headers: BTreeMap::new(),
    };
    debug!(
        callback = callback.name(),
        method = %request.method,
        url = %request.url,
        "Script fetch"
    );

    let response = match callback.call(&request) {
        Ok(response) => response,
        Err(err) => {
            warn!(url = %request.url, error = %err, "Fetch callback failed");
            return Err(Exception::throw_message(
                &ctx,
                &format!("fetch() failed: {:#}", err),
            ));
        }
    };

    let status = response.status.unwrap_or(200);
    let result = Object::new(ctx.clone())?;
    result.set("status", status)?;
    result.set(
        "statusText",
        response.status_text.as_deref().unwrap_or("OK"),
    )?;
    result.set("ok", (200..300).contains(&status))?;
    result.set("body", response.body.as_deref().unwrap_or(""))?;
    // Response headers are not passed through.
    result.set("headers", Object::new(ctx.clone())?)?;
    Ok(result)
}

fn present(value: Value<'_>) -> Option<Value<'_>> {
    if value.is_null() || value.is_undefined() {
        None
    } else {
        Some(value)
    }
}
