//! Maps a caught engine exception onto the host's error taxonomy.

use rquickjs::{Coerced, Ctx, Object, Value};
use serde::Serialize;

use crate::sandbox::marshal::{lossy_text, script_text};

const SYNTAX_ERROR: &str = "SyntaxError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExceptionKind {
    /// The source text could not be parsed
    Syntax,
    /// Anything raised while the script was running
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptException {
    pub kind: ExceptionKind,
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptException {
    pub fn is_syntax(&self) -> bool {
        self.kind == ExceptionKind::Syntax
    }
}

/// Classify the value thrown out of an evaluation.
///
/// Never fails: if the exception itself cannot be stringified, a placeholder
/// message is used and the secondary exception is discarded.
pub fn classify<'js>(ctx: &Ctx<'js>, exception: Value<'js>) -> ScriptException {
    let object = exception.as_object().cloned();

    let message = match script_text(ctx, exception) {
        Ok(message) => message,
        Err(_) => {
            let _ = ctx.catch();
            "unprintable exception".to_string()
        }
    };

    let class_name = object.as_ref().and_then(|obj| string_property(ctx, obj, "name"));
    let is_syntax = match class_name.as_deref() {
        Some(name) => name == SYNTAX_ERROR,
        None => message.starts_with(SYNTAX_ERROR),
    };

    if is_syntax {
        return ScriptException {
            kind: ExceptionKind::Syntax,
            message,
            stack: None,
        };
    }

    let stack = object
        .as_ref()
        .and_then(|obj| string_property(ctx, obj, "stack"));

    ScriptException {
        kind: ExceptionKind::Script,
        message,
        stack,
    }
}

/// Read `obj[key]` as text; absent, null, or unreadable properties yield `None`.
fn string_property<'js>(ctx: &Ctx<'js>, obj: &Object<'js>, key: &str) -> Option<String> {
    match obj.get::<_, Option<Coerced<rquickjs::String>>>(key) {
        Ok(value) => value.and_then(|Coerced(s)| lossy_text(s).ok()),
        Err(_) => {
            let _ = ctx.catch();
            None
        }
    }
}
