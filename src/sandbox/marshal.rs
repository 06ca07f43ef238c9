//! Conversion between [`HostValue`] and engine values.
//!
//! The two directions are intentionally asymmetric. Host maps and lists become
//! real objects and arrays inside the engine, but on the way back only arrays
//! are walked; any other object comes back as the engine's own string form.

use rquickjs::convert::Coerced;
use rquickjs::{Array, Ctx, FromJs, Object, Value};

use crate::sandbox::value::HostValue;

/// Convert a host value into an engine value.
///
/// The first failing nested conversion aborts the whole conversion.
pub fn to_script<'js>(ctx: &Ctx<'js>, value: &HostValue) -> rquickjs::Result<Value<'js>> {
    let converted = match value {
        HostValue::Null => Value::new_null(ctx.clone()),
        HostValue::Bool(b) => Value::new_bool(ctx.clone(), *b),
        HostValue::Int(i) => match i32::try_from(*i) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *i as f64),
        },
        HostValue::Float(x) => Value::new_float(ctx.clone(), *x),
        HostValue::Text(s) | HostValue::Symbol(s) | HostValue::Opaque(s) => {
            rquickjs::String::from_str(ctx.clone(), s)?.into_value()
        }
        HostValue::List(items) => {
            let array = Array::new(ctx.clone())?;
            for (idx, item) in items.iter().enumerate() {
                array.set(idx, to_script(ctx, item)?)?;
            }
            array.into_value()
        }
        HostValue::Map(entries) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in entries {
                object.set(key.key_string(), to_script(ctx, item)?)?;
            }
            object.into_value()
        }
    };
    Ok(converted)
}

/// Arrays nested deeper than this are not walked.
const MAX_ARRAY_DEPTH: usize = 128;

/// Text standing in for an array that contains itself.
pub const CIRCULAR: &str = "[Circular]";

/// Convert an engine value back into a host value.
///
/// An array that is its own ancestor becomes [`CIRCULAR`]; arrays below
/// [`MAX_ARRAY_DEPTH`] take the string fallback.
pub fn from_script<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<HostValue> {
    from_script_within(ctx, value, &mut Vec::new())
}

fn from_script_within<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
    ancestors: &mut Vec<Value<'js>>,
) -> rquickjs::Result<HostValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(HostValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(HostValue::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(HostValue::Int(i64::from(i)));
    }
    if let Some(x) = value.as_number() {
        return Ok(HostValue::Float(x));
    }
    if let Some(s) = value.as_string() {
        return lossy_text(s.clone()).map(HostValue::Text);
    }
    if value.is_array() {
        // Value equality is identity for objects.
        if ancestors.contains(&value) {
            return Ok(HostValue::from(CIRCULAR));
        }
        if ancestors.len() < MAX_ARRAY_DEPTH {
            if let Some(array) = value.as_array() {
                let array = array.clone();
                ancestors.push(value);
                let items = collect_items(ctx, &array, ancestors);
                ancestors.pop();
                return items.map(HostValue::List);
            }
        }
    }

    script_text(ctx, value).map(HostValue::Text)
}

fn collect_items<'js>(
    ctx: &Ctx<'js>,
    array: &Array<'js>,
    ancestors: &mut Vec<Value<'js>>,
) -> rquickjs::Result<Vec<HostValue>> {
    let mut items = Vec::with_capacity(array.len());
    for idx in 0..array.len() {
        let item: Value = array.get(idx)?;
        items.push(from_script_within(ctx, item, ancestors)?);
    }
    Ok(items)
}

/// The engine's own string coercion of `value`, decoded lossily.
///
/// Symbols, which refuse implicit coercion, are rendered as `Symbol(description)`.
pub fn script_text<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    if let Some(symbol) = value.as_symbol() {
        let description = symbol.description()?;
        let description = if description.is_undefined() {
            String::new()
        } else {
            script_text(ctx, description)?
        };
        return Ok(format!("Symbol({})", description));
    }

    coerced_text(ctx, value)
}

/// The engine's own string coercion of `value`, which throws for symbols.
pub fn coerced_text<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    let Coerced(string) = <Coerced<rquickjs::String>>::from_js(ctx, value)?;
    lossy_text(string)
}

/// Decode an engine string, replacing sequences that are not valid UTF-8.
pub fn lossy_text(string: rquickjs::String<'_>) -> rquickjs::Result<String> {
    let bytes = string.to_cstring()?;
    Ok(String::from_utf8_lossy(bytes.as_str().as_bytes()).into_owned())
}

/// Exact engine bytes of `value` after string coercion.
pub fn script_bytes<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Vec<u8>> {
    let string = match value.as_string() {
        Some(string) => string.clone(),
        None => <Coerced<rquickjs::String>>::from_js(ctx, value)?.0,
    };
    let cstring = string.to_cstring()?;
    Ok(cstring.as_str().as_bytes().to_vec())
}
