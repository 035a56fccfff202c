//! Page script context backed by Boa.
//!
//! Every loaded page gets its own `ScriptContext`: a Boa `Context` with the
//! page harness (`window`, `document`, `console`, `location`) installed.
//! Values crossing the boundary are converted into the tagged `ScriptValue`
//! so callers have to handle each type explicitly.

use crate::dom::{Document, ElementSnapshot};
use crate::{EngineConfig, Error, Result, Viewport};
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;

/// Host function reachable from page script.
///
/// Plain function pointers keep the Boa closure `Copy`, which is what
/// `NativeFunction::from_copy_closure` requires.
pub type NativeCallback = fn(&[ScriptValue]) -> ScriptValue;

/// Type tag of a `ScriptValue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Object,
    Null,
    Undefined,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
            ValueKind::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

/// Object payload of a `ScriptValue`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// Whether the object is a function
    pub callable: bool,
    /// JSON form of the object when it has one (not for functions, symbols or cycles)
    pub json: Option<serde_json::Value>,
}

/// Result of a script evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Object(ObjectValue),
    Null,
    Undefined,
}

impl ScriptValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ScriptValue::String(_) => ValueKind::String,
            ScriptValue::Number(_) => ValueKind::Number,
            ScriptValue::Boolean(_) => ValueKind::Boolean,
            ScriptValue::Object(_) => ValueKind::Object,
            ScriptValue::Null => ValueKind::Null,
            ScriptValue::Undefined => ValueKind::Undefined,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    // BigInts fold into `Number`; symbols into an opaque `Object`.
    fn from_js(value: &JsValue, ctx: &mut Context) -> Self {
        if value.is_undefined() {
            return ScriptValue::Undefined;
        }
        if value.is_null() {
            return ScriptValue::Null;
        }
        if let Some(b) = value.as_boolean() {
            return ScriptValue::Boolean(b);
        }
        if let Some(s) = value.as_string() {
            return ScriptValue::String(s.to_std_string_escaped());
        }
        if let Some(n) = value.as_number() {
            return ScriptValue::Number(n);
        }
        if let Some(b) = value.as_bigint() {
            return ScriptValue::Number(b.to_f64());
        }
        if let Some(obj) = value.as_object() {
            let callable = obj.is_callable();
            let json = if callable { None } else { value.to_json(ctx).ok() };
            return ScriptValue::Object(ObjectValue { callable, json });
        }
        ScriptValue::Object(ObjectValue {
            callable: false,
            json: None,
        })
    }

    fn to_js(&self, ctx: &mut Context) -> Result<JsValue> {
        Ok(match self {
            ScriptValue::String(s) => JsValue::from(JsString::from(s.as_str())),
            ScriptValue::Number(n) => JsValue::from(*n),
            ScriptValue::Boolean(b) => JsValue::from(*b),
            ScriptValue::Null => JsValue::null(),
            ScriptValue::Undefined => JsValue::undefined(),
            ScriptValue::Object(ObjectValue { json: Some(json), .. }) => JsValue::from_json(json, ctx)?,
            ScriptValue::Object(_) => {
                return Err(Error::ScriptError(
                    "object without a JSON form cannot be passed into a page".into(),
                ))
            }
        })
    }
}

#[derive(Serialize)]
struct PageData<'a> {
    elements: &'a [ElementSnapshot],
    title: &'a str,
    url: &'a str,
    viewport: Viewport,
}

/// Script environment of one page
pub struct ScriptContext {
    ctx: Context,
}

impl ScriptContext {
    /// Bare context: runtime limits and `console` only.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut ctx = Context::default();
        if config.script_loop_iteration_limit > 0 {
            ctx.runtime_limits_mut()
                .set_loop_iteration_limit(config.script_loop_iteration_limit);
        }
        if config.script_recursion_limit < usize::MAX {
            ctx.runtime_limits_mut()
                .set_recursion_limit(config.script_recursion_limit);
        }

        let console = NativeFunction::from_copy_closure(|_this, args, ctx| {
            let level = arg_string(args.first(), ctx)?;
            let text = arg_string(args.get(1), ctx)?;
            match level.as_str() {
                "error" => error!("[page] {}", text),
                "warn" => warn!("[page] {}", text),
                "debug" => debug!("[page] {}", text),
                _ => info!("[page] {}", text),
            }
            Ok(JsValue::undefined())
        });
        let console = console.to_js_function(ctx.realm());
        ctx.register_global_property(js_string!("__rf_console"), console, Attribute::all())?;

        Ok(Self { ctx })
    }

    /// Context with the page harness installed for `document`.
    pub fn for_document(document: &Document, viewport: Viewport, config: &EngineConfig) -> Result<Self> {
        let mut script = Self::new(config)?;

        // Page data is passed as a value, never spliced into script source.
        let page = serde_json::to_value(PageData {
            elements: &document.elements,
            title: &document.title,
            url: &document.url,
            viewport,
        })
        .map_err(|e| Error::ScriptError(format!("Failed to serialize DOM: {}", e)))?;
        let page = JsValue::from_json(&page, &mut script.ctx)
            .map_err(|e| Error::ScriptError(format!("Failed to convert DOM: {}", e)))?;
        script
            .ctx
            .register_global_property(js_string!("__rf_page"), page, Attribute::all())?;

        let harness = include_str!("page_harness.js");
        script
            .ctx
            .eval(Source::from_bytes(harness.as_bytes()))
            .map_err(|e| Error::ScriptError(format!("Failed to install page harness: {}", e)))?;
        Ok(script)
    }

    /// Evaluate `source` in the page's global scope.
    pub fn evaluate(&mut self, source: &str) -> Result<ScriptValue> {
        let value = self.ctx.eval(Source::from_bytes(source.as_bytes()))?;
        let _ = self.ctx.run_jobs();
        Ok(ScriptValue::from_js(&value, &mut self.ctx))
    }

    /// Bind a host function as a property of the global object.
    pub fn register_function(&mut self, name: &str, callback: NativeCallback) -> Result<()> {
        let native = NativeFunction::from_copy_closure(move |_this, args, ctx| {
            let converted: Vec<ScriptValue> = args.iter().map(|a| ScriptValue::from_js(a, ctx)).collect();
            callback(&converted)
                .to_js(ctx)
                .map_err(|e| JsNativeError::typ().with_message(e.to_string()).into())
        });
        let function = native.to_js_function(self.ctx.realm());
        let global = self.ctx.global_object();
        global.set(JsString::from(name), function, true, &mut self.ctx)?;
        debug!("registered native function {}", name);
        Ok(())
    }

    /// Assign a property on the global object.
    pub fn set_global(&mut self, name: &str, value: &ScriptValue) -> Result<()> {
        let js = value.to_js(&mut self.ctx)?;
        let global = self.ctx.global_object();
        global.set(JsString::from(name), js, true, &mut self.ctx)?;
        Ok(())
    }

    pub fn get_global(&mut self, name: &str) -> Result<ScriptValue> {
        let global = self.ctx.global_object();
        let value = global.get(JsString::from(name), &mut self.ctx)?;
        Ok(ScriptValue::from_js(&value, &mut self.ctx))
    }

    pub fn has_global(&mut self, name: &str) -> Result<bool> {
        let global = self.ctx.global_object();
        Ok(global.has_property(JsString::from(name), &mut self.ctx)?)
    }
}

fn arg_string(arg: Option<&JsValue>, ctx: &mut Context) -> JsResult<String> {
    Ok(arg
        .map(|v| v.to_string(ctx))
        .transpose()?
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> ScriptContext {
        let doc = Document::parse("http://local/", html);
        ScriptContext::for_document(&doc, Viewport::default(), &EngineConfig::default()).expect("context")
    }

    fn answer(_args: &[ScriptValue]) -> ScriptValue {
        ScriptValue::Number(42.0)
    }

    fn echo_len(args: &[ScriptValue]) -> ScriptValue {
        ScriptValue::Number(args.len() as f64)
    }

    #[test]
    fn evaluate_returns_tagged_values() {
        let mut ctx = page("<html><body></body></html>");
        assert_eq!(ctx.evaluate("'a' + 'b'").unwrap(), ScriptValue::String("ab".into()));
        assert_eq!(ctx.evaluate("2 + 2").unwrap(), ScriptValue::Number(4.0));
        assert_eq!(ctx.evaluate("1 < 2").unwrap(), ScriptValue::Boolean(true));
        assert_eq!(ctx.evaluate("null").unwrap(), ScriptValue::Null);
        assert_eq!(ctx.evaluate("undefined").unwrap(), ScriptValue::Undefined);
        assert_eq!(ctx.evaluate("10n").unwrap().kind(), ValueKind::Number);

        match ctx.evaluate("({a: 1})").unwrap() {
            ScriptValue::Object(o) => {
                assert!(!o.callable);
                assert_eq!(o.json, Some(serde_json::json!({"a": 1})));
            }
            other => panic!("unexpected {:?}", other),
        }
        match ctx.evaluate("(function(){})").unwrap() {
            ScriptValue::Object(o) => assert!(o.callable && o.json.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn thrown_errors_surface_as_script_errors() {
        let mut ctx = page("<html><body></body></html>");
        let err = ctx.evaluate("throw new Error('boom')").unwrap_err();
        match err {
            Error::ScriptError(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn harness_exposes_document() {
        let mut ctx = page("<html><head><title>T</title></head><body><div id=\"x\" class=\"a b\">Hi <i>there</i></div></body></html>");
        assert_eq!(ctx.evaluate("document.title").unwrap().as_str(), Some("T"));
        let body = ctx.evaluate("document.body.innerHTML").unwrap();
        let body = body.as_str().expect("string");
        assert!(body.starts_with("<div") && body.contains("Hi <i>there</i></div>"));
        assert_eq!(ctx.evaluate("document.querySelector('div.b').id").unwrap().as_str(), Some("x"));
        assert_eq!(ctx.evaluate("document.getElementById('x').children.length").unwrap().as_number(), Some(1.0));
        assert_eq!(ctx.evaluate("document.querySelector('#nope')").unwrap(), ScriptValue::Null);
        assert_eq!(ctx.evaluate("window === globalThis").unwrap(), ScriptValue::Boolean(true));
        assert_eq!(ctx.evaluate("innerWidth").unwrap().as_number(), Some(1280.0));
        assert_eq!(ctx.evaluate("location.href").unwrap().as_str(), Some("http://local/"));
        assert_eq!(ctx.evaluate("console.log('from page'); 1").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn page_text_that_looks_like_harness_markers_stays_text() {
        let mut ctx = page("<html><head><title>__RF_TITLE__</title></head><body><p>see __RF_URL__ here</p><p>\"); alert(1); //</p></body></html>");
        assert_eq!(ctx.evaluate("document.title").unwrap().as_str(), Some("__RF_TITLE__"));
        assert_eq!(
            ctx.evaluate("document.querySelector('p').textContent").unwrap().as_str(),
            Some("see __RF_URL__ here")
        );
        assert_eq!(ctx.evaluate("location.href").unwrap().as_str(), Some("http://local/"));
        assert_eq!(ctx.evaluate("typeof __rf_page").unwrap().as_str(), Some("undefined"));
    }

    #[test]
    fn text_and_markup_are_built_from_children() {
        let mut ctx = page("<html><body><div id=\"d\" title=\"a&quot;b\">1 &lt; 2<br><b>bold</b> tail</div></body></html>");
        assert_eq!(
            ctx.evaluate("document.getElementById('d').textContent").unwrap().as_str(),
            Some("1 < 2bold tail")
        );
        assert_eq!(
            ctx.evaluate("document.getElementById('d').innerHTML").unwrap().as_str(),
            Some("1 &lt; 2<br><b>bold</b> tail")
        );
        let outer = ctx.evaluate("document.getElementById('d').outerHTML").unwrap();
        assert!(outer.as_str().unwrap_or_default().starts_with("<div id=\"d\" title=\"a&quot;b\">1"));
    }

    #[test]
    fn native_functions_are_callable_from_script() {
        let mut ctx = page("<html><body></body></html>");
        assert!(!ctx.has_global("answer").unwrap());
        ctx.register_function("answer", answer).unwrap();
        assert!(ctx.has_global("answer").unwrap());
        assert_eq!(ctx.evaluate("answer('ignored', 2)").unwrap().as_number(), Some(42.0));

        ctx.register_function("argc", echo_len).unwrap();
        assert_eq!(ctx.evaluate("argc(1, 2, 3)").unwrap().as_number(), Some(3.0));
    }

    #[test]
    fn globals_round_trip() {
        let mut ctx = ScriptContext::new(&EngineConfig::default()).unwrap();
        ctx.set_global("greeting", &ScriptValue::String("hi".into())).unwrap();
        assert_eq!(ctx.get_global("greeting").unwrap().as_str(), Some("hi"));
        assert_eq!(ctx.evaluate("greeting.length").unwrap().as_number(), Some(2.0));

        let obj = ScriptValue::Object(ObjectValue {
            callable: false,
            json: Some(serde_json::json!({"n": [1, 2]})),
        });
        ctx.set_global("cfg", &obj).unwrap();
        assert_eq!(ctx.evaluate("cfg.n[1]").unwrap().as_number(), Some(2.0));

        let opaque = ScriptValue::Object(ObjectValue { callable: true, json: None });
        assert!(ctx.set_global("f", &opaque).is_err());
    }

    #[test]
    fn loop_limit_stops_runaway_scripts() {
        let cfg = EngineConfig {
            script_loop_iteration_limit: 100,
            ..Default::default()
        };
        let mut ctx = ScriptContext::new(&cfg).unwrap();
        assert!(ctx.evaluate("while (true) {}").is_err());
    }
}
