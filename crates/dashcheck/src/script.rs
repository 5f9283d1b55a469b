//! Typed in-page scripts.
//!
//! Every inspection the probe performs is one of these variants. The CDP
//! driver renders them to JavaScript with [`PageScript::to_js`]; the mock
//! driver interprets them directly against its in-memory page model.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// A script evaluated inside the page's own execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageScript {
    /// Existence and rendered content of `#id`
    ElementState {
        /// Element identifier
        id: String,
    },
    /// `typeof name === 'function'` on the page's global scope
    IsCallable {
        /// Global name
        name: String,
    },
    /// Call a page function inside `try/catch`
    Invoke {
        /// Global function name
        function: String,
        /// JSON arguments, spread into the call
        args: Vec<Value>,
    },
    /// Length of a page-global array (`null` when absent)
    ArrayLength {
        /// Global name
        global: String,
    },
    /// State of the live-update channel object
    ChannelState {
        /// Global name
        global: String,
    },
    /// Rendered text of `document.body`
    BodyText,
    /// `fetch()` from the page so cookies and auth are honored
    Fetch {
        /// Absolute or origin-relative URL
        url: String,
    },
}

/// Result of [`PageScript::ElementState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Element exists
    pub exists: bool,
    /// Length of `innerHTML`
    #[serde(default)]
    pub html_len: usize,
    /// Trimmed `textContent`
    #[serde(default)]
    pub text: String,
}

impl ElementState {
    /// An element that is present with the given markup and text
    #[must_use]
    pub fn rendered(html_len: usize, text: impl Into<String>) -> Self {
        Self {
            exists: true,
            html_len,
            text: text.into(),
        }
    }

    /// Present with non-empty rendered content
    #[must_use]
    pub const fn has_content(&self) -> bool {
        self.exists && self.html_len > 0
    }
}

/// Result of [`PageScript::Invoke`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResult {
    /// Call completed without throwing
    pub ok: bool,
    /// Function was not callable
    #[serde(default)]
    pub missing: bool,
    /// Returned value (JSON-coerced)
    #[serde(default)]
    pub value: Value,
    /// Thrown error message
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of [`PageScript::ChannelState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Channel object exists
    pub exists: bool,
    /// `connected` property, when the object exposes one
    #[serde(default)]
    pub connected: Option<bool>,
    /// Channel identifier, when exposed
    #[serde(default)]
    pub id: Option<String>,
}

/// Result of [`PageScript::Fetch`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// HTTP status, 0 if the request failed at transport level
    pub status: u16,
    /// Response body text
    #[serde(default)]
    pub body: String,
    /// Transport error
    #[serde(default)]
    pub error: Option<String>,
}

#[allow(clippy::expect_used)]
fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("static regex"))
}

/// JSON string literal, safe to splice into JavaScript
fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Reference to a page global that also resolves `let`/`const` bindings
fn global_ref(name: &str) -> String {
    if identifier_re().is_match(name) {
        format!("(typeof {name} !== 'undefined' ? {name} : undefined)")
    } else {
        format!("window[{}]", quote(name))
    }
}

impl PageScript {
    /// Element state script
    #[must_use]
    pub fn element(id: impl Into<String>) -> Self {
        Self::ElementState { id: id.into() }
    }

    /// Callable check script
    #[must_use]
    pub fn callable(name: impl Into<String>) -> Self {
        Self::IsCallable { name: name.into() }
    }

    /// Invocation script
    #[must_use]
    pub fn invoke(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Invoke {
            function: function.into(),
            args,
        }
    }

    /// Short label for logs and timeout messages
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::ElementState { id } => format!("element #{id}"),
            Self::IsCallable { name } => format!("typeof {name}"),
            Self::Invoke { function, .. } => format!("{function}()"),
            Self::ArrayLength { global } => format!("{global}.length"),
            Self::ChannelState { global } => format!("channel {global}"),
            Self::BodyText => "body text".to_string(),
            Self::Fetch { url } => format!("fetch {url}"),
        }
    }

    /// Render to a JavaScript expression producing a JSON-serializable value
    #[must_use]
    pub fn to_js(&self) -> String {
        match self {
            Self::ElementState { id } => format!(
                "(() => {{ const el = document.getElementById({id}); \
                 if (!el) return {{ exists: false, html_len: 0, text: '' }}; \
                 return {{ exists: true, html_len: el.innerHTML.trim().length, \
                 text: (el.textContent || '').trim() }}; }})()",
                id = quote(id)
            ),
            Self::IsCallable { name } => {
                format!("(typeof {} === 'function')", global_ref(name))
            }
            Self::Invoke { function, args } => {
                let args = serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string());
                format!(
                    "(async () => {{ const fn = {target}; \
                     if (typeof fn !== 'function') return {{ ok: false, missing: true, value: null, error: null }}; \
                     try {{ const r = await fn(...{args}); let value = null; \
                     try {{ value = r === undefined ? null : JSON.parse(JSON.stringify(r)); }} \
                     catch (_) {{ value = String(r); }} \
                     return {{ ok: true, missing: false, value, error: null }}; }} \
                     catch (e) {{ return {{ ok: false, missing: false, value: null, \
                     error: String((e && e.message) || e) }}; }} }})()",
                    target = global_ref(function),
                )
            }
            Self::ArrayLength { global } => format!(
                "(() => {{ const v = {}; \
                 return (v && typeof v.length === 'number') ? v.length : null; }})()",
                global_ref(global)
            ),
            Self::ChannelState { global } => format!(
                "(() => {{ const s = {}; if (!s) return {{ exists: false, connected: null, id: null }}; \
                 return {{ exists: true, \
                 connected: typeof s.connected === 'boolean' ? s.connected : null, \
                 id: s.id ? String(s.id) : null }}; }})()",
                global_ref(global)
            ),
            Self::BodyText => "(document.body ? document.body.innerText : '')".to_string(),
            Self::Fetch { url } => format!(
                "(async () => {{ try {{ const r = await fetch({url}, \
                 {{ credentials: 'same-origin', cache: 'no-store' }}); \
                 return {{ status: r.status, body: await r.text(), error: null }}; }} \
                 catch (e) {{ return {{ status: 0, body: '', error: String(e) }}; }} }})()",
                url = quote(url)
            ),
        }
    }
}
