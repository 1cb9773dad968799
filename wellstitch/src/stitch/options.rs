//! Builder for ImageJ plugin option strings.
//!
//! Plugin options are a space-separated `key=value` list. Some values are only
//! known when the macro runs (script parameters), so the builder keeps literal
//! text and parameter references apart and renders either a macro string
//! expression or, for inspection, the resolved text.

use std::fmt::Display;

use crate::engine::MacroArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Param(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionString {
    segments: Vec<Segment>,
}

impl OptionString {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bare keyword such as `subpixel_accuracy`.
    pub fn flag(mut self, name: &str) -> Self {
        self.separator();
        self.push_text(name);
        self
    }

    /// Adds `name` only when `enabled`.
    pub fn flag_if(self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.flag(name)
        } else {
            self
        }
    }

    /// `key=value`
    pub fn value(mut self, key: &str, value: impl Display) -> Self {
        self.separator();
        self.push_text(&format!("{}={}", key, value));
        self
    }

    /// `key=[value]`, for values that may contain spaces.
    pub fn bracketed(mut self, key: &str, value: impl Display) -> Self {
        self.separator();
        self.push_text(&format!("{}=[{}]", key, value));
        self
    }

    /// `key=` followed by the runtime value of script parameter `param`.
    pub fn param(mut self, key: &str, param: &str) -> Self {
        self.separator();
        self.push_text(&format!("{}=", key));
        self.segments.push(Segment::Param(param.to_string()));
        self
    }

    /// `key=[` + runtime value of `param` + `]`.
    pub fn bracketed_param(mut self, key: &str, param: &str) -> Self {
        self.separator();
        self.push_text(&format!("{}=[", key));
        self.segments.push(Segment::Param(param.to_string()));
        self.push_text("]");
        self
    }

    fn separator(&mut self) {
        if !self.segments.is_empty() {
            self.push_text(" ");
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    /// Macro-language string expression, e.g. `"directory=[" + orgDir + "]"`.
    pub fn to_macro_expr(&self) -> String {
        if self.segments.is_empty() {
            return "\"\"".to_string();
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => quote(text),
                Segment::Param(param) => param.clone(),
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// The option text the plugin receives for the given arguments.
    /// Unknown parameters resolve to an empty string, as in the macro language.
    pub fn resolve(&self, args: &MacroArgs) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Param(param) => args.get(param).unwrap_or_default(),
            })
            .collect()
    }
}

/// Quote text as a macro-language string literal.
pub(crate) fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
