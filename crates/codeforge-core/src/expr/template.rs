//! `{{ ... }}` template strings.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::errors::{ForgeError, ForgeResult};
use crate::expr::eval::{to_js_string, Evaluator, Scope, Val};
use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// The whole string is one `{{expr}}`; resolves to the expression's native value.
    Single(Expr),
    /// Text mixed with one or more expressions; resolves to a string.
    Mixed(Vec<Segment>),
}

/// Quick check used while compiling props: does the string contain a template segment?
pub fn is_template(s: &str) -> bool {
    s.find("{{").is_some_and(|i| s[i + 2..].contains("}}"))
}

impl Template {
    pub fn parse(src: &str) -> ForgeResult<Self> {
        let mut segments = Vec::new();
        let mut rest = src;
        let mut consumed = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let body_start = open + 2;
            let len = closing_offset(&rest[body_start..]).ok_or_else(|| ForgeError::Syntax {
                offset: consumed + open,
                message: "unterminated '{{' in template".to_string(),
            })?;
            let body = &rest[body_start..body_start + len];
            let expr = Expr::parse(body).map_err(|e| match e {
                ForgeError::Syntax { offset, message } => ForgeError::Syntax {
                    offset: consumed + body_start + offset,
                    message,
                },
                other => other,
            })?;
            segments.push(Segment::Expr(expr));
            let next = body_start + len + 2;
            consumed += next;
            rest = &rest[next..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        match segments.as_slice() {
            [Segment::Expr(e)] => Ok(Template::Single(e.clone())),
            _ => Ok(Template::Mixed(segments)),
        }
    }

    /// Free identifiers referenced by any segment.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        match self {
            Template::Single(e) => out.extend(e.references()),
            Template::Mixed(segs) => {
                for s in segs {
                    if let Segment::Expr(e) = s {
                        out.extend(e.references());
                    }
                }
            }
        }
        out
    }

    /// Evaluate the template. A single-segment template propagates evaluation
    /// errors; mixed templates render a failing segment as empty text.
    pub fn eval(&self, ev: &Evaluator, scope: &Scope<'_>) -> ForgeResult<Val> {
        match self {
            Template::Single(e) => e.eval(ev, scope),
            Template::Mixed(segs) => {
                let mut out = String::new();
                for s in segs {
                    match s {
                        Segment::Text(t) => out.push_str(t),
                        Segment::Expr(e) => match e.eval(ev, scope) {
                            Ok(None) | Ok(Some(Value::Null)) => {}
                            Ok(v) => out.push_str(&to_js_string(&v)),
                            Err(err) => {
                                tracing::debug!(expr = %e.source(), error = %err, "template segment failed");
                            }
                        },
                    }
                }
                Ok(Some(Value::String(out)))
            }
        }
    }
}

/// Find the `}}` closing the segment, skipping string literals and balanced
/// braces of object literals. Returns the byte length of the segment body.
fn closing_offset(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'{' => depth += 1,
            b'}' if depth == 0 && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}
