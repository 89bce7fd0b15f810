//! Tree-walking evaluator for binding expressions.
//!
//! Values follow JavaScript semantics closely enough for data bindings:
//! `None` plays the role of `undefined`, numbers are `f64` but integral results
//! are stored as JSON integers, and truthiness/equality follow the usual rules.
//! Composite values compare structurally (there are no object identities here).

use serde_json::{Map, Number, Value};

use crate::context::DataContext;
use crate::errors::{ForgeError, ForgeResult};
use crate::expr::parser::{BinaryOp, LogicalOp, Node, UnaryOp};

/// An evaluation result. `None` is `undefined`.
pub type Val = Option<Value>;

const GLOBAL_NAMESPACES: [&str; 4] = ["Math", "Object", "JSON", "Array"];
const GLOBAL_FUNCTIONS: [&str; 3] = ["String", "Number", "Boolean"];

/// Whether `name` is one of the built-in globals (`Math`, `String`, ...).
pub fn is_global(name: &str) -> bool {
    GLOBAL_NAMESPACES.contains(&name) || GLOBAL_FUNCTIONS.contains(&name)
}

/// Variable scope for one evaluation.
///
/// The root scope reads data sources from a `DataContext`; child scopes add
/// local names (`event`, `value`, lambda parameters) that shadow them.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    ctx: &'a DataContext,
    vars: Vec<(String, Val)>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(ctx: &'a DataContext) -> Self {
        Self {
            ctx,
            vars: Vec::new(),
            parent: None,
        }
    }

    /// Bind a local variable in this scope.
    pub fn with_var(mut self, name: impl Into<String>, value: Val) -> Self {
        self.vars.push((name.into(), value));
        self
    }

    pub fn child<'b>(&'b self) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            ctx: self.ctx,
            vars: Vec::new(),
            parent: Some(self),
        }
    }

    pub fn context(&self) -> &'a DataContext {
        self.ctx
    }

    /// `Some(v)` when the name is bound (a local or a data source), `None` otherwise.
    fn lookup(&self, name: &str) -> Option<Option<&Value>> {
        if let Some((_, v)) = self.vars.iter().rev().find(|(n, _)| n == name) {
            return Some(v.as_ref());
        }
        match self.parent {
            Some(p) => p.lookup(name),
            None => self.ctx.get(name).map(Some),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// Expression evaluator with a recursion limit.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

impl Evaluator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn eval(&self, node: &Node, scope: &Scope<'_>) -> ForgeResult<Val> {
        self.eval_at(node, scope, 0)
    }

    fn eval_at(&self, node: &Node, scope: &Scope<'_>, depth: usize) -> ForgeResult<Val> {
        if depth > self.max_depth {
            return Err(ForgeError::eval("expression nesting exceeds evaluation limit"));
        }
        let d = depth + 1;

        if let Some(place) = self.place(node, scope, d)? {
            return Ok(place.cloned());
        }

        match node {
            Node::Literal(v) => Ok(Some(v.clone())),
            Node::Undefined => Ok(None),
            Node::Ident(name) => match scope.lookup(name) {
                Some(v) => Ok(v.cloned()),
                None => Err(ForgeError::eval(format!("{name} is not defined"))),
            },
            Node::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_at(item, scope, d)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            Node::Object(fields) => {
                let mut out = Map::new();
                for (k, v) in fields {
                    if let Some(val) = self.eval_at(v, scope, d)? {
                        out.insert(k.clone(), val);
                    }
                }
                Ok(Some(Value::Object(out)))
            }
            Node::Member {
                object,
                property,
                optional,
            } => {
                if let Some(base) = self.place(object, scope, d)? {
                    return get_property(base, property, *optional);
                }
                let recv = self.eval_at(object, scope, d)?;
                get_property(recv.as_ref(), property, *optional)
            }
            Node::Index {
                object,
                index,
                optional,
            } => {
                let recv = self.eval_at(object, scope, d)?;
                let key = self.eval_at(index, scope, d)?;
                get_index(recv.as_ref(), key.as_ref(), *optional)
            }
            Node::Call { callee, args } => self.call(callee, args, scope, d),
            Node::Unary { op, operand } => {
                let v = self.eval_at(operand, scope, d)?;
                Ok(match op {
                    UnaryOp::Not => Some(Value::Bool(!truthy(&v))),
                    UnaryOp::Neg => number(-to_number(&v)),
                    UnaryOp::Plus => number(to_number(&v)),
                })
            }
            Node::Binary { op, left, right } => {
                let l = self.eval_at(left, scope, d)?;
                let r = self.eval_at(right, scope, d)?;
                Ok(binary(*op, &l, &r))
            }
            Node::Logical { op, left, right } => {
                let l = self.eval_at(left, scope, d)?;
                let short = match op {
                    LogicalOp::And => !truthy(&l),
                    LogicalOp::Or => truthy(&l),
                    LogicalOp::Nullish => !matches!(l, None | Some(Value::Null)),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval_at(right, scope, d)
                }
            }
            Node::Conditional {
                test,
                then,
                otherwise,
            } => {
                let t = self.eval_at(test, scope, d)?;
                if truthy(&t) {
                    self.eval_at(then, scope, d)
                } else {
                    self.eval_at(otherwise, scope, d)
                }
            }
            Node::Lambda { .. } => Err(ForgeError::eval(
                "arrow functions are only allowed as method arguments",
            )),
        }
    }

    /// Borrow a value reachable through a plain path (`a.b[0].c`) without cloning
    /// intermediate containers. Returns `Ok(None)` for nodes that are not paths.
    fn place<'s>(
        &self,
        node: &Node,
        scope: &'s Scope<'_>,
        depth: usize,
    ) -> ForgeResult<Option<Option<&'s Value>>> {
        if depth > self.max_depth {
            return Err(ForgeError::eval("expression nesting exceeds evaluation limit"));
        }
        match node {
            Node::Ident(name) => match scope.lookup(name) {
                Some(v) => Ok(Some(v)),
                None => Err(ForgeError::eval(format!("{name} is not defined"))),
            },
            Node::Member {
                object,
                property,
                optional: false,
            } if property != "length" => {
                let Some(base) = self.place(object, scope, depth + 1)? else {
                    return Ok(None);
                };
                match base {
                    Some(Value::Object(map)) => Ok(Some(map.get(property))),
                    Some(Value::Null) | None => Err(ForgeError::eval(format!(
                        "cannot read property '{property}' of {}",
                        type_name(&base.cloned())
                    ))),
                    Some(_) => Ok(Some(None)),
                }
            }
            Node::Index {
                object,
                index,
                optional: false,
            } => {
                let Node::Literal(key) = index.as_ref() else {
                    return Ok(None);
                };
                let Some(base) = self.place(object, scope, depth + 1)? else {
                    return Ok(None);
                };
                match (base, key) {
                    (Some(Value::Array(items)), Value::Number(n)) => {
                        Ok(Some(n.as_u64().and_then(|i| items.get(i as usize))))
                    }
                    (Some(Value::Object(map)), Value::String(k)) => Ok(Some(map.get(k))),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn call(&self, callee: &Node, args: &[Node], scope: &Scope<'_>, depth: usize) -> ForgeResult<Val> {
        match callee {
            Node::Member {
                object,
                property,
                optional,
            } => {
                if let Node::Ident(ns) = object.as_ref() {
                    if GLOBAL_NAMESPACES.contains(&ns.as_str()) && !scope.is_bound(ns) {
                        let vals = self.eval_args(args, scope, depth)?;
                        return call_global(ns, property, &vals);
                    }
                }
                let recv = self.eval_at(object, scope, depth)?;
                match recv {
                    None | Some(Value::Null) if *optional => Ok(None),
                    None | Some(Value::Null) => Err(ForgeError::eval(format!(
                        "cannot call '{property}' on {}",
                        type_name(&recv)
                    ))),
                    Some(v) => self.call_method(v, property, args, scope, depth),
                }
            }
            Node::Ident(name) if GLOBAL_FUNCTIONS.contains(&name.as_str()) && !scope.is_bound(name) => {
                let vals = self.eval_args(args, scope, depth)?;
                let arg = vals.into_iter().next().flatten();
                Ok(match name.as_str() {
                    "String" => Some(Value::String(to_js_string(&arg))),
                    "Number" => number(to_number(&arg)),
                    _ => Some(Value::Bool(truthy(&arg))),
                })
            }
            _ => Err(ForgeError::eval("expression is not callable")),
        }
    }

    fn eval_args(&self, args: &[Node], scope: &Scope<'_>, depth: usize) -> ForgeResult<Vec<Val>> {
        args.iter().map(|a| self.eval_at(a, scope, depth)).collect()
    }

    fn call_lambda(&self, lambda: &Node, values: Vec<Val>, scope: &Scope<'_>, depth: usize) -> ForgeResult<Val> {
        let Node::Lambda { params, body } = lambda else {
            return Err(ForgeError::eval("expected an arrow function argument"));
        };
        let mut child = scope.child();
        let mut values = values.into_iter();
        for p in params {
            child = child.with_var(p.clone(), values.next().flatten());
        }
        self.eval_at(body, &child, depth)
    }

    fn call_method(
        &self,
        recv: Value,
        method: &str,
        args: &[Node],
        scope: &Scope<'_>,
        depth: usize,
    ) -> ForgeResult<Val> {
        match recv {
            Value::Array(items) => self.array_method(items, method, args, scope, depth),
            Value::String(s) => {
                let vals = self.eval_args(args, scope, depth)?;
                string_method(&s, method, &vals)
            }
            Value::Number(_) => {
                let vals = self.eval_args(args, scope, depth)?;
                let n = to_number(&Some(recv));
                match method {
                    "toFixed" => {
                        let digits = vals.first().map(to_number).unwrap_or(0.0).clamp(0.0, 20.0) as usize;
                        Ok(Some(Value::String(format!("{n:.digits$}"))))
                    }
                    "toString" => Ok(Some(Value::String(format_number(n)))),
                    _ => Err(ForgeError::eval(format!("number has no method '{method}'"))),
                }
            }
            other => match method {
                "toString" => Ok(Some(Value::String(to_js_string(&Some(other))))),
                _ => Err(ForgeError::eval(format!(
                    "{} has no method '{method}'",
                    type_name(&Some(other))
                ))),
            },
        }
    }

    fn array_method(
        &self,
        items: Vec<Value>,
        method: &str,
        args: &[Node],
        scope: &Scope<'_>,
        depth: usize,
    ) -> ForgeResult<Val> {
        let callback = |i: usize| lambda_arg(args, i, method);

        match method {
            "filter" => {
                let f = callback(0)?;
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let keep = self.call_lambda(f, vec![Some(item.clone()), index_val(i)], scope, depth)?;
                    if truthy(&keep) {
                        out.push(item);
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            "map" => {
                let f = callback(0)?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let v = self.call_lambda(f, vec![Some(item), index_val(i)], scope, depth)?;
                    out.push(v.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            "find" | "findIndex" | "some" | "every" => {
                let f = callback(0)?;
                for (i, item) in items.into_iter().enumerate() {
                    let hit = truthy(&self.call_lambda(f, vec![Some(item.clone()), index_val(i)], scope, depth)?);
                    match (method, hit) {
                        ("find", true) => return Ok(Some(item)),
                        ("findIndex", true) => return Ok(index_val(i)),
                        ("some", true) => return Ok(Some(Value::Bool(true))),
                        ("every", false) => return Ok(Some(Value::Bool(false))),
                        _ => {}
                    }
                }
                Ok(match method {
                    "find" => None,
                    "findIndex" => number(-1.0),
                    "some" => Some(Value::Bool(false)),
                    _ => Some(Value::Bool(true)),
                })
            }
            "reduce" => {
                let f = callback(0)?;
                let mut iter = items.into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(init) => self.eval_at(init, scope, depth)?,
                    None => match iter.next() {
                        Some((_, first)) => Some(first),
                        None => {
                            return Err(ForgeError::eval("reduce of empty array with no initial value"))
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call_lambda(f, vec![acc, Some(item), index_val(i)], scope, depth)?;
                }
                Ok(acc)
            }
            _ => {
                let vals = self.eval_args(args, scope, depth)?;
                array_method(items, method, &vals)
            }
        }
    }
}

fn lambda_arg<'n>(args: &'n [Node], i: usize, method: &str) -> ForgeResult<&'n Node> {
    args.get(i)
        .filter(|n| matches!(n, Node::Lambda { .. }))
        .ok_or_else(|| ForgeError::eval(format!("{method} expects an arrow function")))
}

fn index_val(i: usize) -> Val {
    Some(Value::from(i as u64))
}

fn array_method(items: Vec<Value>, method: &str, args: &[Val]) -> ForgeResult<Val> {
    let arg = |i: usize| args.get(i).cloned().flatten();
    match method {
        "includes" => {
            let needle = arg(0);
            Ok(Some(Value::Bool(
                items.iter().any(|v| strict_eq(&Some(v.clone()), &needle)),
            )))
        }
        "indexOf" => {
            let needle = arg(0);
            let pos = items.iter().position(|v| strict_eq(&Some(v.clone()), &needle));
            Ok(number(pos.map(|p| p as f64).unwrap_or(-1.0)))
        }
        "join" => {
            let sep = match arg(0) {
                None => ",".to_string(),
                Some(v) => to_js_string(&Some(v)),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => to_js_string(&Some(other.clone())),
                })
                .collect();
            Ok(Some(Value::String(parts.join(&sep))))
        }
        "slice" => {
            let (start, end) = slice_bounds(items.len(), &arg(0), &arg(1));
            Ok(Some(Value::Array(items[start..end].to_vec())))
        }
        "concat" => {
            let mut out = items;
            for a in args {
                match a {
                    Some(Value::Array(more)) => out.extend(more.iter().cloned()),
                    Some(v) => out.push(v.clone()),
                    None => out.push(Value::Null),
                }
            }
            Ok(Some(Value::Array(out)))
        }
        "reverse" => {
            let mut out = items;
            out.reverse();
            Ok(Some(Value::Array(out)))
        }
        "toString" => Ok(Some(Value::String(to_js_string(&Some(Value::Array(items)))))),
        _ => Err(ForgeError::eval(format!("array has no method '{method}'"))),
    }
}

fn string_method(s: &str, method: &str, args: &[Val]) -> ForgeResult<Val> {
    let arg_str = |i: usize| args.get(i).map(to_js_string).unwrap_or_default();
    let text = |v: String| Ok(Some(Value::String(v)));
    match method {
        "toUpperCase" => text(s.to_uppercase()),
        "toLowerCase" => text(s.to_lowercase()),
        "trim" => text(s.trim().to_string()),
        "toString" => text(s.to_string()),
        "includes" => Ok(Some(Value::Bool(s.contains(&arg_str(0))))),
        "startsWith" => Ok(Some(Value::Bool(s.starts_with(&arg_str(0))))),
        "endsWith" => Ok(Some(Value::Bool(s.ends_with(&arg_str(0))))),
        "indexOf" => {
            let needle = arg_str(0);
            let pos = s.find(&needle).map(|byte| s[..byte].chars().count() as f64);
            Ok(number(pos.unwrap_or(-1.0)))
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let a = args.first().cloned().flatten();
            let b = args.get(1).cloned().flatten();
            let (start, end) = slice_bounds(chars.len(), &a, &b);
            text(chars[start..end].iter().collect())
        }
        "split" => {
            let sep = arg_str(0);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
            };
            Ok(Some(Value::Array(parts)))
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&to_js_string(a));
            }
            text(out)
        }
        "replace" => text(s.replacen(&arg_str(0), &arg_str(1), 1)),
        _ => Err(ForgeError::eval(format!("string has no method '{method}'"))),
    }
}

fn call_global(ns: &str, name: &str, args: &[Val]) -> ForgeResult<Val> {
    let first = args.first().cloned().flatten();
    match (ns, name) {
        ("Object", "keys") => Ok(Some(match first {
            Some(Value::Object(m)) => Value::Array(m.keys().map(|k| Value::String(k.clone())).collect()),
            _ => Value::Array(Vec::new()),
        })),
        ("Object", "values") => Ok(Some(match first {
            Some(Value::Object(m)) => Value::Array(m.values().cloned().collect()),
            _ => Value::Array(Vec::new()),
        })),
        ("Object", "entries") => Ok(Some(match first {
            Some(Value::Object(m)) => Value::Array(
                m.into_iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        })),
        ("Array", "isArray") => Ok(Some(Value::Bool(matches!(first, Some(Value::Array(_)))))),
        ("JSON", "stringify") => Ok(first.map(|v| Value::String(v.to_string()))),
        ("Math", "min") | ("Math", "max") => {
            let nums: Vec<f64> = match (args.len(), &first) {
                (1, Some(Value::Array(items))) => items.iter().map(|v| to_number(&Some(v.clone()))).collect(),
                _ => args.iter().map(to_number).collect(),
            };
            let folded = if name == "min" {
                nums.into_iter().fold(f64::INFINITY, f64::min)
            } else {
                nums.into_iter().fold(f64::NEG_INFINITY, f64::max)
            };
            Ok(number(folded))
        }
        ("Math", "round") => Ok(number((to_number(&first) + 0.5).floor())),
        ("Math", "floor") => Ok(number(to_number(&first).floor())),
        ("Math", "ceil") => Ok(number(to_number(&first).ceil())),
        ("Math", "abs") => Ok(number(to_number(&first).abs())),
        _ => Err(ForgeError::eval(format!("{ns}.{name} is not a function"))),
    }
}

fn slice_bounds(len: usize, start: &Val, end: &Val) -> (usize, usize) {
    let norm = |v: &Val, default: usize| -> usize {
        match v {
            None => default,
            Some(_) => {
                let n = to_number(v);
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let s = norm(start, 0);
    let e = norm(end, len);
    (s, e.max(s))
}

pub(crate) fn get_property(recv: Option<&Value>, property: &str, optional: bool) -> ForgeResult<Val> {
    match recv {
        Some(Value::Object(map)) => Ok(map.get(property).cloned()),
        Some(Value::Array(items)) if property == "length" => Ok(Some(Value::from(items.len() as u64))),
        Some(Value::String(s)) if property == "length" => Ok(Some(Value::from(s.chars().count() as u64))),
        Some(Value::Null) | None if optional => Ok(None),
        Some(Value::Null) | None => Err(ForgeError::eval(format!(
            "cannot read property '{property}' of {}",
            type_name(&recv.cloned())
        ))),
        Some(_) => Ok(None),
    }
}

fn get_index(recv: Option<&Value>, key: Option<&Value>, optional: bool) -> ForgeResult<Val> {
    match (recv, key) {
        (Some(Value::Null) | None, _) if optional => Ok(None),
        (Some(Value::Null) | None, _) => Err(ForgeError::eval(format!(
            "cannot index into {}",
            type_name(&recv.cloned())
        ))),
        (Some(Value::Array(items)), Some(Value::Number(n))) => {
            Ok(n.as_u64().and_then(|i| items.get(i as usize)).cloned())
        }
        (Some(Value::String(s)), Some(Value::Number(n))) => Ok(n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))),
        (Some(v), Some(Value::String(k))) => get_property(Some(v), k, optional),
        (Some(Value::Object(map)), Some(k)) => Ok(map.get(&to_js_string(&Some(k.clone()))).cloned()),
        _ => Ok(None),
    }
}

fn binary(op: BinaryOp, l: &Val, r: &Val) -> Val {
    match op {
        BinaryOp::Add => {
            let stringy = |v: &Val| matches!(v, Some(Value::String(_) | Value::Array(_) | Value::Object(_)));
            if stringy(l) || stringy(r) {
                Some(Value::String(format!("{}{}", to_js_string(l), to_js_string(r))))
            } else {
                number(to_number(l) + to_number(r))
            }
        }
        BinaryOp::Sub => number(to_number(l) - to_number(r)),
        BinaryOp::Mul => number(to_number(l) * to_number(r)),
        BinaryOp::Div => number(to_number(l) / to_number(r)),
        BinaryOp::Rem => number(to_number(l) % to_number(r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = match (l, r) {
                (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
                _ => to_number(l).partial_cmp(&to_number(r)),
            };
            let res = match ord {
                None => false,
                Some(o) => match op {
                    BinaryOp::Lt => o.is_lt(),
                    BinaryOp::Le => o.is_le(),
                    BinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            };
            Some(Value::Bool(res))
        }
        BinaryOp::LooseEq => Some(Value::Bool(loose_eq(l, r))),
        BinaryOp::LooseNe => Some(Value::Bool(!loose_eq(l, r))),
        BinaryOp::StrictEq => Some(Value::Bool(strict_eq(l, r))),
        BinaryOp::StrictNe => Some(Value::Bool(!strict_eq(l, r))),
    }
}

/// Convert an `f64` into a JSON number. Integral values become JSON integers;
/// NaN and infinities have no JSON form and become `undefined`.
pub fn number(n: f64) -> Val {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

pub fn truthy(v: &Val) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

pub fn to_number(v: &Val) -> f64 {
    match v {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(_) | Value::Object(_)) => f64::NAN,
    }
}

fn format_number(n: f64) -> String {
    match number(n) {
        Some(Value::Number(num)) => num.to_string(),
        _ if n.is_nan() => "NaN".to_string(),
        _ if n > 0.0 => "Infinity".to_string(),
        _ => "-Infinity".to_string(),
    }
}

/// String conversion used by `+`, `String(x)` and `join`.
pub fn to_js_string(v: &Val) -> String {
    match v {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| match i {
                Value::Null => String::new(),
                other => to_js_string(&Some(other.clone())),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(obj @ Value::Object(_)) => obj.to_string(),
    }
}

pub fn strict_eq(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

pub fn loose_eq(a: &Val, b: &Val) -> bool {
    let nullish = |v: &Val| matches!(v, None | Some(Value::Null));
    match (a, b) {
        _ if nullish(a) && nullish(b) => true,
        _ if nullish(a) || nullish(b) => false,
        (Some(Value::Number(_)), Some(Value::String(_)))
        | (Some(Value::String(_)), Some(Value::Number(_)))
        | (Some(Value::Bool(_)), _)
        | (_, Some(Value::Bool(_))) => to_number(a) == to_number(b),
        _ => strict_eq(a, b),
    }
}

pub fn type_name(v: &Val) -> &'static str {
    match v {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
