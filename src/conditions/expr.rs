//! Predicate expression tree and serialization
//!
//! Builders accumulate these nodes and render them to the backend's
//! boolean filter syntax in one final pass. No algebraic rewriting
//! happens here; what the caller composed is what gets serialized.

use serde_json::Value;

/// Comparison operators on scalar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

/// Substring position for LIKE patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    /// `%value%`
    Contains,
    /// `%value` (suffix match)
    Left,
    /// `value%` (prefix match)
    Right,
}

/// A literal value inside a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Serialize to the backend's literal syntax.
    ///
    /// Strings are single-quoted with `\` escaped before `'`; lists are
    /// bracketed and comma-joined, recursively.
    pub fn render(&self) -> String {
        match self {
            FilterValue::Null => "NULL".to_string(),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            FilterValue::Str(s) => format!("'{}'", escape_str(s)),
            FilterValue::List(items) => {
                let parts: Vec<String> = items.iter().map(FilterValue::render).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }
}

// Order matters: escaping the quote first would double-escape the
// backslashes it introduces.
fn escape_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

macro_rules! filter_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FilterValue {
            fn from(v: $ty) -> Self {
                FilterValue::Int(v as i64)
            }
        })*
    };
}

filter_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for FilterValue {
    fn from(v: f32) -> Self {
        FilterValue::Float(v as f64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        FilterValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => FilterValue::Null,
        }
    }
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FilterValue::Int(i)
                } else {
                    FilterValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => FilterValue::Str(s),
            Value::Array(items) => {
                FilterValue::List(items.into_iter().map(FilterValue::from).collect())
            }
            // Objects have no literal form; serialize to their JSON text
            Value::Object(_) => FilterValue::Str(v.to_string()),
        }
    }
}

/// One predicate fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: String,
        op: CmpOp,
        value: FilterValue,
    },
    Between {
        field: String,
        low: FilterValue,
        high: FilterValue,
        negated: bool,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    In {
        field: String,
        values: Vec<FilterValue>,
        negated: bool,
    },
    Like {
        field: String,
        pattern: String,
        kind: LikeKind,
        negated: bool,
    },
    /// Function-style predicate, e.g. `JSON_CONTAINS(field, value)`
    Call {
        function: &'static str,
        field: String,
        arg: FilterValue,
        negated: bool,
    },
    ArrayLength {
        field: String,
        length: i64,
    },
    TextMatch {
        field: String,
        terms: String,
    },
    /// Parenthesized join: `(a OP b OP c)`
    Group {
        op: BoolOp,
        parts: Vec<Expr>,
    },
    /// Bare AND-join without surrounding parentheses
    Seq(Vec<Expr>),
    /// `NOT ( inner )`
    Not(Box<Expr>),
}

impl Expr {
    pub fn render(&self) -> String {
        match self {
            Expr::Compare { field, op, value } => {
                format!("{} {} {}", field, op.as_str(), value.render())
            }
            Expr::Between {
                field,
                low,
                high,
                negated,
            } => {
                let body = format!(
                    "{field} >= {} AND {field} <= {}",
                    low.render(),
                    high.render()
                );
                if *negated {
                    format!("NOT ({body})")
                } else {
                    body
                }
            }
            Expr::IsNull { field, negated } => {
                if *negated {
                    format!("{field} IS NOT NULL")
                } else {
                    format!("{field} IS NULL")
                }
            }
            Expr::In {
                field,
                values,
                negated,
            } => {
                let list = FilterValue::List(values.clone()).render();
                if *negated {
                    format!("NOT ({field} IN {list})")
                } else {
                    format!("{field} IN {list}")
                }
            }
            Expr::Like {
                field,
                pattern,
                kind,
                negated,
            } => {
                let escaped = escape_str(pattern);
                let wildcard = match kind {
                    LikeKind::Contains => format!("%{escaped}%"),
                    LikeKind::Left => format!("%{escaped}"),
                    LikeKind::Right => format!("{escaped}%"),
                };
                if *negated {
                    format!("NOT ({field} LIKE '{wildcard}')")
                } else {
                    format!("{field} LIKE '{wildcard}'")
                }
            }
            Expr::Call {
                function,
                field,
                arg,
                negated,
            } => {
                let call = format!("{function}({field}, {})", arg.render());
                if *negated {
                    format!("NOT ({call})")
                } else {
                    call
                }
            }
            Expr::ArrayLength { field, length } => {
                format!("ARRAY_LENGTH({field}) == {length}")
            }
            Expr::TextMatch { field, terms } => {
                format!("TEXT_MATCH({field}, '{}')", escape_str(terms))
            }
            Expr::Group { op, parts } => {
                let joined: Vec<String> = parts.iter().map(Expr::render).collect();
                format!("({})", joined.join(&format!(" {} ", op.as_str())))
            }
            Expr::Seq(parts) => {
                let joined: Vec<String> = parts.iter().map(Expr::render).collect();
                joined.join(" AND ")
            }
            Expr::Not(inner) => format!("NOT ({})", inner.render()),
        }
    }

    /// Collapse a fragment list into one expression, parenthesizing
    /// only when there is more than one fragment.
    pub fn combine(op: BoolOp, mut parts: Vec<Expr>) -> Option<Expr> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr::Group { op, parts }),
        }
    }
}
