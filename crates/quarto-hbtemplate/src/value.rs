/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value type.
//!
//! [`TemplateValue`] is the data model templates are rendered against.
//! Contexts are built from it directly or converted from JSON via
//! `From<serde_json::Value>`. The `Helper` variant lets a context carry
//! callable members; expressions that resolve to one invoke it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::LiteralValue;
use crate::helpers::HelperFn;

/// A value that can appear in a template context.
#[derive(Clone)]
pub enum TemplateValue {
    /// A null/missing value.
    Null,

    /// A boolean value.
    Bool(bool),

    /// An integer value.
    Int(i64),

    /// A floating-point value.
    Float(f64),

    /// A string value.
    String(String),

    /// A list of values.
    List(Vec<TemplateValue>),

    /// A map of string keys to values. Keys iterate in sorted order.
    Map(BTreeMap<String, TemplateValue>),

    /// A callable value; invoked when an expression resolves to it.
    Helper(HelperFn),
}

impl TemplateValue {
    /// Check if this value is "truthy" for conditional evaluation.
    ///
    /// `Null`, `false`, `0`, `0.0`, the empty string, the empty list, and
    /// the empty map are falsy; everything else (including callables) is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Null => false,
            TemplateValue::Bool(b) => *b,
            TemplateValue::Int(i) => *i != 0,
            TemplateValue::Float(f) => *f != 0.0,
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Map(m) => !m.is_empty(),
            TemplateValue::Helper(_) => true,
        }
    }

    /// True for the `Null` variant.
    pub fn is_null(&self) -> bool {
        matches!(self, TemplateValue::Null)
    }

    /// Render this value as a string for output.
    ///
    /// - String: returned as-is
    /// - Bool: "true" or "" (empty for false)
    /// - Numbers: decimal representation
    /// - List: concatenation of rendered elements
    /// - Map: "true"
    /// - Null and callables: ""
    pub fn render(&self) -> String {
        match self {
            TemplateValue::Null => String::new(),
            TemplateValue::Bool(true) => "true".to_string(),
            TemplateValue::Bool(false) => String::new(),
            TemplateValue::Int(i) => i.to_string(),
            TemplateValue::Float(f) => f.to_string(),
            TemplateValue::String(s) => s.clone(),
            TemplateValue::List(items) => items.iter().map(|v| v.render()).collect(),
            TemplateValue::Map(_) => "true".to_string(),
            TemplateValue::Helper(_) => String::new(),
        }
    }

    /// Generic member lookup by key or index.
    ///
    /// Maps are keyed by name; lists treat the segment as an integer index.
    /// Every failure (missing key, bad index, wrong type) resolves to
    /// `Null`, never an error — templates rely on this for optional fields.
    pub fn member(&self, name: &str) -> TemplateValue {
        match self {
            TemplateValue::Map(m) => m.get(name).cloned().unwrap_or(TemplateValue::Null),
            TemplateValue::List(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(TemplateValue::Null),
            _ => TemplateValue::Null,
        }
    }

    /// Length for sequence-like values; `None` for scalars.
    pub fn length(&self) -> Option<usize> {
        match self {
            TemplateValue::String(s) => Some(s.chars().count()),
            TemplateValue::List(items) => Some(items.len()),
            TemplateValue::Map(m) => Some(m.len()),
            _ => None,
        }
    }
}

impl Default for TemplateValue {
    fn default() -> Self {
        TemplateValue::Null
    }
}

impl fmt::Debug for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Null => f.write_str("Null"),
            TemplateValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            TemplateValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            TemplateValue::Float(x) => f.debug_tuple("Float").field(x).finish(),
            TemplateValue::String(s) => f.debug_tuple("String").field(s).finish(),
            TemplateValue::List(items) => f.debug_tuple("List").field(items).finish(),
            TemplateValue::Map(m) => f.debug_tuple("Map").field(m).finish(),
            TemplateValue::Helper(_) => f.write_str("Helper(..)"),
        }
    }
}

impl PartialEq for TemplateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TemplateValue::Null, TemplateValue::Null) => true,
            (TemplateValue::Bool(a), TemplateValue::Bool(b)) => a == b,
            (TemplateValue::Int(a), TemplateValue::Int(b)) => a == b,
            (TemplateValue::Float(a), TemplateValue::Float(b)) => a == b,
            (TemplateValue::Int(a), TemplateValue::Float(b))
            | (TemplateValue::Float(b), TemplateValue::Int(a)) => *a as f64 == *b,
            (TemplateValue::String(a), TemplateValue::String(b)) => a == b,
            (TemplateValue::List(a), TemplateValue::List(b)) => a == b,
            (TemplateValue::Map(a), TemplateValue::Map(b)) => a == b,
            (TemplateValue::Helper(a), TemplateValue::Helper(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TemplateValue::Null,
            serde_json::Value::Bool(b) => TemplateValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    TemplateValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    TemplateValue::Float(f)
                } else {
                    TemplateValue::Null
                }
            }
            serde_json::Value::String(s) => TemplateValue::String(s),
            serde_json::Value::Array(items) => {
                TemplateValue::List(items.into_iter().map(TemplateValue::from).collect())
            }
            serde_json::Value::Object(m) => TemplateValue::Map(
                m.into_iter()
                    .map(|(k, v)| (k, TemplateValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&LiteralValue> for TemplateValue {
    fn from(literal: &LiteralValue) -> Self {
        match literal {
            LiteralValue::Null => TemplateValue::Null,
            LiteralValue::Bool(b) => TemplateValue::Bool(*b),
            LiteralValue::Int(i) => TemplateValue::Int(*i),
            LiteralValue::Str(s) => TemplateValue::String(s.clone()),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<i64> for TemplateValue {
    fn from(i: i64) -> Self {
        TemplateValue::Int(i)
    }
}

impl From<f64> for TemplateValue {
    fn from(f: f64) -> Self {
        TemplateValue::Float(f)
    }
}

impl From<Vec<TemplateValue>> for TemplateValue {
    fn from(items: Vec<TemplateValue>) -> Self {
        TemplateValue::List(items)
    }
}

impl From<BTreeMap<String, TemplateValue>> for TemplateValue {
    fn from(m: BTreeMap<String, TemplateValue>) -> Self {
        TemplateValue::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(TemplateValue::Bool(true).is_truthy());
        assert!(!TemplateValue::Bool(false).is_truthy());

        assert!(TemplateValue::String("hello".to_string()).is_truthy());
        assert!(TemplateValue::String("false".to_string()).is_truthy());
        assert!(!TemplateValue::String(String::new()).is_truthy());

        assert!(TemplateValue::Int(1).is_truthy());
        assert!(!TemplateValue::Int(0).is_truthy());
        assert!(!TemplateValue::Float(0.0).is_truthy());

        // A list is truthy when non-empty, regardless of element values
        assert!(TemplateValue::List(vec![TemplateValue::Bool(false)]).is_truthy());
        assert!(!TemplateValue::List(vec![]).is_truthy());

        let mut map = BTreeMap::new();
        map.insert("key".to_string(), TemplateValue::Null);
        assert!(TemplateValue::Map(map).is_truthy());
        assert!(!TemplateValue::Map(BTreeMap::new()).is_truthy());

        assert!(!TemplateValue::Null.is_truthy());
    }

    #[test]
    fn test_render() {
        assert_eq!(TemplateValue::Null.render(), "");
        assert_eq!(TemplateValue::Bool(true).render(), "true");
        assert_eq!(TemplateValue::Bool(false).render(), "");
        assert_eq!(TemplateValue::Int(42).render(), "42");
        assert_eq!(TemplateValue::Float(2.5).render(), "2.5");
        assert_eq!(TemplateValue::String("hi".to_string()).render(), "hi");
        assert_eq!(
            TemplateValue::List(vec![
                TemplateValue::String("a".to_string()),
                TemplateValue::Int(1),
            ])
            .render(),
            "a1"
        );
    }

    #[test]
    fn test_member_lookup() {
        let mut inner = BTreeMap::new();
        inner.insert("salary".to_string(), TemplateValue::Int(50000));
        let map = TemplateValue::Map(inner);

        assert_eq!(map.member("salary"), TemplateValue::Int(50000));
        assert_eq!(map.member("missing"), TemplateValue::Null);

        let list = TemplateValue::List(vec![
            TemplateValue::String("a".to_string()),
            TemplateValue::String("b".to_string()),
        ]);
        assert_eq!(list.member("1"), TemplateValue::String("b".to_string()));
        assert_eq!(list.member("7"), TemplateValue::Null);
        assert_eq!(list.member("x"), TemplateValue::Null);

        // Scalars have no members
        assert_eq!(TemplateValue::Int(3).member("anything"), TemplateValue::Null);
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"name": "Ada", "age": 36, "tags": ["a", "b"], "active": true, "gone": null}"#,
        )
        .unwrap();
        let value = TemplateValue::from(json);

        assert_eq!(value.member("name"), TemplateValue::String("Ada".to_string()));
        assert_eq!(value.member("age"), TemplateValue::Int(36));
        assert_eq!(value.member("active"), TemplateValue::Bool(true));
        assert_eq!(value.member("gone"), TemplateValue::Null);
        assert_eq!(value.member("tags").length(), Some(2));
    }

    #[test]
    fn test_length() {
        assert_eq!(TemplateValue::String("abc".to_string()).length(), Some(3));
        assert_eq!(TemplateValue::List(vec![]).length(), Some(0));
        assert_eq!(TemplateValue::Null.length(), None);
        assert_eq!(TemplateValue::Int(9).length(), None);
    }
}
