//! Structural event filters.
//!
//! A filter decides whether an incoming event is relevant to a binding.
//! Matching is recursive, total and side-effect free: any shape mismatch
//! simply yields `false`.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Boolean test applied to a whole event.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Event filter.
#[derive(Clone)]
pub enum Filter {
    /// Matches any event.
    Wildcard,
    /// Matches when the function returns true for the whole event.
    Predicate(PredicateFn),
    /// Matches an event deep-equal to the value.
    Literal(Value),
    /// Matches a list event of the same arity whose elements match positionally.
    Sequence(Vec<Filter>),
}

impl Filter {
    /// The wildcard filter.
    #[must_use]
    pub const fn any() -> Self {
        Self::Wildcard
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn sequence(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Sequence(filters.into_iter().collect())
    }

    /// Tests `event` against this filter.
    #[must_use]
    pub fn matches(&self, event: &Value) -> bool {
        matches(self, event)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::Wildcard
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "Wildcard"),
            Self::Predicate(_) => write!(f, "Predicate(<fn>)"),
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
        }
    }
}

impl From<Value> for Filter {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

/// Returns true when `event` satisfies `filter`.
///
/// Sequences never prefix-match: a list event must have exactly as many
/// elements as the sequence has sub-filters.
#[must_use]
pub fn matches(filter: &Filter, event: &Value) -> bool {
    match (filter, event) {
        (Filter::Wildcard, _) => true,
        (Filter::Predicate(p), event) => p(event),
        (Filter::Literal(v), event) => v == event,
        (Filter::Sequence(filters), Value::List(items)) => {
            filters.len() == items.len()
                && filters.iter().zip(items).all(|(f, e)| matches(f, e))
        }
        (Filter::Sequence(_), _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Value> {
        vec![
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(2.5),
            Value::from("x"),
            Value::list([1, 2]),
            Value::map([("k", 1)]),
            Value::Structured(serde_json::json!({"a": [1]})),
        ]
    }

    #[test]
    fn wildcard_matches_everything() {
        for v in samples() {
            assert!(matches(&Filter::Wildcard, &v), "wildcard rejected {v}");
        }
    }

    #[test]
    fn literal_matches_by_deep_equality() {
        let v = Value::list([Value::from("user"), Value::Int(1)]);
        assert!(matches(&Filter::Literal(v.clone()), &v));
        assert!(!matches(
            &Filter::Literal(v),
            &Value::list([Value::from("user"), Value::Int(2)])
        ));
        assert!(!matches(&Filter::literal(1), &Value::Float(1.0)));
    }

    #[test]
    fn sequence_with_wildcard_element() {
        let f = Filter::sequence([Filter::Wildcard, Filter::literal(2)]);
        assert!(matches(&f, &Value::list([1, 2])));
        assert!(matches(&f, &Value::list([Value::from("any"), Value::Int(2)])));
        assert!(!matches(&f, &Value::list([1, 3])));
    }

    #[test]
    fn sequence_requires_exact_arity() {
        let f = Filter::sequence([Filter::literal(1), Filter::literal(2)]);
        assert!(!matches(&f, &Value::list([1, 2, 3])));
        assert!(!matches(&f, &Value::list([1])));
        assert!(matches(&f, &Value::list([1, 2])));
    }

    #[test]
    fn sequence_rejects_non_list_events() {
        let f = Filter::sequence([Filter::Wildcard]);
        assert!(!matches(&f, &Value::Int(1)));
        assert!(!matches(&f, &Value::map([("0", 1)])));
        assert!(!matches(&f, &Value::Structured(serde_json::json!([1]))));
    }

    #[test]
    fn empty_sequence_matches_only_empty_list() {
        let f = Filter::Sequence(Vec::new());
        assert!(matches(&f, &Value::List(Vec::new())));
        assert!(!matches(&f, &Value::list([1])));
    }

    #[test]
    fn predicate_receives_whole_event() {
        let f = Filter::predicate(|e| {
            e.as_list()
                .and_then(|items| items.first())
                .and_then(Value::as_string)
                == Some("deleted")
        });
        assert!(f.matches(&Value::list([Value::from("deleted"), Value::Int(9)])));
        assert!(!f.matches(&Value::list([Value::from("created"), Value::Int(9)])));
        assert!(!f.matches(&Value::from("deleted")));
    }

    #[test]
    fn nested_sequences_match_recursively() {
        let f = Filter::sequence([
            Filter::literal("order"),
            Filter::sequence([Filter::Wildcard, Filter::predicate(|v| v.as_int() > Some(10))]),
        ]);
        let hit = Value::list([Value::from("order"), Value::list([Value::from("id"), Value::Int(11)])]);
        let miss = Value::list([Value::from("order"), Value::list([Value::from("id"), Value::Int(3)])]);
        assert!(f.matches(&hit));
        assert!(!f.matches(&miss));
    }

    #[test]
    fn default_is_wildcard() {
        assert!(matches!(Filter::default(), Filter::Wildcard));
        assert_eq!(format!("{:?}", Filter::predicate(|_| true)), "Predicate(<fn>)");
    }
}
