//! Refresh rules and their invocation against an owner context.
//!
//! A rule is either an ordered list of `(key, producer)` pairs, merged one by
//! one so later producers see earlier results, or a single transform that
//! takes over the whole merge.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::AttributeContext;
use crate::error::ValidationError;
use crate::value::Value;

/// Computes the value for one key of a keyed rule.
pub enum Producer<C> {
    /// Ignores the context.
    Constant(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Reads the context as updated by earlier pairs in the same pass.
    FromContext(Arc<dyn Fn(&C) -> Value + Send + Sync>),
}

impl<C> Producer<C> {
    pub fn constant<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Constant(Arc::new(f))
    }

    pub fn from_context<F>(f: F) -> Self
    where
        F: Fn(&C) -> Value + Send + Sync + 'static,
    {
        Self::FromContext(Arc::new(f))
    }

    /// Runs the producer against `ctx`.
    pub fn produce(&self, ctx: &C) -> Value {
        match self {
            Self::Constant(f) => f(),
            Self::FromContext(f) => f(ctx),
        }
    }
}

impl<C> Clone for Producer<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(f) => Self::Constant(Arc::clone(f)),
            Self::FromContext(f) => Self::FromContext(Arc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for Producer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(_) => write!(f, "Constant(<fn>)"),
            Self::FromContext(_) => write!(f, "FromContext(<fn>)"),
        }
    }
}

/// How an attribute is recomputed.
pub enum RefreshRule<C> {
    /// Ordered `(key, producer)` pairs.
    Keyed(Vec<(String, Producer<C>)>),
    /// Full control of the merge.
    Transform(Arc<dyn Fn(C) -> C + Send + Sync>),
}

impl<C: AttributeContext> RefreshRule<C> {
    /// Starts a keyed rule.
    #[must_use]
    pub fn keyed() -> KeyedRuleBuilder<C> {
        KeyedRuleBuilder::new()
    }

    /// A single-producer keyed rule that ignores the context.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyRefreshKey` if `key` is blank.
    pub fn constant<F>(key: impl Into<String>, f: F) -> Result<Self, ValidationError>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::keyed().constant(key, f).build()
    }

    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(C) -> C + Send + Sync + 'static,
    {
        Self::Transform(Arc::new(f))
    }

    /// Produces the next context from `ctx`.
    ///
    /// Keyed pairs are applied in declaration order; each producer observes
    /// the merges made by the pairs before it.
    #[must_use]
    pub fn apply(&self, ctx: C) -> C {
        match self {
            Self::Keyed(pairs) => pairs.iter().fold(ctx, |acc, (key, producer)| {
                let value = producer.produce(&acc);
                acc.merge(key, value)
            }),
            Self::Transform(f) => f(ctx),
        }
    }
}

impl<C> RefreshRule<C> {
    /// Keys this rule assigns, in order. Empty for transforms.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let pairs: &[(String, Producer<C>)] = match self {
            Self::Keyed(pairs) => pairs,
            Self::Transform(_) => &[],
        };
        pairs.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        matches!(self, Self::Keyed(_))
    }
}

impl<C> Clone for RefreshRule<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Keyed(pairs) => Self::Keyed(pairs.clone()),
            Self::Transform(f) => Self::Transform(Arc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for RefreshRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyed(pairs) => f
                .debug_tuple("Keyed")
                .field(&pairs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())
                .finish(),
            Self::Transform(_) => write!(f, "Transform(<fn>)"),
        }
    }
}

/// Builder for keyed refresh rules.
pub struct KeyedRuleBuilder<C> {
    pairs: Vec<(String, Producer<C>)>,
}

impl<C: AttributeContext> KeyedRuleBuilder<C> {
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Appends a pair whose producer takes no arguments.
    #[must_use]
    pub fn constant<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.pairs.push((key.into(), Producer::constant(f)));
        self
    }

    /// Appends a pair whose producer reads the context.
    #[must_use]
    pub fn from_context<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&C) -> Value + Send + Sync + 'static,
    {
        self.pairs.push((key.into(), Producer::from_context(f)));
        self
    }

    /// Appends an already built producer.
    #[must_use]
    pub fn producer(mut self, key: impl Into<String>, producer: Producer<C>) -> Self {
        self.pairs.push((key.into(), producer));
        self
    }

    /// Builds the rule.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if no pairs were given, a key is blank, or
    /// a key repeats.
    pub fn build(self) -> Result<RefreshRule<C>, ValidationError> {
        if self.pairs.is_empty() {
            return Err(ValidationError::MissingField {
                field: "refresh_rule".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(self.pairs.len());
        for (key, _) in &self.pairs {
            if key.trim().is_empty() {
                return Err(ValidationError::EmptyRefreshKey);
            }
            if !seen.insert(key.as_str()) {
                return Err(ValidationError::DuplicateRefreshKey { key: key.clone() });
            }
        }

        Ok(RefreshRule::Keyed(self.pairs))
    }
}

impl<C: AttributeContext> Default for KeyedRuleBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
