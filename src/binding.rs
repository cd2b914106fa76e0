//! Attribute bindings.
//!
//! A binding bundles everything a watcher needs: how to subscribe to the
//! event source, which events matter, and how to refresh the attribute.

use std::fmt;

use crate::context::AttributeContext;
use crate::error::{SubscribeError, ValidationError};
use crate::filter::Filter;
use crate::refresh::RefreshRule;
use crate::watcher::EventSink;

/// Subscription starter, called once on the watcher thread with the
/// watcher's event address.
pub type SubscribeFn = Box<dyn FnOnce(EventSink) -> Result<(), SubscribeError> + Send>;

/// A named rule for keeping one piece of owner state fresh.
///
/// # Examples
///
/// ```
/// use livebind::{Assigns, AttributeBinding, Filter, RefreshRule, Value};
///
/// let binding = AttributeBinding::<Assigns>::builder()
///     .subscribe(|_sink| Ok(()))
///     .filter(Filter::sequence([Filter::literal("tick"), Filter::Wildcard]))
///     .refresh(RefreshRule::constant("count", || Value::Int(5))?)
///     .build()?;
///
/// assert_eq!(binding.name(), "count");
/// # Ok::<(), livebind::ValidationError>(())
/// ```
pub struct AttributeBinding<C> {
    name: String,
    subscribe: SubscribeFn,
    filter: Filter,
    rule: RefreshRule<C>,
}

impl<C: AttributeContext> AttributeBinding<C> {
    /// Creates a new binding builder.
    #[must_use]
    pub fn builder() -> AttributeBindingBuilder<C> {
        AttributeBindingBuilder::new()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    #[must_use]
    pub const fn rule(&self) -> &RefreshRule<C> {
        &self.rule
    }

    pub(crate) fn into_parts(self) -> (String, SubscribeFn, Filter, RefreshRule<C>) {
        (self.name, self.subscribe, self.filter, self.rule)
    }
}

impl<C> fmt::Debug for AttributeBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeBinding")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AttributeBinding`].
pub struct AttributeBindingBuilder<C> {
    name: Option<String>,
    subscribe: Option<SubscribeFn>,
    filter: Filter,
    rule: Option<RefreshRule<C>>,
}

impl<C: AttributeContext> AttributeBindingBuilder<C> {
    /// Creates a new builder. The filter defaults to `Filter::Wildcard`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            subscribe: None,
            filter: Filter::Wildcard,
            rule: None,
        }
    }

    /// Sets the attribute name. Optional for keyed rules, where it defaults
    /// to the keys joined with `+`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn subscribe<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EventSink) -> Result<(), SubscribeError> + Send + 'static,
    {
        self.subscribe = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn refresh(mut self, rule: RefreshRule<C>) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Builds the binding.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the subscribe function or refresh rule
    /// is missing, or the name is blank or missing for a transform rule.
    pub fn build(self) -> Result<AttributeBinding<C>, ValidationError> {
        let subscribe = self.subscribe.ok_or(ValidationError::MissingField {
            field: "subscribe".to_string(),
        })?;
        let rule = self.rule.ok_or(ValidationError::MissingField {
            field: "refresh_rule".to_string(),
        })?;

        let name = match self.name {
            Some(name) => name,
            None if rule.is_keyed() => rule.keys().collect::<Vec<_>>().join("+"),
            None => {
                return Err(ValidationError::MissingField {
                    field: "name".to_string(),
                })
            }
        };
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyAttributeName);
        }

        Ok(AttributeBinding {
            name,
            subscribe,
            filter: self.filter,
            rule,
        })
    }
}

impl<C: AttributeContext> Default for AttributeBindingBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Assigns;
    use crate::value::Value;

    fn keyed() -> RefreshRule<Assigns> {
        RefreshRule::keyed()
            .constant("posts", || Value::list([1, 2]))
            .constant("post_count", || Value::Int(2))
            .build()
            .unwrap()
    }

    #[test]
    fn keyed_binding_defaults_name_from_keys() {
        let binding = AttributeBinding::builder()
            .subscribe(|_| Ok(()))
            .refresh(keyed())
            .build()
            .unwrap();
        assert_eq!(binding.name(), "posts+post_count");
        assert!(matches!(binding.filter(), Filter::Wildcard));
    }

    #[test]
    fn transform_binding_requires_name() {
        let result = AttributeBinding::<Assigns>::builder()
            .subscribe(|_| Ok(()))
            .refresh(RefreshRule::transform(|ctx| ctx))
            .build();
        assert!(matches!(result, Err(ValidationError::MissingField { field }) if field == "name"));
    }

    #[test]
    fn missing_subscribe_is_rejected() {
        let result = AttributeBinding::builder().refresh(keyed()).build();
        assert!(matches!(result, Err(ValidationError::MissingField { field }) if field == "subscribe"));
    }

    #[test]
    fn missing_rule_is_rejected() {
        let result = AttributeBinding::<Assigns>::builder()
            .name("feed")
            .subscribe(|_| Ok(()))
            .build();
        assert!(matches!(result, Err(ValidationError::MissingField { field }) if field == "refresh_rule"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let result = AttributeBinding::builder()
            .name("   ")
            .subscribe(|_| Ok(()))
            .refresh(keyed())
            .build();
        assert!(matches!(result, Err(ValidationError::EmptyAttributeName)));
    }
}
