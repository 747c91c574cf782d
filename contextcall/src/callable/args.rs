//! Positional argument bundles passed to callables.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An ordered bundle of positional arguments.
///
/// Arguments are JSON values so that any foreign callable kind can map them
/// onto its own object model. A host that can hand its own objects straight
/// to its callables attaches them as a native payload instead; the payload
/// is opaque to this crate and is never serialized.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallArgs {
    values: Vec<serde_json::Value>,
    #[serde(skip)]
    native: Option<Arc<dyn Any + Send + Sync>>,
}

impl CallArgs {
    /// Creates an empty argument bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Attaches a host-native payload, replacing any previous one.
    #[must_use]
    pub fn with_native<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.native = Some(Arc::new(payload));
        self
    }

    /// Returns the native payload if one of type `T` is attached.
    #[must_use]
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_deref()?.downcast_ref()
    }

    /// Returns true if a native payload is attached.
    #[must_use]
    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    /// Returns the argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&serde_json::Value> {
        self.values.get(index)
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.native.is_none()
    }

    /// Iterates over the arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, serde_json::Value> {
        self.values.iter()
    }

    /// Returns the arguments as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[serde_json::Value] {
        &self.values
    }
}

impl PartialEq for CallArgs {
    fn eq(&self, other: &Self) -> bool {
        let same_native = match (&self.native, &other.native) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_native && self.values == other.values
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("values", &self.values)
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl From<Vec<serde_json::Value>> for CallArgs {
    fn from(values: Vec<serde_json::Value>) -> Self {
        Self {
            values,
            native: None,
        }
    }
}

impl FromIterator<serde_json::Value> for CallArgs {
    fn from_iter<I: IntoIterator<Item = serde_json::Value>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a CallArgs {
    type Item = &'a serde_json::Value;
    type IntoIter = std::slice::Iter<'a, serde_json::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_keeps_order() {
        let args = CallArgs::new().with_arg(1).with_arg("two").with_arg(json!({"three": 3}));
        assert_eq!(args.len(), 3);
        assert_eq!(args.get(0), Some(&json!(1)));
        assert_eq!(args.get(1), Some(&json!("two")));
        assert_eq!(args.get(2), Some(&json!({"three": 3})));
        assert!(args.get(3).is_none());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let args: CallArgs = vec![json!(true), json!(null)].into();
        assert_eq!(serde_json::to_value(&args).unwrap(), json!([true, null]));
    }

    #[test]
    fn test_empty() {
        let args = CallArgs::new();
        assert!(args.is_empty());
        assert_eq!(args.iter().count(), 0);
    }

    #[derive(Debug, PartialEq)]
    struct HostTuple(Vec<&'static str>);

    #[test]
    fn test_native_payload() {
        let args = CallArgs::new().with_native(HostTuple(vec!["actor", "node"]));
        assert!(args.has_native());
        assert!(!args.is_empty());
        assert_eq!(args.len(), 0);
        assert_eq!(args.native::<HostTuple>(), Some(&HostTuple(vec!["actor", "node"])));
        assert!(args.native::<String>().is_none());

        assert_eq!(args.clone(), args);
        assert_ne!(args, CallArgs::new().with_native(HostTuple(vec!["actor", "node"])));
        assert_eq!(serde_json::to_value(&args).unwrap(), json!([]));
    }
}
