//! The set of event names this application subscribes to.
//!
//! Subscriptions are replaced as a whole; there is no incremental add or
//! remove towards the framework. Local edits through
//! [`SubscriptionSet::names_mut`] only take effect once the set is pushed
//! again.

use std::collections::BTreeSet;

use crate::error::{AppFwError, Result};

/// Ordered set of subscribed event names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    names: BTreeSet<String>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting empty event names.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let set = Self { names };
        set.validate()?;
        Ok(set)
    }

    /// Check that no entry is empty.
    pub fn validate(&self) -> Result<()> {
        if self.names.iter().any(|name| name.trim().is_empty()) {
            return Err(AppFwError::invalid_argument(
                "subscriptions",
                "Event name cannot be empty",
            ));
        }
        Ok(())
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Local, in-place access. Changes are not sent until the next update.
    pub fn names_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.names
    }

    /// Names in the order they are sent to the framework.
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_elements() {
        let set = SubscriptionSet::from_names(["lightOn", "lightOff"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("lightOn"));
        assert!(set.contains("lightOff"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let set = SubscriptionSet::from_names(["a", "b", "a"]).unwrap();
        assert_eq!(set.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = SubscriptionSet::from_names(["ok", ""]).unwrap_err();
        assert!(err.is_invalid_argument());

        let err = SubscriptionSet::from_names(["   "]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_empty_set_is_valid() {
        let set = SubscriptionSet::from_names(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_in_place_edits_are_revalidated() {
        let mut set = SubscriptionSet::from_names(["a"]).unwrap();
        set.names_mut().insert(String::new());
        assert!(set.validate().is_err());
    }
}
