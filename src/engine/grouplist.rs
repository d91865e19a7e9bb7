//! Group filters selecting which actions and rules make up a profile.

use std::collections::BTreeSet;

/// A set of group tags.
///
/// Every action and rule carries a group tag. When a profile is derived from the universal
/// action tree, only the members whose tag is in the profile's `ActionGroupList` survive
/// the clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionGroupList {
    groups: BTreeSet<String>,
}

impl ActionGroupList {
    /// Creates an empty list. Nothing survives cloning against it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list from tags.
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `group` is enabled.
    #[must_use]
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Enables `group`. Returns `false` if it was already present.
    pub fn insert(&mut self, group: impl Into<String>) -> bool {
        self.groups.insert(group.into())
    }

    /// Disables `group`. Returns `false` if it was not present.
    pub fn remove(&mut self, group: &str) -> bool {
        self.groups.remove(group)
    }

    /// The enabled tags, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Number of enabled tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if no tag is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
