//! Resource reconciler trait definition

use crate::error::Result;
use crate::tags::{IgnoreTags, Tags};
use crate::validation::Validate;
use async_trait::async_trait;
use serde::Serialize;

/// Field-level difference between two desired states of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    /// Mutable field groups that changed; each is updated by its own call
    pub groups: Vec<&'static str>,

    /// Immutable fields that changed; the entity has to be recreated
    pub replace: Vec<&'static str>,

    /// Whether the tag map changed
    pub tags: bool,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `group` as changed when `old != new`
    pub fn group<T: PartialEq + ?Sized>(&mut self, group: &'static str, old: &T, new: &T) {
        if old != new {
            self.groups.push(group);
        }
    }

    /// Record immutable `field` as changed when `old != new`
    pub fn force_new<T: PartialEq + ?Sized>(&mut self, field: &'static str, old: &T, new: &T) {
        if old != new {
            self.replace.push(field);
        }
    }

    pub fn compare_tags(&mut self, old: &Tags, new: &Tags) {
        self.tags = old != new;
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| *g == group)
    }

    pub fn requires_replacement(&self) -> bool {
        !self.replace.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.replace.is_empty() && !self.tags
    }
}

/// Typed desired-state configuration of one entity
pub trait DesiredState: Validate + Clone + Send + Sync {
    fn tags(&self) -> &Tags;

    /// Difference from `self` (previous desired state) to `new`
    fn diff(&self, new: &Self) -> Diff;

    /// [`diff`](Self::diff) with tag keys matched by `ignore` left out of the
    /// tag comparison
    fn diff_ignoring(&self, new: &Self, ignore: &IgnoreTags) -> Diff {
        let mut diff = self.diff(new);
        diff.compare_tags(&ignore.filter(self.tags()), &ignore.filter(new.tags()));
        diff
    }
}

/// Resource reconciler abstraction trait
///
/// Every managed entity type (input security group, input, channel, ...)
/// implements this trait against an injected remote API client. Each
/// operation touches only the entity named by its ID.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Configuration supplied by the caller
    type Desired: DesiredState;

    /// Full record read back from the remote service, computed fields included
    type Observed: Send + Sync;

    /// Returns the entity type name (e.g., "input", "channel")
    fn resource_type(&self) -> &'static str;

    /// Human-readable name used in error messages
    fn display_name(&self) -> &'static str {
        self.resource_type()
    }

    /// Validate `desired`, create the entity, then read it back
    async fn create(&self, desired: &Self::Desired) -> Result<Self::Observed>;

    /// Fetch the current remote state
    ///
    /// Fails with [`CloudError::NotFound`](crate::CloudError::NotFound) when
    /// the entity is gone.
    async fn read(&self, id: &str) -> Result<Self::Observed>;

    /// Apply the changes between `old` and `new`, one call per changed field
    /// group, then read the entity back
    async fn update(
        &self,
        id: &str,
        old: &Self::Desired,
        new: &Self::Desired,
    ) -> Result<Self::Observed>;

    /// Delete the entity and wait until the service confirms it is gone
    ///
    /// Deleting an entity that no longer exists succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Adopt an existing entity by ID
    async fn import(&self, id: &str) -> Result<Self::Observed> {
        self.read(id).await
    }
}
