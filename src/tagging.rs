//! Batch tagging: a generated per-instance name tag plus a fixed base set.

use tracing::debug;

use crate::error::ProvisionError;
use crate::gateway::{ComputeGateway, Tag};

/// Name of the tag carrying the generated per-instance batch name.
pub const NAME_TAG_KEY: &str = "Name";

/// A fixed set of tags bound once and applied to every instance.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Builds a tag set from key/value pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tags: pairs
                .into_iter()
                .map(|(key, value)| Tag::new(key, value))
                .collect(),
        }
    }

    /// Appends a tag.
    pub fn push(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    /// Returns the tags as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns an owned copy of the tags.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Tag> {
        self.tags.clone()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Returns the number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }
}

/// Builds the generated name tag for the instance at `ordinal` within a batch.
#[must_use]
pub fn batch_name_tag(batch_name: &str, ordinal: usize) -> Tag {
    Tag::new(NAME_TAG_KEY, format!("{batch_name}-{ordinal}"))
}

/// Applies `Name = "<batch_name>-<i>"` plus the base tag set to each instance,
/// strictly one instance at a time in sequence order.
///
/// The ordinal `i` is the zero-based position of the instance within the
/// control plane's response ordering for the batch; that ordering is not
/// guaranteed stable across retries.
///
/// Not transactional: the first failure aborts the sequence, leaving earlier
/// instances tagged and later ones untouched. Callers requiring atomicity
/// must compensate externally.
///
/// # Errors
///
/// Returns [`ProvisionError::TaggingFailed`] carrying the position and
/// identifier of the instance whose tagging call failed.
pub async fn apply_batch_tags<G: ComputeGateway>(
    gateway: &G,
    base: &TagSet,
    batch_name: &str,
    instance_ids: &[String],
) -> Result<(), ProvisionError> {
    for (index, instance_id) in instance_ids.iter().enumerate() {
        let mut tags = Vec::with_capacity(base.len() + 1);
        tags.push(batch_name_tag(batch_name, index));
        tags.extend(base.to_vec());

        let target = std::slice::from_ref(instance_id);
        gateway
            .create_tags(target, &tags)
            .await
            .map_err(|source| ProvisionError::TaggingFailed {
                index,
                instance_id: instance_id.clone(),
                source,
            })?;
        debug!(instance_id = %instance_id, ordinal = index, "tagged instance");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_tag_uses_zero_based_ordinals() {
        let tag = batch_name_tag("web", 0);
        assert_eq!(tag.key, NAME_TAG_KEY);
        assert_eq!(tag.value, "web-0");
        assert_eq!(batch_name_tag("web", 11).value, "web-11");
    }

    #[test]
    fn tag_set_preserves_insertion_order() {
        let set = TagSet::from_pairs([("team", "data"), ("env", "prod")]);
        let keys: Vec<&str> = set.as_slice().iter().map(|tag| tag.key.as_str()).collect();
        assert_eq!(keys, ["team", "env"]);
    }
}
