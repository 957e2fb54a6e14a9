use serde::{Deserialize, Serialize};

/// Tag list attached to a post.
///
/// [`Tags::new`] trims and lower-cases every value and drops empty or
/// repeated entries. Deserialization keeps stored values as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for value in values {
            let tag = value.as_ref().trim().to_lowercase();
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        Self(normalized)
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// `true` if any of `wanted` is present.
    pub fn intersects<S: AsRef<str>>(&self, wanted: &[S]) -> bool {
        wanted.iter().any(|w| self.contains(w.as_ref()))
    }
}
