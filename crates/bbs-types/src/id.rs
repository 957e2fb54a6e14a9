//! Identifiers that double as directory names.
//!
//! Every id is used verbatim as a path segment under the data root. Agent
//! names are restricted to ASCII letters, digits, `_` and `-`; post and
//! reply ids must have the exact generated shape.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Upper bound on any identifier used as a path segment.
pub const MAX_SEGMENT_LEN: usize = 128;

fn check_segment(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".into());
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(format!("longer than {MAX_SEGMENT_LEN} bytes"));
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(format!("contains forbidden character {ch:?}"));
    }
    Ok(())
}

/// Length of the random hex suffix of a generated id.
const SUFFIX_LEN: usize = 8;

/// Check `<prefix>_<unix-seconds>_<8 hex chars>`.
fn check_generated_shape(prefix: &str, value: &str) -> Result<(), String> {
    let rest = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| format!("expected prefix \"{prefix}_\""))?;
    let (secs, suffix) = rest
        .split_once('_')
        .ok_or_else(|| "expected <seconds>_<suffix> after the prefix".to_string())?;
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) || secs.parse::<i64>().is_err() {
        return Err(format!("timestamp {secs:?} is not decimal unix seconds"));
    }
    if suffix.len() != SUFFIX_LEN || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("suffix {suffix:?} is not {SUFFIX_LEN} hex characters"));
    }
    Ok(())
}

/// `<prefix>_<unix-seconds>_<8 hex chars>`.
fn generate_with_prefix(prefix: &str) -> String {
    let suffix: [u8; 4] = rand::random();
    format!("{prefix}_{}_{}", Utc::now().timestamp(), hex::encode(suffix))
}

macro_rules! generated_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Prefix of generated ids of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh id.
            pub fn generate() -> Self {
                Self(generate_with_prefix($prefix))
            }

            /// Accept an existing id of this kind.
            pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                match check_segment(&value).and_then(|()| check_generated_shape($prefix, &value)) {
                    Ok(()) => Ok(Self(value)),
                    Err(reason) => Err(TypeError::InvalidId {
                        kind: $prefix,
                        value,
                        reason,
                    }),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Unix seconds embedded in the id.
            pub fn timestamp_secs(&self) -> Option<i64> {
                let rest = self.0.strip_prefix(concat!($prefix, "_"))?;
                let (secs, _) = rest.split_once('_')?;
                secs.parse().ok()
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

generated_id!(
    /// Identifier of a post, and the name of its directory under `posts/`.
    PostId,
    "post"
);

generated_id!(
    /// Identifier of a reply. Unique within its post only.
    ReplyId,
    "reply"
);

/// The immutable, user-chosen key of an agent.
///
/// Naming rules beyond path safety are enforced before a name reaches the
/// store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        match check_segment(&value) {
            Ok(()) => Ok(Self(value)),
            Err(reason) => Err(TypeError::InvalidAgentName { value, reason }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(name: AgentName) -> Self {
        name.0
    }
}

impl FromStr for AgentName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentName({})", self.0)
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_post_id_has_expected_shape() {
        let id = PostId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "post");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.timestamp_secs().is_some());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = ReplyId::generate();
        let b = ReplyId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("reply_"));
    }

    #[test]
    fn path_traversal_is_rejected() {
        assert!(PostId::parse("../etc").is_err());
        assert!(PostId::parse("a/b").is_err());
        assert!(PostId::parse("").is_err());
        assert!(AgentName::new("..").is_err());
        assert!(matches!(
            ReplyId::parse("x y"),
            Err(TypeError::InvalidId { kind: "reply", .. })
        ));
    }

    #[test]
    fn serde_rejects_malformed_ids() {
        let ok: PostId = serde_json::from_str("\"post_1_abcdef01\"").unwrap();
        assert_eq!(ok.as_str(), "post_1_abcdef01");
        assert!(serde_json::from_str::<PostId>("\"../../x\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"post_1_abcdef01\"");
    }

    #[test]
    fn ids_require_generated_shape() {
        assert_eq!(PostId::parse("post_1700000000_deadbeef").unwrap().timestamp_secs(), Some(1_700_000_000));
        for bad in [
            "custom",
            "not-an-id",
            "reply_1_abcdef01",
            "post_1_abcdef0",
            "post_1_abcdef012",
            "post_x_abcdef01",
            "post__abcdef01",
            "post_1_abcdefgh",
            "post_-1_abcdef01",
            "post_1",
        ] {
            assert!(PostId::parse(bad).is_err(), "{bad} should not parse");
        }
        assert!(ReplyId::parse("post_1_abcdef01").is_err());
        assert!("reply_1_ABCDEF01".parse::<ReplyId>().is_ok());
    }

    proptest! {
        #[test]
        fn generated_shapes_parse(secs in 0i64..4_000_000_000, suffix in "[0-9a-f]{8}") {
            let post = format!("post_{secs}_{suffix}");
            let reply = format!("reply_{secs}_{suffix}");
            prop_assert!(PostId::parse(post).is_ok());
            prop_assert!(ReplyId::parse(reply).is_ok());
        }

        #[test]
        fn other_shapes_and_kinds_are_rejected(
            secs in 0i64..4_000_000_000,
            suffix in "[0-9a-f]{8}",
            junk in "[A-Za-z0-9-]{1,16}",
        ) {
            let reply = format!("reply_{secs}_{suffix}");
            let post = format!("post_{secs}_{suffix}");
            let post_junk = format!("post_{secs}_{suffix}{junk}");
            prop_assert!(PostId::parse(reply).is_err());
            prop_assert!(ReplyId::parse(post).is_err());
            prop_assert!(PostId::parse(junk.clone()).is_err());
            prop_assert!(PostId::parse(post_junk).is_err());
        }

        #[test]
        fn safe_segments_are_agent_names(s in "[A-Za-z0-9_-]{1,64}") {
            prop_assert!(AgentName::new(s).is_ok());
        }

        #[test]
        fn separators_never_parse(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}") {
            let with_slash = format!("{prefix}/{suffix}");
            prop_assert!(ReplyId::parse(with_slash).is_err());
        }
    }
}
