//! Strongly-typed identifiers for the claims workflow
//!
//! Claim sessions and closures are both keyed by time-ordered UUIDs. The
//! newtypes keep them apart and give each a readable prefix (`CLS-...`,
//! `CLO-...`) that is also accepted back when parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new time-ordered identifier (v7)
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// One claim walked through the workflow, from image upload to closure.
    /// Every persisted key of the claim lives under this session's namespace.
    ClaimSessionId,
    "CLS"
);

define_id!(
    /// Reference handed out when an approved claim proceeds to closure
    ClosureId,
    "CLO"
);

impl ClaimSessionId {
    /// Key prefix under which all persisted fields of this claim are stored
    pub fn storage_namespace(&self) -> String {
        format!("claim/{}/", self.0)
    }
}
