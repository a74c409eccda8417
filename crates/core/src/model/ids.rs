use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a slug identifier from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl ParseIdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

/// Slugs are non-empty runs of lowercase ASCII letters, digits and single dashes.
fn is_slug(raw: &str) -> bool {
    !raw.is_empty()
        && !raw.starts_with('-')
        && !raw.ends_with('-')
        && !raw.contains("--")
        && raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

macro_rules! slug_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a slug.
            ///
            /// # Errors
            ///
            /// Returns `ParseIdError` if `raw` is not a lowercase slug.
            pub fn new(raw: impl Into<String>) -> Result<Self, ParseIdError> {
                let raw = raw.into();
                if is_slug(&raw) {
                    Ok(Self(raw))
                } else {
                    Err(ParseIdError {
                        kind: stringify!($name),
                        raw,
                    })
                }
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
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
                f.pad(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

slug_id!(
    /// Top-level course category, e.g. `economie`.
    SubjectKey
);
slug_id!(
    /// Chapter slug, unique within its subject.
    ChapterId
);
slug_id!(
    /// Quiz slug, unique within its subject.
    QuizId
);

impl SubjectKey {
    #[must_use]
    pub fn economie() -> Self {
        Self("economie".to_owned())
    }

    #[must_use]
    pub fn sociologie() -> Self {
        Self("sociologie".to_owned())
    }

    #[must_use]
    pub fn science_politique() -> Self {
        Self("science-politique".to_owned())
    }

    /// True for the subjects the course ships with.
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(
            self.0.as_str(),
            "economie" | "sociologie" | "science-politique"
        )
    }
}
