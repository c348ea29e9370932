use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for parsing an id from a string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse {kind} from string")]
pub struct ParseIdError {
    kind: &'static str,
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Learner account identifier.
    UserId
);
numeric_id!(
    /// Curriculum topic identifier.
    TopicId
);
numeric_id!(
    /// Identifier of a question in a test pool.
    QuestionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_id_display_and_debug() {
        let id = TopicId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "TopicId(42)");
    }

    #[test]
    fn user_id_from_str() {
        let id: UserId = " 123 ".parse().unwrap();
        assert_eq!(id, UserId::new(123));
    }

    #[test]
    fn question_id_from_str_invalid() {
        let err = "q-9".parse::<QuestionId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse QuestionId from string");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&TopicId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
