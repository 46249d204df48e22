//! Query selectors.
//!
//! A [`Query`] tells a data source which records an operation targets. The
//! built-in variants are dispatched on by the in-memory and caching data
//! sources; anything else travels as [`Query::Custom`] and is handed to the
//! concrete data source untouched.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Selector for data source operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Query {
    /// No selector at all.
    #[default]
    Void,
    /// A single string key.
    Key(String),
    /// An identifier. Behaves as a key query keyed by the identifier.
    Id(String),
    /// A list of identifiers.
    Ids(Vec<String>),
    /// Every object the data source holds.
    AllObjects,
    /// Offset/limit pagination.
    Pagination { offset: usize, limit: usize },
    /// Application-defined selector, passed through untouched.
    Custom(CustomQuery),
}

impl Query {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn id(id: impl ToString) -> Self {
        Self::Id(id.to_string())
    }

    pub fn ids<I, K>(ids: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: ToString,
    {
        Self::Ids(ids.into_iter().map(|k| k.to_string()).collect())
    }

    pub fn custom<Q>(name: impl Into<String>, payload: Q) -> Self
    where
        Q: Any + Send + Sync,
    {
        Self::Custom(CustomQuery::new(name, payload))
    }

    /// The key of a key-like query (`Key` or `Id`).
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) | Self::Id(key) => Some(key),
            _ => None,
        }
    }

    /// Short variant name, used in log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Key(_) => "Key",
            Self::Id(_) => "Id",
            Self::Ids(_) => "Ids",
            Self::AllObjects => "AllObjects",
            Self::Pagination { .. } => "Pagination",
            Self::Custom(_) => "Custom",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "Void"),
            Self::Key(key) => write!(f, "Key({key})"),
            Self::Id(id) => write!(f, "Id({id})"),
            Self::Ids(ids) => write!(f, "Ids({})", ids.join(", ")),
            Self::AllObjects => write!(f, "AllObjects"),
            Self::Pagination { offset, limit } => {
                write!(f, "Pagination(offset: {offset}, limit: {limit})")
            }
            Self::Custom(custom) => write!(f, "Custom({})", custom.name()),
        }
    }
}

/// Named, type-erased payload for application-defined queries.
///
/// Two custom queries are equal when they share a name and point at the same
/// payload allocation.
#[derive(Clone)]
pub struct CustomQuery {
    name: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl CustomQuery {
    pub fn new<Q>(name: impl Into<String>, payload: Q) -> Self
    where
        Q: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            payload: Arc::new(payload),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload<Q: Any>(&self) -> Option<&Q> {
        self.payload.downcast_ref::<Q>()
    }
}

impl fmt::Debug for CustomQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomQuery")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomQuery {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.payload, &other.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ByEmail(String);

    #[test]
    fn test_key_like_queries() {
        assert_eq!(Query::key("user").as_key(), Some("user"));
        assert_eq!(Query::id(42).as_key(), Some("42"));
        assert_eq!(Query::AllObjects.as_key(), None);
        assert_eq!(Query::ids(["a", "b"]).as_key(), None);
    }

    #[test]
    fn test_ids_constructor_stringifies() {
        assert_eq!(
            Query::ids([1, 2, 3]),
            Query::Ids(vec!["1".into(), "2".into(), "3".into()])
        );
    }

    #[test]
    fn test_custom_query_payload_roundtrip() {
        let query = Query::custom("by-email", ByEmail("a@b.c".to_string()));
        match &query {
            Query::Custom(custom) => {
                assert_eq!(custom.name(), "by-email");
                assert_eq!(custom.payload::<ByEmail>(), Some(&ByEmail("a@b.c".into())));
                assert!(custom.payload::<String>().is_none());
            }
            other => panic!("unexpected query: {other:?}"),
        }

        // Clones share the payload and stay equal
        assert_eq!(query.clone(), query);
        assert_ne!(query, Query::custom("by-email", ByEmail("a@b.c".into())));
    }

    #[test]
    fn test_display() {
        assert_eq!(Query::key("k").to_string(), "Key(k)");
        assert_eq!(Query::ids(["x", "y"]).to_string(), "Ids(x, y)");
        assert_eq!(Query::default().to_string(), "Void");
        assert_eq!(Query::custom("search", 1u8).to_string(), "Custom(search)");
    }
}
