use std::sync::Arc;

use anyhow::Result;

use crate::query::{FilterSet, SortRule};
use crate::storage::{KeyValueStore, Scope};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const SORT_RULE_KEY: &str = "sortRule";
pub const REQUEST_FILTERS_KEY: &str = "requestFilters";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Typed view over the persisted client state.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            access_token: self.non_empty(Scope::Durable, ACCESS_TOKEN_KEY)?,
            refresh_token: self.non_empty(Scope::Durable, REFRESH_TOKEN_KEY)?,
        })
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.non_empty(Scope::Durable, ACCESS_TOKEN_KEY)
    }

    pub fn has_access_token(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    pub fn has_refresh_token(&self) -> bool {
        matches!(
            self.non_empty(Scope::Durable, REFRESH_TOKEN_KEY),
            Ok(Some(_))
        )
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.store.set(Scope::Durable, ACCESS_TOKEN_KEY, token)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.store.set(Scope::Durable, REFRESH_TOKEN_KEY, token)
    }

    pub fn clear_credentials(&self) -> Result<()> {
        self.store.remove(Scope::Durable, ACCESS_TOKEN_KEY)?;
        self.store.remove(Scope::Durable, REFRESH_TOKEN_KEY)
    }

    /// Stored sort rule, or the default when missing or unreadable.
    pub fn sort_rule(&self) -> SortRule {
        match self.store.get(Scope::Volatile, SORT_RULE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%raw, "ignoring stored sort rule: {err}");
                SortRule::default()
            }),
            Ok(None) => SortRule::default(),
            Err(err) => {
                tracing::warn!("reading sort rule failed: {err:#}");
                SortRule::default()
            }
        }
    }

    pub fn set_sort_rule(&self, sort: SortRule) -> Result<()> {
        self.store.set(Scope::Volatile, SORT_RULE_KEY, &sort.to_string())
    }

    /// Stored active filters, or an empty set when missing or unreadable.
    pub fn request_filters(&self) -> FilterSet {
        match self.store.get(Scope::Volatile, REQUEST_FILTERS_KEY) {
            Ok(Some(raw)) => FilterSet::from_json(&raw).unwrap_or_else(|err| {
                tracing::warn!(%raw, "ignoring stored filters: {err}");
                FilterSet::new()
            }),
            Ok(None) => FilterSet::new(),
            Err(err) => {
                tracing::warn!("reading filters failed: {err:#}");
                FilterSet::new()
            }
        }
    }

    pub fn set_request_filters(&self, filters: &FilterSet) -> Result<()> {
        self.store.set(Scope::Volatile, REQUEST_FILTERS_KEY, &filters.to_json()?)
    }

    fn non_empty(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get(scope, key)?
            .filter(|value| !value.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, FilterField, SortField};
    use crate::storage::MemoryStore;

    fn session() -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Session::new(store))
    }

    #[test]
    fn defaults_when_empty() {
        let (_, session) = session();
        assert_eq!(session.credentials().unwrap(), Credentials::default());
        assert_eq!(session.sort_rule(), SortRule::default());
        assert!(session.request_filters().is_empty());
    }

    #[test]
    fn persists_under_wire_keys() {
        let (store, session) = session();
        session.set_access_token("access").unwrap();
        session
            .set_sort_rule(SortRule::new(SortField::BirthYear, Direction::Desc))
            .unwrap();
        session
            .set_request_filters(&FilterSet::new().with(FilterField::Gender, "male"))
            .unwrap();

        assert_eq!(
            store.get(Scope::Durable, "accessToken").unwrap().as_deref(),
            Some("access")
        );
        assert_eq!(
            store.get(Scope::Volatile, "sortRule").unwrap().as_deref(),
            Some("birth_year-desc")
        );
        assert_eq!(
            store
                .get(Scope::Volatile, "requestFilters")
                .unwrap()
                .as_deref(),
            Some(r#"{"gender":"male"}"#)
        );
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let (store, session) = session();
        store.set(Scope::Volatile, SORT_RULE_KEY, "sideways").unwrap();
        store
            .set(Scope::Volatile, REQUEST_FILTERS_KEY, "not json")
            .unwrap();
        assert_eq!(session.sort_rule(), SortRule::default());
        assert!(session.request_filters().is_empty());
    }

    #[test]
    fn clear_removes_both_tokens() {
        let (_, session) = session();
        session.set_access_token("a").unwrap();
        session.set_refresh_token("r").unwrap();
        assert!(session.has_refresh_token());
        session.clear_credentials().unwrap();
        assert!(!session.has_access_token());
        assert!(!session.has_refresh_token());
    }
}
