use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::{FetchError, Person};
use crate::auth::AuthStatus;
use crate::query::{FilterField, FilterSet, SortRule};
use crate::session::Session;

pub const AUTH_ERROR_MESSAGE: &str = "Error in Auth";
pub const PEOPLE_ERROR_MESSAGE: &str = "Error getting people";
pub const EMPTY_MESSAGE: &str = "No data in the catalogue!";

/// A catalogue read the shell should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleRequest {
    pub request_id: u64,
    pub filters: FilterSet,
    pub sort: SortRule,
}

/// One monotonic id counter shared by every screen, including rebuilt ones.
#[derive(Debug, Clone, Default)]
pub struct RequestIds(Arc<AtomicU64>);

impl RequestIds {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// What became of a fetch result handed back to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A newer request superseded this one; the result was dropped.
    Stale,
    /// The caller should refresh the token; the view refetches once the token changes.
    NeedsReauth,
}

#[derive(Debug, PartialEq, Eq)]
pub enum View<'a> {
    /// Waiting for a token before the first fetch.
    Idle,
    Loading,
    AuthError,
    FetchError,
    Empty,
    List(&'a [Person]),
}

impl View<'_> {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            View::AuthError => Some(AUTH_ERROR_MESSAGE),
            View::FetchError => Some(PEOPLE_ERROR_MESSAGE),
            View::Empty => Some(EMPTY_MESSAGE),
            _ => None,
        }
    }
}

/// Filter, sort and result state behind the catalogue screen.
pub struct Catalogue {
    session: Session,
    draft: FilterSet,
    active: FilterSet,
    sort: SortRule,
    people: Option<Vec<Person>>,
    loading: bool,
    failed: bool,
    pending: Option<u64>,
    request_ids: RequestIds,
    reauth_requested: bool,
}

impl Catalogue {
    /// Restores the persisted sort rule and active filters.
    pub fn new(session: Session, request_ids: RequestIds) -> Self {
        let active = session.request_filters();
        let sort = session.sort_rule();
        Self {
            session,
            draft: active.clone(),
            active,
            sort,
            people: None,
            loading: false,
            failed: false,
            pending: None,
            request_ids,
            reauth_requested: false,
        }
    }

    pub fn mount(&mut self) -> Option<PeopleRequest> {
        self.request()
    }

    pub fn on_token_changed(&mut self) -> Option<PeopleRequest> {
        self.request()
    }

    pub fn refresh(&mut self) -> Option<PeopleRequest> {
        self.request()
    }

    pub fn set_sort(&mut self, sort: SortRule) -> Option<PeopleRequest> {
        if sort == self.sort {
            return None;
        }
        self.sort = sort;
        if let Err(err) = self.session.set_sort_rule(sort) {
            tracing::warn!("persisting sort rule failed: {err:#}");
        }
        self.request()
    }

    /// Edits the draft only; nothing is fetched until [`Catalogue::apply_filters`].
    pub fn set_draft(&mut self, field: FilterField, value: Option<String>) {
        self.draft.set(field, value);
    }

    /// Steps the draft value of `field` through its choices and "unset".
    pub fn cycle_draft(&mut self, field: FilterField, delta: i32) {
        let choices = field.choices();
        let slots = choices.len() as i32 + 1;
        let current = self
            .draft
            .get(field)
            .and_then(|value| choices.iter().position(|(candidate, _)| *candidate == value))
            .map(|idx| idx as i32 + 1)
            .unwrap_or(0);
        let next = (current + delta).rem_euclid(slots);
        let value = if next == 0 {
            None
        } else {
            Some(choices[(next - 1) as usize].0.to_string())
        };
        self.set_draft(field, value);
    }

    /// Promotes the draft to the active set. A no-op while the draft is empty.
    pub fn apply_filters(&mut self) -> Option<PeopleRequest> {
        if !self.can_apply() {
            return None;
        }
        self.active = self.draft.clone();
        self.persist_filters();
        self.request()
    }

    pub fn clear_filters(&mut self) -> Option<PeopleRequest> {
        self.draft.clear();
        self.active.clear();
        self.persist_filters();
        self.request()
    }

    pub fn on_people(
        &mut self,
        request_id: u64,
        result: Result<Vec<Person>, FetchError>,
    ) -> Outcome {
        if self.pending != Some(request_id) {
            tracing::debug!(request_id, "dropping stale catalogue response");
            return Outcome::Stale;
        }
        self.pending = None;
        self.loading = false;

        match result {
            Ok(people) => {
                self.people = Some(people);
                self.failed = false;
                self.reauth_requested = false;
                Outcome::Applied
            }
            Err(err) if err.needs_reauth() && !self.reauth_requested => {
                self.reauth_requested = true;
                Outcome::NeedsReauth
            }
            Err(err) => {
                tracing::warn!("loading people failed: {err}");
                self.failed = true;
                self.reauth_requested = false;
                Outcome::Applied
            }
        }
    }

    pub fn render(&self, auth: AuthStatus) -> View<'_> {
        if auth.loading() || self.loading {
            return View::Loading;
        }
        if auth.failed() {
            return View::AuthError;
        }
        if self.failed {
            return View::FetchError;
        }
        match self.people.as_deref() {
            Some([]) => View::Empty,
            Some(people) => View::List(people),
            None => View::Idle,
        }
    }

    /// The "Filter" control is enabled only with a non-empty draft.
    pub fn can_apply(&self) -> bool {
        !self.draft.is_empty()
    }

    /// The "Clear Filters" control is shown only with active filters.
    pub fn shows_clear(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn draft(&self) -> &FilterSet {
        &self.draft
    }

    pub fn active(&self) -> &FilterSet {
        &self.active
    }

    pub fn sort(&self) -> SortRule {
        self.sort
    }

    pub fn people(&self) -> &[Person] {
        self.people.as_deref().unwrap_or_default()
    }

    fn persist_filters(&self) {
        if let Err(err) = self.session.set_request_filters(&self.active) {
            tracing::warn!("persisting filters failed: {err:#}");
        }
    }

    fn request(&mut self) -> Option<PeopleRequest> {
        if !self.session.has_access_token() {
            return None;
        }
        let request_id = self.request_ids.next();
        self.pending = Some(request_id);
        self.loading = true;
        self.failed = false;
        Some(PeopleRequest {
            request_id,
            filters: self.active.clone(),
            sort: self.sort,
        })
    }
}
