use crate::api::{FetchError, PersonDetail, PlanetMate};
use crate::auth::AuthStatus;
use crate::catalogue::{Outcome, RequestIds, AUTH_ERROR_MESSAGE, PEOPLE_ERROR_MESSAGE};
use crate::data::PeopleService;
use crate::session::Session;

pub const MATES_ERROR_MESSAGE: &str = "Error getting people on the same planet!";

/// Reads a person, then their planet, and merges the two.
pub fn load_person(service: &dyn PeopleService, id: &str) -> Result<PersonDetail, FetchError> {
    let person = service.person(id)?;
    let planet = service.planet(&person.planet_id)?;
    Ok(PersonDetail::merge(person, planet))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRequest {
    pub request_id: u64,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatesRequest {
    pub request_id: u64,
    pub planet_id: String,
    pub exclude_id: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MatesView<'a> {
    Loading,
    Error,
    /// Stage two has not produced anything yet.
    Hidden,
    List {
        planet_name: &'a str,
        mates: &'a [PlanetMate],
    },
}

impl MatesView<'_> {
    pub fn heading(&self) -> Option<String> {
        match self {
            MatesView::List { planet_name, .. } => Some(format!("Other people from {planet_name}")),
            MatesView::Error => Some(MATES_ERROR_MESSAGE.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DetailView<'a> {
    Idle,
    Loading,
    AuthError,
    FetchError,
    Person {
        detail: &'a PersonDetail,
        mates: MatesView<'a>,
    },
}

impl DetailView<'_> {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            DetailView::AuthError => Some(AUTH_ERROR_MESSAGE),
            DetailView::FetchError => Some(PEOPLE_ERROR_MESSAGE),
            _ => None,
        }
    }
}

/// Two-stage state behind the person screen.
pub struct Detail {
    session: Session,
    id: String,
    person: Option<PersonDetail>,
    person_loading: bool,
    person_failed: bool,
    mates: Option<Vec<PlanetMate>>,
    mates_loading: bool,
    mates_failed: bool,
    pending_person: Option<u64>,
    pending_mates: Option<u64>,
    request_ids: RequestIds,
    /// Set from the first `NeedsReauth` until the person-then-mates chain ends.
    reauth_requested: bool,
}

impl Detail {
    pub fn new(session: Session, id: impl Into<String>, request_ids: RequestIds) -> Self {
        Self {
            session,
            id: id.into(),
            person: None,
            person_loading: false,
            person_failed: false,
            mates: None,
            mates_loading: false,
            mates_failed: false,
            pending_person: None,
            pending_mates: None,
            request_ids,
            reauth_requested: false,
        }
    }

    pub fn mount(&mut self) -> Option<PersonRequest> {
        self.start_chain()
    }

    /// Re-runs the chain after a token change without forgetting a pending re-auth.
    pub fn on_token_changed(&mut self) -> Option<PersonRequest> {
        self.request_person()
    }

    pub fn refresh(&mut self) -> Option<PersonRequest> {
        self.start_chain()
    }

    /// Switches to another person, abandoning both stages of the previous one.
    pub fn set_id(&mut self, id: impl Into<String>) -> Option<PersonRequest> {
        let id = id.into();
        if id == self.id {
            return None;
        }
        self.id = id;
        self.person = None;
        self.person_failed = false;
        self.reset_mates();
        self.start_chain()
    }

    pub fn on_person(
        &mut self,
        request_id: u64,
        result: Result<PersonDetail, FetchError>,
    ) -> Outcome {
        if self.pending_person != Some(request_id) {
            tracing::debug!(request_id, "dropping stale person response");
            return Outcome::Stale;
        }
        self.pending_person = None;
        self.person_loading = false;

        match result {
            Ok(detail) => {
                self.person = Some(detail);
                self.person_failed = false;
                self.reset_mates();
                Outcome::Applied
            }
            Err(err) => self.fail(err, Stage::Person),
        }
    }

    /// Starts stage two once a merged person is held.
    pub fn request_mates(&mut self) -> Option<MatesRequest> {
        let person = self.person.as_ref()?;
        let planet_id = person.person.planet_id.clone();
        if planet_id.is_empty() {
            self.reauth_requested = false;
            return None;
        }
        let exclude_id = person.person.id.clone();
        let request_id = self.request_ids.next();
        self.pending_mates = Some(request_id);
        self.mates_loading = true;
        self.mates_failed = false;
        Some(MatesRequest {
            request_id,
            planet_id,
            exclude_id,
        })
    }

    pub fn on_mates(
        &mut self,
        request_id: u64,
        result: Result<Vec<PlanetMate>, FetchError>,
    ) -> Outcome {
        if self.pending_mates != Some(request_id) {
            tracing::debug!(request_id, "dropping stale planet-mates response");
            return Outcome::Stale;
        }
        self.pending_mates = None;
        self.mates_loading = false;

        match result {
            Ok(mut mates) => {
                // the shown person never appears among their own planet-mates
                mates.retain(|mate| mate.id != self.id);
                self.mates = Some(mates);
                self.mates_failed = false;
                self.reauth_requested = false;
                Outcome::Applied
            }
            Err(err) => self.fail(err, Stage::Mates),
        }
    }

    pub fn render(&self, auth: AuthStatus) -> DetailView<'_> {
        if auth.loading() || self.person_loading {
            return DetailView::Loading;
        }
        if auth.failed() {
            return DetailView::AuthError;
        }
        if self.person_failed {
            return DetailView::FetchError;
        }
        let Some(detail) = self.person.as_ref() else {
            return DetailView::Idle;
        };
        let mates = if self.mates_loading {
            MatesView::Loading
        } else if self.mates_failed {
            MatesView::Error
        } else {
            match self.mates.as_deref() {
                Some(mates) => MatesView::List {
                    planet_name: &detail.planet_name,
                    mates,
                },
                None => MatesView::Hidden,
            }
        };
        DetailView::Person { detail, mates }
    }

    pub fn person(&self) -> Option<&PersonDetail> {
        self.person.as_ref()
    }

    pub fn mates(&self) -> &[PlanetMate] {
        self.mates.as_deref().unwrap_or_default()
    }

    fn fail(&mut self, err: FetchError, stage: Stage) -> Outcome {
        if err.needs_reauth() && !self.reauth_requested {
            self.reauth_requested = true;
            return Outcome::NeedsReauth;
        }
        self.reauth_requested = false;
        match stage {
            Stage::Person => {
                tracing::warn!(id = %self.id, "loading person failed: {err}");
                self.person_failed = true;
            }
            Stage::Mates => {
                tracing::warn!(id = %self.id, "loading planet-mates failed: {err}");
                self.mates_failed = true;
            }
        }
        Outcome::Applied
    }

    fn reset_mates(&mut self) {
        self.mates = None;
        self.mates_loading = false;
        self.mates_failed = false;
        self.pending_mates = None;
    }

    fn start_chain(&mut self) -> Option<PersonRequest> {
        self.reauth_requested = false;
        self.request_person()
    }

    fn request_person(&mut self) -> Option<PersonRequest> {
        if !self.session.has_access_token() {
            return None;
        }
        let request_id = self.request_ids.next();
        self.pending_person = Some(request_id);
        self.person_loading = true;
        self.person_failed = false;
        Some(PersonRequest {
            request_id,
            id: self.id.clone(),
        })
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Person,
    Mates,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockPeopleService;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn session_with_token() -> Session {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session.set_access_token("token").unwrap();
        session.set_refresh_token("refresh").unwrap();
        session
    }

    /// Runs both stages against `service`.
    fn load(detail: &mut Detail, service: &MockPeopleService, request: PersonRequest) {
        let result = load_person(service, &request.id);
        assert_eq!(detail.on_person(request.request_id, result), Outcome::Applied);
        let mates = detail.request_mates().unwrap();
        let result = service.planet_mates(&mates.planet_id, &mates.exclude_id);
        assert_eq!(detail.on_mates(mates.request_id, result), Outcome::Applied);
    }

    #[test]
    fn merges_person_with_planet_name() {
        let service = MockPeopleService::default();
        let detail = load_person(&service, "luke").unwrap();
        assert_eq!(detail.person.name, "Luke Skywalker");
        assert_eq!(detail.planet_name, "Tatooine");
    }

    #[test]
    fn mates_share_planet_and_exclude_person() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let request = detail.mount().unwrap();
        load(&mut detail, &service, request);

        let planet_id = detail.person().unwrap().person.planet_id.clone();
        assert!(!detail.mates().is_empty());
        for mate in detail.mates() {
            assert_ne!(mate.id, "luke");
            assert_eq!(service.person(&mate.id).unwrap().planet_id, planet_id);
        }
        match detail.render(AuthStatus::default()) {
            DetailView::Person { mates, .. } => {
                assert_eq!(mates.heading().as_deref(), Some("Other people from Tatooine"));
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn mates_wait_for_person() {
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        assert!(detail.request_mates().is_none());
        detail.mount();
        assert!(detail.request_mates().is_none());
        assert_eq!(detail.render(AuthStatus::default()), DetailView::Loading);
    }

    #[test]
    fn server_echo_of_self_is_filtered() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let request = detail.mount().unwrap();
        detail.on_person(request.request_id, load_person(&service, "luke"));
        let mates = detail.request_mates().unwrap();
        let echoed = vec![
            PlanetMate {
                id: "luke".into(),
                name: "Luke Skywalker".into(),
                image_url: String::new(),
            },
            PlanetMate {
                id: "c3po".into(),
                name: "C-3PO".into(),
                image_url: String::new(),
            },
        ];
        detail.on_mates(mates.request_id, Ok(echoed));
        let ids: Vec<_> = detail.mates().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c3po"]);
    }

    #[test]
    fn changing_id_restarts_both_stages() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let first = detail.mount().unwrap();
        load(&mut detail, &service, first.clone());

        assert!(detail.set_id("luke").is_none());
        let second = detail.set_id("padme").unwrap();
        assert_eq!(second.id, "padme");
        assert!(detail.mates().is_empty());
        assert_eq!(
            detail.on_person(first.request_id, load_person(&service, "luke")),
            Outcome::Stale
        );

        load(&mut detail, &service, second);
        assert_eq!(detail.person().unwrap().planet_name, "Naboo");
        assert!(detail.mates().iter().all(|m| m.id != "padme"));
    }

    #[test]
    fn person_failure_renders_people_error() {
        let mut detail = Detail::new(session_with_token(), "nobody", RequestIds::default());
        let request = detail.mount().unwrap();
        let service = MockPeopleService::default();
        detail.on_person(request.request_id, load_person(&service, "nobody"));
        assert_eq!(
            detail.render(AuthStatus::default()).message(),
            Some("Error getting people")
        );
    }

    #[test]
    fn mates_failure_keeps_person_visible() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let request = detail.mount().unwrap();
        detail.on_person(request.request_id, load_person(&service, "luke"));
        let mates = detail.request_mates().unwrap();
        detail.on_mates(
            mates.request_id,
            Err(FetchError::NotFound {
                entity: "people".into(),
            }),
        );
        match detail.render(AuthStatus::default()) {
            DetailView::Person { mates, .. } => {
                assert_eq!(mates, MatesView::Error);
                assert_eq!(
                    mates.heading().as_deref(),
                    Some("Error getting people on the same planet!")
                );
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn reauth_requested_once() {
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let request = detail.mount().unwrap();
        assert_eq!(
            detail.on_person(request.request_id, Err(FetchError::NeedsReauth)),
            Outcome::NeedsReauth
        );
        let retry = detail.on_token_changed().unwrap();
        assert_eq!(
            detail.on_person(retry.request_id, Err(FetchError::NeedsReauth)),
            Outcome::Applied
        );
        assert_eq!(detail.render(AuthStatus::default()), DetailView::FetchError);
    }

    #[test]
    fn mates_reauth_survives_person_reload() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let mut request = detail.mount().unwrap();
        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let person = load_person(&service, &request.id);
            assert_eq!(detail.on_person(request.request_id, person), Outcome::Applied);
            let mates = detail.request_mates().unwrap();
            outcomes.push(detail.on_mates(mates.request_id, Err(FetchError::NeedsReauth)));
            match detail.on_token_changed() {
                Some(next) => request = next,
                None => break,
            }
        }

        assert_eq!(
            outcomes,
            vec![Outcome::NeedsReauth, Outcome::Applied, Outcome::Applied]
        );
    }

    #[test]
    fn mates_error_after_second_reauth_is_shown() {
        let service = MockPeopleService::default();
        let mut detail = Detail::new(session_with_token(), "luke", RequestIds::default());
        let request = detail.mount().unwrap();
        detail.on_person(request.request_id, load_person(&service, "luke"));
        let mates = detail.request_mates().unwrap();
        assert_eq!(
            detail.on_mates(mates.request_id, Err(FetchError::NeedsReauth)),
            Outcome::NeedsReauth
        );

        let retry = detail.on_token_changed().unwrap();
        detail.on_person(retry.request_id, load_person(&service, "luke"));
        let mates = detail.request_mates().unwrap();
        assert_eq!(
            detail.on_mates(mates.request_id, Err(FetchError::NeedsReauth)),
            Outcome::Applied
        );
        match detail.render(AuthStatus::default()) {
            DetailView::Person { mates, .. } => assert_eq!(mates, MatesView::Error),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn waits_for_token() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        let mut detail = Detail::new(session, "luke", RequestIds::default());
        assert!(detail.mount().is_none());
        assert_eq!(detail.render(AuthStatus::default()), DetailView::Idle);
    }
}
