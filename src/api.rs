use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::query::RecordQuery;
use crate::session::Session;

pub const PEOPLE: &str = "people";
pub const PLANETS: &str = "planets";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub birth_year: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub planet_id: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A person whose home planet has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDetail {
    pub person: Person,
    pub planet_name: String,
}

impl PersonDetail {
    pub fn merge(person: Person, planet: Planet) -> Self {
        Self {
            person,
            planet_name: planet.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanetMate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

impl From<Person> for PlanetMate {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            name: person.name,
            image_url: person.image_url,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The access token was rejected and a refresh token is available.
    #[error("access token rejected")]
    NeedsReauth,
    #[error("no access token held")]
    NoAccessToken,
    #[error("{entity}: request failed with status {status}")]
    Status { entity: String, status: StatusCode },
    #[error("{entity}: no matching record")]
    NotFound { entity: String },
    #[error("{entity}: {source:#}")]
    Request {
        entity: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    pub fn needs_reauth(&self) -> bool {
        matches!(self, FetchError::NeedsReauth)
    }

    fn request(entity: &str, source: impl Into<anyhow::Error>) -> Self {
        FetchError::Request {
            entity: entity.to_string(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

/// Authenticated reads against the `ds/` collections.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    session: Session,
}

impl Client {
    pub fn new(session: Session, config: ClientConfig) -> Result<Self> {
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .context("api: build http client")?,
        };
        Ok(Self {
            http,
            user_agent: config.user_agent,
            base_url: config.base_url,
            session,
        })
    }

    /// Full request target for a collection read.
    pub fn url(&self, entity: &str, query: &RecordQuery) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("ds/{entity}"))
            .with_context(|| format!("api: build url for {entity}"))?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in &pairs {
                serializer.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub fn fetch_list<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &RecordQuery,
    ) -> Result<Vec<T>, FetchError> {
        self.fetch(entity, query)
    }

    /// First record of the response; an empty response is `NotFound`.
    pub fn fetch_one<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &RecordQuery,
    ) -> Result<T, FetchError> {
        self.fetch::<T>(entity, query)?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NotFound {
                entity: entity.to_string(),
            })
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &RecordQuery,
    ) -> Result<Vec<T>, FetchError> {
        let token = self
            .session
            .access_token()
            .map_err(|err| FetchError::request(entity, err))?
            .ok_or(FetchError::NoAccessToken)?;
        let url = self
            .url(entity, query)
            .map_err(|err| FetchError::request(entity, err))?;
        tracing::debug!(%url, "fetching {entity}");

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .map_err(|err| FetchError::request(entity, err))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            if self.session.has_refresh_token() {
                tracing::info!("{entity}: access token rejected");
                return Err(FetchError::NeedsReauth);
            }
            tracing::warn!("{entity}: unauthorized and no refresh token held");
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                entity: entity.to_string(),
                status,
            });
        }

        // Some deployments answer an empty collection with `null`.
        let records: Option<Vec<T>> = resp
            .json()
            .map_err(|err| FetchError::request(entity, err))?;
        Ok(records.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Condition, FilterField, FilterSet, SortRule};
    use crate::storage::MemoryStore;
    use crate::test_server::TestServer;
    use std::sync::Arc;

    fn client(base_url: &str) -> (Session, Client) {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session.set_access_token("access-1").unwrap();
        let client = Client::new(
            session.clone(),
            ClientConfig {
                base_url: Url::parse(base_url).unwrap(),
                user_agent: "sw-catalogue-test".into(),
                timeout: Duration::from_secs(5),
                http_client: None,
            },
        )
        .unwrap();
        (session, client)
    }

    #[test]
    fn list_read_sends_bearer_and_query() {
        let server = TestServer::start(vec![(
            200,
            r#"[{"id":"1","name":"Luke Skywalker","gender":"male"}]"#,
        )]);
        let (_, client) = client(&server.base_url);
        let query = RecordQuery::new()
            .outputs(&["id", "name", "gender"])
            .filters(&FilterSet::new().with(FilterField::Gender, "male"))
            .order(SortRule::default());

        let people: Vec<Person> = client.fetch_list(PEOPLE, &query).unwrap();

        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "Luke Skywalker");
        assert_eq!(people[0].planet_id, "");
        let request = server.next_request();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/ds/people");
        assert_eq!(request.authorization.as_deref(), Some("Bearer access-1"));
        assert_eq!(
            request.query_values("outputs"),
            vec![r#"["id","name","gender"]"#]
        );
        assert_eq!(
            request.query_values("cond"),
            vec![r#"[{"field":"gender"},"=","male"]"#]
        );
        assert_eq!(
            request.query_values("order"),
            vec![r#"{"direction":"asc","fields":["name"]}"#]
        );
    }

    #[test]
    fn unauthorized_with_refresh_token_needs_reauth() {
        let server = TestServer::start(vec![(401, "{}")]);
        let (session, client) = client(&server.base_url);
        session.set_refresh_token("refresh-1").unwrap();

        let err = client
            .fetch_list::<Person>(PEOPLE, &RecordQuery::new())
            .unwrap_err();
        assert!(err.needs_reauth());
    }

    #[test]
    fn unauthorized_without_refresh_token_is_plain_error() {
        let server = TestServer::start(vec![(401, "{}")]);
        let (_, client) = client(&server.base_url);

        let err = client
            .fetch_list::<Person>(PEOPLE, &RecordQuery::new())
            .unwrap_err();
        assert!(!err.needs_reauth());
        assert!(matches!(
            err,
            FetchError::Status {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
    }

    #[test]
    fn server_error_is_plain_error() {
        let server = TestServer::start(vec![(500, "oops")]);
        let (session, client) = client(&server.base_url);
        session.set_refresh_token("refresh-1").unwrap();

        let err = client
            .fetch_list::<Person>(PEOPLE, &RecordQuery::new())
            .unwrap_err();
        assert!(!err.needs_reauth());
    }

    #[test]
    fn single_read_takes_first_record() {
        let server = TestServer::start(vec![
            (200, r#"[{"id":"p1","name":"Tatooine"},{"id":"p2"}]"#),
            (200, "[]"),
        ]);
        let (_, client) = client(&server.base_url);
        let query = RecordQuery::new().filter(Condition::eq("id", "p1"));

        let planet: Planet = client.fetch_one(PLANETS, &query).unwrap();
        assert_eq!(planet.name, "Tatooine");

        let missing = client.fetch_one::<Planet>(PLANETS, &query).unwrap_err();
        assert!(matches!(missing, FetchError::NotFound { .. }));
    }

    #[test]
    fn no_access_token_skips_request() {
        let (session, client) = client("http://127.0.0.1:9/");
        session.clear_credentials().unwrap();
        let err = client
            .fetch_list::<Person>(PEOPLE, &RecordQuery::new())
            .unwrap_err();
        assert!(matches!(err, FetchError::NoAccessToken));
    }

    #[test]
    fn null_body_is_empty_list() {
        let server = TestServer::start(vec![(200, "null")]);
        let (_, client) = client(&server.base_url);
        let people: Vec<Person> = client.fetch_list(PEOPLE, &RecordQuery::new()).unwrap();
        assert!(people.is_empty());
    }
}
