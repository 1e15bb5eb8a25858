use std::cmp::Ordering;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::api::{self, FetchError, Person, Planet, PlanetMate};
use crate::query::{self, Condition, Direction, FilterSet, RecordQuery, SortField, SortRule};

pub const CATALOGUE_OUTPUTS: [&str; 6] =
    ["id", "name", "species", "gender", "birth_year", "image_url"];
pub const PLANET_MATE_OUTPUTS: [&str; 3] = ["id", "name", "image_url"];

pub trait PeopleService: Send + Sync {
    fn list_people(&self, filters: &FilterSet, sort: SortRule) -> Result<Vec<Person>, FetchError>;
    fn person(&self, id: &str) -> Result<Person, FetchError>;
    fn planet(&self, id: &str) -> Result<Planet, FetchError>;
    /// Everyone on `planet_id` except `exclude_id`.
    fn planet_mates(
        &self,
        planet_id: &str,
        exclude_id: &str,
    ) -> Result<Vec<PlanetMate>, FetchError>;
}

pub struct HttpPeopleService {
    client: Arc<api::Client>,
}

impl HttpPeopleService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PeopleService for HttpPeopleService {
    fn list_people(
        &self,
        filters: &FilterSet,
        sort: SortRule,
    ) -> Result<Vec<Person>, FetchError> {
        let query = query::build(filters, Some(sort)).outputs(&CATALOGUE_OUTPUTS);
        self.client.fetch_list(api::PEOPLE, &query)
    }

    fn person(&self, id: &str) -> Result<Person, FetchError> {
        let query = RecordQuery::new().filter(Condition::eq("id", id));
        self.client.fetch_one(api::PEOPLE, &query)
    }

    fn planet(&self, id: &str) -> Result<Planet, FetchError> {
        let query = RecordQuery::new().filter(Condition::eq("id", id));
        self.client.fetch_one(api::PLANETS, &query)
    }

    fn planet_mates(
        &self,
        planet_id: &str,
        exclude_id: &str,
    ) -> Result<Vec<PlanetMate>, FetchError> {
        let query = RecordQuery::new()
            .filter(Condition::ne("id", exclude_id))
            .filter(Condition::eq("planet_id", planet_id))
            .outputs(&PLANET_MATE_OUTPUTS);
        self.client.fetch_list(api::PEOPLE, &query)
    }
}

/// In-memory catalogue that honours filters and sort. Backs `--offline` and tests.
pub struct MockPeopleService {
    people: Vec<Person>,
    planets: Vec<Planet>,
}

impl Default for MockPeopleService {
    fn default() -> Self {
        Self::new(SAMPLE_PEOPLE.clone(), SAMPLE_PLANETS.clone())
    }
}

impl MockPeopleService {
    pub fn new(people: Vec<Person>, planets: Vec<Planet>) -> Self {
        Self { people, planets }
    }
}

impl PeopleService for MockPeopleService {
    fn list_people(
        &self,
        filters: &FilterSet,
        sort: SortRule,
    ) -> Result<Vec<Person>, FetchError> {
        let mut people: Vec<Person> = self
            .people
            .iter()
            .filter(|person| {
                filters
                    .iter()
                    .all(|(field, value)| field_value(person, field.as_str()) == value)
            })
            .map(|person| Person {
                planet_id: String::new(),
                info: String::new(),
                ..person.clone()
            })
            .collect();
        people.sort_by(|a, b| compare(a, b, sort));
        Ok(people)
    }

    fn person(&self, id: &str) -> Result<Person, FetchError> {
        self.people
            .iter()
            .find(|person| person.id == id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                entity: api::PEOPLE.to_string(),
            })
    }

    fn planet(&self, id: &str) -> Result<Planet, FetchError> {
        self.planets
            .iter()
            .find(|planet| planet.id == id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                entity: api::PLANETS.to_string(),
            })
    }

    fn planet_mates(
        &self,
        planet_id: &str,
        exclude_id: &str,
    ) -> Result<Vec<PlanetMate>, FetchError> {
        Ok(self
            .people
            .iter()
            .filter(|person| person.planet_id == planet_id && person.id != exclude_id)
            .cloned()
            .map(PlanetMate::from)
            .collect())
    }
}

fn field_value<'a>(person: &'a Person, field: &str) -> &'a str {
    match field {
        "planet_id" => &person.planet_id,
        "gender" => &person.gender,
        "species" => &person.species,
        _ => "",
    }
}

fn compare(a: &Person, b: &Person, sort: SortRule) -> Ordering {
    let ordering = match sort.field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::BirthYear => a.birth_year.cmp(&b.birth_year),
    }
    .then_with(|| a.id.cmp(&b.id));
    match sort.direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

const TATOOINE: &str = "6515c2ef-38cd-4aef-bac4-b0eafed6c38b";
const STEWJON: &str = "19e367c8-566d-4dad-a694-ae6c1fb866ed";
const NABOO: &str = "93c226ae-e5cd-4a3b-8c32-f87288958385";
const CORUSCANT: &str = "1459efde-76a9-44e6-ac99-242c66b9ede2";

static SAMPLE_PLANETS: Lazy<Vec<Planet>> = Lazy::new(|| {
    [
        (TATOOINE, "Tatooine"),
        (STEWJON, "Stewjon"),
        (NABOO, "Naboo"),
        (CORUSCANT, "Coruscant"),
    ]
    .into_iter()
    .map(|(id, name)| Planet {
        id: id.into(),
        name: name.into(),
    })
    .collect()
});

static SAMPLE_PEOPLE: Lazy<Vec<Person>> = Lazy::new(|| {
    [
        (
            "luke",
            "Luke Skywalker",
            "human",
            "male",
            "19BBY",
            TATOOINE,
            "Farm boy from Tatooine who joined the Rebel Alliance.",
        ),
        (
            "leia",
            "Leia Organa",
            "human",
            "female",
            "19BBY",
            CORUSCANT,
            "Princess of Alderaan and leader in the Rebel Alliance.",
        ),
        (
            "anakin",
            "Anakin Skywalker",
            "human",
            "male",
            "41.9BBY",
            TATOOINE,
            "Jedi Knight who became Darth Vader.",
        ),
        ("r2d2", "R2-D2", "droid", "other", "33BBY", NABOO, "Astromech droid built on Naboo."),
        (
            "c3po",
            "C-3PO",
            "droid",
            "other",
            "112BBY",
            TATOOINE,
            "Protocol droid assembled by Anakin Skywalker.",
        ),
        (
            "obiwan",
            "Obi-Wan Kenobi",
            "human",
            "male",
            "57BBY",
            STEWJON,
            "Jedi Master who trained Anakin and Luke.",
        ),
        (
            "padme",
            "Padmé Amidala",
            "human",
            "female",
            "46BBY",
            NABOO,
            "Queen and later Senator of Naboo.",
        ),
        (
            "jarjar",
            "Jar Jar Binks",
            "gungan",
            "male",
            "52BBY",
            NABOO,
            "Gungan outcast turned Representative.",
        ),
        ("yoda", "Yoda", "yoda", "male", "896BBY", CORUSCANT, "Grand Master of the Jedi Order."),
    ]
    .into_iter()
    .map(|(id, name, species, gender, birth_year, planet_id, info)| Person {
        id: id.into(),
        name: name.into(),
        species: species.into(),
        gender: gender.into(),
        birth_year: birth_year.into(),
        image_url: String::new(),
        planet_id: planet_id.into(),
        info: info.into(),
    })
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterField;
    use crate::session::Session;
    use crate::storage::MemoryStore;
    use crate::test_server::TestServer;
    use std::time::Duration;

    #[test]
    fn mock_applies_every_filter() {
        let service = MockPeopleService::default();
        let filters = FilterSet::new()
            .with(FilterField::Gender, "male")
            .with(FilterField::Species, "human");
        let people = service.list_people(&filters, SortRule::default()).unwrap();
        assert!(!people.is_empty());
        assert!(people
            .iter()
            .all(|p| p.gender == "male" && p.species == "human"));
    }

    #[test]
    fn mock_sorts_descending() {
        let service = MockPeopleService::default();
        let sort = SortRule::new(SortField::Name, Direction::Desc);
        let names: Vec<String> = service
            .list_people(&FilterSet::new(), sort)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        let mut expected = names.clone();
        expected.sort();
        expected.reverse();
        assert_eq!(names, expected);
    }

    fn http_service(server: &TestServer) -> HttpPeopleService {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session.set_access_token("token").unwrap();
        let client = api::Client::new(
            session,
            api::ClientConfig {
                base_url: url::Url::parse(&server.base_url).unwrap(),
                user_agent: "sw-catalogue-test".into(),
                timeout: Duration::from_secs(5),
                http_client: None,
            },
        )
        .unwrap();
        HttpPeopleService::new(Arc::new(client))
    }

    #[test]
    fn http_list_people_sends_outputs_conditions_and_order() {
        let server = TestServer::start(vec![(200, r#"[{"id":"luke","name":"Luke"}]"#)]);
        let service = http_service(&server);
        let filters = FilterSet::new().with(FilterField::Gender, "male");
        let sort = SortRule::new(SortField::Name, Direction::Desc);

        let people = service.list_people(&filters, sort).unwrap();

        assert_eq!(people[0].id, "luke");
        let request = server.next_request();
        assert_eq!(
            request.query_values("outputs"),
            vec![r#"["id","name","species","gender","birth_year","image_url"]"#]
        );
        assert_eq!(
            request.query_values("cond"),
            vec![r#"[{"field":"gender"},"=","male"]"#]
        );
        assert_eq!(
            request.query_values("order"),
            vec![r#"{"direction":"desc","fields":["name"]}"#]
        );
    }

    #[test]
    fn http_planet_mates_query_excludes_person() {
        let server = TestServer::start(vec![(200, r#"[{"id":"anakin","name":"Anakin"}]"#)]);
        let service = http_service(&server);

        let mates = service.planet_mates(TATOOINE, "luke").unwrap();

        assert_eq!(mates[0].id, "anakin");
        let request = server.next_request();
        assert_eq!(
            request.query_values("cond"),
            vec![
                r#"[{"field":"id"},"!=","luke"]"#.to_string(),
                format!(r#"[{{"field":"planet_id"}},"=","{TATOOINE}"]"#),
            ]
        );
        assert_eq!(
            request.query_values("outputs"),
            vec![r#"["id","name","image_url"]"#]
        );
    }

    #[test]
    fn mock_planet_mates_exclude_self() {
        let service = MockPeopleService::default();
        let mates = service.planet_mates(TATOOINE, "luke").unwrap();
        assert!(!mates.is_empty());
        assert!(mates.iter().all(|m| m.id != "luke"));
    }
}
