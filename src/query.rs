use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    PlanetId,
    Gender,
    Species,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [
        FilterField::PlanetId,
        FilterField::Gender,
        FilterField::Species,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::PlanetId => "planet_id",
            FilterField::Gender => "gender",
            FilterField::Species => "species",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterField::PlanetId => "Planet",
            FilterField::Gender => "Gender",
            FilterField::Species => "Species",
        }
    }

    /// Values offered by the filter form, as `(value, label)` pairs.
    pub fn choices(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            FilterField::PlanetId => &PLANET_CHOICES,
            FilterField::Gender => &GENDER_CHOICES,
            FilterField::Species => &SPECIES_CHOICES,
        }
    }

    pub fn choice_label(&self, value: &str) -> Option<&'static str> {
        self.choices()
            .iter()
            .find(|(candidate, _)| *candidate == value)
            .map(|(_, label)| *label)
    }
}

const PLANET_CHOICES: [(&str, &str); 4] = [
    ("6515c2ef-38cd-4aef-bac4-b0eafed6c38b", "Tatooine"),
    ("19e367c8-566d-4dad-a694-ae6c1fb866ed", "Stewjon"),
    ("93c226ae-e5cd-4a3b-8c32-f87288958385", "Naboo"),
    ("1459efde-76a9-44e6-ac99-242c66b9ede2", "Coruscant"),
];

const GENDER_CHOICES: [(&str, &str); 3] =
    [("male", "Male"), ("female", "Female"), ("other", "Other")];

const SPECIES_CHOICES: [(&str, &str); 4] = [
    ("human", "Human"),
    ("gungan", "Gungan"),
    ("droid", "Droid"),
    ("yoda", "Yoda"),
];

/// Equality constraints keyed by field. A missing key means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<FilterField, String>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or removes the constraint for `field`; an empty value removes it.
    pub fn set(&mut self, field: FilterField, value: Option<String>) {
        match value {
            Some(value) if !value.trim().is_empty() => {
                self.0.insert(field, value);
            }
            _ => {
                self.0.remove(&field);
            }
        }
    }

    pub fn with(mut self, field: FilterField, value: &str) -> Self {
        self.set(field, Some(value.to_string()));
        self
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a persisted set. Unknown field names are dropped rather than
    /// rejecting the whole set.
    pub fn from_json(raw: &str) -> Result<Self> {
        let loose: BTreeMap<String, String> = serde_json::from_str(raw)?;
        let mut set = FilterSet::new();
        for (key, value) in loose {
            if let Some(field) = FilterField::ALL.iter().find(|f| f.as_str() == key) {
                set.set(*field, Some(value));
            }
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortField {
    #[default]
    Name,
    BirthYear,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::BirthYear => "birth_year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Field and direction pair, encoded as `"<field>-<direction>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SortRule {
    pub field: SortField,
    pub direction: Direction,
}

pub const SORT_OPTIONS: [SortRule; 4] = [
    SortRule {
        field: SortField::Name,
        direction: Direction::Asc,
    },
    SortRule {
        field: SortField::Name,
        direction: Direction::Desc,
    },
    SortRule {
        field: SortField::BirthYear,
        direction: Direction::Asc,
    },
    SortRule {
        field: SortField::BirthYear,
        direction: Direction::Desc,
    },
];

impl SortRule {
    pub fn new(field: SortField, direction: Direction) -> Self {
        Self { field, direction }
    }

    pub fn label(&self) -> &'static str {
        match (self.field, self.direction) {
            (SortField::Name, Direction::Asc) => "Name Asc",
            (SortField::Name, Direction::Desc) => "Name Desc",
            (SortField::BirthYear, Direction::Asc) => "Birth Year Asc",
            (SortField::BirthYear, Direction::Desc) => "Birth Year Desc",
        }
    }

    /// Steps through [`SORT_OPTIONS`], wrapping at either end.
    pub fn cycle(&self, delta: i32) -> SortRule {
        let len = SORT_OPTIONS.len() as i32;
        let current = SORT_OPTIONS
            .iter()
            .position(|rule| rule == self)
            .unwrap_or(0) as i32;
        SORT_OPTIONS[(current + delta).rem_euclid(len) as usize]
    }
}

impl fmt::Display for SortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.field.as_str(), self.direction.as_str())
    }
}

impl FromStr for SortRule {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (field, direction) = raw
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| anyhow!("sort rule {raw:?} is not <field>-<direction>"))?;
        let field = match field {
            "name" => SortField::Name,
            "birth_year" => SortField::BirthYear,
            other => return Err(anyhow!("unsupported sort field {other:?}")),
        };
        let direction = match direction {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            other => return Err(anyhow!("unsupported sort direction {other:?}")),
        };
        Ok(SortRule { field, direction })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: String,
}

impl Condition {
    pub fn eq(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Eq,
            value: value.to_string(),
        }
    }

    pub fn ne(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Ne,
            value: value.to_string(),
        }
    }

    fn encode(&self) -> String {
        json!([{ "field": self.field }, self.op.as_str(), self.value]).to_string()
    }
}

/// Field selection, conditions and ordering for one collection read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub outputs: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order: Option<SortRule>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(mut self, fields: &[&str]) -> Self {
        self.outputs = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn filters(mut self, filters: &FilterSet) -> Self {
        self.conditions.extend(
            filters
                .iter()
                .map(|(field, value)| Condition::eq(field.as_str(), value)),
        );
        self
    }

    pub fn order(mut self, sort: SortRule) -> Self {
        self.order = Some(sort);
        self
    }

    /// Query pairs in wire order: `outputs`, every `cond`, then `order`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.conditions.len() + 2);
        if !self.outputs.is_empty() {
            pairs.push(("outputs".to_string(), json!(self.outputs).to_string()));
        }
        for condition in &self.conditions {
            pairs.push(("cond".to_string(), condition.encode()));
        }
        if let Some(sort) = self.order {
            pairs.push(("order".to_string(), encode_order(sort)));
        }
        pairs
    }
}

/// Builds the filter and sort part of a catalogue query.
pub fn build(filters: &FilterSet, sort: Option<SortRule>) -> RecordQuery {
    RecordQuery::new()
        .filters(filters)
        .order(sort.unwrap_or_default())
}

fn encode_order(sort: SortRule) -> String {
    json!({
        "direction": sort.direction.as_str(),
        "fields": [sort.field.as_str()],
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn decoded_conditions(pairs: &[(String, String)]) -> Vec<(String, String, String)> {
        pairs
            .iter()
            .filter(|(key, _)| key == "cond")
            .map(|(_, raw)| {
                let value: Value = serde_json::from_str(raw).unwrap();
                (
                    value[0]["field"].as_str().unwrap().to_string(),
                    value[1].as_str().unwrap().to_string(),
                    value[2].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn one_equality_condition_per_filter() {
        let filters = FilterSet::new()
            .with(FilterField::Gender, "male")
            .with(FilterField::Species, "human")
            .with(FilterField::PlanetId, "6515c2ef-38cd-4aef-bac4-b0eafed6c38b");

        let pairs = build(&filters, None).to_pairs();
        let conditions = decoded_conditions(&pairs);

        assert_eq!(conditions.len(), filters.len());
        for (field, value) in filters.iter() {
            assert!(conditions.contains(&(
                field.as_str().to_string(),
                "=".to_string(),
                value.to_string()
            )));
        }
    }

    #[test]
    fn empty_filters_produce_no_conditions() {
        let pairs = build(&FilterSet::new(), None).to_pairs();
        assert!(decoded_conditions(&pairs).is_empty());
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn default_sort_is_name_ascending() {
        let pairs = build(&FilterSet::new(), None).to_pairs();
        let (_, order) = pairs.iter().find(|(key, _)| key == "order").unwrap();
        let order: Value = serde_json::from_str(order).unwrap();
        assert_eq!(order["direction"], "asc");
        assert_eq!(order["fields"], serde_json::json!(["name"]));
        assert_eq!(SortRule::default().to_string(), "name-asc");
    }

    #[test]
    fn sort_rule_round_trips_through_text() {
        for rule in SORT_OPTIONS {
            assert_eq!(rule.to_string().parse::<SortRule>().unwrap(), rule);
        }
        assert!("height-asc".parse::<SortRule>().is_err());
        assert!("name-up".parse::<SortRule>().is_err());
        assert!("name".parse::<SortRule>().is_err());
    }

    #[test]
    fn sort_cycle_wraps() {
        let last = SORT_OPTIONS[SORT_OPTIONS.len() - 1];
        assert_eq!(last.cycle(1), SORT_OPTIONS[0]);
        assert_eq!(SORT_OPTIONS[0].cycle(-1), last);
    }

    #[test]
    fn empty_value_removes_filter() {
        let mut filters = FilterSet::new().with(FilterField::Gender, "female");
        filters.set(FilterField::Gender, Some(String::new()));
        assert!(filters.is_empty());
    }

    #[test]
    fn persisted_filters_drop_unknown_fields() {
        let set = FilterSet::from_json(r#"{"gender":"male","height":"180"}"#).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(FilterField::Gender), Some("male"));
        assert_eq!(set.to_json().unwrap(), r#"{"gender":"male"}"#);
    }

    #[test]
    fn inequality_condition_encodes_operator() {
        let query = RecordQuery::new()
            .filter(Condition::ne("id", "abc"))
            .outputs(&["id", "name"]);
        let pairs = query.to_pairs();
        assert_eq!(pairs[0], ("outputs".into(), r#"["id","name"]"#.into()));
        assert_eq!(pairs[1], ("cond".into(), r#"[{"field":"id"},"!=","abc"]"#.into()));
    }
}
