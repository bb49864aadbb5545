use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::errors::IngestError;

/// One job posting as returned by the catalog API.
///
/// Required fields (`id`, `job`, `slug`, `title`) are still optional here so a
/// listing missing one of them decodes and is rejected by the transform step
/// with a field-specific message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub job: Option<JobCategory>,
    pub slug: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<Skill>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub soft_skills: Vec<Skill>,
    pub company: Option<Company>,
    pub location: Option<Location>,
    pub duration_value: Option<Number>,
    pub duration_period: Option<String>,
    pub remote_mode: Option<String>,
    pub min_daily_salary: Option<i32>,
    pub max_daily_salary: Option<i32>,
    pub experience_level: Option<String>,
    pub description: Option<String>,
    pub candidate_profile: Option<String>,
    pub company_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Skill {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub short_label: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl RawListing {
    /// Decodes one listing object from a page body.
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        serde_json::from_value(value)
            .map_err(|e| IngestError::format(format!("malformed listing: {e}")))
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
