use chrono::{DateTime, Utc};

/// Flat row written to the `freelance_jobs` table. Write-once per `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatJobRecord {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub job: String,
    pub job_slug: String,
    pub slug: String,
    pub title: String,
    /// JSON array of skill names, `[]` when the listing has none.
    pub skills: String,
    pub soft_skills: String,
    pub company_name: Option<String>,
    pub city: Option<String>,
    pub long: Option<f64>,
    pub lat: Option<f64>,
    /// `"<value> <period>"`, only when both parts are present.
    pub duration: Option<String>,
    pub remote: Option<String>,
    pub max_tjm: Option<i32>,
    pub min_tjm: Option<i32>,
    pub experience: Option<String>,
    pub description: Option<String>,
    pub candidate_profile: Option<String>,
    pub company_description: Option<String>,
}
