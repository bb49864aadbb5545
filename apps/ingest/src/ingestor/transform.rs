use crate::errors::IngestError;
use crate::models::listing::Skill;
use crate::models::{FlatJobRecord, RawListing};

/// Flattens one decoded listing into its table row. Pure, no I/O.
///
/// Fails only when a column declared `NOT NULL` (or the primary key) has no
/// source value.
pub fn transform(raw: &RawListing) -> Result<FlatJobRecord, IngestError> {
    let id = raw.id.ok_or_else(|| missing("id"))?;
    let job = raw.job.as_ref().ok_or_else(|| missing("job"))?;
    let job_name = job.name.clone().ok_or_else(|| missing("job.name"))?;
    let job_slug = job.slug.clone().ok_or_else(|| missing("job.slug"))?;
    let slug = raw.slug.clone().ok_or_else(|| missing("slug"))?;
    let title = raw.title.clone().ok_or_else(|| missing("title"))?;

    let location = raw.location.as_ref();

    Ok(FlatJobRecord {
        id,
        created_at: raw.created_at,
        job: job_name,
        job_slug,
        slug,
        title,
        skills: skill_names(&raw.skills)?,
        soft_skills: skill_names(&raw.soft_skills)?,
        company_name: raw.company.as_ref().and_then(|c| c.name.clone()),
        city: location.and_then(|l| l.short_label.clone()),
        long: location.and_then(|l| l.longitude),
        lat: location.and_then(|l| l.latitude),
        duration: compose_duration(raw),
        remote: raw.remote_mode.clone(),
        max_tjm: raw.max_daily_salary,
        min_tjm: raw.min_daily_salary,
        experience: raw.experience_level.clone(),
        description: raw.description.clone(),
        candidate_profile: raw.candidate_profile.clone(),
        company_description: raw.company_description.clone(),
    })
}

fn missing(field: &str) -> IngestError {
    IngestError::format(format!("listing is missing required field `{field}`"))
}

fn skill_names(skills: &[Skill]) -> Result<String, IngestError> {
    let names: Vec<&str> = skills.iter().map(|s| s.name.as_str()).collect();
    Ok(serde_json::to_string(&names)?)
}

/// `"<value> <period>"` when both halves are present. The period is kept
/// verbatim; an empty or whitespace-only period counts as absent.
fn compose_duration(raw: &RawListing) -> Option<String> {
    let value = raw.duration_value.as_ref()?;
    let period = raw.duration_period.as_deref()?;
    if period.trim().is_empty() {
        return None;
    }
    Some(format!("{value} {period}"))
}
