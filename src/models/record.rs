use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
    Freelance,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
            EmploymentType::Freelance => "freelance",
        }
    }

    /// Best-effort parse of free-text employment type labels
    /// ("Full Time", "part_time", "Temporary contract", ...).
    /// Matches whole words only, so "International" is not an internship.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let lower = raw.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if has_any(&words, INTERNSHIP_WORDS) {
            Some(EmploymentType::Internship)
        } else if has_any(&words, FREELANCE_WORDS) || has_pair(&words, "self", "employed") {
            Some(EmploymentType::Freelance)
        } else if has_any(&words, CONTRACT_WORDS) {
            Some(EmploymentType::Contract)
        } else if has_any(&words, &["parttime"]) || has_pair(&words, "part", "time") {
            Some(EmploymentType::PartTime)
        } else if has_any(&words, FULL_TIME_WORDS) || has_pair(&words, "full", "time") {
            Some(EmploymentType::FullTime)
        } else {
            None
        }
    }
}

const INTERNSHIP_WORDS: &[&str] = &["intern", "interns", "internship", "internships", "trainee"];
const FREELANCE_WORDS: &[&str] = &["freelance", "freelancer"];
const CONTRACT_WORDS: &[&str] = &["contract", "contractor", "temporary", "temp"];
const FULL_TIME_WORDS: &[&str] = &["fulltime", "permanent"];

fn has_any(words: &[&str], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.iter().any(|c| c == w))
}

fn has_pair(words: &[&str], first: &str, second: &str) -> bool {
    words.windows(2).any(|w| w[0] == first && w[1] == second)
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One job posting as scraped from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedRecord {
    /// Source-scoped identifier. Not globally unique; see [`crate::normalize::dedup_key`].
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: String,
    pub company_name: String,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub category: Option<String>,
    pub source: String,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedRecord {
    /// Midpoint of the advertised salary range, or whichever bound exists.
    pub fn salary_midpoint(&self) -> Option<f64> {
        match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) => Some((min + max) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal record for tests; callers override what they care about.
    pub fn record(title: &str, company: &str, location: &str, source: &str) -> ScrapedRecord {
        ScrapedRecord {
            id: format!("{source}-{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            description: None,
            location: location.to_string(),
            company_name: company.to_string(),
            salary_min: None,
            salary_max: None,
            currency: None,
            employment_type: EmploymentType::FullTime,
            remote: false,
            category: None,
            source: source.to_string(),
            source_url: format!("https://{source}.example/jobs"),
            scraped_at: Utc::now(),
        }
    }
}
