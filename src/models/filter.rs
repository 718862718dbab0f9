use serde::Deserialize;

use crate::models::record::{EmploymentType, ScrapedRecord};
use crate::regions;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    pub source: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub employment_type: Option<String>,
    pub remote: Option<bool>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Read from this snapshot instead of the newest one.
    pub snapshot: Option<String>,
}

impl JobFilters {
    pub fn per_page(&self) -> usize {
        self.per_page.unwrap_or(50).clamp(1, 100)
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Records matching every provided filter, in snapshot order.
    /// Fails on an unrecognized employment type.
    pub fn apply<'a>(&self, records: &'a [ScrapedRecord]) -> Result<Vec<&'a ScrapedRecord>, String> {
        let employment_type = match self.employment_type.as_deref() {
            Some(raw) => Some(
                EmploymentType::parse_loose(raw)
                    .ok_or_else(|| format!("Unknown employment type '{raw}'"))?,
            ),
            None => None,
        };
        let search = self.search.as_deref().map(str::to_lowercase);

        Ok(records
            .iter()
            .filter(|r| {
                self.source
                    .as_deref()
                    .is_none_or(|s| r.source.eq_ignore_ascii_case(s))
            })
            .filter(|r| {
                self.country.as_deref().is_none_or(|c| {
                    regions::country_bucket(&r.location).eq_ignore_ascii_case(c)
                })
            })
            .filter(|r| employment_type.is_none_or(|t| r.employment_type == t))
            .filter(|r| self.remote.is_none_or(|remote| r.remote == remote))
            .filter(|r| {
                search.as_deref().is_none_or(|needle| {
                    r.title.to_lowercase().contains(needle)
                        || r.company_name.to_lowercase().contains(needle)
                        || r
                            .description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                })
            })
            .collect())
    }
}
