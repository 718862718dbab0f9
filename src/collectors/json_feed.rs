use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::collectors::{JobCollector, SourceConfig};
use crate::error::FetchError;
use crate::models::record::{EmploymentType, ScrapedRecord};
use crate::normalize::parse_salary;

/// Where to find the listing array and its fields in a JSON API response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonFeedSettings {
    /// JSON pointer to the listing array; empty means the document root.
    #[serde(default)]
    pub items_pointer: String,
    #[serde(default)]
    pub fields: FieldMap,
}

/// Field paths inside one listing. A path is either a JSON pointer
/// (`/employer/name`) or a dotted key path (`employer.name`).
/// Unknown keys are rejected so a misspelled field fails at load time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FieldMap {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Free-text salary, used when the numeric bounds are absent.
    pub salary: String,
    pub salary_min: String,
    pub salary_max: String,
    pub currency: String,
    pub employment_type: String,
    pub remote: String,
    pub category: String,
    pub url: String,
    pub description: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            id: "id".into(),
            title: "title".into(),
            company: "company".into(),
            location: "location".into(),
            salary: "salary".into(),
            salary_min: "salaryMin".into(),
            salary_max: "salaryMax".into(),
            currency: "currency".into(),
            employment_type: "type".into(),
            remote: "remote".into(),
            category: "category".into(),
            url: "url".into(),
            description: "description".into(),
        }
    }
}

pub struct JsonFeedCollector {
    source: SourceConfig,
    settings: JsonFeedSettings,
    client: reqwest::Client,
}

impl JsonFeedCollector {
    pub fn new(source: SourceConfig, settings: JsonFeedSettings, client: reqwest::Client) -> Self {
        Self {
            source,
            settings,
            client,
        }
    }

    fn fetch_error(&self, message: impl Into<String>) -> FetchError {
        FetchError::Parse {
            source_name: self.source.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl JobCollector for JsonFeedCollector {
    fn name(&self) -> &str {
        &self.source.name
    }

    async fn collect(&self) -> Result<Vec<ScrapedRecord>, FetchError> {
        let url = self.source.request_url();
        tracing::debug!("Fetching JSON feed '{}' from {url}", self.source.name);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| FetchError::Request {
                source_name: self.source.name.clone(),
                error,
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                source_name: self.source.name.clone(),
                status: resp.status(),
            });
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| self.fetch_error(e.to_string()))?;

        parse_results(&self.source, &self.settings, &data, Utc::now())
            .map_err(|message| self.fetch_error(message))
    }
}

/// Map the listing array of a feed response onto records. Listings without
/// a title are skipped.
pub fn parse_results(
    source: &SourceConfig,
    settings: &JsonFeedSettings,
    data: &Value,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<ScrapedRecord>, String> {
    let items = data
        .pointer(&settings.items_pointer)
        .and_then(|v| v.as_array())
        .ok_or_else(|| format!("expected an array at '{}'", settings.items_pointer))?;

    let jobs: Vec<ScrapedRecord> = items
        .iter()
        .filter_map(|raw| parse_item(source, &settings.fields, raw, scraped_at))
        .collect();

    if jobs.len() < items.len() {
        tracing::debug!(
            "Source '{}': skipped {} listings without a title",
            source.name,
            items.len() - jobs.len()
        );
    }
    Ok(jobs)
}

fn parse_item(
    source: &SourceConfig,
    fields: &FieldMap,
    raw: &Value,
    scraped_at: DateTime<Utc>,
) -> Option<ScrapedRecord> {
    let title = lookup_str(raw, &fields.title)?;

    let id = lookup(raw, &fields.id)
        .and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut salary_min = lookup(raw, &fields.salary_min).and_then(as_number);
    let mut salary_max = lookup(raw, &fields.salary_max).and_then(as_number);
    let mut currency = lookup_str(raw, &fields.currency);
    if salary_min.is_none()
        && salary_max.is_none()
        && let Some(text) = lookup_str(raw, &fields.salary)
    {
        let parsed = parse_salary(&text);
        salary_min = parsed.min;
        salary_max = parsed.max;
        currency = currency.or(parsed.currency);
    }

    let type_text = lookup_str(raw, &fields.employment_type);
    let employment_type = type_text
        .as_deref()
        .and_then(EmploymentType::parse_loose)
        .unwrap_or_default();
    let remote = lookup(raw, &fields.remote).is_some_and(as_flag)
        || type_text
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains("remote"));

    let source_url = lookup_str(raw, &fields.url)
        .map(|href| resolve_url(&source.url, &href))
        .unwrap_or_else(|| source.url.clone());

    Some(ScrapedRecord {
        id,
        title,
        description: lookup_str(raw, &fields.description),
        location: lookup_str(raw, &fields.location)
            .or_else(|| source.default_location.clone())
            .unwrap_or_default(),
        company_name: lookup_str(raw, &fields.company).unwrap_or_else(|| "Unknown".to_string()),
        salary_min,
        salary_max,
        currency: currency.or_else(|| source.default_currency.clone()),
        employment_type,
        remote,
        category: lookup_str(raw, &fields.category).or_else(|| source.category.clone()),
        source: source.name.clone(),
        source_url,
        scraped_at,
    })
}

/// Resolve `path` as a JSON pointer or a dotted key path.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if path.starts_with('/') {
        return value.pointer(path);
    }
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn lookup_str(value: &Value, path: &str) -> Option<String> {
    lookup(value, path)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "remote" | "1"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Absolute URLs pass through; relative ones are joined onto the source URL.
pub(crate) fn resolve_url(base: &str, href: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
