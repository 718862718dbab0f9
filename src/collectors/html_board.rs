use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::collectors::json_feed::resolve_url;
use crate::collectors::{JobCollector, SourceConfig};
use crate::error::FetchError;
use crate::models::record::{EmploymentType, ScrapedRecord};
use crate::normalize::{collapse_whitespace, parse_salary};

/// CSS selectors for an HTML listing page. `item` selects each listing;
/// the rest are evaluated inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct HtmlSelectors {
    pub item: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Element whose `href` is the listing URL; defaults to the title.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default, rename = "employmentType")]
    pub employment_type: Option<String>,
    /// Keyed `categorySelector`; `category` on the source is the fallback value.
    #[serde(default, rename = "categorySelector")]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct HtmlBoardCollector {
    source: SourceConfig,
    selectors: HtmlSelectors,
    client: reqwest::Client,
}

impl HtmlBoardCollector {
    pub fn new(source: SourceConfig, selectors: HtmlSelectors, client: reqwest::Client) -> Self {
        Self {
            source,
            selectors,
            client,
        }
    }
}

#[async_trait]
impl JobCollector for HtmlBoardCollector {
    fn name(&self) -> &str {
        &self.source.name
    }

    async fn collect(&self) -> Result<Vec<ScrapedRecord>, FetchError> {
        let url = self.source.request_url();
        tracing::debug!("Fetching HTML board '{}' from {url}", self.source.name);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
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

        let body = resp.text().await.map_err(|error| FetchError::Request {
            source_name: self.source.name.clone(),
            error,
        })?;

        parse_listings(&self.source, &self.selectors, &body, Utc::now())
    }
}

/// Compiled form of [`HtmlSelectors`].
struct Compiled {
    item: Selector,
    title: Selector,
    company: Option<Selector>,
    location: Option<Selector>,
    link: Option<Selector>,
    salary: Option<Selector>,
    employment_type: Option<Selector>,
    category: Option<Selector>,
    description: Option<Selector>,
}

impl Compiled {
    fn new(source: &str, s: &HtmlSelectors) -> Result<Self, FetchError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|_| FetchError::Selector {
                source_name: source.to_string(),
                selector: css.to_string(),
            })
        };
        let parse_opt = |css: &Option<String>| css.as_deref().map(parse).transpose();

        Ok(Self {
            item: parse(&s.item)?,
            title: parse(&s.title)?,
            company: parse_opt(&s.company)?,
            location: parse_opt(&s.location)?,
            link: parse_opt(&s.link)?,
            salary: parse_opt(&s.salary)?,
            employment_type: parse_opt(&s.employment_type)?,
            category: parse_opt(&s.category)?,
            description: parse_opt(&s.description)?,
        })
    }
}

/// Extract listings from a page body. Items without title text are skipped.
pub fn parse_listings(
    source: &SourceConfig,
    selectors: &HtmlSelectors,
    body: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<ScrapedRecord>, FetchError> {
    let compiled = Compiled::new(&source.name, selectors)?;
    let document = Html::parse_document(body);

    let mut jobs = Vec::new();
    for item in document.select(&compiled.item) {
        let Some(title) = text_of(item, Some(&compiled.title)) else {
            continue;
        };

        let href = compiled
            .link
            .as_ref()
            .or(Some(&compiled.title))
            .and_then(|sel| item.select(sel).next())
            .and_then(|el| {
                el.value()
                    .attr("href")
                    .or_else(|| el.select(&ANCHOR).next().and_then(|a| a.value().attr("href")))
            });
        let source_url = href
            .map(|h| resolve_url(&source.url, h))
            .unwrap_or_else(|| source.url.clone());

        let salary = text_of(item, compiled.salary.as_ref())
            .map(|s| parse_salary(&s))
            .unwrap_or_default();
        let type_text = text_of(item, compiled.employment_type.as_ref());
        let location = text_of(item, compiled.location.as_ref())
            .or_else(|| source.default_location.clone())
            .unwrap_or_default();

        jobs.push(ScrapedRecord {
            id: href
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title,
            description: text_of(item, compiled.description.as_ref()),
            location,
            company_name: text_of(item, compiled.company.as_ref())
                .unwrap_or_else(|| "Unknown".to_string()),
            salary_min: salary.min,
            salary_max: salary.max,
            currency: salary.currency.or_else(|| source.default_currency.clone()),
            employment_type: type_text
                .as_deref()
                .and_then(EmploymentType::parse_loose)
                .unwrap_or_default(),
            remote: type_text
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains("remote")),
            category: text_of(item, compiled.category.as_ref()).or_else(|| source.category.clone()),
            source: source.name.clone(),
            source_url,
            scraped_at,
        });
    }
    Ok(jobs)
}

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid anchor selector"));

fn text_of(item: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let el = item.select(selector?).next()?;
    let text = collapse_whitespace(&el.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{SourceKind, http_client};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body><ul>
          <li class="job">
            <h2><a href="/jobs/1">Site   Engineer</a></h2>
            <span class="company">Acme Contracting</span>
            <span class="loc">Dubai, UAE</span>
            <span class="pay">AED 12,000 - 18,000</span>
            <span class="type">Full Time</span>
          </li>
          <li class="job">
            <h2><a href="https://elsewhere.example/2">Pastry Chef</a></h2>
            <span class="loc">Doha</span>
            <span class="type">Part time</span>
          </li>
          <li class="job"><span class="loc">Muscat</span></li>
        </ul></body></html>
    "#;

    fn source(url: &str) -> (SourceConfig, HtmlSelectors) {
        let source: SourceConfig = serde_json::from_value(json!({
            "kind": "html",
            "name": "gulfboard",
            "url": url,
            "category": "Hospitality",
            "item": "li.job",
            "title": "h2",
            "company": ".company",
            "location": ".loc",
            "salary": ".pay",
            "employmentType": ".type"
        }))
        .unwrap();
        let selectors = match &source.kind {
            SourceKind::Html(s) => s.clone(),
            SourceKind::Json(_) => unreachable!(),
        };
        (source, selectors)
    }

    #[test]
    fn parses_listing_items() {
        let (src, selectors) = source("https://gulfboard.example/list");
        let jobs = parse_listings(&src, &selectors, PAGE, Utc::now()).unwrap();

        assert_eq!(jobs.len(), 2);
        let first = &jobs[0];
        assert_eq!(first.title, "Site Engineer");
        assert_eq!(first.company_name, "Acme Contracting");
        assert_eq!(first.location, "Dubai, UAE");
        assert_eq!(first.salary_min, Some(12000.0));
        assert_eq!(first.salary_max, Some(18000.0));
        assert_eq!(first.currency.as_deref(), Some("AED"));
        assert_eq!(first.source_url, "https://gulfboard.example/jobs/1");
        assert_eq!(first.category.as_deref(), Some("Hospitality"));

        let second = &jobs[1];
        assert_eq!(second.company_name, "Unknown");
        assert_eq!(second.employment_type, EmploymentType::PartTime);
        assert_eq!(second.source_url, "https://elsewhere.example/2");
    }

    #[test]
    fn category_selector_overrides_source_category() {
        let (src, mut selectors) = source("https://gulfboard.example/list");
        selectors.category = Some(".type".to_string());
        let jobs = parse_listings(&src, &selectors, PAGE, Utc::now()).unwrap();
        assert_eq!(jobs[0].category.as_deref(), Some("Full Time"));
        assert_eq!(jobs[1].category.as_deref(), Some("Part time"));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let (src, mut selectors) = source("https://gulfboard.example/list");
        selectors.item = "li[".to_string();
        let err = parse_listings(&src, &selectors, PAGE, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::Selector { .. }));
    }

    #[tokio::test]
    async fn collect_fetches_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let (src, selectors) = source(&format!("{}/list", server.uri()));
        let collector =
            HtmlBoardCollector::new(src, selectors, http_client(Duration::from_secs(5)).unwrap());
        let jobs = collector.collect().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].source_url.starts_with(&server.uri()));
    }
}
