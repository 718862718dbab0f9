//! Field canonicalization and cross-source deduplication.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::record::ScrapedRecord;

static SALARY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k)?").expect("valid salary regex")
});

static CURRENCY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(AED|QAR|SAR|KWD|BHD|OMR|EGP|JOD|LBP|USD|EUR|GBP)\b").expect("valid currency regex")
});

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize a record in place of whatever shape the adapter produced.
pub fn normalize_record(mut record: ScrapedRecord) -> ScrapedRecord {
    record.title = collapse_whitespace(&record.title);
    record.company_name = collapse_whitespace(&record.company_name);
    record.location = collapse_whitespace(&record.location);
    record.description = record
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    record.category = record
        .category
        .map(|c| collapse_whitespace(&c))
        .filter(|c| !c.is_empty());
    record.currency = record
        .currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());

    record.salary_min = record.salary_min.filter(|v| v.is_finite() && *v > 0.0);
    record.salary_max = record.salary_max.filter(|v| v.is_finite() && *v > 0.0);
    if let (Some(min), Some(max)) = (record.salary_min, record.salary_max)
        && min > max
    {
        record.salary_min = Some(max);
        record.salary_max = Some(min);
    }

    if !record.remote {
        let loc = record.location.to_lowercase();
        record.remote = loc.contains("remote") || loc.contains("work from home");
    }
    record
}

/// Case-insensitive composite identity of a posting: (title, company, location).
pub fn dedup_key(record: &ScrapedRecord) -> (String, String, String) {
    (
        record.title.trim().to_lowercase(),
        record.company_name.trim().to_lowercase(),
        record.location.trim().to_lowercase(),
    )
}

/// Drop records whose [`dedup_key`] was already seen. First occurrence wins.
pub fn dedupe(records: Vec<ScrapedRecord>) -> Vec<ScrapedRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(dedup_key(r)))
        .collect()
}

/// Parsed salary text: bounds plus a currency code when one was spelled out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

/// Parse free-text salaries such as "AED 10,000 - 15,000", "15k-20k QAR"
/// or "From 8000". Numbers below 100 without a `k` suffix are ignored.
pub fn parse_salary(raw: &str) -> SalaryRange {
    let upper = raw.to_uppercase();
    let currency = CURRENCY_CODE
        .captures(&upper)
        .map(|c| c[1].to_string())
        .or_else(|| upper.contains('$').then(|| "USD".to_string()));

    let values: Vec<f64> = SALARY_NUMBER
        .captures_iter(raw)
        .filter_map(|cap| {
            let number: f64 = cap[1].replace(',', "").parse().ok()?;
            let value = if cap.get(2).is_some() { number * 1000.0 } else { number };
            (value >= 100.0).then_some(value)
        })
        .collect();

    let (min, max) = match values.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), None),
        [first, second, ..] => (Some(first.min(*second)), Some(first.max(*second))),
    };

    SalaryRange { min, max, currency }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::fixtures::record;

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut first = record("Engineer", "Acme", "Dubai, UAE", "a");
        first.description = Some("first".into());
        let mut second = record("ENGINEER", "acme", "dubai, uae", "b");
        second.description = Some("second".into());
        let other = record("Designer", "Acme", "Dubai, UAE", "a");

        let out = dedupe(vec![first.clone(), other.clone(), second]);
        assert_eq!(out, vec![first, other]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let input = vec![
            record("Engineer", "Acme", "Dubai, UAE", "a"),
            record("Engineer", "Acme", "Dubai, UAE", "b"),
            record("Nurse", "Clinic", "Doha, Qatar", "a"),
            record("nurse", "clinic", "doha, qatar", "c"),
            record("Chef", "Hotel", "Muscat, Oman", "b"),
        ];
        let once = dedupe(input);
        let twice = dedupe(once.clone());
        assert_eq!(once.len(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn dedup_key_ignores_case_and_outer_whitespace() {
        let a = record(" Engineer ", "Acme", "Dubai", "a");
        let b = record("engineer", "ACME ", "DUBAI", "b");
        assert_eq!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn dedup_key_keeps_fields_apart() {
        let a = record("a|b", "c", "Dubai", "x");
        let b = record("a", "b|c", "Dubai", "x");
        assert_ne!(dedup_key(&a), dedup_key(&b));
        assert_eq!(dedupe(vec![a, b]).len(), 2);
    }

    #[test]
    fn normalize_collapses_whitespace_and_fixes_salary() {
        let mut rec = record("  Senior   Engineer ", "Acme\n Corp", "Dubai,   UAE", "a");
        rec.salary_min = Some(20000.0);
        rec.salary_max = Some(10000.0);
        rec.currency = Some(" aed ".into());
        rec.category = Some("   ".into());

        let rec = normalize_record(rec);
        assert_eq!(rec.title, "Senior Engineer");
        assert_eq!(rec.company_name, "Acme Corp");
        assert_eq!(rec.location, "Dubai, UAE");
        assert_eq!(rec.salary_min, Some(10000.0));
        assert_eq!(rec.salary_max, Some(20000.0));
        assert_eq!(rec.currency.as_deref(), Some("AED"));
        assert_eq!(rec.category, None);
    }

    #[test]
    fn normalize_flags_remote_locations() {
        let rec = normalize_record(record("Engineer", "Acme", "Remote - GCC", "a"));
        assert!(rec.remote);
    }

    #[test]
    fn normalize_drops_non_positive_salary() {
        let mut rec = record("Engineer", "Acme", "Dubai", "a");
        rec.salary_min = Some(0.0);
        rec.salary_max = Some(-5.0);
        let rec = normalize_record(rec);
        assert_eq!(rec.salary_min, None);
        assert_eq!(rec.salary_max, None);
    }

    #[test]
    fn parse_salary_range_with_currency() {
        let s = parse_salary("AED 10,000 - 15,000 per month");
        assert_eq!(s.min, Some(10000.0));
        assert_eq!(s.max, Some(15000.0));
        assert_eq!(s.currency.as_deref(), Some("AED"));
    }

    #[test]
    fn parse_salary_k_suffix_and_dollar() {
        let s = parse_salary("$20k - 15k");
        assert_eq!(s.min, Some(15000.0));
        assert_eq!(s.max, Some(20000.0));
        assert_eq!(s.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn parse_salary_without_numbers() {
        assert_eq!(parse_salary("Competitive"), SalaryRange::default());
        let single = parse_salary("From 8000 QAR");
        assert_eq!(single.min, Some(8000.0));
        assert_eq!(single.max, None);
        assert_eq!(single.currency.as_deref(), Some("QAR"));
    }
}
