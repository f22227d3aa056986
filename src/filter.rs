//! Search, date-range filtering and sorting of record collections.
//!
//! The same pipeline serves both the history and templates panels. It never
//! mutates its input: callers get a freshly ordered `Vec`.
use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::{parse_date, DateRange, LinkRecord, RecordId, Template, UtmError};

/// Column that every panel sorts by until the user picks another one
pub const DEFAULT_SORT_COLUMN: &str = "created_at";

/// Fields concatenated into the text that a search query is matched against
const SEARCH_FIELDS: [&str; 9] = [
    "full_url",
    "base_url",
    "name",
    "tag_name",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Access to a record's fields by column name.
pub trait Searchable {
    fn record_id(&self) -> &RecordId;

    /// Value of the named column, `None` when the record has no such field.
    fn field(&self, column: &str) -> Option<&str>;

    fn created_at(&self) -> Option<&str> {
        self.field("created_at")
    }

    /// Lowercased, space-joined text used by the search filter.
    fn searchable_text(&self) -> String {
        SEARCH_FIELDS
            .iter()
            .map(|name| self.field(name).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl Searchable for LinkRecord {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn field(&self, column: &str) -> Option<&str> {
        match column {
            "full_url" => Some(self.display_url()),
            "url" => self.url.as_deref(),
            "base_url" => self.base_url.as_deref(),
            "short_url" => self.short_url.as_deref(),
            "utm_source" => self.utm_source.as_deref(),
            "utm_medium" => self.utm_medium.as_deref(),
            "utm_campaign" => self.utm_campaign.as_deref(),
            "utm_content" => self.utm_content.as_deref(),
            "utm_term" => self.utm_term.as_deref(),
            "tag_name" => self.tag_name.as_deref(),
            "tag_color" => self.tag_color.as_deref(),
            "created_at" => self.created_at.as_deref(),
            _ => None,
        }
    }
}

impl Searchable for Template {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn field(&self, column: &str) -> Option<&str> {
        match column {
            "name" => Some(self.name.as_str()),
            "utm_source" => self.utm_source.as_deref(),
            "utm_medium" => self.utm_medium.as_deref(),
            "utm_campaign" => self.utm_campaign.as_deref(),
            "utm_content" => self.utm_content.as_deref(),
            "utm_term" => self.utm_term.as_deref(),
            "tag_name" => self.tag_name.as_deref(),
            "tag_color" => self.tag_color.as_deref(),
            "created_at" => self.created_at.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

impl FromStr for SortDirection {
    type Err = UtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(UtmError::validation(format!(
                "Invalid sort direction: {}. Must be one of: asc, desc",
                other
            ))),
        }
    }
}

/// Sort column plus direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            column: DEFAULT_SORT_COLUMN.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn new(column: &str, direction: SortDirection) -> Self {
        SortSpec {
            column: column.to_string(),
            direction,
        }
    }

    /// Parses a combined key such as `created_at_desc` or `name_asc`.
    ///
    /// The direction is whatever follows the last underscore; a key without a
    /// recognised direction sorts that whole key descending.
    pub fn from_key(key: &str) -> SortSpec {
        let key = key.trim();
        if let Some((column, direction)) = key.rsplit_once('_') {
            if let Ok(direction) = direction.parse::<SortDirection>() {
                if !column.is_empty() {
                    return SortSpec::new(column, direction);
                }
            }
        }
        if key.is_empty() {
            SortSpec::default()
        } else {
            SortSpec::new(key, SortDirection::Desc)
        }
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.column, self.direction)
    }
}

enum SortKey {
    Time(DateTime<Utc>),
    Number(i64),
    Text(String),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// True when `text` (already lowercased) satisfies the search query.
///
/// Multi-word queries require every word; a single word is a plain
/// substring test.
pub fn matches_query(text: &str, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() > 1 {
        words.iter().all(|word| text.contains(word))
    } else {
        text.contains(query.as_str())
    }
}

/// Filters by search text and date range, then sorts.
///
/// The sort is stable: records that compare equal keep their input order.
pub fn apply_filters_and_sorting<T>(
    items: &[T],
    search: &str,
    date_range: Option<&DateRange>,
    sort: &SortSpec,
) -> Vec<T>
where
    T: Searchable + Clone,
{
    let mut keyed: Vec<(SortKey, T)> = items
        .iter()
        .filter(|item| search.trim().is_empty() || matches_query(&item.searchable_text(), search))
        .filter(|item| match date_range {
            Some(range) => range.contains(parse_date(item.created_at())),
            None => true,
        })
        .map(|item| (sort_key(item, &sort.column), item.clone()))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| sort.direction.apply(a.compare(b)));

    trace!(
        "Filtered {} of {} records, sorted by {}",
        keyed.len(),
        items.len(),
        sort.key()
    );
    keyed.into_iter().map(|(_, item)| item).collect()
}

fn sort_key<T: Searchable>(item: &T, column: &str) -> SortKey {
    match column {
        DEFAULT_SORT_COLUMN => SortKey::Time(parse_date(item.created_at())),
        // Numeric ids order by value, string ids by text.
        "id" => match item.record_id() {
            RecordId::Int(n) => SortKey::Number(*n),
            RecordId::Text(s) => SortKey::Text(s.clone()),
        },
        _ => SortKey::Text(item.field(column).unwrap_or("").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: i64, url: &str, created_at: &str) -> LinkRecord {
        LinkRecord::new(id, url, created_at)
    }

    fn ids(records: &[LinkRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn multi_word_query_requires_every_word() {
        let mut a = link(1, "https://shop.example/spring", "2024-01-01");
        a.utm_source = Some("google".into());
        a.utm_campaign = Some("sale".into());
        let mut b = link(2, "https://shop.example/spring", "2024-01-02");
        b.utm_source = Some("google".into());

        let out =
            apply_filters_and_sorting(&[a, b], "Spring GOOGLE sale", None, &SortSpec::default());
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn single_word_is_substring_match() {
        let records = vec![
            link(1, "https://alpha.example", "2024-01-01"),
            link(2, "https://beta.example", "2024-01-02"),
        ];
        let out = apply_filters_and_sorting(&records, " ALP ", None, &SortSpec::default());
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn empty_query_keeps_everything() {
        let records = vec![
            link(1, "https://a.example", "2024-01-01"),
            link(2, "https://b.example", "2024-01-02"),
        ];
        let out = apply_filters_and_sorting(&records, "   ", None, &SortSpec::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn created_at_desc_puts_newest_first() {
        let records = vec![
            link(1, "https://a.example", "2024-01-01"),
            link(2, "https://b.example", "2024-03-01"),
        ];
        let out = apply_filters_and_sorting(&records, "", None, &SortSpec::default());
        assert_eq!(ids(&out), vec!["2", "1"]);
        assert_eq!(ids(&records), vec!["1", "2"]);
    }

    #[test]
    fn mixed_timestamp_shapes_sort_together() {
        let records = vec![
            link(1, "a", "2024-01-05T09:00:00"),
            link(2, "b", "2024-01-05 11:00:00"),
            link(3, "c", "2024-01-05"),
            link(4, "d", "garbage"),
        ];
        let sort = SortSpec::new("created_at", SortDirection::Asc);
        let out = apply_filters_and_sorting(&records, "", None, &sort);
        assert_eq!(ids(&out), vec!["4", "3", "1", "2"]);
    }

    #[test]
    fn equal_keys_keep_input_order_in_both_directions() {
        let records = vec![
            link(1, "same", "2024-01-01"),
            link(2, "same", "2024-01-01"),
            link(3, "same", "2024-01-01"),
        ];
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let sort = SortSpec::new("full_url", direction);
            let out = apply_filters_and_sorting(&records, "", None, &sort);
            assert_eq!(ids(&out), vec!["1", "2", "3"]);
        }
    }

    #[test]
    fn string_sort_is_case_sensitive_with_blank_fallback() {
        let mut templates = vec![
            Template::new(1, "beta", "2024-01-01"),
            Template::new(2, "Alpha", "2024-01-01"),
            Template::new(3, "alpha", "2024-01-01"),
        ];
        templates[0].utm_source = Some("x".into());
        let sort = SortSpec::new("name", SortDirection::Asc);
        let by_name = apply_filters_and_sorting(&templates, "", None, &sort);
        let names: Vec<_> = by_name.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "alpha", "beta"]);

        let sort = SortSpec::new("utm_source", SortDirection::Asc);
        let by_source = apply_filters_and_sorting(&templates, "", None, &sort);
        let names: Vec<_> = by_source.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn unknown_column_preserves_order() {
        let records = vec![link(2, "b", "2024-01-02"), link(1, "a", "2024-01-01")];
        let sort = SortSpec::new("no_such_field", SortDirection::Asc);
        let out = apply_filters_and_sorting(&records, "", None, &sort);
        assert_eq!(ids(&out), vec!["2", "1"]);
    }

    #[test]
    fn id_column_sorts_by_numeric_value() {
        let records = vec![
            link(3, "c", "2024-01-01"),
            link(10, "a", "2024-01-01"),
            link(1, "b", "2024-01-01"),
            link(2, "d", "2024-01-01"),
        ];
        let out = apply_filters_and_sorting(&records, "", None, &SortSpec::from_key("id_asc"));
        assert_eq!(ids(&out), vec!["1", "2", "3", "10"]);
        let out = apply_filters_and_sorting(&records, "", None, &SortSpec::from_key("id_desc"));
        assert_eq!(ids(&out), vec!["10", "3", "2", "1"]);

        let templates = vec![
            Template::new(2, "b", "2024-01-01"),
            Template::new(1, "a", "2024-01-01"),
        ];
        let sort = SortSpec::new("id", SortDirection::Asc);
        let out = apply_filters_and_sorting(&templates, "", None, &sort);
        let names: Vec<_> = out.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn date_range_filters_inclusively() {
        let records = vec![
            link(1, "a", "2023-12-31 23:59:59"),
            link(2, "b", "2024-01-01 00:00:00"),
            link(3, "c", "2024-01-31 23:59:59"),
            link(4, "d", "2024-02-01T00:00:00"),
        ];
        let range = DateRange::parse("2024-01-01_2024-01-31").unwrap();
        let sort = SortSpec::new("created_at", SortDirection::Asc);
        let out = apply_filters_and_sorting(&records, "", Some(&range), &sort);
        assert_eq!(ids(&out), vec!["2", "3"]);
    }

    #[test]
    fn sort_key_parsing() {
        assert_eq!(SortSpec::from_key("created_at_desc"), SortSpec::default());
        assert_eq!(
            SortSpec::from_key("tag_name_asc"),
            SortSpec::new("tag_name", SortDirection::Asc)
        );
        assert_eq!(
            SortSpec::from_key("name"),
            SortSpec::new("name", SortDirection::Desc)
        );
        assert_eq!(SortSpec::from_key(""), SortSpec::default());
        assert_eq!(SortSpec::new("name", SortDirection::Asc).key(), "name_asc");
    }

    #[test]
    fn template_search_covers_tag_and_utm_fields() {
        let mut t = Template::new(1, "Newsletter", "2024-01-01");
        t.tag_name = Some("Email".into());
        t.utm_medium = Some("cpc".into());
        assert!(matches_query(&t.searchable_text(), "email CPC"));
        assert!(!matches_query(&t.searchable_text(), "email banner"));
    }
}
