//! Core data structures for the utmka application.
//!
//! History records and templates mirror the JSON objects served by the
//! backend. Optional fields stay `Option` so that records written by older
//! backends (which used `url` instead of `full_url`, or `null` colours)
//! deserialize without loss.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Backend identifier of a record.
///
/// The reference backend uses integers, but string ids are accepted too.
/// Two ids are equal when their textual forms are equal.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(s.to_string()),
        })
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        RecordId::Int(i64::from(n))
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

/// The five UTM query parameters, in canonical order.
pub const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Values for the five UTM parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

impl UtmParams {
    /// Pairs of (query key, value) in canonical order
    pub fn pairs(&self) -> [(&'static str, Option<&str>); 5] {
        [
            (UTM_KEYS[0], self.utm_source.as_deref()),
            (UTM_KEYS[1], self.utm_medium.as_deref()),
            (UTM_KEYS[2], self.utm_campaign.as_deref()),
            (UTM_KEYS[3], self.utm_content.as_deref()),
            (UTM_KEYS[4], self.utm_term.as_deref()),
        ]
    }

    /// Sets a parameter by its query key. Unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        match key {
            "utm_source" => self.utm_source = value,
            "utm_medium" => self.utm_medium = value,
            "utm_campaign" => self.utm_campaign = value,
            "utm_content" => self.utm_content = value,
            "utm_term" => self.utm_term = value,
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs()
            .iter()
            .all(|(_, v)| v.map(str::trim).unwrap_or("").is_empty())
    }
}

/// A label/colour pair attached to a template or a history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag_name: String,
    #[serde(default)]
    pub tag_color: String,
}

impl Tag {
    /// Builds a tag from optional record fields. Empty names yield `None`;
    /// a literal `"null"` colour is treated as no colour.
    pub fn from_parts(name: Option<&str>, color: Option<&str>) -> Option<Tag> {
        let name = name.map(str::trim).filter(|n| !n.is_empty())?;
        let color = color
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "null")
            .unwrap_or("");
        Some(Tag {
            tag_name: name.to_string(),
            tag_color: color.to_string(),
        })
    }
}

/// A previously generated link plus optional short URL and tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub tag_color: Option<String>,
    /// Raw timestamp string as stored by the backend
    #[serde(default)]
    pub created_at: Option<String>,
}

impl LinkRecord {
    /// Creates a record with only the fields every backend provides
    pub fn new(id: impl Into<RecordId>, full_url: &str, created_at: &str) -> Self {
        LinkRecord {
            id: id.into(),
            url: None,
            full_url: Some(full_url.to_string()),
            base_url: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            utm_content: None,
            utm_term: None,
            short_url: None,
            tag_name: None,
            tag_color: None,
            created_at: Some(created_at.to_string()),
        }
    }

    /// The URL to show and copy: `full_url`, falling back to `url`.
    pub fn display_url(&self) -> &str {
        self.full_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.url.as_deref())
            .unwrap_or("")
    }

    /// Short URL when present, otherwise the display URL.
    pub fn share_url(&self) -> &str {
        self.short_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.display_url())
    }

    pub fn tag(&self) -> Option<Tag> {
        Tag::from_parts(self.tag_name.as_deref(), self.tag_color.as_deref())
    }

    pub fn utm_params(&self) -> UtmParams {
        UtmParams {
            utm_source: self.utm_source.clone(),
            utm_medium: self.utm_medium.clone(),
            utm_campaign: self.utm_campaign.clone(),
            utm_content: self.utm_content.clone(),
            utm_term: self.utm_term.clone(),
        }
    }
}

/// A saved, named preset of UTM parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub tag_color: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Template {
    pub fn new(id: impl Into<RecordId>, name: &str, created_at: &str) -> Self {
        Template {
            id: id.into(),
            name: name.to_string(),
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            utm_content: None,
            utm_term: None,
            tag_name: None,
            tag_color: None,
            created_at: Some(created_at.to_string()),
        }
    }

    pub fn tag(&self) -> Option<Tag> {
        Tag::from_parts(self.tag_name.as_deref(), self.tag_color.as_deref())
    }

    pub fn utm_params(&self) -> UtmParams {
        UtmParams {
            utm_source: self.utm_source.clone(),
            utm_medium: self.utm_medium.clone(),
            utm_campaign: self.utm_campaign.clone(),
            utm_content: self.utm_content.clone(),
            utm_term: self.utm_term.clone(),
        }
    }
}

/// Body of `POST /history`
#[derive(Debug, Clone, Serialize)]
pub struct NewLinkRecord {
    pub user_email: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_color: Option<String>,
}

impl NewLinkRecord {
    pub fn new(user_email: &str, url: &str, tag: Option<&Tag>) -> Self {
        NewLinkRecord {
            user_email: user_email.to_string(),
            url: url.to_string(),
            tag_name: tag.map(|t| t.tag_name.clone()),
            tag_color: tag.map(|t| t.tag_color.clone()),
        }
    }
}

/// Body of `POST /templates` for a single template.
///
/// Empty strings are sent for blank fields, matching what the backend
/// receives from its web form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub user_email: String,
    pub name: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub tag_name: String,
    pub tag_color: String,
}

impl NewTemplate {
    pub fn new(user_email: &str, name: &str, params: &UtmParams, tag: Option<&Tag>) -> Self {
        let field = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
        NewTemplate {
            user_email: user_email.to_string(),
            name: name.trim().to_string(),
            utm_source: field(&params.utm_source),
            utm_medium: field(&params.utm_medium),
            utm_campaign: field(&params.utm_campaign),
            utm_content: field(&params.utm_content),
            utm_term: field(&params.utm_term),
            tag_name: tag.map(|t| t.tag_name.clone()).unwrap_or_default(),
            tag_color: tag.map(|t| t.tag_color.clone()).unwrap_or_default(),
        }
    }
}
