//! Building UTM-tagged URLs and reading them back.
use log::debug;
use reqwest::Url;

use crate::{LinkRecord, Result, Tag, Template, UtmError, UtmParams, UTM_KEYS};

/// Prefixes `https://` unless the input already names an http(s) scheme.
fn with_scheme(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Builds the tagged URL for the generator form.
///
/// Blank UTM values are skipped; a non-blank value replaces any existing
/// query parameter of the same name while other parameters are kept.
pub fn build_utm_url(raw: &str, params: &UtmParams) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UtmError::validation("URL is required"));
    }

    let mut url = Url::parse(&with_scheme(raw)).map_err(|e| {
        debug!("Rejected URL '{}': {}", raw, e);
        UtmError::InvalidUrl {
            url: raw.to_string(),
        }
    })?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UtmError::InvalidUrl {
            url: raw.to_string(),
        });
    }

    let updates: Vec<(&str, String)> = params
        .pairs()
        .iter()
        .filter_map(|(key, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (*key, v.to_string()))
        })
        .collect();

    if !updates.is_empty() {
        // A replaced key keeps the position of its first occurrence; later
        // duplicates are dropped and new keys go at the end.
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut placed: Vec<&str> = Vec::new();
        for (k, v) in url.query_pairs() {
            match updates.iter().find(|(key, _)| *key == &*k) {
                Some((key, value)) if !placed.contains(key) => {
                    placed.push(*key);
                    pairs.push((key.to_string(), value.clone()));
                }
                Some(_) => {}
                None => pairs.push((k.into_owned(), v.into_owned())),
            }
        }
        for (key, value) in &updates {
            if !placed.contains(key) {
                pairs.push((key.to_string(), value.clone()));
            }
        }

        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
    }

    Ok(url.to_string())
}

/// Scheme, host and path of a URL, without query or fragment.
pub fn extract_base_url(raw: &str) -> String {
    match Url::parse(&with_scheme(raw.trim())) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}

/// Reads the five UTM parameters out of a URL.
pub fn parse_utm_params(raw: &str) -> UtmParams {
    let mut params = UtmParams::default();
    if let Ok(url) = Url::parse(&with_scheme(raw.trim())) {
        for (key, value) in url.query_pairs() {
            if UTM_KEYS.contains(&&*key) {
                params.set(&key, Some(value.into_owned()));
            }
        }
    }
    params
}

/// The generator form: what the user typed plus the tag remembered from the
/// last applied template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorForm {
    pub url: String,
    pub params: UtmParams,
    /// Copied onto the next generated history record, then cleared
    pub pending_tag: Option<Tag>,
}

impl GeneratorForm {
    /// Prefills UTM fields and the pending tag from a template.
    pub fn apply_template(&mut self, template: &Template) {
        self.params = template.utm_params();
        self.pending_tag = template.tag();
    }

    /// Prefills from a history record, including its host and path.
    pub fn apply_history(&mut self, record: &LinkRecord) {
        let mut params = record.utm_params();
        if params.is_empty() {
            params = parse_utm_params(record.display_url());
        }
        self.params = params;
        if let Ok(url) = Url::parse(record.display_url()) {
            self.url = format!("{}{}", url.host_str().unwrap_or(""), url.path());
        }
        self.pending_tag = record.tag();
    }

    pub fn build(&self) -> Result<String> {
        build_utm_url(&self.url, &self.params)
    }

    pub fn clear(&mut self) {
        *self = GeneratorForm::default();
    }
}
