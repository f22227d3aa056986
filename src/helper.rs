use console::style;
use log::error;

use crate::{Tag, UtmError, UtmParams};

/// Green one-line status message
pub fn toast_success(message: &str) {
    println!("{} {}", style("✔").green().bold(), style(message).green());
}

/// Red one-line status message for a failed command
pub fn toast_error(err: &UtmError) {
    error!("{}", err);
    let message = match err {
        e if e.is_network() => format!("Server unreachable: {}", e),
        e => e.to_string(),
    };
    eprintln!("{} {}", style("✘").red().bold(), style(message).red());
}

// Helper for building a tag from command-line options
pub fn parse_tag(name: Option<String>, color: Option<String>) -> Option<Tag> {
    Tag::from_parts(name.as_deref(), color.as_deref())
}

pub fn utm_params(
    source: Option<String>,
    medium: Option<String>,
    campaign: Option<String>,
    content: Option<String>,
    term: Option<String>,
) -> UtmParams {
    UtmParams {
        utm_source: source,
        utm_medium: medium,
        utm_campaign: campaign,
        utm_content: content,
        utm_term: term,
    }
}

/// Overlays the values that were given onto `base`.
pub fn overlay_params(base: &mut UtmParams, overrides: UtmParams) {
    for (key, value) in overrides.pairs() {
        if let Some(value) = value {
            base.set(key, Some(value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tag_options_give_no_tag() {
        assert!(parse_tag(Some(" ".into()), Some("#fff".into())).is_none());
        let tag = parse_tag(Some("Promo".into()), None).unwrap();
        assert_eq!(tag.tag_color, "");
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let mut base = utm_params(Some("vk".into()), Some("post".into()), None, None, None);
        overlay_params(
            &mut base,
            utm_params(None, Some("cpc".into()), Some("sale".into()), None, None),
        );
        assert_eq!(base.utm_source.as_deref(), Some("vk"));
        assert_eq!(base.utm_medium.as_deref(), Some("cpc"));
        assert_eq!(base.utm_campaign.as_deref(), Some("sale"));
    }
}
