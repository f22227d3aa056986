//! Tag colours and tag suggestions.
use std::collections::HashMap;

use crate::{LinkRecord, Tag, Template};

/// Preset pastel tag colours offered by the palette
pub const PRESET_COLORS: [&str; 10] = [
    "#dbeafe", "#dcfce7", "#fef3c7", "#fce7f3", "#e0e7ff", "#f0f9ff", "#f0fdf4", "#fefce8",
    "#fef2f2", "#f5f3ff",
];

/// Text colour for tags without a usable background colour
pub const FALLBACK_TEXT_COLOR: &str = "#374151";

const LIGHT_BG_TEXT_COLOR: &str = "#374151";
const DARK_BG_TEXT_COLOR: &str = "#ffffff";

// Each preset background has a hand-picked dark companion.
const PRESET_TEXT_COLORS: [(&str, &str); 10] = [
    ("#dbeafe", "#1e40af"),
    ("#dcfce7", "#166534"),
    ("#fef3c7", "#92400e"),
    ("#fce7f3", "#be185d"),
    ("#e0e7ff", "#3730a3"),
    ("#f0f9ff", "#0c4a6e"),
    ("#f0fdf4", "#14532d"),
    ("#fefce8", "#a16207"),
    ("#fef2f2", "#991b1b"),
    ("#f5f3ff", "#581c87"),
];

/// Picks a readable text colour for a tag background.
pub fn text_color_for_bg(hex: Option<&str>) -> &'static str {
    let hex = match hex {
        Some(h) if h.len() >= 7 => h,
        _ => return FALLBACK_TEXT_COLOR,
    };

    if let Some((_, text)) = PRESET_TEXT_COLORS.iter().find(|(bg, _)| *bg == hex) {
        return *text;
    }

    match (channel(hex, 1..3), channel(hex, 3..5), channel(hex, 5..7)) {
        (Some(r), Some(g), Some(b)) if (0.299 * r + 0.587 * g + 0.114 * b) / 255.0 > 0.7 => {
            LIGHT_BG_TEXT_COLOR
        }
        // Unparseable channels never count as light.
        _ => DARK_BG_TEXT_COLOR,
    }
}

/// Reads the leading hex digits of a two-character channel, so `"4z"` is 4
/// and `"zz"` is `None`.
fn channel(hex: &str, range: std::ops::Range<usize>) -> Option<f64> {
    let digits = hex.get(range)?;
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    u8::from_str_radix(&digits[..end], 16).ok().map(f64::from)
}

/// A tag with the number of templates using it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUsage {
    pub tag: Tag,
    pub count: usize,
}

/// Most used template tags, by descending count.
///
/// Ties keep the order in which tags were first seen. The colour of the
/// first template carrying a tag wins.
pub fn popular_tags(templates: &[Template], max_count: usize) -> Vec<TagUsage> {
    let mut order: Vec<TagUsage> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tag in templates.iter().filter_map(Template::tag) {
        match index.get(&tag.tag_name) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(tag.tag_name.clone(), order.len());
                order.push(TagUsage { tag, count: 1 });
            }
        }
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(max_count);
    order
}

/// First distinct tags in history order (history arrives newest first).
pub fn recent_tags(history: &[LinkRecord], max_count: usize) -> Vec<Tag> {
    let mut seen = Vec::new();
    let mut result: Vec<Tag> = Vec::new();
    for tag in history.iter().filter_map(LinkRecord::tag) {
        if result.len() >= max_count {
            break;
        }
        if seen.contains(&tag.tag_name) {
            continue;
        }
        seen.push(tag.tag_name.clone());
        result.push(tag);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_template(id: i64, tag: &str) -> Template {
        let mut t = Template::new(id, "t", "2024-01-01");
        t.tag_name = Some(tag.to_string());
        t.tag_color = Some("#dcfce7".to_string());
        t
    }

    #[test]
    fn preset_background_uses_mapped_colour() {
        assert_eq!(text_color_for_bg(Some("#dbeafe")), "#1e40af");
        assert_eq!(text_color_for_bg(Some("#f5f3ff")), "#581c87");
    }

    #[test]
    fn arbitrary_colours_use_luminance() {
        assert_eq!(text_color_for_bg(Some("#ffffff")), "#374151");
        assert_eq!(text_color_for_bg(Some("#000000")), "#ffffff");
        assert_eq!(text_color_for_bg(Some("#1e40af")), "#ffffff");
    }

    #[test]
    fn missing_or_short_colour_falls_back() {
        assert_eq!(text_color_for_bg(None), FALLBACK_TEXT_COLOR);
        assert_eq!(text_color_for_bg(Some("#fff")), FALLBACK_TEXT_COLOR);
    }

    #[test]
    fn unparseable_colour_gets_light_text() {
        assert_eq!(text_color_for_bg(Some("#zzzzzz")), "#ffffff");
        assert_eq!(text_color_for_bg(Some("#ffffzz")), "#ffffff");
        // Leading digits still count: "fz" reads as 0xf.
        assert_eq!(text_color_for_bg(Some("#fzfzfz")), "#ffffff");
        assert_eq!(text_color_for_bg(Some("#ffffffzz")), "#374151");
    }

    #[test]
    fn popular_tags_count_templates() {
        let templates = vec![
            tagged_template(1, "Email"),
            tagged_template(2, "Ads"),
            tagged_template(3, "Ads"),
            Template::new(4, "untagged", "2024-01-01"),
            tagged_template(5, "Social"),
        ];
        let top = popular_tags(&templates, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].tag.tag_name, "Ads");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].tag.tag_name, "Email");
    }

    #[test]
    fn recent_tags_are_distinct_in_history_order() {
        let mut history = Vec::new();
        for (i, tag) in ["A", "B", "A", "C", "D"].iter().enumerate() {
            let mut r = LinkRecord::new(i as i64, "https://x.example", "2024-01-01");
            r.tag_name = Some(tag.to_string());
            history.push(r);
        }
        let names: Vec<_> = recent_tags(&history, 3)
            .into_iter()
            .map(|t| t.tag_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
