//! Terminal rendering of the record panels, the recent-templates strip and
//! the navigation bar.
//!
//! Everything returns a `String` so the controller decides when output is
//! written. Widths are measured with `console`, which ignores ANSI escapes.
use console::{pad_str, style, truncate_str, Alignment, Color, Style};

use crate::{
    epoch, parse_date, text_color_for_bg, LinkRecord, NavItem, PanelState, SortDirection, Tag,
    TagUsage, Template, ViewMode, ViewState,
};

/// Templates shown under the generator, newest first
pub const RECENT_TEMPLATES_LIMIT: usize = 16;

const DEFAULT_WIDTH: usize = 100;
const CARD_WIDTH: usize = 38;
const CARD_GAP: &str = "  ";

/// Current terminal width, or a sensible default when not attached to one.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Settings shared by every render call
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub lang: String,
    pub theme: String,
    pub width: usize,
}

impl RenderContext {
    pub fn from_state(state: &ViewState, width: usize) -> Self {
        RenderContext {
            lang: state.lang.clone(),
            theme: state.theme.clone(),
            width,
        }
    }

    fn english(&self) -> bool {
        self.lang == "en"
    }

    fn text<'a>(&self, ru: &'a str, en: &'a str) -> &'a str {
        if self.english() {
            en
        } else {
            ru
        }
    }

    fn accent(&self) -> Style {
        if self.theme == "light" {
            Style::new().blue().bold()
        } else {
            Style::new().cyan().bold()
        }
    }
}

/// Formats a backend timestamp in the locale of the interface language.
pub fn format_date(raw: Option<&str>, lang: &str) -> String {
    let parsed = parse_date(raw);
    if parsed == epoch() && raw.map_or(true, |r| r.trim().is_empty()) {
        return "-".to_string();
    }
    if lang == "en" {
        parsed.format("%m/%d/%Y, %I:%M:%S %p").to_string()
    } else {
        parsed.format("%d.%m.%Y, %H:%M:%S").to_string()
    }
}

// Nearest colour of the xterm 6x6x6 cube.
fn hex_to_ansi256(hex: &str) -> Option<u8> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(hex.get(i..i + 2)?, 16)
            .ok()
            .map(|v| ((u16::from(v) * 5 + 127) / 255) as u8)
    };
    Some(16 + 36 * channel(0)? + 6 * channel(2)? + channel(4)?)
}

/// A tag as a coloured badge.
pub fn render_tag(tag: &Tag) -> String {
    let label = format!(" {} ", tag.tag_name);
    let mut badge = Style::new().bold();
    if let Some(bg) = hex_to_ansi256(&tag.tag_color) {
        badge = badge.bg(Color::Color256(bg));
    }
    let fg = text_color_for_bg(Some(tag.tag_color.as_str()).filter(|c| !c.is_empty()));
    if let Some(fg) = hex_to_ansi256(fg) {
        badge = badge.fg(Color::Color256(fg));
    }
    badge.apply_to(label).to_string()
}

fn optional_tag(tag: Option<Tag>) -> String {
    tag.map(|t| render_tag(&t)).unwrap_or_default()
}

fn cell(text: &str, width: usize) -> String {
    pad_str(text, width, Alignment::Left, Some("…")).into_owned()
}

fn header(ctx: &RenderContext, columns: &[(&str, &str, usize)], panel: &PanelState) -> String {
    columns
        .iter()
        .map(|(key, label, width)| {
            let marker = if panel.sort.column == *key {
                match panel.sort.direction {
                    SortDirection::Asc => " ▲",
                    SortDirection::Desc => " ▼",
                }
            } else {
                ""
            };
            ctx.accent()
                .apply_to(cell(&format!("{}{}", label, marker), *width))
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn empty_message(ctx: &RenderContext, total: usize, ru_empty: &str, en_empty: &str) -> String {
    let text = if total == 0 {
        ctx.text(ru_empty, en_empty)
    } else {
        ctx.text("Ничего не найдено", "No records match the filters")
    };
    style(text).dim().to_string()
}

fn card_grid(ctx: &RenderContext, cards: Vec<Vec<String>>) -> String {
    let per_row = (ctx.width / (CARD_WIDTH + CARD_GAP.len())).max(1);
    let border = format!("+{}+", "-".repeat(CARD_WIDTH - 2));
    let mut out = Vec::new();

    for row in cards.chunks(per_row) {
        let height = row.iter().map(Vec::len).max().unwrap_or(0);
        out.push(vec![border.as_str(); row.len()].join(CARD_GAP));
        for line in 0..height {
            let joined = row
                .iter()
                .map(|card| {
                    let text = card.get(line).map(String::as_str).unwrap_or("");
                    format!("|{}|", cell(text, CARD_WIDTH - 2))
                })
                .collect::<Vec<_>>()
                .join(CARD_GAP);
            out.push(joined);
        }
        out.push(vec![border.as_str(); row.len()].join(CARD_GAP));
    }
    out.join("\n")
}

/// Renders the (already filtered and sorted) history panel.
pub fn render_history(
    ctx: &RenderContext,
    records: &[LinkRecord],
    total: usize,
    panel: &PanelState,
) -> String {
    if records.is_empty() {
        return empty_message(ctx, total, "История пуста", "History is empty");
    }

    match panel.mode {
        ViewMode::Table => {
            let fixed = 8 + 22 + 12 + 12 + 16 + 6;
            let url_width = ctx.width.saturating_sub(fixed).max(20);
            let columns = [
                ("id", "ID", 8),
                ("created_at", ctx.text("Дата", "Date"), 22),
                ("full_url", "URL", url_width),
                ("utm_source", "Source", 12),
                ("utm_medium", "Medium", 12),
                ("tag_name", ctx.text("Тег", "Tag"), 16),
            ];
            let mut lines = vec![header(ctx, &columns, panel)];
            for record in records {
                let tag = record
                    .tag()
                    .map(|t| truncate_str(&render_tag(&t), 16, "…").into_owned())
                    .unwrap_or_default();
                lines.push(
                    [
                        cell(&record.id.to_string(), 8),
                        cell(&format_date(record.created_at.as_deref(), &ctx.lang), 22),
                        cell(record.share_url(), url_width),
                        cell(record.utm_source.as_deref().unwrap_or(""), 12),
                        cell(record.utm_medium.as_deref().unwrap_or(""), 12),
                        tag,
                    ]
                    .join(" "),
                );
            }
            lines.join("\n")
        }
        ViewMode::Grid => {
            let cards = records
                .iter()
                .map(|record| {
                    let date = format_date(record.created_at.as_deref(), &ctx.lang);
                    let mut card = vec![
                        format!("#{}  {}", record.id, date),
                        record.display_url().to_string(),
                    ];
                    if let Some(short) = record.short_url.as_deref().filter(|s| !s.is_empty()) {
                        card.push(style(short).green().to_string());
                    }
                    card.push(optional_tag(record.tag()));
                    card
                })
                .collect();
            card_grid(ctx, cards)
        }
        ViewMode::List => records
            .iter()
            .map(|record| {
                format!(
                    "{} {} {} {}",
                    style(format!("#{}", record.id)).dim(),
                    format_date(record.created_at.as_deref(), &ctx.lang),
                    record.share_url(),
                    optional_tag(record.tag())
                )
                .trim_end()
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Renders the (already filtered and sorted) templates panel.
pub fn render_templates(
    ctx: &RenderContext,
    templates: &[Template],
    total: usize,
    panel: &PanelState,
) -> String {
    if templates.is_empty() {
        return empty_message(ctx, total, "Шаблонов пока нет", "No templates yet");
    }

    let utm = |t: &Template| {
        t.utm_params()
            .pairs()
            .iter()
            .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| format!("{}={}", k, v)))
            .collect::<Vec<_>>()
    };

    match panel.mode {
        ViewMode::Table => {
            let columns = [
                ("id", "ID", 6),
                ("name", ctx.text("Название", "Name"), 20),
                ("utm_source", "Source", 12),
                ("utm_medium", "Medium", 12),
                ("utm_campaign", "Campaign", 14),
                ("tag_name", ctx.text("Тег", "Tag"), 14),
                ("created_at", ctx.text("Дата", "Date"), 22),
            ];
            let mut lines = vec![header(ctx, &columns, panel)];
            for template in templates {
                let field = |v: &Option<String>, w| cell(v.as_deref().unwrap_or(""), w);
                let tag = template
                    .tag()
                    .map(|t| truncate_str(&render_tag(&t), 14, "…").into_owned())
                    .unwrap_or_default();
                lines.push(
                    [
                        cell(&template.id.to_string(), 6),
                        cell(&template.name, 20),
                        field(&template.utm_source, 12),
                        field(&template.utm_medium, 12),
                        field(&template.utm_campaign, 14),
                        cell(&tag, 14),
                        format_date(template.created_at.as_deref(), &ctx.lang),
                    ]
                    .join(" "),
                );
            }
            lines.join("\n")
        }
        ViewMode::Grid => {
            let cards = templates
                .iter()
                .map(|template| {
                    let mut card = vec![format!(
                        "#{}  {}",
                        template.id,
                        style(&template.name).bold()
                    )];
                    card.extend(utm(template));
                    card.push(optional_tag(template.tag()));
                    card
                })
                .collect();
            card_grid(ctx, cards)
        }
        ViewMode::List => templates
            .iter()
            .map(|template| {
                format!(
                    "{} {} {} {}",
                    style(format!("#{}", template.id)).dim(),
                    style(&template.name).bold(),
                    utm(template).join("&"),
                    optional_tag(template.tag())
                )
                .trim_end()
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// The most recently created templates, newest first.
pub fn recent_templates(templates: &[Template]) -> Vec<&Template> {
    let mut recent: Vec<&Template> = templates.iter().collect();
    recent.sort_by(|a, b| {
        parse_date(b.created_at.as_deref()).cmp(&parse_date(a.created_at.as_deref()))
    });
    recent.truncate(RECENT_TEMPLATES_LIMIT);
    recent
}

pub fn render_recent_templates(ctx: &RenderContext, templates: &[Template]) -> String {
    let recent = recent_templates(templates);
    if recent.is_empty() {
        return style(ctx.text("Сохранённых шаблонов нет", "No saved templates"))
            .dim()
            .to_string();
    }

    let mut lines = vec![ctx
        .accent()
        .apply_to(ctx.text("Недавние шаблоны", "Recent templates"))
        .to_string()];
    let mut line = String::new();
    for template in recent {
        let chip = match template.tag() {
            Some(tag) => format!("[{}] {}", template.name, render_tag(&tag)),
            None => format!("[{}]", template.name),
        };
        let needed = console::measure_text_width(&line) + 1 + console::measure_text_width(&chip);
        if !line.is_empty() && needed > ctx.width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&chip);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// Popular and recently used tags offered when tagging.
pub fn render_tag_suggestions(ctx: &RenderContext, popular: &[TagUsage], recent: &[Tag]) -> String {
    let mut lines = Vec::new();
    if !popular.is_empty() {
        let badges = popular
            .iter()
            .map(|usage| format!("{} ×{}", render_tag(&usage.tag), usage.count))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(format!("{}: {}", ctx.text("Популярные", "Popular"), badges));
    }
    if !recent.is_empty() {
        let badges = recent.iter().map(render_tag).collect::<Vec<_>>().join("  ");
        lines.push(format!("{}: {}", ctx.text("Недавние", "Recent"), badges));
    }
    lines.join("\n")
}

pub fn render_nav(items: &[NavItem]) -> String {
    items
        .iter()
        .map(|item| {
            let label = item.view.to_string();
            if item.active {
                style(format!("[{}]", label)).reverse().bold().to_string()
            } else {
                format!(" {} ", label)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{View, ViewState};

    fn ctx(lang: &str) -> RenderContext {
        RenderContext {
            lang: lang.to_string(),
            theme: "dark".to_string(),
            width: 120,
        }
    }

    #[test]
    fn dates_follow_interface_language() {
        let raw = Some("2024-03-05 14:07:09");
        assert_eq!(format_date(raw, "ru"), "05.03.2024, 14:07:09");
        assert_eq!(format_date(raw, "en"), "03/05/2024, 02:07:09 PM");
        assert_eq!(format_date(None, "ru"), "-");
    }

    #[test]
    fn tag_colours_map_into_the_cube() {
        assert_eq!(hex_to_ansi256("#000000"), Some(16));
        assert_eq!(hex_to_ansi256("#ffffff"), Some(231));
        assert_eq!(hex_to_ansi256("#fff"), None);
    }

    #[test]
    fn empty_panels_explain_why() {
        let panel = PanelState::default();
        let empty = render_history(&ctx("en"), &[], 0, &panel);
        assert!(empty.contains("History is empty"));
        let filtered = render_templates(&ctx("en"), &[], 3, &panel);
        assert!(filtered.contains("No records match"));
    }

    #[test]
    fn every_view_mode_lists_each_record() {
        let mut record = LinkRecord::new(11, "https://shop.example/?utm_source=vk", "2024-01-01");
        record.short_url = Some("https://clck.ru/xyz".into());
        let records = vec![record, LinkRecord::new(12, "https://other.example/", "2024-01-02")];

        for mode in [ViewMode::Table, ViewMode::Grid, ViewMode::List] {
            let panel = PanelState {
                mode,
                ..Default::default()
            };
            let out = render_history(&ctx("ru"), &records, 2, &panel);
            assert!(out.contains("11"), "{:?} output: {}", mode, out);
            assert!(out.contains("other.example"), "{:?} output: {}", mode, out);
        }
    }

    #[test]
    fn recent_strip_is_newest_first_and_capped() {
        let templates: Vec<Template> = (1..=20)
            .map(|i| Template::new(i, &format!("T{}", i), &format!("2024-01-{:02}", i)))
            .collect();
        let recent = recent_templates(&templates);
        assert_eq!(recent.len(), RECENT_TEMPLATES_LIMIT);
        assert_eq!(recent[0].name, "T20");
        assert_eq!(recent[15].name, "T5");
    }

    #[test]
    fn nav_bar_brackets_the_active_view() {
        let mut state = ViewState::default();
        let nav = render_nav(&state.switch_view(View::History));
        assert!(nav.contains("[history]"));
        assert!(!nav.contains("[generator]"));
    }
}
