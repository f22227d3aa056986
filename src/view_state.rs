//! Which view is active, and how each record panel is displayed.
use std::{fmt, str::FromStr};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    DateRange, PreferenceStore, Result, SortDirection, SortSpec, UtmError,
    HISTORY_SORT_COLUMN_KEY, HISTORY_SORT_DIRECTION_KEY, HISTORY_VIEW_MODE_KEY, LANG_KEY,
    LAST_VIEW_KEY, TEMPLATES_SORT_COLUMN_KEY, TEMPLATES_SORT_DIRECTION_KEY,
    TEMPLATES_VIEW_MODE_KEY, THEME_KEY,
};

pub const DEFAULT_LANG: &str = "ru";
pub const DEFAULT_THEME: &str = "dark";
pub const SUPPORTED_LANGS: [&str; 2] = ["ru", "en"];
pub const SUPPORTED_THEMES: [&str; 2] = ["dark", "light"];

/// Top-level sections of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Generator,
    History,
    Templates,
    Help,
}

impl View {
    pub const ALL: [View; 4] = [View::Generator, View::History, View::Templates, View::Help];

    /// Section that has to be redrawn after entering this view.
    pub fn section(self) -> Option<Section> {
        match self {
            View::Generator => Some(Section::RecentTemplates),
            View::History => Some(Section::History),
            View::Templates => Some(Section::Templates),
            View::Help => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            View::Generator => "generator",
            View::History => "history",
            View::Templates => "templates",
            View::Help => "help",
        })
    }
}

impl FromStr for View {
    type Err = UtmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_start_matches('#').to_lowercase().as_str() {
            "generator" => Ok(View::Generator),
            "history" => Ok(View::History),
            "templates" => Ok(View::Templates),
            "help" => Ok(View::Help),
            other => Err(UtmError::validation(format!(
                "Unknown view: {}. Must be one of: generator, history, templates, help",
                other
            ))),
        }
    }
}

/// Renderable regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    History,
    Templates,
    /// The strip of recent templates shown under the generator
    RecentTemplates,
}

/// The two record panels with independent display settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    History,
    Templates,
}

impl Panel {
    pub fn section(self) -> Section {
        match self {
            Panel::History => Section::History,
            Panel::Templates => Section::Templates,
        }
    }

    fn keys(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Panel::History => (
                HISTORY_VIEW_MODE_KEY,
                HISTORY_SORT_COLUMN_KEY,
                HISTORY_SORT_DIRECTION_KEY,
            ),
            Panel::Templates => (
                TEMPLATES_VIEW_MODE_KEY,
                TEMPLATES_SORT_COLUMN_KEY,
                TEMPLATES_SORT_DIRECTION_KEY,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Grid,
    List,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Table => "table",
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        })
    }
}

impl FromStr for ViewMode {
    type Err = UtmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(ViewMode::Table),
            "grid" => Ok(ViewMode::Grid),
            "list" => Ok(ViewMode::List),
            other => Err(UtmError::validation(format!(
                "Invalid view mode: {}. Must be one of: table, grid, list",
                other
            ))),
        }
    }
}

/// Display settings of one record panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub mode: ViewMode,
    pub search: String,
    pub sort: SortSpec,
}

impl PanelState {
    /// Header click: the current column flips direction, any other column
    /// becomes current in ascending order.
    pub fn toggle_sort(&mut self, column: &str) {
        if self.sort.column == column {
            self.sort.direction = self.sort.direction.flipped();
        } else {
            self.sort = SortSpec::new(column, SortDirection::Asc);
        }
    }
}

/// One entry of the navigation bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub view: View,
    pub active: bool,
}

/// Everything that decides what the client shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub active_view: View,
    pub history: PanelState,
    pub templates: PanelState,
    pub history_date_range: Option<DateRange>,
    pub lang: String,
    pub theme: String,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            active_view: View::default(),
            history: PanelState::default(),
            templates: PanelState::default(),
            history_date_range: None,
            lang: DEFAULT_LANG.to_string(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

fn stored_or_default<T: FromStr + Default>(prefs: &PreferenceStore, key: &str) -> T {
    match prefs.get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value '{}' for {}", raw, key);
            T::default()
        }),
        None => T::default(),
    }
}

fn stored_choice(prefs: &PreferenceStore, key: &str, allowed: &[&str], default: &str) -> String {
    match prefs.get(key) {
        Some(raw) if allowed.contains(&raw) => raw.to_string(),
        Some(raw) => {
            warn!("Ignoring invalid value '{}' for {}", raw, key);
            default.to_string()
        }
        None => default.to_string(),
    }
}

impl ViewState {
    /// Restores state from the preference store. Missing or unusable values
    /// fall back to their defaults, so every field is always usable.
    pub fn load(prefs: &PreferenceStore) -> ViewState {
        let mut state = ViewState {
            active_view: stored_or_default(prefs, LAST_VIEW_KEY),
            lang: stored_choice(prefs, LANG_KEY, &SUPPORTED_LANGS, DEFAULT_LANG),
            theme: stored_choice(prefs, THEME_KEY, &SUPPORTED_THEMES, DEFAULT_THEME),
            ..ViewState::default()
        };

        for panel in [Panel::History, Panel::Templates] {
            let (mode_key, column_key, direction_key) = panel.keys();
            let target = state.panel_mut(panel);
            target.mode = stored_or_default(prefs, mode_key);
            target.sort.direction = stored_or_default(prefs, direction_key);
            if let Some(column) = prefs.get(column_key).map(str::trim).filter(|c| !c.is_empty()) {
                target.sort.column = column.to_string();
            }
        }

        debug!("Loaded view state: {:?}", state);
        state
    }

    /// Writes the persisted fields back. Searches and the date range are
    /// per-session and stay out of the store.
    pub fn save(&self, prefs: &mut PreferenceStore) -> Result<()> {
        prefs.set(LAST_VIEW_KEY, &self.active_view.to_string())?;
        prefs.set(LANG_KEY, &self.lang)?;
        prefs.set(THEME_KEY, &self.theme)?;
        for panel in [Panel::History, Panel::Templates] {
            let (mode_key, column_key, direction_key) = panel.keys();
            let state = self.panel(panel);
            prefs.set(mode_key, &state.mode.to_string())?;
            prefs.set(column_key, &state.sort.column)?;
            prefs.set(direction_key, &state.sort.direction.to_string())?;
        }
        Ok(())
    }

    pub fn panel(&self, panel: Panel) -> &PanelState {
        match panel {
            Panel::History => &self.history,
            Panel::Templates => &self.templates,
        }
    }

    pub fn panel_mut(&mut self, panel: Panel) -> &mut PanelState {
        match panel {
            Panel::History => &mut self.history,
            Panel::Templates => &mut self.templates,
        }
    }

    /// Makes `target` the only active view and returns the navigation bar.
    pub fn switch_view(&mut self, target: View) -> Vec<NavItem> {
        if self.active_view != target {
            debug!("Switching view {} -> {}", self.active_view, target);
        }
        self.active_view = target;
        self.nav_items()
    }

    pub fn nav_items(&self) -> Vec<NavItem> {
        View::ALL
            .iter()
            .map(|&view| NavItem {
                view,
                active: view == self.active_view,
            })
            .collect()
    }

    pub fn set_lang(&mut self, lang: &str) -> Result<()> {
        let lang = lang.trim().to_lowercase();
        if !SUPPORTED_LANGS.contains(&lang.as_str()) {
            return Err(UtmError::validation(format!(
                "Unsupported language: {}. Must be one of: ru, en",
                lang
            )));
        }
        self.lang = lang;
        Ok(())
    }

    pub fn set_theme(&mut self, theme: &str) -> Result<()> {
        let theme = theme.trim().to_lowercase();
        if !SUPPORTED_THEMES.contains(&theme.as_str()) {
            return Err(UtmError::validation(format!(
                "Unsupported theme: {}. Must be one of: dark, light",
                theme
            )));
        }
        self.theme = theme;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_to_history_marks_only_history() {
        let mut state = ViewState::default();
        let nav = state.switch_view(View::History);
        let active: Vec<_> = nav.iter().filter(|n| n.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].view, View::History);
        assert_eq!(state.active_view, View::History);
    }

    #[test]
    fn header_click_toggles_then_switches_column() {
        let mut panel = PanelState::default();
        assert_eq!(panel.sort.key(), "created_at_desc");

        panel.toggle_sort("created_at");
        assert_eq!(panel.sort.direction, SortDirection::Asc);
        panel.toggle_sort("created_at");
        assert_eq!(panel.sort.direction, SortDirection::Desc);

        panel.toggle_sort("name");
        assert_eq!(panel.sort, SortSpec::new("name", SortDirection::Asc));
    }

    #[test]
    fn garbage_preferences_resolve_to_defaults() {
        let mut prefs = PreferenceStore::in_memory();
        prefs.set(HISTORY_VIEW_MODE_KEY, "mosaic").unwrap();
        prefs.set(HISTORY_SORT_DIRECTION_KEY, "sideways").unwrap();
        prefs.set(TEMPLATES_SORT_COLUMN_KEY, "   ").unwrap();
        prefs.set(LANG_KEY, "de").unwrap();
        prefs.set(LAST_VIEW_KEY, "nowhere").unwrap();

        let state = ViewState::load(&prefs);
        assert_eq!(state.history.mode, ViewMode::Table);
        assert_eq!(state.history.sort.direction, SortDirection::Desc);
        assert_eq!(state.templates.sort.column, "created_at");
        assert_eq!(state.lang, "ru");
        assert_eq!(state.active_view, View::Generator);
    }

    #[test]
    fn saved_state_loads_back() {
        let mut prefs = PreferenceStore::in_memory();
        let mut state = ViewState::default();
        state.templates.mode = ViewMode::Grid;
        state.history.toggle_sort("utm_source");
        state.set_lang("en").unwrap();
        state.switch_view(View::Templates);
        state.history.search = "spring".into();
        state.save(&mut prefs).unwrap();

        assert_eq!(prefs.get(TEMPLATES_VIEW_MODE_KEY), Some("grid"));
        assert_eq!(prefs.get(HISTORY_SORT_COLUMN_KEY), Some("utm_source"));
        assert_eq!(prefs.get(HISTORY_SORT_DIRECTION_KEY), Some("asc"));

        let restored = ViewState::load(&prefs);
        assert_eq!(restored.templates.mode, ViewMode::Grid);
        assert_eq!(restored.history.sort.column, "utm_source");
        assert_eq!(restored.lang, "en");
        assert_eq!(restored.active_view, View::Templates);
        assert!(restored.history.search.is_empty());
    }

    #[test]
    fn views_parse_from_hash_fragments() {
        assert_eq!("#templates".parse::<View>().unwrap(), View::Templates);
        assert!("settings".parse::<View>().is_err());
    }
}
