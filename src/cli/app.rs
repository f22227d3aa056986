//! CLI module for the utmka application
//!
//! This module turns parsed commands into controller calls and prints the
//! results as panels and one-line toasts.
use std::path::{Path, PathBuf};

use console::style;
use log::{debug, info};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    overlay_params, parse_tag, render_nav, render_tag_suggestions, toast_success, utm_params,
    AppController, Collection, Commands, Config, DateRange, ExportFormat, ExportOutcome,
    HistoryCommand, Panel, RecordId, RenderBatch, RenderContext, Result, SortSpec, Tag,
    TemplatesCommand, UtmError, View, ViewMode,
};

const HELP_TEXT: &str = "\
utmka builds links tagged with utm_source, utm_medium, utm_campaign,
utm_content and utm_term, keeps every generated link in history, and
stores reusable parameter sets as templates.

  utmka generate shop.example -s google -m cpc      build and save a link
  utmka generate -T 3 shop.example/spring           use template #3
  utmka history list -s \"google cpc\" -d 2024-01-01_2024-01-31
  utmka sort history utm_source                     click a column header
  utmka templates import templates.csv              bulk import";

/// CLI Application handler - processes CLI commands through the controller
pub struct App {
    controller: AppController,

    /// Debounced renders produced by the controller
    renders: UnboundedReceiver<RenderBatch>,

    /// Where `config` changes are written
    config_path: PathBuf,

    /// Whether to display verbose output
    verbose: bool,
}

fn parse_id(raw: &str) -> RecordId {
    match raw.parse() {
        Ok(id) => id,
        Err(never) => match never {},
    }
}

fn parse_panel(raw: &str) -> Result<Panel> {
    match raw {
        "history" => Ok(Panel::History),
        "templates" => Ok(Panel::Templates),
        other => Err(UtmError::validation(format!(
            "Unknown panel: {}. Must be one of: history, templates",
            other
        ))),
    }
}

impl App {
    pub fn new(
        controller: AppController,
        renders: UnboundedReceiver<RenderBatch>,
        config_path: PathBuf,
        verbose: bool,
    ) -> Self {
        Self {
            controller,
            renders,
            config_path,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        let needs_data = !matches!(command, Commands::Config { .. } | Commands::Shorten { .. });
        if needs_data {
            self.load().await?;
        }

        match command {
            Commands::Generate {
                url,
                template,
                from_history,
                source,
                medium,
                campaign,
                content,
                term,
                tag_name,
                tag_color,
                shorten,
                save_as,
            } => {
                if let Some(id) = template {
                    self.controller.apply_template(&parse_id(&id))?;
                }
                if let Some(id) = from_history {
                    self.controller.apply_history(&parse_id(&id))?;
                }

                let tag = parse_tag(tag_name, tag_color);
                let form = self.controller.form_mut();
                if let Some(url) = url {
                    form.url = url;
                }
                overlay_params(
                    &mut form.params,
                    utm_params(source, medium, campaign, content, term),
                );
                if tag.is_some() {
                    form.pending_tag = tag.clone();
                }

                self.handle_generate(shorten, save_as, tag).await?;
            }

            Commands::History { command } => self.handle_history(command).await?,

            Commands::Templates { command } => self.handle_templates(command).await?,

            Commands::View { view } => self.handle_view(view.parse()?).await?,

            Commands::Sort { panel, column } => {
                let panel = parse_panel(&panel)?;
                let sort = self.controller.toggle_sort(panel, &column)?;
                self.discard_renders().await;
                println!(
                    "{} {}",
                    style("Sorted by").dim(),
                    style(sort.key()).bold()
                );
                println!("{}", self.controller.render_section(panel.section()));
            }

            Commands::Prefs {
                lang,
                theme,
                history_view,
                templates_view,
            } => {
                self.handle_prefs(lang, theme, history_view, templates_view)
                    .await?
            }

            Commands::Update { download, install } => self.handle_update(download, install).await?,

            Commands::Shorten { url } => {
                let short = self.controller.shorten_url(&url).await?;
                println!("{}", short);
                toast_success("Short link ready");
            }

            Commands::Config { show, set, reset } => self.handle_config(show, set, reset)?,
        }

        Ok(())
    }

    /// Reconciles preferences with the server and fetches both collections.
    async fn load(&mut self) -> Result<()> {
        if self.controller.sync_preferences().await? {
            debug!("Preferences updated from server");
        }
        self.controller.refresh().await;
        // Commands print their own panels; the startup redraw is not shown.
        self.controller.cancel_render();

        if self.controller.config().check_updates {
            if let Some(update) = self.controller.check_for_updates().await {
                if update.available {
                    println!(
                        "{} {} -> {}",
                        style("Update available:").yellow().bold(),
                        update.current_version.unwrap_or_default(),
                        update.latest_version.unwrap_or_default()
                    );
                }
            }
        }
        Ok(())
    }

    /// Waits for the pending render and prints what it produced.
    async fn print_renders(&mut self) {
        self.controller.settle().await;
        while let Ok(batch) = self.renders.try_recv() {
            for (section, body) in batch.sections {
                if self.verbose {
                    println!("{}", style(format!("-- {:?} --", section)).dim());
                }
                println!("{}", body);
            }
        }
    }

    async fn discard_renders(&mut self) {
        self.controller.settle().await;
        while self.renders.try_recv().is_ok() {}
    }

    async fn handle_generate(
        &mut self,
        shorten: bool,
        save_as: Option<String>,
        tag: Option<Tag>,
    ) -> Result<()> {
        let url = self.controller.generate().await?;
        println!("{}", style(&url).bold());
        toast_success("Link generated and saved to history");

        if shorten {
            let short = match self.controller.state().last_history_id.clone() {
                Some(id) => self.controller.shorten_history(&id).await?,
                None => self.controller.shorten_url(&url).await?,
            };
            println!("{}", style(&short).green());
            toast_success("Short link saved");
        }

        if let Some(name) = save_as {
            self.controller.save_template(&name, tag).await?;
            toast_success(&format!("Template '{}' saved", name.trim()));
        }

        self.discard_renders().await;
        Ok(())
    }

    fn export_dir(&self, output: Option<PathBuf>) -> PathBuf {
        output.unwrap_or_else(|| self.controller.config().exports_dir())
    }

    fn report_export(&self, outcome: &ExportOutcome) {
        if outcome.written_locally {
            toast_success(&format!(
                "Exported {} records to {}",
                outcome.count,
                outcome.path.display()
            ));
        } else {
            toast_success(&format!(
                "Exported {} records; the server saved {}",
                outcome.count,
                outcome.path.display()
            ));
        }
    }

    fn apply_listing_options(
        &mut self,
        panel: Panel,
        search: Option<String>,
        sort: Option<String>,
        view: Option<String>,
    ) -> Result<()> {
        if let Some(search) = search {
            self.controller.set_search(panel, &search);
        }
        if let Some(sort) = sort {
            self.controller.set_sort(panel, SortSpec::from_key(&sort))?;
        }
        if let Some(view) = view {
            self.controller.set_view_mode(panel, view.parse::<ViewMode>()?)?;
        }
        Ok(())
    }

    async fn print_panel(&mut self, panel: Panel, json: bool) -> Result<()> {
        self.discard_renders().await;
        let state = self.controller.state();
        let (shown, total) = match panel {
            Panel::History => {
                let visible = self.controller.visible_history();
                if json {
                    println!("{}", serde_json::to_string_pretty(&visible)?);
                    return Ok(());
                }
                (visible.len(), state.history.len())
            }
            Panel::Templates => {
                let visible = self.controller.visible_templates();
                if json {
                    println!("{}", serde_json::to_string_pretty(&visible)?);
                    return Ok(());
                }
                (visible.len(), state.templates.len())
            }
        };

        println!("{}", self.controller.render_section(panel.section()));
        if shown > 0 {
            println!(
                "\n{}",
                style(format!("Showing {} of {} records.", shown, total)).dim()
            );
        }
        Ok(())
    }

    async fn handle_history(&mut self, command: HistoryCommand) -> Result<()> {
        match command {
            HistoryCommand::List {
                search,
                dates,
                sort,
                view,
                json,
            } => {
                if let Some(dates) = dates {
                    self.controller.set_date_range(Some(DateRange::parse(&dates)?));
                }
                self.apply_listing_options(Panel::History, search, sort, view)?;
                self.print_panel(Panel::History, json).await?;
            }

            HistoryCommand::Delete { id } => {
                self.controller.delete_history(&parse_id(&id)).await?;
                toast_success(&format!("History record {} deleted", id));
            }

            HistoryCommand::Shorten { id } => {
                let short = self.controller.shorten_history(&parse_id(&id)).await?;
                println!("{}", short);
                toast_success("Short link saved");
            }

            HistoryCommand::Tag {
                id,
                name,
                color,
                clear,
            } => {
                let tag = parse_tag(name, color);
                if tag.is_none() && !clear {
                    return Err(UtmError::validation("Give --name for the tag, or --clear"));
                }
                let tag = if clear { None } else { tag };
                self.controller.set_history_tag(&parse_id(&id), tag).await?;
                toast_success("Tag updated");
            }

            HistoryCommand::Import { file } => {
                let count = self.controller.import_history(&file).await?;
                toast_success(&format!("Imported {} history records", count));
            }

            HistoryCommand::Export {
                output,
                format,
                local,
                search,
                dates,
            } => {
                let format: ExportFormat = format.parse()?;
                let dir = self.export_dir(output);
                let outcome = if local {
                    if let Some(dates) = dates {
                        self.controller.set_date_range(Some(DateRange::parse(&dates)?));
                    }
                    if let Some(search) = search {
                        self.controller.set_search(Panel::History, &search);
                    }
                    self.discard_renders().await;
                    self.controller
                        .export_visible(Collection::History, format, &dir)?
                } else {
                    self.controller
                        .export_from_server(Collection::History, format, &dir)
                        .await?
                };
                self.report_export(&outcome);
            }
        }
        Ok(())
    }

    async fn handle_templates(&mut self, command: TemplatesCommand) -> Result<()> {
        match command {
            TemplatesCommand::List {
                search,
                sort,
                view,
                json,
            } => {
                self.apply_listing_options(Panel::Templates, search, sort, view)?;
                self.print_panel(Panel::Templates, json).await?;
            }

            TemplatesCommand::Create {
                name,
                source,
                medium,
                campaign,
                content,
                term,
                tag_name,
                tag_color,
            } => {
                self.controller.form_mut().params =
                    utm_params(source, medium, campaign, content, term);
                self.controller
                    .save_template(&name, parse_tag(tag_name, tag_color))
                    .await?;
                toast_success(&format!("Template '{}' saved", name.trim()));
            }

            TemplatesCommand::Delete { id } => {
                self.controller.delete_template(&parse_id(&id)).await?;
                toast_success(&format!("Template {} deleted", id));
            }

            TemplatesCommand::Import { file } => {
                let count = self.controller.import_templates(&file).await?;
                toast_success(&format!("Imported {} templates", count));
            }

            TemplatesCommand::Export {
                output,
                format,
                local,
                search,
            } => {
                let format: ExportFormat = format.parse()?;
                let dir = self.export_dir(output);
                let outcome = if local {
                    if let Some(search) = search {
                        self.controller.set_search(Panel::Templates, &search);
                    }
                    self.discard_renders().await;
                    self.controller
                        .export_visible(Collection::Templates, format, &dir)?
                } else {
                    self.controller
                        .export_from_server(Collection::Templates, format, &dir)
                        .await?
                };
                self.report_export(&outcome);
            }

            TemplatesCommand::Example { filename, output } => {
                let dir = self.export_dir(output);
                let path =
                    crate::transfer::download_example(self.controller.gateway(), &filename, &dir)
                        .await?;
                toast_success(&format!("Example saved to {}", path.display()));
            }

            TemplatesCommand::Tags => {
                let (popular, recent) = self.controller.tag_suggestions();
                if popular.is_empty() && recent.is_empty() {
                    println!("No tags yet.");
                } else {
                    let ctx = RenderContext::from_state(&self.controller.state().view, 80);
                    println!("{}", render_tag_suggestions(&ctx, &popular, &recent));
                }
            }
        }
        Ok(())
    }

    async fn handle_view(&mut self, view: View) -> Result<()> {
        let nav = self.controller.switch_view(view)?;
        println!("{}\n", render_nav(&nav));
        match view {
            View::Help => println!("{}", HELP_TEXT),
            View::Generator => {
                let form = &self.controller.state().form;
                if !form.url.is_empty() {
                    println!("URL: {}", form.url);
                }
                self.print_renders().await;
            }
            View::History | View::Templates => self.print_renders().await,
        }
        Ok(())
    }

    async fn handle_prefs(
        &mut self,
        lang: Option<String>,
        theme: Option<String>,
        history_view: Option<String>,
        templates_view: Option<String>,
    ) -> Result<()> {
        let changed =
            lang.is_some() || theme.is_some() || history_view.is_some() || templates_view.is_some();

        if let Some(lang) = lang {
            self.controller.set_lang(&lang).await?;
        }
        if let Some(theme) = theme {
            self.controller.set_theme(&theme).await?;
        }
        if let Some(mode) = history_view {
            self.controller
                .set_view_mode(Panel::History, mode.parse()?)?;
        }
        if let Some(mode) = templates_view {
            self.controller
                .set_view_mode(Panel::Templates, mode.parse()?)?;
        }
        self.discard_renders().await;

        let view = &self.controller.state().view;
        println!("Language:        {}", view.lang);
        println!("Theme:           {}", view.theme);
        println!("Last view:       {}", view.active_view);
        println!(
            "History:         {} view, sorted by {}",
            view.history.mode,
            view.history.sort.key()
        );
        println!(
            "Templates:       {} view, sorted by {}",
            view.templates.mode,
            view.templates.sort.key()
        );
        if changed {
            toast_success("Preferences saved");
        }
        Ok(())
    }

    async fn handle_update(&mut self, download: bool, install: Option<String>) -> Result<()> {
        if let Some(path) = install {
            self.controller.gateway().install_update(Some(path.as_str())).await?;
            toast_success("Installer started");
            return Ok(());
        }

        let update = match self.controller.check_for_updates().await {
            Some(update) => update,
            None => {
                println!("Could not check for updates.");
                return Ok(());
            }
        };
        if !update.available {
            println!(
                "You are on the latest version ({}).",
                update.current_version.unwrap_or_default()
            );
            return Ok(());
        }

        println!(
            "{} {} -> {}",
            style("Update available:").yellow().bold(),
            update.current_version.as_deref().unwrap_or("?"),
            update.latest_version.as_deref().unwrap_or("?")
        );
        if let Some(notes) = update.release_notes.as_deref() {
            println!("\n{}", notes);
        }
        if let Some(url) = update.release_url.as_deref() {
            println!("\n{}", style(url).underlined());
        }

        if download {
            let url = update
                .download_url
                .as_deref()
                .ok_or_else(|| UtmError::validation("Release has no installer to download"))?;
            let path = self.controller.gateway().download_update(url).await?;
            toast_success(&format!("Installer downloaded to {}", path));
        }
        Ok(())
    }

    fn handle_config(&self, show: bool, set: Option<String>, reset: bool) -> Result<()> {
        let path: &Path = &self.config_path;

        if reset {
            Config::default().save(path)?;
            toast_success("Configuration reset to defaults");
        }

        if let Some(assignment) = set {
            let mut config = Config::load(path)?;
            config.set(&assignment)?;
            config.save(path)?;
            info!("Updated configuration: {}", assignment);
            toast_success(&format!("Set {}", assignment));
        }

        if show || !reset {
            let config = Config::load(path)?;
            println!("{}", style(path.display()).dim());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_as_numbers_when_possible() {
        assert_eq!(parse_id("17"), RecordId::Int(17));
        assert_eq!(parse_id("abc"), RecordId::Text("abc".into()));
    }

    #[test]
    fn panels_parse_by_name() {
        assert_eq!(parse_panel("templates").unwrap(), Panel::Templates);
        assert!(parse_panel("recent").is_err());
    }

    #[test]
    fn help_text_mentions_every_utm_key() {
        for key in crate::UTM_KEYS {
            assert!(HELP_TEXT.contains(key), "{}", key);
        }
    }
}
