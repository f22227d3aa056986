//! Application controller.
//!
//! `AppController` is the single owner of the in-memory state. Every write
//! goes to the backend first and is followed by a refetch of both
//! collections, so the cached lists always mirror the server.
use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    apply_filters_and_sorting, popular_tags, recent_tags, render_history, render_recent_templates,
    render_templates, terminal_width, transfer, ClckShortener, Collection, Config, DateRange,
    ExportFormat, ExportOutcome, GeneratorForm, LinkRecord, NavItem, NewLinkRecord, NewTemplate,
    Panel, PreferenceStore, RecordId, RenderContext, RestGateway, Result, Section,
    ServerPreferences, SortSpec, Tag, TagUsage, Template, UpdateInfo, UtmError, View, ViewMode,
    ViewState, LAST_VIEW_KEY,
};

/// How many suggestions of each kind the tag picker offers
pub const TAG_SUGGESTIONS: usize = 3;

/// Everything the client knows
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub history: Vec<LinkRecord>,
    pub templates: Vec<Template>,
    pub view: ViewState,
    pub form: GeneratorForm,
    /// Id of the record created by the last successful generation
    pub last_history_id: Option<RecordId>,
    pub last_generated_url: Option<String>,
}

/// Output of one render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBatch {
    pub generation: u64,
    pub sections: Vec<(Section, String)>,
}

/// Sections whose debounce delay has run out and that now need drawing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub generation: u64,
    pub sections: Vec<Section>,
}

/// Delays renders and drops any that a newer request has superseded.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    generation: Arc<AtomicU64>,
    delay: Duration,
    tx: UnboundedSender<RenderRequest>,
}

impl RenderScheduler {
    pub fn new(delay: Duration) -> (Self, UnboundedReceiver<RenderRequest>) {
        let (tx, rx) = unbounded_channel();
        let scheduler = RenderScheduler {
            generation: Arc::new(AtomicU64::new(0)),
            delay,
            tx,
        };
        (scheduler, rx)
    }

    /// Emits `sections` once the debounce delay has passed. The task
    /// resolves to false when a later call superseded it.
    pub fn schedule(&self, sections: Vec<Section>) -> JoinHandle<bool> {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) != mine {
                debug!("Render {} superseded", mine);
                return false;
            }
            tx.send(RenderRequest {
                generation: mine,
                sections,
            })
            .is_ok()
        })
    }

    /// Supersedes whatever is pending without scheduling anything new.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct AppController {
    state: AppState,
    config: Config,
    gateway: RestGateway,
    shortener: ClckShortener,
    prefs: PreferenceStore,
    scheduler: RenderScheduler,
    due: UnboundedReceiver<RenderRequest>,
    renders: UnboundedSender<RenderBatch>,
    pending_render: Option<JoinHandle<bool>>,
    issued_refresh: u64,
    applied_refresh: u64,
    width: usize,
}

impl AppController {
    pub fn new(
        config: Config,
        gateway: RestGateway,
        shortener: ClckShortener,
        prefs: PreferenceStore,
    ) -> (Self, UnboundedReceiver<RenderBatch>) {
        let (scheduler, due) = RenderScheduler::new(config.render_debounce());
        let (renders, rx) = unbounded_channel();
        let state = AppState {
            view: ViewState::load(&prefs),
            ..AppState::default()
        };
        let controller = AppController {
            state,
            config,
            gateway,
            shortener,
            prefs,
            scheduler,
            due,
            renders,
            pending_render: None,
            issued_refresh: 0,
            applied_refresh: 0,
            width: terminal_width(),
        };
        (controller, rx)
    }

    /// Builds every collaborator from the configuration.
    pub fn from_config(config: Config) -> Result<(Self, UnboundedReceiver<RenderBatch>)> {
        let gateway = RestGateway::from_config(&config)?;
        let shortener = ClckShortener::from_config(&config)?;
        let prefs = PreferenceStore::open(&config.preferences_path())?;
        Ok(AppController::new(config, gateway, shortener, prefs))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn gateway(&self) -> &RestGateway {
        &self.gateway
    }

    pub fn form_mut(&mut self) -> &mut GeneratorForm {
        &mut self.state.form
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    // ---- fetching ----

    /// Reserves a refresh generation. Results are applied with
    /// [`AppController::apply_refresh`].
    pub fn begin_refresh(&mut self) -> u64 {
        self.issued_refresh += 1;
        self.issued_refresh
    }

    /// Installs fetched collections unless a newer refresh already landed.
    pub fn apply_refresh(
        &mut self,
        generation: u64,
        history: Vec<LinkRecord>,
        templates: Vec<Template>,
    ) -> bool {
        if generation < self.applied_refresh {
            debug!(
                "Discarding refresh {} (already applied {})",
                generation, self.applied_refresh
            );
            return false;
        }
        self.applied_refresh = generation;
        self.state.history = history;
        self.state.templates = templates;
        true
    }

    /// Refetches both collections and schedules a redraw of everything that
    /// shows them.
    pub async fn refresh(&mut self) -> bool {
        let generation = self.begin_refresh();
        let (history, templates) = self.gateway.fetch_all().await;
        debug!(
            "Refresh {}: {} history, {} templates",
            generation,
            history.len(),
            templates.len()
        );
        let applied = self.apply_refresh(generation, history, templates);
        if applied {
            self.schedule_render(&[
                Section::History,
                Section::Templates,
                Section::RecentTemplates,
            ]);
        }
        applied
    }

    /// Pulls server preferences over local ones when syncing is enabled.
    /// Returns true when the panels need a re-render.
    pub async fn sync_preferences(&mut self) -> Result<bool> {
        if !self.config.sync_preferences {
            return Ok(false);
        }
        let server = match self.gateway.fetch_preferences().await {
            Ok(server) => server,
            Err(e) => {
                warn!("Using local preferences, server unavailable: {}", e);
                return Ok(false);
            }
        };
        let changed = self.prefs.merge_server(&server)?;
        if changed {
            let active = self.state.view.active_view;
            let mut view = ViewState::load(&self.prefs);
            view.active_view = active;
            view.history.search = std::mem::take(&mut self.state.view.history.search);
            view.templates.search = std::mem::take(&mut self.state.view.templates.search);
            view.history_date_range = self.state.view.history_date_range;
            self.state.view = view;
        }
        Ok(changed)
    }

    async fn push_preferences(&self, prefs: ServerPreferences) {
        if !self.config.sync_preferences {
            return;
        }
        if let Err(e) = self.gateway.save_preferences(&prefs).await {
            warn!("Could not push preferences to server: {}", e);
        }
    }

    // ---- derived views ----

    pub fn visible_history(&self) -> Vec<LinkRecord> {
        let view = &self.state.view;
        apply_filters_and_sorting(
            &self.state.history,
            &view.history.search,
            view.history_date_range.as_ref(),
            &view.history.sort,
        )
    }

    pub fn visible_templates(&self) -> Vec<Template> {
        let view = &self.state.view;
        apply_filters_and_sorting(
            &self.state.templates,
            &view.templates.search,
            None,
            &view.templates.sort,
        )
    }

    pub fn tag_suggestions(&self) -> (Vec<TagUsage>, Vec<Tag>) {
        (
            popular_tags(&self.state.templates, TAG_SUGGESTIONS),
            recent_tags(&self.state.history, TAG_SUGGESTIONS),
        )
    }

    fn render_context(&self) -> RenderContext {
        RenderContext::from_state(&self.state.view, self.width)
    }

    pub fn render_section(&self, section: Section) -> String {
        let ctx = self.render_context();
        match section {
            Section::History => render_history(
                &ctx,
                &self.visible_history(),
                self.state.history.len(),
                &self.state.view.history,
            ),
            Section::Templates => render_templates(
                &ctx,
                &self.visible_templates(),
                self.state.templates.len(),
                &self.state.view.templates,
            ),
            Section::RecentTemplates => render_recent_templates(&ctx, &self.state.templates),
        }
    }

    fn schedule_render(&mut self, sections: &[Section]) {
        self.pending_render = Some(self.scheduler.schedule(sections.to_vec()));
    }

    /// Draws every section whose delay has run out, from the state as it is
    /// now, and hands the output to the render receiver.
    pub fn flush_due_renders(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(request) = self.due.try_recv() {
            let sections = request
                .sections
                .iter()
                .map(|&section| (section, self.render_section(section)))
                .collect();
            let batch = RenderBatch {
                generation: request.generation,
                sections,
            };
            if self.renders.send(batch).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Waits for the most recently scheduled render to fire or be dropped,
    /// then draws whatever is due.
    pub async fn settle(&mut self) -> bool {
        let fired = match self.pending_render.take() {
            Some(handle) => handle.await.unwrap_or(false),
            None => false,
        };
        self.flush_due_renders();
        fired
    }

    /// Drops the pending render and anything already due.
    pub fn cancel_render(&mut self) {
        self.scheduler.cancel();
        self.pending_render = None;
        while self.due.try_recv().is_ok() {}
    }

    // ---- view state ----

    /// Activates `target`, remembers it, and schedules its section render.
    pub fn switch_view(&mut self, target: View) -> Result<Vec<NavItem>> {
        let nav = self.state.view.switch_view(target);
        self.prefs.set(LAST_VIEW_KEY, &target.to_string())?;
        if let Some(section) = target.section() {
            self.schedule_render(&[section]);
        }
        Ok(nav)
    }

    pub fn set_view_mode(&mut self, panel: Panel, mode: ViewMode) -> Result<()> {
        self.state.view.panel_mut(panel).mode = mode;
        self.state.view.save(&mut self.prefs)?;
        self.schedule_render(&[panel.section()]);
        Ok(())
    }

    pub fn set_search(&mut self, panel: Panel, query: &str) {
        self.state.view.panel_mut(panel).search = query.to_string();
        self.schedule_render(&[panel.section()]);
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.state.view.history_date_range = range;
        self.schedule_render(&[Section::History]);
    }

    /// Header click on `column`.
    pub fn toggle_sort(&mut self, panel: Panel, column: &str) -> Result<SortSpec> {
        self.state.view.panel_mut(panel).toggle_sort(column);
        self.state.view.save(&mut self.prefs)?;
        self.schedule_render(&[panel.section()]);
        Ok(self.state.view.panel(panel).sort.clone())
    }

    pub fn set_sort(&mut self, panel: Panel, sort: SortSpec) -> Result<()> {
        self.state.view.panel_mut(panel).sort = sort;
        self.state.view.save(&mut self.prefs)?;
        self.schedule_render(&[panel.section()]);
        Ok(())
    }

    pub async fn set_lang(&mut self, lang: &str) -> Result<()> {
        self.state.view.set_lang(lang)?;
        self.state.view.save(&mut self.prefs)?;
        self.schedule_render(&[Section::History, Section::Templates]);
        let lang = self.state.view.lang.clone();
        self.push_preferences(ServerPreferences {
            lang: Some(lang),
            ..Default::default()
        })
        .await;
        Ok(())
    }

    pub async fn set_theme(&mut self, theme: &str) -> Result<()> {
        self.state.view.set_theme(theme)?;
        self.state.view.save(&mut self.prefs)?;
        self.schedule_render(&[Section::History, Section::Templates]);
        let theme = self.state.view.theme.clone();
        self.push_preferences(ServerPreferences {
            theme: Some(theme),
            ..Default::default()
        })
        .await;
        Ok(())
    }

    // ---- records ----

    fn find_history(&self, id: &RecordId) -> Result<&LinkRecord> {
        self.state
            .history
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| UtmError::RecordNotFound { id: id.to_string() })
    }

    fn find_template(&self, id: &RecordId) -> Result<&Template> {
        self.state
            .templates
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| UtmError::RecordNotFound { id: id.to_string() })
    }

    /// Builds the URL from the form, stores it in history with the pending
    /// tag, and refetches.
    pub async fn generate(&mut self) -> Result<String> {
        let url = self.state.form.build()?;
        let body = NewLinkRecord::new(
            self.gateway.user_email(),
            &url,
            self.state.form.pending_tag.as_ref(),
        );
        let created = self.gateway.create_history(&body).await?;
        self.state.last_history_id = created.id;
        self.state.last_generated_url = Some(url.clone());
        self.state.form.pending_tag = None;
        self.refresh().await;
        info!("Generated {}", url);
        Ok(url)
    }

    /// Saves the form's UTM values as a named template. A tagged template
    /// also tags the record created by the last generation.
    pub async fn save_template(&mut self, name: &str, tag: Option<Tag>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(UtmError::validation("Template name is required"));
        }
        let body = NewTemplate::new(
            self.gateway.user_email(),
            name,
            &self.state.form.params,
            tag.as_ref(),
        );
        self.gateway.create_template(&body).await?;

        if let (Some(id), Some(tag)) = (self.state.last_history_id.as_ref(), tag.as_ref()) {
            if let Err(e) = self.gateway.set_tag(id, Some(tag)).await {
                warn!("Could not tag history record {}: {}", id, e);
            }
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn delete_history(&mut self, id: &RecordId) -> Result<()> {
        self.gateway.delete_history(id).await?;
        if self.state.last_history_id.as_ref() == Some(id) {
            self.state.last_history_id = None;
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn delete_template(&mut self, id: &RecordId) -> Result<()> {
        self.gateway.delete_template(id).await?;
        self.refresh().await;
        Ok(())
    }

    pub async fn set_history_tag(&mut self, id: &RecordId, tag: Option<Tag>) -> Result<()> {
        self.find_history(id)?;
        self.gateway.set_tag(id, tag.as_ref()).await?;
        self.refresh().await;
        Ok(())
    }

    pub async fn shorten_url(&self, url: &str) -> Result<String> {
        self.shortener.shorten(url).await
    }

    /// Shortens a history record's URL and stores the result on it.
    pub async fn shorten_history(&mut self, id: &RecordId) -> Result<String> {
        let url = self.find_history(id)?.display_url().to_string();
        let short = self.shortener.shorten(&url).await?;
        self.gateway.set_short_url(id, &short).await?;
        self.refresh().await;
        Ok(short)
    }

    /// Prefills the generator from a template and switches to it.
    pub fn apply_template(&mut self, id: &RecordId) -> Result<Vec<NavItem>> {
        let template = self.find_template(id)?.clone();
        self.state.form.apply_template(&template);
        self.switch_view(View::Generator)
    }

    pub fn apply_history(&mut self, id: &RecordId) -> Result<Vec<NavItem>> {
        let record = self.find_history(id)?.clone();
        self.state.form.apply_history(&record);
        self.switch_view(View::Generator)
    }

    // ---- import / export ----

    pub async fn import_templates(&mut self, path: &Path) -> Result<usize> {
        let count = transfer::import_templates(&self.gateway, path).await?;
        self.refresh().await;
        Ok(count)
    }

    pub async fn import_history(&mut self, path: &Path) -> Result<usize> {
        let count = transfer::import_history(&self.gateway, path).await?;
        self.refresh().await;
        Ok(count)
    }

    pub async fn export_from_server(
        &self,
        collection: Collection,
        format: ExportFormat,
        out_dir: &Path,
    ) -> Result<ExportOutcome> {
        transfer::export_from_server(&self.gateway, collection, format, out_dir).await
    }

    /// Exports what the panel currently shows.
    pub fn export_visible(
        &self,
        collection: Collection,
        format: ExportFormat,
        out_dir: &Path,
    ) -> Result<ExportOutcome> {
        let email = self.gateway.user_email();
        match collection {
            Collection::History => {
                let rows = self.visible_history();
                transfer::export_local(&rows, collection, format, out_dir, email)
            }
            Collection::Templates => {
                let rows = self.visible_templates();
                transfer::export_local(&rows, collection, format, out_dir, email)
            }
        }
    }

    pub async fn check_for_updates(&self) -> Option<UpdateInfo> {
        self.gateway.check_for_updates().await
    }
}
