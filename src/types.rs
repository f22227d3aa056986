//! Shared types for the utmka application.
//!
//! This module contains the crate-wide `Result` alias and the command tree
//! of the terminal client.
use std::path::PathBuf;

use clap::Subcommand;

use crate::UtmError;

/// A specialized Result type for utmka operations.
pub type Result<T> = std::result::Result<T, UtmError>;

/// Available subcommands for the utmka application
#[derive(Subcommand)]
pub enum Commands {
    /// Build a UTM-tagged link and store it in history
    Generate {
        /// Page URL; `https://` is assumed when no scheme is given
        url: Option<String>,

        /// Prefill the UTM fields (and tag) from a template
        #[clap(short = 'T', long)]
        template: Option<String>,

        /// Prefill from an existing history record
        #[clap(long)]
        from_history: Option<String>,

        #[clap(short, long)]
        source: Option<String>,

        #[clap(short, long)]
        medium: Option<String>,

        #[clap(short, long)]
        campaign: Option<String>,

        #[clap(long)]
        content: Option<String>,

        #[clap(long)]
        term: Option<String>,

        /// Tag for the new history record
        #[clap(long)]
        tag_name: Option<String>,

        /// Tag colour as #rrggbb
        #[clap(long)]
        tag_color: Option<String>,

        /// Also shorten the generated link
        #[clap(long)]
        shorten: bool,

        /// Save the UTM values as a template with this name
        #[clap(long)]
        save_as: Option<String>,
    },

    /// Shorten any URL
    Shorten {
        url: String,
    },

    /// History of generated links
    History {
        #[clap(subcommand)]
        command: HistoryCommand,
    },

    /// Saved UTM templates
    Templates {
        #[clap(subcommand)]
        command: TemplatesCommand,
    },

    /// Switch to a view and show it
    View {
        /// One of: generator, history, templates, help
        view: String,
    },

    /// Click a column header: flip the direction or sort by a new column
    Sort {
        #[clap(value_parser = ["history", "templates"])]
        panel: String,

        /// Column to sort by, e.g. created_at, full_url, name, utm_source
        column: String,
    },

    /// Show or change interface preferences
    Prefs {
        /// Interface language
        #[clap(short, long, value_parser = ["ru", "en"])]
        lang: Option<String>,

        /// Colour theme
        #[clap(short, long, value_parser = ["dark", "light"])]
        theme: Option<String>,

        /// View mode of the history panel
        #[clap(long, value_parser = ["table", "grid", "list"])]
        history_view: Option<String>,

        /// View mode of the templates panel
        #[clap(long, value_parser = ["table", "grid", "list"])]
        templates_view: Option<String>,
    },

    /// Check for a new release
    Update {
        /// Download the installer when an update is available
        #[clap(short, long)]
        download: bool,

        /// Run a previously downloaded installer
        #[clap(short, long)]
        install: Option<String>,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Update a configuration setting
        #[clap(short, long)]
        set: Option<String>,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}

/// Operations on the history panel
#[derive(Subcommand)]
pub enum HistoryCommand {
    /// List history with optional filtering
    List {
        /// Search text; several words must all match
        #[clap(short, long)]
        search: Option<String>,

        /// Date range as YYYY-MM-DD_YYYY-MM-DD
        #[clap(short, long)]
        dates: Option<String>,

        /// Sort key such as created_at_desc or utm_source_asc
        #[clap(long)]
        sort: Option<String>,

        /// Display mode for this listing
        #[clap(short, long, value_parser = ["table", "grid", "list"])]
        view: Option<String>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Delete a record by ID
    Delete { id: String },

    /// Shorten a record's URL and store the short link
    Shorten { id: String },

    /// Set or clear the tag of a record
    Tag {
        id: String,

        #[clap(short, long)]
        name: Option<String>,

        #[clap(short, long)]
        color: Option<String>,

        /// Remove the tag
        #[clap(long)]
        clear: bool,
    },

    /// Import records from a .json or .csv file
    Import { file: PathBuf },

    /// Export records
    Export {
        /// Directory for the exported file
        #[clap(short, long)]
        output: Option<PathBuf>,

        #[clap(short, long, value_parser = ["json", "csv"], default_value = "json")]
        format: String,

        /// Write the filtered view locally instead of asking the server
        #[clap(short, long)]
        local: bool,

        /// Search applied to a local export
        #[clap(short, long)]
        search: Option<String>,

        /// Date range applied to a local export
        #[clap(short, long)]
        dates: Option<String>,
    },
}

/// Operations on the templates panel
#[derive(Subcommand)]
pub enum TemplatesCommand {
    /// List templates with optional filtering
    List {
        #[clap(short, long)]
        search: Option<String>,

        #[clap(long)]
        sort: Option<String>,

        #[clap(short, long, value_parser = ["table", "grid", "list"])]
        view: Option<String>,

        #[clap(short, long)]
        json: bool,
    },

    /// Create a template
    Create {
        #[clap(short, long)]
        name: String,

        #[clap(short, long)]
        source: Option<String>,

        #[clap(short, long)]
        medium: Option<String>,

        #[clap(short, long)]
        campaign: Option<String>,

        #[clap(long)]
        content: Option<String>,

        #[clap(long)]
        term: Option<String>,

        #[clap(long)]
        tag_name: Option<String>,

        #[clap(long)]
        tag_color: Option<String>,
    },

    /// Delete a template by ID
    Delete { id: String },

    /// Import templates from a .json or .csv file
    Import { file: PathBuf },

    /// Export templates
    Export {
        #[clap(short, long)]
        output: Option<PathBuf>,

        #[clap(short, long, value_parser = ["json", "csv"], default_value = "json")]
        format: String,

        #[clap(short, long)]
        local: bool,

        #[clap(short, long)]
        search: Option<String>,
    },

    /// Download an example import file
    Example {
        #[clap(short, long, default_value = "templates_example.json")]
        filename: String,

        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Show popular and recently used tags
    Tags,
}
