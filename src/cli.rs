use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{DatabaseConfig, Settings, DEFAULT_DOWNLOAD_BASE, DEFAULT_XLSX_EXPORT, SETTINGS_ENV};
use crate::export::ExportFormat;
use crate::models::LookupKey;
use crate::sheet::{GridModel, SortOrder};

#[derive(Parser, Debug)]
#[command(name = "exchange_unsen", version, about = "Excel viewer with HOSxP person cross-reference (CLI)", disable_help_subcommand = true)]
pub struct Cli {
    /// Settings file (env: EXCHANGE_UNSEN_SETTINGS)
    #[arg(long, global = true, value_name = "PATH", env = SETTINGS_ENV)]
    pub settings: Option<PathBuf>,
    #[command(flatten)]
    pub db: DbArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the stored database settings.
#[derive(Args, Debug, Default, Clone)]
pub struct DbArgs {
    /// DB host (env: DB_HOST)
    #[arg(long = "db-host", global = true, env = "DB_HOST")]
    pub host: Option<String>,
    /// DB port (env: DB_PORT)
    #[arg(long = "db-port", global = true, env = "DB_PORT")]
    pub port: Option<u16>,
    /// DB user (env: DB_USER)
    #[arg(long = "db-user", global = true, env = "DB_USER")]
    pub user: Option<String>,
    /// DB password (env: DB_PASSWORD)
    #[arg(long = "db-password", global = true, env = "DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Database name (env: DB_NAME)
    #[arg(long = "db-name", global = true, env = "DB_NAME")]
    pub database: Option<String>,
}

impl DbArgs {
    pub fn apply(&self, cfg: &mut DatabaseConfig) {
        if let Some(h) = &self.host { cfg.host = h.clone(); }
        if let Some(p) = self.port { cfg.port = p; }
        if let Some(u) = &self.user { cfg.username = u.clone(); }
        if let Some(p) = &self.password { cfg.password = p.clone(); }
        if let Some(d) = &self.database { cfg.database = d.clone(); }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Sheet name (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Column filter, case-insensitive substring; repeatable
    #[arg(long = "filter", value_name = "COL=TEXT", value_parser = parse_filter)]
    pub filters: Vec<ColumnFilter>,
    /// Sort column, optionally `:desc`
    #[arg(long, value_name = "COL[:desc]", value_parser = parse_sort)]
    pub sort: Option<SortSpec>,
    /// Keep empty rows/columns and untrimmed text
    #[arg(long)]
    pub raw: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the sheets of a workbook
    Sheets { file: PathBuf },
    /// Print (filtered, sorted) rows of a sheet
    View {
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export the (filtered, sorted) sheet to xlsx or csv
    Export {
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = DEFAULT_XLSX_EXPORT)]
        out: String,
        /// Defaults to the output file's extension
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
    },
    /// Look every row up in the person table and export the result
    Xref {
        file: PathBuf,
        #[arg(long, value_enum)]
        column: LookupKey,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, default_value = DEFAULT_XLSX_EXPORT)]
        out: String,
    },
    /// Connect to MySQL and print the server version
    TestConnection,
    /// Show or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Compare the running version with the published one
    CheckUpdate,
    /// Download and install the published version
    Update {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
        /// File to replace (defaults to this executable)
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Put the backup left by the last update back in place
    Rollback {
        /// File the update replaced (defaults to this executable)
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Print the version manifest for this build
    Manifest {
        #[arg(long, default_value = DEFAULT_DOWNLOAD_BASE)]
        base_url: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Register this build with the release listing endpoint
    Publish {
        /// Overrides update.publish_url from the settings
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub order: SortOrder,
}

pub fn parse_filter(s: &str) -> Result<ColumnFilter, String> {
    let (column, text) = s.split_once('=').ok_or_else(|| format!("expected COL=TEXT, got '{}'", s))?;
    if column.trim().is_empty() {
        return Err("filter column is empty".into());
    }
    Ok(ColumnFilter { column: column.trim().to_string(), text: text.to_string() })
}

pub fn parse_sort(s: &str) -> Result<SortSpec, String> {
    let (column, order) = match s.rsplit_once(':') {
        Some((c, o)) if o.eq_ignore_ascii_case("desc") => (c, SortOrder::Descending),
        Some((c, o)) if o.eq_ignore_ascii_case("asc") => (c, SortOrder::Ascending),
        _ => (s, SortOrder::Ascending),
    };
    if column.trim().is_empty() {
        return Err("sort column is empty".into());
    }
    Ok(SortSpec { column: column.trim().to_string(), order })
}

fn column_or_err(grid: &GridModel, name: &str) -> Result<usize> {
    grid.source().column_index(name).ok_or_else(|| anyhow!("Unknown column '{}'", name))
}

/// Applies command-line filters and sort to a grid, by column name.
pub fn apply_view(grid: &mut GridModel, filters: &[ColumnFilter], sort: Option<&SortSpec>) -> Result<()> {
    for f in filters {
        let c = column_or_err(grid, &f.column)?;
        grid.apply_column_filter(c, &f.text);
    }
    if let Some(s) = sort {
        let c = column_or_err(grid, &s.column)?;
        grid.sort(c, s.order);
    }
    Ok(())
}

/// Stored settings with command-line overrides applied.
pub fn resolve_settings(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load_from(&path)?;
    cli.db.apply(&mut settings.database);
    if let Err(e) = settings.update.validate() {
        log::warn!("Update settings in {}: {}", path.display(), e);
    }
    Ok((settings, path))
}
