use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use exchange_unsen::cli::{apply_view, resolve_settings, Cli, Command, ConfigAction, ViewArgs};
use exchange_unsen::config::{AppInfo, Settings};
use exchange_unsen::db::{check_person_table, make_pool, test_connection};
use exchange_unsen::error::UpdateError;
use exchange_unsen::export::{export_table, ExportFormat};
use exchange_unsen::metrics::log_memory;
use exchange_unsen::models::DataTable;
use exchange_unsen::sheet::{list_sheets, load_workbook, GridModel, LoadOptions};
use exchange_unsen::update::{self, build_client, UpdateCheck, UpdateChecker};
use exchange_unsen::util::format_file_size;
use exchange_unsen::xref::{cross_reference, MySqlDirectory};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_grid(file: &Path, view: &ViewArgs) -> Result<GridModel> {
    let opts = LoadOptions { sheet: view.sheet.clone(), clean: !view.raw };
    let table = load_workbook(file, &opts).with_context(|| format!("Failed to load {}", file.display()))?;
    log_memory("workbook loaded");
    let mut grid = GridModel::new(table);
    apply_view(&mut grid, &view.filters, view.sort.as_ref())?;
    Ok(grid)
}

fn print_table(table: &DataTable, limit: usize) {
    let shown = table.row_count().min(limit);
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in table.rows.iter().take(shown) {
        for (c, v) in row.iter().enumerate() {
            widths[c] = widths[c].max(v.to_string().chars().count()).min(40);
        }
    }
    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(s, w)| {
                let s: String = s.chars().take(*w).collect();
                format!("{:<width$}", s, width = *w)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(table.columns.clone()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in table.rows.iter().take(shown) {
        println!("{}", line(row.iter().map(|v| v.to_string()).collect()));
    }
    if shown < table.row_count() {
        println!("... {} more rows", table.row_count() - shown);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn run(cli: Cli) -> Result<()> {
    let (settings, settings_path) = resolve_settings(&cli)?;
    let app = AppInfo::current();

    match cli.command {
        Command::Sheets { file } => {
            for name in list_sheets(&file)? {
                println!("{}", name);
            }
        }
        Command::View { file, view, limit } => {
            let grid = load_grid(&file, &view)?;
            info!("{} of {} rows match", grid.row_count(), grid.source().row_count());
            print_table(&grid.visible_table(), limit);
        }
        Command::Export { file, view, out, format } => {
            let grid = load_grid(&file, &view)?;
            let format = format.unwrap_or_else(|| ExportFormat::from_path(&out));
            let summary = export_table(&grid.visible_table(), &out, format)?;
            println!("Exported {} rows to {} ({})", summary.rows, out, format_file_size(summary.bytes));
        }
        Command::Xref { file, column, sheet, out } => {
            let table = load_workbook(&file, &LoadOptions { sheet, clean: true })?;
            let cfg = &settings.database;
            let pool = make_pool(cfg).await?;
            check_person_table(&pool, &cfg.database).await?;
            let mut directory = MySqlDirectory::new(&pool);
            let cancel = AtomicBool::new(false);
            let mut last_pct = 0u32;
            let outcome = cross_reference(&table, column, &mut directory, &cancel, |p| {
                let pct = p.percent() as u32;
                if pct >= last_pct + 10 {
                    last_pct = pct;
                    info!("{}/{} rows ({}%)", p.processed, p.total, pct);
                }
            })
            .await?;
            pool.close().await;
            let summary = export_table(&outcome.table, &out, ExportFormat::from_path(&out))?;
            println!(
                "found={} not_found={} skipped={} -> {} ({} rows)",
                outcome.found, outcome.not_found, outcome.skipped, out, summary.rows
            );
        }
        Command::TestConnection => {
            let version = test_connection(&settings.database).await?;
            println!("Connected to {} (MySQL {})", settings.database.display_target(), version);
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let mut shown = settings.clone();
                if !shown.database.password.is_empty() {
                    shown.database.password = "********".into();
                }
                println!("# {}", settings_path.display());
                println!("{}", serde_json::to_string_pretty(&shown)?);
            }
            ConfigAction::Init { force } => {
                if settings_path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", settings_path.display());
                }
                Settings::default().save_to(&settings_path)?;
                println!("Wrote {}", settings_path.display());
            }
        },
        Command::CheckUpdate => {
            let checker = UpdateChecker::new(&settings.update, app.clone())?;
            match checker.check().await? {
                UpdateCheck::Available(r) => {
                    println!("Update available: {} -> {}", app.version, r.version);
                    if let Some(d) = &r.release_date { println!("Released: {}", d); }
                    for n in &r.notes { println!("  - {}", n); }
                }
                UpdateCheck::UpToDate(_) => println!("{} {} is up to date", app.name, app.version),
                UpdateCheck::NewerLocal(r) => println!("Running {} which is newer than published {}", app.version, r.version),
            }
        }
        Command::Update { yes, target } => {
            let checker = UpdateChecker::new(&settings.update, app.clone())?;
            let release = match checker.check().await? {
                UpdateCheck::Available(r) => r,
                _ => {
                    println!("Already up to date ({})", app.version);
                    return Ok(());
                }
            };
            let url = release.download_url.clone().ok_or_else(|| UpdateError::NoDownloadUrl(release.version.clone()))?;
            if !yes && !confirm(&format!("Install {} over {}?", release.version, app.version))? {
                println!("Cancelled");
                return Ok(());
            }
            let target = match target {
                Some(t) => t,
                None => std::env::current_exe()?,
            };
            let client = build_client(&settings.update, true)?;
            let mut last_pct = 0u32;
            let report = update::download_update(&client, &url, &target, |p| {
                if let Some(pct) = p.percent().map(|v| v as u32) {
                    if pct >= last_pct + 10 {
                        last_pct = pct;
                        info!("downloaded {} ({}%)", format_file_size(p.downloaded), pct);
                    }
                }
            })
            .await?;
            println!("Installed {} to {} ({})", release.version, report.path.display(), format_file_size(report.bytes));
        }
        Command::Rollback { target } => {
            let target = match target {
                Some(t) => t,
                None => std::env::current_exe()?,
            };
            if update::restore_backup(&target)? {
                println!("Restored {} from {}", target.display(), update::download::backup_path_for(&target).display());
            } else {
                bail!("No backup found next to {}", target.display());
            }
        }
        Command::Manifest { base_url, out } => {
            let manifest = update::generate_manifest(&app, &base_url);
            let value = serde_json::to_value(&manifest)?;
            update::validate_manifest(&value)?;
            let body = serde_json::to_string_pretty(&value)?;
            match out {
                Some(p) => {
                    std::fs::write(&p, body).with_context(|| format!("Failed to write {}", p.display()))?;
                    println!("Wrote {}", p.display());
                }
                None => println!("{}", body),
            }
        }
        Command::Publish { url } => {
            let Some(url) = url.or_else(|| settings.update.publish_url.clone()) else {
                bail!("No publish url: pass --url or set update.publish_url in {}", settings_path.display());
            };
            let client = build_client(&settings.update, false)?;
            let response = update::publish_version(&client, &url, &app).await?;
            println!("Published {} ({}): {}", app.version, app.version_code, response.trim());
        }
    }
    Ok(())
}
