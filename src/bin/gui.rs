// ExchangeUnsen desktop GUI
// Excel viewer with filtering/sorting and HOSxP person cross-reference.
// This file implements the desktop GUI using eframe/egui.

use eframe::egui::{self, ComboBox, Context, ProgressBar, TextEdit};
use eframe::{App, Frame, NativeOptions};
use std::future::Future;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use exchange_unsen::config::{AppInfo, DatabaseConfig, Settings, DEFAULT_CSV_EXPORT, DEFAULT_XLSX_EXPORT};
use exchange_unsen::db::{check_person_table, get_person_count, make_pool, test_connection, MySqlSession};
use exchange_unsen::export::{export_table, ExportFormat};
use exchange_unsen::jobs::{JobKind, JobSlot};
use exchange_unsen::metrics::{log_memory, memory_stats_mb, MemoryStats};
use exchange_unsen::models::{DataTable, LookupKey};
use exchange_unsen::sheet::{load_workbook_with_progress, GridModel, LoadEvent, LoadOptions, SortOrder};
use exchange_unsen::update::{build_client, download_update, relaunch, DownloadProgress, InstallReport, ReleaseInfo, UpdateCheck, UpdateChecker};
use exchange_unsen::util::{format_file_size, shorten_path};
use exchange_unsen::xref::{cross_reference, MySqlDirectory, XrefOutcome, XrefProgress};

const ROW_HEIGHT: f32 = 20.0;
const PATH_DISPLAY_MAX: usize = 80;
const UNIQUE_MENU_MAX: usize = 50;

#[derive(Debug)]
enum Msg {
    Loading(LoadEvent),
    Loaded { path: PathBuf, table: DataTable },
    Xref(XrefProgress),
    XrefDone(XrefOutcome),
    Connected(DbStatus),
    Tested { target: String, server: String },
    UpdateChecked { check: UpdateCheck, silent: bool },
    Download(DownloadProgress),
    Installed(InstallReport),
    Failed { job: Option<JobKind>, message: String, silent: bool },
}

#[derive(Debug, Clone)]
struct DbStatus {
    target: String,
    server: String,
    persons: i64,
}

/// Editable copy of the database settings; the port stays a string while typing.
#[derive(Debug, Clone)]
struct SettingsForm {
    host: String,
    port: String,
    database: String,
    username: String,
    password: String,
    auto_connect: bool,
}

impl From<&DatabaseConfig> for SettingsForm {
    fn from(c: &DatabaseConfig) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port.to_string(),
            database: c.database.clone(),
            username: c.username.clone(),
            password: c.password.clone(),
            auto_connect: c.auto_connect,
        }
    }
}

impl SettingsForm {
    fn to_config(&self) -> Result<DatabaseConfig> {
        let port: u16 = self.port.trim().parse().map_err(|_| anyhow::anyhow!("Port must be a number between 1 and 65535"))?;
        let cfg = DatabaseConfig {
            host: self.host.trim().to_string(),
            port,
            database: self.database.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            auto_connect: self.auto_connect,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Runs `job` on its own thread with a private tokio runtime; errors come back as `Msg::Failed`.
fn spawn_worker<F, Fut>(tx: Sender<Msg>, job: Option<JobKind>, silent: bool, f: F)
where
    F: FnOnce(Sender<Msg>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>>,
{
    thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = tx.send(Msg::Failed { job, message: format!("Failed to start runtime: {}", e), silent });
                return;
            }
        };
        if let Err(e) = rt.block_on(f(tx.clone())) {
            let _ = tx.send(Msg::Failed { job, message: format!("{:#}", e), silent });
        }
    });
}

struct GuiApp {
    info: AppInfo,
    settings: Settings,
    settings_path: PathBuf,
    form: SettingsForm,
    settings_open: bool,
    about_open: bool,

    file_path: String,
    sheets: Vec<String>,
    sheet_idx: usize,
    grid: Option<GridModel>,
    col_widths: Vec<f32>,
    filter_inputs: Vec<String>,
    inspector: Option<Vec<(String, String)>>,
    inspector_open: bool,
    lookup: Option<LookupKey>,

    db: Option<DbStatus>,
    jobs: JobSlot,
    cancel: Arc<AtomicBool>,
    xref_progress: Option<XrefProgress>,
    download: Option<DownloadProgress>,
    update_notice: Option<ReleaseInfo>,
    update_status: String,
    status: String,
    mem: MemoryStats,
    mem_checked: Instant,

    tx: Sender<Msg>,
    rx: Receiver<Msg>,
}

impl GuiApp {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Msg>();
        let settings_path = Settings::default_path();
        let (settings, status) = match Settings::load_from(&settings_path) {
            Ok(s) => (s, "Ready".to_string()),
            Err(e) => {
                log::warn!("{}", e);
                (Settings::default(), format!("Settings not loaded ({}); using defaults", e))
            }
        };
        let form = SettingsForm::from(&settings.database);
        let mut app = Self {
            info: AppInfo::current(),
            settings,
            settings_path,
            form,
            settings_open: false,
            about_open: false,
            file_path: String::new(),
            sheets: Vec::new(),
            sheet_idx: 0,
            grid: None,
            col_widths: Vec::new(),
            filter_inputs: Vec::new(),
            inspector: None,
            inspector_open: false,
            lookup: None,
            db: None,
            jobs: JobSlot::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            xref_progress: None,
            download: None,
            update_notice: None,
            update_status: String::new(),
            status,
            mem: memory_stats_mb(),
            mem_checked: Instant::now(),
            tx,
            rx,
        };
        if app.settings.database.auto_connect {
            app.connect(true);
        }
        if app.settings.update.check_on_startup {
            app.check_updates(true);
        }
        app
    }

    fn browse(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Excel files", &["xlsx", "xlsm", "xls"])
            .add_filter("All files", &["*"])
            .pick_file();
        if let Some(path) = picked {
            self.file_path = path.display().to_string();
            self.sheets.clear();
            self.sheet_idx = 0;
            self.start_load(None);
        }
    }

    fn start_load(&mut self, sheet: Option<String>) {
        if let Err(busy) = self.jobs.begin(JobKind::Load) {
            self.status = busy.to_string();
            return;
        }
        let path = PathBuf::from(self.file_path.trim());
        let tx = self.tx.clone();
        thread::spawn(move || {
            let opts = LoadOptions { sheet, clean: true };
            let res = load_workbook_with_progress(&path, &opts, |ev| {
                let _ = tx.send(Msg::Loading(ev));
            });
            match res {
                Ok(table) => {
                    log_memory("workbook loaded");
                    let _ = tx.send(Msg::Loaded { path, table });
                }
                Err(e) => {
                    let _ = tx.send(Msg::Failed { job: Some(JobKind::Load), message: e.to_string(), silent: false });
                }
            }
        });
        self.status = format!("Loading {}...", shorten_path(self.file_path.trim(), PATH_DISPLAY_MAX));
    }

    fn set_grid(&mut self, grid: GridModel) {
        self.col_widths = (0..grid.column_count()).map(|c| grid.suggested_width(c)).collect();
        self.filter_inputs = vec![String::new(); grid.column_count()];
        self.inspector = None;
        self.grid = Some(grid);
    }

    fn clear_data(&mut self) {
        if let Err(busy) = self.jobs.ensure_idle() {
            self.status = busy.to_string();
            return;
        }
        self.grid = None;
        self.col_widths.clear();
        self.filter_inputs.clear();
        self.inspector = None;
        self.sheets.clear();
        self.sheet_idx = 0;
        self.file_path.clear();
        self.lookup = None;
        self.status = "Data cleared".into();
    }

    fn export(&mut self, default_name: &str) {
        if let Err(busy) = self.jobs.ensure_idle() {
            self.status = busy.to_string();
            return;
        }
        let Some(grid) = &self.grid else {
            self.status = "No data to export".into();
            return;
        };
        let picked = rfd::FileDialog::new()
            .set_file_name(default_name)
            .add_filter("Excel files", &["xlsx"])
            .add_filter("CSV files", &["csv"])
            .save_file();
        let Some(path) = picked else { return };
        let path = path.display().to_string();
        let table = grid.visible_table();
        match export_table(&table, &path, ExportFormat::from_path(&path)) {
            Ok(s) => {
                self.status = format!(
                    "Exported {} rows x {} columns to {} ({})",
                    s.rows,
                    s.columns,
                    shorten_path(&path, PATH_DISPLAY_MAX),
                    format_file_size(s.bytes)
                )
            }
            Err(e) => {
                log::error!("Export failed: {:#}", e);
                self.status = format!("Export failed: {}", e);
            }
        }
    }

    fn connect(&mut self, silent: bool) {
        if let Err(busy) = self.jobs.begin(JobKind::Connect) {
            if !silent { self.status = busy.to_string(); }
            return;
        }
        let cfg = self.settings.database.clone();
        spawn_worker(self.tx.clone(), Some(JobKind::Connect), silent, move |tx| async move {
            let server = test_connection(&cfg).await?;
            let pool = make_pool(&cfg).await?;
            let checked = check_person_table(&pool, &cfg.database).await;
            let persons = match checked {
                Ok(()) => get_person_count(&pool).await,
                Err(e) => Err(e),
            };
            pool.close().await;
            let _ = tx.send(Msg::Connected(DbStatus { target: cfg.display_target(), server, persons: persons? }));
            Ok(())
        });
        self.status = format!("Connecting to {}...", self.settings.database.display_target());
    }

    fn disconnect(&mut self) {
        if self.db.take().is_some() {
            self.status = "Disconnected".into();
        }
    }

    fn test_form_connection(&mut self) {
        let cfg = match self.form.to_config() {
            Ok(c) => c,
            Err(e) => {
                self.status = format!("Invalid settings: {}", e);
                return;
            }
        };
        if let Err(busy) = self.jobs.begin(JobKind::TestConnection) {
            self.status = busy.to_string();
            return;
        }
        spawn_worker(self.tx.clone(), Some(JobKind::TestConnection), false, move |tx| async move {
            let server = test_connection(&cfg).await?;
            let _ = tx.send(Msg::Tested { target: cfg.display_target(), server });
            Ok(())
        });
        self.status = "Testing connection...".into();
    }

    fn save_settings(&mut self) {
        match self.form.to_config() {
            Ok(cfg) => {
                let changed = cfg != self.settings.database;
                self.settings.database = cfg;
                match self.settings.save_to(&self.settings_path) {
                    Ok(()) => {
                        self.status = format!("Settings saved to {}", self.settings_path.display());
                        self.settings_open = false;
                        if changed { self.disconnect(); }
                    }
                    Err(e) => self.status = format!("Failed to save settings: {}", e),
                }
            }
            Err(e) => self.status = format!("Invalid settings: {}", e),
        }
    }

    fn start_xref(&mut self) {
        let Some(grid) = &self.grid else { return };
        let Some(key) = self.lookup else {
            self.status = "Choose a lookup column first".into();
            return;
        };
        if self.db.is_none() {
            self.status = "Not connected to the database".into();
            return;
        }
        if grid.source().column_index(key.sheet_column()).is_none() {
            self.status = format!("Column '{}' not found in the loaded sheet", key.sheet_column());
            return;
        }
        if let Err(busy) = self.jobs.begin(JobKind::CrossReference) {
            self.status = busy.to_string();
            return;
        }
        let table = grid.source().clone();
        let cfg = self.settings.database.clone();
        self.cancel.store(false, Ordering::Relaxed);
        let cancel = self.cancel.clone();
        spawn_worker(self.tx.clone(), Some(JobKind::CrossReference), false, move |tx| async move {
            let mut session = MySqlSession::new();
            let pool = session.connect(&cfg).await?;
            let mut directory = MySqlDirectory::new(pool);
            let outcome = cross_reference(&table, key, &mut directory, &cancel, |p| {
                let _ = tx.send(Msg::Xref(p));
            })
            .await;
            session.disconnect().await;
            let _ = tx.send(Msg::XrefDone(outcome?));
            Ok(())
        });
        self.xref_progress = Some(XrefProgress { processed: 0, total: grid.source().row_count() });
        self.status = format!("Searching by {}...", key);
    }

    fn check_updates(&mut self, silent: bool) {
        let cfg = self.settings.update.clone();
        let info = self.info.clone();
        spawn_worker(self.tx.clone(), None, silent, move |tx| async move {
            let checker = UpdateChecker::new(&cfg, info)?;
            let check = checker.check().await?;
            let _ = tx.send(Msg::UpdateChecked { check, silent });
            Ok(())
        });
        if !silent {
            self.update_status = "Checking for updates...".into();
        }
    }

    fn start_install(&mut self) {
        let Some(release) = self.update_notice.clone() else { return };
        let Some(url) = release.download_url.clone() else {
            self.update_status = format!("Release {} has no download url", release.version);
            return;
        };
        let target = match std::env::current_exe() {
            Ok(p) => p,
            Err(e) => {
                self.update_status = format!("Cannot locate the running executable: {}", e);
                return;
            }
        };
        if let Err(busy) = self.jobs.begin(JobKind::Update) {
            self.update_status = busy.to_string();
            return;
        }
        let cfg = self.settings.update.clone();
        spawn_worker(self.tx.clone(), Some(JobKind::Update), false, move |tx| async move {
            let client = build_client(&cfg, true)?;
            let report = download_update(&client, &url, &target, |p| {
                let _ = tx.send(Msg::Download(p));
            })
            .await?;
            let _ = tx.send(Msg::Installed(report));
            Ok(())
        });
        self.download = Some(DownloadProgress { downloaded: 0, total: None });
        self.update_status = format!("Downloading {}...", release.version);
    }

    fn poll_messages(&mut self, ctx: &Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                Msg::Loading(ev) => match ev {
                    LoadEvent::Validated { bytes } => self.status = format!("Reading workbook ({})...", format_file_size(bytes)),
                    LoadEvent::Opened { sheets } => {
                        if self.sheets != sheets {
                            self.sheets = sheets;
                            self.sheet_idx = 0;
                        }
                    }
                    LoadEvent::Reading { sheet } => {
                        if let Some(i) = self.sheets.iter().position(|s| *s == sheet) { self.sheet_idx = i; }
                        self.status = format!("Reading sheet '{}'...", sheet);
                    }
                    LoadEvent::Cleaning => self.status = "Cleaning data...".into(),
                    LoadEvent::Done { rows, columns } => self.status = format!("Loaded {} rows x {} columns", rows, columns),
                },
                Msg::Loaded { path, table } => {
                    self.jobs.finish(JobKind::Load);
                    let (rows, cols) = (table.row_count(), table.column_count());
                    self.set_grid(GridModel::new(table));
                    self.status = format!(
                        "Loaded {} rows x {} columns from {}",
                        rows,
                        cols,
                        shorten_path(&path.display().to_string(), PATH_DISPLAY_MAX)
                    );
                }
                Msg::Xref(p) => self.xref_progress = Some(p),
                Msg::XrefDone(outcome) => {
                    self.jobs.finish(JobKind::CrossReference);
                    self.xref_progress = None;
                    self.status = format!(
                        "{}Found {}, not found {}, skipped {} (empty key)",
                        if outcome.cancelled { "Cancelled. " } else { "" },
                        outcome.found,
                        outcome.not_found,
                        outcome.skipped
                    );
                    self.set_grid(GridModel::new(outcome.table));
                }
                Msg::Connected(db) => {
                    self.jobs.finish(JobKind::Connect);
                    self.status = format!("Connected to {} (MySQL {}, {} persons)", db.target, db.server, db.persons);
                    self.db = Some(db);
                }
                Msg::Tested { target, server } => {
                    self.jobs.finish(JobKind::TestConnection);
                    self.status = format!("Connection OK: {} (MySQL {})", target, server);
                }
                Msg::UpdateChecked { check, silent } => match check {
                    UpdateCheck::Available(r) => {
                        self.update_status = format!("Version {} is available (you have {})", r.version, self.info.version);
                        self.update_notice = Some(r);
                        if !silent { self.about_open = true; }
                    }
                    UpdateCheck::UpToDate(_) => {
                        self.update_notice = None;
                        self.update_status = format!("{} is up to date", self.info.version);
                    }
                    UpdateCheck::NewerLocal(r) => {
                        self.update_notice = None;
                        self.update_status = format!("Running {} (published: {})", self.info.version, r.version);
                    }
                },
                Msg::Download(p) => self.download = Some(p),
                Msg::Installed(report) => {
                    self.jobs.finish(JobKind::Update);
                    self.download = None;
                    self.update_status = format!("Installed {} ({})", report.path.display(), format_file_size(report.bytes));
                    match relaunch(&report.path) {
                        Ok(_) => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
                        Err(e) => {
                            log::error!("Relaunch failed: {}", e);
                            self.update_status = format!("Update installed; restart manually ({})", e);
                        }
                    }
                }
                Msg::Failed { job, message, silent } => {
                    if let Some(j) = job { self.jobs.finish(j); }
                    match job {
                        Some(JobKind::CrossReference) => self.xref_progress = None,
                        Some(JobKind::Update) => {
                            self.download = None;
                            self.update_status = format!("Update failed: {}", message);
                        }
                        Some(j) if j.drops_connection() => self.db = None,
                        _ => {}
                    }
                    if silent {
                        log::warn!("{}", message);
                    } else {
                        log::error!("{}", message);
                        self.status = format!("Error: {}", message);
                        if job.is_none() { self.update_status = format!("Update check failed: {}", message); }
                    }
                }
            }
        }
    }

    fn ui_menu(&mut self, ui: &mut egui::Ui) {
        let busy = self.jobs.is_busy();
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.add_enabled(!busy, egui::Button::new("Open...")).clicked() {
                    ui.close_menu();
                    self.browse();
                }
                if ui.add_enabled(!busy && self.grid.is_some(), egui::Button::new("Export to Excel...")).clicked() {
                    ui.close_menu();
                    self.export(DEFAULT_XLSX_EXPORT);
                }
                if ui.add_enabled(!busy && self.grid.is_some(), egui::Button::new("Export to CSV...")).clicked() {
                    ui.close_menu();
                    self.export(DEFAULT_CSV_EXPORT);
                }
                if ui.add_enabled(!busy && self.grid.is_some(), egui::Button::new("Clear")).clicked() {
                    ui.close_menu();
                    self.clear_data();
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    ui.close_menu();
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
            ui.menu_button("Database", |ui| {
                if ui.button("Settings...").clicked() {
                    ui.close_menu();
                    self.form = SettingsForm::from(&self.settings.database);
                    self.settings_open = true;
                }
                if ui.add_enabled(!busy && self.db.is_none(), egui::Button::new("Connect")).clicked() {
                    ui.close_menu();
                    self.connect(false);
                }
                if ui.add_enabled(self.db.is_some(), egui::Button::new("Disconnect")).clicked() {
                    ui.close_menu();
                    self.disconnect();
                }
            });
            ui.menu_button("Help", |ui| {
                if ui.button("Check for updates").clicked() {
                    ui.close_menu();
                    self.about_open = true;
                    self.check_updates(false);
                }
                if ui.button("About").clicked() {
                    ui.close_menu();
                    self.about_open = true;
                }
            });
        });
    }

    fn ui_top(&mut self, ui: &mut egui::Ui) {
        let busy = self.jobs.is_busy();
        ui.horizontal(|ui| {
            ui.label("File:");
            let shown = if self.file_path.is_empty() {
                "No file selected".to_string()
            } else {
                shorten_path(&self.file_path, PATH_DISPLAY_MAX)
            };
            ui.label(shown).on_hover_text(self.file_path.as_str());
            if ui.add_enabled(!busy, egui::Button::new("Browse...")).clicked() {
                self.browse();
            }
            if self.sheets.len() > 1 {
                let before = self.sheet_idx;
                let sheets = &self.sheets;
                let sheet_idx = &mut self.sheet_idx;
                ui.add_enabled_ui(!busy, |ui| {
                    ComboBox::from_label("Sheet")
                        .selected_text(sheets.get(*sheet_idx).cloned().unwrap_or_default())
                        .show_ui(ui, |ui| {
                            for (i, s) in sheets.iter().enumerate() {
                                ui.selectable_value(sheet_idx, i, s);
                            }
                        });
                });
                if self.sheet_idx != before {
                    if busy {
                        self.sheet_idx = before;
                    } else {
                        let sheet = self.sheets.get(self.sheet_idx).cloned();
                        self.start_load(sheet);
                    }
                }
            }
        });

        if self.grid.is_none() {
            return;
        }
        ui.horizontal(|ui| {
            ui.label("Lookup column:");
            ComboBox::from_id_salt("lookup_key")
                .selected_text(self.lookup.map(|k| k.to_string()).unwrap_or_else(|| "-- select --".into()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.lookup, None, "-- select --");
                    for k in LookupKey::ALL {
                        ui.selectable_value(&mut self.lookup, Some(k), k.to_string());
                    }
                });
            let can_search = self.db.is_some() && self.lookup.is_some() && !busy;
            let hint = if self.db.is_none() { "Connect to the database first" } else { "Look every row up in the person table" };
            if ui.add_enabled(can_search, egui::Button::new("Search")).on_hover_text(hint).clicked() {
                self.start_xref();
            }
            if self.jobs.current() == Some(JobKind::CrossReference) {
                if ui.button("Cancel").clicked() {
                    self.cancel.store(true, Ordering::Relaxed);
                }
                if let Some(p) = self.xref_progress {
                    ui.add(ProgressBar::new(p.percent() / 100.0).text(format!("{}/{}", p.processed, p.total)).desired_width(200.0));
                }
            }
            if let Some(grid) = self.grid.as_mut() {
                if !grid.active_filters().is_empty() && ui.button("Clear filters").clicked() {
                    grid.clear_filters();
                    for f in self.filter_inputs.iter_mut() { f.clear(); }
                }
                ui.label(format!("{} / {} rows", grid.row_count(), grid.source().row_count()));
            }
        });
    }

    fn ui_grid(&mut self, ui: &mut egui::Ui) {
        let Self { grid, col_widths, filter_inputs, inspector, inspector_open, .. } = self;
        let Some(grid) = grid.as_mut() else {
            ui.centered_and_justified(|ui| ui.label("Open an Excel file to begin (File > Open)"));
            return;
        };
        let ncols = grid.column_count();
        let mut sort_click: Option<usize> = None;
        let mut changed: Vec<usize> = Vec::new();
        let mut picked: Option<(usize, String)> = None;
        let mut details: Option<usize> = None;

        let view: &GridModel = grid;
        egui::ScrollArea::horizontal().id_salt("grid_h").auto_shrink([false, false]).show(ui, |ui| {
            ui.vertical(|ui| {
                ui.horizontal(|ui| {
                    for c in 0..ncols {
                        let arrow = match view.sort_state() {
                            Some((sc, SortOrder::Ascending)) if sc == c => " ▲",
                            Some((sc, SortOrder::Descending)) if sc == c => " ▼",
                            _ => "",
                        };
                        let label = format!("{}{}", view.header(c).unwrap_or_default(), arrow);
                        let resp = ui
                            .add_sized([col_widths[c], ROW_HEIGHT], egui::Button::new(egui::RichText::new(label).strong()))
                            .on_hover_ui(|ui| {
                                let st = view.source().column_stats(c);
                                ui.label(format!("{} distinct, {} empty", st.unique, st.empty));
                            });
                        if resp.clicked() {
                            sort_click = Some(c);
                        }
                    }
                });
                ui.horizontal(|ui| {
                    for c in 0..ncols {
                        let w = col_widths[c];
                        ui.allocate_ui(egui::vec2(w, ROW_HEIGHT), |ui| {
                            ui.horizontal(|ui| {
                                let edit = TextEdit::singleline(&mut filter_inputs[c]).hint_text("filter").desired_width(w - 28.0);
                                if ui.add(edit).changed() {
                                    changed.push(c);
                                }
                                ui.menu_button("▾", |ui| {
                                    egui::ScrollArea::vertical().max_height(300.0).show(ui, |ui| {
                                        for v in view.unique_values(c).into_iter().take(UNIQUE_MENU_MAX) {
                                            if ui.button(&v).clicked() {
                                                picked = Some((c, v));
                                                ui.close_menu();
                                            }
                                        }
                                    });
                                });
                            });
                        });
                    }
                });
                ui.separator();

                egui::ScrollArea::vertical().id_salt("grid_v").auto_shrink([false, false]).show_rows(
                    ui,
                    ROW_HEIGHT,
                    view.row_count(),
                    |ui, range| {
                        for r in range {
                            let inner = ui.horizontal(|ui| {
                                for c in 0..ncols {
                                    ui.add_sized([col_widths[c], ROW_HEIGHT], egui::Label::new(view.cell_text(r, c)).truncate());
                                }
                            });
                            let resp = ui.interact(inner.response.rect, ui.id().with(("row", r)), egui::Sense::click());
                            if resp.double_clicked() {
                                details = Some(r);
                            }
                        }
                    },
                );
            });
        });

        if let Some(c) = sort_click {
            let order = match grid.sort_state() {
                Some((sc, o)) if sc == c => o.toggled(),
                _ => SortOrder::Ascending,
            };
            grid.sort(c, order);
        }
        for c in changed {
            grid.apply_column_filter(c, &filter_inputs[c]);
        }
        if let Some((c, v)) = picked {
            grid.apply_column_filter(c, &v);
            filter_inputs[c] = v;
        }
        if let Some(r) = details {
            *inspector = Some(grid.row_details(r));
            *inspector_open = true;
        }
    }

    fn ui_status(&mut self, ui: &mut egui::Ui) {
        if self.mem_checked.elapsed() > Duration::from_secs(5) {
            self.mem = memory_stats_mb();
            self.mem_checked = Instant::now();
        }
        ui.horizontal(|ui| {
            ui.label(&self.status);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(self.mem.summary());
                ui.separator();
                match &self.db {
                    Some(db) => ui.colored_label(egui::Color32::from_rgb(0, 140, 0), format!("DB: {}", db.target)),
                    None => ui.colored_label(egui::Color32::GRAY, "DB: not connected"),
                };
                if let Some(r) = &self.update_notice {
                    ui.separator();
                    if ui.link(format!("Update {} available", r.version)).clicked() {
                        self.about_open = true;
                    }
                }
                if let Some(kind) = self.jobs.current() {
                    ui.separator();
                    ui.spinner();
                    ui.label(kind.to_string());
                }
            });
        });
    }

    fn ui_windows(&mut self, ctx: &Context) {
        let mut settings_open = self.settings_open;
        let mut save = false;
        let mut test = false;
        egui::Window::new("Database Settings")
            .open(&mut settings_open)
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                egui::Grid::new("db_settings").num_columns(2).spacing([12.0, 6.0]).show(ui, |ui| {
                    ui.label("Host");
                    ui.text_edit_singleline(&mut self.form.host);
                    ui.end_row();
                    ui.label("Port");
                    ui.text_edit_singleline(&mut self.form.port);
                    ui.end_row();
                    ui.label("Database");
                    ui.text_edit_singleline(&mut self.form.database);
                    ui.end_row();
                    ui.label("Username");
                    ui.text_edit_singleline(&mut self.form.username);
                    ui.end_row();
                    ui.label("Password");
                    ui.add(TextEdit::singleline(&mut self.form.password).password(true));
                    ui.end_row();
                });
                ui.checkbox(&mut self.form.auto_connect, "Connect automatically on startup");
                ui.horizontal(|ui| {
                    test = ui.add_enabled(!self.jobs.is_busy(), egui::Button::new("Test Connection")).clicked();
                    save = ui.button("Save").clicked();
                });
            });
        self.settings_open = settings_open;
        if test { self.test_form_connection(); }
        if save { self.save_settings(); }

        let mut about_open = self.about_open;
        let mut check = false;
        let mut install = false;
        egui::Window::new(format!("About {}", self.info.name))
            .open(&mut about_open)
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.heading(&self.info.window_title);
                ui.label(format!("Version {} (build {}, released {})", self.info.version, self.info.version_code, self.info.release));
                if !self.info.description.is_empty() {
                    ui.label(&self.info.description);
                }
                ui.separator();
                if !self.update_status.is_empty() {
                    ui.label(&self.update_status);
                }
                if let Some(r) = &self.update_notice {
                    if let Some(d) = &r.release_date { ui.label(format!("Released {}", d)); }
                    for n in &r.notes { ui.label(format!("• {}", n)); }
                }
                if let Some(p) = self.download {
                    let frac = p.percent().map(|v| v / 100.0).unwrap_or(0.0);
                    ui.add(ProgressBar::new(frac).text(format_file_size(p.downloaded)));
                }
                ui.horizontal(|ui| {
                    check = ui.button("Check for updates").clicked();
                    let can_install = self.update_notice.is_some() && !self.jobs.is_busy();
                    install = ui.add_enabled(can_install, egui::Button::new("Download and install")).clicked();
                });
            });
        self.about_open = about_open;
        if check { self.check_updates(false); }
        if install { self.start_install(); }

        if let Some(rows) = &self.inspector {
            let mut open = self.inspector_open;
            egui::Window::new("Row details").open(&mut open).resizable(true).show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(400.0).show(ui, |ui| {
                    egui::Grid::new("row_details").num_columns(2).striped(true).show(ui, |ui| {
                        for (h, v) in rows {
                            ui.strong(h);
                            ui.label(v);
                            ui.end_row();
                        }
                    });
                });
            });
            self.inspector_open = open;
        }
    }

    fn handle_dropped_files(&mut self, ctx: &Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().and_then(|f| f.path.clone()));
        if let Some(path) = dropped {
            if self.jobs.is_busy() {
                self.status = "Busy; drop the file again when the current job finishes".into();
                return;
            }
            self.file_path = path.display().to_string();
            self.sheets.clear();
            self.sheet_idx = 0;
            self.start_load(None);
        }
    }
}

impl App for GuiApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll_messages(ctx);
        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::top("menu").show(ctx, |ui| self.ui_menu(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.ui_status(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_top(ui);
            ui.separator();
            self.ui_grid(ui);
        });
        self.ui_windows(ctx);

        ctx.request_repaint_after(Duration::from_millis(if self.jobs.is_busy() { 100 } else { 500 }));
    }
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let info = AppInfo::current();
    let opts = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("{} {}", info.window_title, info.version))
            .with_inner_size(info.window_size)
            .with_min_inner_size(info.min_window_size)
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        &info.name,
        opts,
        Box::new(|_cc| Ok::<Box<dyn App>, Box<(dyn std::error::Error + Send + Sync + 'static)>>(Box::new(GuiApp::new()))),
    )
}
