use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use codeshell_core::catalog::{self, FOLDER_ICON};
use codeshell_core::{FileSystem, HeadlessSurface, LocalFileSystem};
use codeshell_project::{
    EvictionPolicy, JsonFileStore, RestoreReport, SessionEvent, SessionStore, SnapshotPersister,
    Workspace, WorkspaceOptions,
};
use codeshell_settings::{EvictionMode, Preferences, PreferencesStore, ThemeCatalog};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "codeshell-cli",
    about = "Headless driver for the codeshell workspace core",
    author,
    version
)]
struct Cli {
    /// 指定工作區根目錄；預設為目前目錄。 / Workspace root (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    /// 工作階段狀態檔案。 / Session state file (defaults to <workspace>/.codeshell/state.json).
    #[arg(long, global = true, value_name = "FILE")]
    state: Option<PathBuf>,
    /// 輸出除錯紀錄。 / Emit debug logs on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示資料夾樹。 / Print the directory tree of a folder.
    Tree(TreeArgs),
    /// 顯示檔案的圖示、顏色與語言。 / Show icon, colour and language for paths.
    Info(InfoArgs),
    /// 開啟檔案並更新工作階段。 / Open files into the saved session.
    Open(OpenArgs),
    /// 解析文件中的連結並開啟。 / Resolve a link from the active document and open it.
    Link(LinkArgs),
    /// 檢視或還原工作階段。 / Inspect, restore or clear the saved session.
    #[command(subcommand)]
    Session(SessionCommand),
    /// 管理佈景主題。 / List, read or select the editor theme.
    #[command(subcommand)]
    Theme(ThemeCommand),
}

#[derive(Args)]
struct TreeArgs {
    /// 根目錄；預設為工作區。 / Folder to list; defaults to the workspace root.
    dir: Option<PathBuf>,
    /// 額外展開的子資料夾。 / Sub-folders to expand, in order.
    #[arg(long, value_name = "DIR")]
    expand: Vec<PathBuf>,
}

#[derive(Args)]
struct InfoArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct OpenArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// 先開啟此資料夾（會關閉現有分頁）。 / Open this folder first, closing existing tabs.
    #[arg(long, value_name = "DIR")]
    folder: Option<PathBuf>,
    /// 不切換到新開啟的檔案。 / Open without activating.
    #[arg(long)]
    background: bool,
}

#[derive(Args)]
struct LinkArgs {
    /// 文件中的連結文字。 / Link text as written in the document.
    link: String,
    /// 以此檔案作為目前文件。 / Open and activate this file first.
    #[arg(long, value_name = "FILE")]
    from: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// 以 JSON 輸出儲存的快照。 / Print the saved snapshot as JSON.
    Show,
    /// 還原並輸出結果。 / Restore the saved session and report what came back.
    Restore,
    /// 清除儲存的狀態。 / Delete the saved session state.
    Clear,
}

#[derive(Subcommand)]
enum ThemeCommand {
    List,
    Get,
    Set(ThemeSetArgs),
}

#[derive(Args)]
struct ThemeSetArgs {
    name: String,
}

struct AppContext {
    root: PathBuf,
    state: PathBuf,
    preferences: PreferencesStore,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        workspace,
        state,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    let root = resolve_workspace(workspace)?;
    let state = match state {
        Some(path) => resolve_input_path(&path)?,
        None => state_path(&root),
    };
    let preferences = PreferencesStore::load(preferences_path(&root))
        .context("failed to load preferences")?;
    let mut ctx = AppContext {
        root,
        state,
        preferences,
    };
    debug!(state = %ctx.state.display(), "resolved workspace");

    match command {
        Commands::Tree(args) => print_tree(args, &ctx),
        Commands::Info(args) => print_info(args),
        Commands::Open(args) => open_files(args, &ctx),
        Commands::Link(args) => open_link(args, &ctx),
        Commands::Session(subcommand) => execute_session_command(subcommand, &ctx),
        Commands::Theme(subcommand) => execute_theme_command(subcommand, &mut ctx),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn print_tree(args: TreeArgs, ctx: &AppContext) -> Result<()> {
    let dir = match args.dir {
        Some(dir) => resolve_input_path(&dir)?,
        None => ctx.root.clone(),
    };
    let mut workspace = build_workspace(ctx, None);
    workspace
        .open_folder(&dir)
        .with_context(|| format!("failed to open folder {}", dir.display()))?;
    for sub in &args.expand {
        let target = if sub.is_absolute() {
            sub.clone()
        } else {
            dir.join(sub)
        };
        workspace
            .expand(&target)
            .with_context(|| format!("failed to expand {}", target.display()))?;
    }

    for row in workspace.tree().rows() {
        let indent = "  ".repeat(row.depth);
        let marker = match (row.is_dir, row.expanded) {
            (true, true) => "v ",
            (true, false) => "> ",
            (false, _) => "  ",
        };
        let suffix = if row.is_dir { "/" } else { "" };
        println!("{indent}{marker}{}{suffix}", row.name);
    }
    Ok(())
}

fn print_info(args: InfoArgs) -> Result<()> {
    let fs = LocalFileSystem;
    for path in &args.paths {
        let resolved = resolve_input_path(path)?;
        let is_dir = fs.is_directory(&resolved).unwrap_or(false);
        if is_dir {
            println!("{}\tfolder\t{FOLDER_ICON}", path.display());
            continue;
        }
        let info = catalog::file_info(&resolved);
        println!(
            "{}\t{}\t{}\t{}",
            path.display(),
            info.language,
            info.icon,
            info.color
        );
    }
    Ok(())
}

fn open_files(args: OpenArgs, ctx: &AppContext) -> Result<()> {
    let store = session_store(ctx);
    let saved = store.load().context("failed to read session state")?;
    let persister = spawn_persister(ctx, store)?;
    let mut workspace = build_workspace(ctx, Some(persister));
    if let Some(snapshot) = &saved {
        workspace.restore(snapshot);
        workspace.take_events();
    }

    if let Some(folder) = &args.folder {
        let folder = resolve_input_path(folder)?;
        workspace
            .open_folder(&folder)
            .with_context(|| format!("failed to open folder {}", folder.display()))?;
    }
    for path in &args.paths {
        let path = resolve_input_path(path)?;
        workspace
            .open_file(&path, !args.background)
            .with_context(|| format!("failed to open {}", path.display()))?;
    }

    for event in workspace.take_events() {
        if let SessionEvent::Evicted(path) = event {
            println!("evicted {}", path.display());
        }
    }
    print_tabs(&workspace);
    workspace.flush();
    Ok(())
}

fn open_link(args: LinkArgs, ctx: &AppContext) -> Result<()> {
    let store = session_store(ctx);
    let saved = store.load().context("failed to read session state")?;
    let persister = spawn_persister(ctx, store)?;
    let mut workspace = build_workspace(ctx, Some(persister));
    if let Some(snapshot) = &saved {
        workspace.restore(snapshot);
    }
    if let Some(from) = &args.from {
        let from = resolve_input_path(from)?;
        workspace
            .open_file(&from, true)
            .with_context(|| format!("failed to open {}", from.display()))?;
    }

    let resolved = workspace
        .open_link(&args.link)
        .with_context(|| format!("cannot follow link '{}'", args.link))?;
    println!("{}", resolved.display());
    workspace.flush();
    Ok(())
}

fn execute_session_command(command: SessionCommand, ctx: &AppContext) -> Result<()> {
    match command {
        SessionCommand::Show => show_session(ctx),
        SessionCommand::Restore => restore_session(ctx),
        SessionCommand::Clear => clear_session(ctx),
    }
}

fn show_session(ctx: &AppContext) -> Result<()> {
    match session_store(ctx)
        .load()
        .context("failed to read session state")?
    {
        Some(snapshot) => {
            let json = serde_json::to_string_pretty(&snapshot)
                .context("failed to serialise session snapshot")?;
            println!("{json}");
        }
        None => println!("No saved session in {}", ctx.state.display()),
    }
    Ok(())
}

fn restore_session(ctx: &AppContext) -> Result<()> {
    let store = session_store(ctx);
    let Some(snapshot) = store.load().context("failed to read session state")? else {
        println!("No saved session in {}", ctx.state.display());
        return Ok(());
    };
    let persister = spawn_persister(ctx, store)?;
    let mut workspace = build_workspace(ctx, Some(persister));
    let report = workspace.restore(&snapshot);
    print_report(&report);
    print_tabs(&workspace);
    workspace.flush();
    Ok(())
}

fn clear_session(ctx: &AppContext) -> Result<()> {
    session_store(ctx)
        .clear()
        .with_context(|| format!("failed to clear {}", ctx.state.display()))?;
    println!("Cleared session state at {}", ctx.state.display());
    Ok(())
}

fn execute_theme_command(command: ThemeCommand, ctx: &mut AppContext) -> Result<()> {
    match command {
        ThemeCommand::List => list_themes(ctx),
        ThemeCommand::Get => {
            println!("{}", current_theme(ctx)?);
            Ok(())
        }
        ThemeCommand::Set(args) => set_theme(args, ctx),
    }
}

fn list_themes(ctx: &AppContext) -> Result<()> {
    let current = current_theme(ctx)?;
    println!("Available themes:");
    for theme in ThemeCatalog::builtin().themes() {
        let marker = if theme.id == current { "*" } else { "-" };
        println!(
            "  {marker} {} ({}, {}, {})",
            theme.id,
            theme.label,
            theme.kind.as_str(),
            theme.editor_background
        );
    }
    Ok(())
}

fn set_theme(args: ThemeSetArgs, ctx: &mut AppContext) -> Result<()> {
    let catalog = ThemeCatalog::builtin();
    let theme = catalog.find(&args.name).ok_or_else(|| {
        let known: Vec<_> = catalog.ids().collect();
        anyhow!(
            "unknown theme '{}' (expected one of: {})",
            args.name,
            known.join(", ")
        )
    })?;

    ctx.preferences
        .update(|prefs| prefs.ui.theme = theme.id.to_string())
        .context("failed to save preferences")?;

    let mut store = session_store(ctx);
    let mut snapshot = store
        .load()
        .context("failed to read session state")?
        .unwrap_or_default();
    snapshot.selected_theme = Some(theme.id.to_string());
    store
        .save(&snapshot)
        .with_context(|| format!("failed to write {}", ctx.state.display()))?;

    println!("Theme set to {}", theme.id);
    Ok(())
}

fn current_theme(ctx: &AppContext) -> Result<String> {
    let saved = session_store(ctx)
        .load()
        .context("failed to read session state")?
        .and_then(|snapshot| snapshot.selected_theme);
    let catalog = ThemeCatalog::builtin();
    let theme = match saved {
        Some(id) if catalog.contains(&id) => catalog.resolve(&id),
        _ => catalog.resolve(&ctx.preferences.preferences().ui.theme),
    };
    Ok(theme.id.to_string())
}

fn print_report(report: &RestoreReport) {
    println!("Restored {} document(s)", report.restored.len());
    for path in &report.missing {
        println!("missing {}", path.display());
    }
    for path in &report.failed {
        println!("unreadable {}", path.display());
    }
}

fn print_tabs(workspace: &Workspace<HeadlessSurface>) {
    for tab in workspace.buffers().tabs() {
        let marker = if tab.active { "*" } else { " " };
        println!("{marker} {}\t{}", tab.title, tab.path.display());
    }
}

fn build_workspace(
    ctx: &AppContext,
    persister: Option<SnapshotPersister>,
) -> Workspace<HeadlessSurface> {
    let options = workspace_options(ctx.preferences.preferences());
    let workspace = Workspace::new(Arc::new(LocalFileSystem), HeadlessSurface::new(), options);
    match persister {
        Some(persister) => workspace.with_persister(persister),
        None => workspace,
    }
}

fn workspace_options(prefs: &Preferences) -> WorkspaceOptions {
    WorkspaceOptions {
        max_open_documents: prefs.session.max_open_documents,
        eviction: match prefs.session.eviction {
            EvictionMode::Insertion => EvictionPolicy::InsertionOrder,
            EvictionMode::Lru => EvictionPolicy::LeastRecentlyActivated,
        },
        theme: prefs.ui.theme.clone(),
    }
}

fn session_store(ctx: &AppContext) -> SessionStore<JsonFileStore> {
    SessionStore::new(JsonFileStore::new(&ctx.state))
}

fn spawn_persister(
    ctx: &AppContext,
    store: SessionStore<JsonFileStore>,
) -> Result<SnapshotPersister> {
    let debounce = Duration::from_millis(ctx.preferences.preferences().session.persist_debounce_ms);
    SnapshotPersister::spawn(store, debounce).context("failed to start session writer")
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => resolve_input_path(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}

fn state_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".codeshell").join("state.json")
}

fn preferences_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".codeshell").join("preferences.json")
}

