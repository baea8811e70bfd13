use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dashboard_layouts::Dashboard;
use dashboard_layouts::common::config::{Config, config_file, history_file};
use dashboard_layouts::common::log;
use dashboard_layouts::layout::DashboardSpec;
use dashboard_layouts::layout::legacy::LegacyPanel;
use dashboard_layouts::mutation::MutationResult;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check the configuration file and exit.
    #[arg(long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layout tree of a saved dashboard (JSON or RON)
    Show { file: PathBuf },
    /// Run mutation commands from a JSON file against a saved dashboard
    Apply {
        file: PathBuf,
        commands: PathBuf,
        /// Write the resulting dashboard here.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Save the undo history as RON under ~/.dashlayout.
        #[arg(long)]
        history: bool,
    },
    /// Print a saved dashboard as a v1 panel list
    Legacy {
        file: PathBuf,
        /// Read a v1 panel list instead and print the dashboard save model.
        #[arg(long)]
        import: bool,
    },
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    let config = match load_config(opt.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    };

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config validation passed");
            return;
        }
        for issue in issues {
            eprintln!("{issue}");
        }
        process::exit(1);
    }

    let result = match opt.command {
        Some(Commands::Show { file }) => show(&config, &file),
        Some(Commands::Apply { file, commands, out, history }) => {
            apply(&config, &file, &commands, out.as_deref(), history)
        }
        Some(Commands::Legacy { file, import: false }) => export_legacy(&config, &file),
        Some(Commands::Legacy { file, import: true }) => import_legacy(&config, &file),
        None => {
            eprintln!("no command given; see --help");
            process::exit(2);
        }
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Config::load_default();
    };
    if !path.exists() {
        bail!("config file {} does not exist", path.display());
    }
    info!(path = %path.display(), default = ?config_file(), "using config file");
    Config::read(path)
}

fn show(config: &Config, file: &Path) -> anyhow::Result<()> {
    let dashboard = Dashboard::from_spec(config, &DashboardSpec::read(file)?);
    let tree = dashboard.tree();
    print!("{}", tree.draw_tree(dashboard.body()));

    for issue in config.validate() {
        println!("warning: {issue}");
    }
    for node in tree.root().traverse_preorder(tree.map()) {
        if !tree.kind_of(node).is_ok_and(|kind| kind.group().is_some()) {
            continue;
        }
        let mut duplicates: Vec<_> = dashboard.duplicate_titles(node)?.into_iter().collect();
        duplicates.sort();
        for title in duplicates {
            let path = tree.path_of(node)?;
            println!("warning: duplicate title {title:?} under {path}");
        }
    }
    Ok(())
}

fn apply(
    config: &Config,
    file: &Path,
    commands: &Path,
    out: Option<&Path>,
    save_history: bool,
) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::from_spec(config, &DashboardSpec::read(file)?);
    let buf = std::fs::read_to_string(commands)
        .with_context(|| format!("reading {}", commands.display()))?;
    let commands: Value = serde_json::from_str(&buf)
        .with_context(|| format!("parsing {}", commands.display()))?;
    let commands = match commands {
        Value::Array(commands) => commands,
        single => vec![single],
    };

    let results: Vec<MutationResult> =
        commands.into_iter().map(|command| dashboard.execute_json(command)).collect();
    let failed = results.iter().filter(|r| !r.success).count();
    println!("{}", serde_json::to_string_pretty(&results)?);
    if failed > 0 {
        warn!(failed, total = results.len(), "some commands failed");
    }

    if let Some(out) = out {
        dashboard.to_spec()?.write(out)?;
        info!(path = %out.display(), "wrote dashboard");
    }
    if save_history {
        let Some(path) = history_file() else {
            bail!("no home directory to save the history in");
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let log = ron::ser::to_string_pretty(dashboard.history(), ron::ser::PrettyConfig::default())?;
        std::fs::write(&path, log).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "saved undo history");
    }
    Ok(())
}

fn export_legacy(config: &Config, file: &Path) -> anyhow::Result<()> {
    let dashboard = Dashboard::from_spec(config, &DashboardSpec::read(file)?);
    println!("{}", serde_json::to_string_pretty(&dashboard.to_legacy()?)?);
    Ok(())
}

fn import_legacy(config: &Config, file: &Path) -> anyhow::Result<()> {
    let buf = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let panels: Vec<LegacyPanel> =
        serde_json::from_str(&buf).with_context(|| format!("parsing {}", file.display()))?;
    let dashboard = Dashboard::from_legacy(config, &panels);
    println!("{}", serde_json::to_string_pretty(&dashboard.to_spec()?)?);
    Ok(())
}
