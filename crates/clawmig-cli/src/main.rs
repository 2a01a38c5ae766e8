use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use clawmig_core::attention::{manual_attention, model_advice};
use clawmig_core::backup::{create_backup, list_backups, restore_backup, verify_backup};
use clawmig_core::convert::ConvertOptions;
use clawmig_core::detect::{detect_installation, format_size, Assistant, Installation};
use clawmig_core::document::write_config;
use clawmig_core::migration::{convert_file, run_migration, MigrateOptions, MigrationReport};
use clawmig_core::settings::{load_settings, resolve_paths, MigrationPaths, PathOverrides, Settings};
use clawmig_core::verify::{verify_target, VerifyReport};
use clawmig_core::workspace::OutcomeStatus;

mod version;

const LOG_ENV: &str = "CLAWMIG_LOG";

#[derive(Parser)]
#[command(name = "clawmig", version = version::FULL, about = "Migrate an OpenClaw home to PicoClaw")]
struct Cli {
    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// OpenClaw home (default ~/.openclaw)
    #[arg(long, global = true, value_name = "DIR")]
    source_home: Option<PathBuf>,
    /// PicoClaw home (default ~/.picoclaw)
    #[arg(long, global = true, value_name = "DIR")]
    target_home: Option<PathBuf>,
    /// Where backup archives live (default ~)
    #[arg(long, global = true, value_name = "DIR")]
    backup_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect both installations and list what needs manual work
    Detect,
    /// Back up, copy the workspace and convert the config
    Migrate {
        /// Show what would be migrated without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the tar.gz backup of the OpenClaw home
        #[arg(long)]
        no_backup: bool,
        /// Replace an outdated default model with its recommended successor
        #[arg(long)]
        upgrade_model: bool,
        /// Leave files that already exist in the PicoClaw workspace alone
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Convert an OpenClaw config file to PicoClaw format
    Convert {
        source: PathBuf,
        /// Existing PicoClaw config whose values take precedence
        #[arg(long, value_name = "FILE")]
        merge: Option<PathBuf>,
        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Archive the OpenClaw home
    Backup,
    /// List backup archives, newest first
    Backups,
    /// Replace the OpenClaw home with an archive's contents
    Restore { archive: PathBuf },
    /// Check the PicoClaw workspace and config after a migration
    Verify,
    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };
    if let Command::Version = command {
        if cli.json {
            return print_json(&version::info());
        }
        println!("clawmig {}", version::FULL);
        return Ok(());
    }

    let settings = load_settings().context("load clawmig settings")?;
    if let Command::Convert { source, merge, out } = command {
        return convert(&cli, &settings, source, merge.as_deref(), out.as_deref());
    }

    let overrides = PathOverrides {
        source_home: cli.source_home.clone(),
        target_home: cli.target_home.clone(),
        backup_dir: cli.backup_dir.clone(),
    };
    let paths = resolve_paths(&overrides, &settings).context("resolve migration paths")?;

    match command {
        Command::Detect => detect(&cli, &paths),
        Command::Migrate {
            dry_run,
            no_backup,
            upgrade_model,
            no_overwrite,
        } => {
            let options = MigrateOptions {
                dry_run: *dry_run,
                backup: !no_backup,
                upgrade_model: *upgrade_model,
                overwrite: !no_overwrite && settings.overwrite(),
            };
            migrate(&cli, &paths, &options)
        }
        Command::Backup => backup(&cli, &paths),
        Command::Backups => backups(&cli, &paths),
        Command::Restore { archive } => restore(&cli, &paths, archive),
        Command::Verify => verify(&cli, &paths),
        Command::Convert { .. } | Command::Version => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn detect(cli: &Cli, paths: &MigrationPaths) -> Result<()> {
    let openclaw = detect_installation(Assistant::OpenClaw, &paths.source_home);
    let picoclaw = detect_installation(Assistant::PicoClaw, &paths.target_home);
    let attention = manual_attention(&openclaw);
    let model = openclaw.config.as_ref().and_then(model_advice);

    if cli.json {
        return print_json(&json!({
            "openclaw": openclaw,
            "picoclaw": picoclaw,
            "attention": attention,
            "model": model,
        }));
    }

    print_installation("OpenClaw", &openclaw);
    print_installation("PicoClaw", &picoclaw);
    if let Some(model) = model {
        match model.recommended {
            Some(recommended) => println!("Model: {} (upgrade available: {recommended})", model.current),
            None => println!("Model: {}", model.current),
        }
    }
    if !attention.is_empty() {
        println!("Needs manual attention:");
        for item in attention {
            println!("- {}", item.message);
        }
    }
    Ok(())
}

fn print_installation(label: &str, inst: &Installation) {
    if !inst.found {
        println!("{label}: not found at {}", inst.home_dir.display());
        return;
    }
    println!("{label}: {}", inst.home_dir.display());
    if let Some(binary) = &inst.binary_path {
        let version = inst.version.as_deref().unwrap_or("unknown version");
        println!("  binary: {} ({version})", binary.display());
    }
    if let Some(error) = &inst.config_error {
        println!("  config: {} ({error})", inst.config_path.display());
    } else if let Some(summary) = &inst.config_summary {
        println!(
            "  config: {} ({})",
            inst.config_path.display(),
            format_size(summary.config_file_size)
        );
    }
    if !inst.workspace_files.is_empty() {
        println!("  workspace files: {}", inst.workspace_files.join(", "));
    }
    if !inst.extra_dirs.is_empty() {
        println!("  workspace dirs: {}", inst.extra_dirs.join(", "));
    }
}

fn migrate(cli: &Cli, paths: &MigrationPaths, options: &MigrateOptions) -> Result<()> {
    let report = run_migration(paths, options).context("migration failed")?;
    if cli.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    let errors = report.error_count();
    if errors > 0 {
        bail!("{errors} item(s) failed to migrate");
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    if report.dry_run {
        println!("Dry run: nothing was written.");
        if let Some(preview) = &report.preview {
            println!(
                "Would copy {} file(s) in {} top-level director(ies) to {}",
                preview.files,
                preview.directories,
                report.paths.target_workspace().display()
            );
        }
        if report.paths.source_config().is_file() {
            println!(
                "Would convert {} to {}",
                report.paths.source_config().display(),
                report.paths.target_config().display()
            );
        }
    }
    if let Some(backup) = &report.backup {
        println!("Backup: {} ({})", backup.path.display(), format_size(backup.size));
    }
    if let Some(warning) = &report.backup_warning {
        println!("Backup warning: {warning}");
    }
    if let Some(ws) = &report.workspace {
        println!(
            "Workspace: {} migrated, {} skipped, {} failed",
            ws.migrated, ws.skipped, ws.errors
        );
        for failure in ws.failures() {
            if let Some(error) = failure.error() {
                println!("  {}: {error}", failure.name);
            }
        }
    }
    if let Some(config) = &report.config {
        match &config.status {
            OutcomeStatus::Migrated => println!("Config: written to {}", config.dest.display()),
            OutcomeStatus::Skipped { reason } => println!("Config: skipped ({reason})"),
            OutcomeStatus::Failed { error } => println!("Config: failed ({error})"),
        }
    }
    if let Some(model) = &report.model {
        if let Some(recommended) = &model.recommended {
            if report.model_upgraded {
                println!("Model: {} -> {recommended}", model.current);
            } else {
                println!("Model: {} is outdated; consider {recommended}", model.current);
            }
        }
    }
    for item in &report.attention {
        println!("Attention: {}", item.message);
    }
    if let Some(verify) = &report.verify {
        print_verify(verify);
    }
}

fn print_verify(report: &VerifyReport) {
    println!(
        "Verify: {} file(s), {} in workspace; config {}",
        report.file_count,
        format_size(report.total_bytes),
        if report.config_exists { "present" } else { "missing" }
    );
    for file in &report.key_files {
        if file.present {
            println!("  {}: {} lines", file.name, file.lines);
        } else {
            println!("  {}: missing", file.name);
        }
    }
}

fn convert(
    cli: &Cli,
    settings: &Settings,
    source: &Path,
    merge: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let options = ConvertOptions {
        workspace: settings.workspace_display(),
    };
    let converted = convert_file(source, merge, &options)
        .with_context(|| format!("convert {}", source.display()))?;
    match out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            write_config(&converted, out).with_context(|| format!("write {}", out.display()))?;
            if cli.json {
                print_json(&json!({"ok": true, "path": out}))?;
            } else {
                println!("Wrote {}", out.display());
            }
        }
        None => print_json(&converted)?,
    }
    Ok(())
}

fn backup(cli: &Cli, paths: &MigrationPaths) -> Result<()> {
    let info = create_backup(&paths.source_home, &paths.backup_dir).context("create backup")?;
    verify_backup(&info.path).with_context(|| format!("verify {}", info.path.display()))?;
    if cli.json {
        return print_json(&info);
    }
    println!("Backup: {} ({})", info.path.display(), format_size(info.size));
    Ok(())
}

fn backups(cli: &Cli, paths: &MigrationPaths) -> Result<()> {
    let list = list_backups(&paths.backup_dir);
    if cli.json {
        return print_json(&list);
    }
    if list.is_empty() {
        println!("No backups in {}", paths.backup_dir.display());
    }
    for info in list {
        println!("{}  {}", info.file_name, format_size(info.size));
    }
    Ok(())
}

fn restore(cli: &Cli, paths: &MigrationPaths, archive: &Path) -> Result<()> {
    let archive = if archive.is_file() {
        archive.to_path_buf()
    } else {
        paths.backup_dir.join(archive)
    };
    restore_backup(&archive, &paths.source_home)
        .with_context(|| format!("restore {}", archive.display()))?;
    if cli.json {
        return print_json(&json!({"ok": true, "archive": archive, "home": paths.source_home}));
    }
    println!("Restored {} into {}", archive.display(), paths.source_home.display());
    Ok(())
}

fn verify(cli: &Cli, paths: &MigrationPaths) -> Result<()> {
    let report = verify_target(paths);
    if cli.json {
        print_json(&report)?;
    } else {
        print_verify(&report);
    }
    if !report.workspace_exists {
        bail!("PicoClaw workspace not found at {}", paths.target_workspace().display());
    }
    Ok(())
}
