use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{error, info};

use watchdog::WatchdogError;
use watchdog::cli::{Cli, Commands};
use watchdog::config::{Config, ConfigFile, SettingsSource};
use watchdog::daemon::{self, PidFile, Shutdown};
use watchdog::logging;
use watchdog::reaper::{Reaper, StatvfsProbe, candidates, usage_percent};
use watchdog::supervisor::{ProgramSpec, Supervisor, SysinfoInspector};

fn run_check(config_path: &Path, config: &Config) -> Result<()> {
    println!("{} {}", "Config:".cyan(), config_path.display());

    println!(
        "{} every {:?}, prefix {:?}",
        "Programs:".cyan(),
        config.watchdog.poll_interval(),
        config.watchdog.process_prefix
    );
    for entry in &config.watchdog.programs {
        match ProgramSpec::from_entry(entry) {
            Ok(spec) => println!("  {} {}", "ok".green(), spec),
            Err(e) => println!("  {} {:?}: {}", "skip".red(), entry, e),
        }
    }

    let probe = StatvfsProbe;
    println!(
        "{} every {:?}, threshold {}%",
        "Partitions:".cyan(),
        config.disk.poll_interval(),
        config.disk.threshold()
    );
    for partition in &config.disk.partitions {
        let usage = usage_percent(&probe, partition);
        let line = format!("  {} {:.1}%", partition.display(), usage);
        if usage >= config.disk.threshold() {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }

    println!("{}", "Reclaimable directories:".cyan());
    for directory in &config.disk.delete_file_paths {
        let count = candidates(std::slice::from_ref(directory)).len();
        println!("  {} ({} files)", directory.display(), count);
    }

    Ok(())
}

fn run_daemon(cli: &Cli, config_path: &Path, config: &Config) -> Result<()> {
    let _lock = match PidFile::acquire(&cli.pid_file) {
        Ok(lock) => lock,
        Err(WatchdogError::AlreadyRunning(pid)) => {
            println!("{} (pid {})", "Watchdog is already running".yellow(), pid);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to take the single-instance lock"),
    };

    let log_file = logging::setup_logging(&config.logging).context("Failed to setup logging")?;
    info!("===== Running Version {} =====", env!("CARGO_PKG_VERSION"));
    info!("Config: {}, log: {}", config_path.display(), log_file.display());

    let settings: Arc<dyn SettingsSource> =
        Arc::new(ConfigFile::open(config_path).context("Failed to load configuration")?);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let summary = runtime.block_on(async {
        let shutdown = Shutdown::new();
        let listener = shutdown.listen_for_signals()?;

        let supervisor = Supervisor::new(settings.clone(), SysinfoInspector::new());
        let reaper = Reaper::new(settings, StatvfsProbe);
        let summary = daemon::run(supervisor, reaper, shutdown.clone()).await;

        shutdown.trigger();
        if let Err(e) = listener.await {
            error!("Signal listener failed: {}", e);
        }
        Ok::<_, WatchdogError>(summary)
    })?;

    info!(
        "Supervisor: {} cycles, {} started, {} failed starts",
        summary.supervisor.cycles, summary.supervisor.started, summary.supervisor.failed
    );
    info!(
        "Reaper: {} cycles, {} files deleted, {} bytes freed",
        summary.reaper.cycles, summary.reaper.deleted, summary.reaper.freed_bytes
    );
    info!("===== Finished Version {} =====", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref()).context("Failed to find configuration")?;
    let mut config = Config::load_from_file(&config_path).context("Failed to load configuration")?;
    if cli.is_verbose() {
        config.logging.level = "DEBUG".to_string();
    }

    let result = match cli.command {
        Some(Commands::Check) => run_check(&config_path, &config),
        Some(Commands::Run) | None => run_daemon(&cli, &config_path, &config),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    logging::flush();
    result
}
