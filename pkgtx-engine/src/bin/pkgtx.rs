//! The `pkgtx` CLI tool.

use std::process::ExitCode;

use clap::Parser;
use pkgtx_engine::cli::{Cli, Command};
use pkgtx_engine::local_support::{LocalCatalog, LocalFetcher};
use pkgtx_engine::{Config, Engine};
use pkgtx_events::{EventBus, LoggingObserver};
use pkgtx_local::FileLps;
use pkgtx_solve::RequestedPackage;
use pkgtx_types::Name;
use simplelog::{ColorChoice, Config as LogConfig, TermLogger};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = TermLogger::init(
        cli.verbose.log_level_filter(),
        LogConfig::default(),
        simplelog::TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("failed to initialize logger:\n{error}");
        return ExitCode::FAILURE;
    }

    let config = Config {
        root: cli.root.clone(),
        tmp_dir: cli.tmp_dir.clone(),
        transaction_dir: cli.transaction_dir(),
        verbose: cli.verbose.log_level_filter() >= log::LevelFilter::Debug,
        ..Config::default()
    };

    let mut engine = Engine::new(
        config,
        Box::new(LocalCatalog::new(cli.catalog_dir.clone())),
        Box::new(FileLps::new()),
        Box::new(LocalFetcher::new(cli.tmp_dir.clone())),
    );
    let mut events = EventBus::new();
    events.add_observer(Box::new(LoggingObserver));

    let result = run(&cli.command, &mut engine, &mut events);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command, engine: &mut Engine, events: &mut EventBus) -> Result<(), pkgtx_engine::EngineError> {
    match command {
        Command::Install {
            names,
            test,
            force,
            update,
            downgrade,
            ignore_file_conflicts,
        } => {
            engine.config_mut().test = *test;
            engine.config_mut().force = *force;
            engine.config_mut().update = *update;
            engine.config_mut().downgrade = *downgrade;
            engine.config_mut().ignore_file_conflicts = *ignore_file_conflicts;

            let requested = names
                .iter()
                .filter_map(|raw| Name::new(raw.clone()).ok())
                .map(RequestedPackage::named)
                .collect();
            let outcome = engine.install(events, requested)?;
            for (_, root) in outcome.tree.failed_roots() {
                println!("failed: {} [{}]", pkgtx_types::ref_readable_name(root), root.status);
            }
            if let Some(journal) = outcome.journal_path {
                println!("transaction journal: {}", journal.display());
            }
            Ok(())
        }
        Command::Uninstall { names, test, force } => {
            engine.config_mut().test = *test;
            engine.config_mut().force = *force;

            let requested = names.iter().filter_map(|raw| Name::new(raw.clone()).ok()).collect();
            let outcome = engine.uninstall(events, requested)?;
            for failure in &outcome.plan.failures {
                println!("refused: {} (would break {} package(s))", failure.root, failure.broken.len());
            }
            if let Some(journal) = outcome.journal_path {
                println!("transaction journal: {}", journal.display());
            }
            Ok(())
        }
        Command::Revert { journal } => {
            let path = engine.revert(events, journal)?;
            println!("reverted; new journal: {}", path.display());
            Ok(())
        }
    }
}
