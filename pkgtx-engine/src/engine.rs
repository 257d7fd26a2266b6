use std::path::{Path, PathBuf};

use pkgtx_catalog::CatalogClient;
use pkgtx_events::{Event, EventBus};
use pkgtx_local::LocalPackageSystem;
use pkgtx_solve::{resolve_install, ConflictAnalyzer, RequestedPackage};
use pkgtx_transaction::Fetcher;
use pkgtx_types::{Name, ResolvedTree};
use pkgtx_uninstall::{resolve_uninstall, UninstallPlan};

use crate::config::Config;
use crate::error::EngineError;

/// The result of a completed (or partially-completed) install run.
#[derive(Debug)]
pub struct InstallOutcome {
    /// The fully resolved, conflict-checked tree: inspect `failed_roots()`
    /// for any toplevel that did not make it into the batch.
    pub tree: ResolvedTree,
    /// Where the transaction journal was written, if any package actually
    /// reached the LPS. `None` if every toplevel failed resolution or
    /// conflict analysis before a single package could be installed.
    pub journal_path: Option<PathBuf>,
}

/// The result of a completed (or partially-completed) uninstall run.
#[derive(Debug)]
pub struct UninstallOutcome {
    /// The removal plan: inspect `failures` for any root whose removal was
    /// refused.
    pub plan: UninstallPlan,
    /// Where the transaction journal was written, if anything was actually
    /// removed. `None` if every requested root was refused.
    pub journal_path: Option<PathBuf>,
}

/// Wires CAT, LPS, RES, CA, UT, TX and EVT together behind a single
/// `Config`-driven API (§4, §6.3).
///
/// Holds its collaborators as trait objects so a caller can substitute a
/// real network catalog client, a real RPM/dpkg-backed LPS, and a real
/// downloader without this crate depending on any of their concrete types.
pub struct Engine {
    config: Config,
    catalog: Box<dyn CatalogClient>,
    lps: Box<dyn LocalPackageSystem>,
    fetcher: Box<dyn Fetcher>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish()
    }
}

impl Engine {
    /// Builds an engine from a configuration and its three external
    /// collaborators.
    pub fn new(config: Config, catalog: Box<dyn CatalogClient>, lps: Box<dyn LocalPackageSystem>, fetcher: Box<dyn Fetcher>) -> Self {
        Self { config, catalog, lps, fetcher }
    }

    /// Returns the engine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the engine's configuration, mutably, so a caller can tweak
    /// per-run flags (`test`, `force`, `update`, `downgrade`,
    /// `ignore_file_conflicts`) between calls without rebuilding the engine.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Resolves `requested`, checks it for conflicts (unless
    /// `ignore_file_conflicts` is set), reports any per-toplevel failures on
    /// `events`, and — unless `test` is set or nothing survived — hands the
    /// surviving batch to the transaction executor (§4.4–§4.7).
    pub fn install(&mut self, events: &mut EventBus, requested: Vec<RequestedPackage>) -> Result<InstallOutcome, EngineError> {
        let root = self.root();
        let mut tree = resolve_install(self.catalog.as_ref(), self.lps.as_ref(), events, &root, requested)?;

        if !self.config.ignore_file_conflicts {
            ConflictAnalyzer::new().check(&mut tree, self.lps.as_ref(), &root)?;
        }

        for (_, toplevel) in tree.failed_roots() {
            events.emit(Event::InstallFailed { toplevel, tree: &tree });
        }

        if self.config.test || tree.succeeded_roots().next().is_none() {
            return Ok(InstallOutcome { tree, journal_path: None });
        }

        let journal_path = pkgtx_transaction::execute_install(
            self.fetcher.as_ref(),
            self.lps.as_ref(),
            events,
            &root,
            &self.config.transaction_dir,
            &tree,
            self.config.install_flags(),
        )?;

        Ok(InstallOutcome {
            tree,
            journal_path: Some(journal_path),
        })
    }

    /// Resolves the removal of `requested`, reports any refusals on
    /// `events` (already done by `resolve_uninstall` itself), and — unless
    /// `test` is set or nothing survived — hands the surviving removal set
    /// to the transaction executor (§4.6–§4.7).
    pub fn uninstall(&mut self, events: &mut EventBus, requested: Vec<Name>) -> Result<UninstallOutcome, EngineError> {
        let root = self.root();
        let plan = resolve_uninstall(self.lps.as_ref(), events, &root, requested)?;

        if self.config.test || plan.removals.is_empty() {
            return Ok(UninstallOutcome { plan, journal_path: None });
        }

        let journal_path = pkgtx_transaction::execute_uninstall(
            self.lps.as_ref(),
            events,
            &root,
            &self.config.transaction_dir,
            &plan.removals,
            self.config.uninstall_flags(),
        )?;

        Ok(UninstallOutcome {
            plan,
            journal_path: Some(journal_path),
        })
    }

    /// Reads the journal at `journal_path` and applies its inverse as a new
    /// transaction (§4.7 "Revert").
    pub fn revert(&mut self, events: &mut EventBus, journal_path: &Path) -> Result<PathBuf, EngineError> {
        let root = self.root();
        let path = pkgtx_transaction::revert(
            self.fetcher.as_ref(),
            self.lps.as_ref(),
            events,
            &root,
            &self.config.transaction_dir,
            journal_path,
        )?;
        Ok(path)
    }

    fn root(&self) -> PathBuf {
        self.config.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pkgtx_catalog::{CatalogDependency, FilledRef};
    use pkgtx_local::FileLps;
    use pkgtx_types::{Feature, PackageId, Sense, Version};
    use testresult::TestResult;

    use super::*;

    struct StubCatalog;

    impl CatalogClient for StubCatalog {
        fn get_info(&self, name: &Name, _architecture: Option<&str>) -> Result<FilledRef, pkgtx_catalog::CatalogError> {
            Ok(FilledRef {
                id: PackageId::new(format!("{name}-1.0-any")),
                name: name.clone(),
                version: Version::new("1.0").unwrap(),
                minor: None,
                architecture: None,
                distribution: None,
                provides: vec![Feature::from(name.clone())],
                depends: Vec::<CatalogDependency>::new(),
                files: Vec::new(),
            })
        }
    }

    struct StubFetcher;

    impl Fetcher for StubFetcher {
        fn fetch(&self, _reference: &pkgtx_types::PackageRef) -> Result<PathBuf, pkgtx_transaction::FetchError> {
            Ok(PathBuf::from("/tmp/fetched"))
        }
    }

    fn engine(dir: &Path) -> Engine {
        let config = Config {
            root: dir.join("root"),
            transaction_dir: dir.join("transactions"),
            tmp_dir: dir.join("tmp"),
            ..Config::default()
        };
        Engine::new(config, Box::new(StubCatalog), Box::new(FileLps::new()), Box::new(StubFetcher))
    }

    #[test]
    fn install_then_uninstall_round_trips_through_the_facade() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut engine = engine(dir.path());
        let mut events = EventBus::new();

        let outcome = engine.install(&mut events, vec![RequestedPackage::named(Name::new("app")?)])?;
        assert!(outcome.journal_path.is_some());
        assert!(engine.lps.is_installed(&engine.config.root, &Name::new("app")?, None, Sense::Any)?);

        let outcome = engine.uninstall(&mut events, vec![Name::new("app")?])?;
        assert!(outcome.plan.is_complete_success());
        assert!(outcome.journal_path.is_some());
        assert!(!engine.lps.is_installed(&engine.config.root, &Name::new("app")?, None, Sense::Any)?);
        Ok(())
    }

    #[test]
    fn test_mode_skips_lps_mutation() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut engine = engine(dir.path());
        engine.config.test = true;
        let mut events = EventBus::new();

        let outcome = engine.install(&mut events, vec![RequestedPackage::named(Name::new("app")?)])?;
        assert!(outcome.journal_path.is_none());
        assert!(!engine.lps.is_installed(&engine.config.root, &Name::new("app")?, None, Sense::Any)?);
        Ok(())
    }

    #[test]
    fn revert_undoes_an_install() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut engine = engine(dir.path());
        let mut events = EventBus::new();

        let outcome = engine.install(&mut events, vec![RequestedPackage::named(Name::new("app")?)])?;
        let journal_path = outcome.journal_path.expect("install applied");

        engine.revert(&mut events, &journal_path)?;
        assert!(!engine.lps.is_installed(&engine.config.root, &Name::new("app")?, None, Sense::Any)?);
        Ok(())
    }
}
