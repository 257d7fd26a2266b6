use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use pkgtx_types::{make_ref, Feature, FillFlags, Name, PackageRef, Sense, Version};

use crate::criterion::Criterion;
use crate::error::LPSError;
use crate::flags::{InstallFlags, UninstallFlags};
use crate::outcome::PerPackageOutcome;
use crate::record::{parse_record, write_record, InstalledRecord};

/// Guards exclusive access to a [`FileLps`] database for the duration of a
/// batch operation, exactly like `alpm-db`'s `DatabaseLock`: acquired with
/// `create_new` so a second concurrent acquire fails outright, and released
/// automatically when dropped.
struct DatabaseLock {
    path: PathBuf,
}

impl DatabaseLock {
    fn acquire(db_dir: &Path) -> Result<Self, LPSError> {
        let path = db_dir.join(".lock");
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|_| LPSError::Locked(path.display().to_string()))?;
        Ok(Self { path })
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// A local file-backed [`crate::LocalPackageSystem`].
///
/// Stores one record file per installed package under
/// `<root>/var/lib/pkgtx/installed/<name>`, in the `%SECTION%` format
/// `pkgtx_local::record` defines. Not a real RPM/dpkg backend — driving one
/// is out of scope for this engine — but a faithful enough stand-in to
/// exercise the resolver, conflict analyzer and uninstall traverser against
/// real filesystem state in tests.
#[derive(Clone, Debug)]
pub struct FileLps;

impl FileLps {
    /// Creates a new file-backed LPS. Stateless; all state lives under the
    /// `root` passed to each call.
    pub fn new() -> Self {
        Self
    }

    fn db_dir(root: &Path) -> PathBuf {
        root.join("var/lib/pkgtx/installed")
    }

    fn record_path(root: &Path, name: &Name) -> PathBuf {
        Self::db_dir(root).join(name.as_str())
    }

    fn ensure_db_dir(root: &Path) -> Result<PathBuf, LPSError> {
        let dir = Self::db_dir(root);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn read_all_records(root: &Path) -> Result<Vec<InstalledRecord>, LPSError> {
        let dir = Self::db_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_name() == ".lock" {
                continue;
            }
            if !entry.file_type()?.is_file() {
                continue;
            }
            let text = fs::read_to_string(entry.path())?;
            records.push(parse_record(&text)?);
        }
        Ok(records)
    }

    fn read_record(root: &Path, name: &Name) -> Result<Option<InstalledRecord>, LPSError> {
        let path = Self::record_path(root, name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(parse_record(&text)?))
    }

    fn write_installed(root: &Path, record: &InstalledRecord) -> Result<(), LPSError> {
        Self::ensure_db_dir(root)?;
        let path = Self::record_path(root, &record.name);
        fs::write(path, write_record(record))?;
        Ok(())
    }

    fn remove_installed(root: &Path, name: &Name) -> Result<(), LPSError> {
        let path = Self::record_path(root, name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn record_to_ref(record: &InstalledRecord) -> PackageRef {
        let mut package_ref = make_ref(Some(record.name.clone()), Some(record.version.clone()), None, None, None);
        package_ref.provides = record.provides.clone();
        package_ref.fill_flags.insert(FillFlags::PROVIDES);
        package_ref.fill_flags.insert(FillFlags::FILES);
        package_ref
    }
}

impl Default for FileLps {
    fn default() -> Self {
        Self::new()
    }
}

/// Abstract interface to the host package database (§4.3).
pub trait LocalPackageSystem {
    /// Queries installed packages matching `criterion`.
    fn query(&self, root: &Path, criterion: &Criterion) -> Result<Vec<PackageRef>, LPSError>;

    /// Returns true if a package named `name` is installed satisfying
    /// `sense` against `version` (when given).
    fn is_installed(&self, root: &Path, name: &Name, version: Option<&Version>, sense: Sense) -> Result<bool, LPSError>;

    /// Returns the names/features an installed package declares as its own
    /// requirements.
    ///
    /// This is the forward direction of [`Criterion::Requires`] (which finds
    /// requirers of a name, not requirements of a package): the uninstall
    /// traverser's downward pass (§4.6) needs it to walk from a root to its
    /// own dependencies before checking whether each one is still needed
    /// elsewhere.
    fn requires(&self, root: &Path, name: &Name) -> Result<Vec<Feature>, LPSError>;

    /// Installs or upgrades `refs` as a single atomic batch.
    fn install_batch(&self, root: &Path, refs: &[PackageRef], flags: InstallFlags) -> Result<Vec<PerPackageOutcome>, LPSError>;

    /// Uninstalls `refs` as a single atomic batch.
    fn uninstall_batch(&self, root: &Path, refs: &[PackageRef], flags: UninstallFlags) -> Result<Vec<PerPackageOutcome>, LPSError>;
}

impl LocalPackageSystem for FileLps {
    fn query(&self, root: &Path, criterion: &Criterion) -> Result<Vec<PackageRef>, LPSError> {
        let records = Self::read_all_records(root)?;
        let matches = records.iter().filter(|record| match criterion {
            Criterion::Matches(name) => &record.name == name,
            Criterion::Provides(feature) => record.provides.contains(feature),
            Criterion::Owns(path) => record.files.iter().any(|f| f == path),
            Criterion::Requires(name_or_feature) => record.requires.iter().any(|f| f.as_str() == name_or_feature.as_str()),
        });
        Ok(matches.map(Self::record_to_ref).collect())
    }

    fn is_installed(&self, root: &Path, name: &Name, version: Option<&Version>, sense: Sense) -> Result<bool, LPSError> {
        let Some(record) = Self::read_record(root, name)? else {
            return Ok(false);
        };
        let Some(required) = version else {
            return Ok(true);
        };
        Ok(pkgtx_types::version_satisfies(&record.version, sense, required))
    }

    fn requires(&self, root: &Path, name: &Name) -> Result<Vec<Feature>, LPSError> {
        let Some(record) = Self::read_record(root, name)? else {
            return Ok(Vec::new());
        };
        Ok(record.requires)
    }

    fn install_batch(&self, root: &Path, refs: &[PackageRef], flags: InstallFlags) -> Result<Vec<PerPackageOutcome>, LPSError> {
        let _lock = DatabaseLock::acquire(&Self::db_dir(root))
            .or_else(|_| {
                Self::ensure_db_dir(root)?;
                DatabaseLock::acquire(&Self::db_dir(root))
            })
            .map_err(|_| LPSError::Locked(root.display().to_string()))?;

        if !flags.contains(InstallFlags::FORCE) {
            for reference in refs {
                let Some(name) = &reference.name else { continue };
                if let Some(existing) = Self::read_record(root, name)? {
                    let Some(new_version) = &reference.version else { continue };
                    if !flags.contains(InstallFlags::UPGRADE)
                        && !flags.contains(InstallFlags::DOWNGRADE)
                        && &existing.version != new_version
                    {
                        return Err(LPSError::DependencyConflict(name.as_str().to_string()));
                    }
                }
            }
        }

        if flags.contains(InstallFlags::TEST) {
            return Ok(refs
                .iter()
                .map(|r| PerPackageOutcome::Installed(pkgtx_types::ref_readable_name(r)))
                .collect());
        }

        let mut outcomes = Vec::with_capacity(refs.len());
        for reference in refs {
            let Some(name) = reference.name.clone() else {
                outcomes.push(PerPackageOutcome::Failed("<unnamed>".to_string(), "package has no name".to_string()));
                continue;
            };
            let Some(version) = reference.version.clone() else {
                outcomes.push(PerPackageOutcome::Failed(name.as_str().to_string(), "package has no version".to_string()));
                continue;
            };
            let previous = Self::read_record(root, &name)?;
            let provides = if reference.provides.is_empty() {
                vec![Feature::from(name.clone())]
            } else {
                reference.provides.clone()
            };
            let files = provides.iter().filter(|f| f.is_path()).map(|f| f.as_str().to_string()).collect();
            let record = InstalledRecord {
                name: name.clone(),
                version: version.clone(),
                provides,
                // `reference.depends` only carries arena `NodeIndex` edges; resolving them
                // to names needs the `ResolvedTree` the caller resolved this batch from,
                // which isn't available here. Callers that need `requires` recorded
                // populate `reference.provides`/a dedicated pre-pass before calling in.
                requires: Vec::new(),
                files,
            };
            Self::write_installed(root, &record)?;
            match previous {
                Some(previous) if previous.version != version => {
                    outcomes.push(PerPackageOutcome::Upgraded(name.as_str().to_string(), previous.version));
                }
                Some(_) => outcomes.push(PerPackageOutcome::Installed(name.as_str().to_string())),
                None => outcomes.push(PerPackageOutcome::Installed(name.as_str().to_string())),
            }
        }
        Ok(outcomes)
    }

    fn uninstall_batch(&self, root: &Path, refs: &[PackageRef], flags: UninstallFlags) -> Result<Vec<PerPackageOutcome>, LPSError> {
        let _lock = DatabaseLock::acquire(&Self::db_dir(root))
            .or_else(|_| {
                Self::ensure_db_dir(root)?;
                DatabaseLock::acquire(&Self::db_dir(root))
            })
            .map_err(|_| LPSError::Locked(root.display().to_string()))?;

        if !flags.contains(UninstallFlags::FORCE) {
            for reference in refs {
                let Some(name) = &reference.name else { continue };
                if Self::read_record(root, name)?.is_none() {
                    return Err(LPSError::NotInstalled(name.as_str().to_string()));
                }
            }
        }

        if flags.contains(UninstallFlags::TEST) {
            return Ok(refs
                .iter()
                .map(|r| PerPackageOutcome::Removed(pkgtx_types::ref_readable_name(r)))
                .collect());
        }

        let mut outcomes = Vec::with_capacity(refs.len());
        for reference in refs {
            let Some(name) = &reference.name else {
                outcomes.push(PerPackageOutcome::Failed("<unnamed>".to_string(), "package has no name".to_string()));
                continue;
            };
            Self::remove_installed(root, name)?;
            outcomes.push(PerPackageOutcome::Removed(name.as_str().to_string()));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use pkgtx_types::make_ref;
    use testresult::TestResult;

    use super::*;

    fn installed(root: &Path, name: &str, version: &str) -> Result<(), LPSError> {
        installed_with_requires(root, name, version, Vec::new())
    }

    fn installed_with_requires(root: &Path, name: &str, version: &str, requires: Vec<&str>) -> Result<(), LPSError> {
        let record = InstalledRecord {
            name: Name::new(name).unwrap(),
            version: Version::new(version).unwrap(),
            provides: vec![Feature::new(name).unwrap()],
            requires: requires.into_iter().map(|r| Feature::new(r).unwrap()).collect(),
            files: Vec::new(),
        };
        FileLps::write_installed(root, &record)
    }

    #[test]
    fn requires_reads_back_recorded_dependencies() -> TestResult {
        let dir = tempfile::tempdir()?;
        installed_with_requires(dir.path(), "app", "1.0", vec!["libfoo"])?;
        let lps = FileLps::new();
        let requires = lps.requires(dir.path(), &Name::new("app")?)?;
        assert_eq!(requires, vec![Feature::new("libfoo")?]);
        Ok(())
    }

    #[test]
    fn requires_of_unknown_package_is_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let requires = lps.requires(dir.path(), &Name::new("nonexistent")?)?;
        assert!(requires.is_empty());
        Ok(())
    }

    #[test]
    fn query_matches_by_name() -> TestResult {
        let dir = tempfile::tempdir()?;
        installed(dir.path(), "libfoo", "1.0")?;
        let lps = FileLps::new();
        let found = lps.query(dir.path(), &Criterion::Matches(Name::new("libfoo")?))?;
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[test]
    fn is_installed_checks_version_sense() -> TestResult {
        let dir = tempfile::tempdir()?;
        installed(dir.path(), "libfoo", "2.0")?;
        let lps = FileLps::new();
        let name = Name::new("libfoo")?;
        assert!(lps.is_installed(dir.path(), &name, Some(&Version::new("1.0")?), Sense::Ge)?);
        assert!(!lps.is_installed(dir.path(), &name, Some(&Version::new("3.0")?), Sense::Ge)?);
        Ok(())
    }

    #[test]
    fn install_batch_is_atomic_on_dependency_conflict() -> TestResult {
        let dir = tempfile::tempdir()?;
        installed(dir.path(), "libfoo", "1.0")?;
        let lps = FileLps::new();
        let conflicting = make_ref(Some(Name::new("libfoo")?), Some(Version::new("2.0")?), None, None, None);
        let other = make_ref(Some(Name::new("newpkg")?), Some(Version::new("1.0")?), None, None, None);
        let result = lps.install_batch(dir.path(), &[conflicting, other.clone()], InstallFlags::empty());
        assert!(result.is_err());
        // the batch must not have partially applied: `newpkg` stays uninstalled.
        assert!(!lps.is_installed(dir.path(), &Name::new("newpkg")?, None, Sense::Any)?);
        Ok(())
    }

    #[test]
    fn install_then_uninstall_round_trips() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let pkg = make_ref(Some(Name::new("app")?), Some(Version::new("1.0")?), None, None, None);
        lps.install_batch(dir.path(), &[pkg.clone()], InstallFlags::empty())?;
        assert!(lps.is_installed(dir.path(), &Name::new("app")?, None, Sense::Any)?);
        lps.uninstall_batch(dir.path(), &[pkg], UninstallFlags::empty())?;
        assert!(!lps.is_installed(dir.path(), &Name::new("app")?, None, Sense::Any)?);
        Ok(())
    }
}
