use std::path::PathBuf;

use pkgtx_local::{InstallFlags, UninstallFlags};

/// The engine's single configuration surface (§6.3).
///
/// The engine itself never consults environment variables; any
/// environment-derived defaults (e.g. expanding `~` in `transaction_dir`)
/// are the caller's responsibility, typically the CLI layer.
#[derive(Clone, Debug)]
pub struct Config {
    /// Run the resolver and conflict analyzer, emit all events, but skip
    /// LPS mutation.
    pub test: bool,
    /// Pass Force to the LPS: override file-conflict and version checks.
    pub force: bool,
    /// Pass Upgrade to the LPS: allow replacing older installed versions.
    pub update: bool,
    /// Pass Downgrade to the LPS: allow replacing newer installed versions.
    pub downgrade: bool,
    /// Raise event-bus detail (consulted by the `LoggingObserver`'s caller,
    /// not by the engine itself).
    pub verbose: bool,
    /// Filesystem root for LPS operations.
    pub root: PathBuf,
    /// Directory for downloaded package files.
    pub tmp_dir: PathBuf,
    /// Directory for transaction journals (§6.2 default: a `transactions`
    /// directory under the user's home). `Config::default` cannot compute
    /// that path itself without consulting the environment, so it falls
    /// back to a relative placeholder; the CLI layer resolves and supplies
    /// the real default.
    pub transaction_dir: PathBuf,
    /// Skip the §4.5 conflict-analyzer checks entirely.
    pub ignore_file_conflicts: bool,
}

impl Config {
    /// Builds the `install_batch` flags this configuration implies.
    pub fn install_flags(&self) -> InstallFlags {
        let mut flags = InstallFlags::empty();
        if self.test {
            flags.insert(InstallFlags::TEST);
        }
        if self.force {
            flags.insert(InstallFlags::FORCE);
        }
        if self.update {
            flags.insert(InstallFlags::UPGRADE);
        }
        if self.downgrade {
            flags.insert(InstallFlags::DOWNGRADE);
        }
        flags
    }

    /// Builds the `uninstall_batch` flags this configuration implies.
    pub fn uninstall_flags(&self) -> UninstallFlags {
        let mut flags = UninstallFlags::empty();
        if self.test {
            flags.insert(UninstallFlags::TEST);
        }
        if self.force {
            flags.insert(UninstallFlags::FORCE);
        }
        flags
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test: false,
            force: false,
            update: false,
            downgrade: false,
            verbose: false,
            root: PathBuf::from("/"),
            tmp_dir: PathBuf::from("/tmp/pkgtx"),
            transaction_dir: PathBuf::from(".pkgtx/transactions"),
            ignore_file_conflicts: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_flags_reflect_configured_options() {
        let config = Config {
            force: true,
            update: true,
            ..Config::default()
        };
        let flags = config.install_flags();
        assert!(flags.contains(InstallFlags::FORCE));
        assert!(flags.contains(InstallFlags::UPGRADE));
        assert!(!flags.contains(InstallFlags::DOWNGRADE));
    }

    #[test]
    fn uninstall_flags_reflect_test_mode() {
        let config = Config {
            test: true,
            ..Config::default()
        };
        assert!(config.uninstall_flags().contains(UninstallFlags::TEST));
    }
}
