//! Command-line argument handling for the `pkgtx` binary.

use std::path::PathBuf;

use clap::Parser;

/// The command-line interface for `pkgtx`.
#[derive(Debug, Parser)]
#[clap(about = "Resolve, install, uninstall and revert packages against a catalog.", author, name = "pkgtx", version)]
pub struct Cli {
    /// Log verbosity level.
    #[command(flatten)]
    pub verbose: clap_verbosity::Verbosity,

    /// Filesystem root for LPS operations.
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,

    /// Directory holding local package descriptor files, used by the
    /// engine's default filesystem-backed catalog client.
    #[arg(long, global = true, default_value = "/var/lib/pkgtx/catalog")]
    pub catalog_dir: PathBuf,

    /// Directory holding cached package files, used by the engine's
    /// default filesystem-backed fetcher.
    #[arg(long, global = true, default_value = "/var/lib/pkgtx/cache")]
    pub tmp_dir: PathBuf,

    /// Directory for transaction journals. Defaults to `transactions`
    /// under the invoking user's home directory (§6.2); pass this flag to
    /// override it.
    #[arg(long, global = true)]
    pub transaction_dir: Option<PathBuf>,

    /// The `pkgtx` commands.
    #[clap(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolves the transaction directory: the `--transaction-dir`
    /// override if one was given, otherwise `~/.pkgtx/transactions`. Engine
    /// `Config` never consults the environment itself (see its doc
    /// comment), so this resolution lives here instead.
    pub fn transaction_dir(&self) -> PathBuf {
        self.transaction_dir.clone().unwrap_or_else(default_transaction_dir)
    }
}

/// `~/.pkgtx/transactions`, falling back to a relative path if the home
/// directory cannot be determined (e.g. no `HOME` set).
fn default_transaction_dir() -> PathBuf {
    dirs::home_dir().map(|home| home.join(".pkgtx").join("transactions")).unwrap_or_else(|| PathBuf::from(".pkgtx/transactions"))
}

/// The `pkgtx` subcommands.
#[derive(Debug, Parser)]
pub enum Command {
    /// Resolve and install one or more packages by name.
    Install {
        /// Package names to install.
        names: Vec<String>,

        /// Dry run: resolve and check, but do not mutate the LPS.
        #[arg(long)]
        test: bool,

        /// Bypass pre-flight dependency and file-conflict checks.
        #[arg(long)]
        force: bool,

        /// Allow replacing an installed package with a newer version.
        #[arg(long)]
        update: bool,

        /// Allow replacing an installed package with an older version.
        #[arg(long)]
        downgrade: bool,

        /// Skip the conflict analyzer's checks entirely.
        #[arg(long)]
        ignore_file_conflicts: bool,
    },

    /// Resolve and remove one or more installed packages by name.
    Uninstall {
        /// Package names to remove.
        names: Vec<String>,

        /// Dry run: resolve removal, but do not mutate the LPS.
        #[arg(long)]
        test: bool,

        /// Bypass the pre-flight "is it actually installed" check.
        #[arg(long)]
        force: bool,
    },

    /// Undo a previously written transaction journal.
    Revert {
        /// Path to the transaction journal to revert.
        journal: PathBuf,
    },
}
