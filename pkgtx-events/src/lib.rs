#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

use pkgtx_types::{BreakRecord, Dependency, PackageRef, ResolvedTree};

/// A single typed signal emitted by RES, CA, UT or TX (§4.8).
///
/// Borrows its payload from the emitting call site rather than cloning it:
/// observers run synchronously, in the caller's thread, before the borrow
/// ends.
#[derive(Debug)]
pub enum Event<'a> {
    /// A dependency edge is about to be checked for satisfaction.
    DependencyCheck {
        /// The package that declares the dependency.
        parent: &'a PackageRef,
        /// The dependency being checked.
        needed: &'a Dependency,
    },
    /// Progress downloading a package file.
    DownloadProgress {
        /// The package being downloaded.
        name: &'a str,
        /// Bytes transferred so far.
        bytes: u64,
        /// Total bytes expected.
        total: u64,
    },
    /// A download failed (after the single retry TX allows).
    DownloadFailed {
        /// The package whose download failed.
        name: &'a str,
        /// A human-readable reason.
        reason: &'a str,
    },
    /// Emitted exactly once per run, after resolution succeeds and before
    /// any LPS mutation. The only point at which cancellation is offered.
    PreflightCheck {
        /// Total bytes to be downloaded across the whole transaction.
        total_bytes: u64,
        /// Total number of packages in the transaction.
        total_packages: usize,
    },
    /// Per-package install/uninstall progress.
    InstallProgress {
        /// The package this progress update is about.
        reference: &'a PackageRef,
        /// This package's position in the batch (0-based).
        index: usize,
        /// Total number of packages in the batch.
        count: usize,
        /// Bytes applied for this package so far.
        pkg_done: u64,
        /// Total bytes for this package.
        pkg_total: u64,
        /// Bytes applied across the whole batch so far.
        total_done: u64,
        /// Total bytes across the whole batch.
        total_total: u64,
    },
    /// A toplevel root failed; carries the resolved tree so the observer can
    /// render the failing subtree.
    InstallFailed {
        /// The failing toplevel root.
        toplevel: &'a PackageRef,
        /// The tree `toplevel` belongs to, for subtree rendering.
        tree: &'a ResolvedTree,
    },
    /// An uninstall root failed with one or more break records attached.
    UninstallFailed {
        /// The package whose removal was refused.
        reference: &'a PackageRef,
        /// The recorded breaks that caused the refusal.
        breaks: &'a [BreakRecord],
    },
    /// Emitted after a run completes (successfully or not) to ask whether
    /// downloaded package files should be unlinked.
    DeleteFiles,
    /// Emitted exactly once, at the very end of a run.
    Done,
    /// A dependency was treated as satisfied only because of the
    /// softcat-bug compatibility workaround (§4.4 Pass C, SPEC_FULL.md
    /// Supplemented Features): a package of the required name is installed
    /// in some version, but nothing actually provides or owns the feature
    /// that was asked for. Additive diagnostic signal, not part of the
    /// original signal table.
    CompatibilityWorkaroundApplied {
        /// The dependency that was satisfied via the workaround.
        child: &'a PackageRef,
        /// The feature name that nothing provided or owned.
        feature: &'a str,
    },
}

/// Receives [`Event`]s from an [`EventBus`].
///
/// The default `notify` does nothing; implement it to log, forward to a UI,
/// or collect events for later inspection. `confirm_preflight` and
/// `confirm_delete_files` give an observer a voice at the two points in the
/// run where its answer affects behavior (§5 "Cancellation").
pub trait Observer {
    /// Called for every event as it is emitted.
    fn notify(&mut self, event: &Event<'_>);

    /// Called once, for the `PreflightCheck` event. Returning `false` cancels
    /// the run before any LPS mutation happens. Defaults to proceeding.
    fn confirm_preflight(&mut self, total_bytes: u64, total_packages: usize) -> bool {
        let _ = (total_bytes, total_packages);
        true
    }

    /// Called once, for the `DeleteFiles` event. Returning `true` means
    /// downloaded package files should be unlinked. Defaults to keeping
    /// them.
    fn confirm_delete_files(&mut self) -> bool {
        false
    }
}

/// An [`Observer`] that logs every event through the `log` facade at an
/// appropriate level.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn notify(&mut self, event: &Event<'_>) {
        match event {
            Event::DependencyCheck { parent, needed } => {
                log::debug!(
                    "checking dependency of {}: sense={:?} version={:?}",
                    pkgtx_types::ref_readable_name(parent),
                    needed.sense,
                    needed.version
                );
            }
            Event::DownloadProgress { name, bytes, total } => {
                log::debug!("downloading {name}: {bytes}/{total} bytes");
            }
            Event::DownloadFailed { name, reason } => {
                log::warn!("download failed for {name}: {reason}");
            }
            Event::PreflightCheck {
                total_bytes,
                total_packages,
            } => {
                log::info!("preflight: {total_packages} package(s), {total_bytes} bytes total");
            }
            Event::InstallProgress { reference, index, count, .. } => {
                log::info!(
                    "[{}/{count}] {}",
                    index + 1,
                    pkgtx_types::ref_readable_name(reference)
                );
            }
            Event::InstallFailed { toplevel, .. } => {
                log::error!("install failed: {}", pkgtx_types::ref_readable_name(toplevel));
            }
            Event::UninstallFailed { reference, breaks } => {
                log::error!(
                    "uninstall refused for {}: {} break(s)",
                    pkgtx_types::ref_readable_name(reference),
                    breaks.len()
                );
            }
            Event::DeleteFiles => {
                log::debug!("asking whether to delete downloaded files");
            }
            Event::Done => {
                log::info!("run complete");
            }
            Event::CompatibilityWorkaroundApplied { child, feature } => {
                log::warn!(
                    "treated {} as satisfied via softcat-bug workaround for feature '{feature}'",
                    pkgtx_types::ref_readable_name(child)
                );
            }
        }
    }
}

/// A typed, synchronous emitter (§4.8).
///
/// Holds zero or more observers and fans every emitted event out to each of
/// them in registration order. Does not buffer or reorder: `emit` calls each
/// observer's `notify` before returning.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn Observer>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("observers", &self.observers.len()).finish()
    }
}

impl EventBus {
    /// Creates a bus with no observers.
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    /// Registers an observer.
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Emits `event` to every registered observer, in order.
    pub fn emit(&mut self, event: Event<'_>) {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }

    /// Emits `PreflightCheck` and returns whether the run should proceed.
    ///
    /// The run proceeds only if every observer agrees to proceed; any single
    /// cancellation cancels the whole run (§5: cancellation is only offered
    /// here, and once granted is irrevocable for the rest of the run).
    pub fn preflight_check(&mut self, total_bytes: u64, total_packages: usize) -> bool {
        self.emit(Event::PreflightCheck {
            total_bytes,
            total_packages,
        });
        self.observers
            .iter_mut()
            .all(|observer| observer.confirm_preflight(total_bytes, total_packages))
    }

    /// Emits `DeleteFiles` and returns whether downloaded files should be
    /// unlinked.
    ///
    /// Deletion happens only if every observer agrees (a single observer
    /// that wants to keep the files is enough to keep them).
    pub fn confirm_delete_files(&mut self) -> bool {
        self.emit(Event::DeleteFiles);
        self.observers.iter_mut().all(|observer| observer.confirm_delete_files())
    }
}
