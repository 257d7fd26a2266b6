use std::path::PathBuf;

use pkgtx_types::PackageRef;

/// The reason a [`Fetcher`] call failed, and whether retrying is worthwhile
/// (§4.7 point 1: "retried once on transient errors").
#[derive(Clone, Debug)]
pub struct FetchError {
    /// Human-readable description, surfaced via `download_failed`.
    pub reason: String,
    /// Whether a second attempt might succeed (e.g. a timeout, as opposed to
    /// a 404 or a disk-full error).
    pub transient: bool,
}

impl FetchError {
    /// Builds a transient (retryable) fetch error.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            transient: true,
        }
    }

    /// Builds a permanent (non-retryable) fetch error.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            transient: false,
        }
    }
}

/// Downloads a package's file to local disk. The out-of-scope "external
/// fetcher" hook of §4.7: TX only ever calls `fetch`, once per non-local
/// node, with one retry on a transient failure.
pub trait Fetcher {
    /// Fetches `reference` and returns the local path it was written to.
    fn fetch(&self, reference: &PackageRef) -> Result<PathBuf, FetchError>;
}

/// Calls `fetcher.fetch(reference)`, retrying exactly once if the first
/// attempt fails with a transient error.
pub(crate) fn fetch_with_retry(fetcher: &dyn Fetcher, reference: &PackageRef) -> Result<PathBuf, FetchError> {
    match fetcher.fetch(reference) {
        Ok(path) => Ok(path),
        Err(first) if first.transient => fetcher.fetch(reference),
        Err(first) => Err(first),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pkgtx_types::make_ref;

    use super::*;

    struct FlakyOnce {
        calls: Cell<u32>,
    }

    impl Fetcher for FlakyOnce {
        fn fetch(&self, _reference: &PackageRef) -> Result<PathBuf, FetchError> {
            let calls = self.calls.get() + 1;
            self.calls.set(calls);
            if calls == 1 {
                Err(FetchError::transient("timed out"))
            } else {
                Ok(PathBuf::from("/tmp/pkg"))
            }
        }
    }

    struct AlwaysPermanent;

    impl Fetcher for AlwaysPermanent {
        fn fetch(&self, _reference: &PackageRef) -> Result<PathBuf, FetchError> {
            Err(FetchError::permanent("404"))
        }
    }

    #[test]
    fn transient_failure_is_retried_once() {
        let fetcher = FlakyOnce { calls: Cell::new(0) };
        let reference = make_ref(None, None, None, None, None);
        let result = fetch_with_retry(&fetcher, &reference);
        assert!(result.is_ok());
        assert_eq!(fetcher.calls.get(), 2);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let fetcher = AlwaysPermanent;
        let reference = make_ref(None, None, None, None, None);
        let result = fetch_with_retry(&fetcher, &reference);
        assert!(result.is_err());
    }
}
