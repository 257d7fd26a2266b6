//! A filesystem-backed [`CatalogClient`] and [`Fetcher`], for driving the
//! engine against a directory of local package descriptors instead of a
//! real network catalog (§4.4 "Local file inputs").
//!
//! Not a network client: out of scope per §4.7 point 1 ("this uses the
//! external fetcher; TX only calls a `fetch(ref) -> path_or_error` hook").
//! Useful as the `pkgtx` CLI's default collaborator, and as a stand-in
//! anywhere a caller wants to drive the engine without standing up a real
//! catalog server.

use std::fs;
use std::path::PathBuf;

use pkgtx_catalog::{filled_ref_from_catalog_package, parse_single_package, CatalogClient, CatalogError, FilledRef};
use pkgtx_transaction::{FetchError, Fetcher};
use pkgtx_types::{Name, PackageRef};

/// A [`CatalogClient`] backed by one `<name>.xml` descriptor file per
/// package under a directory.
#[derive(Clone, Debug)]
pub struct LocalCatalog {
    dir: PathBuf,
}

impl LocalCatalog {
    /// Creates a catalog rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CatalogClient for LocalCatalog {
    fn get_info(&self, name: &Name, _architecture: Option<&str>) -> Result<FilledRef, CatalogError> {
        let path = self.dir.join(format!("{name}.xml"));
        let contents = fs::read_to_string(&path).map_err(|_| CatalogError::NotFound(name.as_str().to_string()))?;
        let raw = parse_single_package(&contents)?;
        filled_ref_from_catalog_package(&raw)
    }
}

/// A [`Fetcher`] backed by a local cache directory: a package whose file is
/// already present under `cache_dir/<name>-<version>` is served directly; a
/// package not already cached is reported as a permanent failure, since
/// this stand-in has no network of its own to download from.
#[derive(Clone, Debug)]
pub struct LocalFetcher {
    cache_dir: PathBuf,
}

impl LocalFetcher {
    /// Creates a fetcher backed by `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into() }
    }
}

impl Fetcher for LocalFetcher {
    fn fetch(&self, reference: &PackageRef) -> Result<PathBuf, FetchError> {
        let name = reference.name.as_ref().ok_or_else(|| FetchError::permanent("package has no name"))?;
        let version = reference
            .version
            .as_ref()
            .ok_or_else(|| FetchError::permanent("package has no version"))?;
        let path = self.cache_dir.join(format!("{name}-{version}"));
        if path.exists() {
            Ok(path)
        } else {
            Err(FetchError::permanent(format!("no cached file for {name}-{version} in {}", self.cache_dir.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn local_catalog_reads_a_descriptor_by_name() -> TestResult {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("libfoo.xml"), r#"<Package name="libfoo" version="1.0"/>"#)?;
        let catalog = LocalCatalog::new(dir.path());
        let filled = catalog.get_info(&Name::new("libfoo")?, None)?;
        assert_eq!(filled.name.as_str(), "libfoo");
        Ok(())
    }

    #[test]
    fn local_catalog_reports_not_found_for_missing_descriptor() -> TestResult {
        let dir = tempfile::tempdir()?;
        let catalog = LocalCatalog::new(dir.path());
        let result = catalog.get_info(&Name::new("missing")?, None);
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn local_fetcher_serves_a_cached_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("libfoo-1.0"), b"package bytes")?;
        let fetcher = LocalFetcher::new(dir.path());
        let reference = pkgtx_types::make_ref(Some(Name::new("libfoo")?), Some(pkgtx_types::Version::new("1.0")?), None, None, None);
        let path = fetcher.fetch(&reference)?;
        assert_eq!(path, dir.path().join("libfoo-1.0"));
        Ok(())
    }

    #[test]
    fn local_fetcher_fails_permanently_for_an_uncached_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let fetcher = LocalFetcher::new(dir.path());
        let reference = pkgtx_types::make_ref(Some(Name::new("libfoo")?), Some(pkgtx_types::Version::new("1.0")?), None, None, None);
        let result = fetcher.fetch(&reference);
        assert!(result.is_err_and(|e| !e.transient));
        Ok(())
    }
}
