use std::fs;
use std::path::Path;

use pkgtx_types::{Feature, Name, PackageId, Sense, Version};

use crate::error::CatalogError;
use crate::xml::{parse_single_package, CatalogPackage};

/// A single dependency as reported by the catalog (or a local file):
/// untethered from any resolver arena, since it is produced before the
/// resolver has decided where the required package will live in its tree.
#[derive(Clone, Debug)]
pub struct CatalogDependency {
    /// The required package or feature's name.
    pub name: Name,
    /// How `version` constrains it.
    pub sense: Sense,
    /// The required version, if any.
    pub version: Option<Version>,
    /// True for `soft_depend` (optional) dependencies.
    pub optional: bool,
}

/// A fully filled package descriptor, as returned by
/// [`CatalogClient::get_info`] (§4.2).
#[derive(Clone, Debug)]
pub struct FilledRef {
    /// The catalog-assigned identity.
    pub id: PackageId,
    /// The package's name.
    pub name: Name,
    /// The package's version.
    pub version: Version,
    /// Minor/patch qualifier.
    pub minor: Option<String>,
    /// Target architecture.
    pub architecture: Option<String>,
    /// Target distribution.
    pub distribution: Option<String>,
    /// Features (including owned file paths) this package provides.
    pub provides: Vec<Feature>,
    /// This package's dependencies.
    pub depends: Vec<CatalogDependency>,
    /// Paths this package owns.
    pub files: Vec<String>,
}

/// Abstract interface to the remote software catalog (§4.2).
///
/// Implementations perform the actual network I/O; this crate only defines
/// the contract plus the wire format both a real implementation and tests
/// can share.
pub trait CatalogClient {
    /// Given a `name` (and optionally other identifying fields not modeled
    /// here, e.g. architecture), returns the package filled with version,
    /// identity, dependency list, provided features, and file list.
    ///
    /// Idempotent: calling this twice with a request that resolves to the
    /// same [`PackageId`] returns an equal [`FilledRef`]. The resolver (not
    /// this trait) is responsible for memoizing by [`PackageId`] so that an
    /// implementation is called at most once per identity per run (§3
    /// invariant 5, §5 ordering guarantee (i)).
    fn get_info(&self, name: &Name, architecture: Option<&str>) -> Result<FilledRef, CatalogError>;
}

fn sense_from_attr(value: Option<&str>) -> Sense {
    match value {
        Some(">=") | None => Sense::Ge,
        Some("<=") => Sense::Le,
        Some("=") => Sense::Eq,
        Some("<") => Sense::Lt,
        Some(">") => Sense::Gt,
        Some("*") => Sense::Any,
        Some(_) => Sense::Ge,
    }
}

fn depend_from_catalog_package(raw: &CatalogPackage, optional: bool) -> Result<CatalogDependency, CatalogError> {
    let name = Name::new(raw.name.clone()).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    let version = if raw.version.is_empty() {
        None
    } else {
        Some(Version::new(raw.version.clone()).map_err(|e| CatalogError::BadResponse(e.to_string()))?)
    };
    let sense = if version.is_some() {
        sense_from_attr(raw.sense.as_deref())
    } else {
        Sense::Any
    };
    Ok(CatalogDependency {
        name,
        sense,
        version,
        optional,
    })
}

/// Converts a raw [`CatalogPackage`] (as parsed from the wire format) into a
/// [`FilledRef`], deriving its [`PackageId`] from `name-version-arch`.
///
/// This is the one place a `PackageId` gets minted from descriptor content;
/// the catalog is expected to mint a genuinely unique id per release in a
/// real deployment, but for the parts of this crate that must construct one
/// locally (e.g. from a local package file's own header, per §4.4 "Local
/// file inputs"), `name-version-arch` is a reasonable unique-enough handle.
pub fn filled_ref_from_catalog_package(raw: &CatalogPackage) -> Result<FilledRef, CatalogError> {
    let name = Name::new(raw.name.clone()).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    let version = Version::new(raw.version.clone()).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    let id = PackageId::new(format!(
        "{}-{}-{}",
        raw.name,
        raw.version,
        raw.arch.as_deref().unwrap_or("any")
    ));

    let mut depends = Vec::with_capacity(raw.hard_depend.len() + raw.soft_depend.len());
    for dep in &raw.hard_depend {
        depends.push(depend_from_catalog_package(dep, false)?);
    }
    for dep in &raw.soft_depend {
        depends.push(depend_from_catalog_package(dep, true)?);
    }

    let mut provides = vec![Feature::from(name.clone())];
    provides.extend(
        raw.modifies
            .iter()
            .map(|m| Feature::new(m.name.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::BadResponse(e.to_string()))?,
    );

    Ok(FilledRef {
        id,
        name,
        version,
        minor: raw.minor.clone(),
        architecture: raw.arch.clone(),
        distribution: None,
        provides,
        depends,
        files: Vec::new(),
    })
}

/// Reads a local package descriptor sidecar file and returns the
/// [`FilledRef`] it describes, skipping the catalog entirely (§4.4 "Local
/// file inputs": "its dependencies and provides come from the file, not
/// from CAT; its PackageId is derived from the file's header").
pub fn read_local_package_file(path: &Path) -> Result<FilledRef, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|e| CatalogError::LocalFileUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let raw = parse_single_package(&contents)?;
    filled_ref_from_catalog_package(&raw)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::xml::CatalogPackage;

    #[test]
    fn filled_ref_derives_stable_id() -> TestResult {
        let raw = CatalogPackage {
            name: "libfoo".to_string(),
            version: "1.0".to_string(),
            arch: Some("i386".to_string()),
            ..Default::default()
        };
        let filled = filled_ref_from_catalog_package(&raw)?;
        assert_eq!(filled.id.as_str(), "libfoo-1.0-i386");
        assert_eq!(filled.name.as_str(), "libfoo");
        Ok(())
    }

    #[test]
    fn hard_depend_defaults_to_ge_sense() -> TestResult {
        let mut raw = CatalogPackage {
            name: "app".to_string(),
            version: "2.0".to_string(),
            ..Default::default()
        };
        raw.hard_depend.push(CatalogPackage {
            name: "libfoo".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        });
        let filled = filled_ref_from_catalog_package(&raw)?;
        assert_eq!(filled.depends.len(), 1);
        assert_eq!(filled.depends[0].sense, Sense::Ge);
        assert!(!filled.depends[0].optional);
        Ok(())
    }

    #[test]
    fn local_file_round_trips_through_real_filesystem() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local.xml");
        std::fs::write(&path, r#"<Package name="localpkg" version="9.9"/>"#)?;
        let filled = read_local_package_file(&path)?;
        assert_eq!(filled.name.as_str(), "localpkg");
        Ok(())
    }
}
