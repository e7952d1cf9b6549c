//! Reading declared dependencies from `package.json` manifests

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("No {MANIFEST_FILE} found at or above {0}")]
    NotFound(PathBuf),
    #[error("Unable to read manifest {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("Unable to parse manifest {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// `bundleDependencies` may be a name list or a name-to-version map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BundledNames {
    List(Vec<String>),
    Map(Map<String, Value>),
    Flag(bool),
}

impl Default for BundledNames {
    fn default() -> Self {
        BundledNames::List(Vec::new())
    }
}

impl BundledNames {
    fn names(&self) -> Vec<String> {
        match self {
            BundledNames::List(names) => names.clone(),
            BundledNames::Map(map) => map.keys().cloned().collect(),
            BundledNames::Flag(_) => Vec::new(),
        }
    }
}

/// The subset of `package.json` that discovery cares about.
///
/// Dependency maps keep the order they are written in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: Option<String>,
    pub dependencies: Map<String, Value>,
    pub dev_dependencies: Map<String, Value>,
    pub peer_dependencies: Map<String, Value>,
    pub optional_dependencies: Map<String, Value>,
    #[serde(alias = "bundledDependencies")]
    bundle_dependencies: BundledNames,
}

impl PackageManifest {
    /// # Errors
    ///
    /// Returns `ManifestError::Io` if the file cannot be read, or
    /// `ManifestError::Json` if it is not a valid manifest.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            source: e,
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&contents).map_err(|e| ManifestError::Json {
            source: e,
            path: path.to_path_buf(),
        })
    }

    /// Read the manifest of the package containing `path`.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::NotFound` if no ancestor holds a manifest, or
    /// the read/parse error of the manifest found.
    pub fn nearest(path: &Path) -> Result<Self, ManifestError> {
        let root =
            find_package_root(path).ok_or_else(|| ManifestError::NotFound(path.to_path_buf()))?;
        Self::from_file(&root.join(MANIFEST_FILE))
    }

    #[must_use]
    pub fn dependency_groups(&self) -> DependencyGroups {
        DependencyGroups {
            dependencies: self.dependencies.keys().cloned().collect(),
            dev_dependencies: self.dev_dependencies.keys().cloned().collect(),
            peer_dependencies: self.peer_dependencies.keys().cloned().collect(),
            optional_dependencies: self.optional_dependencies.keys().cloned().collect(),
            bundle_dependencies: self.bundle_dependencies.names(),
        }
    }
}

/// Dependency names of one package, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGroups {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    pub peer_dependencies: Vec<String>,
    pub optional_dependencies: Vec<String>,
    pub bundle_dependencies: Vec<String>,
}

impl DependencyGroups {
    /// All names, category by category. A name listed in two categories appears twice.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .chain(&self.dev_dependencies)
            .chain(&self.peer_dependencies)
            .chain(&self.optional_dependencies)
            .chain(&self.bundle_dependencies)
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

/// Nearest directory at or above `path` that holds a manifest.
#[must_use]
pub fn find_package_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Dependencies of the package containing `path`.
///
/// A missing or malformed manifest yields empty groups.
#[must_use]
pub fn read_dependencies(path: &Path) -> DependencyGroups {
    match PackageManifest::nearest(path) {
        Ok(manifest) => manifest.dependency_groups(),
        Err(e) => {
            debug!("Treating {} as having no dependencies: {e}", path.display());
            DependencyGroups::default()
        }
    }
}
