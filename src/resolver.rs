//! Locating installed packages the way Node's module resolution does

use std::path::{Path, PathBuf};

use thiserror::Error;

pub const MODULES_DIR: &str = "node_modules";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Package '{package}' is not installed (searched {} locations)", searched.len())]
    NotFound {
        package: String,
        searched: Vec<PathBuf>,
    },
    #[error("Invalid package name '{0}'")]
    InvalidName(String),
}

fn validate_name(name: &str) -> Result<(), ResolveError> {
    let path = Path::new(name);
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
    if bad {
        return Err(ResolveError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// `node_modules` directories searched from `root`, nearest first.
fn lookup_dirs(root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    root.ancestors()
        .filter(|dir| dir.file_name().is_none_or(|n| n != MODULES_DIR))
        .map(|dir| dir.join(MODULES_DIR))
}

/// Find the install directory of `package_name`, trying each search root in order.
///
/// # Errors
///
/// Returns `ResolveError::InvalidName` for empty, relative or absolute names and
/// `ResolveError::NotFound` if no `node_modules` above any root contains the package.
pub fn resolve_install_dir(
    package_name: &str,
    search_roots: &[&Path],
) -> Result<PathBuf, ResolveError> {
    validate_name(package_name)?;
    let mut searched = Vec::new();
    for root in search_roots {
        for modules in lookup_dirs(root) {
            let candidate = modules.join(package_name);
            if candidate.is_dir() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }
    Err(ResolveError::NotFound {
        package: package_name.to_string(),
        searched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdir(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
    }

    #[test]
    fn test_resolves_in_root_modules() {
        let dir = tempfile::tempdir().unwrap();
        mkdir(&dir.path().join("node_modules/plugin-a"));
        let resolved = resolve_install_dir("plugin-a", &[dir.path()]).unwrap();
        assert_eq!(resolved, dir.path().join("node_modules/plugin-a"));
    }

    #[test]
    fn test_nested_install_wins_over_hoisted() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("node_modules/plugin-a");
        mkdir(&parent.join("node_modules/plugin-b"));
        mkdir(&dir.path().join("node_modules/plugin-b"));
        let resolved = resolve_install_dir("plugin-b", &[&parent]).unwrap();
        assert_eq!(resolved, parent.join("node_modules/plugin-b"));
    }

    #[test]
    fn test_walks_up_to_hoisted_install() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("node_modules/plugin-a");
        mkdir(&parent);
        mkdir(&dir.path().join("node_modules/plugin-b"));
        let resolved = resolve_install_dir("plugin-b", &[&parent]).unwrap();
        assert_eq!(resolved, dir.path().join("node_modules/plugin-b"));
    }

    #[test]
    fn test_never_searches_modules_of_modules() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("node_modules/plugin-a");
        mkdir(&parent);
        let dirs: Vec<PathBuf> = lookup_dirs(&parent).collect();
        assert!(dirs.contains(&dir.path().join("node_modules")));
        assert!(!dirs.iter().any(|d| d.ends_with("node_modules/node_modules")));
    }

    #[test]
    fn test_scoped_package() {
        let dir = tempfile::tempdir().unwrap();
        mkdir(&dir.path().join("node_modules/@voerka/dev"));
        let resolved = resolve_install_dir("@voerka/dev", &[dir.path()]).unwrap();
        assert!(resolved.ends_with("node_modules/@voerka/dev"));
    }

    #[test]
    fn test_second_root_is_tried() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        mkdir(&second.path().join("node_modules/plugin-a"));
        let resolved = resolve_install_dir("plugin-a", &[first.path(), second.path()]).unwrap();
        assert!(resolved.starts_with(second.path()));
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match resolve_install_dir("missing-pkg-xyz", &[dir.path()]) {
            Err(ResolveError::NotFound { package, searched }) => {
                assert_eq!(package, "missing-pkg-xyz");
                assert!(!searched.is_empty());
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["", "./local", "../up", "/abs", "a/../b"] {
            assert!(
                matches!(
                    resolve_install_dir(name, &[dir.path()]),
                    Err(ResolveError::InvalidName(_))
                ),
                "{name} should be rejected"
            );
        }
    }
}
