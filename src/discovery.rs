//! Finding command directories contributed by matched dependencies
//!
//! Starting from a package, every declared dependency whose name is admitted by
//! the include/exclude patterns is resolved on disk. Its command directory is
//! collected if present, and the walk continues into that dependency's own
//! dependencies, resolved relative to its install location. Each package is
//! visited once, so dependency cycles terminate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config_file::{CliConfig, RuntimeContext};
use crate::manifest::{find_package_root, read_dependencies};
use crate::patterns::PatternSet;
use crate::resolver::resolve_install_dir;

struct Walker<'a> {
    config: &'a CliConfig,
    visited: HashSet<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl<'a> Walker<'a> {
    fn new(config: &'a CliConfig) -> Self {
        Walker {
            config,
            visited: HashSet::new(),
            dirs: Vec::new(),
        }
    }

    /// Marks `package` visited, returning false if it already was.
    fn visit(&mut self, package: &Path) -> bool {
        let key = package
            .canonicalize()
            .unwrap_or_else(|_| package.to_path_buf());
        self.visited.insert(key)
    }

    fn admitted_dependencies(&self, package: &Path) -> Vec<String> {
        read_dependencies(package)
            .names()
            .into_iter()
            .filter(|name| *name != self.config.self_package)
            .filter(|name| PatternSet::admits(name, &self.config.include, &self.config.exclude))
            .map(str::to_string)
            .collect()
    }

    fn walk(&mut self, package: &Path) {
        for name in self.admitted_dependencies(package) {
            let install_dir = match resolve_install_dir(&name, &[package]) {
                Ok(dir) => dir,
                Err(e) => {
                    debug!("Skipping dependency {name} of {}: {e}", package.display());
                    continue;
                }
            };
            if !self.visit(&install_dir) {
                debug!("Already scanned {name} at {}", install_dir.display());
                continue;
            }
            let cli_dir = install_dir.join(&self.config.cli_dir);
            if cli_dir.is_dir() {
                debug!("Found command directory {}", cli_dir.display());
                self.dirs.push(cli_dir);
            }
            self.walk(&install_dir);
        }
    }
}

/// Collect command directories for a package and, transitively, its matched dependencies.
///
/// With no `package_name` the package containing `entry_path` (or the context's
/// working directory) is scanned. When `entry_path` is given, that package's own
/// command directory is always part of the result, whatever the patterns say.
/// Discovery is disabled entirely while `include` is empty.
#[must_use]
pub fn discover_command_dirs(
    config: &CliConfig,
    context: &RuntimeContext,
    package_name: Option<&str>,
    entry_path: Option<&Path>,
) -> Vec<PathBuf> {
    if config.include.is_empty() {
        return Vec::new();
    }

    let start = entry_path.unwrap_or(&context.cwd);
    let package_root = find_package_root(start).unwrap_or_else(|| start.to_path_buf());
    let package_path = match package_name {
        Some(name) => match resolve_install_dir(name, &[&package_root]) {
            Ok(dir) => dir,
            Err(e) => {
                debug!("Nothing to discover for {name}: {e}");
                return Vec::new();
            }
        },
        None => package_root,
    };

    let mut walker = Walker::new(config);
    walker.visit(&package_path);
    if entry_path.is_some() {
        walker.dirs.push(package_path.join(&config.cli_dir));
    }
    walker.walk(&package_path);
    debug!(
        "Discovered {} command directories from {}",
        walker.dirs.len(),
        package_path.display()
    );
    walker.dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(dir: &Path, deps: &[&str], with_cli: bool) {
        std::fs::create_dir_all(dir).unwrap();
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|d| ((*d).to_string(), serde_json::Value::from("*")))
            .collect();
        let manifest = serde_json::json!({ "dependencies": deps });
        std::fs::write(dir.join("package.json"), manifest.to_string()).unwrap();
        if with_cli {
            std::fs::create_dir_all(dir.join("cli")).unwrap();
        }
    }

    fn context(root: &Path) -> RuntimeContext {
        RuntimeContext::new(root, vec!["app".into()])
    }

    #[test]
    fn test_no_include_disables_discovery() {
        let dir = tempfile::tempdir().unwrap();
        package(dir.path(), &["plugin-a"], true);
        package(&dir.path().join("node_modules/plugin-a"), &[], true);
        let config = CliConfig::default();
        let dirs = discover_command_dirs(&config, &context(dir.path()), None, Some(dir.path()));
        assert!(dirs.is_empty());
    }

    #[test]
    fn test_transitive_plugins_and_non_matching_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a", "utils-x"], false);
        package(&root.join("node_modules/plugin-a"), &["plugin-b"], true);
        package(&root.join("node_modules/plugin-b"), &[], true);
        package(&root.join("node_modules/utils-x"), &[], true);

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(
            dirs,
            vec![
                root.join("node_modules/plugin-a/cli"),
                root.join("node_modules/plugin-b/cli"),
            ]
        );
    }

    #[test]
    fn test_host_dir_always_included_with_entry() {
        let dir = tempfile::tempdir().unwrap();
        package(dir.path(), &[], false);
        let config = CliConfig::default()
            .with_include("^plugin-")
            .with_exclude(".*");
        let dirs = discover_command_dirs(&config, &context(dir.path()), None, Some(dir.path()));
        assert_eq!(dirs, vec![dir.path().join("cli")]);
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a", "plugin-legacy"], false);
        package(&root.join("node_modules/plugin-a"), &[], true);
        package(&root.join("node_modules/plugin-legacy"), &[], true);

        let config = CliConfig::default()
            .with_include("^plugin-")
            .with_exclude("legacy");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(dirs, vec![root.join("node_modules/plugin-a/cli")]);
    }

    #[test]
    fn test_unresolvable_sibling_does_not_stop_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-missing", "plugin-ok"], false);
        package(&root.join("node_modules/plugin-ok"), &[], true);

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(dirs, vec![root.join("node_modules/plugin-ok/cli")]);
    }

    #[test]
    fn test_missing_manifest_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(dir.path()), None, None);
        assert!(dirs.is_empty());
    }

    #[test]
    fn test_plugin_without_cli_dir_still_recursed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a"], false);
        package(&root.join("node_modules/plugin-a"), &["plugin-b"], false);
        package(
            &root.join("node_modules/plugin-a/node_modules/plugin-b"),
            &[],
            true,
        );

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(
            dirs,
            vec![root.join("node_modules/plugin-a/node_modules/plugin-b/cli")]
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a"], false);
        package(&root.join("node_modules/plugin-a"), &["plugin-b"], true);
        package(&root.join("node_modules/plugin-b"), &["plugin-a"], true);

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn test_shared_dependency_scanned_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a", "plugin-c"], false);
        package(&root.join("node_modules/plugin-a"), &["plugin-b"], true);
        package(&root.join("node_modules/plugin-c"), &["plugin-b"], true);
        package(&root.join("node_modules/plugin-b"), &[], true);

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(
            dirs,
            vec![
                root.join("node_modules/plugin-a/cli"),
                root.join("node_modules/plugin-b/cli"),
                root.join("node_modules/plugin-c/cli"),
            ]
        );
        let shared = root.join("node_modules/plugin-b/cli");
        assert_eq!(dirs.iter().filter(|d| **d == shared).count(), 1);
    }

    #[test]
    fn test_self_package_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["@voerka/cli", "@voerka/dev"], false);
        package(&root.join("node_modules/@voerka/cli"), &[], true);
        package(&root.join("node_modules/@voerka/dev"), &[], true);

        let config = CliConfig::default().with_include("^@voerka/");
        let dirs = discover_command_dirs(&config, &context(root), None, None);
        assert_eq!(dirs, vec![root.join("node_modules/@voerka/dev/cli")]);
    }

    #[test]
    fn test_named_package_entry() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        package(root, &["plugin-a"], false);
        package(&root.join("node_modules/plugin-a"), &["plugin-b"], true);
        package(&root.join("node_modules/plugin-b"), &[], true);

        let config = CliConfig::default().with_include("^plugin-");
        let dirs = discover_command_dirs(&config, &context(root), Some("plugin-a"), Some(root));
        assert_eq!(
            dirs,
            vec![
                root.join("node_modules/plugin-a/cli"),
                root.join("node_modules/plugin-b/cli"),
            ]
        );
        assert!(
            discover_command_dirs(&config, &context(root), Some("plugin-zzz"), Some(root))
                .is_empty()
        );
    }
}
