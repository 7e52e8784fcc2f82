// Project detection: classify a workspace root from its entry names.

use std::collections::BTreeSet;

use crate::types::ProjectType;

/// Manifest that is parsed to tell CommonJS and ES-module node projects apart.
pub const NODE_MANIFEST: &str = "package.json";

/// Root-level names that identify a project root. Matched case-insensitively.
pub const PROJECT_MARKERS: &[&str] = &[
    "package.json",
    "cargo.toml",
    "go.mod",
    "requirements.txt",
    "pyproject.toml",
    "composer.json",
    "build.gradle",
    "pom.xml",
    ".git",
    ".svn",
    ".hg",
    ".project",
    ".idea",
    ".vscode",
];

const VCS_MARKERS: &[&str] = &[".git", ".svn", ".hg"];

/// Result of classifying one root listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub project_type: ProjectType,
    /// Marker names exactly as they appear in the listing.
    pub project_files: BTreeSet<String>,
    pub has_git: bool,
    pub has_vcs: bool,
}

/// Name of the manifest entry as it appears in the listing, if present.
pub fn manifest_entry<S: AsRef<str>>(entry_names: &[S]) -> Option<&str> {
    find_marker(entry_names, NODE_MANIFEST)
}

/// Classify a root listing.
///
/// Priority: `package.json`, `Cargo.toml`, `go.mod`, then `requirements.txt` /
/// `pyproject.toml`. `package_manifest` is the raw `package.json` text when the
/// caller was able to read it; `"type": "module"` selects `nodejs-esm`.
pub fn detect_project<S: AsRef<str>>(
    entry_names: &[S],
    package_manifest: Option<&str>,
) -> Detection {
    let project_files: BTreeSet<String> = entry_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| is_marker(name))
        .map(ToOwned::to_owned)
        .collect();

    let has = |marker: &str| find_marker(entry_names, marker).is_some();

    let project_type = if has(NODE_MANIFEST) {
        node_flavor(package_manifest)
    } else if has("cargo.toml") {
        ProjectType::Rust
    } else if has("go.mod") {
        ProjectType::Go
    } else if has("requirements.txt") || has("pyproject.toml") {
        ProjectType::Python
    } else {
        ProjectType::Unknown
    };

    let has_git = entry_names.iter().any(|name| name.as_ref() == ".git");
    let has_vcs = entry_names
        .iter()
        .any(|name| VCS_MARKERS.contains(&name.as_ref()));

    Detection {
        project_type,
        project_files,
        has_git,
        has_vcs,
    }
}

fn node_flavor(package_manifest: Option<&str>) -> ProjectType {
    let is_module = package_manifest
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .and_then(|value| value.get("type")?.as_str().map(|t| t == "module"))
        .unwrap_or(false);

    if is_module {
        ProjectType::NodejsEsm
    } else {
        ProjectType::Nodejs
    }
}

fn is_marker(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PROJECT_MARKERS.contains(&lower.as_str())
}

fn find_marker<'a, S: AsRef<str>>(entry_names: &'a [S], marker: &str) -> Option<&'a str> {
    entry_names
        .iter()
        .map(AsRef::as_ref)
        .find(|name| name.eq_ignore_ascii_case(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn detects_commonjs_node_project() {
        let detection = detect_project(&["package.json", "src", ".git"], Some(r#"{"name":"x"}"#));
        assert_eq!(detection.project_type, ProjectType::Nodejs);
        assert!(detection.has_git);
        assert_eq!(
            detection.project_files,
            BTreeSet::from(["package.json".to_string(), ".git".to_string()])
        );
    }

    #[test]
    fn detects_esm_node_project_from_manifest() {
        let detection = detect_project(&["package.json"], Some(r#"{"type":"module"}"#));
        assert_eq!(detection.project_type, ProjectType::NodejsEsm);
    }

    #[test]
    fn unreadable_manifest_falls_back_to_commonjs() {
        let detection = detect_project(&["package.json"], Some("{not json"));
        assert_eq!(detection.project_type, ProjectType::Nodejs);
        let detection = detect_project(&["package.json"], None);
        assert_eq!(detection.project_type, ProjectType::Nodejs);
    }

    #[test]
    fn cargo_manifest_matches_regardless_of_case() {
        let detection = detect_project(&["Cargo.toml", "src"], None);
        assert_eq!(detection.project_type, ProjectType::Rust);
        assert!(detection.project_files.contains("Cargo.toml"));
    }

    #[test]
    fn node_manifest_wins_over_other_markers() {
        let detection = detect_project(&["go.mod", "Cargo.toml", "package.json"], None);
        assert_eq!(detection.project_type, ProjectType::Nodejs);
        assert_eq!(detection.project_files.len(), 3);
    }

    #[test]
    fn python_detected_from_requirements_or_pyproject() {
        assert_eq!(
            detect_project(&["requirements.txt"], None).project_type,
            ProjectType::Python
        );
        assert_eq!(
            detect_project(&["pyproject.toml"], None).project_type,
            ProjectType::Python
        );
    }

    #[test]
    fn go_detected_before_python() {
        let detection = detect_project(&["requirements.txt", "go.mod"], None);
        assert_eq!(detection.project_type, ProjectType::Go);
    }

    #[test]
    fn no_markers_is_unknown() {
        let detection = detect_project(&["README.md", "notes"], None);
        assert_eq!(detection.project_type, ProjectType::Unknown);
        assert!(detection.project_files.is_empty());
        assert!(!detection.has_git);
        assert!(!detection.has_vcs);
    }

    #[test]
    fn mercurial_counts_as_vcs_but_not_git() {
        let detection = detect_project(&[".hg"], None);
        assert!(detection.has_vcs);
        assert!(!detection.has_git);
    }

    #[test]
    fn manifest_entry_only_for_node_projects() {
        assert_eq!(manifest_entry(&["Package.json"]), Some("Package.json"));
        assert_eq!(manifest_entry(&["Cargo.toml"]), None);
    }

    proptest! {
        #[test]
        fn detection_is_deterministic_and_order_independent(
            mut names in proptest::collection::vec(
                prop::sample::select(vec![
                    "package.json", "Cargo.toml", "go.mod", "requirements.txt",
                    ".git", "src", "README.md", ".vscode",
                ]),
                0..8,
            )
        ) {
            let first = detect_project(&names, None);
            names.reverse();
            let second = detect_project(&names, None);
            prop_assert_eq!(first, second);
        }
    }
}
