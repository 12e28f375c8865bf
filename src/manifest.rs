use std::{collections::BTreeMap, fs, io, path::Path};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Package name of Drupal's own root package.
pub const DRUPAL_ROOT_PACKAGE: &str = "drupal/drupal";
/// Dependency that marks a project as built on Drupal.
pub const DRUPAL_CORE_PACKAGE: &str = "drupal/core";

/// The parts of `composer.json` this tool looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub require: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// `name` is an empty string; the saved selection is unusable.
    Unnamed,
    /// The manifest of Drupal itself.
    FrameworkCore,
    /// A project requiring `drupal/core`.
    FrameworkConsumer,
    Plain,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}

impl ManifestError {
    /// The manifest is gone, as opposed to present but broken.
    pub fn is_missing(&self) -> bool {
        matches!(self, ManifestError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn classify(&self) -> Classification {
        match self.name.as_deref() {
            Some("") => Classification::Unnamed,
            Some(DRUPAL_ROOT_PACKAGE) => Classification::FrameworkCore,
            _ if self.require.contains_key(DRUPAL_CORE_PACKAGE) => Classification::FrameworkConsumer,
            _ => Classification::Plain,
        }
    }
}

/// Read, parse and classify the manifest at `path`. Nothing is cached; every
/// call reads the file again.
pub fn classify(path: &Path) -> Result<Classification, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let manifest = Manifest::parse(&content).map_err(|source| ManifestError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let classification = manifest.classify();
    debug!(path = %path.display(), ?classification, "classified manifest");

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn classify_str(content: &str) -> Classification {
        Manifest::parse(content).unwrap().classify()
    }

    #[test]
    fn test_empty_name_is_unnamed() {
        assert_eq!(classify_str(r#"{"name": ""}"#), Classification::Unnamed);
        assert_eq!(
            classify_str(r#"{"name": "", "require": {"drupal/core": "^10"}}"#),
            Classification::Unnamed
        );
    }

    #[test]
    fn test_drupal_root_wins_over_require() {
        assert_eq!(classify_str(r#"{"name": "drupal/drupal"}"#), Classification::FrameworkCore);
        assert_eq!(
            classify_str(r#"{"name": "drupal/drupal", "require": {"drupal/core": "self.version"}}"#),
            Classification::FrameworkCore
        );
    }

    #[test]
    fn test_requires_drupal_core() {
        assert_eq!(
            classify_str(r#"{"name":"acme/site","require":{"drupal/core":"^9.0"}}"#),
            Classification::FrameworkConsumer
        );
    }

    #[test]
    fn test_plain_projects() {
        assert_eq!(classify_str(r#"{"name": "acme/lib"}"#), Classification::Plain);
        assert_eq!(
            classify_str(r#"{"name": "acme/lib", "require": {"php": ">=8.1", "drupal/core-recommended": "^10"}}"#),
            Classification::Plain
        );
        // a missing name is not an empty one
        assert_eq!(classify_str(r#"{"require": {"monolog/monolog": "^3"}}"#), Classification::Plain);
    }

    #[test]
    fn test_other_fields_are_ignored() {
        let content = r#"{
            "name": "acme/site",
            "type": "project",
            "autoload": {"psr-4": {"Acme\\": "src/"}},
            "extra": {"installer-paths": {"web/core": ["type:drupal-core"]}},
            "require": {"composer/installers": "^2.0", "drupal/core": "^10.1"}
        }"#;
        assert_eq!(classify_str(content), Classification::FrameworkConsumer);
    }

    #[test]
    fn test_non_object_require_is_a_parse_error() {
        assert!(Manifest::parse(r#"{"name": "acme/site", "require": ["drupal/core"]}"#).is_err());
        assert!(Manifest::parse(r#"{"name": "acme/site", "require": {"drupal/core": 10}}"#).is_err());
    }

    #[test]
    fn test_classify_reads_from_disk() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("composer.json");

        let err = classify(&path).unwrap_err();
        assert!(err.is_missing());

        std::fs::write(&path, "{ broken").unwrap();
        let err = classify(&path).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(!err.is_missing());

        std::fs::write(&path, r#"{"name": "drupal/drupal"}"#).unwrap();
        assert_eq!(classify(&path).unwrap(), Classification::FrameworkCore);
    }
}
