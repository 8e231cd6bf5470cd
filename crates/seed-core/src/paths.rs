use crate::error::{Result, SeedError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SEED_DIR: &str = ".seed";
pub const CONFIG_FILE: &str = ".seed/config.json";
pub const DEFAULT_ARTIFACTS_DIR: &str = ".seed/artifacts";

/// Category used for the final record of every workflow run.
pub const WORKFLOW_CATEGORY: &str = "workflow";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn seed_dir(root: &Path) -> PathBuf {
    root.join(SEED_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve the artifacts directory. Relative configured values are taken
/// from the project root.
pub fn artifacts_dir(root: &Path, configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

// ---------------------------------------------------------------------------
// Category validation
// ---------------------------------------------------------------------------

static CATEGORY_RE: OnceLock<Regex> = OnceLock::new();

fn category_re() -> &'static Regex {
    CATEGORY_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

pub fn validate_category(category: &str) -> Result<()> {
    if category.is_empty() || category.len() > 64 || !category_re().is_match(category) {
        return Err(SeedError::InvalidCategory(category.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_categories() {
        for c in ["scan", "baseline", "workflow", "ci-report", "a", "mine_export"] {
            validate_category(c).unwrap_or_else(|_| panic!("expected valid: {c}"));
        }
    }

    #[test]
    fn invalid_categories() {
        for c in ["", "-dash", "_under", "has space", "UPPER", "../escape", "a/b"] {
            assert!(validate_category(c).is_err(), "expected invalid: {c}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.seed/config.json")
        );
        assert_eq!(
            artifacts_dir(root, DEFAULT_ARTIFACTS_DIR),
            PathBuf::from("/tmp/proj/.seed/artifacts")
        );
        assert_eq!(
            artifacts_dir(root, "/var/seed"),
            PathBuf::from("/var/seed")
        );
    }
}
