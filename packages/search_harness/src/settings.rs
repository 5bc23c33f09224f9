use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use new_zealand::nz;

use crate::error::io_at;
use crate::{LONG_TIMEOUT, Result, Rounds, SHORT_TIMEOUT};

/// Rounds used on continuous integration runners, where time is scarcer than precision.
pub const CI_ROUNDS: Rounds = Rounds::new(2, nz!(6));

/// Rounds used everywhere else.
pub const LOCAL_ROUNDS: Rounds = Rounds::new(5, nz!(10));

/// Directory that receives benchmark reports and program output when nothing else is configured.
pub const DEFAULT_ARTIFACT_DIR: &str = "actual";

const ARTIFACT_DIR_VAR: &str = "SEARCH_HARNESS_ACTUAL_DIR";
const SKIP_CLEANUP_VAR: &str = "SKIP_ACTUAL_CLEANUP";

/// Tunable values shared by the benchmark and verification operations.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use search_harness::BenchSettings;
///
/// let settings = BenchSettings::from_env().with_short_timeout(Duration::from_secs(5));
///
/// assert_eq!(settings.short_timeout(), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug)]
pub struct BenchSettings {
    rounds: Rounds,
    short_timeout: Duration,
    long_timeout: Duration,
    artifact_dir: PathBuf,
    cleanup: bool,
}

impl BenchSettings {
    /// Reads the settings from the process environment.
    ///
    /// When both `CI` and `GITHUB_ACTIONS` are `true`, the reduced [`CI_ROUNDS`] are used.
    /// `SEARCH_HARNESS_ACTUAL_DIR` overrides the artifact directory and a `true`
    /// `SKIP_ACTUAL_CLEANUP` keeps old artifacts around.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env()`][Self::from_env] but reads variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| {
            lookup(name).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
        };

        let rounds = if flag("CI") && flag("GITHUB_ACTIONS") {
            CI_ROUNDS
        } else {
            LOCAL_ROUNDS
        };

        let artifact_dir = lookup(ARTIFACT_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR), PathBuf::from);

        Self {
            rounds,
            short_timeout: SHORT_TIMEOUT,
            long_timeout: LONG_TIMEOUT,
            artifact_dir,
            cleanup: !flag(SKIP_CLEANUP_VAR),
        }
    }

    /// Overrides the benchmark rounds.
    #[must_use]
    pub fn with_rounds(mut self, rounds: Rounds) -> Self {
        self.rounds = rounds;
        self
    }

    /// Overrides the budget for quick operations.
    #[must_use]
    pub fn with_short_timeout(mut self, limit: Duration) -> Self {
        self.short_timeout = limit;
        self
    }

    /// Overrides the budget for long operations.
    #[must_use]
    pub fn with_long_timeout(mut self, limit: Duration) -> Self {
        self.long_timeout = limit;
        self
    }

    /// Overrides the artifact directory.
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Sets whether [`prepare_artifact_dir()`][Self::prepare_artifact_dir] deletes old artifacts.
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// The benchmark rounds.
    #[must_use]
    pub fn rounds(&self) -> Rounds {
        self.rounds
    }

    /// The budget for quick operations.
    #[must_use]
    pub fn short_timeout(&self) -> Duration {
        self.short_timeout
    }

    /// The budget for long operations.
    #[must_use]
    pub fn long_timeout(&self) -> Duration {
        self.long_timeout
    }

    /// The directory that receives benchmark reports and program output.
    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Whether old artifacts are deleted when the artifact directory is prepared.
    #[must_use]
    pub fn cleanup(&self) -> bool {
        self.cleanup
    }

    /// Creates the artifact directory and, unless cleanup is disabled, deletes every file left
    /// in it by a previous run. Subdirectories are kept but emptied of files.
    ///
    /// Returns how many files were deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`][crate::Error::Io] if the directory cannot be created or a file
    /// cannot be deleted.
    pub fn prepare_artifact_dir(&self) -> Result<usize> {
        fs::create_dir_all(&self.artifact_dir).map_err(io_at(&self.artifact_dir))?;

        if !self.cleanup {
            tracing::debug!(dir = %self.artifact_dir.display(), "keeping old artifacts");
            return Ok(0);
        }

        let deleted = delete_files(&self.artifact_dir)?;

        tracing::debug!(dir = %self.artifact_dir.display(), deleted, "deleted old artifacts");

        Ok(deleted)
    }
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn delete_files(dir: &Path) -> Result<usize> {
    let mut deleted: usize = 0;

    for entry in fs::read_dir(dir).map_err(io_at(dir))? {
        let path = entry.map_err(io_at(dir))?.path();

        if path.is_dir() {
            deleted = deleted.saturating_add(delete_files(&path)?);
        } else {
            fs::remove_file(&path).map_err(io_at(&path))?;
            deleted = deleted.saturating_add(1);
        }
    }

    Ok(deleted)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();

        move |name| vars.get(name).cloned()
    }

    #[test]
    fn local_defaults() {
        let settings = BenchSettings::default();

        assert_eq!(settings.rounds(), LOCAL_ROUNDS);
        assert_eq!(settings.short_timeout(), SHORT_TIMEOUT);
        assert_eq!(settings.long_timeout(), LONG_TIMEOUT);
        assert_eq!(settings.artifact_dir(), Path::new("actual"));
        assert!(settings.cleanup());
    }

    #[test]
    fn github_actions_uses_ci_rounds() {
        let settings =
            BenchSettings::from_lookup(lookup_from(&[("CI", "true"), ("GITHUB_ACTIONS", "TRUE")]));

        assert_eq!(settings.rounds(), CI_ROUNDS);
    }

    #[test]
    fn ci_alone_is_not_enough() {
        let settings = BenchSettings::from_lookup(lookup_from(&[("CI", "true")]));

        assert_eq!(settings.rounds(), LOCAL_ROUNDS);
    }

    #[test]
    fn non_true_values_are_false() {
        let settings =
            BenchSettings::from_lookup(lookup_from(&[("CI", "1"), ("GITHUB_ACTIONS", "yes")]));

        assert_eq!(settings.rounds(), LOCAL_ROUNDS);
    }

    #[test]
    fn artifact_dir_and_cleanup_from_environment() {
        let settings = BenchSettings::from_lookup(lookup_from(&[
            ("SEARCH_HARNESS_ACTUAL_DIR", "out/bench"),
            ("SKIP_ACTUAL_CLEANUP", "true"),
        ]));

        assert_eq!(settings.artifact_dir(), Path::new("out/bench"));
        assert!(!settings.cleanup());
    }

    #[test]
    fn prepare_creates_and_empties_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("actual");
        let settings = BenchSettings::default().with_artifact_dir(&dir);

        assert_eq!(settings.prepare_artifact_dir().unwrap(), 0);
        assert!(dir.is_dir());

        testing::write_text(&dir, "bench-build-single.txt", "old");
        fs::create_dir(dir.join("nested")).unwrap();
        testing::write_text(&dir.join("nested"), "index.json", "{}");

        assert_eq!(settings.prepare_artifact_dir().unwrap(), 2);
        assert!(dir.join("nested").is_dir());
        assert!(!dir.join("nested").join("index.json").exists());
        assert!(!dir.join("bench-build-single.txt").exists());
    }

    #[test]
    fn prepare_without_cleanup_keeps_files() {
        let root = tempfile::tempdir().unwrap();
        let settings = BenchSettings::default()
            .with_artifact_dir(root.path())
            .with_cleanup(false);

        let kept = testing::write_text(root.path(), "bench-build-multi.txt", "old");

        assert_eq!(settings.prepare_artifact_dir().unwrap(), 0);
        assert!(kept.exists());
    }
}
