//! Candidate source: reads the normalized `host port` list fed to the probes.

use crate::error::{Error, Result};
use crate::probe::Candidate;
use std::collections::HashSet;
use std::path::Path;

/// Candidate lines ready for the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    /// Lines in input order, trimmed, duplicates removed
    pub lines: Vec<String>,
    /// How many lines parse as `host port`
    pub valid: usize,
    /// How many duplicate pairs were dropped
    pub duplicates: usize,
}

impl CandidateList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Loader for candidate files.
pub struct CandidateSource;

impl CandidateSource {
    /// Parse candidate lines.
    ///
    /// Blank lines are skipped and repeated `(host, port)` pairs keep only
    /// their first occurrence. Lines that are not a `host port` pair are
    /// kept, so the probe worker can report them.
    #[must_use]
    pub fn parse_str(content: &str) -> CandidateList {
        let mut seen = HashSet::new();
        let mut list = CandidateList::default();

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match Candidate::parse(line) {
                Some(candidate) => {
                    if !seen.insert(candidate.clone()) {
                        list.duplicates += 1;
                        continue;
                    }
                    list.valid += 1;
                    list.lines.push(candidate.to_line());
                }
                None => list.lines.push(line.to_string()),
            }
        }

        list
    }

    /// Load candidates from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or
    /// [`Error::NoCandidates`] if it holds no valid `host port` line.
    pub fn load(path: impl AsRef<Path>) -> Result<CandidateList> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let list = Self::parse_str(&content);

        if list.valid == 0 {
            return Err(Error::no_candidates(path.display()));
        }
        if list.duplicates > 0 {
            tracing::info!("dropped {} duplicate candidates", list.duplicates);
        }
        tracing::info!("read {} candidates from {}", list.len(), path.display());
        Ok(list)
    }

    /// Write candidates as `host port` lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(path: impl AsRef<Path>, candidates: &[Candidate]) -> Result<()> {
        let mut content = String::new();
        for candidate in candidates {
            content.push_str(&candidate.to_line());
            content.push('\n');
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_str() {
        let content = "
1.1.1.1 443

2.2.2.2   8443
1.1.1.1 443
broken-line
";
        let list = CandidateSource::parse_str(content);
        assert_eq!(list.lines, ["1.1.1.1 443", "2.2.2.2 8443", "broken-line"]);
        assert_eq!(list.valid, 2);
        assert_eq!(list.duplicates, 1);
    }

    #[test]
    fn test_load_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "\n\n").unwrap();

        let err = CandidateSource::load(&path).unwrap_err();
        assert!(matches!(err, Error::NoCandidates(_)));
        assert!(err.to_string().contains("no valid candidates"));
    }

    #[test]
    fn test_load_only_malformed_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "nonsense\nmore nonsense here\n").unwrap();
        assert!(CandidateSource::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.txt");
        let candidates = vec![Candidate::new("1.1.1.1", "443"), Candidate::new("::1", "80")];
        CandidateSource::save(&path, &candidates).unwrap();

        let list = CandidateSource::load(&path).unwrap();
        assert_eq!(list.lines, ["1.1.1.1 443", "::1 80"]);
    }
}
