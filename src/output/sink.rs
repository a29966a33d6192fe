//! Result sink: output layout, fresh-start cleanup, and ranked set files.

use crate::error::{Error, Result};
use crate::probe::{Ranking, SuccessRecord};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Files produced by one run, all inside one output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Output folder
    pub dir: PathBuf,
    /// Normalized `host port` candidate list
    pub candidates: PathBuf,
    /// All successes
    pub success: PathBuf,
    /// Preferred successes
    pub preferred: PathBuf,
    /// Diagnostic log
    pub log: PathBuf,
    /// CSV written by the external checker
    pub iptest_csv: PathBuf,
    /// Candidates extracted from the external checker CSV
    pub iptest_txt: PathBuf,
}

impl OutputPaths {
    /// Derive the layout for an input file.
    ///
    /// The base name is the input's file stem. Without `out_dir`, the output
    /// folder is `<input dir>/<base>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input path has no file name.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let paths = OutputPaths::for_input(Path::new("hk.csv"), None)?;
    /// assert_eq!(paths.success, Path::new("hk/hk_success.txt"));
    /// ```
    pub fn for_input(input: &Path, out_dir: Option<&Path>) -> Result<Self> {
        let base = input
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config(format!("invalid input path: {}", input.display())))?;

        let dir = out_dir.map_or_else(
            || input.parent().unwrap_or_else(|| Path::new("")).join(base),
            Path::to_path_buf,
        );

        Ok(Self {
            candidates: dir.join(format!("{base}.txt")),
            success: dir.join(format!("{base}_success.txt")),
            preferred: dir.join(format!("{base}_preferred.txt")),
            log: dir.join(format!("{base}.log")),
            iptest_csv: dir.join(format!("iptest_{base}.csv")),
            iptest_txt: dir.join(format!("iptest_{base}.txt")),
            dir,
        })
    }

    /// Every file of the layout.
    #[must_use]
    pub fn files(&self) -> [&Path; 6] {
        [
            &self.candidates,
            &self.success,
            &self.log,
            &self.iptest_csv,
            &self.iptest_txt,
            &self.preferred,
        ]
    }

    /// Refuse a layout in which any output file is the input file itself.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the clashing output file.
    pub fn ensure_distinct_from(&self, input: &Path) -> Result<()> {
        let Ok(input) = fs::canonicalize(input) else {
            return Ok(());
        };
        let Ok(dir) = fs::canonicalize(&self.dir) else {
            // folder does not exist yet, so nothing in it can be the input
            return Ok(());
        };

        for path in self.files() {
            let Some(name) = path.file_name() else {
                continue;
            };
            if dir.join(name) == input {
                return Err(Error::config(format!(
                    "output path {} would overwrite input {}; choose another --out-dir",
                    path.display(),
                    input.display()
                )));
            }
        }
        Ok(())
    }
}

/// Single writer of the ranked result files.
#[derive(Debug, Clone)]
pub struct ResultSink {
    paths: OutputPaths,
}

impl ResultSink {
    #[must_use]
    pub fn new(paths: OutputPaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Create the output folder and delete files left by a previous run.
    ///
    /// Returns the files that were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the output folder cannot be created. A file that
    /// cannot be removed is only reported.
    pub fn prepare(&self) -> Result<Vec<PathBuf>> {
        if !self.paths.dir.as_os_str().is_empty() && !self.paths.dir.exists() {
            fs::create_dir_all(&self.paths.dir)?;
            tracing::info!("created output folder {}", self.paths.dir.display());
        }

        let mut removed = Vec::new();
        for path in self.paths.files() {
            if !path.exists() {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::info!("removed stale file {}", path.display());
                    removed.push(path.to_path_buf());
                }
                Err(e) => tracing::warn!("could not remove {}: {e}", path.display()),
            }
        }
        Ok(removed)
    }

    /// Write both ranked sets, replacing any previous content.
    ///
    /// The preferred file is written even when the set is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write_ranking(&self, ranking: &Ranking) -> Result<()> {
        write_records(&self.paths.success, &ranking.all)?;
        tracing::info!(
            "wrote {} successes to {}",
            ranking.all.len(),
            self.paths.success.display()
        );

        write_records(&self.paths.preferred, &ranking.preferred)?;
        tracing::info!(
            "wrote {} preferred to {}",
            ranking.preferred.len(),
            self.paths.preferred.display()
        );
        Ok(())
    }
}

/// Write records one per line as `host:port#<ms>ms`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_records(path: &Path, records: &[SuccessRecord]) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for record in records {
        writeln!(out, "{}", record.to_line())?;
    }
    out.flush()?;
    Ok(())
}
