//! End-to-end check run.
//!
//! ingestion → optional external pre-screen → candidate source →
//! concurrent probes → ranking → result files.

#![allow(clippy::missing_errors_doc)]

use crate::config::CheckSettings;
use crate::error::Result;
use crate::output::{DiagnosticLog, OutputPaths, ResultSink};
use crate::probe::{rank, CheckTransport, Executor, ProbeOutcome, ProbeWorker, Ranking};
use crate::source::{extract_iptest_csv, ingest_file, CandidateList, CandidateSource, ExternalChecker};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Candidates submitted to the executor
    pub total: usize,
    /// Distinct successful endpoints
    pub succeeded: usize,
    /// Endpoints in the preferred set
    pub preferred: usize,
    /// Probes that timed out
    pub timed_out: usize,
    /// Probes that failed for any other reason
    pub failed: usize,
    pub success_path: PathBuf,
    pub preferred_path: PathBuf,
    pub log_path: PathBuf,
    /// Both ranked sets
    pub ranking: Ranking,
}

/// One check run over one output layout.
pub struct Pipeline<T> {
    settings: CheckSettings,
    transport: T,
    sink: ResultSink,
}

impl<T: CheckTransport> Pipeline<T> {
    /// Create a run writing into `paths`.
    ///
    /// # Errors
    ///
    /// Returns a config error if the settings are invalid.
    pub fn new(paths: OutputPaths, settings: CheckSettings, transport: T) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            transport,
            sink: ResultSink::new(paths),
        })
    }

    #[must_use]
    pub fn paths(&self) -> &OutputPaths {
        self.sink.paths()
    }

    /// Full run starting from a user-supplied `.txt` / `.csv` file.
    ///
    /// The input is read before stale outputs are removed, and a layout
    /// that would overwrite the input is refused. When `checker` is given,
    /// its results replace the ingested list; if it fails the ingested list
    /// is probed instead.
    pub async fn run<E, F>(self, input: &Path, checker: Option<&E>, on_progress: F) -> Result<RunSummary>
    where
        E: ExternalChecker,
        F: FnMut(usize, usize),
    {
        let paths = self.sink.paths().clone();
        paths.ensure_distinct_from(input)?;

        let report = ingest_file(input, self.settings.datacenter())?;
        self.sink.prepare()?;
        CandidateSource::save(&paths.candidates, &report.candidates)?;

        if let Some(checker) = checker {
            self.prescreen(checker, &paths).await;
        }

        let source = if paths.iptest_txt.exists() {
            &paths.iptest_txt
        } else {
            &paths.candidates
        };
        let candidates = CandidateSource::load(source)?;
        self.run_candidates(candidates, on_progress).await
    }

    async fn prescreen<E: ExternalChecker>(&self, checker: &E, paths: &OutputPaths) {
        let csv = match checker.run(&paths.candidates, &paths.iptest_csv).await {
            Ok(csv) => csv,
            Err(e) => {
                tracing::warn!("{e}; probing the ingested list instead");
                return;
            }
        };
        if let Err(e) = extract_iptest_csv(&csv, &paths.iptest_txt, self.settings.country()) {
            tracing::warn!("{e}; probing the ingested list instead");
        }
    }

    /// Probe an already loaded candidate list, rank, and write results.
    ///
    /// The diagnostic log is truncated first. Any failure to write the
    /// log or the result files aborts the run.
    pub async fn run_candidates<F>(self, candidates: CandidateList, on_progress: F) -> Result<RunSummary>
    where
        F: FnMut(usize, usize),
    {
        let paths = self.sink.paths().clone();
        let log = Arc::new(DiagnosticLog::create(&paths.log).await?);

        let worker = ProbeWorker::new(self.transport, Arc::clone(&log))
            .with_check_url(self.settings.check_url.clone())
            .with_timeout(self.settings.timeout());
        let executor = Executor::new(worker, self.settings.max_workers);

        let outcomes = executor.run_all(candidates.lines, on_progress).await;
        log.finish().await?;

        let ranking = rank(&outcomes, &self.settings.preferred_filter());
        self.sink.write_ranking(&ranking)?;

        Ok(summarize(&outcomes, ranking, &paths))
    }
}

fn summarize(outcomes: &[ProbeOutcome], ranking: Ranking, paths: &OutputPaths) -> RunSummary {
    let timed_out = outcomes.iter().filter(|o| o.is_timeout()).count();
    let failed = outcomes
        .iter()
        .filter(|o| o.success_record().is_none() && !o.is_timeout())
        .count();

    RunSummary {
        total: outcomes.len(),
        succeeded: ranking.all.len(),
        preferred: ranking.preferred.len(),
        timed_out,
        failed,
        success_path: paths.success.clone(),
        preferred_path: paths.preferred.clone(),
        log_path: paths.log.clone(),
        ranking,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::probe::worker::tests::{Canned, FakeTransport};
    use crate::source::IptestRunner;
    use std::fs;
    use std::future::Future;

    /// External checker that writes a fixed CSV.
    struct StubChecker(&'static str);

    impl ExternalChecker for StubChecker {
        fn run(&self, _input: &Path, output: &Path) -> impl Future<Output = Result<PathBuf>> + Send {
            let output = output.to_path_buf();
            let content = self.0;
            async move {
                fs::write(&output, content)?;
                Ok(output)
            }
        }
    }

    fn transport() -> FakeTransport {
        FakeTransport::new(&[
            ("1.1.1.1:443", Canned::Reply(200, r#"{"success":true,"responseTime":120}"#)),
            ("2.2.2.2:8443", Canned::Reply(200, r#"{"success":true,"responseTime":500}"#)),
            ("3.3.3.3:443", Canned::Hang),
        ])
    }

    fn settings() -> CheckSettings {
        CheckSettings {
            timeout_secs: 1,
            ..CheckSettings::default()
        }
    }

    fn setup(input: &str, name: &str) -> (tempfile::TempDir, PathBuf, OutputPaths) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, input).unwrap();
        let paths = OutputPaths::for_input(&path, None).unwrap();
        (dir, path, paths)
    }

    #[tokio::test]
    async fn test_full_run() {
        let (_dir, input, paths) = setup("1.1.1.1 443\n2.2.2.2:8443\n3.3.3.3 443\n", "list.txt");
        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();

        let mut last = (0, 0);
        let summary = pipeline
            .run(&input, None::<&IptestRunner>, |done, total| last = (done, total))
            .await
            .unwrap();

        assert_eq!(last, (3, 3));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.preferred, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(
            fs::read_to_string(&paths.success).unwrap(),
            "1.1.1.1:443#120ms\n2.2.2.2:8443#500ms\n"
        );
        assert_eq!(fs::read_to_string(&paths.preferred).unwrap(), "1.1.1.1:443#120ms\n");

        let log = fs::read_to_string(&paths.log).unwrap();
        assert_eq!(log.matches("--- proxy: ").count(), 3);
        assert!(log.contains("--- proxy: 3.3.3.3:443 ---\nSTDOUT: \nSTDERR: request timed out"));
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let (_dir, input, paths) = setup("2.2.2.2 8443\n1.1.1.1 443\n", "list.txt");

        Pipeline::new(paths.clone(), settings(), transport())
            .unwrap()
            .run(&input, None::<&IptestRunner>, |_, _| {})
            .await
            .unwrap();
        let first = (
            fs::read(&paths.success).unwrap(),
            fs::read(&paths.preferred).unwrap(),
        );

        Pipeline::new(paths.clone(), settings(), transport())
            .unwrap()
            .run(&input, None::<&IptestRunner>, |_, _| {})
            .await
            .unwrap();
        let second = (
            fs::read(&paths.success).unwrap(),
            fs::read(&paths.preferred).unwrap(),
        );

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_input_aborts_before_probing() {
        let (_dir, input, paths) = setup("\n\n", "list.txt");
        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();

        let err = pipeline
            .run(&input, None::<&IptestRunner>, |_, _| panic!("executor must not run"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates(_)));
        assert!(!paths.log.exists());
    }

    #[tokio::test]
    async fn test_prescreen_results_replace_input() {
        let (_dir, input, paths) = setup("1.1.1.1 443\n2.2.2.2 8443\n", "list.txt");
        let checker = StubChecker(
            "IP,Port,TLS,DC,Region,City,Latency,Speed,Country\n\
             2.2.2.2,8443,true,HKG,AP,HK,10,0,HK\n\
             1.1.1.1,443,true,SJC,NA,SJ,10,0,US\n",
        );
        let settings = CheckSettings {
            preferred_country: "HK".into(),
            ..settings()
        };
        let pipeline = Pipeline::new(paths.clone(), settings, transport()).unwrap();

        let summary = pipeline.run(&input, Some(&checker), |_, _| {}).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(fs::read_to_string(&paths.iptest_txt).unwrap(), "2.2.2.2 8443\n");
        assert_eq!(
            fs::read_to_string(&paths.success).unwrap(),
            "2.2.2.2:8443#500ms\n"
        );
    }

    #[tokio::test]
    async fn test_failed_prescreen_falls_back_to_input() {
        let (dir, input, paths) = setup("1.1.1.1 443\n", "list.txt");
        let checker = IptestRunner::new(dir.path().join("missing-iptest"));
        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();

        let summary = pipeline.run(&input, Some(&checker), |_, _| {}).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_out_dir_holding_input_keeps_input() {
        let (dir, input, _) = setup("1.1.1.1 443\n", "hk.txt");
        let paths = OutputPaths::for_input(&input, Some(dir.path())).unwrap();
        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();

        let err = pipeline
            .run(&input, None::<&IptestRunner>, |_, _| panic!("executor must not run"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(fs::read_to_string(&input).unwrap(), "1.1.1.1 443\n");
        assert!(!paths.success.exists());
    }

    #[tokio::test]
    async fn test_unreadable_input_leaves_previous_results() {
        let (dir, _, _) = setup("", "unused.txt");
        let input = dir.path().join("gone.txt");
        let paths = OutputPaths::for_input(&input, None).unwrap();
        fs::create_dir_all(&paths.dir).unwrap();
        fs::write(&paths.success, "1.1.1.1:443#120ms\n").unwrap();

        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();
        let err = pipeline
            .run(&input, None::<&IptestRunner>, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(paths.success.exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_log_write_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = OutputPaths::for_input(&dir.path().join("list.txt"), None).unwrap();
        fs::create_dir_all(&paths.dir).unwrap();
        // every write to /dev/full fails with ENOSPC
        paths.log = PathBuf::from("/dev/full");

        let pipeline = Pipeline::new(paths.clone(), settings(), transport()).unwrap();
        let candidates = CandidateSource::parse_str("1.1.1.1 443\n2.2.2.2 8443\n");
        let err = pipeline.run_candidates(candidates, |_, _| {}).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(!paths.success.exists());
        assert!(!paths.preferred.exists());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let paths = OutputPaths::for_input(Path::new("x.txt"), None).unwrap();
        let settings = CheckSettings {
            max_workers: 0,
            ..CheckSettings::default()
        };
        assert!(Pipeline::new(paths, settings, transport()).is_err());
    }
}
