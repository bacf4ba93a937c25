use crate::{
    combiner::{self, CombineReport},
    config::{Config, SubstitutionScope},
    error::{Error, Result},
    lister::{self, FileEntry},
    pruner::{self, PruneOutcome},
    substitution::{self, BatchReport},
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::{
    fs,
    path::Path,
    time::{Duration, Instant},
};
use tracing::{info, instrument, warn};

/// Inner width of the summary box, excluding the leading space.
const SUMMARY_WIDTH: usize = 54;

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// When the run started
    pub started_at: DateTime<Local>,

    /// Documents found in the input directory
    pub documents_listed: usize,

    /// Documents written into the combined output
    pub documents_combined: usize,

    /// Size of the combined output in bytes
    pub bytes_written: u64,

    /// Files read by the substitution stage
    pub files_scanned: usize,

    /// Files rewritten by the substitution stage
    pub files_changed: usize,

    /// Occurrences replaced
    pub replacements: usize,

    /// Files deleted by the prune stage
    pub files_removed: usize,

    /// Per-file failures from every stage
    pub failures: Vec<Error>,

    /// Combined document path
    pub output_path: String,

    /// Total execution time
    pub duration: Duration,

    /// Time spent listing
    pub list_duration: Duration,

    /// Time spent combining
    pub combine_duration: Duration,

    /// Time spent substituting
    pub substitute_duration: Duration,

    /// Time spent pruning
    pub prune_duration: Duration,
}

impl PipelineStats {
    fn new(started_at: DateTime<Local>, output_path: &Path) -> Self {
        Self {
            started_at,
            documents_listed: 0,
            documents_combined: 0,
            bytes_written: 0,
            files_scanned: 0,
            files_changed: 0,
            replacements: 0,
            files_removed: 0,
            failures: Vec::new(),
            output_path: output_path.display().to_string(),
            duration: Duration::ZERO,
            list_duration: Duration::ZERO,
            combine_duration: Duration::ZERO,
            substitute_duration: Duration::ZERO,
            prune_duration: Duration::ZERO,
        }
    }

    fn record_combine(&mut self, report: CombineReport) {
        self.documents_combined = report.combined.len();
        self.bytes_written = report.bytes_written;
        self.failures.extend(report.failures);
    }

    fn record_substitution(&mut self, report: BatchReport) {
        self.files_scanned = report.processed.len();
        self.files_changed = report.files_changed();
        self.replacements = report.total_replacements();
        self.failures.extend(report.failures);
    }

    fn record_prune(&mut self, outcomes: Vec<PruneOutcome>) {
        for outcome in outcomes {
            match outcome.status {
                pruner::RemovalStatus::Removed => self.files_removed += 1,
                pruner::RemovalStatus::Failed(err) => self.failures.push(err),
            }
        }
    }

    /// Returns true if any file-level operation failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!();
        for line in self.summary_lines() {
            println!("{line}");
        }
        println!();

        for failure in &self.failures {
            println!("  ✗ {failure}");
        }
    }

    fn summary_lines(&self) -> Vec<String> {
        let row = |text: String| format!("║ {text:<width$}║", width = SUMMARY_WIDTH);
        let blank = || row(String::new());
        let rule = "═".repeat(SUMMARY_WIDTH + 1);

        vec![
            format!("╔{rule}╗"),
            row(format!("{:^w$}", "Pipeline Execution Summary", w = SUMMARY_WIDTH - 1)),
            format!("╠{rule}╣"),
            row(format!("Documents Listed:     {:>8}", self.documents_listed)),
            row(format!("Documents Combined:   {:>8}", self.documents_combined)),
            row(format!("Bytes Written:        {:>8}", self.bytes_written)),
            blank(),
            row(format!(
                "Files Changed:        {:>8} of {}",
                self.files_changed, self.files_scanned
            )),
            row(format!("Replacements:         {:>8}", self.replacements)),
            row(format!("Files Removed:        {:>8}", self.files_removed)),
            row(format!("Failures:             {:>8}", self.failures.len())),
            blank(),
            row("Output File:".to_string()),
            row(format!("  {}", self.output_path)),
            blank(),
            row("Timing Breakdown:".to_string()),
            row(format!("  - Listing:          {:>8.2}s", self.list_duration.as_secs_f64())),
            row(format!("  - Combining:        {:>8.2}s", self.combine_duration.as_secs_f64())),
            row(format!(
                "  - Substituting:     {:>8.2}s",
                self.substitute_duration.as_secs_f64()
            )),
            row(format!("  - Pruning:          {:>8.2}s", self.prune_duration.as_secs_f64())),
            row(format!("  - Total:            {:>8.2}s", self.duration.as_secs_f64())),
            format!("╚{rule}╝"),
        ]
    }
}

/// Runs list → combine → substitute → prune for one configuration.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **List**: collects `*suffix` documents from the input directory
    /// 2. **Combine**: writes them, separated, into the output file
    /// 3. **Substitute**: applies the rules per [`SubstitutionScope`]
    /// 4. **Prune**: deletes files matching the removal filter
    ///
    /// # Errors
    ///
    /// Returns an error if no documents are found, the output cannot be
    /// written, or the prune directory is missing. Per-file failures are
    /// recorded in the returned statistics instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mdmerge::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .input_dir("./notes")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(input_dir = %self.config.input_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let output_path = self.config.output_path();
        let mut stats = PipelineStats::new(Local::now(), &output_path);

        info!("Starting pipeline execution");

        // Stage 1: Listing
        info!("Stage 1/4: Listing documents...");
        let stage_start = Instant::now();
        let documents = self.list(&output_path)?;
        stats.documents_listed = documents.len();
        stats.list_duration = stage_start.elapsed();
        info!("✓ Found {} document(s)", documents.len());

        // Stage 2: Combining
        info!("Stage 2/4: Combining documents...");
        let stage_start = Instant::now();
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| Error::io("create directory", &self.config.output_dir, e))?;
        let report =
            combiner::combine_entries(&documents, &output_path, &self.config.separator)?;
        stats.record_combine(report);
        stats.combine_duration = stage_start.elapsed();
        info!(
            "✓ Combined {} document(s) into {}",
            stats.documents_combined,
            output_path.display()
        );

        // Stage 3: Substituting
        let stage_start = Instant::now();
        if self.config.rules.is_empty() {
            info!("Stage 3/4: No substitution rules configured, skipping");
        } else {
            info!(
                "Stage 3/4: Applying {} substitution rule(s)...",
                self.config.rules.len()
            );
            let report = self.substitute(&output_path)?;
            stats.record_substitution(report);
            info!(
                "✓ Replaced {} occurrence(s) in {} file(s)",
                stats.replacements, stats.files_changed
            );
        }
        stats.substitute_duration = stage_start.elapsed();

        // Stage 4: Pruning
        let stage_start = Instant::now();
        if self.config.removal_filter.is_empty() {
            info!("Stage 4/4: Removal filter is empty, skipping");
        } else {
            info!(
                "Stage 4/4: Pruning {}...",
                self.config.prune_dir().display()
            );
            let outcomes = pruner::prune(self.config.prune_dir(), &self.config.removal_filter)?;
            stats.record_prune(outcomes);
            info!("✓ Removed {} file(s)", stats.files_removed);
        }
        stats.prune_duration = stage_start.elapsed();

        stats.duration = start_time.elapsed();

        if stats.has_failures() {
            warn!(
                "Pipeline finished with {} file-level failure(s) in {:.2}s",
                stats.failures.len(),
                stats.duration.as_secs_f64()
            );
        } else {
            info!(
                "✓ Pipeline completed successfully in {:.2}s",
                stats.duration.as_secs_f64()
            );
        }

        Ok(stats)
    }

    /// Lists the input documents, leaving out the combined output itself.
    fn list(&self, output_path: &Path) -> Result<Vec<FileEntry>> {
        let documents = lister::list_inputs(
            &self.config.input_dir,
            &self.config.suffix,
            self.config.sort_order,
            output_path,
        )?;

        if documents.is_empty() {
            return Err(Error::no_files(&self.config.input_dir, &self.config.suffix));
        }

        Ok(documents)
    }

    /// Runs the substitution stage over the configured scope.
    fn substitute(&self, output_path: &Path) -> Result<BatchReport> {
        match self.config.substitution_scope {
            SubstitutionScope::OutputDirectory => substitution::process_all(
                &self.config.output_dir,
                &self.config.suffix,
                &self.config.rules,
            ),
            SubstitutionScope::CombinedOnly => {
                let mut report = BatchReport::default();
                match substitution::process_file(output_path, &self.config.rules) {
                    Ok(outcome) => report.processed.push(outcome),
                    Err(e) => {
                        warn!("Substitution skipped: {}", e);
                        report.failures.push(e);
                    }
                }
                Ok(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pruner::RemovalFilter, substitution::SubstitutionRules, SortOrder};
    use assert_fs::prelude::*;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_pipeline_combines_in_ascending_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("in");
        input.child("b.md").write_str("2").unwrap();
        input.child("a.md").write_str("1").unwrap();

        let config = Config::builder()
            .input_dir(input.path())
            .output_dir(temp.child("out").path())
            .separator("|")
            .sort_order(SortOrder::Ascending)
            .build()
            .unwrap();
        let output_path = config.output_path();

        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(read(&output_path), "1|2|");
        assert_eq!(stats.documents_listed, 2);
        assert_eq!(stats.documents_combined, 2);
        assert!(!stats.has_failures());
    }

    #[test]
    fn test_pipeline_full_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("in");
        let output = temp.child("out");
        input.child("01_intro.md").write_str("Hello old_word").unwrap();
        input.child("02_body.md").write_str("drop_me body").unwrap();
        input.child("02_body_backup.md").write_str("backup").unwrap();
        input.child("scratch.txt").write_str("tmp").unwrap();
        output.child("existing.md").write_str("old_word elsewhere").unwrap();

        let config = Config::builder()
            .input_dir(input.path())
            .output_dir(output.path())
            .separator("\n")
            .rules(SubstitutionRules::new(&["old_word", "drop_me "], &["new_word", ""]).unwrap())
            .removal_filter(RemovalFilter::new(["_backup", "scratch"]))
            .build()
            .unwrap();
        let output_path = config.output_path();

        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(read(&output_path), "Hello new_word\nbody\nbackup\n");
        assert_eq!(read(output.child("existing.md").path()), "new_word elsewhere");
        assert_eq!(read(input.child("01_intro.md").path()), "Hello old_word");
        assert!(!input.child("02_body_backup.md").exists());
        assert!(!input.child("scratch.txt").exists());
        assert_eq!(stats.files_removed, 2);
        assert_eq!(stats.files_changed, 2);
        assert_eq!(stats.replacements, 3);
    }

    #[test]
    fn test_pipeline_combined_only_scope() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("in");
        let output = temp.child("out");
        input.child("a.md").write_str("x").unwrap();
        output.child("other.md").write_str("x").unwrap();

        let config = Config::builder()
            .input_dir(input.path())
            .output_dir(output.path())
            .separator("")
            .rules(SubstitutionRules::new(&["x"], &["y"]).unwrap())
            .substitution_scope(SubstitutionScope::CombinedOnly)
            .build()
            .unwrap();
        let output_path = config.output_path();

        Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(read(&output_path), "y");
        assert_eq!(read(output.child("other.md").path()), "x");
    }

    #[test]
    fn test_pipeline_twice_is_stable() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("in");
        input.child("a.md").write_str("x-ray").unwrap();
        input.child("b.md").write_str("box").unwrap();

        let build = || {
            Config::builder()
                .input_dir(input.path())
                .output_dir(temp.child("out").path())
                .rules(SubstitutionRules::new(&["x"], &["y"]).unwrap())
                .build()
                .unwrap()
        };
        let output_path = build().output_path();

        Pipeline::new(build()).unwrap().run().unwrap();
        let first = read(&output_path);
        Pipeline::new(build()).unwrap().run().unwrap();
        let second = read(&output_path);

        assert_eq!(first, "y-ray\n\n---\n\nboy\n\n---\n\n");
        assert_eq!(first, second);
    }

    #[test]
    fn test_pipeline_skips_its_own_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("A").unwrap();

        let build = || {
            Config::builder()
                .input_dir(temp.path())
                .output_dir(temp.path())
                .output_file("all.md")
                .separator(";")
                .build()
                .unwrap()
        };

        Pipeline::new(build()).unwrap().run().unwrap();
        let stats = Pipeline::new(build()).unwrap().run().unwrap();

        assert_eq!(read(temp.child("all.md").path()), "A;");
        assert_eq!(stats.documents_listed, 1);
    }

    #[test]
    fn test_pipeline_no_documents_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("in/notes.txt").write_str("not markdown").unwrap();

        let config = Config::builder()
            .input_dir(temp.child("in").path())
            .output_dir(temp.child("out").path())
            .removal_filter(RemovalFilter::new(["notes"]))
            .build()
            .unwrap();

        let result = Pipeline::new(config).unwrap().run();

        assert!(matches!(result, Err(Error::NoFiles { .. })));
        assert!(!temp.child("out").exists());
        assert!(temp.child("in/notes.txt").exists());
    }

    #[test]
    fn test_pipeline_unwritable_output_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("in/a.md").write_str("1").unwrap();
        temp.child("blocker").write_str("a file, not a directory").unwrap();

        let config = Config::builder()
            .input_dir(temp.child("in").path())
            .output_dir(temp.child("blocker").path())
            .removal_filter(RemovalFilter::new(["a.md"]))
            .build()
            .unwrap();

        let result = Pipeline::new(config).unwrap().run();

        assert!(result.is_err());
        assert!(temp.child("in/a.md").exists());
    }

    #[test]
    fn test_pipeline_records_file_failures() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("in/good.md").write_str("fine").unwrap();
        temp.child("in/bad.md").write_binary(&[0xff, 0xff]).unwrap();

        let config = Config::builder()
            .input_dir(temp.child("in").path())
            .output_dir(temp.child("out").path())
            .separator("|")
            .build()
            .unwrap();
        let output_path = config.output_path();

        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(read(&output_path), "fine|");
        assert_eq!(stats.documents_listed, 2);
        assert_eq!(stats.documents_combined, 1);
        assert!(stats.has_failures());
    }

    #[test]
    fn test_summary_box_rows_are_aligned() {
        let mut stats = PipelineStats::new(Local::now(), Path::new("/tmp/out/combined.md"));
        stats.documents_listed = 12;
        stats.files_changed = 3;
        stats.files_scanned = 4;

        let lines = stats.summary_lines();
        let width = lines[0].chars().count();

        assert!(lines.iter().all(|line| line.chars().count() == width));
        assert!(lines.iter().skip(1).all(|line| line.ends_with('║')
            || line.ends_with('╣')
            || line.ends_with('╝')));
        assert!(lines.iter().any(|line| line.contains("/tmp/out/combined.md")));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = PipelineStats::new(Local::now(), Path::new("/tmp/out/combined.md"));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["output_path"], "/tmp/out/combined.md");
        assert_eq!(json["failures"].as_array().map(Vec::len), Some(0));
    }
}
