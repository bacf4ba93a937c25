use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mdmerge::{
    combine_entries, list_inputs, process_all, prune, Config, Pipeline, RulesFile, SortOrder,
    SubstitutionScope, DEFAULT_SEPARATOR,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "mdmerge",
    version,
    about = "Combine Markdown files, apply find/replace rules and prune leftovers",
    long_about = "Combine a directory of Markdown files into one document, apply ordered \
    find/replace rules from a JSON rules file, and delete files whose names contain \
    configured substrings.\n\n\
    RULES FILE:\n  \
      {\"target_word\": [\"old\"], \"replacer_word\": [\"new\"], \"removal_filter\": [\"_backup\"]}\n\n\
    USAGE EXAMPLES:\n  \
      # Full pipeline\n  \
      mdmerge run --input ./notes --output-dir ./out --rules config.json\n\n  \
      # Only combine, newest first\n  \
      mdmerge combine --input ./notes --order desc\n\n  \
      # Only delete leftovers\n  \
      mdmerge prune --dir ./notes --rules config.json"
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the result as JSON instead of a human summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List, combine, substitute and prune in one pass
    Run {
        #[command(flatten)]
        combine: CombineArgs,

        /// JSON rules file with target_word, replacer_word and removal_filter
        #[arg(short, long, value_name = "FILE")]
        rules: Option<PathBuf>,

        /// Files rewritten by the substitution stage
        #[arg(long, value_enum, default_value = "output-dir")]
        scope: CliScope,

        /// Directory to prune (defaults to the input directory)
        #[arg(long, value_name = "PATH")]
        prune_dir: Option<PathBuf>,
    },

    /// Combine documents into one file without substituting or pruning
    Combine {
        #[command(flatten)]
        combine: CombineArgs,
    },

    /// Apply find/replace rules to every matching file in a directory, in place
    Clean {
        /// Directory holding the files to rewrite
        #[arg(short, long, value_name = "PATH")]
        dir: PathBuf,

        /// JSON rules file with target_word and replacer_word
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Suffix of the files to rewrite
        #[arg(long, default_value = ".md")]
        suffix: String,
    },

    /// Delete files whose name contains any removal_filter substring
    Prune {
        /// Directory to prune
        #[arg(short, long, value_name = "PATH")]
        dir: PathBuf,

        /// JSON rules file with removal_filter
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CombineArgs {
    /// Directory holding the source documents
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    input: PathBuf,

    /// Directory for the combined document (created if absent)
    #[arg(short, long, default_value = "out", value_name = "PATH")]
    output_dir: PathBuf,

    /// File name of the combined document
    #[arg(long, default_value = "combined_result.md")]
    output_file: String,

    /// Text written after every document; \n, \t and \\ are unescaped
    #[arg(short, long)]
    separator: Option<String>,

    /// Order in which documents are combined
    #[arg(long, value_enum, default_value = "asc")]
    order: CliOrder,

    /// Suffix selecting documents
    #[arg(long, default_value = ".md")]
    suffix: String,
}

impl CombineArgs {
    fn separator(&self) -> String {
        self.separator
            .as_deref()
            .map_or_else(|| DEFAULT_SEPARATOR.to_string(), unescape)
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOrder {
    /// Ascending by file name
    Asc,
    /// Descending by file name
    Desc,
    /// Filesystem order
    None,
}

impl From<CliOrder> for SortOrder {
    fn from(o: CliOrder) -> Self {
        match o {
            CliOrder::Asc => Self::Ascending,
            CliOrder::Desc => Self::Descending,
            CliOrder::None => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliScope {
    /// Every matching file in the output directory
    OutputDir,
    /// Only the combined file
    Combined,
}

impl From<CliScope> for SubstitutionScope {
    fn from(s: CliScope) -> Self {
        match s {
            CliScope::OutputDir => Self::OutputDirectory,
            CliScope::Combined => Self::CombinedOnly,
        }
    }
}

/// How a command finished when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Clean,
    WithFailures,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let result = execute(cli);
    if let Err(e) = &result {
        eprintln!("Error: {e:?}");
    }
    ExitCode::from(exit_code(&result))
}

/// `0` full success, `2` finished with per-file failures, `1` aborted.
const fn exit_code(result: &anyhow::Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::Clean) => 0,
        Ok(Outcome::WithFailures) => 2,
        Err(_) => 1,
    }
}

fn execute(cli: Cli) -> anyhow::Result<Outcome> {
    match cli.command {
        Command::Run {
            combine,
            rules,
            scope,
            prune_dir,
        } => {
            let mut builder = Config::builder()
                .input_dir(&combine.input)
                .output_dir(&combine.output_dir)
                .output_file(&combine.output_file)
                .separator(combine.separator())
                .sort_order(combine.order.into())
                .suffix(&combine.suffix)
                .substitution_scope(scope.into());

            if let Some(path) = rules {
                let rules_file = load_rules(&path)?;
                builder = builder
                    .rules(
                        rules_file
                            .substitution_rules()
                            .context("Failed to load substitution rules")?,
                    )
                    .removal_filter(rules_file.removal_filter().clone());
            }

            if let Some(dir) = prune_dir {
                builder = builder.prune_dir(dir);
            }

            let config = builder.build().context("Failed to build configuration")?;
            let stats = Pipeline::new(config)
                .context("Failed to create pipeline")?
                .run()
                .context("Pipeline execution failed")?;

            if cli.json {
                print_json(&stats)?;
            } else {
                stats.print_summary();
            }
            Ok(outcome(stats.has_failures()))
        }

        Command::Combine { combine } => {
            let output_path = combine.output_dir.join(&combine.output_file);
            let entries = list_inputs(
                &combine.input,
                &combine.suffix,
                combine.order.into(),
                &output_path,
            )
            .context("Failed to list documents")?;
            if entries.is_empty() {
                anyhow::bail!(
                    "No '*{}' files found in '{}'",
                    combine.suffix,
                    combine.input.display()
                );
            }

            std::fs::create_dir_all(&combine.output_dir).with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    combine.output_dir.display()
                )
            })?;
            let report = combine_entries(&entries, &output_path, &combine.separator())
                .context("Failed to combine documents")?;

            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Combined {} file(s) into {}",
                    report.combined.len(),
                    report.output_path.display()
                );
            }
            Ok(outcome(!report.is_complete()))
        }

        Command::Clean { dir, rules, suffix } => {
            let rules = load_rules(&rules)?
                .substitution_rules()
                .context("Failed to load substitution rules")?;
            let report = process_all(&dir, &suffix, &rules)
                .with_context(|| format!("Failed to process '{}'", dir.display()))?;

            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Replaced {} occurrence(s) in {} of {} file(s)",
                    report.total_replacements(),
                    report.files_changed(),
                    report.processed.len() + report.failures.len()
                );
            }
            Ok(outcome(!report.failures.is_empty()))
        }

        Command::Prune { dir, rules } => {
            let rules_file = load_rules(&rules)?;
            let outcomes = prune(&dir, rules_file.removal_filter())
                .with_context(|| format!("Failed to prune '{}'", dir.display()))?;
            let failed = outcomes.iter().filter(|o| !o.is_removed()).count();

            if cli.json {
                print_json(&outcomes)?;
            } else {
                println!(
                    "Removed {} file(s), {} failure(s)",
                    outcomes.len() - failed,
                    failed
                );
            }
            Ok(outcome(failed > 0))
        }
    }
}

fn load_rules(path: &Path) -> anyhow::Result<RulesFile> {
    RulesFile::load(path).with_context(|| format!("Failed to load rules from '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}

const fn outcome(has_failures: bool) -> Outcome {
    if has_failures {
        Outcome::WithFailures
    } else {
        Outcome::Clean
    }
}

/// Expands `\n`, `\t` and `\\` so separators can be typed on a shell.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn setup_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("mdmerge=info"),
        1 => EnvFilter::new("mdmerge=debug"),
        _ => EnvFilter::new("mdmerge=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use mdmerge::RemovalFilter;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"\n\n---\n\n"), "\n\n---\n\n");
        assert_eq!(unescape(r"a\tb"), "a\tb");
        assert_eq!(unescape(r"back\\slash"), "back\\slash");
        assert_eq!(unescape(r"\q"), "\\q");
        assert_eq!(unescape("trailing\\"), "trailing\\");
        assert_eq!(unescape("|"), "|");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "mdmerge", "run", "--input", "notes", "--order", "desc", "--rules", "config.json",
            "--scope", "combined", "-v",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run {
                combine,
                rules,
                scope,
                ..
            } => {
                assert_eq!(combine.input, PathBuf::from("notes"));
                assert_eq!(SortOrder::from(combine.order), SortOrder::Descending);
                assert_eq!(rules, Some(PathBuf::from("config.json")));
                assert_eq!(SubstitutionScope::from(scope), SubstitutionScope::CombinedOnly);
                assert_eq!(combine.separator(), DEFAULT_SEPARATOR);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mdmerge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(Outcome::Clean)), 0);
        assert_eq!(exit_code(&Ok(Outcome::WithFailures)), 2);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("boom"))), 1);
        assert_eq!(outcome(false), Outcome::Clean);
        assert_eq!(outcome(true), Outcome::WithFailures);
    }

    #[test]
    fn test_combine_twice_in_same_directory_is_stable() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("A").unwrap();
        let dir = temp.path().to_str().unwrap();
        let args = [
            "combine", "--input", dir, "--output-dir", dir, "--separator", ";",
        ];

        assert_eq!(execute(cli(&args)).unwrap(), Outcome::Clean);
        assert_eq!(execute(cli(&args)).unwrap(), Outcome::Clean);

        let output = std::fs::read_to_string(temp.child("combined_result.md").path()).unwrap();
        assert_eq!(output, "A;");
    }

    #[test]
    fn test_unreadable_document_exits_with_failures() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("in/good.md").write_str("ok").unwrap();
        temp.child("in/bad.md").write_binary(&[0xff, 0xfe]).unwrap();
        let input = temp.child("in");
        let output = temp.child("out");

        let result = execute(cli(&[
            "run",
            "--input",
            input.path().to_str().unwrap(),
            "--output-dir",
            output.path().to_str().unwrap(),
        ]));

        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        let result = execute(cli(&["run", "--input", missing.to_str().unwrap()]));

        assert_eq!(exit_code(&result), 1);
        assert!(format!("{:?}", result.unwrap_err()).contains("Directory not found"));
    }

    #[test]
    fn test_json_output_of_prune_outcomes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes_backup.md").write_str("").unwrap();
        let outcomes = prune(temp.path(), &RemovalFilter::new(["_backup"])).unwrap();

        let json: serde_json::Value = serde_json::from_str(&to_json(&outcomes).unwrap()).unwrap();

        assert_eq!(json[0]["name"], "notes_backup.md");
        assert_eq!(json[0]["matched"], "_backup");
        assert_eq!(json[0]["status"]["status"], "removed");
    }

    #[test]
    fn test_cli_requires_rules_for_prune() {
        assert!(Cli::try_parse_from(["mdmerge", "prune", "--dir", "."]).is_err());
    }
}
