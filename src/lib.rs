//! # mdmerge
//!
//! Combines a directory of Markdown documents into one file, applies an
//! ordered list of literal find/replace rules, and prunes files whose names
//! contain configured substrings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mdmerge::{Config, Pipeline, RulesFile};
//!
//! # fn main() -> anyhow::Result<()> {
//! let rules = RulesFile::load("config.json")?;
//!
//! let config = Config::builder()
//!     .input_dir("./notes")
//!     .output_dir("./out")
//!     .rules(rules.substitution_rules()?)
//!     .removal_filter(rules.removal_filter().clone())
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Lister**: finds `*.md` files and orders them by name
//! 2. **Combiner**: concatenates them with a separator after each document
//! 3. **Substitution**: rewrites text with the rules, in rule order
//! 4. **Pruner**: deletes files whose name contains a filter substring
//!
//! Each stage is usable on its own. File-level failures are collected and
//! reported; only failures that leave a stage without input or output
//! abort a run.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod combiner;
mod config;
mod error;
mod lister;
mod pipeline;
mod pruner;
mod substitution;

pub use combiner::{combine, combine_entries, CombineReport, DEFAULT_SEPARATOR};
pub use config::{Config, ConfigBuilder, RulesFile, SubstitutionScope};
pub use error::{Error, Result};
pub use lister::{list_files, list_inputs, FileEntry, SortOrder};
pub use pipeline::{Pipeline, PipelineStats};
pub use pruner::{prune, PruneOutcome, RemovalFilter, RemovalStatus};
pub use substitution::{
    apply, process_all, process_file, BatchReport, FileOutcome, Substitution, SubstitutionRule,
    SubstitutionRules,
};

/// Runs the complete pipeline with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Input directory doesn't exist or holds no documents
/// - The combined output cannot be written
/// - The prune directory doesn't exist
///
/// # Examples
///
/// ```no_run
/// use mdmerge::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .input_dir(".")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
