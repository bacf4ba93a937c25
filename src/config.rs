use crate::combiner::DEFAULT_SEPARATOR;
use crate::error::{Error, Result};
use crate::lister::SortOrder;
use crate::pruner::RemovalFilter;
use crate::substitution::SubstitutionRules;
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_FILE: &str = "combined_result.md";
const DEFAULT_SUFFIX: &str = ".md";

/// Which files the substitution stage rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstitutionScope {
    /// Every matching document in the output directory
    #[default]
    OutputDirectory,
    /// Only the freshly combined file
    CombinedOnly,
}

/// Configuration for a pipeline run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directory holding the source documents
    pub input_dir: PathBuf,

    /// Directory receiving the combined document (created if absent)
    pub output_dir: PathBuf,

    /// File name of the combined document inside `output_dir`
    pub output_file: String,

    /// Text written after every combined document
    pub separator: String,

    /// Order in which source documents are combined
    pub sort_order: SortOrder,

    /// Name suffix selecting documents (case-sensitive)
    pub suffix: String,

    /// Ordered find/replace rules
    pub rules: SubstitutionRules,

    /// Files rewritten by the substitution stage
    pub substitution_scope: SubstitutionScope,

    /// Name substrings marking files for deletion
    pub removal_filter: RemovalFilter,

    /// Directory pruned at the end of the run (defaults to `input_dir`)
    pub prune_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mdmerge::{Config, SortOrder};
    ///
    /// let config = Config::builder()
    ///     .input_dir("./notes")
    ///     .output_dir("./out")
    ///     .sort_order(SortOrder::Descending)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Input directory doesn't exist
    /// - Output file name is empty or contains a path separator
    /// - Suffix is empty
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(Error::directory_not_found(&self.input_dir));
        }

        if self.output_file.is_empty() {
            return Err(Error::invalid_config("output file name must not be empty"));
        }

        if Path::new(&self.output_file).file_name() != Some(OsStr::new(&self.output_file)) {
            return Err(Error::invalid_config(format!(
                "output file name must be a bare file name: {}",
                self.output_file
            )));
        }

        if self.suffix.is_empty() {
            return Err(Error::invalid_config("suffix must not be empty"));
        }

        Ok(())
    }

    /// Full path of the combined document.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    /// Directory the prune stage operates on.
    #[must_use]
    pub fn prune_dir(&self) -> &Path {
        self.prune_dir.as_deref().unwrap_or(&self.input_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            sort_order: SortOrder::Ascending,
            suffix: DEFAULT_SUFFIX.to_string(),
            rules: SubstitutionRules::default(),
            substitution_scope: SubstitutionScope::OutputDirectory,
            removal_filter: RemovalFilter::default(),
            prune_dir: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    output_file: Option<String>,
    separator: Option<String>,
    sort_order: Option<SortOrder>,
    suffix: Option<String>,
    rules: Option<SubstitutionRules>,
    substitution_scope: Option<SubstitutionScope>,
    removal_filter: Option<RemovalFilter>,
    prune_dir: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the directory holding the source documents.
    #[must_use]
    pub fn input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(path.into());
        self
    }

    /// Sets the directory for the combined document.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the combined document's file name.
    #[must_use]
    pub fn output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = Some(name.into());
        self
    }

    /// Sets the separator written after each document.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Sets the order in which documents are combined.
    #[must_use]
    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Sets the document suffix, e.g. `".md"`.
    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the substitution rules.
    #[must_use]
    pub fn rules(mut self, rules: SubstitutionRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Sets which files the substitution stage rewrites.
    #[must_use]
    pub fn substitution_scope(mut self, scope: SubstitutionScope) -> Self {
        self.substitution_scope = Some(scope);
        self
    }

    /// Sets the removal filter.
    #[must_use]
    pub fn removal_filter(mut self, filter: RemovalFilter) -> Self {
        self.removal_filter = Some(filter);
        self
    }

    /// Prunes a directory other than the input directory.
    #[must_use]
    pub fn prune_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.prune_dir = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            input_dir: self.input_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("out")),
            output_file: self
                .output_file
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
            separator: self
                .separator
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            sort_order: self.sort_order.unwrap_or_default(),
            suffix: self.suffix.unwrap_or_else(|| DEFAULT_SUFFIX.to_string()),
            rules: self.rules.unwrap_or_default(),
            substitution_scope: self.substitution_scope.unwrap_or_default(),
            removal_filter: self.removal_filter.unwrap_or_default(),
            prune_dir: self.prune_dir,
        };

        config.validate()?;
        Ok(config)
    }
}

/// The JSON rules file.
///
/// ```json
/// {
///   "target_word": ["old_word1", "word_to_remove"],
///   "replacer_word": ["new_word1", ""],
///   "removal_filter": ["_backup", ".tmp"]
/// }
/// ```
///
/// Unknown keys are ignored. `removal_filter` defaults to empty; the word
/// lists are only required when rules are requested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesFile {
    #[serde(skip)]
    source: Option<PathBuf>,

    #[serde(default)]
    removal_filter: RemovalFilter,

    target_word: Option<Vec<String>>,

    replacer_word: Option<Vec<String>>,
}

impl RulesFile {
    /// Reads and parses a rules file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read and
    /// [`Error::ConfigMalformed`] if it is not valid JSON of the expected shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
        let mut file = Self::parse(&content)
            .map_err(|e| Error::malformed(Some(path.to_path_buf()), e.to_string()))?;
        file.source = Some(path.to_path_buf());
        tracing::debug!("Loaded rules from {}", path.display());
        Ok(file)
    }

    /// Parses rules from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed input.
    pub fn parse(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builds the substitution rules from `target_word` and `replacer_word`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigMalformed`] if either key is missing and
    /// [`Error::RuleCountMismatch`] if their lengths differ.
    pub fn substitution_rules(&self) -> Result<SubstitutionRules> {
        let targets = self.required("target_word", self.target_word.as_deref())?;
        let replacements = self.required("replacer_word", self.replacer_word.as_deref())?;
        SubstitutionRules::new(targets, replacements).map_err(|e| match e {
            Error::ConfigMalformed { path: None, message } => {
                Error::malformed(self.source.clone(), message)
            }
            other => other,
        })
    }

    /// The removal filter (empty when the key is absent).
    #[must_use]
    pub fn removal_filter(&self) -> &RemovalFilter {
        &self.removal_filter
    }

    fn required<'a>(&self, key: &str, value: Option<&'a [String]>) -> Result<&'a [String]> {
        value.ok_or_else(|| {
            Error::malformed(self.source.clone(), format!("missing required key '{key}'"))
        })
    }
}
