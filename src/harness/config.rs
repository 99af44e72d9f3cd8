//! Harness configuration
//!
//! Everything toolchain-specific lives here: where test sources are, what the compiled artifact is
//! called, the four command templates, and the ordered list of cases. Defaults target the Jimple
//! toolchain; a `harness.toml` can override any subset of keys.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::case::TestCase;
use super::executor::CommandSpec;

/// Config file picked up from the harness root when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "harness.toml";

/// Placeholder that expands to the full list of toolchain build sources.
pub const BUILD_SOURCES_PLACEHOLDER: &str = "{build_sources}";

const DEFAULT_CASES: &[&str] = &[
    "test_arithmetic.sim",
    "test_variables.sim",
    "test_comparisons.sim",
    "test_if_statements.sim",
    "test_while_loops.sim",
    "test_blocks.sim",
    "test_functions.sim",
    "test_function_scopes.sim",
    "test_objects.sim",
    "test_object_methods.sim",
];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate test case `{0}`")]
    DuplicateCase(String),

    #[error("test case name must not be empty")]
    EmptyCaseName,

    #[error("test case `{0}` must be a plain file name with a stem")]
    InvalidCaseName(String),

    #[error("command `{0}` has an empty program")]
    EmptyProgram(&'static str),

    #[error("`{0}` must be greater than zero")]
    ZeroTimeout(&'static str),
}

// ============================================================================
// Case list
// ============================================================================

/// Ordered, duplicate-free list of configured test cases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct CaseList {
    cases: Vec<TestCase>,
}

impl CaseList {
    /// Build a case list, rejecting empty, malformed, or repeated names.
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut cases = Vec::new();
        for name in names {
            let case = TestCase::new(name)?;
            if !seen.insert(case.file_name().to_string()) {
                return Err(ConfigError::DuplicateCase(case.file_name().to_string()));
            }
            cases.push(case);
        }
        Ok(Self { cases })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl TryFrom<Vec<String>> for CaseList {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl Default for CaseList {
    fn default() -> Self {
        Self {
            cases: DEFAULT_CASES
                .iter()
                .filter_map(|name| TestCase::new(*name).ok())
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CaseList {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

// ============================================================================
// Command templates
// ============================================================================

/// A program and argument list with `{placeholder}` substitution.
///
/// Recognized placeholders: `{source}`, `{file}`, `{stem}`, `{test_dir}`. An argument that is
/// exactly `{build_sources}` expands into one argument per build source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn render(&self, vars: &TemplateVars) -> CommandSpec {
        let mut spec = CommandSpec::new(vars.substitute(&self.program));
        for arg in &self.args {
            if arg == BUILD_SOURCES_PLACEHOLDER {
                spec.args.extend(vars.build_sources.iter().cloned());
            } else {
                spec.args.push(vars.substitute(arg));
            }
        }
        spec
    }
}

/// Values substituted into a [`CommandTemplate`].
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: Vec<(&'static str, String)>,
    build_sources: Vec<String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.push((key, value.into()));
        self
    }

    pub fn with_build_sources(mut self, sources: Vec<String>) -> Self {
        self.build_sources = sources;
        self
    }

    fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

/// The four external commands the harness drives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSet {
    pub build: CommandTemplate,
    pub interpret: CommandTemplate,
    pub compile: CommandTemplate,
    pub run: CommandTemplate,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            build: CommandTemplate::new(
                "javac",
                ["--enable-preview", "--source", "25", "-cp", "src/main/java", BUILD_SOURCES_PLACEHOLDER],
            ),
            interpret: CommandTemplate::new(
                "java",
                ["--enable-preview", "-cp", "src/main/java", "me.vasan.jimple.Jimple", "-i", "{source}"],
            ),
            compile: CommandTemplate::new(
                "java",
                ["--enable-preview", "-cp", "src/main/java", "me.vasan.jimple.Jimple", "{source}"],
            ),
            run: CommandTemplate::new("java", ["-cp", "src/main/java:{test_dir}", "{stem}"]),
        }
    }
}

/// Files handed to the toolchain build through `{build_sources}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSources {
    pub dir: PathBuf,
    pub extension: String,
}

impl Default for BuildSources {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("src/main/java/me/vasan/jimple"),
            extension: "java".to_string(),
        }
    }
}

impl BuildSources {
    /// List matching files under `root`, relative to `root` and sorted.
    ///
    /// An unreadable directory yields an empty list; the build command then reports the problem.
    pub fn list(&self, root: &Path) -> Vec<String> {
        let mut files = Vec::new();
        let dir = root.join(&self.dir);
        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                        files.push(self.dir.join(entry.file_name()).to_string_lossy().into_owned());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list build sources");
            }
        }
        files.sort();
        files
    }
}

// ============================================================================
// Harness configuration
// ============================================================================

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding one source file per case, relative to the root
    pub test_dir: PathBuf,
    /// Extension of the compiled artifact (without the dot)
    pub artifact_extension: String,
    pub build_timeout_secs: u64,
    pub phase_timeout_secs: u64,
    pub build_sources: BuildSources,
    pub cases: CaseList,
    pub commands: CommandSet,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from("tests"),
            artifact_extension: "class".to_string(),
            build_timeout_secs: 30,
            phase_timeout_secs: 10,
            build_sources: BuildSources::default(),
            cases: CaseList::default(),
            commands: CommandSet::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Resolve the effective config: an explicit path, else `<root>/harness.toml`, else defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = root.join(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            tracing::debug!(path = %implicit.display(), "loading harness config");
            return Self::load(&implicit);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let templates = [
            ("build", &self.commands.build),
            ("interpret", &self.commands.interpret),
            ("compile", &self.commands.compile),
            ("run", &self.commands.run),
        ];
        for (name, template) in templates {
            if template.program.trim().is_empty() {
                return Err(ConfigError::EmptyProgram(name));
            }
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("build_timeout_secs"));
        }
        if self.phase_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("phase_timeout_secs"));
        }
        Ok(())
    }

    pub fn with_cases(mut self, cases: CaseList) -> Self {
        self.cases = cases;
        self
    }

    pub fn with_commands(mut self, commands: CommandSet) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_timeouts(mut self, build_secs: u64, phase_secs: u64) -> Self {
        self.build_timeout_secs = build_secs;
        self.phase_timeout_secs = phase_secs;
        self
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    /// Where the source of `case` lives under `root`.
    pub fn source_path(&self, root: &Path, case: &TestCase) -> PathBuf {
        root.join(&self.test_dir).join(case.file_name())
    }

    /// Where the compiler leaves the artifact for `case` under `root`.
    pub fn artifact_path(&self, root: &Path, case: &TestCase) -> PathBuf {
        root.join(&self.test_dir)
            .join(format!("{}.{}", case.stem(), self.artifact_extension))
    }

    pub fn build_command(&self, root: &Path) -> CommandSpec {
        let vars = self.base_vars().with_build_sources(self.build_sources.list(root));
        self.commands.build.render(&vars)
    }

    pub fn interpret_command(&self, case: &TestCase) -> CommandSpec {
        self.commands.interpret.render(&self.case_vars(case))
    }

    pub fn compile_command(&self, case: &TestCase) -> CommandSpec {
        self.commands.compile.render(&self.case_vars(case))
    }

    pub fn run_command(&self, case: &TestCase) -> CommandSpec {
        self.commands.run.render(&self.case_vars(case))
    }

    fn base_vars(&self) -> TemplateVars {
        TemplateVars::new().set("test_dir", self.test_dir.to_string_lossy())
    }

    fn case_vars(&self, case: &TestCase) -> TemplateVars {
        self.base_vars()
            .set("source", self.test_dir.join(case.file_name()).to_string_lossy())
            .set("file", case.file_name())
            .set("stem", case.stem())
    }
}

/// Find the nearest directory at or above `start` that holds a [`DEFAULT_CONFIG_FILE`].
pub fn find_harness_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    while !dir.join(DEFAULT_CONFIG_FILE).is_file() {
        if !dir.pop() {
            return None;
        }
    }
    Some(dir)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_jimple() {
        let config = HarnessConfig::default();
        assert_eq!(config.test_dir, PathBuf::from("tests"));
        assert_eq!(config.artifact_extension, "class");
        assert_eq!(config.build_timeout(), Duration::from_secs(30));
        assert_eq!(config.phase_timeout(), Duration::from_secs(10));
        assert_eq!(config.cases.len(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_case_order_is_preserved() {
        let config = HarnessConfig::default();
        let names: Vec<_> = config.cases.iter().map(|c| c.file_name()).collect();
        assert_eq!(names.first(), Some(&"test_arithmetic.sim"));
        assert_eq!(names.last(), Some(&"test_object_methods.sim"));
    }

    #[test]
    fn test_duplicate_case_rejected() {
        let err = CaseList::new(["a.sim", "b.sim", "a.sim"]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCase(name) if name == "a.sim"));
    }

    #[test]
    fn test_invalid_case_names_rejected() {
        assert!(matches!(CaseList::new([""]), Err(ConfigError::EmptyCaseName)));
        assert!(matches!(
            CaseList::new(["nested/a.sim"]),
            Err(ConfigError::InvalidCaseName(_))
        ));
    }

    #[test]
    fn test_duplicate_case_in_toml_rejected() {
        let err = HarnessConfig::from_toml_str(r#"cases = ["a.sim", "a.sim"]"#).unwrap_err();
        assert!(err.to_string().contains("duplicate test case `a.sim`"), "{}", err);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HarnessConfig::from_toml_str(
            r#"
phase_timeout_secs = 3
cases = ["one.sim"]

[commands.run]
program = "./run.sh"
args = ["{stem}"]
"#,
        )
        .unwrap();
        assert_eq!(config.phase_timeout_secs, 3);
        assert_eq!(config.build_timeout_secs, 30);
        assert_eq!(config.cases.len(), 1);
        assert_eq!(config.commands.run.program, "./run.sh");
        assert_eq!(config.commands.build, CommandSet::default().build);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            HarnessConfig::from_toml_str("tset_dir = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            HarnessConfig::from_toml_str("phase_timeout_secs = 0"),
            Err(ConfigError::ZeroTimeout("phase_timeout_secs"))
        ));
    }

    #[test]
    fn test_empty_program_rejected() {
        let err = HarnessConfig::from_toml_str("[commands.compile]\nprogram = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyProgram("compile")));
    }

    #[test]
    fn test_case_commands_substitute_placeholders() {
        let config = HarnessConfig::default();
        let case = TestCase::new("test_blocks.sim").unwrap();

        let interpret = config.interpret_command(&case);
        assert_eq!(interpret.program, "java");
        assert_eq!(interpret.args.last().map(String::as_str), Some("tests/test_blocks.sim"));
        assert!(interpret.args.iter().any(|a| a == "-i"));

        let compile = config.compile_command(&case);
        assert!(!compile.args.iter().any(|a| a == "-i"));

        let run = config.run_command(&case);
        assert_eq!(run.args, vec!["-cp", "src/main/java:tests", "test_blocks"]);
    }

    #[test]
    fn test_artifact_path_uses_stem_and_extension() {
        let config = HarnessConfig::default();
        let case = TestCase::new("test_blocks.sim").unwrap();
        assert_eq!(
            config.artifact_path(Path::new("/root"), &case),
            PathBuf::from("/root/tests/test_blocks.class")
        );
    }

    #[test]
    fn test_build_sources_placeholder_expands_sorted() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("src/main/java/me/vasan/jimple");
        fs::create_dir_all(&dir).unwrap();
        for name in ["Parser.java", "Ast.java", "notes.txt"] {
            fs::write(dir.join(name), "").unwrap();
        }

        let build = HarnessConfig::default().build_command(root.path());
        assert_eq!(build.program, "javac");
        let tail: Vec<_> = build.args.iter().rev().take(2).rev().cloned().collect();
        assert_eq!(
            tail,
            vec![
                "src/main/java/me/vasan/jimple/Ast.java".to_string(),
                "src/main/java/me/vasan/jimple/Parser.java".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_build_sources_dir_expands_to_nothing() {
        let root = tempfile::tempdir().unwrap();
        let build = HarnessConfig::default().build_command(root.path());
        assert_eq!(build.args, vec!["--enable-preview", "--source", "25", "-cp", "src/main/java"]);
    }

    #[test]
    fn test_discover_falls_back_to_defaults() {
        let root = tempfile::tempdir().unwrap();
        let config = HarnessConfig::discover(root.path(), None).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_discover_reads_root_config() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(DEFAULT_CONFIG_FILE), "artifact_extension = \"out\"").unwrap();
        let config = HarnessConfig::discover(root.path(), None).unwrap();
        assert_eq!(config.artifact_extension, "out");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = HarnessConfig::load(Path::new("/nonexistent/harness.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_find_harness_root_walks_up_from_nested_dir() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
        let nested = root.path().join("tests/deep");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_harness_root(&nested).as_deref(), Some(root.path()));
        assert_eq!(find_harness_root(root.path()).as_deref(), Some(root.path()));
    }

    #[test]
    fn test_find_harness_root_ignores_directory_named_like_config() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join(DEFAULT_CONFIG_FILE);
        fs::create_dir_all(&nested).unwrap();
        assert_ne!(find_harness_root(&nested).as_deref(), Some(root.path()));
    }
}
