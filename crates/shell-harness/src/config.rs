//! Configuration for a test run.
//!
//! Settings are layered, later layers winning: built-in defaults, then an
//! optional TOML file, then `HARNESS_*` environment variables, then whatever
//! the test script sets with the builder methods.
//!
//! ```toml
//! command = "./cush"
//! args = ["--no-rc"]
//! timeout = 2.5
//! prompt_pattern = "cush> "
//!
//! [env]
//! LANG = "C"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harness_pty::{DEFAULT_GRACE_PERIOD, PtyConfig};
use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_MAX_SIZE;
use crate::error::{HarnessError, Result};

/// Default expectation timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default prompt pattern: a common prompt character followed by a space.
pub const DEFAULT_PROMPT: &str = "[$#>%] ";

/// Default TERM value. A dumb terminal keeps shells from emitting
/// colour and cursor-movement sequences into the output being matched.
pub const DEFAULT_TERM: &str = "dumb";

/// Default terminal width.
pub const DEFAULT_TERMINAL_WIDTH: u16 = 80;

/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

/// Environment variable overriding the shell command.
pub const ENV_SHELL: &str = "HARNESS_SHELL";

/// Environment variable overriding the default timeout, in seconds.
pub const ENV_TIMEOUT: &str = "HARNESS_TIMEOUT";

/// Environment variable overriding the prompt pattern.
pub const ENV_PROMPT: &str = "HARNESS_PROMPT";

/// Environment variable overriding the working directory.
pub const ENV_WORKDIR: &str = "HARNESS_WORKDIR";

/// Configuration for one shell under test.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// The command to execute.
    pub command: String,

    /// Command arguments.
    pub args: Vec<String>,

    /// Environment variables to set.
    pub env: HashMap<String, String>,

    /// Whether to inherit the parent environment.
    pub inherit_env: bool,

    /// Working directory for the shell.
    pub working_dir: Option<PathBuf>,

    /// Terminal dimensions (width, height).
    pub dimensions: (u16, u16),

    /// Default expectation timeout.
    pub timeout: Duration,

    /// Regex identifying the shell's ready prompt.
    pub prompt_pattern: String,

    /// Line terminator appended by `sendline`.
    pub line_ending: LineEnding,

    /// Maximum retained output before consumed history is discarded.
    pub max_buffer: usize,

    /// How long termination waits for the shell to exit after SIGHUP.
    pub grace_period: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut env = HashMap::new();
        env.insert("TERM".to_string(), DEFAULT_TERM.to_string());

        Self {
            command: String::new(),
            args: Vec::new(),
            env,
            inherit_env: true,
            working_dir: None,
            dimensions: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
            timeout: DEFAULT_TIMEOUT,
            prompt_pattern: DEFAULT_PROMPT.to_string(),
            line_ending: LineEnding::default(),
            max_buffer: DEFAULT_MAX_SIZE,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl HarnessConfig {
    /// Create a configuration for the given command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the command to execute.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the command arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set whether to inherit the parent environment.
    #[must_use]
    pub const fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Set the terminal dimensions.
    #[must_use]
    pub const fn dimensions(mut self, width: u16, height: u16) -> Self {
        self.dimensions = (width, height);
        self
    }

    /// Set the default expectation timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the prompt pattern.
    #[must_use]
    pub fn prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.prompt_pattern = pattern.into();
        self
    }

    /// Set the line ending.
    #[must_use]
    pub const fn line_ending(mut self, ending: LineEnding) -> Self {
        self.line_ending = ending;
        self
    }

    /// Set the maximum retained output size.
    #[must_use]
    pub const fn max_buffer(mut self, size: usize) -> Self {
        self.max_buffer = size;
        self
    }

    /// Set the termination grace period.
    #[must_use]
    pub const fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Load a configuration from a TOML file over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read and
    /// [`HarnessError::Config`] if it is not valid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::io_context(format!("reading config file {}", path.display()), e)
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| HarnessError::config(format!("{}: {e}", path.display())))
    }

    /// Parse a TOML configuration over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for malformed TOML, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| HarnessError::config(e.to_string()))?;
        Self::default().merge_file(file)
    }

    fn merge_file(mut self, file: FileConfig) -> Result<Self> {
        if let Some(command) = file.command {
            self.command = command;
        }
        if let Some(args) = file.args {
            self.args = args;
        }
        if let Some(env) = file.env {
            self.env.extend(env);
        }
        if let Some(inherit) = file.inherit_env {
            self.inherit_env = inherit;
        }
        if let Some(dir) = file.working_dir {
            self.working_dir = Some(dir);
        }
        if let Some(dimensions) = file.dimensions {
            self.dimensions = dimensions;
        }
        if let Some(secs) = file.timeout {
            self.timeout = secs_to_duration("timeout", secs)?;
        }
        if let Some(prompt) = file.prompt_pattern {
            self.prompt_pattern = prompt;
        }
        if let Some(ending) = file.line_ending {
            self.line_ending = ending;
        }
        if let Some(size) = file.max_buffer {
            self.max_buffer = size;
        }
        if let Some(secs) = file.grace_period {
            self.grace_period = secs_to_duration("grace_period", secs)?;
        }
        Ok(self)
    }

    /// Apply `HARNESS_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if `HARNESS_TIMEOUT` is not a
    /// non-negative number of seconds.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `HARNESS_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`with_env`](Self::with_env).
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup(ENV_SHELL).filter(|s| !s.is_empty()) {
            self.command = shell;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                HarnessError::config(format!("{ENV_TIMEOUT}={raw:?} is not a number of seconds"))
            })?;
            self.timeout = secs_to_duration(ENV_TIMEOUT, secs)?;
        }
        if let Some(prompt) = lookup(ENV_PROMPT).filter(|s| !s.is_empty()) {
            self.prompt_pattern = prompt;
        }
        if let Some(dir) = lookup(ENV_WORKDIR).filter(|s| !s.is_empty()) {
            self.working_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Defaults, then `path` if given, then the environment.
    ///
    /// # Errors
    ///
    /// Any error from [`from_file`](Self::from_file) or
    /// [`with_env`](Self::with_env).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env()
    }

    /// Check that the configuration can start a shell.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if no command is set or the
    /// terminal has a zero dimension.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(HarnessError::config(format!(
                "no shell command configured (set it explicitly or via {ENV_SHELL})"
            )));
        }
        if self.dimensions.0 == 0 || self.dimensions.1 == 0 {
            return Err(HarnessError::config(format!(
                "terminal dimensions must be non-zero, got {}x{}",
                self.dimensions.0, self.dimensions.1
            )));
        }
        Ok(())
    }

    /// The PTY-level configuration for spawning this shell.
    #[must_use]
    pub fn to_pty_config(&self) -> PtyConfig {
        let mut builder = PtyConfig::builder()
            .window_size(self.dimensions.0, self.dimensions.1)
            .grace_period(self.grace_period);
        if !self.inherit_env {
            builder = builder.env_clear();
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.working_directory(dir);
        }
        builder.build()
    }
}

fn secs_to_duration(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        HarnessError::config(format!(
            "{field} must be a non-negative number of seconds, got {secs}"
        ))
    })
}

/// The on-disk form: every key optional, unknown keys rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    command: Option<String>,
    args: Option<Vec<String>>,
    env: Option<HashMap<String, String>>,
    inherit_env: Option<bool>,
    working_dir: Option<PathBuf>,
    dimensions: Option<(u16, u16)>,
    timeout: Option<f64>,
    prompt_pattern: Option<String>,
    line_ending: Option<LineEnding>,
    max_buffer: Option<usize>,
    grace_period: Option<f64>,
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Classic Mac line ending (CR).
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.prompt_pattern, "[$#>%] ");
        assert_eq!(config.env.get("TERM").map(String::as_str), Some("dumb"));
        assert_eq!(config.dimensions, (80, 24));
        assert_eq!(config.line_ending.as_str(), "\n");
        assert!(config.inherit_env);
    }

    #[test]
    fn builder_methods() {
        let config = HarnessConfig::new("/bin/sh")
            .args(["-i"])
            .arg("-x")
            .env("LANG", "C")
            .timeout(Duration::from_millis(250))
            .prompt_pattern("cush> ")
            .line_ending(LineEnding::CrLf);
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.args, vec!["-i", "-x"]);
        assert_eq!(config.env.len(), 2);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.line_ending.as_bytes(), b"\r\n");
    }

    #[test]
    fn toml_layer_overrides_defaults() {
        let config = HarnessConfig::from_toml_str(
            r#"
            command = "./cush"
            timeout = 2.5
            line_ending = "crlf"
            dimensions = [120, 40]

            [env]
            LANG = "C"
            "#,
        )
        .unwrap();
        assert_eq!(config.command, "./cush");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.dimensions, (120, 40));
        // TERM default survives a partial [env] table
        assert_eq!(config.env.get("TERM").map(String::as_str), Some("dumb"));
        assert_eq!(config.env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(config.prompt_pattern, DEFAULT_PROMPT);
    }

    #[test]
    fn toml_rejects_unknown_keys_and_bad_values() {
        let err = HarnessConfig::from_toml_str("shell = \"sh\"").unwrap_err();
        assert!(matches!(err, HarnessError::Config { .. }));

        let err = HarnessConfig::from_toml_str("timeout = -1.0").unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        std::fs::write(&path, "command = \"/bin/sh\"\nargs = [\"-i\"]\n").unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.args, vec!["-i"]);

        let missing = HarnessConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, HarnessError::Io { .. }));
    }

    #[test]
    fn env_layer_overrides_file_layer() {
        let config = HarnessConfig::from_toml_str("command = \"./cush\"\ntimeout = 3")
            .unwrap()
            .with_env_from(lookup(&[
                ("HARNESS_SHELL", "/bin/sh"),
                ("HARNESS_TIMEOUT", "0.5"),
                ("HARNESS_PROMPT", r"\$ "),
                ("HARNESS_WORKDIR", "/tmp"),
            ]))
            .unwrap();
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.prompt_pattern, r"\$ ");
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = HarnessConfig::new("./cush")
            .with_env_from(lookup(&[("HARNESS_SHELL", ""), ("HARNESS_PROMPT", "")]))
            .unwrap();
        assert_eq!(config.command, "./cush");
        assert_eq!(config.prompt_pattern, DEFAULT_PROMPT);
    }

    #[test]
    fn bad_env_timeout_is_a_config_error() {
        let err = HarnessConfig::default()
            .with_env_from(lookup(&[("HARNESS_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("HARNESS_TIMEOUT"));
    }

    #[test]
    fn validate_requires_command() {
        assert!(HarnessConfig::default().validate().is_err());
        assert!(HarnessConfig::new("  ").validate().is_err());
        assert!(HarnessConfig::new("sh").dimensions(0, 24).validate().is_err());
        assert!(HarnessConfig::new("sh").validate().is_ok());
    }

    #[test]
    fn pty_config_carries_environment() {
        let pty = HarnessConfig::new("sh")
            .inherit_env(false)
            .env("LANG", "C")
            .dimensions(100, 30)
            .working_dir("/tmp")
            .to_pty_config();
        let env = pty.effective_env();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get(std::ffi::OsStr::new("TERM")).unwrap(), "dumb");
        assert_eq!(pty.window_size, (100, 30));
        assert_eq!(pty.working_directory, Some(PathBuf::from("/tmp")));
    }
}
