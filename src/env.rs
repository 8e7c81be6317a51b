use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: variables visible to commands and to `$(NAME)` option defaults.
/// - `current_dir`: the directory redirection targets and file arguments resolve against.
/// - `should_exit`: a flag that the interactive loop checks to know when to terminate.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: stdenv::vars().collect(),
            current_dir,
            should_exit: false,
        }
    }

    /// An environment with no variables, rooted at `current_dir`.
    pub fn empty(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: current_dir.into(),
            should_exit: false,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Resolve `path` against `current_dir` unless it is already absolute.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    /// Expand a default value.
    ///
    /// Literal text is returned as is. `$(NAME)` is replaced by the variable's
    /// value; `None` means the variable is unset and the caller decides what
    /// to do with the placeholder.
    pub fn expand_placeholder(&self, raw: &str) -> Option<String> {
        match placeholder_name(raw) {
            Some(name) => self.get_var(name),
            None => Some(raw.to_string()),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder_name(raw: &str) -> Option<&str> {
    raw.strip_prefix("$(")
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::env as stdenv;
    use std::path::PathBuf;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::empty(stdenv::current_dir().unwrap());

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_resolve_path() {
        let env = Environment::empty("/work");
        assert_eq!(env.resolve_path("out.txt"), PathBuf::from("/work/out.txt"));
        assert_eq!(env.resolve_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_expand_placeholder() {
        let mut env = Environment::empty("/");
        env.set_var("AESH_TEST_HOST", "example.org");

        assert_eq!(env.expand_placeholder("literal"), Some("literal".into()));
        assert_eq!(
            env.expand_placeholder("$(AESH_TEST_HOST)"),
            Some("example.org".into())
        );
        assert_eq!(env.expand_placeholder("$(AESH_SURELY_UNSET_VAR_987)"), None);
        // not a complete placeholder: taken literally
        assert_eq!(env.expand_placeholder("$(open"), Some("$(open".into()));
    }
}
