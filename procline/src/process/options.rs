//! Launch parameters for a [`Handler`](super::Handler).
//!
//! Options are built in code with the builder methods, or loaded from a
//! JSON file:
//!
//! ```json
//! {
//!   "program": "python3",
//!   "args": ["-u", "engine.py"],
//!   "terminator": "\n",
//!   "working_dir": "/srv/engine",
//!   "env": { "ENGINE_MODE": "batch" }
//! }
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Configuration for the child process a handler manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerOptions {
    /// The program to execute.
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Suffix appended to every message written to the child's stdin.
    ///
    /// `None` sends text exactly as given.
    pub terminator: Option<String>,

    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,

    /// Environment variables to set (merged with current env).
    pub env: HashMap<String, String>,
}

impl HandlerOptions {
    /// Create new options for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the message terminator.
    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Parse options from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// The outgoing bytes for one message: `text` plus the terminator.
    pub(crate) fn frame(&self, text: &str) -> String {
        match self.terminator {
            Some(ref terminator) => {
                let mut framed = String::with_capacity(text.len() + terminator.len());
                framed.push_str(text);
                framed.push_str(terminator);
                framed
            }
            None => text.to_owned(),
        }
    }

    /// Build the command: stdin and stdout piped, stderr inherited.
    pub(crate) fn command(&self) -> Result<Command> {
        if self.program.is_empty() {
            return Err(Error::Config("no program configured".to_string()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        // The child outlives a dropped handler unless terminated explicitly.
        cmd.kill_on_drop(false);

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder() {
        let options = HandlerOptions::new("engine")
            .arg("--uci")
            .args(["-q", "--threads=2"])
            .terminator("\n")
            .working_dir("/tmp")
            .env("ENGINE_MODE", "batch");

        assert_eq!(options.program, "engine");
        assert_eq!(options.args, vec!["--uci", "-q", "--threads=2"]);
        assert_eq!(options.terminator.as_deref(), Some("\n"));
        assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(options.env.get("ENGINE_MODE"), Some(&"batch".to_string()));
    }

    #[test]
    fn test_frame_appends_terminator() {
        let raw = HandlerOptions::new("cat");
        assert_eq!(raw.frame("ping"), "ping");

        let framed = HandlerOptions::new("cat").terminator("\r\n");
        assert_eq!(framed.frame("ping"), "ping\r\n");
        assert_eq!(framed.frame(""), "\r\n");
    }

    #[test]
    fn test_from_json_str() {
        let options = HandlerOptions::from_json_str(
            r#"{"program": "sh", "args": ["-c", "cat"], "terminator": "\n"}"#,
        )
        .unwrap();

        assert_eq!(
            options,
            HandlerOptions::new("sh").args(["-c", "cat"]).terminator("\n")
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = HandlerOptions::from_json_str(r#"{"program": "sh", "retries": 3}"#).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("retries")));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"program": "cat", "env": {{"A": "1"}}}}"#).unwrap();

        let options = HandlerOptions::from_json_file(file.path()).unwrap();
        assert_eq!(options.program, "cat");
        assert_eq!(options.env.get("A"), Some(&"1".to_string()));
        assert!(options.terminator.is_none());
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HandlerOptions::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("absent.json")));
    }

    #[test]
    fn test_command_requires_program() {
        let err = HandlerOptions::default().command().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
