//! CLI argument definitions.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use procline::HandlerOptions;

/// Procline - relay lines between your terminal and a child process
#[derive(Parser, Debug)]
#[command(name = "procline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Load handler options from a JSON file (flags override it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Terminator appended to each message; escapes like \n and \r\n are decoded
    #[arg(short, long)]
    pub terminator: Option<String>,

    /// Send lines without any terminator
    #[arg(long, conflicts_with = "terminator")]
    pub raw: bool,

    /// Seconds to wait for a reply after each message
    #[arg(short = 'w', long, default_value = "2", value_parser = parse_seconds)]
    pub timeout: Duration,

    /// Working directory for the child
    #[arg(short = 'C', long = "dir")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variable for the child (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Program to launch, followed by its arguments
    #[arg(
        value_name = "PROGRAM",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "config"
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Merge the config file (if any) with command-line flags.
    pub fn handler_options(&self) -> procline::Result<HandlerOptions> {
        let mut options = match self.config {
            Some(ref path) => HandlerOptions::from_json_file(path)?,
            None => HandlerOptions::default(),
        };

        if let Some((program, args)) = self.command.split_first() {
            options.program.clone_from(program);
            options.args = args.to_vec();
        }

        if self.raw {
            options.terminator = None;
        } else if let Some(ref terminator) = self.terminator {
            options.terminator = Some(decode_escapes(terminator));
        } else if self.config.is_none() {
            options.terminator = Some("\n".to_string());
        }

        if let Some(ref dir) = self.working_dir {
            options.working_dir = Some(dir.clone());
        }

        for (key, value) in &self.env {
            options.env.insert(key.clone(), value.clone());
        }

        Ok(options)
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout {s}: {e}"))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Decode `\n`, `\r`, `\t`, `\0` and `\\`. Unknown escapes are kept verbatim.
pub fn decode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
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
