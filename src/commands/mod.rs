//! Subcommands shared by the `yagpt` and `yask` binaries.

use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::config::{ProfileConfig, Settings, env_parsed, env_value};

pub mod ask;
pub mod config;
pub mod embed;

pub(crate) const MODEL_ENV: &str = "YG_MODEL";
pub(crate) const SYSTEM_ENV: &str = "YG_SYSTEM";
pub(crate) const TEMPERATURE_ENV: &str = "YG_TEMPERATURE";
pub(crate) const MAX_TOKENS_ENV: &str = "YG_MAX_TOKENS";
pub(crate) const TIMEOUT_ENV: &str = "YG_TIMEOUT";
pub(crate) const SLEEP_MS_ENV: &str = "YG_SLEEP_MS";
pub(crate) const BASE_URL_ENV: &str = "YG_BASE_URL";

/// CLI value, then environment, then profile.
pub(crate) fn first_of<T>(cli: Option<T>, env: Option<T>, profile: Option<T>) -> Option<T> {
    cli.or(env).or(profile)
}

/// Credentials with CLI > environment > profile precedence; blank values are skipped.
pub(crate) fn resolve_settings(cli: Settings, profile: &ProfileConfig) -> Settings {
    cli.without_blanks()
        .or(Settings::from_env())
        .or(Settings::from_profile(profile).without_blanks())
}

pub(crate) fn resolve_base_url(cli: Option<String>, profile: &ProfileConfig) -> Option<String> {
    first_of(cli, env_value(BASE_URL_ENV), profile.base_url.clone())
}

pub(crate) fn resolve_timeout(
    cli: Option<u64>,
    profile: &ProfileConfig,
) -> Result<Option<Duration>, String> {
    let secs = first_of(cli, env_parsed(TIMEOUT_ENV)?, profile.timeout);
    match secs {
        Some(0) => Err("timeout must be greater than zero".to_string()),
        other => Ok(other.map(Duration::from_secs)),
    }
}

/// Argument text, or all of stdin when no argument is given.
pub(crate) fn read_prompt(argument: Option<String>) -> Result<String, String> {
    if let Some(prompt) = argument {
        return Ok(prompt);
    }

    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(NO_PROMPT.to_string());
    }
    let mut buffer = String::new();
    stdin
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;

    let prompt = buffer.trim_end_matches(['\r', '\n']).to_string();
    if prompt.trim().is_empty() {
        return Err(NO_PROMPT.to_string());
    }
    Ok(prompt)
}

/// Non-empty lines of stdin, for commands taking many inputs.
pub(crate) fn read_lines() -> Result<Vec<String>, String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    stdin
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read stdin: {err}"))?;
    Ok(buffer
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

const NO_PROMPT: &str = "No prompt provided. Pass it as an argument or via stdin.";

/// File stem of the running binary, e.g. `yask` or `yagpt`.
pub(crate) fn program_name() -> String {
    env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Prints a fatal error, highlighting the prefix on a terminal.
pub fn report_error(err: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{} {err}", "error:".red().bold());
    } else {
        eprintln!("error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::first_of;

    #[test]
    fn first_of_prefers_cli_then_env() {
        assert_eq!(first_of(Some(1), Some(2), Some(3)), Some(1));
        assert_eq!(first_of(None, Some(2), Some(3)), Some(2));
        assert_eq!(first_of(None, None, Some(3)), Some(3));
        assert_eq!(first_of::<u8>(None, None, None), None);
    }
}
