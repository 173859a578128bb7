//! Upstream registry parser invocation.
//!
//! A variant may name a command instead of a catalog file. The command runs
//! in the manifest directory with stdin closed and must print one catalog
//! document on stdout; its stderr passes straight through. Any failure here
//! aborts the run before anything is written.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Run `argv` and parse its stdout as a catalog document.
pub fn run_parser(argv: &[String], cwd: &Path) -> Result<Value> {
    let Some((program, args)) = argv.split_first() else {
        bail!("parser command is empty");
    };
    debug!(program = %program, ?args, "running catalog parser");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("failed to execute parser {program}"))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        bail!("parser {program} returned non-zero exit code {code}");
    }
    if output.stdout.iter().all(u8::is_ascii_whitespace) {
        bail!("parser {program} printed no catalog");
    }

    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("failed to parse catalog printed by {program}"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn parses_parser_stdout() {
        let dir = TempDir::new().unwrap();
        let value = run_parser(&sh(r#"echo '{"edition": "vulkan_core"}'"#), dir.path())
            .expect("parser output parses");
        assert_eq!(value["edition"], "vulkan_core");
    }

    #[test]
    fn runs_in_the_given_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("catalog.json"), r#"{"structures": []}"#).unwrap();
        let value = run_parser(&sh("cat catalog.json"), dir.path()).expect("relative read");
        assert!(value["structures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn failures_are_fatal() {
        let dir = TempDir::new().unwrap();
        let err = run_parser(&sh("exit 3"), dir.path()).expect_err("non-zero exit");
        assert!(err.to_string().contains("exit code 3"));

        let err = run_parser(&sh("true"), dir.path()).expect_err("empty stdout");
        assert!(err.to_string().contains("no catalog"));

        let err = run_parser(&sh("echo not-json"), dir.path()).expect_err("bad json");
        assert!(format!("{err:#}").contains("failed to parse catalog"));

        let err = run_parser(&[], dir.path()).expect_err("empty argv");
        assert!(err.to_string().contains("empty"));
    }
}
