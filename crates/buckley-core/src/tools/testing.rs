//! Test runner tool
//!
//! Detects the project's test framework from marker files, runs it, and
//! scans the output with fixed regexes for pass/fail/skip counters. The
//! counters are best effort; success is decided by the exit code alone.

use regex::Regex;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext};
use crate::params::{bool_param, int_param, string_param};
use crate::result::{mark_truncated, ToolResult};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Output size above which test results are abridged for display.
const ABRIDGE_OUTPUT_BYTES: usize = 5000;
const DISPLAY_OUTPUT_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framework {
    Go,
    Jest,
    Pytest,
    Cargo,
}

impl Framework {
    fn as_str(&self) -> &'static str {
        match self {
            Framework::Go => "go",
            Framework::Jest => "jest",
            Framework::Pytest => "pytest",
            Framework::Cargo => "cargo",
        }
    }
}

/// Probe `dir` for a test framework, marker files first, then test-file
/// naming conventions.
pub(crate) fn detect_framework(dir: &Path) -> Option<Framework> {
    if dir.join("go.mod").is_file() {
        return Some(Framework::Go);
    }
    if dir.join("package.json").is_file() {
        return Some(Framework::Jest);
    }
    if dir.join("pytest.ini").is_file() || dir.join("setup.py").is_file() {
        return Some(Framework::Pytest);
    }
    if dir.join("Cargo.toml").is_file() {
        return Some(Framework::Cargo);
    }

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with("_test.go") {
            return Some(Framework::Go);
        }
        if name.starts_with("test_") && name.ends_with(".py") || name.ends_with("_test.py") {
            return Some(Framework::Pytest);
        }
        if name.ends_with(".test.js") || name.ends_with(".test.ts") {
            return Some(Framework::Jest);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TestCounts {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub(crate) fn parse_go_results(output: &str) -> TestCounts {
    TestCounts {
        passed: output.matches("--- PASS").count() as u64,
        failed: output.matches("--- FAIL").count() as u64,
        skipped: output.matches("--- SKIP").count() as u64,
    }
}

/// Jest summary line, e.g. `Tests: 1 failed, 2 skipped, 3 passed, 6 total`.
/// Either group may be absent; absent captures read as zero.
pub(crate) fn parse_jest_results(output: &str) -> TestCounts {
    let re = Regex::new(
        r"Tests:\s*(?:(\d+) failed, )?(?:(\d+) skipped, )?(?:(\d+) passed, )?\d+ total",
    )
    .expect("static regex");
    let Some(captures) = re.captures(output) else {
        return TestCounts::default();
    };
    let group = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    TestCounts {
        failed: group(1),
        skipped: group(2),
        passed: group(3),
    }
}

pub(crate) fn parse_pytest_results(output: &str) -> TestCounts {
    let count = |suffix: &str| {
        Regex::new(&format!(r"(\d+) {}", suffix))
            .expect("static regex")
            .captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    TestCounts {
        passed: count("passed"),
        failed: count("failed"),
        skipped: count("skipped"),
    }
}

/// Cargo prints one `test result:` line per compilation unit; sum them.
pub(crate) fn parse_cargo_results(output: &str) -> TestCounts {
    let re = Regex::new(r"(\d+) passed; (\d+) failed; (\d+) ignored").expect("static regex");
    let mut counts = TestCounts::default();
    for captures in re.captures_iter(output) {
        let group = |i: usize| {
            captures
                .get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        counts.passed += group(1);
        counts.failed += group(2);
        counts.skipped += group(3);
    }
    counts
}

/// Tool detecting and running the project's test suite
pub struct RunTests {
    options: ToolOptions,
}

impl RunTests {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for RunTests {
    fn name(&self) -> &str {
        "run_tests"
    }

    fn description(&self) -> &str {
        "Detect the test framework (go, jest, pytest, cargo) and run the \
         tests, reporting pass/fail/skip counts."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to test (default: workdir root)"
                },
                "pattern": {
                    "type": "string",
                    "description": "Test name filter, passed to the framework"
                },
                "coverage": {
                    "type": "boolean",
                    "description": "Collect coverage where supported",
                    "default": false
                },
                "verbose": {
                    "type": "boolean",
                    "description": "Verbose test output",
                    "default": false
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Wall-clock bound for the test run"
                }
            },
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let raw_path = string_param(&params, "path");
            let pattern = string_param(&params, "pattern");
            let coverage = bool_param(&params, "coverage", false);
            let verbose = bool_param(&params, "verbose", false);
            let timeout_seconds = int_param(&params, "timeout_seconds", 0);

            let dir = if raw_path.is_empty() {
                if self.options.workdir.as_os_str().is_empty() {
                    std::env::current_dir().map_err(ToolError::Io)?
                } else {
                    self.options.workdir.clone()
                }
            } else {
                resolve(&self.options.workdir, &raw_path)?
            };

            let Some(framework) = detect_framework(&dir) else {
                return Err(ToolError::NotFound(format!(
                    "no test framework detected in {}",
                    dir.display()
                )));
            };

            let (program, args): (&str, Vec<String>) = match framework {
                Framework::Go => {
                    let mut args = vec!["test".to_string(), "./...".to_string()];
                    if !pattern.is_empty() {
                        args.push("-run".to_string());
                        args.push(pattern.clone());
                    }
                    if coverage {
                        args.push("-cover".to_string());
                    }
                    if verbose {
                        args.push("-v".to_string());
                    }
                    ("go", args)
                }
                Framework::Jest => {
                    let mut args = vec!["jest".to_string(), "--colors=false".to_string()];
                    if !pattern.is_empty() {
                        args.push("-t".to_string());
                        args.push(pattern.clone());
                    }
                    if coverage {
                        args.push("--coverage".to_string());
                    }
                    if verbose {
                        args.push("--verbose".to_string());
                    }
                    ("npx", args)
                }
                Framework::Pytest => {
                    let mut args = Vec::new();
                    if !pattern.is_empty() {
                        args.push("-k".to_string());
                        args.push(pattern.clone());
                    }
                    if coverage {
                        args.push("--cov".to_string());
                    }
                    if verbose {
                        args.push("-v".to_string());
                    }
                    ("pytest", args)
                }
                Framework::Cargo => {
                    let mut args = vec!["test".to_string()];
                    if !pattern.is_empty() {
                        args.push(pattern.clone());
                    }
                    if verbose {
                        args.push("--verbose".to_string());
                    }
                    ("cargo", args)
                }
            };

            if look_path(program).is_none() {
                return Err(ToolError::Unavailable(program.into()));
            }

            let mut exec_options = self.options.exec_options();
            exec_options.workdir = dir.clone();
            if timeout_seconds > 0 {
                exec_options.max_exec_time = Some(Duration::from_secs(timeout_seconds as u64));
            }

            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let outcome = run_program(&ctx, &exec_options, program, &arg_refs).await?;

            let combined = if outcome.stderr.is_empty() {
                outcome.stdout.clone()
            } else {
                format!("{}\n{}", outcome.stdout, outcome.stderr)
            };
            let counts = match framework {
                Framework::Go => parse_go_results(&combined),
                Framework::Jest => parse_jest_results(&combined),
                Framework::Pytest => parse_pytest_results(&combined),
                Framework::Cargo => parse_cargo_results(&combined),
            };

            let mut result = if outcome.success() {
                ToolResult::ok()
            } else {
                ToolResult::failure(format!(
                    "{} tests exited with {}",
                    framework.as_str(),
                    outcome.exit_code
                ))
            };
            result = result
                .with("framework", framework.as_str())
                .with("output", combined.clone())
                .with("exit_code", outcome.exit_code)
                .with("passed", counts.passed)
                .with("failed", counts.failed)
                .with("skipped", counts.skipped);
            mark_truncated(&mut result, "stdout", outcome.stdout_truncated);

            if combined.len() > ABRIDGE_OUTPUT_BYTES {
                result.should_abridge = true;
                let shown: Vec<&str> = combined.lines().take(DISPLAY_OUTPUT_LINES).collect();
                let total = combined.lines().count();
                result.display_data.insert(
                    "output".to_string(),
                    format!(
                        "{}\n... ({} more lines, {} total)",
                        shown.join("\n"),
                        total.saturating_sub(DISPLAY_OUTPUT_LINES),
                        total
                    )
                    .into(),
                );
                result.display_data.insert(
                    "summary".to_string(),
                    format!(
                        "{} passed, {} failed, {} skipped",
                        counts.passed, counts.failed, counts.skipped
                    )
                    .into(),
                );
            }
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_framework_markers() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_framework(dir.path()), None);

        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Cargo));

        std::fs::write(dir.path().join("pytest.ini"), "").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Pytest));

        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Jest));

        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Go));
    }

    #[test]
    fn test_detect_framework_by_test_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test_thing.py"), "").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Pytest));
    }

    #[test]
    fn test_parse_go() {
        let output = "--- PASS: TestA\n--- PASS: TestB\n--- FAIL: TestC\n--- SKIP: TestD\n";
        let counts = parse_go_results(output);
        assert_eq!(counts.passed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 1);
    }

    #[test]
    fn test_parse_jest_full_line() {
        let counts = parse_jest_results("Tests: 1 failed, 2 skipped, 3 passed, 6 total\n");
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 2);
        assert_eq!(counts.passed, 3);
    }

    #[test]
    fn test_parse_jest_absent_groups_read_zero() {
        let counts = parse_jest_results("Tests: 4 passed, 4 total\n");
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.passed, 4);

        let counts = parse_jest_results("Tests: 2 failed, 2 total\n");
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.passed, 0);

        let counts = parse_jest_results("no summary here");
        assert_eq!(counts, TestCounts::default());
    }

    #[test]
    fn test_parse_pytest() {
        let counts = parse_pytest_results("===== 3 passed, 1 failed, 2 skipped in 0.5s =====");
        assert_eq!(counts.passed, 3);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 2);
    }

    #[test]
    fn test_parse_cargo_sums_units() {
        let output = "test result: ok. 5 passed; 0 failed; 1 ignored; 0 measured\n\
                      test result: ok. 2 passed; 1 failed; 0 ignored; 0 measured\n";
        let counts = parse_cargo_results(output);
        assert_eq!(counts.passed, 7);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 1);
    }

    #[tokio::test]
    async fn test_no_framework_detected() {
        let dir = TempDir::new().unwrap();
        let err = RunTests::new(ToolOptions::new(dir.path()))
            .execute(json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no test framework"));
    }
}
