use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Run a command and capture stdout, failing on a non-zero exit
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    run_capture_env(cmd, args, &[])
}

/// Like [`run_capture`] with extra environment variables
pub fn run_capture_env(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
    log::debug!("Running: {} {}", cmd, args.join(" "));
    let output = Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {} {}: {}", cmd, args.join(" "), stderr.trim())
    }
}

/// Run a command feeding `input` on stdin and capture stdout
///
/// Used for SQL so statements (and passwords in them) never show up in the
/// process list.
pub fn run_with_input(
    cmd: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    input: &str,
) -> Result<String> {
    log::debug!("Running: {} {} (with stdin)", cmd, args.join(" "));
    let mut child = Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("Failed to write to {cmd}"))?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {cmd}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}: {}", cmd, stderr.trim())
    }
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    run_quiet_env(cmd, args, &[])
}

/// Like [`run_quiet`] with extra environment variables
pub fn run_quiet_env(cmd: &str, args: &[&str], envs: &[(&str, &str)]) -> bool {
    Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
