//! End-to-end tests driving the `ks` binary

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// `ks` invocation rooted in a sandbox with `--store vc --dir data`
struct KsCommand {
    root: PathBuf,
}

impl KsCommand {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn execute(&self, args: &[&str]) -> Result<Output> {
        Command::new(env!("CARGO_BIN_EXE_ks"))
            .args(["--store", "vc", "--dir", "data"])
            .args(args)
            .current_dir(&self.root)
            .env("KEEPSAKE_LOG", "off")
            .output()
            .context("Failed to execute ks")
    }

    fn assert_success(&self, args: &[&str]) -> Result<String> {
        let output = self.execute(args)?;
        if !output.status.success() {
            anyhow::bail!(
                "Command failed: {:?}\nStdout: {}\nStderr: {}",
                args,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn assert_failure(&self, args: &[&str]) -> Result<String> {
        let output = self.execute(args)?;
        if output.status.success() {
            anyhow::bail!("Command should have failed: {:?}", args);
        }
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    fn label(&self, name: &str) -> Result<String> {
        let contents = fs::read_to_string(self.root.join("vc").join(name))?;
        Ok(contents.trim().trim_start_matches("ref: ").to_string())
    }
}

#[test]
fn test_init_commit_revert_log() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let data = temp_dir.path().join("data");
    fs::create_dir_all(&data)?;
    let ks = KsCommand::new(temp_dir.path());

    ks.assert_success(&["init"])?;
    let c0 = ks.label("HEAD")?;
    assert_eq!(c0.len(), 40);

    fs::write(data.join("a.txt"), "x")?;
    ks.assert_success(&["commit", "-m", "add a"])?;
    let c1 = ks.label("HEAD")?;

    fs::write(data.join("a.txt"), "y")?;
    ks.assert_success(&["commit", "-m", "mod a"])?;
    let c2 = ks.label("HEAD")?;

    ks.assert_success(&["revert", &c1[..5]])?;
    assert_eq!(fs::read_to_string(data.join("a.txt"))?, "x");
    assert_eq!(ks.label("HEAD")?, c1);
    assert_eq!(ks.label("LATEST")?, c2);

    let log = ks.assert_success(&["log"])?;
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "| \t\tadd a");
    assert!(lines[1].starts_with(&format!("* {} - ", &c1[..5])));
    assert!(lines[3].starts_with(&format!("* {} - ", &c0[..5])));
    assert_eq!(lines[4], "|/");
    assert!(lines[6].starts_with(&format!("* | {} - ", &c2[..5])));
    Ok(())
}

#[test]
fn test_revert_unknown_prefix_fails() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let ks = KsCommand::new(temp_dir.path());
    ks.assert_success(&["init"])?;
    let head = ks.label("HEAD")?;

    let stderr = ks.assert_failure(&["revert", "doesNotExist"])?;
    assert!(stderr.contains("Unknown or ambiguous commit reference"));
    assert_eq!(ks.label("HEAD")?, head);
    assert!(!temp_dir.path().join("vc/LATEST").exists());
    Ok(())
}

#[test]
fn test_commands_require_store() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let ks = KsCommand::new(temp_dir.path());

    let stderr = ks.assert_failure(&["log"])?;
    assert!(stderr.contains("Not a keepsake store"));
    Ok(())
}

#[test]
fn test_init_twice_fails() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let ks = KsCommand::new(temp_dir.path());

    ks.assert_success(&["init", "--hash", "blake3"])?;
    ks.assert_failure(&["init"])?;

    let config = fs::read_to_string(temp_dir.path().join("vc/config.toml"))?;
    assert!(config.contains("blake3"));
    Ok(())
}

#[test]
fn test_label_and_show() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let data = temp_dir.path().join("data");
    fs::create_dir_all(&data)?;
    let ks = KsCommand::new(temp_dir.path());

    ks.assert_success(&["init"])?;
    let c0 = ks.label("HEAD")?;
    fs::write(data.join("notes.md"), "hello")?;
    ks.assert_success(&["commit", "-m", "add notes"])?;

    ks.assert_success(&["label", "before-edit", &c0[..6]])?;
    assert_eq!(ks.label("before-edit")?, c0);

    let show = ks.assert_success(&["show", "HEAD"])?;
    assert!(show.contains("add notes"));
    assert!(show.contains("notes.md"));

    let show = ks.assert_success(&["show", "before-edit"])?;
    assert!(show.contains("Initial Commit"));

    ks.assert_failure(&["label", "HEAD", &c0])?;
    ks.assert_failure(&["label", "missing"])?;
    Ok(())
}
