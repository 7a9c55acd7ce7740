//! Exit codes and messages of the `pbuild` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn pbuild(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pbuild"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env("HOME", cwd)
        .output()
        .expect("Failed to run pbuild")
}

fn project_with_repository(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repository");
    fs::create_dir_all(&repo).unwrap();
    git2::Repository::init(&repo).unwrap();
    for (name, content) in files {
        fs::write(repo.join(name), content).unwrap();
    }
    tmp
}

#[test]
fn test_outside_project_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let output = pbuild(tmp.path(), &["build", "--env", "main"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not inside a project"));
}

#[test]
fn test_failed_application_exits_with_two() {
    let tmp = project_with_repository(&[
        (".platform.app.yaml", "name: app\ntoolstack: \"ruby:rails\"\n"),
        ("index.html", "ok"),
    ]);
    let output = pbuild(
        tmp.path(),
        &["build", "--env", "main", "--no-archive", "--no-clean"],
    );
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Toolchain not found: ruby:rails"));
}

#[test]
fn test_successful_build_exits_with_zero() {
    let tmp = project_with_repository(&[("index.html", "ok")]);
    let output = pbuild(
        &tmp.path().join("repository"),
        &["build", "--env", "main", "--no-archive"],
    );
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Build complete for application"));
    assert!(tmp.path().join("builds").is_dir());
}

#[test]
fn test_clean_without_builds() {
    let tmp = project_with_repository(&[]);
    let output = pbuild(tmp.path(), &["clean"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("There are no builds to delete"));
}

#[test]
fn test_project_config_disables_archives() {
    let tmp = project_with_repository(&[("index.html", "ok")]);
    fs::write(
        tmp.path().join("pbuild.toml"),
        "[build]\nno_archive = true\nno_clean = true\n",
    )
    .unwrap();
    let output = pbuild(tmp.path(), &["build", "--env", "main"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(!tmp.path().join(".build-archives").exists());
}

#[test]
fn test_builds_listing() {
    let tmp = project_with_repository(&[]);
    fs::create_dir_all(tmp.path().join("builds").join("2024-01-01--00-00-00--main")).unwrap();
    let output = pbuild(tmp.path(), &["builds"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2024-01-01--00-00-00--main"));
}
