//! End-to-end builds against real git repositories.
//!
//! Archive tests shell out to `tar` and return early on hosts without it.

use git2::{IndexAddOption, Repository, Signature};
use pbuild::build::{AppOutcome, BuildSettings, Builder, Phase};
use pbuild::cache;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use walkdir::WalkDir;

fn tar_available() -> bool {
    Command::new("tar")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.update_all(["*"].iter(), None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

/// `<tmp>/repository` as a git checkout with one committed static site.
fn static_project() -> (TempDir, Repository) {
    let tmp = TempDir::new().unwrap();
    let repo_dir = tmp.path().join("repository");
    fs::create_dir_all(repo_dir.join("css")).unwrap();
    let repo = Repository::init(&repo_dir).unwrap();
    fs::write(repo_dir.join("index.html"), "<h1>Welcome</h1>").unwrap();
    fs::write(repo_dir.join("css").join("site.css"), "h1 { color: red; }").unwrap();
    fs::write(
        repo_dir.join(".platform.app.yaml"),
        "name: site\nhooks:\n  build: |\n    npm run build\n",
    )
    .unwrap();
    commit_all(&repo, "initial");
    (tmp, repo)
}

fn settings() -> BuildSettings {
    let mut settings = BuildSettings::new("main");
    settings.no_clean = true;
    settings
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            (
                e.path().strip_prefix(dir).unwrap().to_path_buf(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

fn archive_count(project: &Path) -> usize {
    fs::read_dir(project.join(cache::ARCHIVE_DIR))
        .map(|d| d.count())
        .unwrap_or(0)
}

#[test]
fn test_second_build_restores_archive() {
    if !tar_available() {
        return;
    }
    let (tmp, _repo) = static_project();
    let project = tmp.path();
    let settings = settings();
    let builder = Builder::new(&settings);

    let first = builder.build_project(project).unwrap();
    assert!(first.success());
    let app = &first.apps[0];
    assert_eq!(app.name, "site");
    assert_eq!(app.outcome, AppOutcome::Built { archived: true });

    let tree_id = cache::compute_tree_id(&project.join("repository")).unwrap();
    assert!(cache::find_archive(project, &tree_id).is_some());
    let built = snapshot(&app.build_dir);
    assert!(built.contains_key(Path::new("index.html")));

    fs::remove_dir_all(project.join("builds")).unwrap();

    let second = builder.build_project(project).unwrap();
    assert!(second.success());
    let app = &second.apps[0];
    assert_eq!(app.outcome, AppOutcome::Restored);
    assert_eq!(snapshot(&app.build_dir), built);
    assert_eq!(archive_count(project), 1);

    // Install runs after a restore too
    #[cfg(unix)]
    assert_eq!(
        fs::read_to_string(project.join("www").join("index.html")).unwrap(),
        "<h1>Welcome</h1>"
    );
}

#[test]
fn test_local_edit_misses_the_cache() {
    if !tar_available() {
        return;
    }
    let (tmp, _repo) = static_project();
    let project = tmp.path();
    let settings = settings();
    let builder = Builder::new(&settings);

    builder.build_project(project).unwrap();
    fs::write(project.join("repository").join("index.html"), "<h1>Edited</h1>").unwrap();

    let report = builder.build_project(project).unwrap();
    assert_eq!(report.apps[0].outcome, AppOutcome::Built { archived: true });
    assert_eq!(archive_count(project), 2);
    assert_eq!(
        fs::read_to_string(report.apps[0].build_dir.join("index.html")).unwrap(),
        "<h1>Edited</h1>"
    );
}

#[test]
fn test_platform_config_edit_hits_the_cache() {
    if !tar_available() {
        return;
    }
    let (tmp, repo) = static_project();
    let project = tmp.path();
    let settings = settings();
    let builder = Builder::new(&settings);

    let platform = project.join("repository").join(".platform");
    fs::create_dir_all(&platform).unwrap();
    fs::write(platform.join("routes.yaml"), "\"https://{default}/\": {}").unwrap();
    commit_all(&repo, "routes");
    builder.build_project(project).unwrap();
    fs::remove_dir_all(project.join("builds")).unwrap();

    fs::write(platform.join("services.yaml"), "db: mysql").unwrap();
    let report = builder.build_project(project).unwrap();
    assert_eq!(report.apps[0].outcome, AppOutcome::Restored);
}

#[test]
fn test_no_archive_neither_reads_nor_writes() {
    let (tmp, _repo) = static_project();
    let project = tmp.path();
    let mut settings = settings();
    settings.no_archive = true;

    let report = Builder::new(&settings).build_project(project).unwrap();
    assert_eq!(report.apps[0].outcome, AppOutcome::Built { archived: false });
    assert!(!project.join(cache::ARCHIVE_DIR).exists());
}

#[test]
fn test_explicit_unknown_toolstack_fails() {
    let (tmp, repo) = static_project();
    let project = tmp.path();
    fs::write(
        project.join("repository").join(".platform.app.yaml"),
        "name: site\ntoolstack: \"nodejs:default\"\n",
    )
    .unwrap();
    commit_all(&repo, "toolstack");

    let report = Builder::new(&settings()).build_project(project).unwrap();
    assert!(!report.success());
    assert!(matches!(
        report.apps[0].outcome,
        AppOutcome::Failed {
            phase: Phase::Toolchain,
            ..
        }
    ));
    assert!(!project.join(cache::ARCHIVE_DIR).exists());
}

#[test]
fn test_cleanup_prunes_old_archives() {
    if !tar_available() {
        return;
    }
    let (tmp, _repo) = static_project();
    let project = tmp.path();
    let archives = project.join(cache::ARCHIVE_DIR);
    fs::create_dir_all(&archives).unwrap();
    let stale = archives.join("0000.tar.gz");
    fs::write(&stale, "old").unwrap();
    let long_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(30 * 86_400);
    fs::File::options()
        .write(true)
        .open(&stale)
        .unwrap()
        .set_modified(long_ago)
        .unwrap();

    let mut settings = settings();
    settings.no_clean = false;
    let report = Builder::new(&settings).build_project(project).unwrap();

    assert!(report.success());
    assert_eq!(report.archives_cleaned.unwrap().deleted, 1);
    assert!(!stale.exists());
    assert_eq!(archive_count(project), 1);
}
