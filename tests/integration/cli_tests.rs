use clap::Parser;
use std::fs;
use std::path::Path;
use stowaway::cli::Cli;
use stowaway::config::CacheSettings;
use stowaway::error::ExitCode;
use tempfile::tempdir;

fn run(root: &Path, args: &[&str]) -> (ExitCode, String) {
    let mut argv = vec!["stowaway"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let settings = CacheSettings {
        root: Some(root.to_path_buf()),
        ..Default::default()
    };
    let mut out = Vec::new();
    let code = stowaway::execute(&cli, &settings, &mut out).unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[test]
fn test_put_get_list_delete() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.txt");
    fs::write(&input, "cached text").unwrap();
    let input = input.to_str().unwrap();

    let (code, _) = run(dir.path(), &["put", "Notes", "note.txt", input]);
    assert_eq!(code, ExitCode::Success);

    let (code, out) = run(dir.path(), &["get", "Notes", "note.txt"]);
    assert_eq!(code, ExitCode::Success);
    assert_eq!(out, "cached text");

    let (_, out) = run(dir.path(), &["list", "Notes", "--json"]);
    let names: Vec<String> = serde_json::from_str(&out).unwrap();
    assert_eq!(names, vec!["note.txt"]);

    run(dir.path(), &["delete", "Notes", "note.txt"]);
    let (code, out) = run(dir.path(), &["get", "Notes", "note.txt"]);
    assert_eq!(code, ExitCode::NotFound);
    assert!(out.is_empty());
}

#[test]
fn test_clear_and_path() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.bin");
    fs::write(&input, [0u8, 1, 2]).unwrap();
    let input = input.to_str().unwrap();

    run(dir.path(), &["put", "Blobs", "a", input]);
    run(dir.path(), &["put", "Blobs", "b", input]);
    run(dir.path(), &["clear", "Blobs"]);
    let (_, out) = run(dir.path(), &["list", "Blobs"]);
    assert!(out.is_empty());

    let (_, out) = run(dir.path(), &["path", "Blobs", "a"]);
    let expected = dir.path().join("rootfolder").join("Blobs").join("a");
    assert_eq!(out.trim_end(), expected.display().to_string());
}

#[test]
fn test_put_missing_input_fails() {
    let dir = tempdir().unwrap();
    let cli = Cli::try_parse_from(["stowaway", "put", "Notes", "n", "/no/such/input"]).unwrap();
    let settings = CacheSettings {
        root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut out = Vec::new();
    let err = stowaway::execute(&cli, &settings, &mut out).unwrap_err();
    assert!(err.to_string().contains("Failed to read input file"));
}

#[test]
fn test_config_prints_effective_settings() {
    let dir = tempdir().unwrap();
    let (code, out) = run(dir.path(), &["config"]);
    assert_eq!(code, ExitCode::Success);
    assert!(out.contains("debounce_ms = 250"));
    assert!(out.contains("root ="));
}

#[test]
fn test_put_fails_when_entry_cannot_be_replaced() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.txt");
    fs::write(&input, "new content").unwrap();

    // A non-empty directory where the entry should be can neither be removed nor renamed over.
    let blocker = dir.path().join("rootfolder").join("Notes").join("note.txt");
    fs::create_dir_all(&blocker).unwrap();
    fs::write(blocker.join("stale"), "old").unwrap();

    let cli = Cli::try_parse_from(["stowaway", "put", "Notes", "note.txt", input.to_str().unwrap()])
        .unwrap();
    let settings = CacheSettings {
        root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut out = Vec::new();
    let err = stowaway::execute(&cli, &settings, &mut out).unwrap_err();
    assert!(err.to_string().contains("Failed to store entry note.txt"));
}
