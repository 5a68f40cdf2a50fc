use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use portfolio_chat::index::VectorIndex;
use portfolio_chat::models::Chunk;

fn folio_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_folio"))
}

/// Run `folio` in `dir` with a clean environment for the variables the
/// config layer reads.
fn run_folio(dir: &Path, envs: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = folio_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(dir);
    for key in [
        "CHAT_MODE",
        "PORT",
        "MODEL_PATH",
        "LOCAL_LLM_MODEL",
        "LOCAL_LLM_URL",
        "FAISS_STORE_PATH",
        "LOCAL_EMBEDDING_PATH",
        "OPENAI_API_KEY",
    ] {
        cmd.env_remove(key);
    }
    for (k, v) in envs {
        cmd.env(k, v);
    }

    let output = cmd
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run folio binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn write_index(dir: &Path) {
    let chunks = vec![
        Chunk::new(0, "AI experience"),
        Chunk::new(1, "Python skills"),
        Chunk::new(2, "Web projects"),
    ];
    let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
    VectorIndex::new("all-minilm-l6-v2", 3, chunks, vectors)
        .unwrap()
        .save(dir)
        .unwrap();
}

#[test]
fn test_clean_writes_default_output() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("Full database.txt");
    fs::write(&input, "**Jane Doe**\n==========\nRust engineer\n------\n").unwrap();

    let (stdout, stderr, success) =
        run_folio(tmp.path(), &[], &["clean", input.to_str().unwrap()]);
    assert!(success, "clean failed: {}", stderr);
    assert!(stdout.contains("Cleaned"));

    let output = tmp.path().join("Full_database_cleaned.txt");
    assert_eq!(fs::read_to_string(output).unwrap(), "Jane Doe\nRust engineer\n");
    assert_eq!(
        fs::read_to_string(&input).unwrap(),
        "**Jane Doe**\n==========\nRust engineer\n------\n"
    );
}

#[test]
fn test_clean_explicit_output() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("raw.txt");
    let output = tmp.path().join("out").with_extension("txt");
    fs::write(&input, "a **b**\n").unwrap();

    let (_, stderr, success) = run_folio(
        tmp.path(),
        &[],
        &["clean", input.to_str().unwrap(), "--output", output.to_str().unwrap()],
    );
    assert!(success, "clean failed: {}", stderr);
    assert_eq!(fs::read_to_string(output).unwrap(), "a b\n");
}

#[test]
fn test_clean_missing_input_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_folio(tmp.path(), &[], &["clean", "nope.txt"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read corpus file"));
}

#[test]
fn test_index_info_reads_store_path_from_env() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    write_index(&store);

    let (stdout, stderr, success) = run_folio(
        tmp.path(),
        &[("FAISS_STORE_PATH", store.to_str().unwrap())],
        &["index", "info"],
    );
    assert!(success, "index info failed: {}", stderr);
    assert!(stdout.contains("all-minilm-l6-v2"));
    assert!(stdout.contains("Chunks:    3"));
}

#[test]
fn test_index_info_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("custom_store");
    write_index(&store);

    let config_path = tmp.path().join("folio.toml");
    fs::write(
        &config_path,
        format!("[index]\npath = \"{}\"\n", store.display()),
    )
    .unwrap();

    let (stdout, stderr, success) = run_folio(
        tmp.path(),
        &[],
        &["--config", config_path.to_str().unwrap(), "index", "info"],
    );
    assert!(success, "index info failed: {}", stderr);
    assert!(stdout.contains("custom_store"));
}

#[test]
fn test_index_info_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_folio(tmp.path(), &[], &["index", "info"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read index metadata"));
}

#[test]
fn test_ask_without_index_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_folio(tmp.path(), &[], &["ask", "Hello"]);
    assert!(!success);
    assert!(stderr.contains("Failed to load vector index"));
}

#[test]
fn test_invalid_chat_mode_rejected() {
    let tmp = TempDir::new().unwrap();
    write_index(&tmp.path().join("vector_store"));
    let (_, stderr, success) = run_folio(tmp.path(), &[("CHAT_MODE", "cloud")], &["index", "info"]);
    assert!(!success);
    assert!(stderr.contains("Unknown CHAT_MODE"));
}
