use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn write_files(root: &Path) {
    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
}

fn write_config(root: &Path, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[db]
path = "{}/data/rag.sqlite"

[chunking]
chunk_size = 80
overlap = 20

[retrieval]
top_k = 2

{}
"#,
        root.display(),
        extra
    );
    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    write_files(tmp.path());
    let config_path = write_config(tmp.path(), extra);
    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(tmp: &TempDir) -> String {
    tmp.path().join("files").to_str().unwrap().to_string()
}

fn chunks_written(stdout: &str) -> usize {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("chunks written: "))
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("no chunk count in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/rag.sqlite").exists());

    let (_, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_retrieve_before_init_fails() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_rag(&config_path, &["retrieve", "rust"]);
    assert!(!success);
    assert!(stderr.contains("not initialized"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_and_retrieve() {
    let (tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("documents: 3"));
    assert!(stdout.contains("failed: 0"));
    assert!(chunks_written(&stdout) >= 3);

    let (stdout, stderr, success) = run_rag(
        &config_path,
        &["retrieve", "Rust programming with cargo and crates"],
    );
    assert!(success, "retrieve failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let contexts = json["contexts"].as_array().unwrap();
    assert_eq!(contexts.len(), 2);
    assert!(contexts[0]["source_position"]["source_id"]
        .as_str()
        .unwrap()
        .ends_with("alpha.md"));
    let s0 = contexts[0]["score"].as_f64().unwrap();
    let s1 = contexts[1]["score"].as_f64().unwrap();
    assert!(s0 >= s1);
    assert!(contexts[0]["token_count"].as_u64().unwrap() > 0);
}

#[test]
fn test_retrieve_k_larger_than_index() {
    // Default chunk_size: one chunk per file.
    let tmp = TempDir::new().unwrap();
    write_files(tmp.path());
    let config_path = tmp.path().join("rag.toml");
    fs::write(
        &config_path,
        format!("[db]\npath = \"{}/data/rag.sqlite\"\n", tmp.path().display()),
    )
    .unwrap();

    run_rag(&config_path, &["init"]);
    let (_, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, _, success) = run_rag(&config_path, &["retrieve", "anything", "--k", "50"]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["contexts"].as_array().unwrap().len(), 3);
}

#[test]
fn test_second_ingest_with_default_config_adds_nothing() {
    let (tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success, "first ingest failed: {}", stderr);
    assert!(chunks_written(&stdout) > 0);

    let (stdout, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success, "second ingest failed: {}", stderr);
    assert!(stdout.contains("completed: 3"));
    assert_eq!(chunks_written(&stdout), 0);
}

#[test]
fn test_volatile_ledger_warns_and_reindexes() {
    let (tmp, config_path) = setup_test_env("[ingest]\npersist_ledger = false\n");
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success, "first ingest failed: {}", stderr);
    assert!(stderr.contains("persist_ledger is off"), "stderr: {}", stderr);
    let first = chunks_written(&stdout);

    let (stdout, _, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(success);
    assert_eq!(chunks_written(&stdout), first);
}

#[test]
fn test_json_progress_on_stderr() {
    let (tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);

    let alpha = tmp.path().join("files/alpha.md");
    let (_, stderr, success) = run_rag(
        &config_path,
        &["ingest", alpha.to_str().unwrap(), "--progress", "json"],
    );
    assert!(success, "ingest failed: {}", stderr);

    let events: Vec<serde_json::Value> = stderr
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    assert!(!events.is_empty());
    let last = events.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["progress"].as_f64().unwrap(), 100.0);
    for ev in &events[..events.len() - 1] {
        assert_eq!(ev["status"], "processing");
    }
}

#[test]
fn test_invalid_document_fails_but_batch_continues() {
    let (tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);
    fs::write(tmp.path().join("files/broken.bin"), [0xffu8, 0xfe, 0xfd]).unwrap();

    let (stdout, stderr, success) =
        run_rag(&config_path, &["ingest", &files_dir(&tmp), "--progress", "off"]);
    assert!(!success);
    assert!(stdout.contains("completed: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("failed: 1"));
    assert!(stderr.contains("failed to ingest"));
}

#[test]
fn test_invalid_overlap_is_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rag.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"rag.sqlite\"\n[chunking]\nchunk_size = 100\noverlap = 100\n",
    )
    .unwrap();

    let (_, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);
    let (_, stderr, success) = run_rag(&config_path, &["ingest", "/no/such/dir"]);
    assert!(!success);
    assert!(stderr.contains("Path not found"));
}

#[test]
fn test_ask_calls_generation_even_with_empty_index() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/generate")
        .match_body(mockito::Matcher::Regex("Question: what is X\\?".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"generated_text": "<|user|>echo<|end|>\n<|assistant|> I don't know."}"#)
        .expect(1)
        .create();

    let (_tmp, config_path) =
        setup_test_env(&format!("[generation]\nurl = \"{}\"\n", server.url()));
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rag(&config_path, &["ask", "what is X?"]);
    assert!(success, "ask failed: {}", stderr);
    assert_eq!(stdout.trim(), "I don't know.");
    mock.assert();
}

#[test]
fn test_ask_surfaces_generation_error_body() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/generate")
        .with_status(500)
        .with_body("model crashed")
        .create();

    let (_tmp, config_path) =
        setup_test_env(&format!("[generation]\nurl = \"{}\"\n", server.url()));
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rag(&config_path, &["ask", "anything"]);
    assert!(!success);
    assert!(stdout.trim().is_empty());
    assert!(stderr.contains("model crashed"), "stderr: {}", stderr);
}
