use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("rulings.json"),
        r#"[
  {"year": 2567, "month": "มีนาคม", "documents": [
    {"title": "ภาษีมูลค่าเพิ่มการให้บริการขนส่งระหว่างประเทศ",
     "ข้อหารือ": "บริษัทให้บริการขนส่งสินค้าระหว่างประเทศต้องเสียภาษีมูลค่าเพิ่มหรือไม่",
     "แนววินิจฉัย": "การขนส่งระหว่างประเทศเสียภาษีมูลค่าเพิ่มอัตราร้อยละศูนย์",
     "เลขที่หนังสือ": "กค 0702/4100"},
    {"title": "เงินได้จากการขายอสังหาริมทรัพย์ กค 0702/4200",
     "ข้อหารือ": "บุคคลธรรมดาขายที่ดินที่ได้รับมรดกต้องเสียภาษีอย่างไร",
     "แนววินิจฉัย": "ต้องนำเงินได้ไปคำนวณภาษีเงินได้บุคคลธรรมดา"},
    {"title": "อากรแสตมป์ใบรับ",
     "ข้อหารือ": "ใบรับเงินต้องปิดอากรแสตมป์หรือไม่",
     "แนววินิจฉัย": "ใบรับที่ออกโดยผู้ประกอบการจดทะเบียนภาษีมูลค่าเพิ่มได้รับยกเว้นอากร"}
  ]}
]"#,
    )
    .unwrap();

    // The generation backend is never reached by these tests.
    let config_content = format!(
        r#"[corpus]
path = "{root}/data/rulings.json"

[index]
cache_path = "{root}/data/index.json"

[history]
path = "{root}/output/history.json"

[generation]
base_url = "http://127.0.0.1:9"
connect_timeout_secs = 1

[server]
bind = "127.0.0.1:7332"

[retrieval]
min_similarity = 0.05
"#,
        root = root.display()
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_index_builds_cache() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rrag(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Indexed 3 documents"));
    assert!(tmp.path().join("data").join("index.json").exists());
}

#[test]
fn test_index_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, _, success1) = run_rrag(&config_path, &["index"]);
    assert!(success1, "First index failed");

    let (stdout2, _, success2) = run_rrag(&config_path, &["index"]);
    assert!(success2, "Second index failed");
    assert_eq!(stdout1, stdout2);
}

#[test]
fn test_search_ranks_matching_ruling() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_rrag(&config_path, &["search", "ขนส่งสินค้าระหว่างประเทศเสียภาษีมูลค่าเพิ่ม"]);
    assert!(success, "search failed: {}", stderr);
    assert!(
        stdout.starts_with("1. ["),
        "unexpected output: {}",
        stdout
    );
    assert!(stdout
        .lines()
        .next()
        .unwrap()
        .contains("กค 0702/4100: ภาษีมูลค่าเพิ่มการให้บริการขนส่งระหว่างประเทศ"));
    assert!(stdout.contains("--- Context ---"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let (first, _, _) = run_rrag(&config_path, &["search", "ขายที่ดินมรดก", "--json"]);
    let (second, _, _) = run_rrag(&config_path, &["search", "ขายที่ดินมรดก", "--json"]);
    assert_eq!(first, second, "Same query should produce identical results");

    let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(
        parsed["references"][0]["id"],
        "กค 0702/4200",
        "title pattern should supply the id"
    );
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rrag(&config_path, &["search", "quantum chromodynamics"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_ask_without_context_skips_backend() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_rrag(&config_path, &["ask", "quantum chromodynamics", "--json"]);
    assert!(success, "ask failed: {}", stderr);

    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["answer"], "ไม่พบข้อมูลในฐานข้อมูลที่ตรงกับคำถามครับ");
    assert_eq!(response["status"], "fail");
    assert_eq!(response["domain"], "ทั่วไป");

    let (last, _, success) = run_rrag(&config_path, &["history", "--last"]);
    assert!(success);
    let entry: serde_json::Value = serde_json::from_str(&last).unwrap();
    assert_eq!(entry["question"], "quantum chromodynamics");
    assert_eq!(entry["answer_source"], "no_context");
}

#[test]
fn test_ask_backend_unreachable_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_rrag(
        &config_path,
        &["ask", "ใบรับเงินต้องปิดอากรแสตมป์หรือไม่"],
    );
    assert!(!success, "ask should fail when the backend is down");
    assert!(stderr.contains("generation backend error"), "stderr: {}", stderr);

    let (history, _, _) = run_rrag(&config_path, &["history"]);
    let entries: Vec<serde_json::Value> = serde_json::from_str(&history).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "fail");
    assert_eq!(entries[0]["answer_source"], "error");
}

#[test]
fn test_ask_empty_question_errors() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_rrag(&config_path, &["ask", "  "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_history_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rrag(&config_path, &["history"]);
    assert!(success);
    assert_eq!(stdout.trim(), "[]");

    let (stdout, _, success) = run_rrag(&config_path, &["history", "--last"]);
    assert!(success);
    assert_eq!(stdout.trim(), "{}");
}

#[test]
fn test_health_backend_down() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rrag(&config_path, &["health"]);
    assert!(!success);
    assert!(stdout.contains("backend: unreachable"));
}

#[test]
fn test_missing_corpus_errors() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data").join("rulings.json")).unwrap();

    let (_, stderr, success) = run_rrag(&config_path, &["index"]);
    assert!(!success, "index without corpus should fail");
    assert!(stderr.contains("corpus snapshot not found"));
}

#[test]
fn test_invalid_config_errors() {
    let (tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        format!("{}window_chars = 50\noverlap_chars = 80\n", content),
    )
    .unwrap();

    let (_, stderr, success) = run_rrag(&config_path, &["search", "x"]);
    assert!(!success);
    assert!(stderr.contains("overlap_chars"));
    drop(tmp);
}
