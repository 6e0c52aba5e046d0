//! End-to-end scenarios for the question-answering pipeline, driven
//! in-process with stand-in generation backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ruling_rag::backend::GenerationBackend;
use ruling_rag::config::Config;
use ruling_rag::error::RagError;
use ruling_rag::gateway::GenerationGateway;
use ruling_rag::models::{AnswerSource, Status};
use ruling_rag::prompt::NO_CONTEXT_ANSWER;
use ruling_rag::rag::RagService;
use serde_json::{json, Value};
use tempfile::TempDir;

// ─── Test backends ──────────────────────────────────────────────────

/// Replies after `delay` with a fixed answer that cites the first letter
/// number found in the prompt.
struct SlowModel {
    delay: Duration,
}

#[async_trait]
impl GenerationBackend for SlowModel {
    fn model_name(&self) -> &str {
        "slow-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        tokio::time::sleep(self.delay).await;
        let cited = if prompt.contains("กค 0702/1500") {
            "กค 0702/1500"
        } else {
            "-"
        };
        Ok(format!(
            "<think>ตรวจข้อมูลอ้างอิง</think>\nคำตอบสรุป: ส่งออกเสียภาษีอัตราร้อยละ 0 เลขที่หนังสือ: {}",
            cited
        ))
    }

    async fn health(&self) -> Result<(), RagError> {
        Ok(())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn ruling_snapshot() -> Value {
    json!([
        {
            "year": 2567,
            "month": "มกราคม",
            "documents": [
                {
                    "title": "ภาษีมูลค่าเพิ่มกรณีส่งออกสินค้า",
                    "เรื่อง": "ภาษีมูลค่าเพิ่ม",
                    "ข้อหารือ": "บริษัทส่งออกสินค้าไปต่างประเทศต้องเสียภาษีมูลค่าเพิ่มหรือไม่",
                    "แนววินิจฉัย": "การส่งออกสินค้าเสียภาษีมูลค่าเพิ่มอัตราร้อยละศูนย์",
                    "เลขที่หนังสือ": "กค 0702/1500"
                },
                {
                    "title": "การหักภาษี ณ ที่จ่ายเงินเดือนพนักงาน",
                    "ข้อหารือ": "นายจ้างต้องหักภาษีเงินได้บุคคลธรรมดาจากเงินเดือนอย่างไร",
                    "แนววินิจฉัย": "นายจ้างมีหน้าที่หักภาษีเงินได้ ณ ที่จ่ายตามมาตรา 50",
                    "เลขที่หนังสือ": "กค 0702/2200"
                }
            ]
        },
        {
            "year": 2567,
            "month": "กุมภาพันธ์",
            "documents": [
                {
                    "title": "อากรแสตมป์สัญญาจ้างทำของ กค 0702/3300",
                    "ข้อหารือ": "สัญญาจ้างทำของต้องปิดอากรแสตมป์หรือไม่",
                    "แนววินิจฉัย": "สัญญาจ้างทำของต้องเสียอากรแสตมป์ตามบัญชีอัตราอากร"
                }
            ]
        }
    ])
}

fn write_config(tmp: &TempDir, snapshot: &Value, retrieval: &str) -> Config {
    let corpus_path = tmp.path().join("data").join("corpus.json");
    std::fs::create_dir_all(corpus_path.parent().unwrap()).unwrap();
    std::fs::write(&corpus_path, snapshot.to_string()).unwrap();

    let content = format!(
        r#"[corpus]
path = "{}"

[index]
cache_path = "{}/cache/index.json"

[history]
path = "{}/output/history.json"

[retrieval]
{}
"#,
        corpus_path.display(),
        tmp.path().display(),
        tmp.path().display(),
        retrieval
    );
    toml::from_str(&content).unwrap()
}

fn service(config: Config, delay: Duration, timeout: Duration) -> Arc<RagService> {
    let backend = Arc::new(SlowModel { delay });
    let gateway = GenerationGateway::spawn(backend, 1, timeout);
    Arc::new(RagService::new(config, gateway))
}

const VAT_QUESTION: &str = "บริษัทส่งออกสินค้าต้องเสียภาษีมูลค่าเพิ่มหรือไม่";

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_grounded_answer_with_references() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");
    let svc = service(cfg, Duration::ZERO, Duration::from_secs(5));

    let response = svc.ask(VAT_QUESTION).await.unwrap();
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.domain, "ภาษีมูลค่าเพิ่ม");
    assert_eq!(
        response.answer,
        "ส่งออกเสียภาษีอัตราร้อยละ 0 เลขที่หนังสือ: กค 0702/1500"
    );
    assert_eq!(
        response.main_reference.as_deref(),
        Some("ภาษีมูลค่าเพิ่มกรณีส่งออกสินค้า")
    );
    assert_eq!(response.references[0].id.as_deref(), Some("กค 0702/1500"));
    assert_eq!(
        response.references.iter().filter(|r| r.is_primary).count(),
        1
    );
    assert!(response.references.len() <= 2);

    let last = svc.last().unwrap();
    assert_eq!(last.question, VAT_QUESTION);
    assert_eq!(last.status, Status::Success);
    assert_eq!(last.answer_source, AnswerSource::Llm);
}

#[tokio::test]
async fn test_below_threshold_returns_fixed_answer_and_logs() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");
    let svc = service(cfg, Duration::ZERO, Duration::from_secs(5));

    let response = svc.ask("football world cup results").await.unwrap();
    assert_eq!(response.answer, NO_CONTEXT_ANSWER);
    assert_eq!(response.status, Status::Fail);
    assert!(response.references.is_empty());
    assert!(response.main_reference.is_none());
    assert_eq!(response.domain, "ทั่วไป");

    let history = svc.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, Status::Fail);
    assert_eq!(history[0].answer_source, AnswerSource::NoContext);
}

#[tokio::test]
async fn test_best_window_contains_match_at_offset_650() {
    // 650 chars of filler, so the phrase starts at character offset 650.
    let content = format!(
        "{}withholding tax refund deadline {}",
        "123456789 ".repeat(65),
        "123456789 ".repeat(66)
    );
    let snapshot = json!([
        {"title": "Refund rules", "content": content},
        {"title": "อากรแสตมป์", "content": "สัญญาจ้างทำของต้องปิดอากรแสตมป์"},
        {"title": "ภาษีป้าย", "content": "ป้ายโฆษณาต้องเสียภาษีป้ายรายปี"}
    ]);
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &snapshot, "top_k = 3\nmin_similarity = 0.0");
    let svc = service(cfg, Duration::ZERO, Duration::from_secs(5));

    let result = svc.search("withholding tax refund deadline").unwrap();
    let hit = result
        .hits
        .iter()
        .find(|h| h.label == "Refund rules")
        .expect("refund document retrieved");

    let len = hit.segment.chars().count();
    assert!(hit.segment_start <= 650 && 650 < hit.segment_start + len);
    assert!(hit.segment.contains("withholding tax refund deadline"));
    assert_eq!(hit.segment_start, 500);
}

#[tokio::test]
async fn test_full_queue_rejects_busy_immediately() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");
    let svc = service(cfg, Duration::from_millis(400), Duration::from_secs(10));
    // Load the index up front so both asks reach the gateway quickly.
    svc.corpus().unwrap();

    let running = tokio::spawn({
        let svc = svc.clone();
        async move { svc.ask(VAT_QUESTION).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let queued = tokio::spawn({
        let svc = svc.clone();
        async move { svc.ask(VAT_QUESTION).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let err = svc.ask(VAT_QUESTION).await.unwrap_err();
    assert!(matches!(err, RagError::GatewayBusy));
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_millis(300));

    assert_eq!(running.await.unwrap().unwrap().status, Status::Success);
    assert_eq!(queued.await.unwrap().unwrap().status, Status::Success);

    let failures: Vec<_> = svc
        .history()
        .into_iter()
        .filter(|e| e.answer_source == AnswerSource::Error)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status, Status::Fail);
}

#[tokio::test]
async fn test_generation_timeout_is_surfaced_and_logged() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");
    let svc = service(cfg, Duration::from_millis(500), Duration::from_millis(100));

    let err = svc.ask(VAT_QUESTION).await.unwrap_err();
    assert!(matches!(err, RagError::GenerationTimeout(_)));

    let last = svc.last().unwrap();
    assert_eq!(last.status, Status::Fail);
    assert_eq!(last.answer_source, AnswerSource::Error);
    assert!(!last.references.is_empty());
}

#[tokio::test]
async fn test_history_keeps_last_50() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");
    let svc = service(cfg, Duration::ZERO, Duration::from_secs(5));

    let question = |i: u8| format!("football match {}{}", (b'a' + i / 26) as char, (b'a' + i % 26) as char);
    for i in 0..60 {
        svc.ask(&question(i)).await.unwrap();
    }

    let history = svc.history();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].question, question(10));
    assert_eq!(history[49].question, question(59));
}

#[tokio::test]
async fn test_cache_survives_restart_and_reload() {
    let tmp = TempDir::new().unwrap();
    let cfg = write_config(&tmp, &ruling_snapshot(), "");

    let first = service(cfg.clone(), Duration::ZERO, Duration::from_secs(5));
    let before = first.search(VAT_QUESTION).unwrap();
    assert!(cfg.index.cache_path.exists());

    // A fresh service reuses the cache and ranks identically.
    let second = service(cfg.clone(), Duration::ZERO, Duration::from_secs(5));
    assert_eq!(second.search(VAT_QUESTION).unwrap(), before);

    // Growing the snapshot invalidates the cache on reload.
    let mut snapshot = ruling_snapshot();
    snapshot[1]["documents"]
        .as_array_mut()
        .unwrap()
        .push(json!({"title": "ภาษีโรงเรือน", "ข้อหารือ": "ให้เช่าอาคาร"}));
    std::fs::write(&cfg.corpus.path, snapshot.to_string()).unwrap();

    let corpus = second.reload().unwrap();
    assert_eq!(corpus.documents.len(), 4);
    assert_eq!(corpus.index.rows(), 4);
}
