//! 端到端流程测试：用脚本化的假模型驱动上传、分类、合并、持久化

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use exam_hotspot::config::UnmatchedSubjectPolicy;
use exam_hotspot::error::{AppError, BatchError, PromptError};
use exam_hotspot::infrastructure::{FileStore, KeyValueStore, MemoryStore};
use exam_hotspot::models::master_subjects;
use exam_hotspot::taxonomy::{PERFORMANCE_KEY, SUBJECTS_KEY};
use exam_hotspot::{
    Config, DocumentInput, PromptInvoker, PromptRequest, StudySession, Subject, Topic,
    UploadOutcome,
};

/// 假模型
///
/// - 提取：返回构造时给定的题目
/// - 分类：从题目里的 `[[科目::主题]]` 标记读出结果；`FAIL` 返回非 JSON，`DOWN` 返回网络错误
/// - 解析：正确答案固定为 A
/// - 设置了 `cancel_on_classify` 时，每次分类请求都会触发取消
struct ScriptedModel {
    questions: Vec<String>,
    calls: AtomicUsize,
    cancel_on_classify: Option<CancellationToken>,
}

impl ScriptedModel {
    fn new(questions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            questions: questions.iter().map(|q| q.to_string()).collect(),
            calls: AtomicUsize::new(0),
            cancel_on_classify: None,
        })
    }

    fn cancelling(questions: &[&str], cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            questions: questions.iter().map(|q| q.to_string()).collect(),
            calls: AtomicUsize::new(0),
            cancel_on_classify: Some(cancel),
        })
    }
}

fn marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\[\[(.+?)::(.+?)\]\]").unwrap())
}

#[async_trait]
impl PromptInvoker for ScriptedModel {
    async fn invoke(&self, request: &PromptRequest) -> Result<String, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.name {
            name if name.starts_with("extract") => {
                Ok(serde_json::json!({ "questions": self.questions }).to_string())
            }
            "classify" => {
                if let Some(cancel) = &self.cancel_on_classify {
                    cancel.cancel();
                }
                if request.user.contains("DOWN") {
                    return Err(PromptError::Transport {
                        model: "scripted".into(),
                        message: "503 Service Unavailable".into(),
                    });
                }
                if request.user.contains("FAIL") {
                    return Ok("I am not sure about this one.".to_string());
                }
                let caps = marker().captures(&request.user).unwrap();
                Ok(serde_json::json!({
                    "subject": &caps[1],
                    "topic": &caps[2],
                    "rationale": "scripted"
                })
                .to_string())
            }
            "explain" => Ok(r#"```json
{"correctAnswer": "A", "explanation": "Troponin rises within 3-4 hours.",
 "distractorExplanations": [{"option": "B", "explanation": "CK-MB is less specific."}],
 "citations": ["Harrison's Principles of Internal Medicine", "NICE CG95"]}
```"#
                .to_string()),
            other => panic!("unexpected prompt: {}", other),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn test_config() -> Config {
    Config {
        llm_api_key: "test-key".to_string(),
        classify_chunk_size: 2,
        ..Config::default()
    }
}

async fn session_with(
    model: Arc<ScriptedModel>,
    store: Arc<dyn KeyValueStore>,
    config: &Config,
) -> StudySession {
    StudySession::with_parts(config, model, store, None)
        .await
        .expect("创建会话失败")
}

fn text_input() -> DocumentInput {
    DocumentInput::Text("scanned exam".to_string())
}

fn find_topic<'a>(subjects: &'a [Subject], subject: &str, topic: &str) -> Option<&'a Topic> {
    subjects
        .iter()
        .find(|s| s.name == subject)?
        .topics
        .iter()
        .find(|t| t.matches(topic))
}

#[tokio::test]
async fn test_no_questions_found_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut session = session_with(ScriptedModel::new(&[]), store.clone(), &test_config()).await;

    let outcome = session
        .upload_document("empty.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::NoQuestionsFound));
    assert!(store.get(SUBJECTS_KEY).is_none());
    assert!(session.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_isolated_failures_leave_n_minus_m_results() {
    let model = ScriptedModel::new(&[
        "[[Cardiology::Heart Failure]] Q1",
        "FAIL Q2",
        "[[Neurology::Epilepsy]] Q3",
        "FAIL Q4",
        "[[Pulmonology::Asthma]] Q5",
    ]);
    let mut session =
        session_with(model, Arc::new(MemoryStore::new()), &test_config()).await;

    let outcome = session
        .upload_document("mixed.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    let UploadOutcome::Classified { questions, report } = outcome else {
        panic!("expected classified outcome");
    };
    assert_eq!(questions, 5);
    assert_eq!(report.classified.len(), 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.classified[1].topic, "Epilepsy");
}

#[tokio::test]
async fn test_topics_differing_in_case_merge() {
    let model = ScriptedModel::new(&[
        "[[Neurology::Cluster Headache]] Q1",
        "[[Neurology:: cluster headache ]] Q2",
    ]);
    let mut session =
        session_with(model, Arc::new(MemoryStore::new()), &test_config()).await;
    session
        .upload_document("neuro.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    let neuro = session.subjects().iter().find(|s| s.name == "Neurology").unwrap();
    let matching: Vec<_> = neuro
        .topics
        .iter()
        .filter(|t| t.matches("cluster headache"))
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, "Cluster Headache");
    assert_eq!(matching[0].count(), 2);
}

#[tokio::test]
async fn test_two_mi_questions_share_one_topic() {
    let model = ScriptedModel::new(&[
        "[[Cardiology::Myocardial Infarction]] A 60-year-old man with chest pain. Initial management?",
        "[[Cardiology::Myocardial Infarction]] Which marker rises first after infarction?",
    ]);
    let mut session =
        session_with(model, Arc::new(MemoryStore::new()), &test_config()).await;
    session
        .upload_document("mi.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    let cardio = session.subjects().iter().find(|s| s.name == "Cardiology").unwrap();
    let mi: Vec<_> = cardio
        .topics
        .iter()
        .filter(|t| t.matches("Myocardial Infarction"))
        .collect();
    assert_eq!(mi.len(), 1);
    assert_eq!(mi[0].count(), 2);
}

#[tokio::test]
async fn test_delete_source_file_removes_only_its_questions() {
    let store = Arc::new(MemoryStore::new());
    let config = test_config();

    let mut session = session_with(
        ScriptedModel::new(&[
            "[[Neurology::Migraine]] A1",
            "[[Neurology::Cluster Headache]] A2",
        ]),
        store.clone(),
        &config,
    )
    .await;
    session
        .upload_document("a.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    // 同一份存储上再上传 b.pdf
    let mut session = session_with(
        ScriptedModel::new(&["[[Neurology::Cluster Headache]] B1"]),
        store.clone(),
        &config,
    )
    .await;
    session
        .upload_document("b.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(session.uploaded_files(), vec!["a.pdf", "b.pdf"]);

    session.delete_source_file("a.pdf").unwrap();

    let subjects = session.subjects();
    assert!(find_topic(subjects, "Neurology", "Migraine").is_none());
    assert!(find_topic(subjects, "Neurology", "Epilepsy").is_some());
    let cluster = find_topic(subjects, "Neurology", "Cluster Headache").unwrap();
    assert_eq!(cluster.count(), 1);
    assert_eq!(cluster.files(), vec!["b.pdf"]);
    assert_eq!(session.uploaded_files(), vec!["b.pdf"]);
}

#[tokio::test]
async fn test_clear_resets_both_blobs() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
    let config = test_config();

    let mut session = session_with(
        ScriptedModel::new(&["[[Cardiology::Heart Failure]] Q1"]),
        store.clone(),
        &config,
    )
    .await;
    session
        .upload_document("hf.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();
    session
        .answer_question("Cardiology", "Heart Failure", "Q1", "A. Furosemide")
        .await
        .unwrap();
    assert!(store.get(SUBJECTS_KEY).is_some());
    assert!(store.get(PERFORMANCE_KEY).is_some());

    session.clear_all_data().unwrap();
    assert!(store.get(SUBJECTS_KEY).is_none());
    assert!(store.get(PERFORMANCE_KEY).is_none());

    let reloaded = session_with(ScriptedModel::new(&[]), store, &config).await;
    assert_eq!(reloaded.subjects(), master_subjects().as_slice());
    assert!(reloaded.performance().is_empty());
}

#[tokio::test]
async fn test_state_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();

    let mut session = session_with(
        ScriptedModel::new(&["[[Rheumatology::Gout]] Q1"]),
        Arc::new(FileStore::new(dir.path())),
        &config,
    )
    .await;
    session
        .upload_document("gout.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    let reloaded = session_with(
        ScriptedModel::new(&[]),
        Arc::new(FileStore::new(dir.path())),
        &config,
    )
    .await;
    let gout = find_topic(reloaded.subjects(), "Rheumatology", "Gout").unwrap();
    assert_eq!(gout.count(), 1);
    assert_eq!(reloaded.uploaded_files(), vec!["gout.pdf"]);
}

#[tokio::test]
async fn test_answer_question_records_performance() {
    let mut session = session_with(
        ScriptedModel::new(&[]),
        Arc::new(MemoryStore::new()),
        &test_config(),
    )
    .await;

    let right = session
        .answer_question("Cardiology", "Myocardial Infarction", "Q", "A. Troponin")
        .await
        .unwrap();
    let wrong = session
        .answer_question("Cardiology", "Myocardial Infarction", "Q", "B. CK-MB")
        .await
        .unwrap();

    assert!(right.is_correct);
    assert!(!wrong.is_correct);
    assert_eq!(right.explanation.citations.len(), 2);

    let cardio = &session.performance()["Cardiology"];
    assert_eq!((cardio.correct, cardio.total), (1, 2));
    let rows = session.performance_summary();
    assert_eq!(rows[0].accuracy, 50);
}

#[tokio::test]
async fn test_whole_batch_outage_leaves_state_untouched() {
    let store = Arc::new(MemoryStore::new());
    let model = ScriptedModel::new(&["DOWN Q1", "DOWN Q2", "[[Cardiology::Hypertension]] Q3"]);
    let mut session = session_with(model.clone(), store.clone(), &test_config()).await;

    let result = session
        .upload_document("down.pdf", &text_input(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AppError::Batch(BatchError::Unavailable { chunk: 1, .. }))
    ));
    // 第一批失败后不会再发出第二批
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    assert!(store.get(SUBJECTS_KEY).is_none());
    assert!(session.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_cancelled_upload_discards_results() {
    let store = Arc::new(MemoryStore::new());
    let mut session = session_with(
        ScriptedModel::new(&["[[Cardiology::Hypertension]] Q1"]),
        store.clone(),
        &test_config(),
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = session
        .upload_document("late.pdf", &text_input(), &cancel)
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::Cancelled));
    assert!(store.get(SUBJECTS_KEY).is_none());
}

#[tokio::test]
async fn test_cancel_during_classification_discards_results() {
    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let model = ScriptedModel::cancelling(
        &[
            "[[Cardiology::Hypertension]] Q1",
            "[[Cardiology::Heart Failure]] Q2",
            "[[Neurology::Migraine]] Q3",
        ],
        cancel.clone(),
    );
    let mut session = session_with(model.clone(), store.clone(), &test_config()).await;

    let outcome = session
        .upload_document("mid.pdf", &text_input(), &cancel)
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::Cancelled));
    // 已发出的分类请求照常完成，结果被丢弃
    assert!(model.calls.load(Ordering::SeqCst) >= 2);
    assert!(store.get(SUBJECTS_KEY).is_none());
    assert!(session.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_tail_transport_error_keeps_earlier_results() {
    let store = Arc::new(MemoryStore::new());
    let mut questions: Vec<String> = (0..20)
        .map(|i| format!("[[Cardiology::Hypertension]] Q{}", i))
        .collect();
    questions.push("DOWN Q20".to_string());
    let refs: Vec<&str> = questions.iter().map(String::as_str).collect();
    let config = Config {
        classify_chunk_size: 10,
        ..test_config()
    };
    let mut session = session_with(ScriptedModel::new(&refs), store.clone(), &config).await;

    let outcome = session
        .upload_document("tail.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    let UploadOutcome::Classified { questions, report } = outcome else {
        panic!("应当分类成功");
    };
    assert_eq!(questions, 21);
    assert_eq!(report.classified.len(), 20);
    assert_eq!(report.failed, 1);
    assert!(store.get(SUBJECTS_KEY).is_some());
}

#[tokio::test]
async fn test_local_commands_work_without_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        llm_api_key: String::new(),
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let store = FileStore::new(dir.path().to_path_buf());
    store.set(PERFORMANCE_KEY, "{}").unwrap();

    let mut session = StudySession::open_local(&config).await.unwrap();
    assert!(session.uploaded_files().is_empty());
    session.clear_all_data().unwrap();
    assert!(store.get(PERFORMANCE_KEY).is_none());

    let err = session
        .upload_document("x.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("LLM_API_KEY"));
}

#[tokio::test]
async fn test_unknown_subject_goes_to_miscellaneous_when_enabled() {
    let config = Config {
        unmatched_subject_policy: UnmatchedSubjectPolicy::Miscellaneous,
        ..test_config()
    };
    let mut session = session_with(
        ScriptedModel::new(&["[[Dermatology::Psoriasis]] Q1"]),
        Arc::new(MemoryStore::new()),
        &config,
    )
    .await;
    session
        .upload_document("derm.pdf", &text_input(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(find_topic(session.subjects(), "Miscellaneous", "Psoriasis").is_some());
}

#[test]
fn test_missing_api_key_fails_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        llm_api_key: String::new(),
        data_dir: dir.path().join("never-created"),
        ..Config::default()
    };

    let result = tokio_test::block_on(StudySession::initialize(&config));

    let err = result.err().expect("缺少 API Key 时应当报错");
    assert!(err.to_string().contains("LLM_API_KEY"));
    assert!(!config.data_dir.exists());
}
