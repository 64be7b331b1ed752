//! End-to-end setup → chat flow with in-process fakes

use async_trait::async_trait;
use pb_chat::{Screen, SessionConfig, SessionController};
use pb_core::{AppConfig, Error, ErrorCategory, Result};
use pb_llm::{ChatMessage, ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, Role};
use pb_probe::{read_envelope, ProbeOutput, ProbeRunner, ResponseKind, Target};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

const GOOGLE_DNS: &str = "\
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=11.8 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=12.0 ms
64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=11.9 ms
64 bytes from 8.8.8.8: icmp_seq=4 ttl=117 time=12.1 ms

--- 8.8.8.8 ping statistics ---
4 packets transmitted, 4 received, 0% packet loss, time 3004ms
rtt min/avg/max/mdev = 11.812/11.950/12.101/0.107 ms
";

const BLACKHOLE: &str = "\
PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.

--- 10.255.255.1 ping statistics ---
4 packets transmitted, 0 received, 100% packet loss, time 3062ms
";

/// Returns canned stdout per target; unknown targets produce no output.
struct CannedProbe {
    outputs: HashMap<String, String>,
    calls: AtomicUsize,
}

impl CannedProbe {
    fn new() -> Arc<Self> {
        let mut outputs = HashMap::new();
        outputs.insert("8.8.8.8".to_string(), GOOGLE_DNS.to_string());
        outputs.insert("10.255.255.1".to_string(), BLACKHOLE.to_string());
        Arc::new(Self {
            outputs,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeRunner for CannedProbe {
    async fn run(&self, target: &Target) -> Result<ProbeOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProbeOutput {
            stdout: self.outputs.get(target.as_str()).cloned().unwrap_or_default(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

/// Bag-of-letters embedding: deterministic and good enough to rank text.
struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    fn name(&self) -> &str {
        "letters"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 27];
                for c in text.to_lowercase().chars() {
                    match c {
                        'a'..='z' => v[(c as u8 - b'a') as usize] += 1.0,
                        _ => v[26] += 1.0,
                    }
                }
                v
            })
            .collect())
    }
}

/// Numbers its answers and keeps the last request for inspection.
#[derive(Default)]
struct CountingLlm {
    calls: AtomicUsize,
    last_request: std::sync::Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl LlmProvider for CountingLlm {
    fn name(&self) -> &str {
        "counting"
    }

    async fn chat_with_request(&self, model: &str, request: ChatRequest) -> Result<ChatResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = request.messages;
        Ok(ChatResponse {
            message: ChatMessage::assistant(format!("answer {}", n)),
            model: model.to_string(),
            provider: "counting".to_string(),
            finish_reason: Some("stop".to_string()),
            usage: None,
        })
    }
}

struct DownLlm;

#[async_trait]
impl LlmProvider for DownLlm {
    fn name(&self) -> &str {
        "down"
    }

    async fn chat_with_request(&self, _model: &str, _request: ChatRequest) -> Result<ChatResponse> {
        Err(Error::external_service("down", "HTTP 503: service unavailable"))
    }
}

fn session_config(dir: &tempfile::TempDir) -> SessionConfig {
    let mut config = SessionConfig::from_app_config(&AppConfig::default());
    config.results_path = dir.path().join("ping_results.json");
    config
}

fn controller(
    dir: &tempfile::TempDir,
    probe: Arc<CannedProbe>,
    llm: Arc<dyn LlmProvider>,
) -> SessionController {
    SessionController::new(session_config(dir), probe, llm, Arc::new(LetterEmbedder)).unwrap()
}

#[tokio::test]
async fn test_probe_then_chat() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CountingLlm::default());
    let mut ctl = controller(&dir, CannedProbe::new(), llm.clone());
    assert_eq!(ctl.screen(), Screen::Setup);

    let ctx = assert_ok!(ctl.submit_address(" 8.8.8.8 ").await);
    assert_eq!(ctx.target.as_str(), "8.8.8.8");
    assert_eq!(ctx.envelope.info.len(), 4);
    assert_eq!(ctl.screen(), Screen::Chat);

    let envelope = read_envelope(&dir.path().join("ping_results.json")).unwrap();
    assert_eq!(envelope.info.len(), 4);
    for record in &envelope.info {
        assert_eq!(record.destination, "8.8.8.8");
        assert_eq!(record.packets_transmitted, 4);
        assert_eq!(record.response_type, Some(ResponseKind::Reply));
        assert!(record.time_ms.unwrap() >= 0.0);
    }

    // Follow-ups are condensed first, so each costs two completions
    let questions = ["What was the average latency?", "Was any packet lost?", "What TTL?"];
    for (i, q) in questions.iter().enumerate() {
        let answer = assert_ok!(ctl.submit_question(q).await);
        assert_eq!(answer.text, format!("answer {}", 2 * i + 1));
        if i == 0 {
            assert_eq!(answer.standalone_question, *q);
        } else {
            assert_eq!(answer.standalone_question, format!("answer {}", 2 * i));
        }
        assert!(!answer.sources.is_empty());
    }
    assert_eq!(llm.calls.load(Ordering::SeqCst), 5);

    let history = ctl.context().unwrap().retrieval.history();
    assert_eq!(history.len(), 2 * questions.len());
    for (i, turn) in history.turns().iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(turn.role, Role::User);
            assert_eq!(turn.content, questions[i / 2]);
        } else {
            assert_eq!(turn.role, Role::Assistant);
        }
    }

    // System context, four replayed turns, then the newest question
    let last = llm.last_request.lock().unwrap().clone();
    assert_eq!(last.len(), 6);
    assert_eq!(last[0].role, Role::System);
    assert!(last[0].content.contains("\"destination\":\"8.8.8.8\""));
    assert_eq!(last[5], ChatMessage::user("What TTL?"));

    let summary = ctl.end().unwrap();
    assert_eq!(summary.target, "8.8.8.8");
    assert_eq!(summary.records, 4);
    assert_eq!(summary.exchanges, 3);
}

#[tokio::test]
async fn test_empty_probe_output_stays_on_setup() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = controller(&dir, CannedProbe::new(), Arc::new(CountingLlm::default()));

    let err = assert_err!(ctl.submit_address("192.0.2.1").await);
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.category(), ErrorCategory::Parse);
    assert_eq!(err.user_message(), "There was an issue processing your request.");
    assert_eq!(ctl.screen(), Screen::Setup);
    assert!(!dir.path().join("ping_results.json").exists());

    // A later valid address still works
    assert_ok!(ctl.submit_address("8.8.8.8").await);
    assert_eq!(ctl.screen(), Screen::Chat);
}

#[tokio::test]
async fn test_total_loss_is_one_summary_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = controller(&dir, CannedProbe::new(), Arc::new(CountingLlm::default()));

    let ctx = assert_ok!(ctl.submit_address("10.255.255.1").await);
    assert_eq!(ctx.envelope.info.len(), 1);
    let record = &ctx.envelope.info[0];
    assert_eq!(record.packets_received, 0);
    assert_eq!(record.packet_loss_percent, 100.0);
    assert!(record.response_type.is_none());
}

#[tokio::test]
async fn test_injection_rejected_before_probe() {
    let dir = tempfile::tempdir().unwrap();
    let probe = CannedProbe::new();
    let mut ctl = controller(&dir, probe.clone(), Arc::new(CountingLlm::default()));

    for input in ["8.8.8.8; rm -rf /", "-f 8.8.8.8", "$(reboot)", "", "   "] {
        let err = assert_err!(ctl.submit_address(input).await);
        assert_eq!(err.category(), ErrorCategory::UserInput, "{input:?}");
    }
    assert_eq!(probe.calls(), 0);
    assert_eq!(ctl.screen(), Screen::Setup);
}

#[tokio::test]
async fn test_wrong_screen_calls() {
    let dir = tempfile::tempdir().unwrap();
    let probe = CannedProbe::new();
    let mut ctl = controller(&dir, probe.clone(), Arc::new(CountingLlm::default()));

    let err = assert_err!(ctl.submit_question("hello?").await);
    assert!(matches!(err, Error::InvalidState(_)));

    assert_ok!(ctl.submit_address("8.8.8.8").await);
    let err = assert_err!(ctl.submit_address("10.255.255.1").await);
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(probe.calls(), 1);
    assert_eq!(ctl.context().unwrap().target.as_str(), "8.8.8.8");
}

#[tokio::test]
async fn test_service_failure_is_not_an_answer() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = controller(&dir, CannedProbe::new(), Arc::new(DownLlm));
    assert_ok!(ctl.submit_address("8.8.8.8").await);

    let err = assert_err!(ctl.submit_question("What was the latency?").await);
    assert_eq!(err.category(), ErrorCategory::ExternalService);
    assert_eq!(ctl.screen(), Screen::Chat);
    assert!(ctl.context().unwrap().retrieval.history().is_empty());

    let err = assert_err!(ctl.submit_question("  ").await);
    assert_eq!(err.category(), ErrorCategory::UserInput);
}

#[tokio::test]
async fn test_envelope_serializes_as_info_array() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctl = controller(&dir, CannedProbe::new(), Arc::new(CountingLlm::default()));
    assert_ok!(ctl.submit_address("8.8.8.8").await);

    let raw = std::fs::read_to_string(dir.path().join("ping_results.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let info = json["info"].as_array().unwrap();
    assert_eq!(info.len(), 4);
    assert_eq!(info[0]["icmp_seq"], 1);
    assert_eq!(info[3]["ttl"], 117);
}
