//! The analyzer and generator abstractions, plus scriptable mocks for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::NluError;
use crate::types::{CandidateParse, CandidateScore, EntityMap, GeneratedUtterance, NluOptions, NluResult};

/// A natural-language analyzer.
///
/// `context` is the serialized dialogue context (code tokens plus entities)
/// the conversation currently revolves around; the analyzer uses it to
/// resolve anaphora and continuations.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn send_utterance(
        &self,
        utterance: &str,
        context: Option<(&[String], &EntityMap)>,
        options: &NluOptions,
    ) -> Result<NluResult, NluError>;

    /// Called once before the first utterance.
    async fn start(&self) -> Result<(), NluError> {
        Ok(())
    }

    /// Called once when the conversation ends.
    async fn stop(&self) -> Result<(), NluError> {
        Ok(())
    }

    /// Identifier for logs.
    fn name(&self) -> &str;
}

/// Shared handle to an analyzer.
pub type SharedNlu = Arc<dyn NluClient>;

/// A natural-language generator: turns a target act (in code tokens) into
/// ranked surface forms, given the same serialized context the analyzer sees.
#[async_trait]
pub trait NlgClient: Send + Sync {
    async fn generate_utterance(
        &self,
        context: &[String],
        entities: &EntityMap,
        target: &[String],
    ) -> Result<Vec<GeneratedUtterance>, NluError>;
}

/// Shared handle to a generator.
pub type SharedNlg = Arc<dyn NlgClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock analyzer
// ─────────────────────────────────────────────────────────────────────────────

/// A recorded call to [`MockNluClient::send_utterance`].
#[derive(Debug, Clone)]
pub struct MockUtteranceRequest {
    pub utterance: String,
    pub context: Option<Vec<String>>,
    pub expect: Option<String>,
}

/// Scriptable analyzer for tests: queue up results, then inspect what was
/// asked. An exhausted queue yields an empty result, which callers treat as
/// a parse failure.
#[derive(Default)]
pub struct MockNluClient {
    responses: Mutex<VecDeque<Result<NluResult, NluError>>>,
    requests: Mutex<Vec<MockUtteranceRequest>>,
}

impl MockNluClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers the next call with a single exact-match candidate.
    pub fn with_candidate(code: &[&str]) -> Self {
        let mock = Self::new();
        mock.push_candidate(code, CandidateScore::Exact);
        mock
    }

    /// Queue a full result.
    pub fn push_result(&self, result: NluResult) {
        self.responses.lock().unwrap().push_back(Ok(result));
    }

    /// Queue a single candidate with the given score.
    pub fn push_candidate(&self, code: &[&str], score: CandidateScore) {
        self.push_result(NluResult::new(vec![CandidateParse::new(
            code.iter().map(|t| t.to_string()).collect(),
            score,
        )]));
    }

    /// Queue an empty result (a parse failure).
    pub fn push_failure(&self) {
        self.push_result(NluResult::default());
    }

    /// Queue an error, e.g. to simulate an unreachable host.
    pub fn push_error(&self, error: NluError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Everything analyzed so far.
    pub fn requests(&self) -> Vec<MockUtteranceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NluClient for MockNluClient {
    async fn send_utterance(
        &self,
        utterance: &str,
        context: Option<(&[String], &EntityMap)>,
        options: &NluOptions,
    ) -> Result<NluResult, NluError> {
        self.requests.lock().unwrap().push(MockUtteranceRequest {
            utterance: utterance.to_string(),
            context: context.map(|(tokens, _)| tokens.to_vec()),
            expect: options.expect.clone(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(NluResult::default()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock generator
// ─────────────────────────────────────────────────────────────────────────────

/// Scriptable generator for tests. An exhausted queue yields a fixed
/// placeholder answer.
#[derive(Default)]
pub struct MockNlgClient {
    answers: Mutex<VecDeque<Vec<GeneratedUtterance>>>,
    targets: Mutex<Vec<Vec<String>>>,
}

impl MockNlgClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(text: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.push_answer(text);
        mock
    }

    pub fn push_answer(&self, text: impl Into<String>) {
        self.answers.lock().unwrap().push_back(vec![GeneratedUtterance {
            answer: text.into(),
        }]);
    }

    /// Queue an empty ranking (generation failure).
    pub fn push_empty(&self) {
        self.answers.lock().unwrap().push_back(Vec::new());
    }

    /// The target code sequences generated so far.
    pub fn targets(&self) -> Vec<Vec<String>> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl NlgClient for MockNlgClient {
    async fn generate_utterance(
        &self,
        _context: &[String],
        _entities: &EntityMap,
        target: &[String],
    ) -> Result<Vec<GeneratedUtterance>, NluError> {
        self.targets.lock().unwrap().push(target.to_vec());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                vec![GeneratedUtterance {
                    answer: "mock answer".to_string(),
                }]
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_nlu_replays_in_order() {
        let mock = MockNluClient::new();
        mock.push_candidate(&["bookkeeping", "special", "special:yes"], CandidateScore::Exact);
        mock.push_failure();

        let first = mock
            .send_utterance("yes", None, &NluOptions::default())
            .await
            .unwrap();
        assert_eq!(first.candidates.len(), 1);
        assert!(first.candidates[0].score.is_exact());

        let second = mock
            .send_utterance("gibberish", None, &NluOptions::default())
            .await
            .unwrap();
        assert!(second.is_empty());

        // Exhausted queue keeps yielding parse failures.
        let third = mock
            .send_utterance("more", None, &NluOptions::default())
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_mock_nlu_records_requests() {
        let mock = MockNluClient::new();
        let tokens = vec!["now".to_string()];
        let entities = EntityMap::new();
        let _ = mock
            .send_utterance(
                "hello",
                Some((&tokens, &entities)),
                &NluOptions::expecting("yesno"),
            )
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].utterance, "hello");
        assert_eq!(requests[0].context.as_deref(), Some(&["now".to_string()][..]));
        assert_eq!(requests[0].expect.as_deref(), Some("yesno"));
    }

    #[tokio::test]
    async fn test_mock_nlg_default_answer() {
        let mock = MockNlgClient::new();
        let answers = mock
            .generate_utterance(&[], &EntityMap::new(), &["sys_greet".to_string()])
            .await
            .unwrap();
        assert_eq!(answers[0].answer, "mock answer");
        assert_eq!(mock.targets().len(), 1);
    }
}
