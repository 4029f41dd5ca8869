//! Scripted collaborators for engine and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::interview::backend::{
    AnswerEvaluation, AnswerRequest, FinalEvaluationReport, FinalEvaluationRequest,
    GeneratedQuestion, GenerationBackend, QuestionRequest,
};
use crate::interview::engine::InterviewEngine;
use crate::llm_client::LlmError;
use crate::speech::{AnswerAudio, SpeechError, Synthesizer, Transcriber, Transcription};
use crate::store::MemoryInterviewStore;

/// Answers with a fresh numbered question each time and pops answer scores
/// from a queue. An empty queue makes evaluation fail.
#[derive(Default)]
pub struct ScriptedBackend {
    scores: Mutex<VecDeque<f64>>,
    asked: AtomicUsize,
    pub fail_questions: bool,
    pub fail_final: bool,
}

impl ScriptedBackend {
    pub fn with_scores(scores: &[f64]) -> Self {
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn questions_requested(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<GeneratedQuestion, LlmError> {
        let n = self.asked.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_questions {
            return Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            });
        }
        Ok(GeneratedQuestion {
            question: format!("{} question #{n}?", request.round_type.as_str()),
            category: "scripted".to_string(),
            what_to_look_for: vec!["specifics".to_string()],
            sample_answer_points: vec![],
        })
    }

    async fn evaluate_answer(&self, _: &AnswerRequest) -> Result<AnswerEvaluation, LlmError> {
        let score = self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Schema("no scripted score left".to_string()))?;
        Ok(AnswerEvaluation {
            score,
            content_score: score,
            clarity_score: score,
            depth_score: score,
            strengths: vec!["clear structure".to_string()],
            improvements: vec![format!("go deeper than {score}")],
            feedback: "Scripted feedback.".to_string(),
            pass: score >= 70.0,
            confidence_level: "high".to_string(),
        })
    }

    async fn generate_final_evaluation(
        &self,
        request: &FinalEvaluationRequest,
    ) -> Result<FinalEvaluationReport, LlmError> {
        if self.fail_final {
            return Err(LlmError::EmptyContent);
        }
        let mean = request.round_scores.iter().map(|s| s.score).sum::<f64>()
            / request.round_scores.len().max(1) as f64;
        Ok(FinalEvaluationReport {
            overall_score: mean,
            technical_score: mean,
            communication_score: mean,
            problem_solving_score: mean,
            confidence_score: mean,
            strengths: vec!["consistent".to_string()],
            weaknesses: vec![],
            recommendations: vec!["keep practising".to_string()],
            pass: true,
        })
    }
}

/// Produces no question audio and transcribes every recording to `transcript`.
pub struct StubSpeech {
    pub transcript: String,
    pub fail_synthesis: bool,
}

impl StubSpeech {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            fail_synthesis: false,
        }
    }
}

#[async_trait]
impl Transcriber for StubSpeech {
    async fn transcribe(&self, _: &AnswerAudio) -> Result<Transcription, SpeechError> {
        Ok(Transcription {
            text: self.transcript.clone(),
            confidence: Some(0.9),
            audio_reference: Some("interview-audio/answer.webm".to_string()),
        })
    }
}

#[async_trait]
impl Synthesizer for StubSpeech {
    async fn synthesize(&self, _: &str) -> Result<Option<String>, SpeechError> {
        if self.fail_synthesis {
            return Err(SpeechError::Storage("bucket unavailable".to_string()));
        }
        Ok(Some("interview-audio/question.mp3".to_string()))
    }
}

/// An engine over a fresh in-memory store.
pub fn engine_with(backend: Arc<dyn GenerationBackend>, speech: StubSpeech) -> InterviewEngine {
    let speech = Arc::new(speech);
    InterviewEngine::new(
        Arc::new(MemoryInterviewStore::new()),
        backend,
        speech.clone(),
        speech,
        EngineConfig::default(),
    )
}
