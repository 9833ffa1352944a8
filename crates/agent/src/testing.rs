//! Deterministic capability doubles for workflow tests. Mirrors production
//! behavior closely enough to drive the engine end to end without network
//! access.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use venta_core::domain::message::ChatMessage;
use venta_core::flows::state::{CollectedData, Sentiment};

use crate::crm::{CrmContact, CrmSync};
use crate::llm::{GenerationOptions, IntentCategory, IntentClassification, LanguageModel};
use crate::retrieval::KnowledgeBase;
use crate::schedule::FollowUpScheduler;

/// One recorded call to [`LanguageModel::generate`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedGeneration {
    pub system_prompt: String,
    pub context: Option<String>,
    pub use_emojis: bool,
    pub max_words: u32,
    pub message_count: usize,
}

/// Language model with scripted answers. Analysis and generation failures
/// can be toggled independently to exercise the two error-policy tiers.
pub struct ScriptedLanguageModel {
    intent: IntentClassification,
    sentiment: Sentiment,
    extraction: CollectedData,
    reply: String,
    fail_analysis: bool,
    fail_generation: bool,
    requests: Mutex<Vec<RecordedGeneration>>,
}

impl Default for ScriptedLanguageModel {
    fn default() -> Self {
        Self {
            intent: IntentClassification { category: IntentCategory::Interested, score: 0.5 },
            sentiment: Sentiment::Neutral,
            extraction: CollectedData::default(),
            reply: "ok".to_string(),
            fail_analysis: false,
            fail_generation: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedLanguageModel {
    pub fn with_intent(mut self, score: f64) -> Self {
        let category = if score > 0.8 {
            IntentCategory::ReadyToBuy
        } else if score < 0.2 {
            IntentCategory::Leaving
        } else {
            IntentCategory::Interested
        };
        self.intent = IntentClassification { category, score };
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_extraction(mut self, extraction: CollectedData) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    pub fn failing_analysis(mut self) -> Self {
        self.fail_analysis = true;
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn generation_requests(&self) -> Vec<RecordedGeneration> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn generation_prompts(&self) -> Vec<String> {
        self.generation_requests().into_iter().map(|request| request.system_prompt).collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn classify_intent(
        &self,
        _message: &str,
        _history: &[ChatMessage],
    ) -> Result<IntentClassification> {
        if self.fail_analysis {
            return Err(anyhow!("scripted classifier failure"));
        }
        Ok(self.intent.clone())
    }

    async fn analyze_sentiment(&self, _message: &str) -> Result<Sentiment> {
        if self.fail_analysis {
            return Err(anyhow!("scripted sentiment failure"));
        }
        Ok(self.sentiment)
    }

    async fn extract_profile(
        &self,
        _message: &str,
        _history: &[ChatMessage],
    ) -> Result<CollectedData> {
        if self.fail_analysis {
            return Err(anyhow!("scripted extraction failure"));
        }
        Ok(self.extraction.clone())
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        self.requests.lock().expect("requests lock").push(RecordedGeneration {
            system_prompt: system_prompt.to_string(),
            context: options.context.clone(),
            use_emojis: options.use_emojis,
            max_words: options.max_words,
            message_count: messages.len(),
        });
        if self.fail_generation {
            return Err(anyhow!("scripted generation failure"));
        }
        Ok(self.reply.clone())
    }
}

/// CRM double recording every synced snapshot.
#[derive(Default)]
pub struct RecordingCrm {
    synced: Mutex<Vec<CrmContact>>,
    fail: bool,
}

impl RecordingCrm {
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn synced(&self) -> Vec<CrmContact> {
        self.synced.lock().expect("synced lock").clone()
    }
}

#[async_trait]
impl CrmSync for RecordingCrm {
    async fn sync_contact(&self, contact: &CrmContact) -> Result<()> {
        if self.fail {
            return Err(anyhow!("scripted crm failure"));
        }
        self.synced.lock().expect("synced lock").push(contact.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledJob {
    pub phone: String,
    pub message: String,
    pub run_at: DateTime<Utc>,
}

/// Scheduler double recording every job.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<ScheduledJob>>,
    fail: bool,
}

impl RecordingScheduler {
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn scheduled(&self) -> Vec<ScheduledJob> {
        self.scheduled.lock().expect("scheduled lock").clone()
    }
}

#[async_trait]
impl FollowUpScheduler for RecordingScheduler {
    async fn schedule(&self, phone: &str, message: &str, run_at: DateTime<Utc>) -> Result<String> {
        if self.fail {
            return Err(anyhow!("scripted scheduler failure"));
        }
        let mut scheduled = self.scheduled.lock().expect("scheduled lock");
        scheduled.push(ScheduledJob {
            phone: phone.to_string(),
            message: message.to_string(),
            run_at,
        });
        Ok(format!("job-{}", scheduled.len()))
    }
}

/// In-memory knowledge base serving fixed chunks.
#[derive(Default)]
pub struct StaticKnowledge {
    chunks: Vec<String>,
}

impl StaticKnowledge {
    pub fn with_chunks(chunks: Vec<String>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledge {
    async fn chunk_count(&self) -> Result<u64> {
        Ok(self.chunks.len() as u64)
    }

    async fn retrieve(&self, _query: &str, k: usize) -> Result<Option<String>> {
        if self.chunks.is_empty() {
            return Ok(None);
        }
        let joined = self.chunks.iter().take(k).cloned().collect::<Vec<_>>().join("\n\n");
        Ok(Some(joined))
    }
}
