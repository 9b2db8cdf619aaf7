use std::fmt::Write as _;
use std::sync::Arc;

use graphrag_core::config::LlmSettings;
use graphrag_core::error::{Error, Result};
use graphrag_core::traits::{AnswerGenerator, LanguageModel};
use graphrag_core::types::{Prompt, RetrievedDocument};

pub const NO_CONTEXT_ANSWER: &str =
    "Sorry, I could not find any relevant information in the knowledge base to answer this question.";

const STEP_CUES: &[&str] = &["how to", "how do", "how can", "steps", "procedure", "步骤", "怎么做", "如何", "做法", "流程"];

const ANSWER_SYSTEM: &str = "You are a knowledgeable assistant. Answer using only the provided context. \
If the context does not contain the answer, say so plainly. Answer in the language of the question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStyle {
    StepByStep,
    Concise,
}

impl AnswerStyle {
    pub fn for_question(question: &str) -> Self {
        let q = question.to_lowercase();
        if STEP_CUES.iter().any(|c| q.contains(c)) { AnswerStyle::StepByStep } else { AnswerStyle::Concise }
    }

    fn instruction(&self) -> &'static str {
        match self {
            AnswerStyle::StepByStep => "Give a clear, numbered step-by-step answer. Mention quantities and timings when the context has them.",
            AnswerStyle::Concise => "Give a direct, concise answer, then one or two supporting details from the context.",
        }
    }
}

pub struct AdaptiveGenerator {
    llm: Arc<dyn LanguageModel>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AdaptiveGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, settings: &LlmSettings) -> Self {
        Self {
            llm,
            model: settings.chat_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn build_prompt(&self, question: &str, documents: &[RetrievedDocument]) -> Prompt {
        let mut context = String::new();
        for (i, doc) in documents.iter().enumerate() {
            let _ = writeln!(context, "[{}] {} ({:?}, score {:.2})\n{}\n", i + 1, doc.title, doc.source, doc.score, doc.content);
        }
        let style = AnswerStyle::for_question(question);
        Prompt {
            model: self.model.clone(),
            system: Some(ANSWER_SYSTEM.to_string()),
            user: format!("Context:\n{context}\n{}\n\nQuestion: {question}", style.instruction()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl AnswerGenerator for AdaptiveGenerator {
    fn generate_adaptive_answer(&self, question: &str, documents: &[RetrievedDocument]) -> Result<String> {
        if documents.is_empty() {
            tracing::info!("no documents retrieved, skipping generation");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        let answer = self.llm.complete(&self.build_prompt(question, documents))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(Error::ExternalService("model returned an empty answer".to_string()));
        }
        Ok(answer.to_string())
    }
}
