use crate::types::{AppError, ClarificationAnswer, ClarificationQuestion, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer used for any question left unanswered when research proceeds
pub const NO_PREFERENCE: &str = "No specific preference";

/// Questions asked of the caller and the answers recorded so far
///
/// Answers are keyed by question index. Recording an answer twice for the
/// same index keeps the latest one, so retried deliveries are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationState {
    questions: Vec<ClarificationQuestion>,
    answers: BTreeMap<usize, ClarificationAnswer>,
}

impl ClarificationState {
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(index, text)| ClarificationQuestion {
                index,
                text: text.into(),
            })
            .collect();

        Self {
            questions,
            answers: BTreeMap::new(),
        }
    }

    pub fn questions(&self) -> &[ClarificationQuestion] {
        &self.questions
    }

    pub fn question_texts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.text.clone()).collect()
    }

    /// Record (or overwrite) the answer for a question
    ///
    /// An index outside the question list is rejected and leaves the state
    /// untouched.
    pub fn record(&mut self, question_index: usize, answer: impl Into<String>) -> Result<()> {
        if question_index >= self.questions.len() {
            return Err(AppError::Usage(format!(
                "question index {} is out of range, {} questions were asked",
                question_index,
                self.questions.len()
            )));
        }

        self.answers.insert(
            question_index,
            ClarificationAnswer {
                question_index,
                text: answer.into(),
            },
        );
        Ok(())
    }

    pub fn answer(&self, question_index: usize) -> Option<&str> {
        self.answers
            .get(&question_index)
            .map(|answer| answer.text.as_str())
    }

    pub fn responses(&self) -> BTreeMap<usize, String> {
        self.answers
            .iter()
            .map(|(index, answer)| (*index, answer.text.clone()))
            .collect()
    }

    /// Whether every question has an answer
    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.questions.len()
    }

    /// Fold the original query and the clarifications into one research query
    ///
    /// Questions appear in order; unanswered ones get [`NO_PREFERENCE`].
    pub fn enrich_query(&self, original_query: &str) -> String {
        let mut enriched = format!(
            "Original query: {}\n\nAdditional context from clarifications:\n",
            original_query
        );
        for question in &self.questions {
            let answer = self.answer(question.index).unwrap_or(NO_PREFERENCE);
            enriched.push_str(&format!("- {}: {}\n", question.text, answer));
        }
        enriched
    }
}
