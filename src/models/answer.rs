// Answer model
// Answers archive a Q&A exchange; the frontmatter question is clipped so
// the YAML header stays scannable, the body keeps the full text

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frontmatter of an answer file (`.z-agent/answers/answer-XXX.md`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerFrontmatter {
    pub answer_id: String,
    pub question: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub related_lessons: Vec<String>,
    pub related_files: Vec<String>,
    pub related_plans: Vec<String>,
    pub related_tasks: Vec<String>,
}

impl Default for AnswerFrontmatter {
    fn default() -> Self {
        Self {
            answer_id: String::new(),
            question: String::new(),
            summary: String::new(),
            created_at: Utc::now(),
            related_lessons: Vec::new(),
            related_files: Vec::new(),
            related_plans: Vec::new(),
            related_tasks: Vec::new(),
        }
    }
}

impl AnswerFrontmatter {
    /// Clip length for the frontmatter copy of the question
    pub const QUESTION_CLIP: usize = 200;

    pub fn new(answer_id: &str, question: &str, summary: &str) -> Self {
        Self {
            answer_id: answer_id.to_string(),
            question: clip(question, Self::QUESTION_CLIP),
            summary: summary.to_string(),
            ..Default::default()
        }
    }
}

/// Truncates to at most `max` characters, on a char boundary
fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_questions_are_clipped_in_frontmatter() {
        let long = "x".repeat(300);
        let fm = AnswerFrontmatter::new("answer-001", &long, "short");
        assert_eq!(fm.question.chars().count(), 200);
    }

    #[test]
    fn short_questions_pass_through() {
        let fm = AnswerFrontmatter::new("answer-001", "How do I batch writes?", "s");
        assert_eq!(fm.question, "How do I batch writes?");
    }
}
