//! Message intent detection and document routing for the tutor chat.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{Quiz, StudentProfile, StudyDay};

/// Retrieved context shorter than this is treated as noise in auto mode.
pub const MIN_AUTO_CONTEXT_CHARS: usize = 100;
/// Short general questions under this many words skip document search.
pub const SHORT_QUESTION_WORDS: usize = 15;
/// Quiz percentage under which a topic counts as weak.
pub const WEAK_TOPIC_PERCENT: f64 = 60.0;

const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "sup", "yo"];
const GREETING_PHRASES: &[&str] = &["good morning", "good evening"];
const DOUBT_KEYWORDS: &[&str] = &[
    "don't understand",
    "confused",
    "what is",
    "explain",
    "how does",
    "help me with",
    "struggling",
];
const MOTIVATION_KEYWORDS: &[&str] = &[
    "tired",
    "can't do",
    "difficult",
    "hard",
    "demotivated",
    "frustrated",
    "give up",
];
const EXPLANATION_KEYWORDS: &[&str] = &["what", "why", "how", "explain", "tell me about", "describe"];

const IGNORE_DOCUMENT_PHRASES: &[&str] = &[
    "forget the document",
    "ignore document",
    "ignore the document",
    "forget that document",
    "without document",
    "without the document",
    "don't use document",
    "not from document",
    "don't use the document",
    "ignore that",
    "forget about",
    "not about the document",
    "just tell me",
    "general question",
    "without using",
    "don't reference",
    "aside from document",
];
const USE_DOCUMENT_PHRASES: &[&str] = &[
    "in my document",
    "from my pdf",
    "in the document",
    "what does my",
    "according to my",
    "in my notes",
    "my textbook says",
    "uploaded material",
    "my file",
    "in my upload",
    "from my report",
    "my medical report",
    "what's in my",
    "from the document",
    "the document says",
];
const GENERAL_QUESTION_PREFIXES: &[&str] = &[
    "what is",
    "what are",
    "explain",
    "how does",
    "how do",
    "why",
    "tell me about",
    "what should i",
    "how to",
    "help me understand",
    "can you explain",
    "describe",
    "what's the difference",
    "compare",
    "i don't understand",
    "how am i doing",
    "my progress",
    "my quiz",
    "my score",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Greeting,
    Doubt,
    Motivation,
    Explanation,
    General,
}

fn normalize(message: &str) -> String {
    message.trim().to_lowercase().replace('\u{2019}', "'")
}

fn is_greeting(lower: &str) -> bool {
    let first_word = lower
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or_default();
    GREETING_WORDS.contains(&first_word) || GREETING_PHRASES.iter().any(|p| lower.starts_with(p))
}

/// Classify a learner message; checked in the order of the variants.
#[must_use]
pub fn detect_intent(message: &str) -> Intent {
    let lower = normalize(message);
    if is_greeting(&lower) {
        Intent::Greeting
    } else if DOUBT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Intent::Doubt
    } else if MOTIVATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Intent::Motivation
    } else if EXPLANATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Intent::Explanation
    } else {
        Intent::General
    }
}

/// How uploaded documents take part in answering a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRouting {
    /// The learner asked not to use documents.
    Ignore,
    /// The learner asked about their documents; use whatever is found.
    Required,
    /// Short general question; do not search.
    Skip,
    /// Search, and use the result only if it is substantial.
    Auto,
}

impl DocumentRouting {
    #[must_use]
    pub fn searches(self) -> bool {
        matches!(self, DocumentRouting::Required | DocumentRouting::Auto)
    }

    /// Whether retrieved `context` should be placed in the prompt.
    #[must_use]
    pub fn accepts(self, context: &str) -> bool {
        match self {
            DocumentRouting::Required => !context.is_empty(),
            DocumentRouting::Auto => context.chars().count() > MIN_AUTO_CONTEXT_CHARS,
            DocumentRouting::Ignore | DocumentRouting::Skip => false,
        }
    }
}

#[must_use]
pub fn document_routing(message: &str) -> DocumentRouting {
    let lower = normalize(message);
    if IGNORE_DOCUMENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return DocumentRouting::Ignore;
    }
    if USE_DOCUMENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return DocumentRouting::Required;
    }
    let general = GENERAL_QUESTION_PREFIXES.iter().any(|p| lower.starts_with(p));
    let short = lower.split_whitespace().count() < SHORT_QUESTION_WORDS;
    if general && short {
        DocumentRouting::Skip
    } else {
        DocumentRouting::Auto
    }
}

//
// ─── LEARNER CONTEXT ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizSnapshot {
    pub topic: String,
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub date: Option<chrono::NaiveDate>,
}

/// Progress facts the tutor is told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerContext {
    pub current_day: u32,
    pub topics_learning: Vec<String>,
    pub current_topic: Option<String>,
    pub streak: u32,
    pub hours_per_day: u32,
    pub tasks_completed: usize,
    pub total_tasks: usize,
    pub today_progress_percentage: f64,
    pub total_quizzes_taken: usize,
    pub average_quiz_score: f64,
    pub recent_quizzes: Vec<QuizSnapshot>,
    pub weak_topics: Vec<String>,
    pub total_days_planned: usize,
    pub days_completed: usize,
    pub overall_progress_percentage: f64,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl LearnerContext {
    /// `recent_quizzes` are completed quizzes, newest first.
    #[must_use]
    pub fn build(
        profile: &StudentProfile,
        today_plan: Option<&StudyDay>,
        recent_quizzes: &[Quiz],
        total_days_planned: usize,
        days_completed: usize,
    ) -> Self {
        let (tasks_completed, total_tasks) = today_plan
            .map(|p| (p.completed_task_count(), p.tasks.len()))
            .unwrap_or((0, 0));

        let snapshots: Vec<QuizSnapshot> = recent_quizzes
            .iter()
            .filter(|q| q.max_score > 0)
            .filter_map(|q| {
                let score = q.score?;
                Some(QuizSnapshot {
                    topic: q.topic.clone(),
                    score,
                    max_score: q.max_score,
                    percentage: f64::from(score) / f64::from(q.max_score) * 100.0,
                    date: q.attempted_at.map(|t| t.date_naive()),
                })
            })
            .collect();

        let average = if snapshots.is_empty() {
            0.0
        } else {
            snapshots.iter().map(|s| s.percentage).sum::<f64>() / snapshots.len() as f64
        };
        let weak_topics: BTreeSet<String> = snapshots
            .iter()
            .filter(|s| s.percentage < WEAK_TOPIC_PERCENT)
            .map(|s| s.topic.clone())
            .collect();

        Self {
            current_day: profile.current_day,
            topics_learning: profile.topics.clone(),
            current_topic: today_plan.map(|p| p.topic.clone()),
            streak: profile.streak,
            hours_per_day: profile.hours_per_day,
            tasks_completed,
            total_tasks,
            today_progress_percentage: percent(tasks_completed, total_tasks),
            total_quizzes_taken: snapshots.len(),
            average_quiz_score: (average * 10.0).round() / 10.0,
            recent_quizzes: snapshots,
            weak_topics: weak_topics.into_iter().collect(),
            total_days_planned,
            days_completed,
            overall_progress_percentage: percent(days_completed, total_days_planned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizKind, QuizStatus, UserId};
    use crate::time::fixed_now;

    #[test]
    fn greetings_match_leading_word_only() {
        assert_eq!(detect_intent("Hi there!"), Intent::Greeting);
        assert_eq!(detect_intent("hey, quick one"), Intent::Greeting);
        assert_eq!(detect_intent("Good morning tutor"), Intent::Greeting);
        assert_ne!(detect_intent("history of TCP"), Intent::Greeting);
        assert_ne!(detect_intent("yours truly"), Intent::Greeting);
    }

    #[test]
    fn intents_checked_in_order() {
        assert_eq!(detect_intent("I'm confused about joins"), Intent::Doubt);
        assert_eq!(detect_intent("What is a deadlock?"), Intent::Doubt);
        assert_eq!(detect_intent("I'm so tired today"), Intent::Motivation);
        assert_eq!(detect_intent("why use indexes"), Intent::Explanation);
        assert_eq!(detect_intent("thanks!"), Intent::General);
    }

    #[test]
    fn routing_respects_explicit_phrases() {
        assert_eq!(
            document_routing("Ignore the document and explain paging"),
            DocumentRouting::Ignore
        );
        assert_eq!(
            document_routing("What does my textbook say? in my notes it says X"),
            DocumentRouting::Required
        );
        assert_eq!(document_routing("what is paging"), DocumentRouting::Skip);
        assert_eq!(
            document_routing("Summarise chapter three of the lecture about virtual memory"),
            DocumentRouting::Auto
        );
        let long = format!("what is {}", "very ".repeat(20));
        assert_eq!(document_routing(&long), DocumentRouting::Auto);
    }

    #[test]
    fn routing_acceptance() {
        let short = "x".repeat(50);
        let long = "x".repeat(101);
        assert!(DocumentRouting::Required.accepts(&short));
        assert!(!DocumentRouting::Auto.accepts(&short));
        assert!(DocumentRouting::Auto.accepts(&long));
        assert!(!DocumentRouting::Skip.accepts(&long));
        assert!(!DocumentRouting::Ignore.searches());
    }

    #[test]
    fn learner_context_collects_quiz_stats() {
        let now = fixed_now();
        let mut profile = StudentProfile::new(UserId::generate(), now);
        profile.current_day = 3;
        profile.streak = 2;

        let quiz = |topic: &str, score: u32| {
            let mut q = Quiz::new(profile.user_id, topic, QuizKind::Mcq, None, Vec::new(), now);
            q.max_score = 50;
            q.score = Some(score);
            q.status = QuizStatus::Completed;
            q.attempted_at = Some(now);
            q
        };
        let quizzes = vec![quiz("Trees", 20), quiz("Graphs", 45), quiz("Trees", 25)];

        let ctx = LearnerContext::build(&profile, None, &quizzes, 10, 2);

        assert_eq!(ctx.current_day, 3);
        assert_eq!(ctx.current_topic, None);
        assert_eq!(ctx.total_quizzes_taken, 3);
        assert!((ctx.average_quiz_score - 60.0).abs() < 1e-9);
        assert_eq!(ctx.weak_topics, vec!["Trees".to_string()]);
        assert!((ctx.overall_progress_percentage - 20.0).abs() < 1e-9);
    }
}
