//! Prompt text sent to the language model.

use std::fmt::Write as _;

use study_core::chat::{Intent, LearnerContext};
use study_core::model::{CodingQuestion, DescriptiveQuestion, Difficulty, Level, QuizKind};

pub const ONBOARDING_GREETING_FALLBACK: &str = "Welcome! Let's create your personalized study plan.";
pub const CHAT_FALLBACK: &str =
    "I'm having trouble generating a response right now. Could you try again?";

#[must_use]
pub fn onboarding_greeting() -> String {
    "Write a warm, encouraging greeting for a student who is about to set up a study plan. \
     Keep it to two or three friendly sentences and invite them to get started."
        .to_string()
}

/// `topics` pairs each topic with the learner's level in it.
#[must_use]
pub fn onboarding_summary(
    name: &str,
    topics: &[(String, Level)],
    hours_per_day: u32,
    target_date: Option<&str>,
) -> String {
    let topics = topics
        .iter()
        .map(|(topic, level)| format!("{topic} ({})", level.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Write a short, motivating summary for a student who just finished planning their studies.\n\n\
         Student: {name}\n\
         Topics: {topics}\n\
         Study hours per day: {hours_per_day}\n\
         Target date: {}\n\n\
         In three or four sentences acknowledge their commitment, mention what they will learn \
         and encourage them to begin.",
        target_date.unwrap_or("self-paced")
    )
}

#[must_use]
pub fn onboarding_summary_fallback(topics: &[String], hours_per_day: u32) -> String {
    format!(
        "Great! You'll be learning {} with {hours_per_day} hours of daily study. Let's get started!",
        topics.join(", ")
    )
}

#[must_use]
pub fn daily_greeting(context: &LearnerContext) -> String {
    format!(
        "Write a warm greeting for a student starting today's study session.\n\n\
         - Day {} of their learning journey\n\
         - Currently learning: {}\n\
         - Current streak: {} days\n\n\
         In two or three sentences welcome them, mention today's topic and keep it motivating.",
        context.current_day,
        context.current_topic.as_deref().unwrap_or("General"),
        context.streak
    )
}

//
// ─── TUTOR CHAT ────────────────────────────────────────────────────────────────
//

/// Progress facts shared by every tutor prompt.
#[must_use]
pub fn learner_context(context: &LearnerContext) -> String {
    let mut out = String::from("You are a helpful AI study companion.\n\nStudent context:\n");
    let _ = writeln!(
        out,
        "- Current day: {} of {}",
        context.current_day, context.total_days_planned
    );
    let _ = writeln!(
        out,
        "- Current topic: {}",
        context.current_topic.as_deref().unwrap_or("General")
    );
    let _ = writeln!(
        out,
        "- Overall progress: {:.0}% ({} days completed)",
        context.overall_progress_percentage, context.days_completed
    );
    let _ = writeln!(
        out,
        "- Today's tasks: {}/{} completed ({:.0}%)",
        context.tasks_completed, context.total_tasks, context.today_progress_percentage
    );
    let _ = writeln!(out, "- Study streak: {} days", context.streak);
    let _ = writeln!(out, "\nQuiz performance:");
    let _ = writeln!(out, "- Quizzes taken: {}", context.total_quizzes_taken);
    let _ = writeln!(out, "- Average score: {:.1}%", context.average_quiz_score);

    if !context.recent_quizzes.is_empty() {
        let _ = writeln!(out, "- Recent scores:");
        for quiz in context.recent_quizzes.iter().take(3) {
            let date = quiz
                .date
                .map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string());
            let _ = writeln!(
                out,
                "  * {}: {:.0}% ({}/{}) on {date}",
                quiz.topic, quiz.percentage, quiz.score, quiz.max_score
            );
        }
    }
    if !context.weak_topics.is_empty() {
        let _ = writeln!(
            out,
            "- Topics needing improvement: {}",
            context.weak_topics.join(", ")
        );
    }
    out
}

#[must_use]
pub fn document_answer(base: &str, documents: &str, message: &str) -> String {
    format!(
        "{base}\nContent from the student's uploaded documents:\n{documents}\n\
         Student's question: {message}\n\n\
         Answer from the document content above. Open with \"Based on your uploaded document\", \
         quote the relevant parts, and if the documents do not cover the question say so and \
         offer general help.\n\nAnswer:"
    )
}

/// Tutor prompt for a message of the given intent.
///
/// `history` is the recent conversation, oldest first, as `role: text` lines.
#[must_use]
pub fn tutor_reply(base: &str, intent: Intent, message: &str, history: &str) -> String {
    match intent {
        Intent::Greeting => format!(
            "{base}\nStudent said: \"{message}\"\n\n\
             Respond warmly in two or three sentences and mention their current topic and progress."
        ),
        Intent::Doubt => format!(
            "{base}\nStudent's question: {message}\n\n\
             Help the student understand this concept. Explain it for a beginner, use an example \
             if it helps, be encouraging and refer to their progress where relevant.\n\n\
             Your explanation:"
        ),
        Intent::Motivation => format!(
            "{base}\nStudent said: {message}\n\n\
             Encourage them based on their progress. Mention their streak, completed tasks and \
             quiz scores."
        ),
        Intent::Explanation => format!(
            "{base}\nStudent wants an explanation: {message}\n\n\
             Explain the concept clearly with examples or analogies and connect it to their \
             current topic where it fits.\n\nYour explanation:"
        ),
        Intent::General => format!(
            "{base}\nRecent conversation:\n{history}\n\nStudent: {message}\n\n\
             Respond helpfully. If they ask about their progress, quiz scores or study status, \
             answer from the context above.\n\nYour response:"
        ),
    }
}

//
// ─── QUIZZES ───────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn generate_questions(kind: QuizKind, topic: &str, difficulty: Difficulty, count: u32) -> String {
    let level = difficulty.as_str();
    match kind {
        QuizKind::Mcq => format!(
            "Generate {count} multiple choice questions about {topic} at {level} level.\n\n\
             Return ONLY a JSON array, with no text before or after it:\n\
             [\n  {{\n    \"question\": \"...\",\n    \"options\": [\"...\", \"...\", \"...\", \"...\"],\n    \
             \"correct_answer\": \"...\",\n    \"explanation\": \"...\"\n  }}\n]\n\n\
             Give exactly four plausible options, make correct_answer equal to one of them, \
             keep explanations under 50 words and do not use markdown."
        ),
        QuizKind::Descriptive => format!(
            "Generate {count} descriptive questions about {topic} at {level} level.\n\n\
             Return ONLY a JSON array:\n\
             [\n  {{\n    \"question\": \"...\",\n    \"key_points\": [\"...\", \"...\", \"...\"],\n    \
             \"sample_answer\": \"...\"\n  }}\n]\n\n\
             Test understanding rather than recall, list three to five key points and keep \
             sample answers under 100 words."
        ),
        QuizKind::Coding => format!(
            "Generate {count} coding problems about {topic} at {level} level.\n\n\
             Return ONLY a JSON array:\n\
             [\n  {{\n    \"question\": \"...\",\n    \"requirements\": [\"...\", \"...\"],\n    \
             \"sample_input\": \"...\",\n    \"sample_output\": \"...\",\n    \
             \"sample_solution\": \"...\"\n  }}\n]\n\n\
             Keep problems practical, encode newlines in code as \\n and keep solutions under \
             20 lines."
        ),
    }
}

/// Token budget for a generation request of `kind`.
#[must_use]
pub fn generation_budget(kind: QuizKind) -> u32 {
    match kind {
        QuizKind::Mcq => 3000,
        QuizKind::Descriptive => 2500,
        QuizKind::Coding => 3500,
    }
}

#[must_use]
pub fn review_descriptive(question: &DescriptiveQuestion, answer: &str) -> String {
    format!(
        "Grade this student's answer.\n\n\
         Question: {}\n\n\
         Key points to cover: {}\n\n\
         Student's answer:\n{answer}\n\n\
         Sample answer:\n{}\n\n\
         Reply in this format:\nScore: [0-10]\nFeedback: [what was good and what could improve]\n\n\
         Be fair and award partial credit for partially correct answers.",
        question.question,
        question.key_points.join(", "),
        question.sample_answer
    )
}

#[must_use]
pub fn review_code(question: &CodingQuestion, code: &str) -> String {
    let requirements = question
        .requirements
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Review this student's code.\n\n\
         Problem: {}\n\n\
         Requirements:\n{requirements}\n\n\
         Student's code:\n```\n{code}\n```\n\n\
         Sample solution:\n```\n{}\n```\n\n\
         Judge correctness, code quality and whether the requirements are met. \
         Reply in this format:\nScore: [0-10]\nFeedback: [correctness, quality and improvements]",
        question.question, question.sample_solution
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> LearnerContext {
        LearnerContext {
            current_day: 3,
            topics_learning: vec!["Python".into()],
            current_topic: Some("Python Basics".into()),
            streak: 2,
            hours_per_day: 4,
            tasks_completed: 1,
            total_tasks: 3,
            today_progress_percentage: 33.3,
            total_quizzes_taken: 0,
            average_quiz_score: 0.0,
            recent_quizzes: Vec::new(),
            weak_topics: vec!["Recursion".into()],
            total_days_planned: 30,
            days_completed: 2,
            overall_progress_percentage: 6.7,
        }
    }

    #[test]
    fn learner_context_lists_progress_and_weak_topics() {
        let text = learner_context(&context());
        assert!(text.contains("Current day: 3 of 30"));
        assert!(text.contains("Current topic: Python Basics"));
        assert!(text.contains("Today's tasks: 1/3 completed (33%)"));
        assert!(text.contains("Topics needing improvement: Recursion"));
        assert!(!text.contains("Recent scores"));
    }

    #[test]
    fn general_prompt_carries_history() {
        let prompt = tutor_reply("BASE", Intent::General, "and then?", "user: hi\nai: hello");
        assert!(prompt.starts_with("BASE"));
        assert!(prompt.contains("user: hi\nai: hello"));
        assert!(prompt.contains("Student: and then?"));
    }

    #[test]
    fn summary_fallback_names_topics_and_hours() {
        assert_eq!(
            onboarding_summary_fallback(&["Java".into(), "DBMS".into()], 3),
            "Great! You'll be learning Java, DBMS with 3 hours of daily study. Let's get started!"
        );
    }
}
