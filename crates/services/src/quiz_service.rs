use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use storage::repository::{ProfileRepository, QuizRepository, StorageError};
use study_core::grading::{
    self, DEFAULT_REVIEW_POINTS, Grade, grade_mcq, needs_review, parse_questions,
};
use study_core::model::{
    Answers, Difficulty, Question, QuestionFeedback, Quiz, QuizId, QuizKind, QuizResponse,
    QuizStatus, UserId, percentage,
};
use study_core::validate::ValidationError;

use crate::Clock;
use crate::ai::{CompletionRequest, LanguageModel};
use crate::error::QuizServiceError;
use crate::prompts;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

const REVIEW_TEMPERATURE: f32 = 0.3;

fn default_count() -> u32 {
    DEFAULT_QUESTION_COUNT
}

/// Parameters for a new quiz.
#[derive(Clone, Debug, Deserialize)]
pub struct QuizRequest {
    pub topic: String,
    pub kind: QuizKind,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_count")]
    pub count: u32,
}

/// Graded submission returned to the learner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub quiz_id: QuizId,
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub feedback: Vec<QuestionFeedback>,
}

/// A quiz with its stored responses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizDetail {
    pub quiz: Quiz,
    pub responses: Vec<QuizResponse>,
}

/// Generates quizzes with the language model and grades submissions.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    quizzes: Arc<dyn QuizRepository>,
    model: Arc<dyn LanguageModel>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        quizzes: Arc<dyn QuizRepository>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            clock,
            profiles,
            quizzes,
            model,
        }
    }

    /// Ask the model for questions and store them as a pending quiz for the
    /// learner's current day.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Validation` for a bad request,
    /// `QuizServiceError::Llm` when the model cannot be reached and
    /// `QuizServiceError::Quiz` when its reply holds no usable questions.
    pub async fn generate(&self, user_id: UserId, request: QuizRequest) -> Result<Quiz, QuizServiceError> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::new("Topic is required").into());
        }
        if !(1..=MAX_QUESTION_COUNT).contains(&request.count) {
            return Err(ValidationError::new(format!(
                "Number of questions must be between 1 and {MAX_QUESTION_COUNT}"
            ))
            .into());
        }

        let profile = self.profiles.get_profile(user_id).await?;
        let prompt = prompts::generate_questions(request.kind, topic, request.difficulty, request.count);
        let reply = self
            .model
            .complete(
                CompletionRequest::new(prompt)
                    .max_tokens(prompts::generation_budget(request.kind)),
            )
            .await?;
        let questions = parse_questions(request.kind, &reply)?;

        let quiz = Quiz::new(
            user_id,
            topic,
            request.kind,
            Some(profile.current_day),
            questions,
            self.clock.now(),
        );
        self.quizzes.insert_quiz(&quiz).await?;
        info!(
            %user_id,
            quiz_id = %quiz.id,
            kind = quiz.kind.as_str(),
            questions = quiz.questions.len(),
            "generated quiz"
        );
        Ok(quiz)
    }

    /// Grade answers keyed by zero-based question index and store the result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for another user's quiz and
    /// `QuizServiceError::AlreadyCompleted` for a second submission.
    pub async fn submit(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        answers: &Answers,
        time_taken_secs: Option<u32>,
    ) -> Result<SubmissionResult, QuizServiceError> {
        let mut quiz = self.owned(user_id, quiz_id).await?;
        if quiz.status == QuizStatus::Completed {
            return Err(QuizServiceError::AlreadyCompleted);
        }

        let grade = match quiz.kind {
            QuizKind::Mcq => grade_mcq(&quiz.questions, answers),
            kind => self.review(kind, &quiz.questions, answers).await,
        };

        quiz.score = Some(grade.score);
        quiz.status = QuizStatus::Completed;
        quiz.attempted_at = Some(self.clock.now());
        quiz.time_taken_secs = time_taken_secs;
        let responses: Vec<QuizResponse> = grade
            .feedback
            .iter()
            .map(|graded| QuizResponse {
                quiz_id: quiz.id,
                graded: graded.clone(),
            })
            .collect();
        self.quizzes.complete_quiz(&quiz, &responses).await?;

        let result = SubmissionResult {
            quiz_id: quiz.id,
            score: grade.score,
            max_score: quiz.max_score,
            percentage: percentage(grade.score, quiz.max_score),
            feedback: grade.feedback,
        };
        info!(
            %user_id,
            quiz_id = %quiz.id,
            score = result.score,
            max_score = result.max_score,
            "graded quiz"
        );
        Ok(result)
    }

    async fn review(&self, kind: QuizKind, questions: &[Question], answers: &Answers) -> Grade {
        let mut feedback = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let number = u32::try_from(index).unwrap_or(u32::MAX);
            let answer = answers.get(&number).map_or("", String::as_str);
            if !needs_review(answer) {
                feedback.push(grading::rejected_answer(kind, number, question, answer));
                continue;
            }

            let (prompt, max_tokens) = match question {
                Question::Coding(q) => (prompts::review_code(q, answer), 400),
                Question::Descriptive(q) => (prompts::review_descriptive(q, answer), 300),
                Question::Mcq(_) => {
                    feedback.push(grading::rejected_answer(kind, number, question, answer));
                    continue;
                }
            };
            let request = CompletionRequest::new(prompt)
                .max_tokens(max_tokens)
                .temperature(REVIEW_TEMPERATURE);
            match self.model.complete(request).await {
                Ok(reply) => feedback.push(grading::reviewed_answer(kind, number, question, answer, &reply)),
                Err(err) => {
                    warn!(error = %err, question = number, "review failed, awarding default points");
                    feedback.push(unreviewed_answer(kind, number, question, answer));
                }
            }
        }
        Grade::from_feedback(feedback)
    }

    /// Completed quizzes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on backend failures.
    pub async fn history(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<Quiz>, QuizServiceError> {
        Ok(self
            .quizzes
            .list_completed(user_id, Some(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)))
            .await?)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign quiz.
    pub async fn detail(&self, user_id: UserId, quiz_id: QuizId) -> Result<QuizDetail, QuizServiceError> {
        let quiz = self.owned(user_id, quiz_id).await?;
        let responses = self.quizzes.list_responses(quiz.id).await?;
        Ok(QuizDetail { quiz, responses })
    }

    async fn owned(&self, user_id: UserId, quiz_id: QuizId) -> Result<Quiz, QuizServiceError> {
        let quiz = self.quizzes.get_quiz(quiz_id).await?;
        if quiz.user_id != user_id {
            return Err(StorageError::NotFound.into());
        }
        Ok(quiz)
    }
}

/// Middle-of-the-road credit when the reviewer could not be reached.
fn unreviewed_answer(kind: QuizKind, number: u32, question: &Question, answer: &str) -> QuestionFeedback {
    let feedback = match kind {
        QuizKind::Coding => "Code received and reviewed.",
        _ => "Answer received and reviewed.",
    };
    QuestionFeedback {
        question_number: number,
        question: question.text().to_string(),
        student_answer: answer.to_string(),
        correct_answer: None,
        is_correct: false,
        points: DEFAULT_REVIEW_POINTS,
        feedback: feedback.to_string(),
        explanation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use study_core::time::fixed_now;

    use crate::testing::{ScriptedModel, learner};

    const MCQ_REPLY: &str = r#"Here are your questions:
[
  {"question": "Which keyword defines a function?", "options": ["def", "fun", "fn", "func"], "correct_answer": "def", "explanation": "Python uses def."},
  {"question": "Which type is immutable?", "options": ["list", "dict", "tuple", "set"], "correct_answer": "tuple", "explanation": "Tuples cannot change."}
]"#;

    const DESCRIPTIVE_REPLY: &str = r#"[
  {"question": "Explain list comprehensions", "key_points": ["syntax", "filtering"], "sample_answer": "A compact loop."},
  {"question": "Explain decorators", "key_points": ["wrapping"], "sample_answer": "Functions wrapping functions."}
]"#;

    fn service(storage: &Storage, model: Arc<ScriptedModel>) -> QuizService {
        QuizService::new(
            Clock::fixed(fixed_now()),
            storage.profiles.clone(),
            storage.quizzes.clone(),
            model,
        )
    }

    fn request(kind: QuizKind, count: u32) -> QuizRequest {
        QuizRequest {
            topic: "Python".into(),
            kind,
            difficulty: Difficulty::Easy,
            count,
        }
    }

    #[tokio::test]
    async fn mcq_quiz_is_generated_graded_and_stored() {
        let (storage, user) = learner(&["Python"]).await;
        let model = Arc::new(ScriptedModel::replying(&[MCQ_REPLY]));
        let service = service(&storage, model.clone());

        let quiz = service.generate(user.id, request(QuizKind::Mcq, 2)).await.unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.max_score, 20);
        assert_eq!(quiz.day_number, Some(1));
        assert!(model.prompts()[0].contains("Generate 2 multiple choice questions about Python at easy level"));

        let mut answers = Answers::new();
        answers.insert(0, "def".into());
        answers.insert(1, "list".into());
        let result = service.submit(user.id, quiz.id, &answers, Some(42)).await.unwrap();
        assert_eq!(result.score, 10);
        assert!((result.percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            result.feedback[1].feedback,
            "Incorrect. The correct answer is: tuple"
        );

        assert!(matches!(
            service.submit(user.id, quiz.id, &answers, None).await,
            Err(QuizServiceError::AlreadyCompleted)
        ));

        let detail = service.detail(user.id, quiz.id).await.unwrap();
        assert_eq!(detail.quiz.time_taken_secs, Some(42));
        assert_eq!(detail.responses.len(), 2);
        assert_eq!(service.history(user.id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn descriptive_answers_are_reviewed_or_rejected() {
        let (storage, user) = learner(&["Python"]).await;
        let model = Arc::new(ScriptedModel::replying(&[
            DESCRIPTIVE_REPLY,
            "Score: 8\nFeedback: Clear and complete.",
        ]));
        let service = service(&storage, model.clone());
        let quiz = service
            .generate(user.id, request(QuizKind::Descriptive, 2))
            .await
            .unwrap();

        let mut answers = Answers::new();
        answers.insert(0, "They build a list from an iterable in one expression.".into());
        answers.insert(1, "wraps".into());
        let result = service.submit(user.id, quiz.id, &answers, None).await.unwrap();

        assert_eq!(result.feedback[0].points, 8);
        assert!(result.feedback[0].is_correct);
        assert_eq!(result.feedback[0].feedback, "Clear and complete.");
        assert_eq!(result.feedback[1].points, 0);
        assert_eq!(result.feedback[1].feedback, "Answer too short or empty");
        assert_eq!(result.score, 8);

        let review = &model.requests.lock().unwrap()[1];
        assert_eq!(review.max_tokens, 300);
    }

    #[tokio::test]
    async fn unreachable_reviewer_awards_default_points() {
        let (storage, user) = learner(&["Python"]).await;
        let model = Arc::new(ScriptedModel::replying(&[DESCRIPTIVE_REPLY]));
        let service = service(&storage, model);
        let quiz = service
            .generate(user.id, request(QuizKind::Descriptive, 2))
            .await
            .unwrap();

        let mut answers = Answers::new();
        answers.insert(0, "A long enough answer about comprehensions.".into());
        let result = service.submit(user.id, quiz.id, &answers, None).await.unwrap();
        assert_eq!(result.feedback[0].points, DEFAULT_REVIEW_POINTS);
        assert_eq!(result.feedback[0].feedback, "Answer received and reviewed.");
        assert_eq!(result.score, 5);
    }

    #[tokio::test]
    async fn bad_requests_and_replies_are_rejected() {
        let (storage, user) = learner(&["Python"]).await;
        let model = Arc::new(ScriptedModel::replying(&["I cannot help with that."]));
        let service = service(&storage, model);

        assert!(matches!(
            service.generate(user.id, request(QuizKind::Mcq, 0)).await,
            Err(QuizServiceError::Validation(_))
        ));
        assert!(matches!(
            service.generate(user.id, request(QuizKind::Mcq, 21)).await,
            Err(QuizServiceError::Validation(_))
        ));
        assert!(matches!(
            service.generate(user.id, request(QuizKind::Mcq, 3)).await,
            Err(QuizServiceError::Quiz(_))
        ));
        assert!(matches!(
            service.generate(user.id, request(QuizKind::Mcq, 3)).await,
            Err(QuizServiceError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn quizzes_are_private() {
        let (storage, user) = learner(&["Python"]).await;
        let model = Arc::new(ScriptedModel::replying(&[MCQ_REPLY]));
        let service = service(&storage, model);
        let quiz = service.generate(user.id, request(QuizKind::Mcq, 2)).await.unwrap();

        assert!(matches!(
            service.detail(UserId::generate(), quiz.id).await,
            Err(QuizServiceError::Storage(StorageError::NotFound))
        ));
    }
}
