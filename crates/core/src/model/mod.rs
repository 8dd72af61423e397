mod analytics;
mod chat;
mod ids;
mod plan;
mod profile;
mod quiz;
mod resource;
mod user;

pub use ids::{MessageId, ParseIdError, PlanId, QuizId, ResourceId, SessionId, UserId};

pub use analytics::DailyAnalytics;
pub use chat::{ChatMessage, ChatSession, Role, SessionContext};
pub use plan::{DayStatus, PlanError, StudyDay, Task, TaskKind};
pub use profile::{
    Level, MIN_DAYS_PER_TOPIC, OnboardingChoices, SELF_PACED_DAYS_PER_TOPIC, StudentProfile,
    planned_days,
};
pub use quiz::{
    Answers, CodingQuestion, DescriptiveQuestion, Difficulty, McqQuestion, POINTS_PER_QUESTION,
    Question, QuestionFeedback, Quiz, QuizKind, QuizResponse, QuizStatus, percentage,
};
pub use resource::{Resource, ResourceChunk};
pub use user::{NewUser, User};
