//! Static curriculum and plan generation.

use chrono::{Duration, NaiveDate};

use crate::model::Difficulty::{Easy, Hard, Medium};
use crate::model::{DayStatus, Difficulty, PlanError, PlanId, StudyDay, Task, TaskKind, UserId};

/// One subtopic within a subject, with its suggested length in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subtopic {
    pub name: &'static str,
    pub difficulty: Difficulty,
    pub days: u32,
}

const fn st(name: &'static str, difficulty: Difficulty, days: u32) -> Subtopic {
    Subtopic {
        name,
        difficulty,
        days,
    }
}

const CURRICULUM: &[(&str, &[Subtopic])] = &[
    (
        "Data Structures",
        &[
            st("Arrays & Strings", Easy, 2),
            st("Linked Lists", Medium, 2),
            st("Stacks & Queues", Medium, 2),
            st("Trees", Hard, 3),
            st("Graphs", Hard, 3),
            st("Hashing", Medium, 2),
        ],
    ),
    (
        "Algorithms",
        &[
            st("Sorting Algorithms", Medium, 2),
            st("Searching Algorithms", Easy, 2),
            st("Recursion & Backtracking", Hard, 3),
            st("Dynamic Programming", Hard, 4),
            st("Greedy Algorithms", Medium, 2),
        ],
    ),
    (
        "DBMS",
        &[
            st("ER Model", Easy, 2),
            st("Normalization", Medium, 2),
            st("SQL Queries", Medium, 3),
            st("Transactions & Concurrency", Hard, 3),
        ],
    ),
    (
        "Operating Systems",
        &[
            st("Process Management", Medium, 2),
            st("CPU Scheduling", Medium, 2),
            st("Memory Management", Hard, 3),
            st("Deadlock", Hard, 2),
        ],
    ),
    (
        "Computer Networks",
        &[
            st("Network Layers", Medium, 2),
            st("TCP/IP Protocol", Medium, 2),
            st("Routing Algorithms", Hard, 2),
            st("Network Security", Hard, 2),
        ],
    ),
    (
        "Python",
        &[
            st("Python Basics", Easy, 2),
            st("OOP in Python", Medium, 2),
            st("File Handling", Easy, 1),
            st("Libraries & Frameworks", Medium, 3),
        ],
    ),
    (
        "Java",
        &[
            st("Java Fundamentals", Easy, 2),
            st("OOP Concepts", Medium, 2),
            st("Collections Framework", Medium, 2),
            st("Multithreading", Hard, 3),
        ],
    ),
    (
        "Web Development",
        &[
            st("HTML & CSS", Easy, 2),
            st("JavaScript Basics", Medium, 2),
            st("Frontend Frameworks", Hard, 3),
            st("Backend Development", Hard, 3),
        ],
    ),
    (
        "Machine Learning",
        &[
            st("Python for ML", Easy, 2),
            st("Linear Regression", Medium, 2),
            st("Classification Algorithms", Medium, 3),
            st("Neural Networks Basics", Hard, 3),
            st("Deep Learning Intro", Hard, 3),
            st("Model Evaluation", Medium, 2),
        ],
    ),
    (
        "System Design",
        &[
            st("System Design Basics", Medium, 2),
            st("Scalability Principles", Hard, 2),
            st("Database Design", Hard, 3),
            st("Caching Strategies", Hard, 2),
            st("Load Balancing", Hard, 2),
            st("Microservices Architecture", Hard, 3),
        ],
    ),
];

/// Subject names in curriculum order.
pub fn subjects() -> impl Iterator<Item = &'static str> {
    CURRICULUM.iter().map(|(name, _)| *name)
}

#[must_use]
pub fn subtopics(subject: &str) -> Option<&'static [Subtopic]> {
    CURRICULUM
        .iter()
        .find(|(name, _)| *name == subject)
        .map(|(_, list)| *list)
}

#[must_use]
pub fn is_known_subject(subject: &str) -> bool {
    subtopics(subject).is_some()
}

//
// ─── PLAN GENERATION ───────────────────────────────────────────────────────────
//

/// Inputs for a full plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest<'a> {
    pub user_id: UserId,
    pub topics: &'a [String],
    pub total_days: u32,
    pub start_date: NaiveDate,
    pub hours_per_day: u32,
}

/// A generated plan plus the subjects that were not in the curriculum.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub days: Vec<StudyDay>,
    pub skipped_subjects: Vec<String>,
    pub compressed: bool,
}

/// Expand the selected subjects into consecutive study days.
///
/// Subtopics are compressed proportionally when the curriculum needs more
/// days than `total_days`; output never exceeds `total_days` rows.
///
/// # Errors
///
/// Returns `PlanError::NoSubtopics` if none of the topics are in the curriculum.
pub fn generate_plan(request: &PlanRequest<'_>) -> Result<GeneratedPlan, PlanError> {
    let mut selected: Vec<Subtopic> = Vec::new();
    let mut skipped_subjects = Vec::new();
    for topic in request.topics {
        match subtopics(topic) {
            Some(list) => selected.extend_from_slice(list),
            None => skipped_subjects.push(topic.clone()),
        }
    }
    if selected.is_empty() {
        return Err(PlanError::NoSubtopics);
    }

    let total_days = request.total_days.max(1);
    let estimated: u32 = selected.iter().map(|s| s.days).sum();
    let compressed = total_days < estimated;
    if compressed {
        for subtopic in &mut selected {
            let scaled = u64::from(subtopic.days) * u64::from(total_days) / u64::from(estimated);
            subtopic.days = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
        }
    }

    let mut days = Vec::new();
    let mut day_number = 1_u32;
    let mut date = request.start_date;
    'outer: for subtopic in &selected {
        for offset in 1..=subtopic.days {
            days.push(StudyDay {
                id: PlanId::generate(),
                user_id: request.user_id,
                day_number,
                plan_date: date,
                topic: subtopic.name.to_string(),
                subtopics: vec![subtopic.name.to_string()],
                tasks: tasks_for_day(subtopic.name, subtopic.difficulty, offset, subtopic.days),
                estimated_hours: f64::from(request.hours_per_day),
                actual_hours: 0.0,
                status: DayStatus::Pending,
                completed_at: None,
            });
            day_number += 1;
            date += Duration::days(1);
            if day_number > total_days {
                break 'outer;
            }
        }
    }

    Ok(GeneratedPlan {
        days,
        skipped_subjects,
        compressed,
    })
}

/// Task list for day `day` (1-based) of a subtopic lasting `span` days.
#[must_use]
pub fn tasks_for_day(topic: &str, difficulty: Difficulty, day: u32, span: u32) -> Vec<Task> {
    if day == 1 {
        vec![
            Task::timed(TaskKind::Video, format!("Introduction to {topic}"), 30),
            Task::timed(TaskKind::Reading, format!("{topic} - Basics"), 45),
            Task::practice(format!("{topic} - Easy Problems"), 3),
        ]
    } else if day == span {
        vec![
            Task::timed(TaskKind::Revision, format!("Review {topic} concepts"), 30),
            Task::practice(format!("{topic} - Mixed Problems"), 5),
            Task::timed(TaskKind::Quiz, format!("{topic} Assessment"), 20),
        ]
    } else {
        vec![
            Task::timed(TaskKind::Reading, format!("{topic} - Advanced Concepts"), 40),
            Task::practice(format!("{topic} - {} Problems", difficulty.title()), 4),
        ]
    }
}
