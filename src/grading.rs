// src/grading.rs
//
// Pure grading logic for the Submission Processor. Handlers load the
// authoritative question set and delegate here, so scoring stays
// testable without a database. The keep-best merge of a graded attempt
// into the stored result lives in the submission handler's conditional
// upsert, where it is atomic.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    question::Question,
    result::{AnswerDetail, SubmittedAnswer},
};

/// Outcome of grading one submitted answer set against an exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAttempt {
    pub correct: i32,
    /// Attempted-and-incorrect. Unanswered questions are absent from the
    /// submission and count toward neither `correct` nor `wrong`.
    pub wrong: i32,
    /// One point per correct answer; no partial credit or negative marking.
    pub score: i32,
    /// Full size of the exam's question set, regardless of how many
    /// answers were submitted.
    pub total_questions: i32,
    pub details: Vec<AnswerDetail>,
}

/// Grades a submission. Answers referencing question ids not present in
/// the exam are dropped silently to tolerate client/server question-set
/// drift; a partially-valid attempt is still graded.
pub fn grade(questions: &[Question], submitted: &[SubmittedAnswer]) -> GradedAttempt {
    let key: HashMap<Uuid, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    let mut correct = 0;
    let mut details = Vec::with_capacity(submitted.len());

    for answer in submitted {
        let Some(question) = key.get(&answer.question_id) else {
            tracing::debug!(
                "Dropping answer for unknown question {}",
                answer.question_id
            );
            continue;
        };

        let is_correct = question.correct_index == answer.selected_index;
        if is_correct {
            correct += 1;
        }

        details.push(AnswerDetail {
            question_id: answer.question_id,
            selected_index: answer.selected_index,
            correct_index: question.correct_index,
            is_correct,
        });
    }

    let graded = details.len() as i32;

    GradedAttempt {
        correct,
        wrong: graded - correct,
        score: correct,
        total_questions: questions.len() as i32,
        details,
    }
}
