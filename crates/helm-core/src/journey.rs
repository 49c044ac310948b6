//! Guided-lesson ("journey") programs.

use serde::{Deserialize, Serialize};

/// One lesson in a journey program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Stable lesson identifier.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// Short description shown in the program overview.
    pub description: String,
    /// Content guideline handed to the model when the lesson starts.
    pub content: String,
}

/// An ordered lesson program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyProgram {
    /// Stable program identifier.
    pub id: String,
    /// Program title (doubles as the session name).
    pub title: String,
    /// Short description shown in the selector.
    pub description: String,
    /// Lessons in teaching order.
    pub lessons: Vec<Lesson>,
}

/// Per-session journey progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyState {
    /// The program being followed.
    pub program: JourneyProgram,
    /// Index of the current lesson, always within `[0, lessons.len() - 1]`.
    pub current_lesson_index: usize,
}

impl JourneyState {
    /// Start a program at its first lesson.
    #[must_use]
    pub fn new(program: JourneyProgram) -> Self {
        Self {
            program,
            current_lesson_index: 0,
        }
    }

    /// The current lesson.
    #[must_use]
    pub fn current_lesson(&self) -> Option<&Lesson> {
        self.program.lessons.get(self.current_lesson_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> JourneyProgram {
        JourneyProgram {
            id: "rust-101".into(),
            title: "Rust Foundations".into(),
            description: "Ownership to async".into(),
            lessons: vec![
                Lesson {
                    id: "l1".into(),
                    title: "Ownership".into(),
                    description: "Moves and borrows".into(),
                    content: "Teach ownership with small examples".into(),
                },
                Lesson {
                    id: "l2".into(),
                    title: "Lifetimes".into(),
                    description: "Borrow scopes".into(),
                    content: "Teach lifetimes starting from dangling references".into(),
                },
            ],
        }
    }

    #[test]
    fn starts_at_first_lesson() {
        let state = JourneyState::new(program());
        assert_eq!(state.current_lesson_index, 0);
        assert_eq!(state.current_lesson().unwrap().id, "l1");
    }

    #[test]
    fn serde_round_trip() {
        let state = JourneyState::new(program());
        let json = serde_json::to_string(&state).unwrap();
        let back: JourneyState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let state = JourneyState::new(program());
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("currentLessonIndex").is_some());
    }
}
