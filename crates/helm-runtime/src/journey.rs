//! Guided-lesson navigation.
//!
//! Lesson transitions are automatic prompts synthesized from the lesson's
//! title and content guideline. Navigation clamps to the program bounds; a
//! step outside them is a no-op and emits nothing.

use helm_core::journey::{JourneyProgram, Lesson};
use helm_core::messages::ChatMessage;

/// Navigation direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Advance to the next lesson.
    Next,
    /// Return to the previous lesson.
    Prev,
}

/// The index reached by stepping from `current`, or `None` when the step
/// would leave `[0, len - 1]`.
#[must_use]
pub fn step(current: usize, len: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Next => {
            let next = current + 1;
            (next < len).then_some(next)
        }
        Direction::Prev => current.checked_sub(1),
    }
}

/// The automatic prompt that opens a journey.
#[must_use]
pub fn opening_prompt(program: &JourneyProgram) -> Option<String> {
    let first = program.lessons.first()?;
    Some(format!(
        "Let's begin the journey \"{}\". Please teach me the first lesson: \"{}\". \
         Here is the content guideline: \"{}\"",
        program.title, first.title, first.content
    ))
}

/// The automatic prompt for moving to `lesson`.
#[must_use]
pub fn advance_prompt(lesson: &Lesson) -> String {
    format!(
        "Great, let's move to the next lesson: \"{}\". Here is the content guideline: \"{}\"",
        lesson.title, lesson.content
    )
}

/// The lesson-focused view: automatic messages (lesson transitions, driver
/// prompts, interaction answers) are hidden; the full log keeps them for
/// thread reconstruction.
#[must_use]
pub fn lesson_view(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    messages.iter().filter(|m| !m.auto).collect()
}
