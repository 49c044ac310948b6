//! Persona modes and the specialist taxonomy.
//!
//! A [`Mode`] selects the system instruction (and for exactly two modes, a
//! tool set) for a session. The eight [`Specialist`]s back the squad mode's
//! delegation functions: each maps to a delegation function name and a
//! persona whose instruction scopes the specialist's isolated conversation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shared guidance for modes that may require a blocking user answer.
const PAUSE_GUIDANCE: &str = "When you need a required answer from the user before \
you can continue, emit the literal tag [PAUSE_INTERACTION: \"<your question>\"] \
and stop generating.";

/// Persona mode for a session.
///
/// A fixed enumeration: each variant maps to a built-in system instruction.
/// `Squad` additionally carries the delegation function set and `Academic`
/// the provider's web-search tool; every other mode has no tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Patient teaching persona.
    Learn,
    /// Project planning and architecture persona.
    Build,
    /// Code improvement persona.
    Refactor,
    /// Bug hunting persona.
    Debug,
    /// Algorithm design persona.
    Logic,
    /// Vulnerability analysis persona.
    Security,
    /// Performance tuning persona.
    Optimizer,
    /// Documentation writing persona.
    Documenter,
    /// Coordinator persona that delegates sub-tasks to specialists.
    Squad,
    /// Research persona with web search.
    Academic,
    /// Guided-lesson persona.
    Journey,
    /// Code review persona.
    Judge,
    /// Single-topic deep-dive persona.
    Focus,
    /// User-configured persona.
    Custom,
}

impl Mode {
    /// All modes, in launchpad order.
    pub const ALL: [Self; 14] = [
        Self::Learn,
        Self::Build,
        Self::Refactor,
        Self::Debug,
        Self::Logic,
        Self::Security,
        Self::Optimizer,
        Self::Documenter,
        Self::Squad,
        Self::Academic,
        Self::Journey,
        Self::Judge,
        Self::Focus,
        Self::Custom,
    ];

    /// Human-facing name shown in the session dock and welcome message.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Learn => "Learn",
            Self::Build => "Build",
            Self::Refactor => "Refactor",
            Self::Debug => "Debug",
            Self::Logic => "Logic",
            Self::Security => "Security",
            Self::Optimizer => "Optimizer",
            Self::Documenter => "Documenter",
            Self::Squad => "Squad",
            Self::Academic => "Academic",
            Self::Journey => "Journey",
            Self::Judge => "Judge",
            Self::Focus => "Focus",
            Self::Custom => "Custom AI",
        }
    }

    /// The built-in system instruction for this mode.
    #[must_use]
    pub fn system_instruction(self) -> String {
        let base = match self {
            Self::Learn => {
                "You are the Instructor AI, a patient software teacher. Explain \
                 concepts step by step, starting from what the user already knows, \
                 and check understanding with short questions."
            }
            Self::Build => {
                "You are the Architect AI. Turn vague ideas into concrete project \
                 plans: break work into milestones, name the components and their \
                 responsibilities, and call out risks early."
            }
            Self::Refactor => {
                "You are the Refactor AI. Improve the code you are given without \
                 changing its behavior: simplify control flow, remove duplication, \
                 and explain every transformation you apply."
            }
            Self::Debug => {
                "You are the Debugger AI. Given symptoms or failing code, form \
                 hypotheses, narrow them down methodically, and present the most \
                 likely root cause with a minimal fix."
            }
            Self::Logic => {
                "You are the Logic AI. Design algorithms and data structures: \
                 state the problem precisely, discuss complexity trade-offs, and \
                 walk through edge cases before presenting a solution."
            }
            Self::Security => {
                "You are the Security AI. Review code and designs for \
                 vulnerabilities: injection, unsafe deserialization, auth flaws, \
                 secret handling. Rank findings by severity and suggest fixes."
            }
            Self::Optimizer => {
                "You are the Optimizer AI. Find performance problems: measure \
                 first, name the bottleneck, and propose the smallest change with \
                 the largest win. Avoid speculative micro-optimizations."
            }
            Self::Documenter => {
                "You are the Documenter AI. Write clear documentation for the \
                 code you are given: public API references, usage examples, and \
                 honest notes about limitations."
            }
            Self::Squad => {
                "You are the Squad coordinator, leading a team of eight \
                 specialist AIs. Analyze the user's request, formulate a plan, \
                 and delegate concrete sub-tasks through your delegation \
                 functions (delegateToArchitect, delegateToInstructor, \
                 delegateToRefactor, delegateToDebugger, delegateToLogic, \
                 delegateToSecurity, delegateToOptimizer, delegateToDocumenter). \
                 When you inline a specialist's report in your answer, wrap it in \
                 [DELEGATE_START:<name>] and [DELEGATE_END:<name>] tags. \
                 Synthesize the specialist results into one coherent answer."
            }
            Self::Academic => {
                "You are the Academic AI, a research assistant. Use web search to \
                 ground your answers in current sources, cite what you found, and \
                 distinguish established results from speculation."
            }
            Self::Journey => {
                "You are a guided-lesson teacher. The user follows a structured \
                 program; each lesson prompt names a title and a content \
                 guideline. Teach exactly that lesson, end with a short exercise, \
                 and do not skip ahead."
            }
            Self::Judge => {
                "You are the Judge AI. Review the submitted code ruthlessly but \
                 fairly: list what is good, list what must improve, and finish \
                 with a one-line verdict."
            }
            Self::Focus => {
                "You are a focus companion for a single message thread. Stay \
                 strictly on the topic of the seeded message and go deep rather \
                 than broad."
            }
            Self::Custom => {
                "You are a helpful, direct software assistant configured by the \
                 user."
            }
        };
        match self {
            Self::Learn | Self::Journey | Self::Squad => format!("{base}\n\n{PAUSE_GUIDANCE}"),
            _ => base.to_owned(),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Specialists
// ─────────────────────────────────────────────────────────────────────────────

/// The eight squad specialists, each bound to a delegation function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialist {
    /// Project planning.
    Architect,
    /// Concept explanation.
    Instructor,
    /// Code improvement.
    Refactor,
    /// Bug finding.
    Debugger,
    /// Algorithm design.
    Logic,
    /// Vulnerability analysis.
    Security,
    /// Performance improvement.
    Optimizer,
    /// Documentation writing.
    Documenter,
}

impl Specialist {
    /// All specialists, in delegation-function declaration order.
    pub const ALL: [Self; 8] = [
        Self::Architect,
        Self::Instructor,
        Self::Refactor,
        Self::Debugger,
        Self::Logic,
        Self::Security,
        Self::Optimizer,
        Self::Documenter,
    ];

    /// The delegation function name the coordinator calls.
    #[must_use]
    pub fn function_name(self) -> &'static str {
        match self {
            Self::Architect => "delegateToArchitect",
            Self::Instructor => "delegateToInstructor",
            Self::Refactor => "delegateToRefactor",
            Self::Debugger => "delegateToDebugger",
            Self::Logic => "delegateToLogic",
            Self::Security => "delegateToSecurity",
            Self::Optimizer => "delegateToOptimizer",
            Self::Documenter => "delegateToDocumenter",
        }
    }

    /// One-line description used in the delegation function declaration.
    #[must_use]
    pub fn task_description(self) -> &'static str {
        match self {
            Self::Architect => "Delegates a task to the Architect AI for project planning.",
            Self::Instructor => "Delegates a task to the Instructor AI for explaining concepts.",
            Self::Refactor => "Delegates a task to the Refactor AI for improving code.",
            Self::Debugger => "Delegates a task to the Debugger AI for finding bugs.",
            Self::Logic => "Delegates a task to the Logic AI for algorithm design.",
            Self::Security => "Delegates a task to the Security AI for vulnerability analysis.",
            Self::Optimizer => "Delegates a task to the Optimizer AI for performance improvements.",
            Self::Documenter => "Delegates a task to the Documenter AI for writing documentation.",
        }
    }

    /// The persona mode whose system instruction scopes this specialist's
    /// isolated conversation.
    #[must_use]
    pub fn mode(self) -> Mode {
        match self {
            Self::Architect => Mode::Build,
            Self::Instructor => Mode::Learn,
            Self::Refactor => Mode::Refactor,
            Self::Debugger => Mode::Debug,
            Self::Logic => Mode::Logic,
            Self::Security => Mode::Security,
            Self::Optimizer => Mode::Optimizer,
            Self::Documenter => Mode::Documenter,
        }
    }

    /// Resolve a delegation function name back to its specialist.
    #[must_use]
    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.function_name() == name)
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Architect => "architect",
            Self::Instructor => "instructor",
            Self::Refactor => "refactor",
            Self::Debugger => "debugger",
            Self::Logic => "logic",
            Self::Security => "security",
            Self::Optimizer => "optimizer",
            Self::Documenter => "documenter",
        };
        f.write_str(name)
    }
}

/// Progress state of one specialist within a delegation-bearing turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistStatus {
    /// No dispatch issued this turn.
    #[default]
    Idle,
    /// Dispatch in flight.
    Working,
    /// Dispatch returned a result.
    Complete,
    /// Dispatch failed; an error string was substituted.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Squad).unwrap(), "\"squad\"");
        let back: Mode = serde_json::from_str("\"academic\"").unwrap();
        assert_eq!(back, Mode::Academic);
    }

    #[test]
    fn every_mode_has_instruction_and_name() {
        for mode in Mode::ALL {
            assert!(!mode.system_instruction().is_empty());
            assert!(!mode.display_name().is_empty());
        }
    }

    #[test]
    fn pause_guidance_only_on_interactive_modes() {
        assert!(Mode::Squad.system_instruction().contains("PAUSE_INTERACTION"));
        assert!(Mode::Journey.system_instruction().contains("PAUSE_INTERACTION"));
        assert!(!Mode::Debug.system_instruction().contains("PAUSE_INTERACTION"));
    }

    #[test]
    fn specialist_function_names_round_trip() {
        for s in Specialist::ALL {
            assert_eq!(Specialist::from_function_name(s.function_name()), Some(s));
        }
        assert_eq!(Specialist::from_function_name("delegateToNobody"), None);
    }

    #[test]
    fn specialist_modes_are_distinct() {
        let mut modes: Vec<Mode> = Specialist::ALL.iter().map(|s| s.mode()).collect();
        modes.dedup();
        assert_eq!(modes.len(), 8);
    }

    #[test]
    fn squad_instruction_names_every_function() {
        let instruction = Mode::Squad.system_instruction();
        for s in Specialist::ALL {
            assert!(instruction.contains(s.function_name()));
        }
    }

    #[test]
    fn specialist_status_default_is_idle() {
        assert_eq!(SpecialistStatus::default(), SpecialistStatus::Idle);
    }
}
