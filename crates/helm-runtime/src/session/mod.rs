//! Session control: the capped multi-session registry and the per-session
//! turn state machine (`Idle → Sending → Streaming → [Idle | AwaitingAnswer]`).

pub mod controller;

pub use controller::{APOLOGY, ControllerConfig, SessionController, SessionOverview};
