//! Timed command sequences.
//!
//! A [`Sequence`] is a list of frames, each scheduled at an offset from the
//! moment the sequence starts. [`Keyer::run_sequence`](crate::keyer::Keyer::run_sequence)
//! awaits each offset in turn and writes the frame as a raw send.

use std::time::Duration;

use crate::commands::{AdminCommand, cmd_admin};

/// One scheduled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Offset from the start of the sequence.
    pub at: Duration,
    pub frame: Vec<u8>,
    /// Log line emitted when the step runs.
    pub label: String,
}

/// An ordered list of [`Step`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    name: String,
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step at `at` from the start.
    ///
    /// Offsets earlier than the previous step run immediately after it.
    pub fn step(mut self, at: Duration, frame: Vec<u8>, label: impl Into<String>) -> Self {
        self.steps.push(Step {
            at,
            frame,
            label: label.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Total scheduled duration (offset of the last step).
    pub fn duration(&self) -> Duration {
        self.steps.iter().map(|s| s.at).max().unwrap_or_default()
    }

    /// The basic WK3 self test: reset, open, echo test, then `A` to be
    /// echoed back.
    pub fn basic_test() -> Self {
        Sequence::new("basic WK3 test")
            .step(
                Duration::ZERO,
                cmd_admin(AdminCommand::Reset),
                "Reset sent (Admin:Reset)",
            )
            .step(
                Duration::from_millis(1000),
                cmd_admin(AdminCommand::Open),
                "Admin:Open sent",
            )
            .step(
                Duration::from_millis(2000),
                cmd_admin(AdminCommand::EchoTest),
                "Echo Test command sent",
            )
            .step(
                Duration::from_millis(2100),
                vec![b'A'],
                "Sending 'A' for echo test",
            )
    }
}
