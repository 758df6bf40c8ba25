//! Per-request pipeline state machine.
//!
//! ```text
//! Idle ─▶ InputsCollected ─▶ Extracting ─┬▶ Extracted ───────┬▶ Generating ─┬▶ Succeeded ─▶ Idle
//!                                        └▶ ExtractionFailed ┘  Querying ───┴▶ Failed ────▶ Idle
//! ```
//!
//! `ExtractionFailed` may still continue to `Generating`: the article is then
//! written without a sample. Querying requires a clean extraction.

use crate::error::ScribeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    InputsCollected,
    Extracting,
    Extracted,
    ExtractionFailed,
    Generating,
    Querying,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    Submit,
    StartExtraction,
    ExtractionSucceeded,
    ExtractionErrored,
    StartGeneration,
    StartQuery,
    Complete,
    Fail,
    Reset,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PipelineState {
    /// State reached by applying `event`, or `InvalidTransition`.
    pub fn next(self, event: PipelineEvent) -> Result<PipelineState, ScribeError> {
        use PipelineEvent as E;
        use PipelineState as S;

        let next = match (self, event) {
            (S::Idle, E::Submit) => S::InputsCollected,
            (S::InputsCollected, E::StartExtraction) => S::Extracting,
            (S::Extracting, E::ExtractionSucceeded) => S::Extracted,
            (S::Extracting, E::ExtractionErrored) => S::ExtractionFailed,
            (S::Extracted | S::ExtractionFailed, E::StartGeneration) => S::Generating,
            (S::Extracted, E::StartQuery) => S::Querying,
            (S::Generating | S::Querying, E::Complete) => S::Succeeded,
            (S::Generating | S::Querying | S::ExtractionFailed, E::Fail) => S::Failed,
            (S::Succeeded | S::Failed, E::Reset) => S::Idle,
            (state, event) => {
                return Err(ScribeError::InvalidTransition {
                    state: state.to_string(),
                    event: event.to_string(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

/// Drives one request through the state machine and keeps the trace.
#[derive(Debug, Clone)]
pub struct Session {
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            trace: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    pub fn apply(&mut self, event: PipelineEvent) -> Result<PipelineState, ScribeError> {
        let next = self.state.next(event)?;
        debug!("Session: {} --{}--> {}", self.state, event, next);
        self.state = next;
        self.trace.push(next);
        Ok(next)
    }

    /// Apply `Fail` if the session is mid-run; no-op once terminal.
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            // Only reachable states accept Fail; anything else stays put.
            let _ = self.apply(PipelineEvent::Fail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineEvent as E;
    use PipelineState as S;

    #[test]
    fn generation_happy_path() {
        let mut s = Session::new();
        for e in [
            E::Submit,
            E::StartExtraction,
            E::ExtractionSucceeded,
            E::StartGeneration,
            E::Complete,
            E::Reset,
        ] {
            s.apply(e).unwrap();
        }
        assert_eq!(
            s.trace(),
            [
                S::Idle,
                S::InputsCollected,
                S::Extracting,
                S::Extracted,
                S::Generating,
                S::Succeeded,
                S::Idle
            ]
        );
    }

    #[test]
    fn extraction_failure_may_still_generate() {
        let state = S::Extracting
            .next(E::ExtractionErrored)
            .and_then(|s| s.next(E::StartGeneration))
            .unwrap();
        assert_eq!(state, S::Generating);
    }

    #[test]
    fn extraction_failure_cannot_query() {
        let err = S::ExtractionFailed.next(E::StartQuery).unwrap_err();
        assert!(matches!(err, ScribeError::InvalidTransition { .. }));
    }

    #[test]
    fn invalid_transition_names_state_and_event() {
        let err = S::Idle.next(E::Complete).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid pipeline transition: Complete while Idle"
        );
    }

    #[test]
    fn fail_is_idempotent_once_terminal() {
        let mut s = Session::new();
        s.apply(E::Submit).unwrap();
        s.apply(E::StartExtraction).unwrap();
        s.apply(E::ExtractionSucceeded).unwrap();
        s.apply(E::StartQuery).unwrap();
        s.fail();
        s.fail();
        assert_eq!(s.state(), S::Failed);
        assert_eq!(s.trace().len(), 6);
    }
}
