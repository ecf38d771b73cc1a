use ndarray::Array1;

use crate::replay_buffer::Transition;

/// Where the current episode stands with respect to the one-step reporting lag.
///
/// The environment reports the reward and termination flag for an action together with the
/// *next* observation, so a transition can only be completed one message later.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodePhase {
    AwaitingFirstObservation,
    Stepping { state: Array1<f32>, action: usize },
    Ended,
}

#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    phase: EpisodePhase,
}

impl EpisodeTracker {
    pub fn new() -> Self {
        EpisodeTracker { phase: EpisodePhase::AwaitingFirstObservation }
    }

    pub fn phase(&self) -> &EpisodePhase {
        &self.phase
    }

    /// True when the next observation opens a new episode.
    pub fn is_first_step(&self) -> bool {
        !matches!(self.phase, EpisodePhase::Stepping { .. })
    }

    /// Complete the pending transition with the outcome reported alongside `next_state`.
    ///
    /// Returns `None` on the first observation of an episode, where no action is pending.
    pub fn complete(&mut self, reward: f32, next_state: &Array1<f32>, done: bool) -> Option<Transition> {
        match std::mem::replace(&mut self.phase, EpisodePhase::AwaitingFirstObservation) {
            EpisodePhase::Stepping { state, action } => Some(Transition {
                state,
                action,
                reward,
                next_state: next_state.clone(),
                done,
            }),
            EpisodePhase::AwaitingFirstObservation | EpisodePhase::Ended => None,
        }
    }

    /// Remember the action chosen for `state` until its outcome arrives.
    pub fn record_action(&mut self, state: Array1<f32>, action: usize) {
        self.phase = EpisodePhase::Stepping { state, action };
    }

    pub fn end(&mut self) {
        self.phase = EpisodePhase::Ended;
    }

    /// Drop any pending action; the next observation starts afresh.
    pub fn reset(&mut self) {
        self.phase = EpisodePhase::AwaitingFirstObservation;
    }
}

impl Default for EpisodeTracker {
    fn default() -> Self {
        Self::new()
    }
}
