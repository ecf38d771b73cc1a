use serde::{Serialize, Deserialize};

/// Loss accumulated between two epoch reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochStats {
    total_loss: f64,
    updates: u64,
}

impl EpochStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the loss of one training step
    pub fn record_loss(&mut self, loss: f32) {
        self.total_loss += f64::from(loss);
        self.updates += 1;
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Mean loss since the last reset, 0 when nothing was trained
    pub fn average_loss(&self) -> f32 {
        if self.updates == 0 {
            0.0
        } else {
            (self.total_loss / self.updates as f64) as f32
        }
    }

    pub fn reset(&mut self) {
        self.total_loss = 0.0;
        self.updates = 0;
    }
}

/// Running reward of the current episode plus the totals of finished ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeRewards {
    current: f32,
    history: Vec<f32>,
}

impl EpisodeRewards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reward: f32) {
        self.current += reward;
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn history(&self) -> &[f32] {
        &self.history
    }

    /// Close the current episode: its total joins the history and the running sum restarts at 0.
    pub fn finish_episode(&mut self) -> f32 {
        let total = std::mem::take(&mut self.current);
        self.history.push(total);
        total
    }
}
