//! Running statistics of episode scores.

/// Tracks the running average score and the scores of the current process.
///
/// The running average continues across resumed runs: the average restored
/// from a [`Checkpoint`](crate::Checkpoint) stands for all the episodes before it.
#[derive(Debug, Clone, Default)]
pub struct ScoreTracker {
    average: f32,
    scores: Vec<f32>,
}

impl ScoreTracker {
    /// Starts tracking with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues tracking from an average over earlier episodes.
    pub fn resume(average: f32) -> Self {
        Self {
            average,
            scores: Vec::new(),
        }
    }

    /// Adds the score of episode `episode` (1-based) and returns the new average.
    pub fn push(&mut self, episode: usize, score: f32) -> f32 {
        let n = episode.max(1) as f32;
        self.average = (self.average * (n - 1.0) + score) / n;
        self.scores.push(score);
        self.average
    }

    /// Running average score.
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Mean of the last `n` scores of this process, `0` if there is none.
    pub fn recent_mean(&self, n: usize) -> f32 {
        let start = self.scores.len().saturating_sub(n);
        let recent = &self.scores[start..];
        if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f32>() / recent.len() as f32
        }
    }

    /// Scores pushed in this process.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }
}
