//! Episode statistics of training and evaluation runs.
use crate::record::{Record, RecordValue};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

/// Which statistics the current episode counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsMode {
    /// Episodes of the training environment.
    Train,

    /// Episodes of evaluation runs.
    Eval,
}

#[derive(Debug, Clone)]
struct EpisodeStats {
    cur_rew: f32,
    cur_len: usize,
    ep_rews: Vec<f32>,
    ep_lens: Vec<usize>,
    env_steps: usize,
    mean_ep_rew: f32,
    mean_ep_len: f32,
    best_mean_rew: f32,
    best_ep_rew: f32,
    ep_last_stats: usize,
}

impl Default for EpisodeStats {
    fn default() -> Self {
        Self {
            cur_rew: 0.0,
            cur_len: 0,
            ep_rews: vec![],
            ep_lens: vec![],
            env_steps: 0,
            mean_ep_rew: f32::NAN,
            mean_ep_len: f32::NAN,
            best_mean_rew: f32::NEG_INFINITY,
            best_ep_rew: f32::NEG_INFINITY,
            ep_last_stats: 0,
        }
    }
}

fn tail_mean<T: Copy + Into<f64>>(data: &[T], n: usize) -> f32 {
    if data.is_empty() {
        return f32::NAN;
    }
    let tail = &data[data.len().saturating_sub(n)..];
    (tail.iter().map(|v| (*v).into()).sum::<f64>() / tail.len() as f64) as f32
}

impl EpisodeStats {
    fn reset_episode(&mut self) {
        self.cur_rew = 0.0;
        self.cur_len = 0;
    }

    fn after_step(&mut self, reward: f32, is_done: bool) {
        self.cur_rew += reward;
        self.cur_len += 1;
        if is_done {
            self.env_steps += self.cur_len;
            self.ep_rews.push(self.cur_rew);
            self.ep_lens.push(self.cur_len);
            self.reset_episode();
        }
    }

    fn update(&mut self, n_ep_stats: usize) {
        self.mean_ep_rew = tail_mean(&self.ep_rews, n_ep_stats);
        let lens: Vec<u32> = self.ep_lens.iter().map(|v| *v as u32).collect();
        self.mean_ep_len = tail_mean(&lens, n_ep_stats);
        // NaN never replaces the best value.
        if self.mean_ep_rew > self.best_mean_rew {
            self.best_mean_rew = self.mean_ep_rew;
        }
        for r in &self.ep_rews[self.ep_last_stats..] {
            self.best_ep_rew = self.best_ep_rew.max(*r);
        }
        self.ep_last_stats = self.ep_rews.len();
    }

    fn record(&self, prefix: &str, record: &mut Record) {
        let scalars = [
            ("env_steps", self.env_steps as f32),
            ("episodes", self.ep_rews.len() as f32),
            ("mean_ep_len", self.mean_ep_len),
            ("mean_ep_reward", self.mean_ep_rew),
            ("best_mean_ep_rew", self.best_mean_rew),
            ("best_episode_rew", self.best_ep_rew),
        ];
        for (k, v) in scalars {
            record.insert(format!("{}/{}", prefix, k), RecordValue::Scalar(v));
        }
    }
}

/// Contents of `stats_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Environment steps in any mode.
    pub total_env_steps: usize,

    /// Environment steps of completed training episodes.
    pub train_env_steps: usize,

    /// Completed training episodes.
    pub train_episodes: usize,

    /// Environment steps of completed evaluation episodes.
    pub eval_env_steps: usize,

    /// Completed evaluation episodes.
    pub eval_episodes: usize,

    /// Smoothed agent steps per second, `None` before the first log.
    pub steps_per_s: Option<f64>,
}

/// Collects per-episode rewards and lengths, separately for training and evaluation.
///
/// The recorder is told about every environment step with [`StatsRecorder::after_step`]
/// and about episode starts with [`StatsRecorder::after_reset`]. Training and
/// evaluation episodes are accumulated separately, so an evaluation run may interrupt a
/// training episode.
#[derive(Debug)]
pub struct StatsRecorder {
    n_ep_stats: usize,
    mode: StatsMode,
    train: EpisodeStats,
    eval: EpisodeStats,
    env_steps: usize,
    steps_per_s: Option<f64>,
    t_last_log: Instant,
    step_last_log: usize,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StatsRecorder {
    /// `n_ep_stats` is the number of most recent episodes the means are taken over.
    pub fn new(n_ep_stats: usize) -> Self {
        Self {
            n_ep_stats: n_ep_stats.max(1),
            mode: StatsMode::Train,
            train: EpisodeStats::default(),
            eval: EpisodeStats::default(),
            env_steps: 0,
            steps_per_s: None,
            t_last_log: Instant::now(),
            step_last_log: 0,
        }
    }

    /// Mode the next steps are counted in.
    pub fn mode(&self) -> StatsMode {
        self.mode
    }

    /// Sets the mode the next steps are counted in.
    pub fn set_mode(&mut self, mode: StatsMode) {
        self.mode = mode;
    }

    fn current(&mut self) -> &mut EpisodeStats {
        match self.mode {
            StatsMode::Train => &mut self.train,
            StatsMode::Eval => &mut self.eval,
        }
    }

    /// Starts a new episode in the current mode.
    pub fn after_reset(&mut self) {
        self.current().reset_episode();
    }

    /// Counts an environment step in the current mode.
    pub fn after_step(&mut self, reward: f32, is_done: bool) {
        self.env_steps += 1;
        self.current().after_step(reward, is_done);
    }

    /// Environment steps in any mode.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Completed training episodes.
    pub fn train_episodes(&self) -> usize {
        self.train.ep_rews.len()
    }

    /// Completed evaluation episodes.
    pub fn eval_episodes(&self) -> usize {
        self.eval.ep_rews.len()
    }

    /// Rewards of completed training episodes.
    pub fn train_ep_rews(&self) -> &[f32] {
        &self.train.ep_rews
    }

    /// Rewards of completed evaluation episodes.
    pub fn eval_ep_rews(&self) -> &[f32] {
        &self.eval.ep_rews
    }

    /// Mean reward of the last `n_ep_stats` training episodes, NaN without episodes.
    pub fn mean_ep_rew(&self) -> f32 {
        tail_mean(&self.train.ep_rews, self.n_ep_stats)
    }

    /// Mean reward of evaluation episodes completed since `from`.
    pub fn mean_eval_rew_since(&self, from: usize) -> f32 {
        let rews = &self.eval.ep_rews[from.min(self.eval.ep_rews.len())..];
        tail_mean(rews, rews.len())
    }

    fn compute_runtime_stats(&mut self, step: usize) {
        self.train.update(self.n_ep_stats);
        self.eval.update(self.n_ep_stats);

        let now = Instant::now();
        if self.mode == StatsMode::Train {
            let secs = now.duration_since(self.t_last_log).as_secs_f64();
            if secs > 0.0 {
                let sps = step.saturating_sub(self.step_last_log) as f64 / secs;
                self.steps_per_s = Some(match self.steps_per_s {
                    Some(prev) => (sps + prev) / 2.0,
                    None => sps,
                });
            }
            self.step_last_log = step;
        }
        self.t_last_log = now;
    }

    /// Updates the runtime statistics at agent step `step`, logs them and returns them
    /// as a record.
    pub fn log_stats(&mut self, step: usize) -> Record {
        self.compute_runtime_stats(step);

        let mut record = Record::empty();
        record.insert("train/agent_steps", RecordValue::Scalar(step as f32));
        record.insert(
            "train/mean_steps_per_sec",
            RecordValue::Scalar(self.steps_per_s.unwrap_or(f64::NAN) as f32),
        );
        self.train.record("train", &mut record);
        self.eval.record("eval", &mut record);

        let n = self.n_ep_stats;
        info!("");
        info!("{:<40}{:>12}", "train/agent_steps", step);
        info!(
            "{:<40}{:>12.3}",
            "train/mean_steps_per_sec",
            self.steps_per_s.unwrap_or(f64::NAN)
        );
        for (prefix, stats) in [("train", &self.train), ("eval", &self.eval)] {
            info!("{:<40}{:>12}", format!("{}/env_steps", prefix), stats.env_steps);
            info!("{:<40}{:>12}", format!("{}/episodes", prefix), stats.ep_rews.len());
            info!(
                "{:<40}{:>12.3}",
                format!("{}/mean_ep_len ({} eps)", prefix, n),
                stats.mean_ep_len
            );
            info!(
                "{:<40}{:>12.3}",
                format!("{}/mean_ep_reward ({} eps)", prefix, n),
                stats.mean_ep_rew
            );
            info!(
                "{:<40}{:>12.3}",
                format!("{}/best_mean_ep_rew ({} eps)", prefix, n),
                stats.best_mean_rew
            );
            info!(
                "{:<40}{:>12.3}",
                format!("{}/best_episode_rew", prefix),
                stats.best_ep_rew
            );
        }
        info!("");

        record
    }

    /// Totals written to `stats_summary.json`.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total_env_steps: self.env_steps,
            train_env_steps: self.train.env_steps,
            train_episodes: self.train.ep_rews.len(),
            eval_env_steps: self.eval.env_steps,
            eval_episodes: self.eval.ep_rews.len(),
            steps_per_s: self.steps_per_s,
        }
    }

    /// Writes `stats_summary.json` and the per-episode rewards into `dir`.
    ///
    /// Each file is written to a temporary file first and then renamed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        atomic_write(
            &dir.join("stats_summary.json"),
            serde_json::to_string_pretty(&self.summary())?.as_bytes(),
        )?;
        if !self.train.ep_rews.is_empty() {
            atomic_write(
                &dir.join("train_ep_rews.json"),
                serde_json::to_string(&self.train.ep_rews)?.as_bytes(),
            )?;
        }
        if !self.eval.ep_rews.is_empty() {
            atomic_write(
                &dir.join("eval_ep_rews.json"),
                serde_json::to_string(&self.eval.ep_rews)?.as_bytes(),
            )?;
        }
        Ok(())
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("json.tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}
