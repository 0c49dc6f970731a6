//! Train [`Agent`].
mod cadence;
mod config;
mod sampler;
mod stop;
use crate::{
    base::{Agent, Env, ObsElem},
    error::DistrlError,
    evaluator::Evaluator,
    record::{Record, RecordStorage, RecordValue, Recorder},
    replay_buffer::{ReplayBuffer, SharedReplayBuffer},
    stats::StatsRecorder,
};
use anyhow::{anyhow, Result};
pub use cadence::{is_train_tick, Cadence};
pub use config::{ExecutionMode, TrainerConfig};
use log::{info, trace, warn};
pub use sampler::Sampler;
use std::{
    sync::{Mutex, MutexGuard},
    thread,
    time::Duration,
};
pub use stop::StopHandle;

/// Interval at which blocked threads re-check the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn lock<'a, T>(m: &'a Mutex<T>, what: &'static str) -> Result<MutexGuard<'a, T>, DistrlError> {
    m.lock().map_err(|_| DistrlError::LockPoisoned(what))
}

/// Closes a [`Cadence`] when dropped, also on unwinding.
struct CloseOnDrop<'a>(&'a Cadence);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// Every agent step `t` (counted from 1):
///
/// 1. The agent chooses an action on the stacked state ending at the current frame,
///    the environment is stepped and the transition is stored in the replay buffer.
/// 2. If `t >= warm_up` and `t % train_freq == 0`, a batch is sampled and the agent
///    performs an optimization step. The tick is skipped while the buffer holds no
///    more than `obs_len` transitions.
/// 3. If `t % update_target_freq == 0`, the target network is synchronized.
/// 4. If `t % eval_freq == 0`, the agent is evaluated.
/// 5. If `t % log_freq == 0`, run statistics and aggregated optimization records are
///    written to the recorder.
/// 6. If `t % save_freq == 0`, parameters are saved in `model_dir/t`.
///
/// The loop ends after `max_steps` agent steps or when a stop is requested via
/// [`StopHandle`]. The final parameters are saved in `model_dir/final` and the run
/// statistics in `stats_dir`.
///
/// # Execution modes
///
/// In [`ExecutionMode::Sequential`] the steps above run on the calling thread.
/// In [`ExecutionMode::Overlapped`] a collector thread performs steps 1 and 4-6 with a
/// fork of the agent while the calling thread performs steps 2-3:
///
/// ```mermaid
/// graph LR
///     A[collector] -->|store| B[SharedReplayBuffer]
///     B -->|sample| C[learner]
///     A -->|tick| D[Cadence]
///     D -->|tick| C
///     C -->|write lock| E[model]
///     A -->|read lock| E
/// ```
///
/// The collector runs at most one optimization tick ahead of the learner, so the
/// ratio of optimization steps to agent steps matches the sequential mode. A target
/// synchronization falling between two ticks is performed by the learner before the
/// later tick's update.
pub struct Trainer {
    config: TrainerConfig,
    stop: StopHandle,
    total_steps: usize,
    train_steps: usize,
    target_syncs: usize,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stop: StopHandle::new(),
            total_steps: 0,
            train_steps: 0,
            target_syncs: 0,
        })
    }

    /// Configuration of the trainer.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Handle requesting the training loop to stop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Number of agent steps taken.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Number of optimization steps performed.
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    /// Number of target network synchronizations.
    pub fn target_syncs(&self) -> usize {
        self.target_syncs
    }

    /// Trains the agent on `env`.
    ///
    /// `buffer` must be built for the observation space of `env`, see
    /// [`ReplayBufferConfig::for_observation_space`](crate::replay_buffer::ReplayBufferConfig::for_observation_space).
    pub fn train<E, A, V, R>(
        &mut self,
        env: E,
        agent: &mut A,
        buffer: ReplayBuffer<ObsElem<E>, E::Act>,
        evaluator: &mut V,
        recorder: &mut R,
        stats: &mut StatsRecorder,
    ) -> Result<()>
    where
        E: Env + Send,
        E::Act: Send,
        A: Agent<E> + Send,
        V: Evaluator<E> + Send,
        R: Recorder + Send + ?Sized,
    {
        check_spaces(&env, &buffer)?;
        let buffer = SharedReplayBuffer::new(buffer);
        info!(
            "Start training: mode {}, max_steps {}, warm_up {}, train_freq {}",
            self.config.mode, self.config.max_steps, self.config.warm_up, self.config.train_freq
        );

        let result = match self.config.mode {
            ExecutionMode::Sequential => {
                self.train_sequential(env, agent, &buffer, evaluator, recorder, stats)
            }
            ExecutionMode::Overlapped => {
                self.train_overlapped(env, agent, &buffer, evaluator, recorder, stats)
            }
        };

        if let Some(dir) = &self.config.stats_dir {
            if let Err(e) = stats.save(dir) {
                warn!("Failed to save run statistics in {:?}: {}", dir, e);
            }
        }
        recorder.flush();
        result?;

        if let Some(dir) = &self.config.model_dir {
            let path = dir.join("final");
            agent.save_params(&path)?;
            info!("Saved the final model in {:?}", path);
        }
        info!(
            "Finished training: {} agent steps, {} optimization steps, {} target syncs",
            self.total_steps, self.train_steps, self.target_syncs
        );
        Ok(())
    }

    fn train_sequential<E, A, V, R>(
        &mut self,
        env: E,
        agent: &mut A,
        buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
        evaluator: &mut V,
        recorder: &mut R,
        stats: &mut StatsRecorder,
    ) -> Result<()>
    where
        E: Env,
        A: Agent<E>,
        V: Evaluator<E>,
        R: Recorder + ?Sized,
    {
        let config = self.config.clone();
        let storage = Mutex::new(RecordStorage::new());
        let mut sampler = Sampler::new(env);
        agent.train();

        while self.total_steps < config.max_steps && !self.stop.is_stopped() {
            sampler.sample_and_push(agent, buffer, stats, self.total_steps)?;
            self.total_steps += 1;
            let t = self.total_steps;

            if is_train_tick(t, config.warm_up, config.train_freq) {
                if let Some(record) = optimize(agent, buffer, config.batch_size, t)? {
                    lock(&storage, "record storage")?.store(record);
                    self.train_steps += 1;
                }
            }

            if t % config.update_target_freq == 0 {
                agent.sync_target()?;
                self.target_syncs += 1;
            }

            collector_hooks(&config, t, agent, evaluator, stats, recorder, &storage)?;
        }
        Ok(())
    }

    fn train_overlapped<E, A, V, R>(
        &mut self,
        env: E,
        agent: &mut A,
        buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
        evaluator: &mut V,
        recorder: &mut R,
        stats: &mut StatsRecorder,
    ) -> Result<()>
    where
        E: Env + Send,
        E::Act: Send,
        A: Agent<E> + Send,
        V: Evaluator<E> + Send,
        R: Recorder + Send + ?Sized,
    {
        let config = &self.config;
        let stop = &self.stop;
        let storage = &Mutex::new(RecordStorage::new());
        let cadence = &Cadence::new(config.warm_up, config.train_freq, 1, POLL_INTERVAL);
        agent.train();
        let mut actor = agent.fork(config.seed.wrapping_add(1));
        actor.train();

        let (collected, learned) = thread::scope(|s| {
            let collector = s.spawn(move || {
                let _close = CloseOnDrop(cadence);
                collect(
                    config, env, &mut actor, buffer, cadence, stop, evaluator, stats, recorder,
                    storage,
                )
            });
            let learned = {
                let _close = CloseOnDrop(cadence);
                learn(config, agent, buffer, cadence, stop, storage)
            };
            let collected = collector
                .join()
                .unwrap_or_else(|_| Err(anyhow!("collector thread panicked")));
            (collected, learned)
        });

        // Counters are kept even if one side failed.
        if let Ok(total_steps) = &collected {
            self.total_steps += total_steps;
        }
        if let Ok((train_steps, target_syncs)) = &learned {
            self.train_steps += train_steps;
            self.target_syncs += target_syncs;
        }
        learned?;
        collected?;
        Ok(())
    }
}

/// Validates the spaces of `env` against the replay buffer.
fn check_spaces<E, T, A>(env: &E, buffer: &ReplayBuffer<T, A>) -> Result<(), DistrlError>
where
    E: Env,
    T: crate::base::FrameElem,
    A: Clone + Default,
{
    env.action_space().discrete_n()?;
    let obs_space = env.observation_space();
    obs_space.box_shape()?;
    if obs_space.flat_dim() != buffer.frame_len() {
        return Err(DistrlError::config(format!(
            "frame length of the replay buffer ({}) differs from the observation space {:?}",
            buffer.frame_len(),
            obs_space
        )));
    }
    Ok(())
}

/// Performs an optimization step unless the buffer holds too few transitions.
fn optimize<E, A>(
    agent: &mut A,
    buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
    batch_size: usize,
    t: usize,
) -> Result<Option<Record>>
where
    E: Env,
    A: Agent<E>,
{
    match buffer.sample(batch_size) {
        Ok(batch) => Ok(Some(agent.opt(batch, t)?)),
        Err(DistrlError::InsufficientData { size, required }) => {
            trace!(
                "Skip optimization at step {}: {} transitions, {} required",
                t,
                size,
                required
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Evaluation, logging and checkpointing after agent step `t`.
fn collector_hooks<E, A, V, R>(
    config: &TrainerConfig,
    t: usize,
    agent: &mut A,
    evaluator: &mut V,
    stats: &mut StatsRecorder,
    recorder: &mut R,
    storage: &Mutex<RecordStorage>,
) -> Result<()>
where
    E: Env,
    A: Agent<E>,
    V: Evaluator<E>,
    R: Recorder + ?Sized,
{
    if config.eval_freq > 0 && t % config.eval_freq == 0 {
        agent.eval();
        let record = evaluator.evaluate(agent, stats, t, config.eval_len);
        agent.train();
        lock(storage, "record storage")?.store(record?);
    }

    if t % config.log_freq == 0 {
        let mut record = stats.log_stats(t);
        record.merge_inplace(lock(storage, "record storage")?.aggregate());
        record.insert("step", RecordValue::Scalar(t as f32));
        recorder.write(record);
    }

    if config.save_freq > 0 && t % config.save_freq == 0 {
        if let Some(dir) = &config.model_dir {
            let path = dir.join(t.to_string());
            agent.save_params(&path)?;
            info!("Saved the model in {:?}", path);
        }
    }
    Ok(())
}

/// Collector side of overlapped execution. Returns the number of agent steps.
#[allow(clippy::too_many_arguments)]
fn collect<E, A, V, R>(
    config: &TrainerConfig,
    env: E,
    actor: &mut A,
    buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
    cadence: &Cadence,
    stop: &StopHandle,
    evaluator: &mut V,
    stats: &mut StatsRecorder,
    recorder: &mut R,
    storage: &Mutex<RecordStorage>,
) -> Result<usize>
where
    E: Env,
    A: Agent<E>,
    V: Evaluator<E>,
    R: Recorder + ?Sized,
{
    let mut sampler = Sampler::new(env);
    let mut total_steps = 0;
    while total_steps < config.max_steps && cadence.wait_collect_permit(stop)? {
        sampler.sample_and_push(actor, buffer, stats, total_steps)?;
        total_steps += 1;
        cadence.step_collected(total_steps)?;
        collector_hooks(config, total_steps, actor, evaluator, stats, recorder, storage)?;
    }
    Ok(total_steps)
}

/// Learner side of overlapped execution.
///
/// Returns the number of optimization steps and target synchronizations.
fn learn<E, A>(
    config: &TrainerConfig,
    agent: &mut A,
    buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
    cadence: &Cadence,
    stop: &StopHandle,
    storage: &Mutex<RecordStorage>,
) -> Result<(usize, usize)>
where
    E: Env,
    A: Agent<E>,
{
    let utf = config.update_target_freq;
    let mut train_steps = 0;
    let mut target_syncs = 0;
    let mut prev_tick = 0;

    while let Some(t) = cadence.next_tick(stop)? {
        if (t - 1) / utf > prev_tick / utf {
            agent.sync_target()?;
            target_syncs += 1;
        }
        if let Some(record) = optimize(agent, buffer, config.batch_size, t)? {
            lock(storage, "record storage")?.store(record);
            train_steps += 1;
        }
        if t % utf == 0 {
            agent.sync_target()?;
            target_syncs += 1;
        }
        prev_tick = t;
        cadence.tick_done()?;
    }
    Ok((train_steps, target_syncs))
}
