use anyhow::Result;
use distrl_core::{
    dummy::{ChainEnv, ChainEnvConfig, LinearModel},
    explorer::EpsilonGreedy,
    record::BufferedRecorder,
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    schedule::Schedule,
    stats::StatsRecorder,
    C51Config, DefaultEvaluator, Env, ExecutionMode, Trainer, TrainerConfig, C51,
};
use std::{fs, thread, time::Duration};
use tempdir::TempDir;

const N_ATOMS: usize = 11;
const MAX_STEPS: usize = 200;
const WARM_UP: usize = 20;
const TRAIN_FREQ: usize = 4;
const UPDATE_TARGET_FREQ: usize = 50;
const BATCH_SIZE: usize = 16;
const EVAL_FREQ: usize = 100;
const EVAL_LEN: usize = 30;
const LOG_FREQ: usize = 50;
const REPLAY_BUFFER_CAPACITY: usize = 1000;

type Agent = C51<ChainEnv, LinearModel>;

struct Setup {
    env: ChainEnv,
    agent: Agent,
    buffer: ReplayBuffer<f32, usize>,
    evaluator: DefaultEvaluator<ChainEnv>,
}

fn setup(env_config: &ChainEnvConfig) -> Result<Setup> {
    let env = ChainEnv::build(env_config, 0)?;
    let buffer_config = ReplayBufferConfig::default()
        .capacity(REPLAY_BUFFER_CAPACITY)
        .for_observation_space(&env.observation_space())?;
    let model = LinearModel::new(buffer_config.state_len(), 2, N_ATOMS, 0);
    let agent_config = C51Config::default()
        .support(-1.0, 1.0, N_ATOMS)
        .discount_factor(0.9)
        .explorer(EpsilonGreedy::new(Schedule::linear(1.0, 0.1, MAX_STEPS)))
        .lr_schedule(Schedule::constant(0.1));
    Ok(Setup {
        agent: C51::build(agent_config, model)?,
        buffer: ReplayBuffer::build(&buffer_config)?,
        evaluator: DefaultEvaluator::new(env_config, 1, &buffer_config)?,
        env,
    })
}

fn trainer_config(mode: ExecutionMode) -> TrainerConfig {
    TrainerConfig::default()
        .max_steps(MAX_STEPS)
        .warm_up(WARM_UP)
        .train_freq(TRAIN_FREQ)
        .update_target_freq(UPDATE_TARGET_FREQ)
        .batch_size(BATCH_SIZE)
        .eval(EVAL_FREQ, EVAL_LEN)
        .log_freq(LOG_FREQ)
        .mode(mode)
}

fn train(config: TrainerConfig, env_config: &ChainEnvConfig) -> Result<(Trainer, BufferedRecorder, StatsRecorder)> {
    let Setup {
        env,
        mut agent,
        buffer,
        mut evaluator,
    } = setup(env_config)?;
    let mut trainer = Trainer::build(config)?;
    let mut recorder = BufferedRecorder::new();
    let mut stats = StatsRecorder::new(10);
    trainer.train(env, &mut agent, buffer, &mut evaluator, &mut recorder, &mut stats)?;
    Ok((trainer, recorder, stats))
}

#[test]
fn test_sequential_and_overlapped_counters_agree() -> Result<()> {
    let env_config = ChainEnvConfig::default();
    let (seq, seq_recorder, seq_stats) = train(trainer_config(ExecutionMode::Sequential), &env_config)?;
    let (ovl, ovl_recorder, ovl_stats) = train(trainer_config(ExecutionMode::Overlapped), &env_config)?;

    // Ticks at 20, 24, ..., 200.
    let n_ticks = (WARM_UP..=MAX_STEPS).filter(|t| t % TRAIN_FREQ == 0).count();
    for (trainer, recorder, stats) in [(&seq, &seq_recorder, &seq_stats), (&ovl, &ovl_recorder, &ovl_stats)] {
        assert_eq!(trainer.total_steps(), MAX_STEPS);
        assert_eq!(trainer.train_steps(), n_ticks);
        assert_eq!(recorder.len(), MAX_STEPS / LOG_FREQ);
        assert!(stats.train_episodes() > 0);
        assert!(stats.eval_episodes() > 0);
    }
    assert_eq!(seq.target_syncs(), MAX_STEPS / UPDATE_TARGET_FREQ);
    assert_eq!(ovl.target_syncs(), MAX_STEPS / UPDATE_TARGET_FREQ);
    Ok(())
}

#[test]
fn test_records_carry_step_and_loss() -> Result<()> {
    let (_, recorder, _) = train(trainer_config(ExecutionMode::Sequential), &ChainEnvConfig::default())?;
    let steps = recorder
        .iter()
        .map(|r| r.get_scalar("step"))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(steps, vec![50.0, 100.0, 150.0, 200.0]);
    let last = recorder.iter().last().unwrap();
    assert!(last.get_scalar("train/loss_mean")?.is_finite());
    assert!(last.get_scalar("train/env_steps").is_ok());
    Ok(())
}

#[test]
fn test_stop_before_start() -> Result<()> {
    let Setup {
        env,
        mut agent,
        buffer,
        mut evaluator,
    } = setup(&ChainEnvConfig::default())?;
    let mut trainer = Trainer::build(trainer_config(ExecutionMode::Overlapped))?;
    trainer.stop_handle().stop();
    trainer.train(
        env,
        &mut agent,
        buffer,
        &mut evaluator,
        &mut BufferedRecorder::new(),
        &mut StatsRecorder::default(),
    )?;
    assert_eq!(trainer.total_steps(), 0);
    assert_eq!(trainer.train_steps(), 0);
    Ok(())
}

#[test]
fn test_stop_overlapped_run_while_training() -> Result<()> {
    let Setup {
        env,
        mut agent,
        buffer,
        mut evaluator,
    } = setup(&ChainEnvConfig::default())?;
    let max_steps = 100_000_000;
    let config = trainer_config(ExecutionMode::Overlapped)
        .max_steps(max_steps)
        .eval(0, EVAL_LEN);
    let mut trainer = Trainer::build(config)?;
    let stop = trainer.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        stop.stop();
    });
    trainer.train(
        env,
        &mut agent,
        buffer,
        &mut evaluator,
        &mut BufferedRecorder::new(),
        &mut StatsRecorder::default(),
    )?;
    stopper.join().unwrap();

    let total_steps = trainer.total_steps();
    assert!(total_steps > WARM_UP && total_steps < max_steps);
    // Ticks issued by the collector before it stopped.
    let n_ticks = (WARM_UP..=total_steps).filter(|t| t % TRAIN_FREQ == 0).count();
    assert!(trainer.train_steps() > 0);
    assert!(trainer.train_steps() <= n_ticks);
    assert!(trainer.target_syncs() <= total_steps / UPDATE_TARGET_FREQ);
    Ok(())
}

#[test]
fn test_env_error_stops_training() -> Result<()> {
    let env_config = ChainEnvConfig {
        fail_at_step: Some(30),
        ..Default::default()
    };
    for mode in [ExecutionMode::Sequential, ExecutionMode::Overlapped] {
        let Setup {
            env,
            mut agent,
            buffer,
            mut evaluator,
        } = setup(&env_config)?;
        let mut trainer = Trainer::build(trainer_config(mode))?;
        let result = trainer.train(
            env,
            &mut agent,
            buffer,
            &mut evaluator,
            &mut BufferedRecorder::new(),
            &mut StatsRecorder::default(),
        );
        assert!(result.is_err());
        assert!(trainer.total_steps() < 30);
    }
    Ok(())
}

#[test]
fn test_image_observations_are_stacked() -> Result<()> {
    let env_config = ChainEnvConfig {
        image: true,
        ..Default::default()
    };
    let env = ChainEnv::build(&env_config, 0)?;
    let buffer_config = ReplayBufferConfig::default().for_observation_space(&env.observation_space())?;
    assert_eq!(buffer_config.obs_len, 4);
    assert_eq!(buffer_config.state_len(), 20);

    let (trainer, _, _) = train(trainer_config(ExecutionMode::Sequential), &env_config)?;
    assert_eq!(trainer.total_steps(), MAX_STEPS);
    Ok(())
}

#[test]
fn test_checkpoints_and_stats_files() -> Result<()> {
    let dir = TempDir::new("distrl")?;
    let model_dir = dir.path().join("model");
    let stats_dir = dir.path().join("stats");
    let config = trainer_config(ExecutionMode::Sequential)
        .save_freq(100)
        .model_dir(&model_dir)
        .stats_dir(&stats_dir);
    train(config, &ChainEnvConfig::default())?;

    for sub in ["100", "200", "final"] {
        assert!(model_dir.join(sub).join("linear_model.json").is_file(), "{}", sub);
    }
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(stats_dir.join("stats_summary.json"))?)?;
    assert_eq!(summary["total_env_steps"].as_u64(), Some((MAX_STEPS + 2 * EVAL_LEN) as u64));
    assert!(stats_dir.join("train_ep_rews.json").is_file());
    Ok(())
}
