//! C51 agent over any [`DistributionalModel`].
use super::C51Config;
use crate::{
    base::{Agent, Env, ObsElem, Policy},
    distributional::{DistributionalModel, Support, Variant},
    error::DistrlError,
    explorer::EpsilonGreedy,
    record::{Record, RecordValue},
    replay_buffer::TransitionBatch,
    schedule::Schedule,
};
use anyhow::Result;
use log::info;
use num_traits::AsPrimitive;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    fs,
    marker::PhantomData,
    path::Path,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Categorical distributional DQN agent.
///
/// The model is shared behind an [`RwLock`]: action selection takes the read lock,
/// while an optimization step holds the write lock from the target forward pass to the
/// parameter update, so the projected target is computed on one snapshot of the target
/// network.
pub struct C51<E, M>
where
    E: Env,
    M: DistributionalModel,
{
    model: Arc<RwLock<M>>,
    support: Support,
    variant: Variant,
    discount_factor: f32,
    explorer: EpsilonGreedy,
    lr_schedule: Schedule,
    n_actions: usize,
    n_opts: usize,
    train: bool,
    rng: SmallRng,
    phantom: PhantomData<fn() -> E>,
}

fn to_f32<T: AsPrimitive<f32>>(xs: &[T]) -> Vec<f32> {
    xs.iter().map(|x| x.as_()).collect()
}

impl<E, M> C51<E, M>
where
    E: Env,
    M: DistributionalModel,
{
    /// Constructs the agent, checking that the model matches the support.
    pub fn build(config: C51Config, model: M) -> Result<Self> {
        let support = Support::build(&config.support)?;
        if model.n_atoms() != support.n_atoms() {
            return Err(DistrlError::config(format!(
                "model has {} atoms, support has {}",
                model.n_atoms(),
                support.n_atoms()
            ))
            .into());
        }
        if model.n_actions() == 0 {
            return Err(DistrlError::config("model has no actions").into());
        }
        config.explorer.schedule.validate()?;
        config.lr_schedule.validate()?;

        Ok(Self {
            n_actions: model.n_actions(),
            model: Arc::new(RwLock::new(model)),
            support,
            variant: config.variant,
            discount_factor: config.discount_factor,
            explorer: config.explorer,
            lr_schedule: config.lr_schedule,
            n_opts: 0,
            train: true,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }

    /// The shared model.
    pub fn model(&self) -> &Arc<RwLock<M>> {
        &self.model
    }

    /// Atom locations.
    pub fn support(&self) -> &Support {
        &self.support
    }

    /// The configured variant.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Number of optimization steps performed by this handle.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, M>, DistrlError> {
        self.model
            .read()
            .map_err(|_| DistrlError::LockPoisoned("model"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, M>, DistrlError> {
        self.model
            .write()
            .map_err(|_| DistrlError::LockPoisoned("model"))
    }
}

impl<E, M> Policy<E> for C51<E, M>
where
    E: Env,
    E::Act: From<usize> + Into<usize>,
    M: DistributionalModel,
{
    fn sample(&mut self, state: &[ObsElem<E>], step: usize) -> Result<E::Act> {
        let selection = if self.train {
            self.variant.train_selection()
        } else {
            self.variant.eval_selection()
        };
        let model = &self.model;
        let support = &self.support;
        let n_actions = self.n_actions;

        let a = self.explorer.select_action(
            step,
            self.train,
            &mut self.rng,
            |rng| {
                let dists = model
                    .read()
                    .map_err(|_| DistrlError::LockPoisoned("model"))?
                    .forward(&to_f32(state), 1)?;
                Ok(Variant::select_actions(selection, &dists, support, rng)[0])
            },
            |rng| rng.gen_range(0..n_actions),
        )?;
        Ok(a.into())
    }
}

impl<E, M> Agent<E> for C51<E, M>
where
    E: Env,
    E::Act: From<usize> + Into<usize>,
    M: DistributionalModel,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt(&mut self, batch: TransitionBatch<ObsElem<E>, E::Act>, step: usize) -> Result<Record> {
        let batch_size = batch.len();
        let lr = self.lr_schedule.value(step);
        let (obs, act, next_obs, reward, is_done) = batch.unpack();
        let obs = to_f32(&obs);
        let next_obs = to_f32(&next_obs);
        let act: Vec<usize> = act.into_iter().map(Into::into).collect();

        let loss = {
            let mut model = self.write()?;
            let target_next = model.forward_target(&next_obs, batch_size)?;
            let online_next = if self.variant.uses_online_bootstrap() {
                Some(model.forward(&next_obs, batch_size)?)
            } else {
                None
            };
            let target = self.variant.bootstrap_target(
                &self.support,
                &target_next,
                online_next.as_ref(),
                &reward,
                &is_done,
                self.discount_factor,
            )?;
            model.train_step(&obs, &act, &target, lr)?
        };
        self.n_opts += 1;

        Ok(Record::from_slice(&[
            ("train/loss", RecordValue::Scalar(loss)),
            ("train/learn_rate", RecordValue::Scalar(lr as f32)),
            (
                "train/epsilon",
                RecordValue::Scalar(self.explorer.epsilon(step, true) as f32),
            ),
        ]))
    }

    fn sync_target(&mut self) -> Result<()> {
        self.write()?.sync_target()
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.read()?.save_params(path)?;
        info!("Save C51 model to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.write()?.load_params(path)?;
        info!("Load C51 model from {:?}", path);
        Ok(())
    }

    fn fork(&self, seed: u64) -> Self {
        Self {
            model: self.model.clone(),
            support: self.support.clone(),
            variant: self.variant,
            discount_factor: self.discount_factor,
            explorer: self.explorer.clone(),
            lr_schedule: self.lr_schedule.clone(),
            n_actions: self.n_actions,
            n_opts: 0,
            train: self.train,
            rng: SmallRng::seed_from_u64(seed),
            phantom: PhantomData,
        }
    }
}
