//! Circular frame store.
use super::{ReplayBufferConfig, TransitionBatch};
use crate::{base::FrameElem, error::DistrlError};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Fixed-capacity circular store of single environment steps.
///
/// Slot `i` holds frame `o_i` together with the action taken on it, the reward received
/// and whether the episode ended with that step. Logical position `l` in `0..len()`
/// maps to physical slot `(pos - size + l) mod capacity`, `0` being the oldest retained
/// frame.
pub struct ReplayBuffer<T, A> {
    capacity: usize,
    obs_len: usize,
    frame_len: usize,
    pos: usize,
    size: usize,
    frames: Vec<T>,
    act: Vec<A>,
    reward: Vec<f32>,
    is_done: Vec<bool>,
    rng: StdRng,
}

impl<T, A> ReplayBuffer<T, A>
where
    T: FrameElem,
    A: Clone + Default,
{
    /// Builds an empty store.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self, DistrlError> {
        config.validate()?;
        let capacity = config.capacity;
        Ok(Self {
            capacity,
            obs_len: config.obs_len,
            frame_len: config.frame_len,
            pos: 0,
            size: 0,
            frames: vec![T::default(); capacity * config.frame_len],
            act: vec![A::default(); capacity],
            reward: vec![0.0; capacity],
            is_done: vec![false; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no frame is stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum number of stored frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames in a stacked state.
    pub fn obs_len(&self) -> usize {
        self.obs_len
    }

    /// Number of elements in a single frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of elements in a stacked state.
    pub fn state_len(&self) -> usize {
        self.obs_len * self.frame_len
    }

    /// Returns `true` if [`ReplayBuffer::sample`] can succeed.
    pub fn can_sample(&self) -> bool {
        self.size > self.obs_len
    }

    #[inline]
    fn physical(&self, l: usize) -> usize {
        (self.pos + self.capacity - self.size + l) % self.capacity
    }

    /// Writes a frame at the cursor and returns its physical slot.
    ///
    /// The effect of the action taken on the frame is unknown yet. It is zeroed until
    /// [`ReplayBuffer::store_effect`] is called on the returned slot. A frame of the
    /// wrong length is rejected and leaves the store unchanged.
    pub fn store_frame(&mut self, frame: &[T]) -> Result<usize, DistrlError> {
        if frame.len() != self.frame_len {
            return Err(DistrlError::ShapeMismatch {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }
        let ix = self.pos;
        let fl = self.frame_len;
        self.frames[ix * fl..(ix + 1) * fl].copy_from_slice(frame);
        self.act[ix] = A::default();
        self.reward[ix] = 0.0;
        self.is_done[ix] = false;
        self.pos = (self.pos + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
        Ok(ix)
    }

    /// Records the action taken on the frame at slot `ix` and its outcome.
    pub fn store_effect(&mut self, ix: usize, act: A, reward: f32, is_done: bool) {
        self.act[ix] = act;
        self.reward[ix] = reward;
        self.is_done[ix] = is_done;
    }

    /// Appends a complete transition and returns its physical slot.
    pub fn store(
        &mut self,
        frame: &[T],
        act: A,
        reward: f32,
        is_done: bool,
    ) -> Result<usize, DistrlError> {
        let ix = self.store_frame(frame)?;
        self.store_effect(ix, act, reward, is_done);
        Ok(ix)
    }

    /// Writes the stacked state ending at logical position `l` into `out`.
    ///
    /// Frames are ordered oldest first. Slots older than an episode start or than the
    /// oldest retained frame stay zero.
    fn encode_into(&self, l: usize, out: &mut [T]) {
        debug_assert!(l < self.size);
        debug_assert_eq!(out.len(), self.state_len());
        let fl = self.frame_len;
        let mut start = l;
        for k in 1..self.obs_len.min(l + 1) {
            if self.is_done[self.physical(l - k)] {
                break;
            }
            start = l - k;
        }
        let offset = self.obs_len - (l - start + 1);
        out[..offset * fl].fill(T::default());
        for (j, li) in (start..=l).enumerate() {
            let p = self.physical(li);
            let dst = (offset + j) * fl;
            out[dst..dst + fl].copy_from_slice(&self.frames[p * fl..(p + 1) * fl]);
        }
    }

    /// Stacked state ending at logical position `l`.
    ///
    /// # Panics
    ///
    /// Panics if `l >= len()`.
    pub fn encode(&self, l: usize) -> Vec<T> {
        assert!(l < self.size, "position {} out of {} stored", l, self.size);
        let mut out = vec![T::default(); self.state_len()];
        self.encode_into(l, &mut out);
        out
    }

    /// Stacked state ending at the newest frame.
    ///
    /// # Panics
    ///
    /// Panics if the store is empty.
    pub fn encode_recent(&self) -> Vec<T> {
        self.encode(self.size - 1)
    }

    /// Samples `batch_size` transitions uniformly with replacement.
    ///
    /// Only positions whose successor frame is stored are drawn, so the newest frame
    /// never appears as `obs`.
    pub fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch<T, A>, DistrlError> {
        if !self.can_sample() {
            return Err(DistrlError::InsufficientData {
                size: self.size,
                required: self.obs_len + 1,
            });
        }

        let sl = self.state_len();
        let ixs: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..self.size - 1))
            .collect();
        let mut obs = vec![T::default(); batch_size * sl];
        let mut next_obs = vec![T::default(); batch_size * sl];
        let mut act = Vec::with_capacity(batch_size);
        let mut reward = Vec::with_capacity(batch_size);
        let mut is_done = Vec::with_capacity(batch_size);

        for (i, &l) in ixs.iter().enumerate() {
            self.encode_into(l, &mut obs[i * sl..(i + 1) * sl]);
            self.encode_into(l + 1, &mut next_obs[i * sl..(i + 1) * sl]);
            let p = self.physical(l);
            act.push(self.act[p].clone());
            reward.push(self.reward[p]);
            is_done.push(self.is_done[p]);
        }

        Ok(TransitionBatch {
            obs,
            act,
            next_obs,
            reward,
            is_done,
            ix_sample: ixs,
            state_len: sl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize, obs_len: usize) -> ReplayBuffer<f32, usize> {
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_len(obs_len)
            .frame_len(1)
            .seed(0);
        ReplayBuffer::build(&config).unwrap()
    }

    #[test]
    fn test_invalid_config() {
        let config = ReplayBufferConfig::default().capacity(0);
        assert!(ReplayBuffer::<u8, usize>::build(&config).is_err());
        let config = ReplayBufferConfig::default().capacity(10).obs_len(0);
        assert!(ReplayBuffer::<u8, usize>::build(&config).is_err());
    }

    #[test]
    fn test_overwrite_keeps_most_recent() {
        let mut rb = buffer(5, 1);
        for i in 0..8 {
            rb.store(&[i as f32], i, i as f32, false).unwrap();
        }
        assert_eq!(rb.len(), 5);
        let frames: Vec<f32> = (0..5).map(|l| rb.encode(l)[0]).collect();
        assert_eq!(frames, vec![3.0, 4.0, 5.0, 6.0, 7.0]);

        for _ in 0..20 {
            let batch = rb.sample(16).unwrap();
            for i in 0..batch.len() {
                // Transitions 3..=6 have a stored successor.
                assert!((3.0..=6.0).contains(&batch.reward[i]));
                assert_eq!(batch.next_state(i)[0], batch.state(i)[0] + 1.0);
            }
        }
    }

    #[test]
    fn test_stack_zero_pads_episode_start() {
        let mut rb = buffer(10, 3);
        rb.store(&[1.0], 0, 0.0, false).unwrap();
        rb.store(&[2.0], 0, 0.0, true).unwrap();
        rb.store(&[3.0], 0, 0.0, false).unwrap();
        rb.store(&[4.0], 0, 0.0, false).unwrap();

        assert_eq!(rb.encode(0), vec![0.0, 0.0, 1.0]);
        assert_eq!(rb.encode(1), vec![0.0, 1.0, 2.0]);
        // Frame 3 starts a new episode.
        assert_eq!(rb.encode(2), vec![0.0, 0.0, 3.0]);
        assert_eq!(rb.encode_recent(), vec![0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_stack_stops_at_oldest_retained_frame() {
        let mut rb = buffer(4, 3);
        for i in 1..=6 {
            rb.store(&[i as f32], 0, 0.0, false).unwrap();
        }
        // Frames 3..=6 retained; position 0 has no history left.
        assert_eq!(rb.encode(0), vec![0.0, 0.0, 3.0]);
        assert_eq!(rb.encode(1), vec![0.0, 3.0, 4.0]);
        assert_eq!(rb.encode(3), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_sample_never_spans_episodes() {
        let mut rb = buffer(50, 4);
        // Episodes of length 3, frame value encodes (episode, step).
        for i in 0..45 {
            let episode = i / 3;
            let step = i % 3;
            let value = (episode * 10 + step + 1) as f32;
            rb.store(&[value], 0, 0.0, step == 2).unwrap();
        }
        for _ in 0..50 {
            let batch = rb.sample(32).unwrap();
            for i in 0..batch.len() {
                for state in [batch.state(i), batch.next_state(i)] {
                    let episodes: Vec<i32> = state
                        .iter()
                        .filter(|v| **v > 0.0)
                        .map(|v| *v as i32 / 10)
                        .collect();
                    assert!(episodes.windows(2).all(|w| w[0] == w[1]));
                }
            }
        }
    }

    #[test]
    fn test_insufficient_data() {
        let mut rb = buffer(10, 2);
        rb.store(&[1.0], 0, 0.0, false).unwrap();
        rb.store(&[2.0], 0, 0.0, false).unwrap();
        assert!(matches!(
            rb.sample(4),
            Err(DistrlError::InsufficientData {
                size: 2,
                required: 3
            })
        ));
        rb.store(&[3.0], 0, 0.0, false).unwrap();
        assert_eq!(rb.sample(4).unwrap().len(), 4);
    }

    #[test]
    fn test_two_phase_store() {
        let mut rb = buffer(10, 2);
        let ix = rb.store_frame(&[1.0]).unwrap();
        assert_eq!(rb.encode_recent(), vec![0.0, 1.0]);
        rb.store_effect(ix, 3, 0.5, false);
        rb.store(&[2.0], 1, 1.0, true).unwrap();
        rb.store_frame(&[3.0]).unwrap();

        let batch = rb.sample(8).unwrap();
        for i in 0..batch.len() {
            match batch.ix_sample[i] {
                0 => {
                    assert_eq!(batch.act[i], 3);
                    assert_eq!(batch.reward[i], 0.5);
                    assert!(!batch.is_done[i]);
                    assert_eq!(batch.next_state(i), &[1.0, 2.0]);
                }
                1 => {
                    assert_eq!(batch.act[i], 1);
                    assert!(batch.is_done[i]);
                    assert_eq!(batch.next_state(i), &[0.0, 3.0]);
                }
                ix => panic!("unexpected position {}", ix),
            }
        }
    }

    #[test]
    fn test_frame_length_mismatch() {
        let mut rb = buffer(10, 1);
        rb.store(&[1.0], 0, 0.0, false).unwrap();
        assert!(matches!(
            rb.store(&[1.0, 2.0], 0, 0.0, false),
            Err(DistrlError::ShapeMismatch {
                expected: 1,
                actual: 2
            })
        ));
        // The rejected frame is not stored.
        assert_eq!(rb.len(), 1);
        assert_eq!(rb.encode_recent(), vec![1.0]);
    }
}
