//! Schedules of scalar hyperparameters over agent steps.
use crate::error::DistrlError;
use serde::{Deserialize, Serialize};

/// A pure function from agent step to value, used for epsilon and the learning rate.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum Schedule {
    /// Always `value`.
    Constant {
        /// The value.
        value: f64,
    },

    /// Moves from `value_0` to `value_final` in `n_steps_final` steps, then stays.
    Linear {
        /// Value at step 0.
        value_0: f64,

        /// Value from `n_steps_final` on.
        value_final: f64,

        /// Length of the ramp.
        n_steps_final: usize,
    },

    /// Linear interpolation between `(step, value)` endpoints sorted by step.
    ///
    /// Outside the endpoints the schedule returns `outside_value`, or the value of the
    /// nearest endpoint if it is not given.
    Piecewise {
        /// `(step, value)` pairs.
        endpoints: Vec<(usize, f64)>,

        /// Value outside the endpoints.
        outside_value: Option<f64>,
    },

    /// `value_0 * decay_rate ^ (step / decay_steps)`, bounded below by `value_min`.
    ///
    /// With `staircase` the exponent is truncated to an integer.
    Exponential {
        /// Value at step 0.
        value_0: f64,

        /// Factor applied every `decay_steps` steps.
        decay_rate: f64,

        /// Steps per decay.
        decay_steps: usize,

        /// Decay in discrete jumps.
        staircase: bool,

        /// Lower bound.
        value_min: f64,
    },
}

impl Default for Schedule {
    fn default() -> Self {
        Self::Constant { value: 0.0 }
    }
}

impl Schedule {
    /// [`Schedule::Constant`].
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    /// [`Schedule::Linear`].
    pub fn linear(value_0: f64, value_final: f64, n_steps_final: usize) -> Self {
        Self::Linear {
            value_0,
            value_final,
            n_steps_final,
        }
    }

    /// Creates a piecewise-linear schedule, checking that endpoints are sorted.
    pub fn piecewise(
        endpoints: Vec<(usize, f64)>,
        outside_value: Option<f64>,
    ) -> Result<Self, DistrlError> {
        let schedule = Self::Piecewise {
            endpoints,
            outside_value,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Checks the parameters of the schedule.
    pub fn validate(&self) -> Result<(), DistrlError> {
        match self {
            Self::Piecewise { endpoints, .. } => {
                if endpoints.is_empty() {
                    return Err(DistrlError::config("piecewise schedule without endpoints"));
                }
                if endpoints.windows(2).any(|w| w[0].0 > w[1].0) {
                    return Err(DistrlError::config(
                        "piecewise schedule endpoints must be sorted by step",
                    ));
                }
            }
            Self::Exponential { decay_steps, .. } if *decay_steps == 0 => {
                return Err(DistrlError::config("decay_steps must be positive"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Value at agent step `step`.
    pub fn value(&self, step: usize) -> f64 {
        match self {
            Self::Constant { value } => *value,
            Self::Linear {
                value_0,
                value_final,
                n_steps_final,
            } => {
                if step >= *n_steps_final {
                    *value_final
                } else {
                    let frac = step as f64 / *n_steps_final as f64;
                    value_0 + (value_final - value_0) * frac
                }
            }
            Self::Piecewise {
                endpoints,
                outside_value,
            } => piecewise_value(endpoints, *outside_value, step),
            Self::Exponential {
                value_0,
                decay_rate,
                decay_steps,
                staircase,
                value_min,
            } => {
                let mut exponent = step as f64 / (*decay_steps).max(1) as f64;
                if *staircase {
                    exponent = exponent.floor();
                }
                (value_0 * decay_rate.powf(exponent)).max(*value_min)
            }
        }
    }
}

fn piecewise_value(endpoints: &[(usize, f64)], outside_value: Option<f64>, step: usize) -> f64 {
    for w in endpoints.windows(2) {
        let ((l_t, l_v), (r_t, r_v)) = (w[0], w[1]);
        if l_t <= step && step < r_t {
            let alpha = (step - l_t) as f64 / (r_t - l_t) as f64;
            return l_v + alpha * (r_v - l_v);
        }
    }
    match (endpoints.first(), endpoints.last()) {
        (Some(&(t, v)), Some(&(t_last, v_last))) => {
            if step == t_last {
                v_last
            } else if let Some(value) = outside_value {
                value
            } else if step < t {
                v
            } else {
                v_last
            }
        }
        _ => outside_value.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear() {
        let s = Schedule::linear(1.0, 0.1, 100);
        assert!(approx(s.value(0), 1.0));
        assert!(approx(s.value(50), 0.55));
        assert!(approx(s.value(100), 0.1));
        assert!(approx(s.value(1_000), 0.1));
    }

    #[test]
    fn test_piecewise() {
        let s = Schedule::piecewise(vec![(0, 1.0), (100, 0.1), (200, 0.01)], Some(0.01)).unwrap();
        assert!(approx(s.value(0), 1.0));
        assert!(approx(s.value(50), 0.55));
        assert!(approx(s.value(150), 0.055));
        assert!(approx(s.value(200), 0.01));
        assert!(approx(s.value(10_000), 0.01));

        let s = Schedule::piecewise(vec![(10, 0.5), (20, 0.0)], None).unwrap();
        assert!(approx(s.value(0), 0.5));
        assert!(approx(s.value(30), 0.0));

        assert!(Schedule::piecewise(vec![(10, 0.5), (5, 0.0)], None).is_err());
        assert!(Schedule::piecewise(vec![], None).is_err());
    }

    #[test]
    fn test_exponential() {
        let s = Schedule::Exponential {
            value_0: 1.0,
            decay_rate: 0.5,
            decay_steps: 10,
            staircase: true,
            value_min: 0.1,
        };
        assert!(approx(s.value(0), 1.0));
        assert!(approx(s.value(9), 1.0));
        assert!(approx(s.value(10), 0.5));
        assert!(approx(s.value(25), 0.25));
        assert!(approx(s.value(1_000), 0.1));
    }

    #[test]
    fn test_serde_schedule() {
        let s = Schedule::linear(1.0, 0.01, 1_000_000);
        let yaml = serde_yaml::to_string(&s).unwrap();
        assert_eq!(serde_yaml::from_str::<Schedule>(&yaml).unwrap(), s);
    }
}
