//! Utilities.
use anyhow::{anyhow, Result};
use candle_nn::VarMap;
use log::trace;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track with tau = {}", tau);
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("varmap lock poisoned"))?;
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("varmap lock poisoned"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("variable {} is missing in the source", k_dest))?;
        let t_dest = if tau == 1.0 {
            v_src.as_tensor().clone()
        } else {
            ((tau * v_src.as_tensor())? + (1.0 - tau) * v_dest.as_tensor())?
        };
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}
