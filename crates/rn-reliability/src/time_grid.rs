//! The uniform time grid of a reliability evolution.

use rn_core::{ensure, Real, Result};

/// A uniform grid covering `[0, horizon]` in steps of `dt`.
///
/// The last step may overshoot the horizon by less than one `dt` so that
/// the whole horizon is covered.
#[derive(Debug, Clone)]
pub struct TimeGrid {
    dt: Real,
    steps: usize,
}

impl TimeGrid {
    /// Build a grid for the given horizon and timestep.
    ///
    /// # Errors
    /// `InvalidInput` if either quantity is non-positive or non-finite.
    pub fn uniform(horizon: Real, dt: Real) -> Result<Self> {
        ensure!(
            horizon.is_finite() && horizon > 0.0,
            "time horizon must be positive, got {horizon}"
        );
        ensure!(dt.is_finite() && dt > 0.0, "dt must be positive, got {dt}");
        let steps = (horizon / dt).ceil() as usize;
        Ok(Self {
            dt,
            steps: steps.max(1),
        })
    }

    /// Number of evolution steps (the trajectory has `steps + 1` points).
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The timestep.
    pub fn dt(&self) -> Real {
        self.dt
    }

    /// Time at grid index `i`.
    pub fn time(&self, i: usize) -> Real {
        i as Real * self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_the_horizon() {
        let grid = TimeGrid::uniform(10.0, 3.0).unwrap();
        assert_eq!(grid.steps(), 4);
        assert!(grid.time(grid.steps()) >= 10.0);
    }

    #[test]
    fn exact_division() {
        let grid = TimeGrid::uniform(10.0, 1.0).unwrap();
        assert_eq!(grid.steps(), 10);
        assert_eq!(grid.time(3), 3.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(TimeGrid::uniform(0.0, 1.0).is_err());
        assert!(TimeGrid::uniform(1.0, 0.0).is_err());
        assert!(TimeGrid::uniform(Real::INFINITY, 1.0).is_err());
    }
}
