//! # Solver parameters
//!
//! Plain struct with public fields, built programmatically through
//! [`SolverConfig::heat`] / [`SolverConfig::potential`] or from the
//! command line of the binary.
use crate::error::{Error, Result};
use crate::partition::ProcessGrid;
use crate::stencil::{Equation, Heat, Potential};
use std::time::Duration;

/// Default number of relaxation sweeps per outer step
pub const DEFAULT_SWEEPS: usize = 30;

/// Equation to solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EquationKind {
    /// Implicit heat equation
    Heat,
    /// Potential equation
    Potential,
}

/// Relaxation method of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    /// Write into a scratch array, copy back after the sweep
    Jacobi,
    /// In place, row-major ascending
    #[value(alias = "gs")]
    GaussSeidel,
    /// In place, alternating ascending and descending
    #[value(alias = "sgs")]
    Symmetric,
}

impl Method {
    /// Method from its numeric selector: 0 Jacobi, 1 Gauss-Seidel,
    /// 2 symmetric Gauss-Seidel
    ///
    /// # Errors
    /// Unknown selector.
    pub fn from_selector(selector: u8) -> Result<Self> {
        match selector {
            0 => Ok(Method::Jacobi),
            1 => Ok(Method::GaussSeidel),
            2 => Ok(Method::Symmetric),
            _ => Err(Error::config(format!(
                "unknown algorithm {}, expected 0, 1 or 2",
                selector
            ))),
        }
    }
}

/// Source of the direction parity of the symmetric Gauss-Seidel sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SymmetricToggle {
    /// Direction flips after every sweep, counted over the whole run
    #[default]
    PerSweep,
    /// Direction flips once per outer step
    PerStep,
}

/// Time step of the heat equation as a function of the grid spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStepRule {
    /// `ht = h^2 / 8`
    #[default]
    EighthH2,
    /// `ht = h^2 / 4`
    QuarterH2,
}

impl TimeStepRule {
    /// Time step for grid spacing `h`
    pub fn time_step(self, h: f64) -> f64 {
        match self {
            TimeStepRule::EighthH2 => h * h / 8.,
            TimeStepRule::QuarterH2 => h * h / 4.,
        }
    }
}

/// When the outer loop ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCriterion {
    /// Until the physical time reaches the value
    MaxTime(f64),
    /// After a fixed number of outer steps
    MaxSteps(usize),
}

/// Parameters of a distributed run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Ranks in x direction
    pub nx: usize,
    /// Ranks in y direction
    pub ny: usize,
    /// Grid spacing
    pub h: f64,
    /// Equation
    pub equation: EquationKind,
    /// Relaxation method
    pub method: Method,
    /// Sweeps per outer step
    pub sweeps: usize,
    /// Stop criterion
    pub stop: StopCriterion,
    /// Gather a snapshot every n steps, `None` only gathers the final state
    pub snapshot_interval: Option<usize>,
    /// Parity source of the symmetric sweep
    pub toggle: SymmetricToggle,
    /// Time step of the heat equation
    pub time_step_rule: TimeStepRule,
    /// Receive timeout of the thread backend, `None` blocks forever
    pub recv_timeout: Option<Duration>,
}

impl SolverConfig {
    /// Heat equation on an `nx x ny` process grid, Jacobi, run until
    /// `max_time`
    pub fn heat(nx: usize, ny: usize, h: f64, max_time: f64) -> Self {
        Self {
            nx,
            ny,
            h,
            equation: EquationKind::Heat,
            method: Method::Jacobi,
            sweeps: DEFAULT_SWEEPS,
            stop: StopCriterion::MaxTime(max_time),
            snapshot_interval: None,
            toggle: SymmetricToggle::default(),
            time_step_rule: TimeStepRule::default(),
            recv_timeout: None,
        }
    }

    /// Potential equation on an `nx x ny` process grid, Jacobi, run for
    /// `max_steps` outer steps
    pub fn potential(nx: usize, ny: usize, h: f64, max_steps: usize) -> Self {
        Self {
            equation: EquationKind::Potential,
            stop: StopCriterion::MaxSteps(max_steps),
            ..Self::heat(nx, ny, h, 0.)
        }
    }

    /// Process grid
    pub fn grid(&self) -> ProcessGrid {
        ProcessGrid::new(self.nx, self.ny)
    }

    /// Time step, `None` for the potential equation
    pub fn time_step(&self) -> Option<f64> {
        match self.equation {
            EquationKind::Heat => Some(self.time_step_rule.time_step(self.h)),
            EquationKind::Potential => None,
        }
    }

    /// Stencil of the configured equation
    pub fn stencil(&self) -> Equation {
        match self.equation {
            EquationKind::Heat => Heat::new(self.h, self.time_step_rule.time_step(self.h)).into(),
            EquationKind::Potential => Potential::new(self.h).into(),
        }
    }

    /// Check parameters which do not depend on the global grid
    ///
    /// # Errors
    /// Non-positive or non-finite spacing, zero sweeps, zero snapshot
    /// interval, invalid stop criterion, or a time limit for the potential
    /// equation, which has no time.
    pub fn validate(&self) -> Result<()> {
        if !(self.h.is_finite() && self.h > 0.) {
            return Err(Error::config(format!("grid spacing must be positive, got {}", self.h)));
        }
        if self.sweeps == 0 {
            return Err(Error::config("at least one sweep per step is required"));
        }
        if self.snapshot_interval == Some(0) {
            return Err(Error::config("snapshot interval must be positive"));
        }
        match (self.stop, self.equation) {
            (StopCriterion::MaxTime(t), EquationKind::Heat) => {
                if !(t.is_finite() && t >= 0.) {
                    return Err(Error::config(format!("invalid time limit {}", t)));
                }
            }
            (StopCriterion::MaxTime(_), EquationKind::Potential) => {
                return Err(Error::config(
                    "the potential equation has no time, use a step limit",
                ));
            }
            (StopCriterion::MaxSteps(_), _) => (),
        }
        Ok(())
    }
}
