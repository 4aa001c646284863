//! # Five point stencils
//!
//! Both equations evaluate the stencil through [`LocalDomain::u_at`], so
//! halo cells and interior cells need no special treatment here. Cells on
//! the outer boundary of the global grid are pinned to
//! [`DIRICHLET`](crate::domain::DIRICHLET) by the sweeps, see
//! [`crate::sweep`].
//!
//! ## Heat equation
//! ```text
//! lap(i,j) = (U(i-1,j) + U(i+1,j) + U(i,j-1) + U(i,j+1) - 4 U(i,j)) / h^2
//! b(i,j)   = -lap(i,j) - U(i,j) / ht
//! u(i,j)  <- -ht * (b(i,j) - lap(i,j))
//! ```
//!
//! ## Potential equation
//! ```text
//! lap(i,j) = (U(i-1,j) + U(i+1,j) + U(i,j-1) + U(i,j+1) - h^2) / 4
//! u(i,j)  <- lap(i,j)
//! ```
//! The potential equation has no right hand side phase.
use crate::domain::LocalDomain;

/// Stencil operator of an equation
#[enum_dispatch]
pub trait Stencil {
    /// Five point operator at interior cell `(i, j)`
    fn laplacian(&self, domain: &LocalDomain, i: usize, j: usize) -> f64;

    /// Right hand side at `(i, j)`, `None` if the equation has no right
    /// hand side phase
    fn rhs(&self, domain: &LocalDomain, i: usize, j: usize) -> Option<f64>;

    /// New value of `u` at `(i, j)` for one relaxation sweep
    fn update(&self, domain: &LocalDomain, i: usize, j: usize) -> f64;

    /// True if [`Stencil::rhs`] has to be evaluated once per step
    fn has_rhs(&self) -> bool;

    /// Physical time advanced by one outer step, `None` for pure relaxation
    fn time_step(&self) -> Option<f64>;
}

/// Implicit time step of the heat equation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heat {
    /// Squared grid spacing
    pub h2: f64,
    /// Time step
    pub ht: f64,
}

impl Heat {
    /// Heat stencil for grid spacing `h` and time step `ht`
    pub fn new(h: f64, ht: f64) -> Self {
        Self { h2: h * h, ht }
    }
}

impl Stencil for Heat {
    fn laplacian(&self, d: &LocalDomain, i: usize, j: usize) -> f64 {
        (d.u_at(i - 1, j) + d.u_at(i + 1, j) + d.u_at(i, j - 1) + d.u_at(i, j + 1)
            - 4. * d.u_at(i, j))
            / self.h2
    }

    fn rhs(&self, d: &LocalDomain, i: usize, j: usize) -> Option<f64> {
        Some(-self.laplacian(d, i, j) - d.u_at(i, j) / self.ht)
    }

    fn update(&self, d: &LocalDomain, i: usize, j: usize) -> f64 {
        -self.ht * (d.b_at(i, j) - self.laplacian(d, i, j))
    }

    fn has_rhs(&self) -> bool {
        true
    }

    fn time_step(&self) -> Option<f64> {
        Some(self.ht)
    }
}

/// Relaxation of the potential equation with constant source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Potential {
    /// Squared grid spacing
    pub h2: f64,
}

impl Potential {
    /// Potential stencil for grid spacing `h`
    pub fn new(h: f64) -> Self {
        Self { h2: h * h }
    }
}

impl Stencil for Potential {
    fn laplacian(&self, d: &LocalDomain, i: usize, j: usize) -> f64 {
        (d.u_at(i - 1, j) + d.u_at(i + 1, j) + d.u_at(i, j - 1) + d.u_at(i, j + 1) - self.h2) / 4.
    }

    fn rhs(&self, _d: &LocalDomain, _i: usize, _j: usize) -> Option<f64> {
        None
    }

    fn update(&self, d: &LocalDomain, i: usize, j: usize) -> f64 {
        self.laplacian(d, i, j)
    }

    fn has_rhs(&self) -> bool {
        false
    }

    fn time_step(&self) -> Option<f64> {
        None
    }
}

/// Equation solved on the domain
#[enum_dispatch(Stencil)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Equation {
    /// Heat equation
    Heat,
    /// Potential equation
    Potential,
}

/// Recompute the right hand side `b` on all interior cells
///
/// No-op for equations without right hand side phase.
pub fn compute_b(domain: &mut LocalDomain, equation: &Equation) {
    if !equation.has_rhs() {
        return;
    }
    log::trace!("[{}]: computation of b", domain.rank);
    let mut b = std::mem::take(&mut domain.b);
    for i in 1..=domain.height() {
        for j in 1..=domain.width() {
            if let Some(v) = equation.rhs(domain, i, j) {
                b[[i - 1, j - 1]] = v;
            }
        }
    }
    domain.b = b;
    log::trace!("[{}]: computation of b complete", domain.rank);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::partition::{Partition, ProcessGrid};

    fn single(width: usize, height: usize) -> LocalDomain {
        let part = Partition::new(width, height, ProcessGrid::new(1, 1)).unwrap();
        LocalDomain::new(&part, 0)
    }

    #[test]
    fn test_heat_laplacian_of_point() {
        let mut d = single(3, 3);
        d.u[[1, 1]] = 1.;
        let heat = Heat::new(0.5, 0.5 * 0.5 / 8.);
        assert_eq!(heat.laplacian(&d, 2, 2), -16.);
        assert_eq!(heat.laplacian(&d, 1, 2), 4.);
        assert_eq!(heat.laplacian(&d, 1, 1), 0.);
    }

    #[test]
    fn test_potential_laplacian_uses_halos() {
        // left rank of 2 x 1: right halo comes from the neighbour
        let part = Partition::new(4, 1, ProcessGrid::new(2, 1)).unwrap();
        let mut d = LocalDomain::new(&part, 0);
        d.set_halo(Side::Right, &[8.]);
        d.set_halo(Side::Left, &[100.]);
        let pot = Potential::new(1.);
        // neighbours: left 0 (dirichlet), right u = 0, top/bottom 0
        assert_eq!(pot.laplacian(&d, 1, 1), -0.25);
        // neighbours: left u = 0, right halo 8
        assert_eq!(pot.laplacian(&d, 1, 2), (8. - 1.) / 4.);
    }

    #[test]
    fn test_compute_b_heat() {
        let mut d = single(3, 3);
        d.u[[1, 1]] = 2.;
        let heat = Heat::new(1., 0.125);
        let eq = Equation::from(heat);
        compute_b(&mut d, &eq);
        // centre: lap = -8, b = 8 - 2 / 0.125
        assert_eq!(d.b[[1, 1]], 8. - 16.);
        // edge neighbour: lap = 2, b = -2
        assert_eq!(d.b[[0, 1]], -2.);
        assert_eq!(d.b[[0, 0]], 0.);
    }

    #[test]
    fn test_compute_b_potential_is_noop() {
        let mut d = single(2, 2);
        d.u.fill(1.);
        d.b.fill(3.);
        compute_b(&mut d, &Equation::from(Potential::new(1.)));
        assert!(d.b.iter().all(|&v| v == 3.));
    }

    #[test]
    fn test_heat_update_is_fixed_point_of_steady_state() {
        // u = 0 everywhere stays 0
        let mut d = single(4, 4);
        let eq = Equation::from(Heat::new(1., 0.125));
        compute_b(&mut d, &eq);
        assert_eq!(eq.update(&d, 2, 2), 0.);
        assert_eq!(eq.time_step(), Some(0.125));
        assert_eq!(Equation::from(Potential::new(1.)).time_step(), None);
    }
}
