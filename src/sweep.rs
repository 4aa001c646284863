//! Relaxation sweeps over the interior of a local domain
//!
//! Cells on the outer boundary of the global grid are pinned to
//! [`DIRICHLET`]; every other cell gets [`Stencil::update`].
use crate::config::Method;
use crate::domain::{LocalDomain, DIRICHLET};
use crate::stencil::{Equation, Stencil};
use ndarray::Array2;

/// Traversal order of an in-place sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Row-major ascending
    Forward,
    /// Row-major descending
    Backward,
}

impl Direction {
    /// Direction of a symmetric sweep: forward on even parity
    pub fn from_parity(parity: usize) -> Self {
        if parity % 2 == 0 {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

#[inline]
fn cell_value(domain: &LocalDomain, equation: &Equation, i: usize, j: usize) -> f64 {
    if domain.on_global_boundary(i, j) {
        DIRICHLET
    } else {
        equation.update(domain, i, j)
    }
}

/// Jacobi sweep; `unew` is scratch space of the same shape as `u`
pub fn jacobi(domain: &mut LocalDomain, equation: &Equation, unew: &mut Array2<f64>) {
    for i in 1..=domain.height() {
        for j in 1..=domain.width() {
            unew[[i - 1, j - 1]] = cell_value(domain, equation, i, j);
        }
    }
    domain.u.assign(unew);
}

/// In-place Gauss-Seidel sweep in `direction`
pub fn gauss_seidel(domain: &mut LocalDomain, equation: &Equation, direction: Direction) {
    let (height, width) = (domain.height(), domain.width());
    match direction {
        Direction::Forward => {
            for i in 1..=height {
                for j in 1..=width {
                    let v = cell_value(domain, equation, i, j);
                    domain.u[[i - 1, j - 1]] = v;
                }
            }
        }
        Direction::Backward => {
            for i in (1..=height).rev() {
                for j in (1..=width).rev() {
                    let v = cell_value(domain, equation, i, j);
                    domain.u[[i - 1, j - 1]] = v;
                }
            }
        }
    }
}

/// One sweep of `method`
///
/// `parity` selects the direction of the symmetric sweep and is ignored by
/// the other methods.
pub fn sweep(
    domain: &mut LocalDomain,
    equation: &Equation,
    method: Method,
    parity: usize,
    unew: &mut Array2<f64>,
) {
    match method {
        Method::Jacobi => jacobi(domain, equation, unew),
        Method::GaussSeidel => gauss_seidel(domain, equation, Direction::Forward),
        Method::Symmetric => gauss_seidel(domain, equation, Direction::from_parity(parity)),
    }
}
