//! Assembly target for force Jacobians and the implicit linear systems
//!
//! Force terms add 3x3 blocks into a [`SystemMatrix`]; the implicit solvers
//! add the mass diagonal, pin fixed degrees of freedom and solve. The only
//! implementation is [`DenseSystem`], a full (3N)x(3N) nalgebra matrix
//! factored with LU. Everything that touches the matrix goes through the
//! trait, so a block-sparse storage can replace it without changing the
//! force terms or the integrators.
//!
//! Indexing: the block of particle `i` occupies rows/columns `[3i, 3i + 3)`.

use nalgebra::{DMatrix, DVector};

use crate::error::NumericalError;
use super::states::NMat3;

pub trait SystemMatrix {
    /// Number of rows (= columns)
    fn dim(&self) -> usize;

    /// Reset every entry to zero
    fn set_zero(&mut self);

    /// `A[block(row), block(col)] += block`, with `row`/`col` particle indices
    fn add_block(&mut self, row: usize, col: usize, block: &NMat3);

    /// `A[k, k] += diag[k]` for every k
    fn add_diagonal(&mut self, diag: &DVector<f64>);

    /// Zero row and column `dof` and put 1 on the diagonal
    fn pin_dof(&mut self, dof: usize);

    /// Solve `A x = rhs`
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, NumericalError>;
}

/// Dense (3N)x(3N) storage
#[derive(Debug, Clone)]
pub struct DenseSystem {
    a: DMatrix<f64>,
}

impl DenseSystem {
    /// Zero matrix sized for `particle_count` particles
    pub fn new(particle_count: usize) -> Self {
        let n = 3 * particle_count;
        Self {
            a: DMatrix::zeros(n, n),
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }
}

impl SystemMatrix for DenseSystem {
    fn dim(&self) -> usize {
        self.a.nrows()
    }

    fn set_zero(&mut self) {
        self.a.fill(0.0);
    }

    fn add_block(&mut self, row: usize, col: usize, block: &NMat3) {
        let mut view = self.a.fixed_view_mut::<3, 3>(3 * row, 3 * col);
        view += block;
    }

    fn add_diagonal(&mut self, diag: &DVector<f64>) {
        for (k, d) in diag.iter().enumerate() {
            self.a[(k, k)] += d;
        }
    }

    fn pin_dof(&mut self, dof: usize) {
        self.a.row_mut(dof).fill(0.0);
        self.a.column_mut(dof).fill(0.0);
        self.a[(dof, dof)] = 1.0;
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, NumericalError> {
        let dim = self.dim();
        if self.a.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFiniteSystem { dim });
        }

        let lu = self.a.clone().lu();
        if !lu.is_invertible() {
            return Err(NumericalError::SingularSystem { dim });
        }
        let x = lu.solve(rhs).ok_or(NumericalError::SingularSystem { dim })?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFiniteSolution);
        }
        Ok(x)
    }
}
