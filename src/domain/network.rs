use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::balance::{BalanceError, BalanceResult};

/// Which pair of bound vectors the solver receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoundSet {
    /// Instrument-accuracy bounds
    #[default]
    Metrologic,
    /// Operational/process bounds
    Technologic,
}

/// One snapshot of a mass-balance network
///
/// Columns of `a` are flows, rows are nodes. A well-formed flow column has one
/// `+1` at its destination row and one `-1` at its source row.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// Current estimate/measurement per flow
    pub x0: Vec<f64>,
    /// Incidence matrix (nodes × flows)
    pub a: DMatrix<f64>,
    /// Right-hand side of the conservation equations
    pub b: Vec<f64>,
    /// 1 when the flow is metered, 0 otherwise
    pub measurability: Vec<f64>,
    /// Measurement uncertainty per flow
    pub tolerance: Vec<f64>,
}

/// Box constraints for every flow
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    /// Bounds that never bind
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }
}

impl Network {
    pub fn new(
        x0: Vec<f64>,
        a: DMatrix<f64>,
        b: Vec<f64>,
        measurability: Vec<f64>,
        tolerance: Vec<f64>,
    ) -> Self {
        Self {
            x0,
            a,
            b,
            measurability,
            tolerance,
        }
    }

    /// Build from row-major incidence rows; ragged rows are rejected
    pub fn from_rows(
        x0: Vec<f64>,
        rows: &[Vec<f64>],
        b: Vec<f64>,
        measurability: Vec<f64>,
        tolerance: Vec<f64>,
    ) -> BalanceResult<Self> {
        let a = incidence_from_rows(rows)?;
        Ok(Self::new(x0, a, b, measurability, tolerance))
    }

    pub fn flow_count(&self) -> usize {
        self.x0.len()
    }

    pub fn node_count(&self) -> usize {
        self.a.nrows()
    }

    /// Dimension checks shared by the solver and the statistical tests
    pub fn validate(&self) -> BalanceResult<()> {
        let n = self.x0.len();
        if n == 0 {
            return Err(BalanceError::validation("x0", "array must not be empty"));
        }
        if self.a.ncols() != n {
            return Err(BalanceError::validation(
                "a",
                format!(
                    "matrix has {} columns, which is not equal to x0 length {}",
                    self.a.ncols(),
                    n
                ),
            ));
        }
        if self.b.len() != self.a.nrows() {
            return Err(BalanceError::length_mismatch("b", self.a.nrows(), self.b.len()));
        }
        if self.measurability.len() != n {
            return Err(BalanceError::length_mismatch("measurability", n, self.measurability.len()));
        }
        if self.tolerance.len() != n {
            return Err(BalanceError::length_mismatch("tolerance", n, self.tolerance.len()));
        }
        Ok(())
    }

    pub fn is_measured(&self, flow: usize) -> bool {
        is_measured(self.measurability[flow])
    }

    /// Copy of the network with one synthetic unmeasured column per `(i, j)`:
    /// `+1` at row `i`, `-1` at row `j`, zero prior, zero tolerance.
    pub fn with_extra_flows(&self, flows: &[(usize, usize)]) -> Network {
        let mut augmented = self.clone();
        for &(i, j) in flows {
            augmented.push_flow(i, j);
        }
        augmented
    }

    fn push_flow(&mut self, i: usize, j: usize) {
        let col = self.a.ncols();
        let a = std::mem::replace(&mut self.a, DMatrix::zeros(0, 0));
        let mut a = a.insert_column(col, 0.0);
        a[(i, col)] = 1.0;
        a[(j, col)] = -1.0;
        self.a = a;
        self.x0.push(0.0);
        self.measurability.push(0.0);
        self.tolerance.push(0.0);
    }

    /// `A·x − b`
    pub fn residual(&self, x: &[f64]) -> Vec<f64> {
        (0..self.a.nrows())
            .map(|row| {
                let lhs: f64 = (0..self.a.ncols()).map(|k| self.a[(row, k)] * x[k]).sum();
                lhs - self.b[row]
            })
            .collect()
    }

    /// Euclidean norm of `A·x − b`
    pub fn disbalance(&self, x: &[f64]) -> f64 {
        self.residual(x).iter().map(|r| r * r).sum::<f64>().sqrt()
    }
}

pub(crate) fn is_measured(value: f64) -> bool {
    value.abs() >= 1e-7
}

pub fn incidence_from_rows(rows: &[Vec<f64>]) -> BalanceResult<DMatrix<f64>> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(BalanceError::validation(
            "a",
            format!("row {idx} has {} entries, expected {ncols}", row.len()),
        ));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |r, c| rows[r][c]))
}
