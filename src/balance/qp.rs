//! Dense convex quadratic programming
//!
//! Goldfarb–Idnani dual active-set method for
//!
//! ```text
//! minimize   ½·xᵀGx + gᵀx
//! subject to aᵢ·x = bᵢ   (equalities)
//!            aⱼ·x ≥ bⱼ   (and ≤, folded into ≥ form)
//! ```
//!
//! `G` must be symmetric positive definite. The factorization is kept as
//! `J = L⁻ᵀ·Q` and the upper-triangular `R` of the active constraints, updated
//! with Givens rotations as constraints enter and leave the active set.
//!
//! Equality rows that are linear combinations of rows already in the active set
//! are skipped when they are satisfied at that point and make the problem
//! infeasible otherwise. Incidence matrices of closed networks always contain
//! such a row.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::debug;

/// Ratio below which the component of a constraint normal outside the active
/// span is treated as zero
const DEPENDENCE_RATIO: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    EqualTo,
    GreaterThanOrEqualTo,
    LesserThanOrEqualTo,
}

/// Sparse linear constraint `Σ coefficients[k]·x[indices[k]] (=|≥|≤) value`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub indices: Vec<usize>,
    pub coefficients: Vec<f64>,
    pub kind: ConstraintKind,
    pub value: f64,
}

impl LinearConstraint {
    pub fn new(indices: Vec<usize>, coefficients: Vec<f64>, kind: ConstraintKind, value: f64) -> Self {
        Self {
            indices,
            coefficients,
            kind,
            value,
        }
    }

    /// Single-variable constraint `x[index] (=|≥|≤) value`
    pub fn bound(index: usize, kind: ConstraintKind, value: f64) -> Self {
        Self::new(vec![index], vec![1.0], kind, value)
    }

    /// Dense normal `a` and offset `c` such that the constraint reads `a·x + c (= | ≥) 0`
    fn normal_form(&self, n: usize) -> (DVector<f64>, f64) {
        let sign = match self.kind {
            ConstraintKind::LesserThanOrEqualTo => -1.0,
            _ => 1.0,
        };
        let mut a = DVector::zeros(n);
        for (&idx, &coef) in self.indices.iter().zip(&self.coefficients) {
            a[idx] += sign * coef;
        }
        (a, -sign * self.value)
    }
}

#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    pub hessian: DMatrix<f64>,
    pub linear: DVector<f64>,
    pub constraints: Vec<LinearConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpSettings {
    /// Cap on dual steps before giving up
    pub max_iterations: usize,
    /// Largest constraint violation accepted as satisfied
    pub feasibility_tolerance: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            feasibility_tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub x: DVector<f64>,
    pub objective: f64,
    pub iterations: usize,
    /// Indices (into `QuadraticProgram::constraints`) of inequalities active at the optimum
    pub active: Vec<usize>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QpError {
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    #[error("quadratic term is not positive definite")]
    NotPositiveDefinite,

    #[error("constraints are infeasible: {0}")]
    Infeasible(String),

    #[error("no convergence after {0} iterations")]
    IterationLimit(usize),
}

/// Goldfarb–Idnani solver bound to one program
pub struct GoldfarbIdnani<'a> {
    program: &'a QuadraticProgram,
    settings: QpSettings,
}

struct Inequality {
    normal: DVector<f64>,
    offset: f64,
    source: usize,
}

impl<'a> GoldfarbIdnani<'a> {
    pub fn new(program: &'a QuadraticProgram, settings: QpSettings) -> Self {
        Self { program, settings }
    }

    fn check_dimensions(&self) -> Result<usize, QpError> {
        let n = self.program.hessian.nrows();
        if self.program.hessian.ncols() != n {
            return Err(QpError::Dimension("quadratic term must be square".to_string()));
        }
        if self.program.linear.len() != n {
            return Err(QpError::Dimension(format!(
                "linear term has length {}, expected {n}",
                self.program.linear.len()
            )));
        }
        for (k, c) in self.program.constraints.iter().enumerate() {
            if c.indices.len() != c.coefficients.len() {
                return Err(QpError::Dimension(format!(
                    "constraint {k} has {} indices but {} coefficients",
                    c.indices.len(),
                    c.coefficients.len()
                )));
            }
            if let Some(&idx) = c.indices.iter().find(|&&idx| idx >= n) {
                return Err(QpError::Dimension(format!(
                    "constraint {k} references variable {idx} of {n}"
                )));
            }
        }
        Ok(n)
    }

    pub fn minimize(&self) -> Result<QpSolution, QpError> {
        let n = self.check_dimensions()?;
        let g = &self.program.hessian;
        let g0 = &self.program.linear;
        let tol = self.settings.feasibility_tolerance;

        let mut equalities = Vec::new();
        let mut inequalities = Vec::new();
        for (source, c) in self.program.constraints.iter().enumerate() {
            let (normal, offset) = c.normal_form(n);
            match c.kind {
                ConstraintKind::EqualTo => equalities.push((normal, offset)),
                _ => inequalities.push(Inequality {
                    normal,
                    offset,
                    source,
                }),
            }
        }

        let chol = g.clone().cholesky().ok_or(QpError::NotPositiveDefinite)?;
        let l = chol.l();
        if (0..n).any(|i| !(l[(i, i)] > 0.0 && l[(i, i)].is_finite())) {
            return Err(QpError::NotPositiveDefinite);
        }
        let mut j = l
            .transpose()
            .solve_upper_triangular(&DMatrix::identity(n, n))
            .ok_or(QpError::NotPositiveDefinite)?;
        let c1 = g.trace();
        let c2 = j.trace();

        // Unconstrained minimum
        let mut x = -chol.solve(g0);

        let mut r = DMatrix::zeros(n, n);
        let mut r_norm = 1.0;
        let mut u = DVector::zeros(n + 1);
        let mut active = vec![0usize; n + 1];
        let mut iq = 0usize;

        for (k, (normal, offset)) in equalities.iter().enumerate() {
            let mut d = j.tr_mul(normal);
            let violation = normal.dot(&x) + offset;
            if is_dependent(&d, iq) {
                if violation.abs() > tol * (1.0 + offset.abs()) {
                    return Err(QpError::Infeasible(format!(
                        "equality {k} is implied by the others but violated by {violation:e}"
                    )));
                }
                debug!(equality = k, "skipping linearly dependent equality constraint");
                continue;
            }
            let z = step_direction(&j, &d, iq);
            let rv = dual_direction(&r, &d, iq);
            let t2 = -violation / z.dot(normal);
            x.axpy(t2, &z, 1.0);
            u[iq] = t2;
            for i in 0..iq {
                u[i] -= t2 * rv[i];
            }
            if !add_constraint(&mut r, &mut j, &mut d, &mut iq, &mut r_norm) {
                return Err(QpError::Infeasible(format!(
                    "equality {k} is numerically dependent on the active set"
                )));
            }
        }
        let meq = iq;

        let m = inequalities.len();
        let mut eligible = vec![true; m];
        let mut excluded = vec![false; m];
        let mut slack = DVector::zeros(m);
        let mut iterations = 0usize;
        let psi_threshold = m as f64 * f64::EPSILON * c1 * c2 * 100.0;

        'outer: loop {
            for k in meq..iq {
                eligible[active[k]] = false;
            }

            let mut psi = 0.0;
            for (i, c) in inequalities.iter().enumerate() {
                excluded[i] = false;
                slack[i] = c.normal.dot(&x) + c.offset;
                psi += slack[i].min(0.0);
            }
            if psi.abs() <= psi_threshold {
                break 'outer;
            }

            let u_old = u.clone();
            let active_old = active.clone();
            let x_old = x.clone();

            'choose: loop {
                let mut most_violated = None;
                let mut worst = 0.0;
                for i in 0..m {
                    let threshold = -tol * (1.0 + inequalities[i].offset.abs());
                    if slack[i] < worst && slack[i] < threshold && eligible[i] && !excluded[i] {
                        worst = slack[i];
                        most_violated = Some(i);
                    }
                }
                let Some(ip) = most_violated else {
                    break 'outer;
                };
                let normal = &inequalities[ip].normal;
                u[iq] = 0.0;
                active[iq] = ip;

                loop {
                    iterations += 1;
                    if iterations > self.settings.max_iterations {
                        return Err(QpError::IterationLimit(self.settings.max_iterations));
                    }

                    let mut d = j.tr_mul(normal);
                    let z = step_direction(&j, &d, iq);
                    let rv = dual_direction(&r, &d, iq);

                    // Largest dual step keeping active inequality multipliers non-negative
                    let mut blocking = None;
                    let mut t1 = f64::INFINITY;
                    for k in meq..iq {
                        if rv[k] > 0.0 && u[k] / rv[k] < t1 {
                            t1 = u[k] / rv[k];
                            blocking = Some(active[k]);
                        }
                    }
                    // Primal step that makes constraint `ip` active
                    let t2 = if is_dependent(&d, iq) {
                        f64::INFINITY
                    } else {
                        -slack[ip] / z.dot(normal)
                    };
                    let t = t1.min(t2);
                    if !t.is_finite() {
                        return Err(QpError::Infeasible(format!(
                            "inequality {} cannot be satisfied",
                            inequalities[ip].source
                        )));
                    }

                    if !t2.is_finite() {
                        // Dual step only
                        for k in meq..iq {
                            u[k] -= t * rv[k];
                        }
                        u[iq] += t;
                        if let Some(l) = blocking {
                            eligible[l] = true;
                            delete_constraint(&mut r, &mut j, &mut active, &mut u, meq, &mut iq, l);
                        }
                        continue;
                    }

                    x.axpy(t, &z, 1.0);
                    for k in 0..iq {
                        u[k] -= t * rv[k];
                    }
                    u[iq] += t;

                    if t2 <= t1 {
                        // Full step: `ip` joins the active set
                        if !add_constraint(&mut r, &mut j, &mut d, &mut iq, &mut r_norm) {
                            excluded[ip] = true;
                            delete_constraint(&mut r, &mut j, &mut active, &mut u, meq, &mut iq, ip);
                            eligible.iter_mut().for_each(|e| *e = true);
                            for k in meq..iq {
                                active[k] = active_old[k];
                                u[k] = u_old[k];
                                eligible[active[k]] = false;
                            }
                            x.copy_from(&x_old);
                            continue 'choose;
                        }
                        eligible[ip] = false;
                        continue 'outer;
                    }

                    // Partial step: a blocking constraint leaves the active set
                    if let Some(l) = blocking {
                        eligible[l] = true;
                        delete_constraint(&mut r, &mut j, &mut active, &mut u, meq, &mut iq, l);
                    }
                    slack[ip] = normal.dot(&x) + inequalities[ip].offset;
                }
            }
        }

        let objective = 0.5 * x.dot(&(g * &x)) + g0.dot(&x);
        let active_set = (meq..iq).map(|k| inequalities[active[k]].source).collect();
        debug!(iterations, active = iq - meq, objective, "quadratic program solved");
        Ok(QpSolution {
            x,
            objective,
            iterations,
            active: active_set,
        })
    }
}

/// Minimize `program` with `settings`
pub fn minimize(program: &QuadraticProgram, settings: QpSettings) -> Result<QpSolution, QpError> {
    GoldfarbIdnani::new(program, settings).minimize()
}

/// True when `d = Jᵀ·a` has no component outside the span of the `iq` active normals
fn is_dependent(d: &DVector<f64>, iq: usize) -> bool {
    let tail: f64 = (iq..d.len()).map(|k| d[k] * d[k]).sum::<f64>().sqrt();
    tail <= DEPENDENCE_RATIO * d.norm()
}

/// `z = J₂·d₂`, the primal step direction
fn step_direction(j: &DMatrix<f64>, d: &DVector<f64>, iq: usize) -> DVector<f64> {
    let n = j.nrows();
    let mut z = DVector::zeros(n);
    for col in iq..n {
        for row in 0..n {
            z[row] += j[(row, col)] * d[col];
        }
    }
    z
}

/// `r = R⁻¹·d₁`, the negative of the dual step direction
fn dual_direction(r: &DMatrix<f64>, d: &DVector<f64>, iq: usize) -> DVector<f64> {
    let mut rv = DVector::zeros(iq);
    for i in (0..iq).rev() {
        let mut sum = 0.0;
        for k in i + 1..iq {
            sum += r[(i, k)] * rv[k];
        }
        rv[i] = (d[i] - sum) / r[(i, i)];
    }
    rv
}

fn add_constraint(
    r: &mut DMatrix<f64>,
    j: &mut DMatrix<f64>,
    d: &mut DVector<f64>,
    iq: &mut usize,
    r_norm: &mut f64,
) -> bool {
    let n = d.len();
    for col in (*iq + 1..n).rev() {
        let mut cc = d[col - 1];
        let mut ss = d[col];
        let h = cc.hypot(ss);
        if h == 0.0 {
            continue;
        }
        d[col] = 0.0;
        ss /= h;
        cc /= h;
        if cc < 0.0 {
            cc = -cc;
            ss = -ss;
            d[col - 1] = -h;
        } else {
            d[col - 1] = h;
        }
        let xny = ss / (1.0 + cc);
        for k in 0..n {
            let t1 = j[(k, col - 1)];
            let t2 = j[(k, col)];
            j[(k, col - 1)] = t1 * cc + t2 * ss;
            j[(k, col)] = xny * (t1 + j[(k, col - 1)]) - t2;
        }
    }
    *iq += 1;
    for i in 0..*iq {
        r[(i, *iq - 1)] = d[i];
    }
    let diag = d[*iq - 1].abs();
    if diag <= f64::EPSILON * *r_norm {
        return false;
    }
    *r_norm = r_norm.max(diag);
    true
}

fn delete_constraint(
    r: &mut DMatrix<f64>,
    j: &mut DMatrix<f64>,
    active: &mut [usize],
    u: &mut DVector<f64>,
    meq: usize,
    iq: &mut usize,
    l: usize,
) {
    let n = r.nrows();
    let Some(qq) = (meq..*iq).find(|&k| active[k] == l) else {
        return;
    };

    for k in qq..*iq - 1 {
        active[k] = active[k + 1];
        u[k] = u[k + 1];
        for row in 0..n {
            r[(row, k)] = r[(row, k + 1)];
        }
    }
    active[*iq - 1] = active[*iq];
    u[*iq - 1] = u[*iq];
    active[*iq] = 0;
    u[*iq] = 0.0;
    for row in 0..*iq {
        r[(row, *iq - 1)] = 0.0;
    }
    *iq -= 1;
    if *iq == 0 {
        return;
    }

    for col in qq..*iq {
        let mut cc = r[(col, col)];
        let mut ss = r[(col + 1, col)];
        let h = cc.hypot(ss);
        if h == 0.0 {
            continue;
        }
        cc /= h;
        ss /= h;
        r[(col + 1, col)] = 0.0;
        if cc < 0.0 {
            r[(col, col)] = -h;
            cc = -cc;
            ss = -ss;
        } else {
            r[(col, col)] = h;
        }
        let xny = ss / (1.0 + cc);
        for k in col + 1..*iq {
            let t1 = r[(col, k)];
            let t2 = r[(col + 1, k)];
            r[(col, k)] = t1 * cc + t2 * ss;
            r[(col + 1, k)] = xny * (t1 + r[(col, k)]) - t2;
        }
        for k in 0..n {
            let t1 = j[(k, col)];
            let t2 = j[(k, col + 1)];
            j[(k, col)] = t1 * cc + t2 * ss;
            j[(k, col + 1)] = xny * (j[(k, col)] + t1) - t2;
        }
    }
}
