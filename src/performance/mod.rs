//! Performance calculation module
//!
//! Implements the IRR (Internal Rate of Return / Money-Weighted Return) used
//! by trade and category statistics.
//!
//! ## IRR Formula (Internal Rate of Return)
//!
//! IRR finds the discount rate where Net Present Value (NPV) equals zero.
//! Uses Newton-Raphson iterative method:
//!
//! ```text
//! NPV = Σ CF_i / (1 + r)^t_i = 0
//!
//! Where:
//!   CF_i = Cash flow at time i (negative = investment, positive = return)
//!   t_i  = Time in years from first cash flow (days / 365)
//!   r    = IRR (the rate we're solving for)
//!
//! Newton-Raphson iteration:
//!   r_new = r_old - NPV(r_old) / NPV'(r_old)
//!
//! Where NPV' is the derivative:
//!   NPV'(r) = Σ -t_i × CF_i / (1 + r)^(t_i + 1)
//! ```
//!
//! ## Cash Flow Sign Convention
//!
//! Flows are passed in NPV convention:
//! - Negative = Investment (money paid out)
//! - Positive = Return (money received)

use chrono::NaiveDate;

/// Initial guess: 10%
const INITIAL_GUESS: f64 = 0.1;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-10;
const MIN_RATE: f64 = -0.99;
const MAX_RATE: f64 = 10.0;

/// Solves the internal rate of return of a dated cash flow series.
///
/// `dates` and `values` are parallel slices. Implementations return a
/// non-finite value when no rate can be determined.
pub trait IrrSolver {
    fn calculate(&self, dates: &[NaiveDate], values: &[f64]) -> f64;
}

/// Result of an IRR calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrrResult {
    pub irr: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Newton-Raphson IRR solver with bounded rate
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonRaphsonIrr;

impl IrrSolver for NewtonRaphsonIrr {
    fn calculate(&self, dates: &[NaiveDate], values: &[f64]) -> f64 {
        calculate_irr(dates, values)
    }
}

/// IRR of the series, or NaN when it has no sign change or the iteration does
/// not converge
pub fn calculate_irr(dates: &[NaiveDate], values: &[f64]) -> f64 {
    match solve_irr(dates, values) {
        Some(result) if result.converged => result.irr,
        _ => f64::NAN,
    }
}

/// Run the Newton-Raphson iteration. Returns `None` when the series cannot
/// have a root (empty, mismatched, or without both in- and outflows).
pub fn solve_irr(dates: &[NaiveDate], values: &[f64]) -> Option<IrrResult> {
    if dates.is_empty() || dates.len() != values.len() {
        return None;
    }

    let has_outflow = values.iter().any(|v| *v < 0.0);
    let has_inflow = values.iter().any(|v| *v > 0.0);
    if !has_outflow || !has_inflow {
        return None;
    }

    let first_date = dates.iter().min().copied()?;

    let cf_series: Vec<(f64, f64)> = dates
        .iter()
        .zip(values)
        .map(|(date, value)| {
            let years = (*date - first_date).num_days() as f64 / 365.0;
            (*value, years)
        })
        .collect();

    let mut rate = INITIAL_GUESS;

    for iteration in 0..MAX_ITERATIONS {
        let (npv, dnpv) = calculate_npv_and_derivative(&cf_series, rate);

        if dnpv.abs() < TOLERANCE {
            // Derivative too small, can't continue
            return Some(IrrResult {
                irr: rate,
                converged: npv.abs() < TOLERANCE,
                iterations: iteration,
            });
        }

        let new_rate = rate - npv / dnpv;

        if (new_rate - rate).abs() < TOLERANCE {
            return Some(IrrResult {
                irr: new_rate,
                converged: true,
                iterations: iteration,
            });
        }

        // Bound the rate to reasonable values
        rate = new_rate.clamp(MIN_RATE, MAX_RATE);
    }

    log::debug!("IRR did not converge after {} iterations (last rate {})", MAX_ITERATIONS, rate);

    Some(IrrResult {
        irr: rate,
        converged: false,
        iterations: MAX_ITERATIONS,
    })
}

/// Calculate NPV and its derivative for Newton-Raphson
fn calculate_npv_and_derivative(cash_flows: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;

    for (cf, years) in cash_flows {
        let discount = (1.0 + rate).powf(*years);
        npv += cf / discount;

        // Derivative: d/dr [cf / (1+r)^t] = -t * cf / (1+r)^(t+1)
        if discount > 0.0 {
            dnpv -= years * cf / (discount * (1.0 + rate));
        }
    }

    (npv, dnpv)
}
