use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RealtyModelError;
use crate::model::{ModelAssumptions, ModelInputs};
use crate::types::{Money, Percent, Rate, RateSolution};
use crate::RealtyModelResult;

const IRR_GUESS: Rate = dec!(0.10);
const IRR_TOLERANCE: Decimal = dec!(0.0001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MIN_DERIVATIVE: Decimal = dec!(0.000000001);
const RATE_FLOOR: Rate = dec!(-0.99);
const RATE_CEILING: Rate = dec!(100);

/// Exit (reversion) valuation at the end of the holding period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitValuation {
    /// (1 + appreciation)^holding_period
    pub appreciation_factor: Decimal,
    /// Property value compounded at the appreciation rate
    pub appreciated_value: Money,
    /// Year-one NOI projected with the rent and expense growth factors
    pub future_noi: Money,
    /// future_noi / exit cap rate
    pub capitalized_value: Money,
    /// capitalized_value * appreciation_factor
    pub exit_value: Money,
}

/// (1 + pct/100)^periods, failing on overflow instead of panicking.
pub(crate) fn growth_factor(pct: Percent, periods: u32) -> RealtyModelResult<Decimal> {
    (Decimal::ONE + pct / dec!(100))
        .checked_powu(periods as u64)
        .ok_or_else(|| {
            RealtyModelError::FinancialImpossibility(format!(
                "compounding {pct}% over {periods} periods overflows"
            ))
        })
}

fn overflow(what: &str) -> RealtyModelError {
    RealtyModelError::FinancialImpossibility(format!("{what} exceeds the Decimal range"))
}

/// Project after-debt cash flows for years 1..=holding_period.
///
/// Rent and operating expenses grow from the year-one figures by
/// `(1 + g)^(year - 1)`. There is no year-0 acquisition outlay in the series.
pub fn calculate_cash_flows(
    inputs: &ModelInputs,
    assumptions: &ModelAssumptions,
    annual_debt_service: Money,
) -> RealtyModelResult<Vec<Money>> {
    let gross_rent = inputs
        .monthly_rent
        .checked_mul(dec!(12))
        .ok_or_else(|| overflow("gross annual rent"))?;
    let mut flows = Vec::with_capacity(assumptions.holding_period as usize);

    for year in 1..=assumptions.holding_period {
        let rent = gross_rent
            .checked_mul(growth_factor(assumptions.rent_growth_rate, year - 1)?)
            .ok_or_else(|| overflow(&format!("year {year} rent")))?;
        let expenses = inputs
            .operating_expenses
            .checked_mul(growth_factor(assumptions.expense_growth_rate, year - 1)?)
            .ok_or_else(|| overflow(&format!("year {year} operating expenses")))?;
        let cash_flow = rent
            .checked_mul(inputs.vacancy_rate / dec!(100))
            .and_then(|vacancy| rent.checked_sub(vacancy))
            .and_then(|egi| egi.checked_sub(expenses))
            .and_then(|noi| noi.checked_sub(annual_debt_service))
            .and_then(|cf| cf.checked_sub(inputs.capital_expenditures))
            .ok_or_else(|| overflow(&format!("year {year} cash flow")))?;
        flows.push(cash_flow);
    }

    Ok(flows)
}

/// Net Present Value of year-end cash flows, the first flow discounted one period.
pub fn calculate_npv(cash_flows: &[Money], discount_rate: Percent) -> RealtyModelResult<Money> {
    let rate = discount_rate / dec!(100);
    if rate <= dec!(-1) {
        return Err(RealtyModelError::invalid(
            "discount_rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        discount = discount.checked_mul(one_plus_r).ok_or_else(|| {
            RealtyModelError::FinancialImpossibility(format!(
                "NPV discount factor overflowed at period {}",
                i + 1
            ))
        })?;
        if discount.is_zero() {
            return Err(RealtyModelError::DivisionByZero {
                context: format!("NPV discount factor at period {}", i + 1),
            });
        }
        result = cf
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(|| overflow(&format!("NPV at period {}", i + 1)))?;
    }

    Ok(result)
}

/// NPV(r) = sum CF_t / (1+r)^t for t = 1..n, and d(NPV)/dr.
/// Returns None if the arithmetic leaves the Decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let v = Decimal::ONE.checked_div(one_plus_r)?;
    let mut discount = Decimal::ONE;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        let t = Decimal::from(i as u64 + 1);
        discount = discount.checked_mul(v)?;
        let pv = cf.checked_mul(discount)?;
        npv = npv.checked_add(pv)?;
        // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
        dnpv = dnpv.checked_sub(t.checked_mul(pv)?.checked_mul(v)?)?;
    }

    Some((npv, dnpv))
}

/// Internal Rate of Return by Newton-Raphson, reported in percent.
///
/// Starts at 10% and stops when |NPV| or the Newton step drops below 0.0001.
/// A vanishing derivative, arithmetic overflow, or 100 iterations without
/// converging yields `converged = false` with the last estimate.
pub fn calculate_irr(cash_flows: &[Money]) -> RateSolution {
    let mut rate = IRR_GUESS;

    for i in 0..MAX_IRR_ITERATIONS {
        let Some((npv, dnpv)) = npv_and_derivative(cash_flows, rate) else {
            return RateSolution::not_converged(rate * dec!(100), i);
        };

        if npv.abs() < IRR_TOLERANCE {
            return RateSolution::converged(rate * dec!(100), i);
        }

        if dnpv.abs() < MIN_DERIVATIVE {
            return RateSolution::not_converged(rate * dec!(100), i);
        }

        let Some(step) = npv.checked_div(dnpv) else {
            return RateSolution::not_converged(rate * dec!(100), i);
        };
        let next = rate - step;

        if step.abs() < IRR_TOLERANCE && next > RATE_FLOOR && next < RATE_CEILING {
            return RateSolution::converged(next * dec!(100), i + 1);
        }

        // Guard against runaway
        rate = next.clamp(RATE_FLOOR, RATE_CEILING);
    }

    RateSolution::not_converged(rate * dec!(100), MAX_IRR_ITERATIONS)
}

/// Modified IRR, reported in percent.
///
/// Negative flows are discounted to t=0 at `finance_rate`; positive flows are
/// compounded to the final year at `reinvest_rate` with exponent `n - i - 1`.
/// A series without both signs has no MIRR and is returned unconverged at 0.
pub fn calculate_mirr(
    cash_flows: &[Money],
    finance_rate: Percent,
    reinvest_rate: Percent,
) -> RealtyModelResult<RateSolution> {
    let n = cash_flows.len();
    if n == 0 {
        return Ok(RateSolution::not_converged(Decimal::ZERO, 0));
    }

    let mut pv_negative = Decimal::ZERO;
    let mut fv_positive = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        if *cf < Decimal::ZERO {
            let factor = growth_factor(finance_rate, i as u32 + 1)?;
            if factor.is_zero() {
                return Err(RealtyModelError::DivisionByZero {
                    context: "MIRR finance discount factor".into(),
                });
            }
            pv_negative += cf.abs() / factor;
        } else if *cf > Decimal::ZERO {
            fv_positive += *cf * growth_factor(reinvest_rate, (n - i - 1) as u32)?;
        }
    }

    if pv_negative.is_zero() || fv_positive.is_zero() {
        return Ok(RateSolution::not_converged(Decimal::ZERO, 0));
    }

    let exponent = Decimal::ONE / Decimal::from(n as u64);
    match (fv_positive / pv_negative).checked_powd(exponent) {
        Some(root) => Ok(RateSolution::converged((root - Decimal::ONE) * dec!(100), 0)),
        None => Ok(RateSolution::not_converged(Decimal::ZERO, 0)),
    }
}

/// Exit value blending appreciation with capitalised future NOI.
pub fn calculate_exit_value(
    inputs: &ModelInputs,
    assumptions: &ModelAssumptions,
    noi: Money,
) -> RealtyModelResult<ExitValuation> {
    if assumptions.exit_cap_rate.is_zero() {
        return Err(RealtyModelError::DivisionByZero {
            context: "exit capitalisation (future NOI / exit cap rate)".into(),
        });
    }

    let hold = assumptions.holding_period;
    let appreciation_factor = growth_factor(inputs.appreciation_rate, hold)?;
    let rent_factor = growth_factor(assumptions.rent_growth_rate, hold)?;
    let expense_factor = growth_factor(assumptions.expense_growth_rate, hold)?;

    let future_noi = noi
        .checked_mul(rent_factor)
        .zip(noi.checked_mul(Decimal::ONE - expense_factor))
        .and_then(|(grown, shrink)| grown.checked_sub(shrink))
        .ok_or_else(|| overflow("future NOI"))?;
    let capitalized_value = future_noi
        .checked_div(assumptions.exit_cap_rate / dec!(100))
        .ok_or_else(|| overflow("capitalised exit value"))?;

    Ok(ExitValuation {
        appreciation_factor,
        appreciated_value: inputs
            .property_value
            .checked_mul(appreciation_factor)
            .ok_or_else(|| overflow("appreciated property value"))?,
        future_noi,
        capitalized_value,
        exit_value: capitalized_value
            .checked_mul(appreciation_factor)
            .ok_or_else(|| overflow("exit value"))?,
    })
}

/// First year (1-based) in which cumulative cash flow reaches the initial
/// investment, or None if it never does within the series.
pub fn payback_period(cash_flows: &[Money], initial_investment: Money) -> Option<u32> {
    let mut cumulative = Decimal::ZERO;
    for (i, cf) in cash_flows.iter().enumerate() {
        cumulative += cf;
        if cumulative >= initial_investment {
            return Some(i as u32 + 1);
        }
    }
    None
}
