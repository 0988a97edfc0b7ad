use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RealtyModelError;
use crate::types::{Money, Percent, Rate};
use crate::RealtyModelResult;

/// One month of a level-payment amortisation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

/// Input for a full amortisation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Money,
    /// Annual interest rate in percent
    pub annual_rate: Percent,
    pub term_years: u32,
}

/// Schedule plus totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub monthly_payment: Money,
    pub total_paid: Money,
    pub total_interest: Money,
    pub schedule: Vec<AmortizationRow>,
}

fn monthly_rate(annual_rate: Percent) -> RealtyModelResult<Rate> {
    let rate = annual_rate / dec!(100) / dec!(12);
    if rate <= dec!(-1) {
        return Err(RealtyModelError::invalid(
            "interest_rate",
            "Monthly rate must be greater than -100%",
        ));
    }
    Ok(rate)
}

fn total_months(term_years: u32) -> RealtyModelResult<u32> {
    let months = term_years.saturating_mul(12);
    if months == 0 {
        return Err(RealtyModelError::invalid(
            "loan_term",
            "Loan term must be at least 1 year",
        ));
    }
    Ok(months)
}

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1)
///
/// `annual_rate` is a percentage; a zero rate amortises straight-line.
/// Zero or negative principal is not rejected, the result follows the formula.
pub fn calculate_monthly_payment(
    principal: Money,
    annual_rate: Percent,
    term_years: u32,
) -> RealtyModelResult<Money> {
    let rate = monthly_rate(annual_rate)?;
    let n = total_months(term_years)?;

    if rate.is_zero() {
        return Ok(principal / Decimal::from(n));
    }

    let compound = (Decimal::ONE + rate).checked_powu(n as u64).ok_or_else(|| {
        RealtyModelError::FinancialImpossibility(format!(
            "mortgage compounding overflowed at {annual_rate}% over {n} months"
        ))
    })?;
    let denominator = compound - Decimal::ONE;

    if denominator.is_zero() {
        return Err(RealtyModelError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    Ok(principal * rate * compound / denominator)
}

/// Outstanding balance after `months_paid` level payments.
pub fn remaining_balance(
    principal: Money,
    annual_rate: Percent,
    term_years: u32,
    months_paid: u32,
) -> RealtyModelResult<Money> {
    let rate = monthly_rate(annual_rate)?;
    let n = total_months(term_years)?;
    let payment = calculate_monthly_payment(principal, annual_rate, term_years)?;

    let mut balance = principal;
    for _ in 0..months_paid.min(n) {
        balance -= payment - balance * rate;
        if balance < Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
    }

    Ok(balance)
}

/// Month-by-month schedule over the full loan term.
pub fn amortization_schedule(input: &AmortizationInput) -> RealtyModelResult<AmortizationOutput> {
    let rate = monthly_rate(input.annual_rate)?;
    let n = total_months(input.term_years)?;
    let payment = calculate_monthly_payment(input.principal, input.annual_rate, input.term_years)?;

    let mut schedule = Vec::with_capacity(n as usize);
    let mut balance = input.principal;
    let mut total_interest = Decimal::ZERO;

    for period in 1..=n {
        let interest = balance * rate;
        let principal = payment - interest;
        balance -= principal;
        if balance < Decimal::ZERO {
            balance = Decimal::ZERO;
        }
        total_interest += interest;

        schedule.push(AmortizationRow {
            period,
            payment,
            interest,
            principal,
            balance,
        });
    }

    Ok(AmortizationOutput {
        monthly_payment: payment,
        total_paid: payment * Decimal::from(n),
        total_interest,
        schedule,
    })
}
