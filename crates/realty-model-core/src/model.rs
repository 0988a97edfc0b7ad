use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::amortization::{calculate_monthly_payment, remaining_balance};
use crate::dcf::{self, ExitValuation};
use crate::error::RealtyModelError;
use crate::metrics;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Percent, RateSolution};
use crate::RealtyModelResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Descriptive property facts that do not drive the cash-flow model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_footage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Property and financing inputs. Rates are percentages (6.5 = 6.5%).
///
/// `loan_amount` is expected to equal `purchase_price - down_payment`; the
/// engine does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInputs {
    pub property_value: Money,
    pub purchase_price: Money,
    pub down_payment: Money,
    pub loan_amount: Money,
    /// Annual mortgage interest rate
    pub interest_rate: Percent,
    /// Loan term in years
    pub loan_term: u32,
    pub monthly_rent: Money,
    pub vacancy_rate: Percent,
    /// Annual operating expenses
    pub operating_expenses: Money,
    /// Annual capital expenditure reserve
    pub capital_expenditures: Money,
    pub appreciation_rate: Percent,
    pub tax_rate: Percent,
    pub depreciation_rate: Percent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PropertyMetadata>,
}

impl ModelInputs {
    pub fn square_footage(&self) -> Option<Decimal> {
        self.metadata.as_ref().and_then(|m| m.square_footage)
    }
}

/// Holding-period and market assumptions. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAssumptions {
    /// Years held before exit (>= 1)
    pub holding_period: u32,
    pub exit_cap_rate: Percent,
    pub rent_growth_rate: Percent,
    pub expense_growth_rate: Percent,
    pub market_growth_rate: Percent,
    pub risk_free_rate: Percent,
    pub market_risk_premium: Percent,
    /// Carried for reporting; the discount rate does not apply it.
    pub beta: Decimal,
}

impl ModelAssumptions {
    /// Discount rate for NPV: risk-free rate plus market risk premium.
    pub fn discount_rate(&self) -> Percent {
        self.risk_free_rate + self.market_risk_premium
    }
}

/// Every derived investment metric for one set of inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutputs {
    pub net_present_value: Money,
    pub internal_rate_of_return: RateSolution,
    pub modified_internal_rate_of_return: RateSolution,
    pub cash_on_cash_return: Percent,
    pub cap_rate: Percent,
    pub gross_rent_multiplier: Multiple,
    pub price_per_square_foot: Money,
    pub monthly_cash_flow: Money,
    pub annual_cash_flow: Money,
    pub total_cash_flow: Money,
    pub equity_multiple: Multiple,
    /// Year the down payment is recovered; None if never within the hold
    pub payback_period: Option<u32>,
    pub net_operating_income: Money,
    pub debt_service_coverage_ratio: Option<Multiple>,
    pub loan_to_value_ratio: Percent,
    pub debt_yield: Option<Percent>,
    pub return_on_equity: Percent,
    pub return_on_investment: Percent,
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    pub effective_gross_income: Money,
    pub discount_rate: Percent,
    /// Projected after-debt cash flows, years 1..=holding_period
    pub cash_flows: Vec<Money>,
    pub exit: ExitValuation,
    pub loan_balance_at_exit: Money,
}

/// Input envelope for a single property analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyModelInput {
    pub inputs: ModelInputs,
    pub assumptions: ModelAssumptions,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject inputs whose denominators would be zero or whose ranges are
/// meaningless, naming the offending field.
pub fn validate_model(inputs: &ModelInputs, assumptions: &ModelAssumptions) -> RealtyModelResult<()> {
    if inputs.property_value <= Decimal::ZERO {
        return Err(RealtyModelError::invalid(
            "property_value",
            "Property value must be positive",
        ));
    }
    if inputs.down_payment.is_zero() {
        return Err(RealtyModelError::invalid(
            "down_payment",
            "Down payment must be non-zero (cash-on-cash, ROI and equity multiple divide by it)",
        ));
    }
    if inputs.loan_amount < Decimal::ZERO {
        return Err(RealtyModelError::invalid(
            "loan_amount",
            "Loan amount cannot be negative",
        ));
    }
    if (inputs.property_value - inputs.loan_amount).is_zero() {
        return Err(RealtyModelError::invalid(
            "loan_amount",
            "Loan amount equals property value, leaving zero equity for ROE",
        ));
    }
    if inputs.monthly_rent <= Decimal::ZERO {
        return Err(RealtyModelError::invalid(
            "monthly_rent",
            "Monthly rent must be positive",
        ));
    }
    if inputs.vacancy_rate < Decimal::ZERO || inputs.vacancy_rate > dec!(100) {
        return Err(RealtyModelError::invalid(
            "vacancy_rate",
            "Vacancy rate must be between 0% and 100%",
        ));
    }
    if inputs.loan_term < 1 {
        return Err(RealtyModelError::invalid(
            "loan_term",
            "Loan term must be at least 1 year",
        ));
    }
    if assumptions.holding_period < 1 {
        return Err(RealtyModelError::invalid(
            "holding_period",
            "Holding period must be at least 1 year",
        ));
    }
    if assumptions.exit_cap_rate.is_zero() {
        return Err(RealtyModelError::invalid(
            "exit_cap_rate",
            "Exit cap rate must be non-zero",
        ));
    }
    if assumptions.discount_rate() <= dec!(-100) {
        return Err(RealtyModelError::invalid(
            "discount_rate",
            "risk_free_rate + market_risk_premium must be greater than -100%",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Core pipeline
// ---------------------------------------------------------------------------

/// Run the full metric pipeline: amortisation, operating metrics, projected
/// cash flows, NPV/IRR/MIRR, exit value and aggregates.
pub fn calculate_model_outputs(
    inputs: &ModelInputs,
    assumptions: &ModelAssumptions,
) -> RealtyModelResult<ModelOutputs> {
    validate_model(inputs, assumptions)?;

    let discount_rate = assumptions.discount_rate();
    let monthly_payment =
        calculate_monthly_payment(inputs.loan_amount, inputs.interest_rate, inputs.loan_term)?;
    let annual_debt_service = monthly_payment * dec!(12);

    let m = metrics::calculate_operating_metrics(inputs, annual_debt_service)?;

    let cash_flows = dcf::calculate_cash_flows(inputs, assumptions, annual_debt_service)?;
    let net_present_value = dcf::calculate_npv(&cash_flows, discount_rate)?;
    let internal_rate_of_return = dcf::calculate_irr(&cash_flows);
    let modified_internal_rate_of_return =
        dcf::calculate_mirr(&cash_flows, inputs.interest_rate, discount_rate)?;

    let exit = dcf::calculate_exit_value(inputs, assumptions, m.net_operating_income)?;
    let total_cash_flow = cash_flows
        .iter()
        .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(*cf))
        .ok_or_else(|| {
            RealtyModelError::FinancialImpossibility("total cash flow exceeds the Decimal range".into())
        })?;
    let equity_multiple = total_cash_flow
        .checked_add(exit.exit_value)
        .and_then(|total| total.checked_div(inputs.down_payment))
        .ok_or_else(|| {
            RealtyModelError::FinancialImpossibility("equity multiple exceeds the Decimal range".into())
        })?;
    let payback_period = dcf::payback_period(&cash_flows, inputs.down_payment);

    let loan_balance_at_exit = remaining_balance(
        inputs.loan_amount,
        inputs.interest_rate,
        inputs.loan_term,
        assumptions.holding_period.saturating_mul(12),
    )?;

    Ok(ModelOutputs {
        net_present_value,
        internal_rate_of_return,
        modified_internal_rate_of_return,
        cash_on_cash_return: m.cash_on_cash_return,
        cap_rate: m.cap_rate,
        gross_rent_multiplier: m.gross_rent_multiplier,
        price_per_square_foot: m.price_per_square_foot,
        monthly_cash_flow: m.monthly_cash_flow,
        annual_cash_flow: m.annual_cash_flow,
        total_cash_flow,
        equity_multiple,
        payback_period,
        net_operating_income: m.net_operating_income,
        debt_service_coverage_ratio: m.debt_service_coverage_ratio,
        loan_to_value_ratio: m.loan_to_value_ratio,
        debt_yield: m.debt_yield,
        return_on_equity: m.return_on_equity,
        return_on_investment: m.return_on_investment,
        monthly_payment,
        annual_debt_service,
        effective_gross_income: m.effective_gross_income,
        discount_rate,
        cash_flows,
        exit,
        loan_balance_at_exit,
    })
}

/// Analyse one property and wrap the outputs with warnings and metadata.
pub fn analyze_property(
    input: &PropertyModelInput,
) -> RealtyModelResult<ComputationOutput<ModelOutputs>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let inputs = &input.inputs;
    let outputs = calculate_model_outputs(inputs, &input.assumptions)?;

    let expected_loan = inputs.purchase_price - inputs.down_payment;
    if expected_loan != inputs.loan_amount {
        warnings.push(format!(
            "Loan amount {} differs from purchase price less down payment ({expected_loan})",
            inputs.loan_amount
        ));
    }

    if let Some(dscr) = outputs.debt_service_coverage_ratio {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "DSCR of {:.2} is below 1.20x; lender covenant risk",
                dscr
            ));
        }
    }

    if outputs.loan_to_value_ratio > dec!(80) {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80%; high leverage",
            outputs.loan_to_value_ratio
        ));
    }

    if outputs.annual_cash_flow < Decimal::ZERO {
        warnings.push(format!(
            "Negative year-one cash flow of {:.2}",
            outputs.annual_cash_flow
        ));
    }

    if let Err(e) = outputs.internal_rate_of_return.require_converged("IRR") {
        warnings.push(format!("{e}; the reported rate is not a root"));
    }

    if !outputs.modified_internal_rate_of_return.converged {
        warnings.push("MIRR undefined: cash flows need both negative and positive years".into());
    }

    if outputs.payback_period.is_none() {
        warnings.push(format!(
            "Down payment is not recovered within the {}-year holding period",
            input.assumptions.holding_period
        ));
    }

    debug!(
        npv = %outputs.net_present_value,
        cap_rate = %outputs.cap_rate,
        warnings = warnings.len(),
        "property analysis complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real Estate Investment Model (Levered DCF)",
        input,
        warnings,
        elapsed,
        outputs,
    ))
}
