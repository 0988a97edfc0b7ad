use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RealtyModelError;
use crate::model::ModelInputs;
use crate::types::{Money, Multiple, Percent};
use crate::RealtyModelResult;

/// Year-one operating and financing metrics for a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingMetrics {
    pub gross_annual_rent: Money,
    pub vacancy_loss: Money,
    pub effective_gross_income: Money,
    pub net_operating_income: Money,
    pub annual_cash_flow: Money,
    pub monthly_cash_flow: Money,
    pub cap_rate: Percent,
    pub cash_on_cash_return: Percent,
    pub gross_rent_multiplier: Multiple,
    /// None when there is no debt service
    pub debt_service_coverage_ratio: Option<Multiple>,
    pub loan_to_value_ratio: Percent,
    /// None for an unlevered property
    pub debt_yield: Option<Percent>,
    pub return_on_equity: Percent,
    pub return_on_investment: Percent,
    pub price_per_square_foot: Money,
}

fn ratio(numerator: Decimal, denominator: Decimal, context: &str) -> RealtyModelResult<Decimal> {
    if denominator.is_zero() {
        return Err(RealtyModelError::DivisionByZero {
            context: context.into(),
        });
    }
    Ok(numerator / denominator)
}

/// Net operating income before debt service: rent less vacancy less opex.
pub fn net_operating_income(inputs: &ModelInputs) -> Money {
    let gross = inputs.monthly_rent * dec!(12);
    let egi = gross - gross * inputs.vacancy_rate / dec!(100);
    egi - inputs.operating_expenses
}

/// Compute income, cash flow and ratio metrics given the annual debt service.
pub fn calculate_operating_metrics(
    inputs: &ModelInputs,
    annual_debt_service: Money,
) -> RealtyModelResult<OperatingMetrics> {
    let gross_annual_rent = inputs.monthly_rent * dec!(12);
    let vacancy_loss = gross_annual_rent * inputs.vacancy_rate / dec!(100);
    let effective_gross_income = gross_annual_rent - vacancy_loss;
    let net_operating_income = net_operating_income(inputs);

    let annual_cash_flow = net_operating_income - annual_debt_service;
    let monthly_cash_flow = annual_cash_flow / dec!(12);

    let cap_rate = ratio(net_operating_income, inputs.property_value, "cap rate (NOI / property value)")?
        * dec!(100);
    let cash_on_cash_return =
        ratio(annual_cash_flow, inputs.down_payment, "cash-on-cash (cash flow / down payment)")?
            * dec!(100);
    let gross_rent_multiplier = ratio(
        inputs.property_value,
        gross_annual_rent,
        "gross rent multiplier (value / gross rent)",
    )?;

    let debt_service_coverage_ratio = if annual_debt_service.is_zero() {
        None
    } else {
        Some(net_operating_income / annual_debt_service)
    };

    let loan_to_value_ratio =
        ratio(inputs.loan_amount, inputs.property_value, "LTV (loan / property value)")? * dec!(100);

    let debt_yield = if inputs.loan_amount.is_zero() {
        None
    } else {
        Some(net_operating_income / inputs.loan_amount * dec!(100))
    };

    let return_on_equity = ratio(
        annual_cash_flow,
        inputs.property_value - inputs.loan_amount,
        "ROE (cash flow / equity)",
    )? * dec!(100);
    let return_on_investment =
        ratio(annual_cash_flow, inputs.down_payment, "ROI (cash flow / down payment)")? * dec!(100);

    let price_per_square_foot = match inputs.square_footage() {
        Some(sqft) if sqft > Decimal::ZERO => inputs.property_value / sqft,
        _ => Decimal::ZERO,
    };

    Ok(OperatingMetrics {
        gross_annual_rent,
        vacancy_loss,
        effective_gross_income,
        net_operating_income,
        annual_cash_flow,
        monthly_cash_flow,
        cap_rate,
        cash_on_cash_return,
        gross_rent_multiplier,
        debt_service_coverage_ratio,
        loan_to_value_ratio,
        debt_yield,
        return_on_equity,
        return_on_investment,
        price_per_square_foot,
    })
}
