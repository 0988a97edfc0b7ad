use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RealtyModelError;
use crate::model::{ModelAssumptions, ModelInputs};
use crate::RealtyModelResult;

/// A numeric model field that sensitivity and Monte Carlo runs may perturb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariable {
    PropertyValue,
    PurchasePrice,
    DownPayment,
    LoanAmount,
    InterestRate,
    MonthlyRent,
    VacancyRate,
    OperatingExpenses,
    CapitalExpenditures,
    AppreciationRate,
    TaxRate,
    DepreciationRate,
    ExitCapRate,
    RentGrowthRate,
    ExpenseGrowthRate,
    MarketGrowthRate,
    RiskFreeRate,
    MarketRiskPremium,
    Beta,
}

impl ModelVariable {
    pub const ALL: [ModelVariable; 19] = [
        ModelVariable::PropertyValue,
        ModelVariable::PurchasePrice,
        ModelVariable::DownPayment,
        ModelVariable::LoanAmount,
        ModelVariable::InterestRate,
        ModelVariable::MonthlyRent,
        ModelVariable::VacancyRate,
        ModelVariable::OperatingExpenses,
        ModelVariable::CapitalExpenditures,
        ModelVariable::AppreciationRate,
        ModelVariable::TaxRate,
        ModelVariable::DepreciationRate,
        ModelVariable::ExitCapRate,
        ModelVariable::RentGrowthRate,
        ModelVariable::ExpenseGrowthRate,
        ModelVariable::MarketGrowthRate,
        ModelVariable::RiskFreeRate,
        ModelVariable::MarketRiskPremium,
        ModelVariable::Beta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariable::PropertyValue => "property_value",
            ModelVariable::PurchasePrice => "purchase_price",
            ModelVariable::DownPayment => "down_payment",
            ModelVariable::LoanAmount => "loan_amount",
            ModelVariable::InterestRate => "interest_rate",
            ModelVariable::MonthlyRent => "monthly_rent",
            ModelVariable::VacancyRate => "vacancy_rate",
            ModelVariable::OperatingExpenses => "operating_expenses",
            ModelVariable::CapitalExpenditures => "capital_expenditures",
            ModelVariable::AppreciationRate => "appreciation_rate",
            ModelVariable::TaxRate => "tax_rate",
            ModelVariable::DepreciationRate => "depreciation_rate",
            ModelVariable::ExitCapRate => "exit_cap_rate",
            ModelVariable::RentGrowthRate => "rent_growth_rate",
            ModelVariable::ExpenseGrowthRate => "expense_growth_rate",
            ModelVariable::MarketGrowthRate => "market_growth_rate",
            ModelVariable::RiskFreeRate => "risk_free_rate",
            ModelVariable::MarketRiskPremium => "market_risk_premium",
            ModelVariable::Beta => "beta",
        }
    }

    /// Current value of this field in the given model.
    pub fn read(&self, inputs: &ModelInputs, assumptions: &ModelAssumptions) -> Decimal {
        match self {
            ModelVariable::PropertyValue => inputs.property_value,
            ModelVariable::PurchasePrice => inputs.purchase_price,
            ModelVariable::DownPayment => inputs.down_payment,
            ModelVariable::LoanAmount => inputs.loan_amount,
            ModelVariable::InterestRate => inputs.interest_rate,
            ModelVariable::MonthlyRent => inputs.monthly_rent,
            ModelVariable::VacancyRate => inputs.vacancy_rate,
            ModelVariable::OperatingExpenses => inputs.operating_expenses,
            ModelVariable::CapitalExpenditures => inputs.capital_expenditures,
            ModelVariable::AppreciationRate => inputs.appreciation_rate,
            ModelVariable::TaxRate => inputs.tax_rate,
            ModelVariable::DepreciationRate => inputs.depreciation_rate,
            ModelVariable::ExitCapRate => assumptions.exit_cap_rate,
            ModelVariable::RentGrowthRate => assumptions.rent_growth_rate,
            ModelVariable::ExpenseGrowthRate => assumptions.expense_growth_rate,
            ModelVariable::MarketGrowthRate => assumptions.market_growth_rate,
            ModelVariable::RiskFreeRate => assumptions.risk_free_rate,
            ModelVariable::MarketRiskPremium => assumptions.market_risk_premium,
            ModelVariable::Beta => assumptions.beta,
        }
    }

    /// Overwrite this field in place.
    pub fn apply(&self, inputs: &mut ModelInputs, assumptions: &mut ModelAssumptions, value: Decimal) {
        let slot = match self {
            ModelVariable::PropertyValue => &mut inputs.property_value,
            ModelVariable::PurchasePrice => &mut inputs.purchase_price,
            ModelVariable::DownPayment => &mut inputs.down_payment,
            ModelVariable::LoanAmount => &mut inputs.loan_amount,
            ModelVariable::InterestRate => &mut inputs.interest_rate,
            ModelVariable::MonthlyRent => &mut inputs.monthly_rent,
            ModelVariable::VacancyRate => &mut inputs.vacancy_rate,
            ModelVariable::OperatingExpenses => &mut inputs.operating_expenses,
            ModelVariable::CapitalExpenditures => &mut inputs.capital_expenditures,
            ModelVariable::AppreciationRate => &mut inputs.appreciation_rate,
            ModelVariable::TaxRate => &mut inputs.tax_rate,
            ModelVariable::DepreciationRate => &mut inputs.depreciation_rate,
            ModelVariable::ExitCapRate => &mut assumptions.exit_cap_rate,
            ModelVariable::RentGrowthRate => &mut assumptions.rent_growth_rate,
            ModelVariable::ExpenseGrowthRate => &mut assumptions.expense_growth_rate,
            ModelVariable::MarketGrowthRate => &mut assumptions.market_growth_rate,
            ModelVariable::RiskFreeRate => &mut assumptions.risk_free_rate,
            ModelVariable::MarketRiskPremium => &mut assumptions.market_risk_premium,
            ModelVariable::Beta => &mut assumptions.beta,
        };
        *slot = value;
    }
}

impl fmt::Display for ModelVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariable {
    type Err = RealtyModelError;

    fn from_str(s: &str) -> RealtyModelResult<Self> {
        ModelVariable::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| RealtyModelError::UnknownVariable(s.to_string()))
    }
}

/// A variable to sweep or simulate, with its range.
///
/// `base_value` defaults to the field's value in the base model when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityVariable {
    pub variable: ModelVariable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<Decimal>,
    pub min_value: Decimal,
    pub max_value: Decimal,
    pub step: Decimal,
}

impl SensitivityVariable {
    pub fn resolved_base(&self, inputs: &ModelInputs, assumptions: &ModelAssumptions) -> Decimal {
        self.base_value
            .unwrap_or_else(|| self.variable.read(inputs, assumptions))
    }

    /// Range checks shared by sensitivity sweeps and Monte Carlo draws.
    pub fn validate(&self) -> RealtyModelResult<()> {
        if self.min_value > self.max_value {
            return Err(RealtyModelError::invalid(
                format!("variable:{}", self.variable),
                "min_value must be <= max_value",
            ));
        }
        if self.step <= Decimal::ZERO {
            return Err(RealtyModelError::invalid(
                format!("variable:{}", self.variable),
                "step must be positive",
            ));
        }
        Ok(())
    }
}
