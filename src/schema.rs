use crate::money::Money;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashPosition {
    /// Sum of active bank account balances
    pub cash: Money,
    pub accounts_receivable: Money,
    pub accounts_payable: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationDirection {
    /// Money owed to the organisation (sales invoice)
    Receivable,
    /// Money owed by the organisation (bill)
    Payable,
}

impl ObligationDirection {
    pub fn counterparty_role(self) -> ContactRole {
        match self {
            ObligationDirection::Receivable => ContactRole::Customer,
            ObligationDirection::Payable => ContactRole::Supplier,
        }
    }

    pub fn invoice_type(self) -> TransactionDirection {
        match self {
            ObligationDirection::Receivable => TransactionDirection::AccRec,
            ObligationDirection::Payable => TransactionDirection::AccPay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactRole {
    Customer,
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TransactionDirection {
    #[serde(rename = "ACCREC")]
    AccRec,
    #[serde(rename = "ACCPAY")]
    AccPay,
}

impl TransactionDirection {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "ACCREC" => Some(TransactionDirection::AccRec),
            "ACCPAY" => Some(TransactionDirection::AccPay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenObligation {
    pub contact_id: String,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub direction: ObligationDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPattern {
    pub contact_id: String,
    pub role: ContactRole,
    /// Days between due date and actual payment; negative means early payers
    pub average_days_to_pay: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepeatingTransaction {
    pub direction: TransactionDirection,
    pub amount: Money,
    pub next_scheduled_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetCategory {
    Income,
    Expense,
    #[serde(other)]
    Other,
}

impl BudgetCategory {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "INCOME" | "REVENUE" => BudgetCategory::Income,
            "EXPENSE" => BudgetCategory::Expense,
            _ => BudgetCategory::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// First day of the budgeted month
    pub month: NaiveDate,
    pub category: BudgetCategory,
    pub budgeted_amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxType {
    Vat,
    PayeNi,
    CorporationTax,
}

impl TaxType {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "VAT" => Some(TaxType::Vat),
            "PAYE_NI" | "PAYE" => Some(TaxType::PayeNi),
            "CORPORATION_TAX" => Some(TaxType::CorporationTax),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaxType::Vat => "VAT",
            TaxType::PayeNi => "PAYE/NI",
            TaxType::CorporationTax => "Corporation Tax",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxObligationStatus {
    Pending,
    Filed,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationSource {
    /// Read from the store with status PENDING
    Persisted,
    /// Derived by the tax scheduler for this run
    Computed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxObligation {
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub status: TaxObligationStatus,
    pub source: ObligationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountClass {
    Asset,
    Equity,
    Expense,
    Liability,
    Revenue,
}

impl AccountClass {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Some(AccountClass::Asset),
            "EQUITY" => Some(AccountClass::Equity),
            "EXPENSE" => Some(AccountClass::Expense),
            "LIABILITY" => Some(AccountClass::Liability),
            "REVENUE" => Some(AccountClass::Revenue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlAccount {
    pub code: String,
    pub name: String,
    pub class: AccountClass,
    pub active: bool,
    pub reporting_code: Option<String>,
    pub balance: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Inflows {
    pub from_invoices: Money,
    pub from_repeating: Money,
    pub from_other: Money,
    pub total: Money,
}

impl Inflows {
    pub fn new(from_invoices: Money, from_repeating: Money, from_other: Money) -> Self {
        Self {
            from_invoices,
            from_repeating,
            from_other,
            total: from_invoices + from_repeating + from_other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Outflows {
    pub to_bills: Money,
    pub to_repeating: Money,
    pub to_taxes: Money,
    pub to_patterns: Money,
    pub to_budgets: Money,
    pub total: Money,
}

impl Outflows {
    pub fn new(
        to_bills: Money,
        to_repeating: Money,
        to_taxes: Money,
        to_patterns: Money,
        to_budgets: Money,
    ) -> Self {
        Self {
            to_bills,
            to_repeating,
            to_taxes,
            to_patterns,
            to_budgets,
            total: to_bills + to_repeating + to_taxes + to_patterns + to_budgets,
        }
    }

    /// Committed outflows: bills, repeating payments and taxes.
    pub fn actual(&self) -> Money {
        self.to_bills + self.to_repeating + self.to_taxes
    }

    pub fn with_budgets(self, to_budgets: Money) -> Self {
        Self::new(
            self.to_bills,
            self.to_repeating,
            self.to_taxes,
            self.to_patterns,
            to_budgets,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scenarios {
    pub best_case: Money,
    pub worst_case: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    LowBalance,
    LargePayment,
    TaxDue,
    OverdueInvoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub opening_balance: Money,
    pub inflows: Inflows,
    pub outflows: Outflows,
    pub closing_balance: Money,
    pub scenarios: Scenarios,
    pub confidence_level: f64,
    pub alerts: Vec<Alert>,
}

impl DailyForecast {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DailyForecast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastWindow {
    /// `[start, start + days]`.
    pub fn from_start(start: NaiveDate, days: u32) -> Self {
        let end = start
            .checked_add_days(chrono::Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub position: CashPosition,
    pub receivables: Vec<OpenObligation>,
    pub payables: Vec<OpenObligation>,
    pub repeating: Vec<RepeatingTransaction>,
    pub patterns: Vec<PaymentPattern>,
    pub budgets: Vec<Budget>,
    pub tax_obligations: Vec<TaxObligation>,
}
