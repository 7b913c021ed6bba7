use crate::money::{to_finite_number, Money};
use crate::schema::{
    AccountClass, Budget, BudgetCategory, CashPosition, ContactRole, GlAccount,
    ObligationDirection, ObligationSource, OpenObligation, PaymentPattern, RepeatingTransaction,
    TaxObligation, TaxObligationStatus, TaxType, TransactionDirection,
};
use crate::utils::parse_month_year;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OPEN_INVOICE_STATUSES: [&str; 2] = ["OPEN", "AUTHORISED"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBankAccount {
    pub name: String,
    pub balance: Value,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawInvoice {
    pub contact_id: String,
    #[serde(rename = "type")]
    pub invoice_type: String,
    pub status: String,
    pub due_date: Value,
    pub amount_due: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRepeatingTransaction {
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub status: String,
    pub amount: Value,
    pub next_scheduled_date: Value,
    pub end_date: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPaymentPattern {
    pub contact_id: String,
    pub contact_type: String,
    pub average_days_to_pay: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBudget {
    pub month_year: String,
    pub category: String,
    pub budgeted_amount: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTaxObligation {
    #[serde(rename = "type")]
    pub obligation_type: String,
    pub due_date: Value,
    pub amount: Value,
    pub period_start: Value,
    pub period_end: Value,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawGlAccount {
    pub code: String,
    pub name: String,
    #[serde(rename = "class")]
    pub account_class: String,
    pub status: String,
    pub reporting_code: Option<String>,
    pub balance: Value,
}

fn status_is(status: &str, expected: &str) -> bool {
    status.trim().eq_ignore_ascii_case(expected)
}

/// Reads a row date given as `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn row_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|timestamp| timestamp.date())
        })
}

fn required_date(field: &str, value: &Value) -> Option<NaiveDate> {
    let date = row_date(value);
    if date.is_none() {
        debug!("Skipping row with unreadable {}: {}", field, value);
    }
    date
}

/// Cash from active bank accounts; AR/AP from the already-filtered obligations.
pub fn cash_position(
    accounts: &[RawBankAccount],
    receivables: &[OpenObligation],
    payables: &[OpenObligation],
) -> CashPosition {
    let cash = accounts
        .iter()
        .filter(|a| {
            a.status
                .as_deref()
                .map_or(true, |status| status_is(status, "ACTIVE"))
        })
        .map(|a| Money::from_numeric(&a.balance))
        .sum();

    CashPosition {
        cash,
        accounts_receivable: receivables.iter().map(|o| o.amount_due).sum(),
        accounts_payable: payables.iter().map(|o| o.amount_due).sum(),
    }
}

/// Open invoices of one direction with a positive amount due.
pub fn open_obligations(rows: &[RawInvoice], direction: ObligationDirection) -> Vec<OpenObligation> {
    let wanted = direction.invoice_type();

    let obligations: Vec<OpenObligation> = rows
        .iter()
        .filter(|row| TransactionDirection::parse(&row.invoice_type) == Some(wanted))
        .filter(|row| {
            OPEN_INVOICE_STATUSES
                .iter()
                .any(|status| status_is(&row.status, status))
        })
        .filter_map(|row| {
            let amount_due = Money::from_numeric(&row.amount_due);
            if !amount_due.is_positive() {
                return None;
            }
            let due_date = required_date("dueDate", &row.due_date)?;
            Some(OpenObligation {
                contact_id: row.contact_id.clone(),
                due_date,
                amount_due,
                direction,
            })
        })
        .collect();

    debug!(
        "Ingested {} open {:?} obligations from {} rows",
        obligations.len(),
        direction,
        rows.len()
    );
    obligations
}

/// Authorised repeating transactions whose end date has not passed.
pub fn repeating_transactions(
    rows: &[RawRepeatingTransaction],
    today: NaiveDate,
) -> Vec<RepeatingTransaction> {
    rows.iter()
        .filter(|row| status_is(&row.status, "AUTHORISED"))
        .filter_map(|row| {
            let end_date = match &row.end_date {
                Value::Null => None,
                value => Some(required_date("endDate", value)?),
            };
            if end_date.map_or(false, |end| end < today) {
                return None;
            }
            Some(RepeatingTransaction {
                direction: TransactionDirection::parse(&row.transaction_type)?,
                amount: Money::from_numeric(&row.amount),
                next_scheduled_date: required_date("nextScheduledDate", &row.next_scheduled_date)?,
                end_date,
            })
        })
        .collect()
}

pub fn payment_patterns(rows: &[RawPaymentPattern]) -> Vec<PaymentPattern> {
    rows.iter()
        .filter_map(|row| {
            let role = match row.contact_type.trim().to_ascii_uppercase().as_str() {
                "CUSTOMER" => ContactRole::Customer,
                "SUPPLIER" => ContactRole::Supplier,
                _ => return None,
            };
            Some(PaymentPattern {
                contact_id: row.contact_id.clone(),
                role,
                average_days_to_pay: to_finite_number(&row.average_days_to_pay).round() as i64,
            })
        })
        .collect()
}

pub fn budgets(rows: &[RawBudget]) -> Vec<Budget> {
    rows.iter()
        .filter_map(|row| match parse_month_year(&row.month_year) {
            Ok(month) => Some(Budget {
                month,
                category: BudgetCategory::parse(&row.category),
                budgeted_amount: Money::from_numeric(&row.budgeted_amount),
            }),
            Err(e) => {
                debug!("Skipping budget row: {}", e);
                None
            }
        })
        .collect()
}

/// Persisted obligations still awaiting payment.
pub fn pending_tax_obligations(rows: &[RawTaxObligation]) -> Vec<TaxObligation> {
    rows.iter()
        .filter(|row| status_is(&row.status, "PENDING"))
        .filter_map(|row| {
            Some(TaxObligation {
                tax_type: TaxType::parse(&row.obligation_type)?,
                due_date: required_date("dueDate", &row.due_date)?,
                amount: Money::from_numeric(&row.amount),
                period_start: row_date(&row.period_start),
                period_end: row_date(&row.period_end),
                reference: row.reference.clone(),
                notes: row.notes.clone(),
                status: TaxObligationStatus::Pending,
                source: ObligationSource::Persisted,
            })
        })
        .collect()
}

pub fn gl_accounts(rows: &[RawGlAccount]) -> Vec<GlAccount> {
    rows.iter()
        .filter_map(|row| {
            Some(GlAccount {
                code: row.code.clone(),
                name: row.name.clone(),
                class: AccountClass::parse(&row.account_class)?,
                active: status_is(&row.status, "ACTIVE"),
                reporting_code: row.reporting_code.clone(),
                balance: Money::from_numeric(&row.balance),
            })
        })
        .collect()
}
