use crate::money::Money;
use crate::schema::{
    Budget, BudgetCategory, ContactRole, OpenObligation, PaymentPattern, RepeatingTransaction,
    TaxObligation, TransactionDirection,
};
use crate::utils::{days_in_month, first_day_of_month, shift_days};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

/// Lookup of average days-to-pay keyed by counterparty and role.
#[derive(Debug, Clone, Default)]
pub struct PaymentPatternIndex {
    by_contact: HashMap<(String, ContactRole), i64>,
}

impl PaymentPatternIndex {
    pub fn new(patterns: &[PaymentPattern]) -> Self {
        let by_contact = patterns
            .iter()
            .map(|p| ((p.contact_id.clone(), p.role), p.average_days_to_pay))
            .collect();
        Self { by_contact }
    }

    pub fn average_days_to_pay(&self, contact_id: &str, role: ContactRole) -> Option<i64> {
        self.by_contact.get(&(contact_id.to_string(), role)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_contact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_contact.is_empty()
    }
}

/// Due date shifted by the counterparty's average days to pay, if known.
pub fn expected_payment_date(obligation: &OpenObligation, patterns: &PaymentPatternIndex) -> NaiveDate {
    let role = obligation.direction.counterparty_role();
    patterns
        .average_days_to_pay(&obligation.contact_id, role)
        .and_then(|days| shift_days(obligation.due_date, days))
        .unwrap_or(obligation.due_date)
}

fn obligations_expected_on(
    day: NaiveDate,
    obligations: &[OpenObligation],
    patterns: &PaymentPatternIndex,
) -> Money {
    obligations
        .iter()
        .filter(|o| expected_payment_date(o, patterns) == day)
        .map(|o| o.amount_due)
        .sum::<Money>()
        .non_negative()
}

/// Receivables expected to be paid to us on `day`.
pub fn receivable_inflow(
    day: NaiveDate,
    receivables: &[OpenObligation],
    patterns: &PaymentPatternIndex,
) -> Money {
    obligations_expected_on(day, receivables, patterns)
}

/// Bills we expect to pay on `day`.
pub fn payable_outflow(
    day: NaiveDate,
    payables: &[OpenObligation],
    patterns: &PaymentPatternIndex,
) -> Money {
    obligations_expected_on(day, payables, patterns)
}

/// Repeating transactions of one direction scheduled for exactly `day`.
/// The caller passes only transactions of the direction being computed.
pub fn repeating_flow(day: NaiveDate, transactions: &[RepeatingTransaction]) -> Money {
    transactions
        .iter()
        .filter(|t| t.next_scheduled_date == day)
        .map(|t| t.amount)
        .sum::<Money>()
        .non_negative()
}

/// Splits repeating transactions into (receipts, payments).
pub fn split_repeating(
    transactions: &[RepeatingTransaction],
) -> (Vec<RepeatingTransaction>, Vec<RepeatingTransaction>) {
    transactions
        .iter()
        .cloned()
        .partition(|t| t.direction == TransactionDirection::AccRec)
}

/// Tax obligations falling due on `day`.
pub fn tax_outflow(day: NaiveDate, obligations: &[TaxObligation]) -> Money {
    obligations
        .iter()
        .filter(|o| o.due_date == day)
        .map(|o| o.amount)
        .sum::<Money>()
        .non_negative()
}

/// Planning buffer from monthly expense budgets.
///
/// Each expense budget for the day's month contributes its daily share less
/// the day's committed outflow (floored at zero), discounted by the budgeted
/// confidence weight.
pub fn budget_outflow(
    day: NaiveDate,
    budgets: &[Budget],
    actual_outflow: Money,
    budgeted_weight: f64,
) -> Money {
    let month = first_day_of_month(day);
    let days = f64::from(days_in_month(day.year(), day.month()));

    budgets
        .iter()
        .filter(|b| b.category == BudgetCategory::Expense && b.month == month)
        .map(|b| {
            let daily_budget = b.budgeted_amount / days;
            (daily_budget - actual_outflow).non_negative() * budgeted_weight
        })
        .sum::<Money>()
        .non_negative()
}

/// Expenses inferred from payment history that are not yet captured in the
/// ledger. No inference model is wired in, so this contributes nothing.
pub fn pattern_outflow(_day: NaiveDate, _patterns: &PaymentPatternIndex) -> Money {
    Money::ZERO
}
