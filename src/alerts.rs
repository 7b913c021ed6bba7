use crate::config::AlertThresholds;
use crate::money::Money;
use crate::schema::{Alert, AlertSeverity, AlertType, OpenObligation};
use chrono::NaiveDate;

/// The values of one projected day that alerts are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct AlertContext {
    pub date: NaiveDate,
    pub closing_balance: Money,
    pub total_outflow: Money,
    pub tax_outflow: Money,
    /// The run's "today"; overdue receivables are only reported on this day.
    pub today: NaiveDate,
}

/// Evaluates the four alert checks for one day.
///
/// The checks run independently and in fixed order, so a single day can
/// carry all four.
pub fn generate_alerts(
    ctx: &AlertContext,
    receivables: &[OpenObligation],
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let symbol = &thresholds.currency_symbol;

    let closing = ctx.closing_balance.value();
    if closing < thresholds.low_balance {
        let severity = if closing < thresholds.critical_balance {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        let state = if closing < 0.0 { "negative" } else { "low" };
        alerts.push(Alert {
            alert_type: AlertType::LowBalance,
            severity,
            message: format!(
                "Cash balance projected to be {} on {}: {}{}",
                state, ctx.date, symbol, ctx.closing_balance
            ),
            amount: Some(ctx.closing_balance),
        });
    }

    if ctx.total_outflow.value() > thresholds.large_payment {
        alerts.push(Alert {
            alert_type: AlertType::LargePayment,
            severity: AlertSeverity::Info,
            message: format!(
                "Large outflow of {}{} expected on {}",
                symbol, ctx.total_outflow, ctx.date
            ),
            amount: Some(ctx.total_outflow),
        });
    }

    if ctx.tax_outflow.is_positive() {
        alerts.push(Alert {
            alert_type: AlertType::TaxDue,
            severity: AlertSeverity::Warning,
            message: format!(
                "Tax payment of {}{} due on {}",
                symbol, ctx.tax_outflow, ctx.date
            ),
            amount: Some(ctx.tax_outflow),
        });
    }

    if ctx.date == ctx.today {
        if let Some(alert) = overdue_alert(ctx.today, receivables, thresholds) {
            alerts.push(alert);
        }
    }

    alerts
}

/// Aggregate alert for receivables more than `overdue_days` past due as of `today`.
pub fn overdue_alert(
    today: NaiveDate,
    receivables: &[OpenObligation],
    thresholds: &AlertThresholds,
) -> Option<Alert> {
    let overdue: Vec<&OpenObligation> = receivables
        .iter()
        .filter(|r| (today - r.due_date).num_days() > thresholds.overdue_days)
        .collect();

    if overdue.is_empty() {
        return None;
    }

    let total: Money = overdue.iter().map(|r| r.amount_due).sum();
    Some(Alert {
        alert_type: AlertType::OverdueInvoice,
        severity: AlertSeverity::Warning,
        message: format!(
            "{} invoice(s) more than {} days overdue totalling {}{}",
            overdue.len(),
            thresholds.overdue_days,
            thresholds.currency_symbol,
            total
        ),
        amount: Some(total),
    })
}
