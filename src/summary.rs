use crate::config::AlertThresholds;
use crate::money::Money;
use crate::schema::{AlertSeverity, DailyForecast};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Headline figures over a forecast sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub days: usize,
    pub lowest_closing_balance: Option<(NaiveDate, Money)>,
    /// First day closing below the low-balance threshold
    pub first_low_balance_date: Option<NaiveDate>,
    pub total_inflow: Money,
    pub total_outflow: Money,
    pub ending_balance: Money,
    pub info_alerts: usize,
    pub warning_alerts: usize,
    pub critical_alerts: usize,
}

impl ForecastSummary {
    pub fn from_forecasts(forecasts: &[DailyForecast], thresholds: &AlertThresholds) -> Self {
        let mut summary = ForecastSummary {
            days: forecasts.len(),
            ..Self::default()
        };

        for day in forecasts {
            summary.total_inflow += day.inflows.total;
            summary.total_outflow += day.outflows.total;

            let is_lower = summary
                .lowest_closing_balance
                .map_or(true, |(_, lowest)| day.closing_balance < lowest);
            if is_lower {
                summary.lowest_closing_balance = Some((day.date, day.closing_balance));
            }

            if summary.first_low_balance_date.is_none()
                && day.closing_balance.value() < thresholds.low_balance
            {
                summary.first_low_balance_date = Some(day.date);
            }

            for alert in &day.alerts {
                match alert.severity {
                    AlertSeverity::Info => summary.info_alerts += 1,
                    AlertSeverity::Warning => summary.warning_alerts += 1,
                    AlertSeverity::Critical => summary.critical_alerts += 1,
                }
            }
        }

        summary.ending_balance = forecasts
            .last()
            .map(|day| day.closing_balance)
            .unwrap_or_default();
        summary
    }

    pub fn total_alerts(&self) -> usize {
        self.info_alerts + self.warning_alerts + self.critical_alerts
    }
}
