use crate::chart_of_accounts::ChartOfAccounts;
use crate::config::TaxPolicy;
use crate::money::Money;
use crate::schema::{ForecastWindow, ObligationSource, TaxObligation, TaxObligationStatus, TaxType};
use crate::utils::{add_months, fiscal_year_end, last_day_of_month, sub_months};
use chrono::{Datelike, Days, NaiveDate};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialYearEnd {
    pub month: u32,
    pub day: u32,
}

impl Default for FinancialYearEnd {
    fn default() -> Self {
        Self { month: 3, day: 31 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VatScheme {
    FlatRate,
    Cash,
    #[default]
    #[serde(other)]
    Standard,
}

impl VatScheme {
    pub fn label(self) -> &'static str {
        match self {
            VatScheme::FlatRate => "flat rate",
            VatScheme::Cash => "cash accounting",
            VatScheme::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VatReturnFrequency {
    Monthly,
    #[default]
    Quarterly,
}

impl VatReturnFrequency {
    fn months_per_period(self) -> u32 {
        match self {
            VatReturnFrequency::Monthly => 1,
            VatReturnFrequency::Quarterly => 3,
        }
    }

    fn periods_per_year(self) -> f64 {
        match self {
            VatReturnFrequency::Monthly => 12.0,
            VatReturnFrequency::Quarterly => 4.0,
        }
    }
}

/// Organisation tax settings; UK defaults apply to anything missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganisationSettings {
    pub financial_year_end: FinancialYearEnd,
    pub vat_scheme: VatScheme,
    pub vat_returns: VatReturnFrequency,
}

impl OrganisationSettings {
    /// Reads settings from the stored blob, falling back to UK defaults
    /// (31 March year end, standard scheme, quarterly returns) when the blob
    /// is absent or malformed.
    pub fn from_blob(blob: Option<&Value>) -> Self {
        let Some(value) = blob else {
            debug!("No organisation settings stored, using UK defaults");
            return Self::default();
        };

        let settings: OrganisationSettings = match serde_json::from_value(value.clone()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Malformed organisation settings ({}), using UK defaults", e);
                return Self::default();
            }
        };

        let fye = settings.financial_year_end;
        if fiscal_year_end(2000, fye.month, fye.day).is_none() || fye.day > 31 {
            warn!(
                "Invalid financial year end {}/{}, using 31 March",
                fye.day, fye.month
            );
            return Self {
                financial_year_end: FinancialYearEnd::default(),
                ..settings
            };
        }

        settings
    }
}

pub struct TaxScheduler<'a> {
    policy: &'a TaxPolicy,
}

impl<'a> TaxScheduler<'a> {
    pub fn new(policy: &'a TaxPolicy) -> Self {
        Self { policy }
    }

    /// VAT, PAYE/NI and Corporation Tax obligations due inside `window`.
    ///
    /// `chart` is `None` when GL balances could not be read; every
    /// sub-schedule then yields nothing.
    pub fn schedule(
        &self,
        window: ForecastWindow,
        settings: &OrganisationSettings,
        chart: Option<&ChartOfAccounts>,
    ) -> Vec<TaxObligation> {
        let vat_liability = chart.map(|c| c.liability_balance(&self.policy.vat_accounts));
        let paye_liability = chart.map(|c| c.liability_balance(&self.policy.paye_accounts));
        let annual_profit = chart.map(ChartOfAccounts::annual_profit);

        let mut obligations = self.vat_obligations(window, settings, vat_liability);
        obligations.extend(self.paye_obligations(window, paye_liability));
        obligations.extend(self.corporation_tax_obligations(window, settings, annual_profit));

        debug!(
            "Scheduled {} tax obligations between {} and {}",
            obligations.len(),
            window.start,
            window.end
        );
        obligations
    }

    pub fn vat_obligations(
        &self,
        window: ForecastWindow,
        settings: &OrganisationSettings,
        vat_liability: Option<Money>,
    ) -> Vec<TaxObligation> {
        let Some(liability) = usable_amount("VAT liability", vat_liability) else {
            return Vec::new();
        };

        let frequency = settings.vat_returns;
        let amount = liability / frequency.periods_per_year();

        let notes = format!(
            "Estimated from current VAT liability balance ({} scheme)",
            settings.vat_scheme.label()
        );

        periods(window.start, window.end, frequency.months_per_period())
            .into_iter()
            .filter_map(|(period_start, period_end)| {
                let due_date =
                    period_end.checked_add_days(Days::new(self.policy.vat_filing_offset_days))?;
                if !window.contains(due_date) {
                    return None;
                }
                let reference = match frequency {
                    VatReturnFrequency::Quarterly => format!(
                        "VAT-{}-Q{}",
                        period_end.year(),
                        (period_end.month() - 1) / 3 + 1
                    ),
                    VatReturnFrequency::Monthly => {
                        format!("VAT-{}", period_end.format("%Y-%m"))
                    }
                };
                Some(computed(
                    TaxType::Vat,
                    due_date,
                    amount,
                    period_start,
                    period_end,
                    reference,
                    &notes,
                ))
            })
            .collect()
    }

    pub fn paye_obligations(
        &self,
        window: ForecastWindow,
        paye_liability: Option<Money>,
    ) -> Vec<TaxObligation> {
        let Some(liability) = usable_amount("PAYE/NI liability", paye_liability) else {
            return Vec::new();
        };

        periods(window.start, window.end, 1)
            .into_iter()
            .filter_map(|(period_start, period_end)| {
                let following = period_end.succ_opt()?;
                let due_date = following.with_day(self.policy.paye_due_day)?;
                if !window.contains(due_date) {
                    return None;
                }
                Some(computed(
                    TaxType::PayeNi,
                    due_date,
                    liability,
                    period_start,
                    period_end,
                    format!("PAYE-{}", period_start.format("%Y-%m")),
                    "Full monthly PAYE/NI liability balance",
                ))
            })
            .collect()
    }

    pub fn corporation_tax_obligations(
        &self,
        window: ForecastWindow,
        settings: &OrganisationSettings,
        annual_profit: Option<Money>,
    ) -> Vec<TaxObligation> {
        let Some(profit) = annual_profit else {
            warn!("Annual profit unavailable, skipping Corporation Tax schedule");
            return Vec::new();
        };

        let rate = if profit.value() > self.policy.corporation_tax_main_rate_threshold {
            self.policy.corporation_tax_main_rate
        } else {
            self.policy.corporation_tax_small_rate
        };
        let tax = profit * rate;
        if !tax.is_positive() {
            debug!("No Corporation Tax due on profit {}", profit);
            return Vec::new();
        }

        let Some(current) = self.current_year_end(window.start, settings) else {
            warn!("Cannot resolve the fiscal year containing {}", window.start);
            return Vec::new();
        };
        let fye = settings.financial_year_end;

        [current.year(), current.year() + 1]
            .into_iter()
            .filter_map(|year| {
                let year_end = fiscal_year_end(year, fye.month, fye.day)?;
                let due_date = add_months(year_end, self.policy.corporation_tax_offset_months)?
                    .checked_add_days(Days::new(self.policy.corporation_tax_offset_days))?;
                if !window.contains(due_date) {
                    return None;
                }
                let period_start = sub_months(year_end, 12)?.succ_opt()?;
                Some(computed(
                    TaxType::CorporationTax,
                    due_date,
                    tax,
                    period_start,
                    year_end,
                    format!("CT-FY{}", year_end.year()),
                    &format!("{:.0}% of annual profit {}", rate * 100.0, profit),
                ))
            })
            .collect()
    }

    /// Last day of the fiscal year that contains `date`.
    pub fn current_year_end(
        &self,
        date: NaiveDate,
        settings: &OrganisationSettings,
    ) -> Option<NaiveDate> {
        let fye = settings.financial_year_end;
        let this_year = fiscal_year_end(date.year(), fye.month, fye.day)?;
        if this_year >= date {
            Some(this_year)
        } else {
            fiscal_year_end(date.year() + 1, fye.month, fye.day)
        }
    }
}

/// Merges persisted and freshly computed obligations.
///
/// Obligations are keyed by (type, due date); a persisted row wins over a
/// computed one with the same key. Result is ordered by due date.
pub fn merge_obligations(
    persisted: Vec<TaxObligation>,
    computed: Vec<TaxObligation>,
) -> Vec<TaxObligation> {
    let mut merged: BTreeMap<(NaiveDate, TaxType), TaxObligation> = BTreeMap::new();

    for obligation in computed {
        merged.insert((obligation.due_date, obligation.tax_type), obligation);
    }
    for obligation in persisted {
        let key = (obligation.due_date, obligation.tax_type);
        if merged.insert(key, obligation).is_some() {
            debug!(
                "Persisted {} obligation due {} replaces the computed one",
                key.1.label(),
                key.0
            );
        }
    }

    merged.into_values().collect()
}

fn usable_amount(label: &str, amount: Option<Money>) -> Option<Money> {
    match amount {
        None => {
            warn!("{} unavailable, skipping schedule", label);
            None
        }
        Some(value) if !value.is_positive() => {
            debug!("{} is {}, nothing to schedule", label, value);
            None
        }
        Some(value) => Some(value),
    }
}

// Calendar-aligned periods of `months` length, from the one containing
// `from` through the one containing `to`.
fn periods(from: NaiveDate, to: NaiveDate, months: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let aligned_month = (from.month0() / months) * months + 1;
    let Some(first) = NaiveDate::from_ymd_opt(from.year(), aligned_month, 1) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut start = first;
    while start <= to {
        let Some(last_month) = add_months(start, months - 1) else {
            break;
        };
        let end = last_day_of_month(last_month.year(), last_month.month());
        result.push((start, end));

        match add_months(start, months) {
            Some(next) => start = next,
            None => break,
        }
    }
    result
}

fn computed(
    tax_type: TaxType,
    due_date: NaiveDate,
    amount: Money,
    period_start: NaiveDate,
    period_end: NaiveDate,
    reference: String,
    notes: &str,
) -> TaxObligation {
    TaxObligation {
        tax_type,
        due_date,
        amount,
        period_start: Some(period_start),
        period_end: Some(period_end),
        reference: Some(reference),
        notes: Some(notes.to_string()),
        status: TaxObligationStatus::Pending,
        source: ObligationSource::Computed,
    }
}
