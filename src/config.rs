use crate::error::{ForecastError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ForecastConfig {
    pub confidence: ConfidenceWeights,
    pub scenario: ScenarioMultipliers,
    pub alerts: AlertThresholds,
    pub tax: TaxPolicy,
    pub persistence: PersistencePolicy,

    #[schemars(description = "Seconds a cached forecast stays fresh")]
    pub cache_ttl_secs: u64,

    pub default_horizon_days: u32,
    pub max_horizon_days: u32,

    #[schemars(description = "Optional upper bound on fetch plus projection time, in milliseconds")]
    pub deadline_ms: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence: ConfidenceWeights::default(),
            scenario: ScenarioMultipliers::default(),
            alerts: AlertThresholds::default(),
            tax: TaxPolicy::default(),
            persistence: PersistencePolicy::default(),
            cache_ttl_secs: 300,
            default_horizon_days: 90,
            max_horizon_days: 730,
            deadline_ms: None,
        }
    }
}

/// Provenance-to-confidence table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidenceWeights {
    pub bank_balance: f64,
    pub repeating_invoice: f64,
    pub confirmed_invoice: f64,
    pub inferred_pattern: f64,
    pub budgeted: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            bank_balance: 1.00,
            repeating_invoice: 0.98,
            confirmed_invoice: 0.95,
            inferred_pattern: 0.75,
            budgeted: 0.60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScenarioMultipliers {
    pub best_inflow: f64,
    pub best_outflow: f64,
    pub worst_inflow: f64,
    pub worst_outflow: f64,
}

impl Default for ScenarioMultipliers {
    fn default() -> Self {
        Self {
            best_inflow: 1.20,
            best_outflow: 0.90,
            worst_inflow: 0.80,
            worst_outflow: 1.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AlertThresholds {
    pub low_balance: f64,
    pub critical_balance: f64,
    pub large_payment: f64,
    pub overdue_days: i64,
    #[schemars(description = "Symbol prefixed to amounts in alert messages")]
    pub currency_symbol: String,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_balance: 5000.0,
            critical_balance: 1000.0,
            large_payment: 10000.0,
            overdue_days: 30,
            currency_symbol: "£".to_string(),
        }
    }
}

/// UK filing calendar, tax rates and the GL account matchers used to find
/// liability balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TaxPolicy {
    #[schemars(description = "Days after a VAT period end by which the return and payment are due")]
    pub vat_filing_offset_days: u64,
    #[schemars(description = "Day of the month following accrual on which PAYE/NI is due")]
    pub paye_due_day: u32,
    pub corporation_tax_offset_months: u32,
    pub corporation_tax_offset_days: u64,
    pub corporation_tax_small_rate: f64,
    pub corporation_tax_main_rate: f64,
    pub corporation_tax_main_rate_threshold: f64,
    pub vat_accounts: AccountMatcher,
    pub paye_accounts: AccountMatcher,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            vat_filing_offset_days: 37,
            paye_due_day: 22,
            corporation_tax_offset_months: 9,
            corporation_tax_offset_days: 1,
            corporation_tax_small_rate: 0.19,
            corporation_tax_main_rate: 0.25,
            corporation_tax_main_rate_threshold: 250_000.0,
            vat_accounts: AccountMatcher {
                codes: strings(&["820", "821", "2200", "2201", "2202"]),
                name_terms: strings(&["vat", "gst"]),
                reporting_codes: strings(&["LIA.CUR.TAX.VAT", "LIA.CUR.TAX.GST"]),
            },
            paye_accounts: AccountMatcher {
                codes: strings(&["825", "826", "2210", "2211"]),
                name_terms: strings(&["paye", "national insurance"]),
                reporting_codes: strings(&["LIA.CUR.PAY.PAYE", "LIA.CUR.PAY.NIC"]),
            },
        }
    }
}

/// Identifies GL accounts by code, by whole-word name terms, or by reporting code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AccountMatcher {
    pub codes: Vec<String>,
    pub name_terms: Vec<String>,
    pub reporting_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PersistencePolicy {
    pub batch_size: usize,
    pub max_concurrent_writes: usize,
    #[schemars(description = "Pause between batches, in milliseconds")]
    pub inter_batch_delay_ms: u64,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_concurrent_writes: 5,
            inter_batch_delay_ms: 100,
        }
    }
}

impl PersistencePolicy {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

impl ForecastConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ForecastConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForecastConfig)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("bankBalance", self.confidence.bank_balance),
            ("repeatingInvoice", self.confidence.repeating_invoice),
            ("confirmedInvoice", self.confidence.confirmed_invoice),
            ("inferredPattern", self.confidence.inferred_pattern),
            ("budgeted", self.confidence.budgeted),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ForecastError::InvalidSettings(format!(
                    "confidence weight {} must be between 0.0 and 1.0, got {}",
                    name, weight
                )));
            }
        }

        let multipliers = [
            self.scenario.best_inflow,
            self.scenario.best_outflow,
            self.scenario.worst_inflow,
            self.scenario.worst_outflow,
        ];
        if multipliers.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(ForecastError::InvalidSettings(
                "scenario multipliers must be positive".to_string(),
            ));
        }

        if self.persistence.batch_size == 0 || self.persistence.max_concurrent_writes == 0 {
            return Err(ForecastError::InvalidSettings(
                "persistence batch size and concurrency must be at least 1".to_string(),
            ));
        }

        if !(1..=28).contains(&self.tax.paye_due_day) {
            return Err(ForecastError::InvalidSettings(format!(
                "PAYE due day {} must be between 1 and 28",
                self.tax.paye_due_day
            )));
        }

        if self.default_horizon_days == 0 || self.default_horizon_days > self.max_horizon_days {
            return Err(ForecastError::InvalidSettings(format!(
                "default horizon {} must be between 1 and {}",
                self.default_horizon_days, self.max_horizon_days
            )));
        }

        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
