use cash_flow_forecaster::*;
use chrono::NaiveDate;
use serde_json::{json, Value};

const EPSILON: f64 = 1e-6;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn fast_config() -> ForecastConfig {
    let mut config = ForecastConfig::default();
    config.persistence.inter_batch_delay_ms = 0;
    config
}

fn ledger(data: Value) -> InMemoryLedger {
    InMemoryLedger::new(serde_json::from_value(data).unwrap())
}

fn forecaster(
    store: InMemoryLedger,
) -> CashFlowForecaster<InMemoryLedger, InMemoryCache, FixedClock> {
    CashFlowForecaster::builder(store)
        .cache(InMemoryCache::new())
        .clock(FixedClock::on(d(2024, 1, 1)))
        .config(fast_config())
        .build()
        .unwrap()
}

fn day(forecast: &[DailyForecast], date: NaiveDate) -> &DailyForecast {
    forecast
        .iter()
        .find(|f| f.date == date)
        .unwrap_or_else(|| panic!("no forecast for {}", date))
}

fn single_receivable() -> Value {
    json!({
        "invoices": [
            { "contactId": "cust-1", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "2024-01-10", "amountDue": 1000 }
        ]
    })
}

fn retail_ledger() -> Value {
    json!({
        "bankAccounts": [
            { "name": "Current Account", "balance": "25000.00", "status": "ACTIVE" },
            { "name": "Closed Account", "balance": 9999, "status": "ARCHIVED" }
        ],
        "invoices": [
            { "contactId": "cust-1", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "2024-01-10", "amountDue": 1000 },
            { "contactId": "cust-2", "type": "ACCREC", "status": "OPEN",
              "dueDate": "2024-02-05", "amountDue": "4500.50" },
            { "contactId": "cust-3", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "2023-11-01", "amountDue": 700 },
            { "contactId": "supp-1", "type": "ACCPAY", "status": "AUTHORISED",
              "dueDate": "2024-01-12", "amountDue": 12500 },
            { "contactId": "supp-2", "type": "ACCPAY", "status": "DRAFT",
              "dueDate": "2024-01-12", "amountDue": 99999 }
        ],
        "repeatingTransactions": [
            { "type": "ACCREC", "status": "AUTHORISED", "amount": 2000,
              "nextScheduledDate": "2024-01-15" },
            { "type": "ACCPAY", "status": "AUTHORISED", "amount": 800,
              "nextScheduledDate": "2024-01-20", "endDate": "2024-12-31" }
        ],
        "paymentPatterns": [
            { "contactId": "cust-2", "contactType": "CUSTOMER", "averageDaysToPay": 7 }
        ],
        "budgets": [
            { "monthYear": "2024-01", "category": "EXPENSE", "budgetedAmount": 3100 },
            { "monthYear": "2024-02", "category": "EXPENSE", "budgetedAmount": 2900 },
            { "monthYear": "2024-01", "category": "INCOME", "budgetedAmount": 50000 }
        ],
        "glAccounts": [
            { "code": "820", "name": "VAT", "class": "LIABILITY", "status": "ACTIVE",
              "balance": "-12000.00" },
            { "code": "825", "name": "PAYE Payable", "class": "LIABILITY", "status": "ACTIVE",
              "balance": -4200 },
            { "code": "200", "name": "Sales", "class": "REVENUE", "status": "ACTIVE",
              "balance": 90000 }
        ],
        "organisationSettings": {
            "financialYearEnd": { "month": 3, "day": 31 },
            "vatReturns": "QUARTERLY"
        }
    })
}

#[tokio::test]
async fn test_receivable_lands_on_its_due_date() -> anyhow::Result<()> {
    let engine = forecaster(ledger(single_receivable()));
    let forecast = engine.generate_forecast(90, None).await?;

    assert_eq!(forecast.len(), 90);
    assert_eq!(forecast[0].date, d(2024, 1, 1));
    for f in &forecast {
        let expected = if f.date == d(2024, 1, 10) { 1000.0 } else { 0.0 };
        assert_eq!(f.inflows.from_invoices.value(), expected, "on {}", f.date);
    }
    Ok(())
}

#[tokio::test]
async fn test_payment_pattern_shifts_expected_date() -> anyhow::Result<()> {
    let mut data = single_receivable();
    data["paymentPatterns"] = json!([
        { "contactId": "cust-1", "contactType": "CUSTOMER", "averageDaysToPay": 15 }
    ]);
    let engine = forecaster(ledger(data));
    let forecast = engine.generate_forecast(90, None).await?;

    assert_eq!(day(&forecast, d(2024, 1, 10)).inflows.from_invoices.value(), 0.0);
    assert_eq!(day(&forecast, d(2024, 1, 25)).inflows.from_invoices.value(), 1000.0);
    Ok(())
}

#[tokio::test]
async fn test_daily_identities_hold() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(90, None).await?;

    assert_eq!(forecast[0].opening_balance.value(), 25000.0);
    for (i, f) in forecast.iter().enumerate() {
        let opening = f.opening_balance.value();
        let inflow = f.inflows.total.value();
        let outflow = f.outflows.total.value();

        assert!(
            (f.inflows.from_invoices + f.inflows.from_repeating + f.inflows.from_other
                - f.inflows.total)
                .value()
                .abs()
                < EPSILON
        );
        let components = f.outflows.to_bills
            + f.outflows.to_repeating
            + f.outflows.to_taxes
            + f.outflows.to_patterns
            + f.outflows.to_budgets;
        assert!((components - f.outflows.total).value().abs() < EPSILON);
        assert!((f.closing_balance.value() - (opening + inflow - outflow)).abs() < EPSILON);

        let best = opening + inflow * 1.2 - outflow * 0.9;
        let worst = opening + inflow * 0.8 - outflow * 1.1;
        assert!((f.scenarios.best_case.value() - best).abs() < EPSILON);
        assert!((f.scenarios.worst_case.value() - worst).abs() < EPSILON);

        assert!((0.0..=1.0).contains(&f.confidence_level));
        if inflow == 0.0 && outflow == 0.0 {
            assert_eq!(f.confidence_level, 1.0);
        }

        if i > 0 {
            assert_eq!(f.opening_balance, forecast[i - 1].closing_balance);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_flows_from_every_source() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(90, None).await?;

    // 7 days late on a 5 Feb due date
    assert_eq!(day(&forecast, d(2024, 2, 12)).inflows.from_invoices.value(), 4500.5);
    assert_eq!(day(&forecast, d(2024, 1, 15)).inflows.from_repeating.value(), 2000.0);

    let bill_day = day(&forecast, d(2024, 1, 12));
    assert_eq!(bill_day.outflows.to_bills.value(), 12500.0);
    assert_eq!(bill_day.outflows.to_budgets.value(), 0.0);
    assert!(bill_day
        .alerts
        .iter()
        .any(|a| a.alert_type == AlertType::LargePayment && a.severity == AlertSeverity::Info));

    assert_eq!(day(&forecast, d(2024, 1, 20)).outflows.to_repeating.value(), 800.0);

    // 3100 over 31 days, at the budgeted weight
    let quiet_day = day(&forecast, d(2024, 1, 3));
    assert!((quiet_day.outflows.to_budgets.value() - 60.0).abs() < EPSILON);
    assert_eq!(quiet_day.confidence_level, 0.6);
    Ok(())
}

#[tokio::test]
async fn test_statutory_taxes_scheduled_from_gl_balances() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(150, None).await?;

    // Q1 2024 return, 37 days after 31 March
    let vat_day = day(&forecast, d(2024, 5, 7));
    assert_eq!(vat_day.outflows.to_taxes.value(), 3000.0);
    assert!(vat_day
        .alerts
        .iter()
        .any(|a| a.alert_type == AlertType::TaxDue && a.amount == Some(Money::new(3000.0))));

    for paye_date in [d(2024, 2, 22), d(2024, 3, 22), d(2024, 4, 22), d(2024, 5, 22)] {
        assert_eq!(day(&forecast, paye_date).outflows.to_taxes.value(), 4200.0);
    }

    // December's PAYE, Q4 2023 VAT and the year to March 2023 all predate the run
    assert!(day(&forecast, d(2024, 1, 1)).outflows.to_taxes.is_zero());
    assert!(day(&forecast, d(2024, 1, 22)).outflows.to_taxes.is_zero());
    assert!(day(&forecast, d(2024, 2, 6)).outflows.to_taxes.is_zero());

    let taxed_days = forecast
        .iter()
        .filter(|f| f.outflows.to_taxes.is_positive())
        .count();
    assert_eq!(taxed_days, 5);
    Ok(())
}

#[tokio::test]
async fn test_corporation_tax_for_current_year_falls_due_next_january() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(400, None).await?;

    // year to 31 March 2024, due 9 months and a day later at 19% of 90,000
    let ct_day = day(&forecast, d(2025, 1, 1));
    assert!((ct_day.outflows.to_taxes.value() - 17100.0).abs() < EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_persisted_tax_obligation_replaces_computed_duplicate() -> anyhow::Result<()> {
    let mut data = retail_ledger();
    data["taxObligations"] = json!([
        { "type": "PAYE_NI", "dueDate": "2024-02-22", "amount": 5000, "status": "PENDING",
          "reference": "PAYE-2024-01" },
        { "type": "PAYE_NI", "dueDate": "2024-03-22", "amount": 100, "status": "PAID" }
    ]);
    let engine = forecaster(ledger(data));
    let forecast = engine.generate_forecast(90, None).await?;

    assert_eq!(day(&forecast, d(2024, 2, 22)).outflows.to_taxes.value(), 5000.0);
    assert_eq!(day(&forecast, d(2024, 3, 22)).outflows.to_taxes.value(), 4200.0);
    Ok(())
}

#[tokio::test]
async fn test_overdue_alert_only_on_first_day() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(30, None).await?;

    let overdue: Vec<&DailyForecast> = forecast
        .iter()
        .filter(|f| {
            f.alerts
                .iter()
                .any(|a| a.alert_type == AlertType::OverdueInvoice)
        })
        .collect();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].date, d(2024, 1, 1));

    let alert = overdue[0]
        .alerts
        .iter()
        .find(|a| a.alert_type == AlertType::OverdueInvoice)
        .unwrap();
    assert_eq!(alert.amount, Some(Money::new(700.0)));
    assert!(alert.message.starts_with("1 invoice(s)"));
    Ok(())
}

#[tokio::test]
async fn test_runs_are_deterministic() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let first = engine.generate_forecast_from(d(2024, 1, 1), 120, None).await?;
    let second = engine.generate_forecast_from(d(2024, 1, 1), 120, None).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_cache_hit_skips_store() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));

    let first = engine.generate_forecast(60, Some("acme")).await?;
    let reads_after_first = engine.store().read_count();
    assert!(reads_after_first > 0);
    assert_eq!(engine.cache().len(), 1);

    let second = engine.generate_forecast(60, Some("acme")).await?;
    assert_eq!(engine.store().read_count(), reads_after_first);
    assert_eq!(first, second);

    // different horizon, different key
    engine.generate_forecast(30, Some("acme")).await?;
    assert!(engine.store().read_count() > reads_after_first);
    assert_eq!(engine.cache().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unreadable_cache_entry_is_a_miss() -> anyhow::Result<()> {
    let cache = InMemoryCache::new();
    cache
        .set(
            &cache_key(None, 10),
            "{not json".to_string(),
            std::time::Duration::from_secs(60),
        )
        .await?;
    let engine = CashFlowForecaster::builder(ledger(single_receivable()))
        .cache(cache)
        .clock(FixedClock::on(d(2024, 1, 1)))
        .config(fast_config())
        .build()?;

    let forecast = engine.generate_forecast(10, None).await?;
    assert_eq!(forecast.len(), 10);
    assert!(engine.store().read_count() > 0);
    Ok(())
}

async fn engine_with_cached_entry(
    age_secs: i64,
) -> anyhow::Result<CashFlowForecaster<InMemoryLedger, InMemoryCache, FixedClock>> {
    let clock = FixedClock::on(d(2024, 1, 1));
    let entry = CachedForecast {
        generated_at: clock.now() - chrono::Duration::seconds(age_secs),
        forecasts: Vec::new(),
    };
    let cache = InMemoryCache::new();
    cache
        .set(
            &cache_key(None, 10),
            serde_json::to_string(&entry)?,
            std::time::Duration::from_secs(60),
        )
        .await?;

    Ok(CashFlowForecaster::builder(ledger(single_receivable()))
        .cache(cache)
        .clock(clock)
        .config(fast_config())
        .build()?)
}

#[tokio::test]
async fn test_cache_entry_older_than_ttl_is_regenerated() -> anyhow::Result<()> {
    let engine = engine_with_cached_entry(301).await?;

    let forecast = engine.generate_forecast(10, None).await?;
    assert_eq!(forecast.len(), 10);
    assert!(engine.store().read_count() > 0);
    Ok(())
}

#[tokio::test]
async fn test_cache_entry_within_ttl_is_served() -> anyhow::Result<()> {
    let engine = engine_with_cached_entry(299).await?;

    let forecast = engine.generate_forecast(10, None).await?;
    assert!(forecast.is_empty());
    assert_eq!(engine.store().read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_default_forecast_uses_configured_horizon() -> anyhow::Result<()> {
    let engine = forecaster(ledger(single_receivable()));

    let forecast = engine.generate_default_forecast(None).await?;
    assert_eq!(forecast.len(), 90);
    assert_eq!(forecast[89].date, d(2024, 3, 30));

    // shares the cache entry of an explicit 90-day request
    let reads = engine.store().read_count();
    let explicit = engine.generate_forecast(90, None).await?;
    assert_eq!(engine.store().read_count(), reads);
    assert_eq!(explicit, forecast);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_row_dates_drop_only_those_rows() -> anyhow::Result<()> {
    let engine = forecaster(ledger(json!({
        "invoices": [
            { "contactId": "cust-1", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "2024-01-10", "amountDue": 1000 },
            { "contactId": "cust-2", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "2024-01-11T00:00:00Z", "amountDue": 250 },
            { "contactId": "cust-3", "type": "ACCREC", "status": "AUTHORISED",
              "dueDate": "31/01/2024", "amountDue": 9999 }
        ],
        "repeatingTransactions": [
            { "type": "ACCREC", "status": "AUTHORISED", "amount": 300,
              "nextScheduledDate": "2024-01-15" },
            { "type": "ACCREC", "status": "AUTHORISED", "amount": 400,
              "nextScheduledDate": "whenever" }
        ]
    })));
    let forecast = engine.generate_forecast(30, None).await?;

    assert_eq!(day(&forecast, d(2024, 1, 10)).inflows.from_invoices.value(), 1000.0);
    assert_eq!(day(&forecast, d(2024, 1, 11)).inflows.from_invoices.value(), 250.0);
    assert_eq!(day(&forecast, d(2024, 1, 15)).inflows.from_repeating.value(), 300.0);

    let received: f64 = forecast.iter().map(|f| f.inflows.total.value()).sum();
    assert!((received - 1550.0).abs() < EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_failed_dataset_degrades_to_empty() -> anyhow::Result<()> {
    let store = ledger(retail_ledger())
        .with_failing(Dataset::Receivables)
        .with_failing(Dataset::GlAccounts)
        .with_failing(Dataset::OrganisationSettings);
    let engine = forecaster(store);
    let forecast = engine.generate_forecast(90, None).await?;

    assert_eq!(forecast.len(), 90);
    assert_eq!(forecast[0].opening_balance.value(), 25000.0);
    assert!(forecast.iter().all(|f| f.inflows.from_invoices.is_zero()));
    assert!(forecast.iter().all(|f| f.outflows.to_taxes.is_zero()));
    assert_eq!(day(&forecast, d(2024, 1, 12)).outflows.to_bills.value(), 12500.0);
    Ok(())
}

#[tokio::test]
async fn test_failed_bank_read_starts_from_zero() -> anyhow::Result<()> {
    let store = ledger(retail_ledger()).with_failing(Dataset::BankAccounts);
    let engine = forecaster(store);
    let forecast = engine.generate_forecast(5, None).await?;

    assert!(forecast[0].opening_balance.is_zero());
    assert!(forecast[0]
        .alerts
        .iter()
        .any(|a| a.alert_type == AlertType::LowBalance && a.severity == AlertSeverity::Critical));
    Ok(())
}

#[tokio::test]
async fn test_persistence_failures_do_not_fail_the_run() -> anyhow::Result<()> {
    let store = ledger(retail_ledger())
        .with_failing_upsert(d(2024, 1, 4))
        .with_failing_upsert(d(2024, 1, 17));
    let engine = forecaster(store);
    let forecast = engine.generate_forecast(20, Some("acme")).await?;

    assert_eq!(forecast.len(), 20);
    let stored = engine.store().stored_forecasts(Some("acme"));
    assert_eq!(stored.len(), 18);
    assert!(stored.iter().all(|row| row.date != d(2024, 1, 4)));
    assert!(engine.store().stored_forecasts(None).is_empty());

    let row = stored.iter().find(|row| row.date == d(2024, 1, 12)).unwrap();
    let alerts: Vec<Alert> = serde_json::from_str(&row.alerts)?;
    assert!(alerts.iter().any(|a| a.alert_type == AlertType::LargePayment));
    Ok(())
}

#[tokio::test]
async fn test_invalid_horizons_rejected() {
    let engine = forecaster(InMemoryLedger::default());
    assert!(matches!(
        engine.generate_forecast(0, None).await,
        Err(ForecastError::InvalidHorizon(0))
    ));
    assert!(matches!(
        engine.generate_forecast(731, None).await,
        Err(ForecastError::InvalidHorizon(731))
    ));
    assert!(engine.generate_forecast(730, None).await.is_ok());
    assert_eq!(engine.store().read_count(), 9);
}

#[tokio::test]
async fn test_invalid_config_rejected_by_builder() {
    let mut config = ForecastConfig::default();
    config.persistence.batch_size = 0;
    let result = CashFlowForecaster::builder(InMemoryLedger::default())
        .config(config)
        .build();
    assert!(matches!(result, Err(ForecastError::InvalidSettings(_))));
}

#[tokio::test]
async fn test_summary_over_generated_forecast() -> anyhow::Result<()> {
    let engine = forecaster(ledger(retail_ledger()));
    let forecast = engine.generate_forecast(90, None).await?;
    let summary = ForecastSummary::from_forecasts(&forecast, &engine.config().alerts);

    assert_eq!(summary.days, 90);
    assert_eq!(summary.ending_balance, forecast[89].closing_balance);
    let (lowest_date, lowest) = summary.lowest_closing_balance.unwrap();
    assert!(forecast.iter().all(|f| f.closing_balance >= lowest));
    // March PAYE is the last outflow; no March budget follows it
    assert_eq!(lowest_date, d(2024, 3, 22));
    assert!((lowest.value() - 7380.5).abs() < EPSILON);
    assert_eq!(summary.first_low_balance_date, None);

    // two PAYE payments plus the overdue receivable on day 0
    assert_eq!(summary.warning_alerts, 3);
    // the 12,500 supplier bill
    assert_eq!(summary.info_alerts, 1);
    assert_eq!(summary.critical_alerts, 0);
    Ok(())
}
