use crate::config::AccountMatcher;
use crate::money::Money;
use crate::schema::{AccountClass, GlAccount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub assets: Vec<GlAccount>,
    pub liabilities: Vec<GlAccount>,
    pub equity: Vec<GlAccount>,
    pub revenue: Vec<GlAccount>,
    pub expenses: Vec<GlAccount>,
}

impl ChartOfAccounts {
    pub fn from_accounts(accounts: &[GlAccount]) -> Self {
        let mut chart = Self::default();

        for account in accounts.iter().filter(|a| a.active) {
            let bucket = match account.class {
                AccountClass::Asset => &mut chart.assets,
                AccountClass::Liability => &mut chart.liabilities,
                AccountClass::Equity => &mut chart.equity,
                AccountClass::Revenue => &mut chart.revenue,
                AccountClass::Expense => &mut chart.expenses,
            };
            bucket.push(account.clone());
        }

        chart.assets.sort_by(|a, b| a.code.cmp(&b.code));
        chart.liabilities.sort_by(|a, b| a.code.cmp(&b.code));
        chart.equity.sort_by(|a, b| a.code.cmp(&b.code));
        chart.revenue.sort_by(|a, b| a.code.cmp(&b.code));
        chart.expenses.sort_by(|a, b| a.code.cmp(&b.code));

        chart
    }

    /// Sum of absolute balances of liability accounts picked out by `matcher`.
    pub fn liability_balance(&self, matcher: &AccountMatcher) -> Money {
        self.liabilities
            .iter()
            .filter(|account| account_matches(account, matcher))
            .map(|account| account.balance.abs())
            .sum()
    }

    pub fn total_revenue(&self) -> Money {
        self.revenue.iter().map(|a| a.balance).sum()
    }

    pub fn total_expenses(&self) -> Money {
        self.expenses.iter().map(|a| a.balance).sum()
    }

    /// Revenue less expenses, floored at zero.
    pub fn annual_profit(&self) -> Money {
        (self.total_revenue() - self.total_expenses()).non_negative()
    }
}

pub fn account_matches(account: &GlAccount, matcher: &AccountMatcher) -> bool {
    if matcher
        .codes
        .iter()
        .any(|code| code.eq_ignore_ascii_case(account.code.trim()))
    {
        return true;
    }

    if let Some(reporting) = &account.reporting_code {
        if matcher
            .reporting_codes
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(reporting.trim()))
        {
            return true;
        }
    }

    let name = normalized_words(&account.name);
    matcher
        .name_terms
        .iter()
        .any(|term| name.contains(&normalized_words(term)))
}

// Lowercase words separated and padded by single spaces, so `contains`
// only matches whole words ("Private" does not match "vat").
fn normalized_words(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    format!(" {} ", words.join(" "))
}
