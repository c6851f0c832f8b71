//! Balance extraction from a rendered account page, and strict parsing into cents.
//!
//! Whatever an extractor returns is untrusted until [`parse_balance_cents`] accepts it.

use crate::error::ClientError;
use regex::Regex;
use reqwest::Url;
use serde_json::Value;
use std::sync::LazyLock;

pub const SUMMARY_HOST: &str = "connect.secure.wellsfargo.com";
pub const SUMMARY_ROUTE: &str = "/accounts/home/accountsummary";
pub const DEFAULT_ACCOUNT_NAME: &str = "EVERYDAY CHECKING";

/// `$1,234.56`, `1234.56`, `$12`. Grouping must be well formed; fractions have two digits.
static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{2}))?$").expect("currency pattern is valid")
});

/// Greedy outermost object in a script body.
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("object pattern is valid"));

/// Source of a display-formatted balance string.
pub trait BalanceExtractor: Send + Sync {
    fn extract(&self) -> Option<String>;
}

/// Fixed answer; useful where the balance comes from somewhere other than a page.
#[derive(Debug, Clone, Default)]
pub struct StaticExtractor(pub Option<String>);

impl BalanceExtractor for StaticExtractor {
    fn extract(&self) -> Option<String> {
        self.0.clone()
    }
}

/// True when `url` is the bank's account summary view over https.
pub fn is_account_summary_page(url: &str) -> bool {
    let Ok(url) = Url::parse(url) else {
        return false;
    };
    url.scheme() == "https"
        && url.host_str() == Some(SUMMARY_HOST)
        && url.fragment().is_some_and(|f| f.contains(SUMMARY_ROUTE))
}

/// Reads the balance out of the `applicationData` blob the summary page embeds in a script.
#[derive(Debug, Clone)]
pub struct ApplicationDataExtractor {
    scripts: Vec<String>,
    account_name: String,
}

impl ApplicationDataExtractor {
    /// Refuses to look at anything but the account summary page.
    pub fn for_page(url: &str, scripts: Vec<String>) -> Result<Self, ClientError> {
        if !is_account_summary_page(url) {
            return Err(ClientError::Validation(
                "navigate to the account summary page first".to_string(),
            ));
        }
        Ok(Self {
            scripts,
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
        })
    }

    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }

    fn amount_in(&self, script: &str) -> Option<String> {
        if !script.contains("\"applicationData\"") {
            return None;
        }
        let blob = JSON_OBJECT.find(script)?;
        let data: Value = match serde_json::from_str(blob.as_str()) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "applicationData script is not JSON");
                return None;
            }
        };

        let account = data
            .pointer("/applicationData/accountSummary/accounts")?
            .as_array()?
            .iter()
            .find(|acc| acc.pointer("/accountProfile/accountName").and_then(Value::as_str) == Some(self.account_name.as_str()))?;

        match account.pointer("/balance/0/amount")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => n.as_f64().map(|f| format!("${f:.2}")),
            _ => None,
        }
    }
}

impl BalanceExtractor for ApplicationDataExtractor {
    fn extract(&self) -> Option<String> {
        self.scripts.iter().find_map(|s| self.amount_in(s))
    }
}

/// Convert a formatted balance to integer cents without going through floating point.
pub fn parse_balance_cents(formatted: &str) -> Result<u64, ClientError> {
    let invalid = || ClientError::Validation(format!("invalid balance format: {formatted:?}"));

    let caps = CURRENCY.captures(formatted.trim()).ok_or_else(invalid)?;
    let whole: u64 = caps[1].replace(',', "").parse().map_err(|_| invalid())?;
    let cents: u64 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };

    whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .ok_or_else(invalid)
}
