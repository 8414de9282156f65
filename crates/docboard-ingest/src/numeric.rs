//! Numeric token parsing: currency, percentages, thousands separators and
//! scale suffixes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Non-capturing pattern for a quantity token, for embedding in larger rules.
pub(crate) const QUANTITY_PATTERN: &str = r"(?:[-+]?\s?(?:USD|EUR|GBP|[$€£¥])?\s?[-+]?\d(?:[\d,]*\d)?(?:\.\d+)?(?:\s?(?:%|percent\b|pct\b|[kKMB]\b|bn\b|thousand\b|million\b|billion\b|trillion\b))?(?:\s?(?:USD|EUR|GBP)\b)?)";

static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<sign1>[-+])?\s?(?P<cur1>USD|EUR|GBP|[$€£¥])?\s?(?P<sign2>[-+])?(?P<num>\d(?:[\d,]*\d)?(?:\.\d+)?)\s?(?P<suffix>%|percent|pct|[kKMB]|bn|thousand|million|billion|trillion)?\s?(?P<cur2>USD|EUR|GBP)?$",
    )
    .expect("static quantity pattern")
});

/// A parsed number with an optional unit (`%`, `USD`, `EUR`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Option<String>,
}

/// Parse a single quantity token such as `$5M`, `91.5%` or `1,200`.
///
/// Returns `None` for anything that is not exactly one finite quantity.
pub fn parse_quantity(token: &str) -> Option<Quantity> {
    let token = token
        .trim()
        .trim_end_matches(['.', ',', ';', ')'])
        .trim_start_matches('(');
    let caps = QUANTITY.captures(token)?;

    let digits = caps.name("num")?.as_str();
    if !valid_grouping(digits) {
        return None;
    }
    let mut value: f64 = digits.replace(',', "").parse().ok()?;

    let negative = caps.name("sign1").map(|m| m.as_str()) == Some("-")
        || caps.name("sign2").map(|m| m.as_str()) == Some("-");
    if negative {
        value = -value;
    }

    let mut unit = caps
        .name("cur1")
        .or_else(|| caps.name("cur2"))
        .map(|m| currency_code(m.as_str()).to_string());

    if let Some(suffix) = caps.name("suffix") {
        match suffix.as_str() {
            "%" | "percent" | "pct" => {
                if unit.is_some() {
                    return None;
                }
                unit = Some("%".to_string());
            }
            other => value *= scale(other),
        }
    }

    value.is_finite().then_some(Quantity { value, unit })
}

/// Year-like integers (1900-2100) without units.
pub fn is_year(token: &str) -> bool {
    let token = token.trim();
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && token
            .parse::<u32>()
            .map(|y| (1900..=2100).contains(&y))
            .unwrap_or(false)
}

fn currency_code(symbol: &str) -> &str {
    match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        "¥" => "JPY",
        other => other,
    }
}

fn scale(suffix: &str) -> f64 {
    match suffix {
        "k" | "K" | "thousand" => 1e3,
        "M" | "million" => 1e6,
        "B" | "bn" | "billion" => 1e9,
        "trillion" => 1e12,
        _ => 1.0,
    }
}

/// `1,200,000` is grouped correctly; `1,2` is not.
fn valid_grouping(digits: &str) -> bool {
    let integer = digits.split('.').next().unwrap_or_default();
    let mut groups = integer.split(',');
    let Some(first) = groups.next() else {
        return false;
    };
    if !integer.contains(',') {
        return true;
    }
    !first.is_empty() && first.len() <= 3 && groups.all(|g| g.len() == 3)
}
