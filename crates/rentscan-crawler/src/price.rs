//! Conversion of free-text rent prices to a weekly rate.
//!
//! Frequency markers are matched as substrings of the lower-cased price, in
//! this order: weekly, monthly, yearly, then a bare currency amount. Monthly
//! and yearly come before the currency check because a price such as
//! `$2,000 pm` carries both.
//!
//! Results are rounded half-to-even, so `$500.5` gives 500 and `$501.5`
//! gives 502.

use lazy_static::lazy_static;
use regex::Regex;

/// Average number of weeks in a month.
pub const WEEKS_PER_MONTH: f64 = 4.345;
pub const WEEKS_PER_YEAR: f64 = 52.0;

const WEEKLY: &[&str] = &["pw", "p/w", "per week", "/week"];
const MONTHLY: &[&str] = &["pm", "p/m", "per month"];
const YEARLY: &[&str] = &["py", "p/y", "per year", "per annum"];

lazy_static! {
    static ref AMOUNT: Regex = Regex::new(r"\d+(\.\d+)?").unwrap();
}

/// Returns the weekly rent of `raw`, or `None` if the price has no amount or
/// its frequency cannot be determined.
pub fn normalize(raw: &str) -> Option<u32> {
    let price = raw.to_lowercase().replace(',', "");
    let price = price.trim();

    let Some(amount) = AMOUNT.find(price) else {
        log::debug!("No amount in price {raw:?}");
        return None;
    };
    let amount: f64 = amount.as_str().parse().ok()?;

    let has = |markers: &[&str]| markers.iter().any(|m| price.contains(m));

    let weekly = if has(WEEKLY) {
        amount
    } else if has(MONTHLY) {
        amount / WEEKS_PER_MONTH
    } else if has(YEARLY) {
        amount / WEEKS_PER_YEAR
    } else if price.contains('$') || price.bytes().all(|b| b.is_ascii_digit()) {
        amount
    } else {
        log::debug!("Unknown price frequency in {raw:?}");
        return None;
    };

    // Saturates on absurdly large amounts
    Some(weekly.round_ties_even() as u32)
}
