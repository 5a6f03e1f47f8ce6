//! Attribute translation between declared values and the wire model
//!
//! Requests never carry null or unknown values: the field is left out so the
//! API does not read a zero value as "clear". Observed values map optional
//! wire fields to known or null; empty-list normalisation happens in the
//! drift merge, where the reference value is available.

use super::value::Attr;

/// Declared value to an optional wire field
pub fn wire<T: Clone>(attr: &Attr<T>) -> Option<T> {
    attr.value().cloned()
}

/// Optional wire field to an observed value
pub fn observed<T>(value: Option<T>) -> Attr<T> {
    value.into()
}

/// Wire spelling of `value`, matched case-insensitively against the allowed
/// values and then the aliases. Aliases map onto the value at the same
/// position.
pub fn canonical<'a>(value: &str, allowed: &[&'a str], aliases: &[&str]) -> Option<&'a str> {
    allowed
        .iter()
        .position(|a| a.eq_ignore_ascii_case(value))
        .or_else(|| aliases.iter().position(|a| a.eq_ignore_ascii_case(value)))
        .and_then(|i| allowed.get(i).copied())
}

/// Declared enum value to its wire spelling; unrecognised values pass
/// through for the API to reject
pub fn enum_value(attr: &Attr<String>, allowed: &[&str], aliases: &[&str]) -> Option<String> {
    let value = attr.as_deref()?;
    Some(canonical(value, allowed, aliases).unwrap_or(value).to_string())
}

/// Billing periods as the API spells them
pub const BILLING_PERIODS: &[&str] = &["Hour", "Month", "Year"];

/// Declared spellings accepted for [`BILLING_PERIODS`]
pub const BILLING_PERIOD_ALIASES: &[&str] = &["Hourly", "Monthly", "Yearly"];

/// Billing period as the API spells it
pub fn billing_period(attr: &Attr<String>) -> Option<String> {
    enum_value(attr, BILLING_PERIODS, BILLING_PERIOD_ALIASES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_values_are_omitted() {
        assert_eq!(wire::<i64>(&Attr::Null), None);
        assert_eq!(wire::<i64>(&Attr::Unknown), None);
        assert_eq!(wire(&Attr::Known(0)), Some(0));
    }

    #[test]
    fn test_billing_aliases() {
        assert_eq!(billing_period(&"hourly".into()).as_deref(), Some("Hour"));
        assert_eq!(billing_period(&"MONTH".into()).as_deref(), Some("Month"));
        assert_eq!(billing_period(&Attr::Null), None);
    }

    #[test]
    fn test_canonical_resolves_aliases() {
        assert_eq!(canonical("yearly", BILLING_PERIODS, BILLING_PERIOD_ALIASES), Some("Year"));
        assert_eq!(canonical("hour", BILLING_PERIODS, BILLING_PERIOD_ALIASES), Some("Hour"));
        assert_eq!(canonical("weekly", BILLING_PERIODS, BILLING_PERIOD_ALIASES), None);
        let passthrough = enum_value(&"weekly".into(), BILLING_PERIODS, BILLING_PERIOD_ALIASES);
        assert_eq!(passthrough.as_deref(), Some("weekly"));
    }
}
