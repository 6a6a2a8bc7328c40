use std::fmt;

/// Money is stored as integer cents; $50.00 = 5000 cents.
/// Ledger debits are negative, credits are positive.
pub type Cents = i64;

/// Format cents as a plain decimal string: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format cents with a dollar sign: 5000 -> "$50.00", -1234 -> "-$12.34"
pub fn format_usd(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount string into cents.
/// Accepts "40", "40.5", "40.00" and an optional leading "$" or "-".
/// More than two decimal digits is rejected rather than silently truncated;
/// a bank must not guess at sub-cent amounts.
pub fn parse_cents(input: &str) -> Result<Cents, ParseAmountError> {
    let input = input.trim();
    let (negative, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    if rest.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let (units_str, frac_str) = match rest.split_once('.') {
        Some((u, f)) => (u, f),
        None => (rest, ""),
    };

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?
    };

    let frac: i64 = match frac_str.len() {
        0 => 0,
        1 => {
            frac_str
                .parse::<i64>()
                .map_err(|_| ParseAmountError::InvalidFormat)?
                * 10
        }
        2 => frac_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?,
        _ => return Err(ParseAmountError::TooPrecise),
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac))
        .ok_or(ParseAmountError::InvalidFormat)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat,
    TooPrecise,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "empty amount"),
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
            ParseAmountError::TooPrecise => write!(f, "amounts support at most two decimal places"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
