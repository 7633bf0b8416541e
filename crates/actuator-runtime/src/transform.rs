//! Value transformations applied to resolved attributes before they are
//! placed in a request payload.

use actuator_core::AttrValue;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{RuntimeError, RuntimeResult};

static CURRENCY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("us dollar", "USD"),
        ("us dollars", "USD"),
        ("united states dollar", "USD"),
        ("dollar", "USD"),
        ("euro", "EUR"),
        ("euros", "EUR"),
        ("british pound", "GBP"),
        ("pound sterling", "GBP"),
        ("sterling", "GBP"),
        ("japanese yen", "JPY"),
        ("yen", "JPY"),
        ("swiss franc", "CHF"),
        ("canadian dollar", "CAD"),
        ("australian dollar", "AUD"),
        ("chinese yuan", "CNY"),
        ("renminbi", "CNY"),
        ("hong kong dollar", "HKD"),
        ("singapore dollar", "SGD"),
        ("swedish krona", "SEK"),
        ("norwegian krone", "NOK"),
        ("danish krone", "DKK"),
        ("indian rupee", "INR"),
    ])
});

static COUNTRY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("united states", "US"),
        ("united states of america", "US"),
        ("usa", "US"),
        ("united kingdom", "GB"),
        ("great britain", "GB"),
        ("uk", "GB"),
        ("germany", "DE"),
        ("france", "FR"),
        ("switzerland", "CH"),
        ("luxembourg", "LU"),
        ("ireland", "IE"),
        ("netherlands", "NL"),
        ("japan", "JP"),
        ("singapore", "SG"),
        ("hong kong", "HK"),
        ("canada", "CA"),
        ("australia", "AU"),
        ("cayman islands", "KY"),
        ("jersey", "JE"),
        ("guernsey", "GG"),
    ])
});

/// Tried in order after RFC 3339
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y%m%d",
];

const TRUE_WORDS: &[&str] = &["true", "yes", "y", "1", "on"];
const FALSE_WORDS: &[&str] = &["false", "no", "n", "0", "off"];

/// Apply a named transformation. Unknown kinds are errors.
pub fn transform(value: &AttrValue, kind: &str) -> RuntimeResult<AttrValue> {
    let kind = kind.trim();
    if let Some(expr) = kind.strip_prefix("regex:") {
        return regex_substitute(&value.render(), expr).map(AttrValue::Text);
    }

    let text = value.render();
    match kind {
        "uppercase" => Ok(AttrValue::Text(text.to_uppercase())),
        "lowercase" => Ok(AttrValue::Text(text.to_lowercase())),
        "trim" => Ok(AttrValue::Text(text.trim().to_string())),
        "iso_currency_code" => Ok(AttrValue::Text(code_lookup(&text, &CURRENCY_NAMES, 3))),
        "iso_country_code" => Ok(AttrValue::Text(code_lookup(&text, &COUNTRY_NAMES, 2))),
        "phone_e164" => Ok(AttrValue::Text(phone_e164(&text))),
        "date_iso8601" => Ok(AttrValue::Text(date_iso8601(&text))),
        "boolean" => boolean(value, &text),
        "integer" => match value {
            AttrValue::Int(_) => Ok(value.clone()),
            _ => text
                .trim()
                .parse::<i64>()
                .map(AttrValue::Int)
                .map_err(|e| RuntimeError::transformation(kind, format!("'{}': {}", text, e))),
        },
        "float" => match value {
            AttrValue::Float(_) => Ok(value.clone()),
            _ => text
                .trim()
                .parse::<f64>()
                .map(AttrValue::Float)
                .map_err(|e| RuntimeError::transformation(kind, format!("'{}': {}", text, e))),
        },
        other => Err(RuntimeError::transformation(other, "unknown transformation")),
    }
}

fn code_lookup(text: &str, table: &HashMap<&'static str, &'static str>, code_len: usize) -> String {
    let trimmed = text.trim();
    if let Some(code) = table.get(trimmed.to_lowercase().as_str()) {
        return code.to_string();
    }
    if trimmed.len() == code_len && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return trimmed.to_ascii_uppercase();
    }
    text.to_string()
}

fn phone_e164(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if !cleaned.starts_with('+') && cleaned.len() > 10 {
        format!("+{}", cleaned)
    } else {
        cleaned
    }
}

fn date_iso8601(text: &str) -> String {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| text.to_string())
}

fn boolean(value: &AttrValue, text: &str) -> RuntimeResult<AttrValue> {
    if let AttrValue::Bool(_) = value {
        return Ok(value.clone());
    }
    let word = text.trim().to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Ok(AttrValue::Bool(true))
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Ok(AttrValue::Bool(false))
    } else {
        Err(RuntimeError::transformation("boolean", format!("'{}' is not a recognised boolean", text)))
    }
}

/// `s/search/replace/flags`; `g` replaces all matches, `i` ignores case.
fn regex_substitute(text: &str, expr: &str) -> RuntimeResult<String> {
    let kind = format!("regex:{}", expr);
    let body = expr
        .strip_prefix("s/")
        .ok_or_else(|| RuntimeError::transformation(&kind, "expected s/search/replace/[flags]"))?;
    let parts = split_unescaped(body, '/');
    let (search, replace, flags) = match parts.as_slice() {
        [search, replace, flags] => (search.as_str(), replace.as_str(), flags.as_str()),
        [search, replace] => (search.as_str(), replace.as_str(), ""),
        _ => return Err(RuntimeError::transformation(&kind, "expected s/search/replace/[flags]")),
    };

    let pattern = if flags.contains('i') { format!("(?i){}", search) } else { search.to_string() };
    let re = Regex::new(&pattern).map_err(|e| RuntimeError::transformation(&kind, e.to_string()))?;
    let replacement = sed_backrefs(replace);

    Ok(if flags.contains('g') {
        re.replace_all(text, replacement.as_str()).into_owned()
    } else {
        re.replace(text, replacement.as_str()).into_owned()
    })
}

/// Split on `delim`, treating `\<delim>` as a literal delimiter.
fn split_unescaped(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delim) {
            current.push(delim);
            chars.next();
        } else if c == delim {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// sed `\1` -> regex crate `${1}`
fn sed_backrefs(replace: &str) -> String {
    static BACKREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(\d)").expect("static regex"));
    BACKREF.replace_all(&replace.replace('$', "$$"), "$${${1}}").into_owned()
}
