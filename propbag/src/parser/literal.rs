//! Typed evaluation of property value text.
//!
//! Forms are tried in order: boolean, integer, float, quoted string. Anything
//! else is kept verbatim as a string, so evaluation never fails.

use crate::value::Value;

/// Evaluate the right-hand side of a `key = value` line.
pub fn evaluate(text: &str) -> Value {
    let text = text.trim();

    if let Some(b) = parse_bool(text) {
        return Value::Boolean(b);
    }
    if let Some(n) = parse_integer(text) {
        return Value::Integer(n);
    }
    if let Some(n) = parse_float(text) {
        return Value::Float(n);
    }
    if let Some(s) = parse_quoted(text) {
        return Value::String(s);
    }
    Value::String(text.to_string())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let digits = strip_sign(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // out-of-range values fall through and stay verbatim
    text.parse::<i64>().ok()
}

/// `[+-] digits [. digits] [(e|E) [+-] digits]`, with a decimal point or an
/// exponent present and at least one mantissa digit.
fn parse_float(text: &str) -> Option<f64> {
    let body = strip_sign(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (mantissa, None),
    };
    if frac_part.is_none() && exponent.is_none() {
        return None;
    }

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let frac = frac_part.unwrap_or("");
    if int_part.len() + frac.len() == 0 || !all_digits(int_part) || !all_digits(frac) {
        return None;
    }

    if let Some(exponent) = exponent {
        let exp_digits = strip_sign(exponent);
        if exp_digits.is_empty() || !all_digits(exp_digits) {
            return None;
        }
    }

    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A `"..."` literal where only `\"` and `\\` are escapes.
fn parse_quoted(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                // a trailing lone backslash escapes the closing quote
                None => return None,
            },
            '"' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

fn strip_sign(text: &str) -> &str {
    text.strip_prefix(['+', '-']).unwrap_or(text)
}
