use crate::error::ConfigError;

/// Parses a multiplier expression.
///
/// Expressions are chained `*` and `/` terms evaluated left to right,
/// a leading term without an operator multiplies. `remove` evaluates to `0`.
///
/// ```
/// use ferry_selection::parse_multiplier;
///
/// assert_eq!(parse_multiplier("10*10/10").unwrap(), 10.0);
/// assert_eq!(parse_multiplier("/0.1").unwrap(), 10.0);
/// assert_eq!(parse_multiplier("remove").unwrap(), 0.0);
/// ```
pub fn parse_multiplier(expr: &str) -> Result<f64, ConfigError> {
    let trimmed = expr.trim();
    if trimmed.eq_ignore_ascii_case("remove") {
        return Ok(0.0);
    }

    let invalid = |reason: &str| ConfigError::InvalidMultiplier {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("expression is empty"));
    }

    let mut value = 1.0;
    let mut op = '*';
    let mut term = String::new();
    let mut is_first = true;

    for c in trimmed.chars().chain(std::iter::once('\0')) {
        match c {
            '*' | '/' | '\0' => {
                if term.is_empty() {
                    // A leading operator applies to the implicit `1`.
                    if is_first && c != '\0' {
                        op = c;
                        is_first = false;
                        continue;
                    }
                    return Err(invalid("missing term around operator"));
                }

                let number = term
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| invalid(&e.to_string()))?;

                value = match op {
                    '*' => value * number,
                    _ if number == 0.0 => return Err(invalid("division by zero")),
                    _ => value / number,
                };

                op = c;
                term.clear();
                is_first = false;
            },
            c => term.push(c),
        }
    }

    if !value.is_finite() {
        return Err(invalid("result is not a finite number"));
    }

    Ok(value)
}
