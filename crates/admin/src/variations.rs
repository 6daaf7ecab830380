//! Plain-text editor format for product variations.
//!
//! One variation per line, options separated by commas, each option with an
//! optional price adjustment:
//!
//! ```text
//! Band: VHF, UHF=15.50
//! Case: Soft=-5, Hard=20
//! ```

use alpine_guardian_core::Price;
use alpine_guardian_core::models::{Variation, VariationOption};
use thiserror::Error;

/// A line the editor could not understand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariationsError {
    #[error("Line {line}: expected `Name: option, option=adjustment`")]
    MissingColon { line: usize },
    #[error("Line {line}: variation name is empty")]
    EmptyName { line: usize },
    #[error("Line {line}: variation `{name}` has no options")]
    NoOptions { line: usize, name: String },
    #[error("Line {line}: `{adjustment}` is not a valid price adjustment")]
    BadAdjustment { line: usize, adjustment: String },
}

/// Parse the editor text. Blank lines are skipped.
///
/// # Errors
///
/// Returns the first malformed line.
pub fn parse(text: &str) -> Result<Vec<Variation>, VariationsError> {
    let mut variations = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (name, options) = raw
            .split_once(':')
            .ok_or(VariationsError::MissingColon { line })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(VariationsError::EmptyName { line });
        }

        let options = options
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| parse_option(o, line))
            .collect::<Result<Vec<_>, _>>()?;
        if options.is_empty() {
            return Err(VariationsError::NoOptions {
                line,
                name: name.to_string(),
            });
        }

        variations.push(Variation {
            name: name.to_string(),
            options,
        });
    }

    Ok(variations)
}

fn parse_option(raw: &str, line: usize) -> Result<VariationOption, VariationsError> {
    let Some((value, adjustment)) = raw.split_once('=') else {
        return Ok(VariationOption {
            value: raw.to_string(),
            price_adjustment: Price::ZERO,
        });
    };

    let adjustment = adjustment.trim();
    let price_adjustment = adjustment
        .trim_start_matches('+')
        .parse::<Price>()
        .map_err(|_| VariationsError::BadAdjustment {
            line,
            adjustment: adjustment.to_string(),
        })?;

    Ok(VariationOption {
        value: value.trim().to_string(),
        price_adjustment,
    })
}

/// Render variations back into editor text.
#[must_use]
pub fn format(variations: &[Variation]) -> String {
    variations
        .iter()
        .map(|v| {
            let options = v
                .options
                .iter()
                .map(|o| {
                    if o.price_adjustment.is_zero() {
                        o.value.clone()
                    } else {
                        format!("{}={}", o.value, o.price_adjustment.amount().normalize())
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {options}", v.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_and_adjustments() {
        let parsed = parse("Band: VHF, UHF=+15.50\n\n  Case: Soft=-5, Hard=20  \n").unwrap();
        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0].name, "Band");
        assert_eq!(parsed[0].options[0].value, "VHF");
        assert!(parsed[0].options[0].price_adjustment.is_zero());
        assert_eq!(parsed[0].options[1].price_adjustment, Price::from_cents(1550));

        assert_eq!(parsed[1].options[0].price_adjustment, Price::from_cents(-500));
        assert_eq!(parsed[1].options[1].value, "Hard");
    }

    #[test]
    fn test_parse_reports_line_numbers() {
        assert_eq!(
            parse("Band: VHF\nCase Hard").unwrap_err(),
            VariationsError::MissingColon { line: 2 }
        );
        assert_eq!(
            parse(": VHF").unwrap_err(),
            VariationsError::EmptyName { line: 1 }
        );
        assert!(matches!(
            parse("Band: , ").unwrap_err(),
            VariationsError::NoOptions { line: 1, .. }
        ));
        assert!(matches!(
            parse("Band: UHF=lots").unwrap_err(),
            VariationsError::BadAdjustment { line: 1, .. }
        ));
    }

    #[test]
    fn test_format_is_readable_by_parse() {
        let text = "Band: VHF, UHF=15.5\nCase: Hard=20";
        let parsed = parse(text).unwrap();
        assert_eq!(format(&parsed), text);
        assert!(parse("").unwrap().is_empty());
    }
}
