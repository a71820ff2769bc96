//! Row predicates used to restrict roll-ups and rankings to a subgroup.
//!
//! Textual form, one condition per `--filter`:
//!
//! - `ACCOUNT_TYPE=Appliance`
//! - `HWB_CODE != Unknown`
//! - `CONTRACTOR_NAME in BOOTS UK LIMITED|LLOYDS PHARMACY LTD`
//!
//! Values may be wrapped in single or double quotes. Comparisons are exact
//! on the trimmed clean-table text.

use anyhow::{Result, anyhow};

use crate::record::{CleanRecord, Column};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Equals(Column, String),
    NotEquals(Column, String),
    OneOf(Column, Vec<String>),
    /// Any of the inner predicates.
    Any(Vec<Predicate>),
    /// Every inner predicate; an empty list matches everything.
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(column: Column, value: impl Into<String>) -> Self {
        Predicate::Equals(column, value.into())
    }

    pub fn one_of<I, S>(column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::OneOf(column, values.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, record: &CleanRecord) -> bool {
        match self {
            Predicate::Equals(column, value) => record.text(*column) == value.as_str(),
            Predicate::NotEquals(column, value) => record.text(*column) != value.as_str(),
            Predicate::OneOf(column, values) => {
                let text = record.text(*column);
                values.iter().any(|v| v.as_str() == text)
            }
            Predicate::Any(inner) => inner.iter().any(|p| p.matches(record)),
            Predicate::All(inner) => inner.iter().all(|p| p.matches(record)),
        }
    }
}

/// Combines parsed `--filter` expressions into a single conjunction.
pub fn parse_filters(filters: &[String]) -> Result<Option<Predicate>> {
    let parsed = filters
        .iter()
        .map(|f| parse_predicate(f))
        .collect::<Result<Vec<_>>>()?;
    Ok(match parsed.len() {
        0 => None,
        1 => parsed.into_iter().next(),
        _ => Some(Predicate::All(parsed)),
    })
}

pub fn parse_predicate(expression: &str) -> Result<Predicate> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let membership = lowered.find(" in ");
    let comparison = trimmed.find('=');
    match (membership, comparison) {
        (Some(idx), eq) if eq.is_none_or(|eq| idx < eq) => {
            let column = trimmed[..idx].trim().parse::<Column>()?;
            let values = trimmed[idx + 4..]
                .split('|')
                .map(|v| unquote(v.trim()).to_string())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>();
            if values.is_empty() {
                return Err(anyhow!("Filter '{trimmed}' lists no values"));
            }
            return Ok(Predicate::OneOf(column, values));
        }
        (_, Some(idx)) => {
            let negated = idx > 0 && trimmed.as_bytes()[idx - 1] == b'!';
            let column_end = if negated { idx - 1 } else { idx };
            let column = trimmed[..column_end].trim().parse::<Column>()?;
            let value = unquote(trimmed[idx + 1..].trim()).to_string();
            return Ok(if negated {
                Predicate::NotEquals(column, value)
            } else {
                Predicate::Equals(column, value)
            });
        }
        _ => {}
    }

    Err(anyhow!("Failed to parse filter expression '{trimmed}'"))
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
