//! Expression error types with source positions and name suggestions

use std::fmt;
use thiserror::Error;

/// Position inside an expression source where an error occurred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based character column
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}", self.column)
    }
}

/// Errors raised while parsing or evaluating an expression
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// The expression text is not valid
    #[error("syntax error at {location}: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// A name that is not bound in the scope
    #[error("{name} is not defined{}", .suggestion.as_ref().map(|s| format!(", did you mean '{}'?", s)).unwrap_or_default())]
    UndefinedVariable {
        name: String,
        suggestion: Option<String>,
    },

    /// An operation applied to a value of the wrong shape
    #[error("type error: {message}")]
    Type { message: String },

    /// Nesting deeper than the parser allows
    #[error("expression is nested too deeply (limit {limit})")]
    TooDeep { limit: usize },
}

impl ExprError {
    /// Create a syntax error at a character column (0-based offset in, 1-based out)
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            location: SourceLocation { column: offset + 1 },
        }
    }

    /// Create an undefined variable error, suggesting the closest known name
    pub fn undefined_variable(name: impl Into<String>, known: &[&str]) -> Self {
        let name = name.into();
        let suggestion = suggest_correction(&name, known);
        Self::UndefinedVariable { name, suggestion }
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }
}

/// Pick the known name closest to `typo`, if any is close enough
pub fn suggest_correction(typo: &str, candidates: &[&str]) -> Option<String> {
    let max_distance = (typo.chars().count() / 2).max(2);

    candidates
        .iter()
        .map(|candidate| (levenshtein_distance(typo, candidate), *candidate))
        .filter(|(distance, _)| *distance <= max_distance)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

/// Edit distance between two strings, single-row variant
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = if a_char == *b_char { 0 } else { 1 };
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b_chars.len()]
}
