//! Parameter placeholder conventions.

use serde::{Deserialize, Serialize};

/// How a backend expects bound parameters to be written in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// Anonymous `?` markers (SQLite, MySQL).
    #[default]
    Qmark,
    /// Numbered `$1`, `$2`, ... markers (PostgreSQL).
    Dollar,
}

impl ParamStyle {
    /// Starts a fresh placeholder sequence for one statement.
    pub fn placeholders(self) -> Placeholders {
        Placeholders {
            style: self,
            issued: 0,
        }
    }
}

/// Placeholder generator for a single statement.
///
/// Numbered styles count from 1 in the order placeholders are requested,
/// so callers must request them in the order parameters will be bound.
#[derive(Debug)]
pub struct Placeholders {
    style: ParamStyle,
    issued: usize,
}

impl Placeholders {
    /// Returns the next placeholder.
    pub fn bind(&mut self) -> String {
        self.issued += 1;
        match self.style {
            ParamStyle::Qmark => "?".to_string(),
            ParamStyle::Dollar => format!("${}", self.issued),
        }
    }

    /// Returns `count` comma-separated placeholders.
    pub fn list(&mut self, count: usize) -> String {
        (0..count).map(|_| self.bind()).collect::<Vec<_>>().join(",")
    }

    /// Returns how many placeholders were issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qmark_repeats() {
        let mut p = ParamStyle::Qmark.placeholders();
        assert_eq!(p.bind(), "?");
        assert_eq!(p.list(3), "?,?,?");
        assert_eq!(p.issued(), 4);
    }

    #[test]
    fn dollar_counts_from_one() {
        let mut p = ParamStyle::Dollar.placeholders();
        assert_eq!(p.bind(), "$1");
        assert_eq!(p.list(2), "$2,$3");
        assert_eq!(p.bind(), "$4");
    }

    #[test]
    fn default_is_qmark() {
        assert_eq!(ParamStyle::default(), ParamStyle::Qmark);
    }
}
