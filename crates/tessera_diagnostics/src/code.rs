//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
///
/// Each category maps to a single-character prefix used in diagnostic code
/// display (e.g., `P101` for a placement diagnostic).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Placement-engine diagnostics, prefixed with `P`.
    Placement,
    /// Timing-analysis diagnostics, prefixed with `T`.
    Timing,
    /// Device-model diagnostics, prefixed with `D`.
    Device,
    /// Configuration diagnostics, prefixed with `C`.
    Config,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Placement => 'P',
            Category::Timing => 'T',
            Category::Device => 'D',
            Category::Config => 'C',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `P101`, `D002`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Placement.prefix(), 'P');
        assert_eq!(Category::Timing.prefix(), 'T');
        assert_eq!(Category::Device.prefix(), 'D');
        assert_eq!(Category::Config.prefix(), 'C');
    }

    #[test]
    fn display_format() {
        let code = DiagnosticCode::new(Category::Placement, 101);
        assert_eq!(format!("{code}"), "P101");

        let code = DiagnosticCode::new(Category::Device, 3);
        assert_eq!(format!("{code}"), "D003");
    }

    #[test]
    fn equality() {
        let a = DiagnosticCode::new(Category::Timing, 7);
        let b = DiagnosticCode::new(Category::Timing, 7);
        let c = DiagnosticCode::new(Category::Timing, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Config, 42);
        let json = serde_json::to_string(&code).unwrap();
        let restored: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, restored);
    }
}
