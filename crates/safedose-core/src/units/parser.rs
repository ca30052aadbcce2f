//! Free-text quantity parser.
//!
//! Handles:
//! - Leading number extraction ("5 mg/mL", "50000000 mg", "1,000 units")
//! - Unit alias matching (u/ml→units/mL, cc→mL, ug→mcg, etc.)
//! - Best-effort fallback: text without a number is kept as an opaque amount

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ConcentrationUnit, DoseUnit, ErrorKind, UnitFamily};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)")
        .expect("number pattern is valid")
});

static UNIT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-zµμ]+(?:\s*/\s*[A-Za-z]+)?)").expect("unit pattern is valid")
});

static DEFAULT_PARSER: LazyLock<UnitParser> = LazyLock::new(UnitParser::new);

/// Unit recognized in free text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ParsedUnit {
    Dose(DoseUnit),
    Concentration(ConcentrationUnit),
}

impl ParsedUnit {
    pub fn family(&self) -> UnitFamily {
        match self {
            ParsedUnit::Dose(unit) => unit.family(),
            ParsedUnit::Concentration(_) => UnitFamily::Concentration,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParsedUnit::Dose(unit) => unit.as_str(),
            ParsedUnit::Concentration(unit) => unit.as_str(),
        }
    }

    /// Unit assumed when the text carries no unit.
    pub fn default_for(family: UnitFamily) -> Self {
        match family {
            UnitFamily::Mass => ParsedUnit::Dose(DoseUnit::Mg),
            UnitFamily::Activity => ParsedUnit::Dose(DoseUnit::Units),
            UnitFamily::Volume => ParsedUnit::Dose(DoseUnit::Ml),
            UnitFamily::Concentration => ParsedUnit::Concentration(ConcentrationUnit::MgPerMl),
        }
    }
}

impl fmt::Display for ParsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric part of a parsed quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Amount {
    Numeric(f64),
    /// No number was found; the original text is kept as-is
    Opaque(String),
}

impl Amount {
    pub fn value(&self) -> Option<f64> {
        match self {
            Amount::Numeric(value) => Some(*value),
            Amount::Opaque(_) => None,
        }
    }
}

/// Lenient parse result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedQuantity {
    pub amount: Amount,
    pub unit: Option<ParsedUnit>,
}

/// Strict parse result with a unit in the requested family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalizedAmount {
    pub amount: f64,
    pub unit: ParsedUnit,
}

/// Parser for quantity strings.
pub struct UnitParser {
    /// Alias map: compact lowercase spelling → unit
    aliases: HashMap<String, ParsedUnit>,
}

impl Default for UnitParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitParser {
    /// Create a parser with the default alias table.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }

    /// Parse free text. Never fails.
    pub fn parse(&self, input: &str) -> ParsedQuantity {
        let Some(number) = NUMBER.find(input) else {
            return ParsedQuantity {
                amount: Amount::Opaque(input.to_string()),
                unit: self.match_unit(input),
            };
        };

        let amount = number
            .as_str()
            .replace(',', "")
            .parse::<f64>()
            .map(Amount::Numeric)
            .unwrap_or_else(|_| Amount::Opaque(input.to_string()));

        ParsedQuantity {
            amount,
            unit: self.match_unit(&input[number.end()..]),
        }
    }

    /// Parse text into an amount in the given family.
    ///
    /// Text without a unit takes the family's default unit.
    pub fn parse_amount(&self, input: &str, family: UnitFamily) -> Result<NormalizedAmount, ErrorKind> {
        let parsed = self.parse(input);
        let amount = parsed.amount.value().ok_or(ErrorKind::ParseFailure)?;

        let unit = match parsed.unit {
            Some(unit) if unit.family() == family => unit,
            Some(unit) => {
                tracing::debug!(
                    parsed_unit = %unit,
                    wanted = ?family,
                    "Unit does not belong to requested family"
                );
                return Err(ErrorKind::UnitMismatch);
            }
            None => ParsedUnit::default_for(family),
        };

        Ok(NormalizedAmount { amount, unit })
    }

    /// Match the unit token at the start of `text`.
    pub fn match_unit(&self, text: &str) -> Option<ParsedUnit> {
        let token = UNIT_TOKEN.captures(text)?.get(1)?.as_str();
        let compact = compact(token);

        if let Some(unit) = self.aliases.get(&compact) {
            return Some(*unit);
        }

        // "mg/tab" → fall back to the numerator
        let numerator = compact.split('/').next()?;
        self.aliases.get(numerator).copied()
    }

    /// Add a custom alias.
    pub fn add_alias(&mut self, alias: &str, unit: ParsedUnit) {
        self.aliases.insert(compact(alias), unit);
    }

    /// Default unit aliases.
    fn default_aliases() -> HashMap<String, ParsedUnit> {
        use ConcentrationUnit::*;
        use DoseUnit::*;

        let mut map = HashMap::new();

        // Concentrations
        map.insert("mg/ml".into(), ParsedUnit::Concentration(MgPerMl));
        map.insert("mg/cc".into(), ParsedUnit::Concentration(MgPerMl));
        map.insert("mcg/ml".into(), ParsedUnit::Concentration(McgPerMl));
        map.insert("ug/ml".into(), ParsedUnit::Concentration(McgPerMl));
        map.insert("µg/ml".into(), ParsedUnit::Concentration(McgPerMl));
        map.insert("μg/ml".into(), ParsedUnit::Concentration(McgPerMl));
        map.insert("units/ml".into(), ParsedUnit::Concentration(UnitsPerMl));
        map.insert("unit/ml".into(), ParsedUnit::Concentration(UnitsPerMl));
        map.insert("u/ml".into(), ParsedUnit::Concentration(UnitsPerMl));
        map.insert("iu/ml".into(), ParsedUnit::Concentration(UnitsPerMl));

        // Mass
        map.insert("mg".into(), ParsedUnit::Dose(Mg));
        map.insert("milligram".into(), ParsedUnit::Dose(Mg));
        map.insert("milligrams".into(), ParsedUnit::Dose(Mg));
        map.insert("mcg".into(), ParsedUnit::Dose(Mcg));
        map.insert("ug".into(), ParsedUnit::Dose(Mcg));
        map.insert("µg".into(), ParsedUnit::Dose(Mcg));
        map.insert("μg".into(), ParsedUnit::Dose(Mcg));
        map.insert("microgram".into(), ParsedUnit::Dose(Mcg));
        map.insert("micrograms".into(), ParsedUnit::Dose(Mcg));

        // Activity
        map.insert("units".into(), ParsedUnit::Dose(Units));
        map.insert("unit".into(), ParsedUnit::Dose(Units));
        map.insert("u".into(), ParsedUnit::Dose(Units));
        map.insert("iu".into(), ParsedUnit::Dose(Units));

        // Volume
        map.insert("ml".into(), ParsedUnit::Dose(Ml));
        map.insert("cc".into(), ParsedUnit::Dose(Ml));

        map
    }
}

fn compact(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Parse free text with the default parser. Never fails.
pub fn parse_quantity(input: &str) -> ParsedQuantity {
    DEFAULT_PARSER.parse(input)
}

/// Parse free text into an amount of the given family with the default parser.
pub fn parse_amount(input: &str, family: UnitFamily) -> Result<NormalizedAmount, ErrorKind> {
    DEFAULT_PARSER.parse_amount(input, family)
}
