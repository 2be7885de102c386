//! Human-readable document numbers (`ORC-2025-000042`, `PED-2025-000007`).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use salesflow_core::DomainError;

/// Kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Quote,
    Order,
}

impl DocumentType {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentType::Quote => "ORC",
            DocumentType::Order => "PED",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "ORC" => Some(DocumentType::Quote),
            "PED" => Some(DocumentType::Order),
            _ => None,
        }
    }
}

/// Minimum width of the sequence part.
pub const SEQUENCE_WIDTH: usize = 6;

/// A document number unique within `(document_type, year)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DocumentNumber {
    pub year: i32,
    pub sequence: u32,
    pub document_type: DocumentType,
}

impl DocumentNumber {
    pub fn new(document_type: DocumentType, year: i32, sequence: u32) -> Self {
        Self {
            year,
            sequence,
            document_type,
        }
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}-{:04}-{:0width$}",
            self.document_type.prefix(),
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("malformed document number '{s}'"));

        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(year), Some(seq)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let document_type = DocumentType::from_prefix(prefix).ok_or_else(invalid)?;
        if year.len() != 4 || seq.len() < SEQUENCE_WIDTH {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let sequence: u32 = seq.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }

        Ok(Self::new(document_type, year, sequence))
    }
}

impl From<DocumentNumber> for String {
    fn from(value: DocumentNumber) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DocumentNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_prefix_year_and_padding() {
        assert_eq!(
            DocumentNumber::new(DocumentType::Order, 2025, 7).to_string(),
            "PED-2025-000007"
        );
        assert_eq!(
            DocumentNumber::new(DocumentType::Quote, 2024, 123_456).to_string(),
            "ORC-2024-123456"
        );
    }

    #[test]
    fn widens_past_six_digits() {
        assert_eq!(
            DocumentNumber::new(DocumentType::Order, 2025, 1_000_000).to_string(),
            "PED-2025-1000000"
        );
    }

    #[test]
    fn pads_short_years_to_four_digits() {
        for (year, expected) in [
            (1, "ORC-0001-000001"),
            (999, "ORC-0999-000001"),
            (1000, "ORC-1000-000001"),
            (9999, "ORC-9999-000001"),
        ] {
            let n = DocumentNumber::new(DocumentType::Quote, year, 1);
            assert_eq!(n.to_string(), expected);
            assert_eq!(n.to_string().parse::<DocumentNumber>().unwrap(), n);
        }
    }

    #[test]
    fn parses_its_own_output() {
        let n = DocumentNumber::new(DocumentType::Quote, 2025, 42);
        assert_eq!(n.to_string().parse::<DocumentNumber>().unwrap(), n);
    }

    #[test]
    fn rejects_malformed_numbers() {
        for bad in ["", "PED", "XYZ-2025-000001", "PED-25-000001", "PED-2025-1", "PED-2025-000000"] {
            assert!(bad.parse::<DocumentNumber>().is_err(), "{bad} should not parse");
        }
    }
}
