//! Composite process-reference grammar.
//!
//! A tracked process is addressed by a composite reference of the form
//! `COURT '_' DEGREE '_' NUMBER`, e.g. `TRF5_G1_0002936-77.2025.4.05.8202`:
//! the court alias used by the DataJud endpoint, the degree of jurisdiction
//! (`G1`, `G2`, `TR`, ...), and the CNJ case number. Exactly three segments,
//! each non-empty; anything else is malformed.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("malformed process reference `{0}`: expected COURT_DEGREE_NUMBER")]
    Malformed(String),
}

/// A parsed `COURT_DEGREE_NUMBER` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessRef {
    court: String,
    degree: String,
    number: String,
}

impl ProcessRef {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = raw.split('_').collect();
        let [court, degree, number] = segments.as_slice() else {
            return Err(ReferenceError::Malformed(raw.to_string()));
        };
        if court.is_empty() || degree.is_empty() || number.is_empty() {
            return Err(ReferenceError::Malformed(raw.to_string()));
        }
        Ok(Self {
            court: (*court).to_string(),
            degree: (*degree).to_string(),
            number: (*number).to_string(),
        })
    }

    /// Court alias, as used in the per-court API endpoint.
    pub fn court(&self) -> &str {
        &self.court
    }

    /// Degree of jurisdiction.
    pub fn degree(&self) -> &str {
        &self.degree
    }

    /// CNJ case number.
    pub fn number(&self) -> &str {
        &self.number
    }
}

impl fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.court, self.degree, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segments() {
        let parsed = ProcessRef::parse("TRF5_G1_0002936-77.2025.4.05.8202").unwrap();
        assert_eq!(parsed.court(), "TRF5");
        assert_eq!(parsed.degree(), "G1");
        assert_eq!(parsed.number(), "0002936-77.2025.4.05.8202");
    }

    #[test]
    fn display_roundtrip() {
        let raw = "TJPB_G2_0800001-11.2024.8.15.0001";
        assert_eq!(ProcessRef::parse(raw).unwrap().to_string(), raw);
    }

    #[test]
    fn rejects_missing_segments() {
        assert!(ProcessRef::parse("TJPB").is_err());
        assert!(ProcessRef::parse("TJPB_G1").is_err());
        assert!(ProcessRef::parse("").is_err());
    }

    #[test]
    fn rejects_extra_segments() {
        assert!(ProcessRef::parse("TJPB_G1_123_456").is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(ProcessRef::parse("_G1_123").is_err());
        assert!(ProcessRef::parse("TJPB__123").is_err());
        assert!(ProcessRef::parse("TJPB_G1_").is_err());
    }

    #[test]
    fn error_carries_offending_input() {
        let err = ProcessRef::parse("nonsense").unwrap_err();
        assert_eq!(err, ReferenceError::Malformed("nonsense".to_string()));
    }
}
