use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("score dimension {field} out of range: {value} > 100")]
    OutOfRange { field: &'static str, value: u8 },
}

/// Solution-Seeking Index: the five SURGE dimensions plus an overall value,
/// each on a 0-100 scale.
///
/// Field names serialize with the platform's original camelCase keys so
/// persisted transcripts and API payloads stay compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsiScore {
    overall: u8,
    self_awareness: u8,
    understanding_opportunities: u8,
    resilience: u8,
    growth_execution: u8,
    entrepreneurial_leadership: u8,
}

impl SsiScore {
    /// Builds a score, validating every dimension against the 0-100 scale.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` naming the offending dimension.
    pub fn new(
        overall: u8,
        self_awareness: u8,
        understanding_opportunities: u8,
        resilience: u8,
        growth_execution: u8,
        entrepreneurial_leadership: u8,
    ) -> Result<Self, ScoreError> {
        let check = |field: &'static str, value: u8| {
            if value > 100 {
                Err(ScoreError::OutOfRange { field, value })
            } else {
                Ok(())
            }
        };
        check("overall", overall)?;
        check("selfAwareness", self_awareness)?;
        check("understandingOpportunities", understanding_opportunities)?;
        check("resilience", resilience)?;
        check("growthExecution", growth_execution)?;
        check("entrepreneurialLeadership", entrepreneurial_leadership)?;

        Ok(Self {
            overall,
            self_awareness,
            understanding_opportunities,
            resilience,
            growth_execution,
            entrepreneurial_leadership,
        })
    }

    /// Rehydrates a score from persisted storage.
    ///
    /// # Errors
    ///
    /// Same range validation as [`SsiScore::new`].
    pub fn from_persisted(
        overall: u8,
        self_awareness: u8,
        understanding_opportunities: u8,
        resilience: u8,
        growth_execution: u8,
        entrepreneurial_leadership: u8,
    ) -> Result<Self, ScoreError> {
        Self::new(
            overall,
            self_awareness,
            understanding_opportunities,
            resilience,
            growth_execution,
            entrepreneurial_leadership,
        )
    }

    #[must_use]
    pub fn overall(&self) -> u8 {
        self.overall
    }

    #[must_use]
    pub fn self_awareness(&self) -> u8 {
        self.self_awareness
    }

    #[must_use]
    pub fn understanding_opportunities(&self) -> u8 {
        self.understanding_opportunities
    }

    #[must_use]
    pub fn resilience(&self) -> u8 {
        self.resilience
    }

    #[must_use]
    pub fn growth_execution(&self) -> u8 {
        self.growth_execution
    }

    #[must_use]
    pub fn entrepreneurial_leadership(&self) -> u8 {
        self.entrepreneurial_leadership
    }

    /// The five SURGE dimensions in mnemonic order, without the overall value.
    #[must_use]
    pub fn dimensions(&self) -> [(&'static str, u8); 5] {
        [
            ("selfAwareness", self.self_awareness),
            ("understandingOpportunities", self.understanding_opportunities),
            ("resilience", self.resilience),
            ("growthExecution", self.growth_execution),
            ("entrepreneurialLeadership", self.entrepreneurial_leadership),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_range() {
        let score = SsiScore::new(100, 0, 50, 75, 25, 100).unwrap();
        assert_eq!(score.overall(), 100);
        assert_eq!(score.resilience(), 75);
    }

    #[test]
    fn rejects_out_of_range_dimension() {
        let err = SsiScore::new(50, 101, 0, 0, 0, 0).unwrap_err();
        assert_eq!(
            err,
            ScoreError::OutOfRange {
                field: "selfAwareness",
                value: 101
            }
        );
    }

    #[test]
    fn serializes_camel_case() {
        let score = SsiScore::new(60, 61, 62, 63, 64, 65).unwrap();
        let json = serde_json::to_value(score).unwrap();
        assert_eq!(json["overall"], 60);
        assert_eq!(json["selfAwareness"], 61);
        assert_eq!(json["understandingOpportunities"], 62);
        assert_eq!(json["entrepreneurialLeadership"], 65);
    }

    #[test]
    fn dimensions_follow_surge_order() {
        let score = SsiScore::new(0, 1, 2, 3, 4, 5).unwrap();
        let values: Vec<u8> = score.dimensions().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
