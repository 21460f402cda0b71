use std::fmt::Display;

use log::debug;

use crate::config::*;

/// Why a selection was not accepted.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RejectionReason {
    /// A score is outside of the allowed range.
    OutOfRange { label: String, value: i32 },
    /// The scores do not add up to the target total.
    WrongTotal { total: i64, target: i32 },
    /// No score reaches the decisiveness threshold.
    Indecisive { threshold: i32 },
}

/// A refused selection, with everything needed to explain it to the participant.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Rejection {
    pub reason: RejectionReason,
    /// Each label with its score, in category order.
    pub breakdown: Vec<(String, i32)>,
    pub min_score: i32,
    pub max_score: i32,
    pub threshold: i32,
}

impl Rejection {
    /// One line per category, e.g. `Salary: 3/10`.
    pub fn breakdown_lines(&self) -> String {
        self.breakdown
            .iter()
            .map(|(label, value)| format!("{}: {}/{}", label, value, self.max_score))
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// The message shown to the participant so that they can adjust their selection.
    pub fn user_message(&self) -> String {
        format!(
            "Please select a more definitive position by moving your point closer to one of the corners.\n\n\
             Current values:\n{}\n\n\
             Values must be between {} and {}, with at least one value {} or higher.",
            self.breakdown_lines(),
            self.min_score,
            self.max_score,
            self.threshold
        )
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            RejectionReason::OutOfRange { label, value } => write!(
                f,
                "score {} for {} is outside [{}, {}]",
                value, label, self.min_score, self.max_score
            ),
            RejectionReason::WrongTotal { total, target } => {
                write!(f, "scores add up to {} instead of {}", total, target)
            }
            RejectionReason::Indecisive { threshold } => {
                write!(f, "no score reaches {}", threshold)
            }
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Verdict {
    Accepted(ScoreTriple),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn into_result(self) -> Result<ScoreTriple, ScoringError> {
        match self {
            Verdict::Accepted(scores) => Ok(scores),
            Verdict::Rejected(rejection) => Err(ScoringError::Rejected(rejection)),
        }
    }
}

/// Applies the acceptance rules to a score triple.
///
/// The checks run in order: every score in range, exact total, then at least one
/// score at or above the decisiveness threshold.
pub fn validate(scores: &ScoreTriple, categories: &Categories, rules: &ScoringRules) -> Verdict {
    let breakdown = categories.tag(scores);
    let reject = |reason: RejectionReason| {
        debug!("validate: rejecting {:?}: {:?}", scores, reason);
        Verdict::Rejected(Rejection {
            reason,
            breakdown: breakdown.clone(),
            min_score: rules.min_score,
            max_score: rules.max_score,
            threshold: rules.decisiveness_threshold,
        })
    };

    if let Some((label, value)) = breakdown
        .iter()
        .find(|(_, v)| *v < rules.min_score || *v > rules.max_score)
    {
        return reject(RejectionReason::OutOfRange {
            label: label.clone(),
            value: *value,
        });
    }
    let total = scores.total();
    if total != rules.target_total as i64 {
        return reject(RejectionReason::WrongTotal {
            total,
            target: rules.target_total,
        });
    }
    if scores.max() < rules.decisiveness_threshold {
        return reject(RejectionReason::Indecisive {
            threshold: rules.decisiveness_threshold,
        });
    }
    Verdict::Accepted(*scores)
}
