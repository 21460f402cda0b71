pub use crate::config::*;
use crate::{summarize, Scorer, Verdict};

use log::{debug, warn};

/// What happened to a submission when it was recorded.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RecordOutcome {
    /// First submission of this participant, stored under a new id.
    Created(u64),
    /// The participant had already answered: the previous answer was replaced.
    Updated(u64),
}

impl RecordOutcome {
    pub fn id(&self) -> u64 {
        match self {
            RecordOutcome::Created(id) | RecordOutcome::Updated(id) => *id,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RecordOutcome::Created(_) => "Selection submitted successfully.",
            RecordOutcome::Updated(_) => "Selection updated successfully.",
        }
    }
}

/// The data contract required from a persistent collection of submissions.
///
/// A store keeps at most one submission per user id. The snapshot is the complete
/// current set of submissions, in the order they were first recorded.
pub trait SubmissionStore {
    type Error: std::error::Error;

    fn record(&mut self, submission: Submission) -> Result<RecordOutcome, Self::Error>;

    fn snapshot(&self) -> Result<Vec<Submission>, Self::Error>;
}

/// A builder for collecting submissions in memory and tabulating them.
///
/// ```
/// pub use proximity_scoring::builder::Builder;
/// pub use proximity_scoring::{Categories, ScoringRules};
/// # use proximity_scoring::ScoringError;
///
/// let mut builder = Builder::new(&ScoringRules::DEFAULT_RULES)?
///     .categories(&["Salary".to_string(), "People".to_string(), "Work".to_string()])?;
///
/// builder.add_scores("user-1", Some("Portugal"), &[8, 2, 2])?;
/// builder.add_scores("user-2", None, &[2, 2, 8])?;
///
/// let results = builder.results().unwrap();
/// assert_eq!(results.countries.len(), 2);
///
/// # Ok::<(), ScoringError>(())
/// ```
pub struct Builder {
    pub(crate) _rules: ScoringRules,
    pub(crate) _categories: Categories,
    pub(crate) _submissions: Vec<(u64, Submission)>,
    pub(crate) _next_id: u64,
}

impl Builder {
    pub fn new(rules: &ScoringRules) -> Result<Builder, ScoringError> {
        rules.check()?;
        Ok(Builder {
            _rules: rules.clone(),
            _categories: Categories::default_poll(),
            _submissions: Vec::new(),
            _next_id: 1,
        })
    }

    pub fn categories(self, labels: &[String]) -> Result<Builder, ScoringError> {
        Ok(Builder {
            _rules: self._rules,
            _categories: Categories::from_labels(labels)?,
            _submissions: Vec::new(),
            _next_id: 1,
        })
    }

    pub fn with_categories(self, categories: &Categories) -> Builder {
        Builder {
            _rules: self._rules,
            _categories: categories.clone(),
            _submissions: Vec::new(),
            _next_id: 1,
        }
    }

    pub fn get_categories(&self) -> &Categories {
        &self._categories
    }

    /// Adds the answer of a participant, given as scores in category order.
    ///
    /// The scores must satisfy the acceptance rules.
    pub fn add_scores(
        &mut self,
        user_id: &str,
        country: Option<&str>,
        scores: &[i32; 3],
    ) -> Result<RecordOutcome, ScoringError> {
        let triple = ScoreTriple(*scores);
        let verdict = crate::validate(&triple, &self._categories, &self._rules);
        let accepted = verdict.into_result()?;
        Ok(self.add_submission(Submission::new(user_id, country, accepted)))
    }

    /// Adds the answer of a participant, given as a point selected in the triangle
    /// of the scorer.
    pub fn add_point(
        &mut self,
        user_id: &str,
        country: Option<&str>,
        point: &Point,
        scorer: &Scorer,
    ) -> Result<RecordOutcome, ScoringError> {
        let evaluation = scorer.evaluate(point)?;
        match evaluation.verdict {
            Verdict::Accepted(scores) => {
                Ok(self.add_submission(Submission::new(user_id, country, scores)))
            }
            Verdict::Rejected(rejection) => Err(ScoringError::Rejected(rejection)),
        }
    }

    /// Adds a submission without checking it.
    ///
    /// A participant who already answered keeps their id and position, with the new
    /// answer replacing the old one.
    pub fn add_submission(&mut self, submission: Submission) -> RecordOutcome {
        if let Some((id, existing)) = self
            ._submissions
            .iter_mut()
            .find(|(_, s)| s.user_id == submission.user_id)
        {
            warn!(
                "add_submission: user {:?} already answered, replacing {:?} with {:?}",
                submission.user_id, existing.scores, submission.scores
            );
            *existing = submission;
            return RecordOutcome::Updated(*id);
        }
        let id = self._next_id;
        self._next_id += 1;
        debug!("add_submission: id {:?}: {:?}", id, submission);
        self._submissions.push((id, submission));
        RecordOutcome::Created(id)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self._submissions.iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self._submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self._submissions.is_empty()
    }

    pub fn results(&self) -> Result<SurveyResults, AggregationError> {
        summarize(&self.submissions(), &self._categories)
    }
}

impl SubmissionStore for Builder {
    type Error = std::convert::Infallible;

    fn record(&mut self, submission: Submission) -> Result<RecordOutcome, Self::Error> {
        Ok(self.add_submission(submission))
    }

    fn snapshot(&self) -> Result<Vec<Submission>, Self::Error> {
        Ok(self.submissions())
    }
}
