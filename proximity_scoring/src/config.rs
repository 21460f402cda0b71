// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A position on the canvas. The y axis grows downward, as on a screen.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Where the label of a vertex is drawn relative to the vertex.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum LabelPosition {
    Top,
    Left,
    Right,
}

impl LabelPosition {
    pub fn parse(s: &str) -> Option<LabelPosition> {
        match s {
            "top" => Some(LabelPosition::Top),
            "left" => Some(LabelPosition::Left),
            "right" => Some(LabelPosition::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelPosition::Top => "top",
            LabelPosition::Left => "left",
            LabelPosition::Right => "right",
        }
    }

    /// Offset (dx, dy) from the vertex to the anchor of its label.
    pub fn anchor_offset(&self) -> (f64, f64) {
        match self {
            LabelPosition::Top => (0.0, -20.0),
            LabelPosition::Left => (-10.0, 20.0),
            LabelPosition::Right => (10.0, 20.0),
        }
    }
}

/// One of the three factors the poll compares.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Category {
    pub label: String,
    pub position: LabelPosition,
}

/// The three categories of a poll, in vertex order.
///
/// The association between a score and a label is positional: the i-th score of a
/// [ScoreTriple] always belongs to the i-th category.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Categories {
    categories: Vec<Category>,
}

impl Categories {
    pub fn new(categories: Vec<Category>) -> Result<Categories, ScoringError> {
        if categories.len() != 3 {
            return Err(ScoringError::CategoryCount(categories.len()));
        }
        for (idx, c) in categories.iter().enumerate() {
            if c.label.trim().is_empty() {
                return Err(ScoringError::EmptyLabel);
            }
            if categories[..idx].iter().any(|c2| c2.label == c.label) {
                return Err(ScoringError::DuplicateLabel(c.label.clone()));
            }
        }
        Ok(Categories { categories })
    }

    /// Builds the categories from labels alone, placing them top, left, right.
    pub fn from_labels(labels: &[String]) -> Result<Categories, ScoringError> {
        let positions = [LabelPosition::Top, LabelPosition::Left, LabelPosition::Right];
        Categories::new(
            labels
                .iter()
                .zip(positions.iter().chain(std::iter::repeat(&LabelPosition::Right)))
                .map(|(label, position)| Category {
                    label: label.clone(),
                    position: *position,
                })
                .collect(),
        )
    }

    /// The categories of the default poll: Salary, People and Work.
    pub fn default_poll() -> Categories {
        Categories {
            categories: vec![
                Category {
                    label: "Salary".to_string(),
                    position: LabelPosition::Top,
                },
                Category {
                    label: "People".to_string(),
                    position: LabelPosition::Left,
                },
                Category {
                    label: "Work".to_string(),
                    position: LabelPosition::Right,
                },
            ],
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.categories.iter()
    }

    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label.clone()).collect()
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.categories.get(idx).map(|c| c.label.as_str())
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.label == label)
    }

    /// Pairs each label with the corresponding score.
    pub fn tag(&self, scores: &ScoreTriple) -> Vec<(String, i32)> {
        self.categories
            .iter()
            .zip(scores.values().iter())
            .map(|(c, v)| (c.label.clone(), *v))
            .collect()
    }
}

/// Three integer scores, one per category, in vertex order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Default)]
pub struct ScoreTriple(pub [i32; 3]);

impl ScoreTriple {
    pub fn new(values: [i32; 3]) -> ScoreTriple {
        ScoreTriple(values)
    }

    pub fn values(&self) -> &[i32; 3] {
        &self.0
    }

    pub fn total(&self) -> i64 {
        self.0.iter().map(|v| *v as i64).sum()
    }

    pub fn max(&self) -> i32 {
        self.0.iter().cloned().max().unwrap_or_default()
    }
}

/// The placeholder country for submissions whose origin could not be determined.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Maps a missing, blank or unknown country to [UNKNOWN_COUNTRY].
pub fn normalize_country(country: Option<&str>) -> String {
    match country.map(|c| c.trim()) {
        None => UNKNOWN_COUNTRY.to_string(),
        Some(c) if c.is_empty() || c.eq_ignore_ascii_case(UNKNOWN_COUNTRY) => {
            UNKNOWN_COUNTRY.to_string()
        }
        Some(c) => c.to_string(),
    }
}

/// The answer of one participant.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Submission {
    pub user_id: String,
    pub country: String,
    pub scores: ScoreTriple,
}

impl Submission {
    pub fn new(user_id: &str, country: Option<&str>, scores: ScoreTriple) -> Submission {
        Submission {
            user_id: user_id.to_string(),
            country: normalize_country(country),
            scores,
        }
    }
}

// ******** Output data structures *********

/// Statistics for the participants of one country.
#[derive(PartialEq, Debug, Clone)]
pub struct CountryAggregate {
    pub country: String,
    pub participant_count: u64,
    /// The average score of each label, in category order.
    pub averages: Vec<(String, f64)>,
}

/// Statistics across all the countries, weighted by the number of participants.
#[derive(PartialEq, Debug, Clone)]
pub struct GlobalAggregate {
    pub participant_count: u64,
    pub averages: Vec<(String, f64)>,
    /// The share of each label in the sum of the averages, in percent.
    pub shares: Vec<(String, f64)>,
}

/// The full outcome of a tabulation.
#[derive(PartialEq, Debug, Clone)]
pub struct SurveyResults {
    /// Sorted by decreasing number of participants.
    pub countries: Vec<CountryAggregate>,
    /// Not present when there is no data yet.
    pub global: Option<GlobalAggregate>,
}

impl SurveyResults {
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

// ********* Errors **********

/// Errors from the geometry, normalization and validation steps.
///
/// Apart from [ScoringError::Rejected] and [ScoringError::NotInsideTriangle], they
/// describe a broken configuration and are not recoverable for a given poll.
#[derive(PartialEq, Debug, Clone)]
pub enum ScoringError {
    DegenerateTriangle,
    InvalidReferenceDistance(f64),
    NonFinitePoint,
    NotInsideTriangle,
    CategoryCount(usize),
    EmptyLabel,
    DuplicateLabel(String),
    InvalidRules(String),
    UnreachableTarget { target: i32, min: i32, max: i32 },
    DegenerateScores([i32; 3]),
    Rejected(crate::validate::Rejection),
}

impl Error for ScoringError {}

impl Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::DegenerateTriangle => write!(f, "the triangle is degenerate"),
            ScoringError::InvalidReferenceDistance(d) => {
                write!(f, "invalid reference distance for scoring: {}", d)
            }
            ScoringError::NonFinitePoint => write!(f, "the point has non-finite coordinates"),
            ScoringError::NotInsideTriangle => {
                write!(f, "Click inside the triangle to select a position")
            }
            ScoringError::CategoryCount(n) => {
                write!(f, "exactly 3 categories are required, got {}", n)
            }
            ScoringError::EmptyLabel => write!(f, "category labels cannot be empty"),
            ScoringError::DuplicateLabel(l) => write!(f, "duplicate category label {:?}", l),
            ScoringError::InvalidRules(msg) => write!(f, "invalid scoring rules: {}", msg),
            ScoringError::UnreachableTarget { target, min, max } => write!(
                f,
                "the target total {} cannot be reached with three scores in [{}, {}]",
                target, min, max
            ),
            ScoringError::DegenerateScores(raw) => {
                write!(f, "cannot normalize the raw scores {:?}", raw)
            }
            ScoringError::Rejected(rejection) => write!(f, "{}", rejection),
        }
    }
}

/// Errors that prevent the tabulation from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AggregationError {
    /// There is no participant to average over.
    EmptyInput,
    /// The country does not report the same labels as the first country.
    LabelMismatch { country: String },
}

impl Error for AggregationError {}

impl Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::EmptyInput => write!(f, "no participants to aggregate"),
            AggregationError::LabelMismatch { country } => {
                write!(f, "country {:?} does not use the same labels", country)
            }
        }
    }
}

// ********* Configuration **********

/// The acceptance rules of a poll.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoringRules {
    /// The exact sum that the three scores must reach.
    pub target_total: i32,
    pub min_score: i32,
    pub max_score: i32,
    /// At least one score must reach this value.
    pub decisiveness_threshold: i32,
    /// Radius (in pixels) around the selected point that starts a drag.
    pub hit_radius: f64,
}

impl ScoringRules {
    pub const DEFAULT_RULES: ScoringRules = ScoringRules {
        target_total: 12,
        min_score: 1,
        max_score: 10,
        decisiveness_threshold: 7,
        hit_radius: 10.0,
    };

    /// True if three scores in `[min_score, max_score]` can sum to the target.
    pub fn target_is_reachable(&self) -> bool {
        let target = self.target_total as i64;
        target >= 3 * self.min_score as i64 && target <= 3 * self.max_score as i64
    }

    /// The largest single score of a triple that sums to the target, the other two
    /// being at the minimum.
    pub fn highest_reachable_score(&self) -> i64 {
        (self.max_score as i64).min(self.target_total as i64 - 2 * self.min_score as i64)
    }

    pub fn check(&self) -> Result<(), ScoringError> {
        if self.min_score > self.max_score {
            return Err(ScoringError::InvalidRules(format!(
                "minimum score {} is above the maximum score {}",
                self.min_score, self.max_score
            )));
        }
        if !self.target_is_reachable() {
            return Err(ScoringError::UnreachableTarget {
                target: self.target_total,
                min: self.min_score,
                max: self.max_score,
            });
        }
        let highest = self.highest_reachable_score();
        if self.decisiveness_threshold as i64 > highest {
            return Err(ScoringError::InvalidRules(format!(
                "decisiveness threshold {} can never be reached (highest possible score {})",
                self.decisiveness_threshold, highest
            )));
        }
        if !(self.hit_radius.is_finite() && self.hit_radius > 0.0) {
            return Err(ScoringError::InvalidRules(format!(
                "hit radius must be positive, got {}",
                self.hit_radius
            )));
        }
        Ok(())
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules::DEFAULT_RULES
    }
}
