mod config;
mod geometry;
mod normalize;
mod validate;

pub mod builder;
pub mod interaction;
pub mod manual;
pub mod synthetic;

use log::{debug, info, warn};

use std::{
    collections::HashMap,
    ops::{Add, AddAssign},
};

pub use crate::config::*;
pub use crate::geometry::*;
pub use crate::normalize::*;
pub use crate::validate::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct ParticipantCount(u64);

impl ParticipantCount {
    const EMPTY: ParticipantCount = ParticipantCount(0);
}

impl std::iter::Sum for ParticipantCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        ParticipantCount(iter.map(|pc| pc.0).sum())
    }
}

impl AddAssign for ParticipantCount {
    fn add_assign(&mut self, rhs: ParticipantCount) {
        self.0 += rhs.0;
    }
}

impl Add for ParticipantCount {
    type Output = ParticipantCount;
    fn add(self: ParticipantCount, rhs: ParticipantCount) -> ParticipantCount {
        ParticipantCount(self.0 + rhs.0)
    }
}

// Running sums for one country.
#[derive(Eq, PartialEq, Debug, Clone)]
struct CountryTally {
    count: ParticipantCount,
    sums: [i64; 3],
}

// **** Scoring pipeline ****

/// The outcome of evaluating one selected point.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Evaluation {
    /// The distance-based scores, in vertex order.
    pub raw: [i32; 3],
    /// The scores after normalization to the target total.
    pub normalized: ScoreTriple,
    pub verdict: Verdict,
}

/// Turns selected points into validated score triples for one poll.
#[derive(PartialEq, Debug, Clone)]
pub struct Scorer {
    triangle: Triangle,
    categories: Categories,
    rules: ScoringRules,
}

impl Scorer {
    pub fn new(
        triangle: Triangle,
        categories: Categories,
        rules: &ScoringRules,
    ) -> Result<Scorer, ScoringError> {
        rules.check()?;
        Ok(Scorer {
            triangle,
            categories,
            rules: rules.clone(),
        })
    }

    /// The scorer of the default poll, on an equilateral triangle of the given side.
    pub fn default_poll(side_length: f64) -> Result<Scorer, ScoringError> {
        Scorer::new(
            Triangle::equilateral(side_length)?,
            Categories::default_poll(),
            &ScoringRules::DEFAULT_RULES,
        )
    }

    pub fn triangle(&self) -> &Triangle {
        &self.triangle
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// The same poll on a resized triangle.
    pub fn with_triangle(&self, triangle: Triangle) -> Scorer {
        Scorer {
            triangle,
            categories: self.categories.clone(),
            rules: self.rules.clone(),
        }
    }

    /// Scores, normalizes and validates a point.
    ///
    /// Fails if the point is not strictly inside the triangle.
    pub fn evaluate(&self, point: &Point) -> Result<Evaluation, ScoringError> {
        if !self.triangle.contains(point) {
            return Err(ScoringError::NotInsideTriangle);
        }
        let raw = self.triangle.raw_scores(point)?;
        let normalized = normalize_in_range(&raw, &self.rules)?;
        let verdict = validate(&normalized, &self.categories, &self.rules);
        debug!(
            "evaluate: point: {:?} raw: {:?} normalized: {:?} accepted: {:?}",
            point,
            raw,
            normalized,
            verdict.is_accepted()
        );
        Ok(Evaluation {
            raw,
            normalized,
            verdict,
        })
    }

    /// Validates scores that were computed elsewhere, e.g. received from a client.
    pub fn check_scores(&self, scores: &ScoreTriple) -> Verdict {
        validate(scores, &self.categories, &self.rules)
    }
}

// **** Aggregation ****

/// Groups the submissions by country and averages the scores of each label.
///
/// Missing or unknown countries are counted under [UNKNOWN_COUNTRY]. The result is
/// sorted by decreasing number of participants; countries with the same number keep
/// the order in which they first appear.
pub fn aggregate_by_country(
    submissions: &[Submission],
    categories: &Categories,
) -> Vec<CountryAggregate> {
    info!("Aggregating {:?} submissions", submissions.len());
    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, CountryTally> = HashMap::new();
    for s in submissions.iter() {
        let country = normalize_country(Some(s.country.as_str()));
        let tally = tallies.entry(country.clone()).or_insert_with(|| {
            order.push(country.clone());
            CountryTally {
                count: ParticipantCount::EMPTY,
                sums: [0; 3],
            }
        });
        tally.count += ParticipantCount(1);
        for (sum, v) in tally.sums.iter_mut().zip(s.scores.values().iter()) {
            *sum += *v as i64;
        }
    }

    let labels = categories.labels();
    let mut res: Vec<CountryAggregate> = Vec::new();
    for country in order {
        if let Some(tally) = tallies.get(&country) {
            let n = tally.count.0 as f64;
            let averages: Vec<(String, f64)> = labels
                .iter()
                .zip(tally.sums.iter())
                .map(|(label, sum)| (label.clone(), *sum as f64 / n))
                .collect();
            debug!(
                "aggregate_by_country: {}: {:?} participants, averages {:?}",
                country, tally.count.0, averages
            );
            res.push(CountryAggregate {
                country,
                participant_count: tally.count.0,
                averages,
            });
        }
    }
    // Stable sort: ties stay in order of first appearance.
    res.sort_by(|a, b| b.participant_count.cmp(&a.participant_count));

    let total: ParticipantCount = res
        .iter()
        .map(|c| ParticipantCount(c.participant_count))
        .sum();
    if total.0 != submissions.len() as u64 {
        warn!(
            "aggregate_by_country: counted {:?} participants for {:?} submissions",
            total.0,
            submissions.len()
        );
    }
    res
}

/// The average of each label across countries, weighted by their number of participants.
///
/// The labels are taken from the first country; every other country must report the
/// same labels in the same order.
pub fn aggregate_global(countries: &[CountryAggregate]) -> Result<GlobalAggregate, AggregationError> {
    let total: ParticipantCount = countries
        .iter()
        .map(|c| ParticipantCount(c.participant_count))
        .sum();
    if total == ParticipantCount::EMPTY {
        return Err(AggregationError::EmptyInput);
    }
    let labels: Vec<String> = countries
        .first()
        .map(|c| c.averages.iter().map(|(l, _)| l.clone()).collect())
        .unwrap_or_default();

    let mut weighted: Vec<f64> = vec![0.0; labels.len()];
    for c in countries.iter() {
        let same_labels = c.averages.len() == labels.len()
            && c.averages.iter().zip(labels.iter()).all(|((l, _), l2)| l == l2);
        if !same_labels {
            return Err(AggregationError::LabelMismatch {
                country: c.country.clone(),
            });
        }
        for (w, (_, avg)) in weighted.iter_mut().zip(c.averages.iter()) {
            *w += avg * c.participant_count as f64;
        }
    }

    let averages: Vec<(String, f64)> = labels
        .into_iter()
        .zip(weighted.iter())
        .map(|(label, w)| (label, w / total.0 as f64))
        .collect();
    let sum: f64 = averages.iter().map(|(_, avg)| avg).sum();
    let shares: Vec<(String, f64)> = averages
        .iter()
        .map(|(label, avg)| {
            let share = if sum == 0.0 { 0.0 } else { avg / sum * 100.0 };
            (label.clone(), share)
        })
        .collect();
    info!(
        "aggregate_global: {:?} participants over {:?} countries: {:?} shares: {:?}",
        total.0,
        countries.len(),
        averages,
        shares
    );
    Ok(GlobalAggregate {
        participant_count: total.0,
        averages,
        shares,
    })
}

/// Runs the full tabulation on a snapshot of submissions.
///
/// An empty snapshot is not an error: the result has no country and no global
/// aggregate.
pub fn summarize(
    submissions: &[Submission],
    categories: &Categories,
) -> Result<SurveyResults, AggregationError> {
    let countries = aggregate_by_country(submissions, categories);
    if countries.is_empty() {
        info!("summarize: no data yet");
        return Ok(SurveyResults {
            countries,
            global: None,
        });
    }
    let global = aggregate_global(&countries)?;
    Ok(SurveyResults {
        countries,
        global: Some(global),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sub(user: &str, country: &str, scores: [i32; 3]) -> Submission {
        Submission::new(user, Some(country), ScoreTriple(scores))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn country_averages() {
        init();
        let subs = vec![sub("u1", "PT", [8, 2, 2]), sub("u2", "PT", [4, 4, 4])];
        let res = aggregate_by_country(&subs, &Categories::default_poll());
        assert_eq!(
            res,
            vec![CountryAggregate {
                country: "PT".to_string(),
                participant_count: 2,
                averages: vec![
                    ("Salary".to_string(), 6.0),
                    ("People".to_string(), 3.0),
                    ("Work".to_string(), 3.0)
                ],
            }]
        );
    }

    #[test]
    fn countries_sorted_by_participants_then_first_appearance() {
        init();
        let subs = vec![
            sub("u1", "France", [8, 2, 2]),
            sub("u2", "Japan", [8, 2, 2]),
            sub("u3", "Brazil", [2, 8, 2]),
            sub("u4", "Brazil", [2, 2, 8]),
            sub("u5", "India", [2, 2, 8]),
        ];
        let res = aggregate_by_country(&subs, &Categories::default_poll());
        let names: Vec<&str> = res.iter().map(|c| c.country.as_str()).collect();
        assert_eq!(names, vec!["Brazil", "France", "Japan", "India"]);
    }

    #[test]
    fn unknown_country_is_its_own_bucket() {
        init();
        let subs = vec![
            Submission::new("u1", None, ScoreTriple([8, 2, 2])),
            sub("u2", "", [2, 8, 2]),
            sub("u3", "Canada", [2, 2, 8]),
        ];
        let res = aggregate_by_country(&subs, &Categories::default_poll());
        assert_eq!(res[0].country, UNKNOWN_COUNTRY);
        assert_eq!(res[0].participant_count, 2);
        assert_eq!(res[1].participant_count, 1);
        let total: u64 = res.iter().map(|c| c.participant_count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn global_is_weighted_by_participants() {
        init();
        let countries = vec![
            CountryAggregate {
                country: "A".to_string(),
                participant_count: 10,
                averages: vec![
                    ("Salary".to_string(), 9.0),
                    ("People".to_string(), 2.0),
                    ("Work".to_string(), 1.0),
                ],
            },
            CountryAggregate {
                country: "B".to_string(),
                participant_count: 1,
                averages: vec![
                    ("Salary".to_string(), 1.0),
                    ("People".to_string(), 2.0),
                    ("Work".to_string(), 9.0),
                ],
            },
        ];
        let g = aggregate_global(&countries).unwrap();
        assert_eq!(g.participant_count, 11);
        assert!(approx(g.averages[0].1, 8.27));
        assert!(approx(g.averages[1].1, 2.0));
        assert!(approx(g.averages[2].1, 1.73));
        // The averages sum to 12.
        assert_eq!(g.shares[0].0, "Salary");
        assert!(approx(g.shares[0].1, 68.94));
        assert!(approx(g.shares[1].1, 16.67));
        assert!(approx(g.shares[2].1, 14.39));
        let share_total: f64 = g.shares.iter().map(|(_, v)| v).sum();
        assert!(approx(share_total, 100.0));
    }

    #[test]
    fn global_needs_participants() {
        assert_eq!(aggregate_global(&[]), Err(AggregationError::EmptyInput));
        let empty = CountryAggregate {
            country: "A".to_string(),
            participant_count: 0,
            averages: vec![],
        };
        assert_eq!(aggregate_global(&[empty]), Err(AggregationError::EmptyInput));
    }

    #[test]
    fn global_refuses_mismatched_labels() {
        let a = CountryAggregate {
            country: "A".to_string(),
            participant_count: 1,
            averages: vec![("Salary".to_string(), 1.0)],
        };
        let b = CountryAggregate {
            country: "B".to_string(),
            participant_count: 1,
            averages: vec![("Work".to_string(), 1.0)],
        };
        assert_eq!(
            aggregate_global(&[a, b]),
            Err(AggregationError::LabelMismatch {
                country: "B".to_string()
            })
        );
    }

    #[test]
    fn empty_snapshot_is_not_an_error() {
        let res = summarize(&[], &Categories::default_poll()).unwrap();
        assert!(res.is_empty());
        assert_eq!(res.global, None);
    }

    #[test]
    fn centroid_is_rejected_as_indecisive() {
        init();
        let scorer = Scorer::default_poll(400.0).unwrap();
        let centroid = scorer.triangle().centroid();
        let ev = scorer.evaluate(&centroid).unwrap();
        assert_eq!(ev.raw, [4, 4, 4]);
        assert_eq!(ev.normalized, ScoreTriple([4, 4, 4]));
        assert!(!ev.verdict.is_accepted());
    }

    #[test]
    fn point_near_a_vertex_is_accepted() {
        init();
        let scorer = Scorer::default_poll(400.0).unwrap();
        let right = scorer.triangle().vertices()[2];
        let ev = scorer.evaluate(&Point::new(right.x - 20.0, right.y - 5.0)).unwrap();
        assert_eq!(ev.normalized.total(), 12);
        assert_eq!(ev.normalized.values()[2], 10);
        assert!(ev.verdict.is_accepted());
    }

    #[test]
    fn points_outside_are_not_scored() {
        let scorer = Scorer::default_poll(400.0).unwrap();
        assert_eq!(
            scorer.evaluate(&Point::new(0.0, 0.0)),
            Err(ScoringError::NotInsideTriangle)
        );
    }
}
