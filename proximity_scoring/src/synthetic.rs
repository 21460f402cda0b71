/*!
Deterministic generation of sample submissions, for demonstrations and load tests.

Every random draw is derived from the SHA-256 digest of the seed and a counter, so the
same seed always produces the same dataset. Points are drawn uniformly in the triangle
and go through the full scoring pipeline: only accepted selections are kept.
*/

use log::{debug, info};

use crate::{Point, Scorer, ScoringError, Submission, Verdict};

/// The countries assigned to generated participants.
pub const SAMPLE_COUNTRIES: [&str; 10] = [
    "United States",
    "Canada",
    "United Kingdom",
    "Germany",
    "France",
    "Australia",
    "Japan",
    "Brazil",
    "India",
    "South Africa",
];

// Most points of a uniform draw are indecisive; this bounds the rejected draws per sample.
const MAX_ATTEMPTS_PER_SAMPLE: u64 = 1000;

/// A stream of pseudo-random words derived from a seed.
struct DigestStream {
    seed: String,
    counter: u64,
    buffer: Vec<u64>,
}

impl DigestStream {
    fn new(seed: &str) -> DigestStream {
        DigestStream {
            seed: seed.to_string(),
            counter: 0,
            buffer: Vec::new(),
        }
    }

    fn digest(&mut self) -> String {
        let d = sha256::digest(format!("{}:{}", self.seed, self.counter));
        self.counter += 1;
        d
    }

    fn next_u64(&mut self) -> u64 {
        if self.buffer.is_empty() {
            let hex = self.digest();
            // 64 hex characters: four words.
            self.buffer = (0..4)
                .rev()
                .filter_map(|i| u64::from_str_radix(&hex[i * 16..(i + 1) * 16], 16).ok())
                .collect();
        }
        self.buffer.pop().unwrap_or_default()
    }

    /// Uniform in [0, 1).
    fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }

    /// A version 4 style identifier.
    fn next_user_id(&mut self) -> String {
        let hex = self.digest();
        format!(
            "{}-{}-4{}-a{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[13..16],
            &hex[17..20],
            &hex[20..32]
        )
    }
}

/// Draws a point uniformly inside the triangle of the scorer.
fn draw_point(stream: &mut DigestStream, scorer: &Scorer) -> Point {
    let [a, b, c] = *scorer.triangle().vertices();
    let (mut u, mut v) = (stream.next_unit(), stream.next_unit());
    if u + v > 1.0 {
        u = 1.0 - u;
        v = 1.0 - v;
    }
    Point::new(
        a.x + u * (b.x - a.x) + v * (c.x - a.x),
        a.y + u * (b.y - a.y) + v * (c.y - a.y),
    )
}

/// Generates `count` accepted submissions.
///
/// Fails with the last rejection if the acceptance rules of the scorer are so strict
/// that no point can be found after many attempts.
pub fn generate(scorer: &Scorer, count: usize, seed: &str) -> Result<Vec<Submission>, ScoringError> {
    info!("Generating {:?} submissions with seed {:?}", count, seed);
    let mut stream = DigestStream::new(seed);
    let mut res: Vec<Submission> = Vec::with_capacity(count);
    let mut attempts: u64 = 0;
    let mut last_error = ScoringError::NotInsideTriangle;
    while res.len() < count {
        if attempts >= MAX_ATTEMPTS_PER_SAMPLE * (res.len() as u64 + 1) {
            return Err(last_error);
        }
        attempts += 1;
        let p = draw_point(&mut stream, scorer);
        // Points on an edge are not strictly inside.
        if !scorer.triangle().contains(&p) {
            continue;
        }
        let evaluation = scorer.evaluate(&p)?;
        match evaluation.verdict {
            Verdict::Accepted(scores) => {
                let country = SAMPLE_COUNTRIES[stream.next_index(SAMPLE_COUNTRIES.len())];
                let user_id = stream.next_user_id();
                debug!("generate: {} {} {:?}", user_id, country, scores);
                res.push(Submission::new(&user_id, Some(country), scores));
            }
            Verdict::Rejected(rejection) => {
                last_error = ScoringError::Rejected(rejection);
            }
        }
    }
    info!("Generated {:?} submissions in {:?} draws", res.len(), attempts);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScoringRules;
    use std::collections::HashSet;

    #[test]
    fn generation_is_deterministic() {
        let scorer = Scorer::default_poll(400.0).unwrap();
        let a = generate(&scorer, 20, "seed").unwrap();
        let b = generate(&scorer, 20, "seed").unwrap();
        let c = generate(&scorer, 20, "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn generated_submissions_are_accepted() {
        let scorer = Scorer::default_poll(400.0).unwrap();
        let subs = generate(&scorer, 50, "accepted").unwrap();
        assert_eq!(subs.len(), 50);
        let ids: HashSet<&str> = subs.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(ids.len(), 50);
        for s in subs.iter() {
            assert!(scorer.check_scores(&s.scores).is_accepted());
            assert!(SAMPLE_COUNTRIES.contains(&s.country.as_str()));
            assert_eq!(s.user_id.len(), 36);
        }
    }

    #[test]
    fn impossible_rules_fail_instead_of_looping() {
        // Only [4, 4, 4] sums to 12 with a minimum of 4. Scorer::new refuses such
        // rules, so the scorer is built directly.
        let rules = ScoringRules {
            min_score: 4,
            ..ScoringRules::DEFAULT_RULES
        };
        assert!(rules.check().is_err());
        let base = Scorer::default_poll(400.0).unwrap();
        let scorer = Scorer {
            triangle: base.triangle().clone(),
            categories: base.categories().clone(),
            rules,
        };
        assert!(matches!(
            generate(&scorer, 1, "strict"),
            Err(ScoringError::Rejected(_))
        ));
    }

    #[test]
    fn draws_stay_in_the_unit_interval() {
        let mut s = DigestStream::new("unit");
        for _ in 0..200 {
            let u = s.next_unit();
            assert!((0.0..1.0).contains(&u));
        }
    }
}
