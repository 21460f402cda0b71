use crate::poll::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "What matters most to you at work?";
pub const DEFAULT_SIDE_LENGTH: f64 = 400.0;

// The order of the vertices of the triangle.
const VERTEX_POSITIONS: [LabelPosition; 3] =
    [LabelPosition::Top, LabelPosition::Left, LabelPosition::Right];

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollVertex {
    pub text: String,
    pub position: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollRules {
    #[serde(rename = "targetTotal")]
    pub target_total: Option<i32>,
    #[serde(rename = "minScore")]
    pub min_score: Option<i32>,
    #[serde(rename = "maxScore")]
    pub max_score: Option<i32>,
    #[serde(rename = "decisivenessThreshold")]
    pub decisiveness_threshold: Option<i32>,
    #[serde(rename = "hitRadius")]
    pub hit_radius: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub title: String,
    pub vertices: Vec<PollVertex>,
    #[serde(rename = "sideLength")]
    pub side_length: Option<f64>,
    pub rules: Option<PollRules>,
}

/// A validated poll, ready to score points.
#[derive(PartialEq, Debug, Clone)]
pub struct Poll {
    pub title: String,
    pub side_length: f64,
    pub scorer: Scorer,
}

pub fn default_poll() -> PollResult<Poll> {
    let scorer = Scorer::default_poll(DEFAULT_SIDE_LENGTH).context(ScoringSnafu {})?;
    Ok(Poll {
        title: DEFAULT_TITLE.to_string(),
        side_length: DEFAULT_SIDE_LENGTH,
        scorer,
    })
}

/// Reads and validates the configuration file, or returns the default poll.
pub fn read_config(path: Option<&str>) -> PollResult<Poll> {
    let path = match path {
        Some(p) => p,
        None => {
            info!("No configuration file, using the default poll");
            return default_poll();
        }
    };
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: PollConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    info!("config: {:?}", config);
    validate_config(&config)
}

pub fn validate_config(config: &PollConfig) -> PollResult<Poll> {
    let rules = validate_rules(&config.rules)?;

    if config.vertices.len() != 3 {
        whatever!(
            "A poll needs exactly 3 vertices, {} found",
            config.vertices.len()
        )
    }
    let mut categories: Vec<Category> = Vec::new();
    for (v, expected) in config.vertices.iter().zip(VERTEX_POSITIONS.iter()) {
        let position = match LabelPosition::parse(v.position.as_str()) {
            Some(p) => p,
            None => {
                whatever!(
                    "Unknown position {:?} for vertex {:?}: expected top, left or right",
                    v.position,
                    v.text
                )
            }
        };
        if position != *expected {
            whatever!(
                "Vertex {:?} is at position {:?} but the vertices must be given in the order top, left, right",
                v.text,
                v.position
            )
        }
        categories.push(Category {
            label: v.text.trim().to_string(),
            position,
        });
    }
    let categories = Categories::new(categories).context(ScoringSnafu {})?;

    let side_length = config.side_length.unwrap_or(DEFAULT_SIDE_LENGTH);
    let triangle = Triangle::equilateral(side_length).context(ScoringSnafu {})?;
    let scorer = Scorer::new(triangle, categories, &rules).context(ScoringSnafu {})?;
    Ok(Poll {
        title: config.title.clone(),
        side_length,
        scorer,
    })
}

pub fn validate_rules(poll_rules: &Option<PollRules>) -> PollResult<ScoringRules> {
    let d = ScoringRules::DEFAULT_RULES;
    let res = match poll_rules {
        None => d,
        Some(r) => ScoringRules {
            target_total: r.target_total.unwrap_or(d.target_total),
            min_score: r.min_score.unwrap_or(d.min_score),
            max_score: r.max_score.unwrap_or(d.max_score),
            decisiveness_threshold: r.decisiveness_threshold.unwrap_or(d.decisiveness_threshold),
            hit_radius: r.hit_radius.unwrap_or(d.hit_radius),
        },
    };
    res.check().context(ScoringSnafu {})?;
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> PollConfig {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn full_config() {
        let config = parse(
            r#"{
            "title": "Pick one",
            "vertices": [
                {"text": "Speed", "position": "top"},
                {"text": "Cost", "position": "left"},
                {"text": "Quality", "position": "right"}
            ],
            "sideLength": 300,
            "rules": {"decisivenessThreshold": 8}
        }"#,
        );
        let poll = validate_config(&config).unwrap();
        assert_eq!(poll.title, "Pick one");
        assert_eq!(poll.side_length, 300.0);
        assert_eq!(poll.scorer.categories().labels(), vec!["Speed", "Cost", "Quality"]);
        assert_eq!(poll.scorer.rules().decisiveness_threshold, 8);
        assert_eq!(poll.scorer.rules().target_total, 12);
    }

    #[test]
    fn vertices_must_follow_the_triangle() {
        let config = parse(
            r#"{"title": "t", "vertices": [
                {"text": "A", "position": "left"},
                {"text": "B", "position": "top"},
                {"text": "C", "position": "right"}]}"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(PollError::Whatever { .. })
        ));

        let two = parse(
            r#"{"title": "t", "vertices": [
                {"text": "A", "position": "top"},
                {"text": "B", "position": "left"}]}"#,
        );
        assert!(validate_config(&two).is_err());
    }

    #[test]
    fn duplicate_labels_are_refused() {
        let config = parse(
            r#"{"title": "t", "vertices": [
                {"text": "A", "position": "top"},
                {"text": "A", "position": "left"},
                {"text": "C", "position": "right"}]}"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(PollError::Scoring {
                source: ScoringError::DuplicateLabel(_)
            })
        ));
    }

    #[test]
    fn invalid_rules_are_refused() {
        let rules = Some(PollRules {
            target_total: Some(40),
            min_score: None,
            max_score: None,
            decisiveness_threshold: None,
            hit_radius: None,
        });
        assert!(matches!(
            validate_rules(&rules),
            Err(PollError::Scoring {
                source: ScoringError::UnreachableTarget { .. }
            })
        ));
        assert_eq!(validate_rules(&None).unwrap(), ScoringRules::DEFAULT_RULES);
    }

    #[test]
    fn rules_that_accept_nothing_are_refused() {
        let config = parse(
            r#"{"title": "t", "vertices": [
                {"text": "A", "position": "top"},
                {"text": "B", "position": "left"},
                {"text": "C", "position": "right"}],
                "rules": {"targetTotal": 9, "decisivenessThreshold": 8}}"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(PollError::Scoring {
                source: ScoringError::InvalidRules(_)
            })
        ));

        let config = parse(
            r#"{"title": "t", "vertices": [
                {"text": "A", "position": "top"},
                {"text": "B", "position": "left"},
                {"text": "C", "position": "right"}],
                "rules": {"minScore": 1000000000, "maxScore": 1000000000}}"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(PollError::Scoring {
                source: ScoringError::UnreachableTarget { .. }
            })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_config(Some("/nonexistent/poll.json")),
            Err(PollError::OpeningFile { .. })
        ));
        assert_eq!(read_config(None).unwrap().title, DEFAULT_TITLE);
    }
}
