mod config_reader;
mod io_common;
mod io_csv;
mod io_jsonl;
mod io_xlsx;

use log::{debug, info, warn};

use proximity_scoring::builder::{RecordOutcome, SubmissionStore};
use proximity_scoring::synthetic;
use proximity_scoring::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::poll::config_reader::*;
use crate::poll::io_common::*;
use crate::poll::io_jsonl::JsonLinesStore;

#[derive(Debug, Snafu)]
pub enum PollError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    ParsingJsonLine {
        source: serde_json::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Unexpected cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Missing column {column} in the header of {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno}: {content:?} is not a valid score"))]
    InvalidScore { lineno: usize, content: String },
    #[snafu(display("Invalid submit request: {message}"))]
    InvalidRequest { message: String },
    #[snafu(display("Scoring failed"))]
    Scoring { source: ScoringError },
    #[snafu(display("Tabulation failed"))]
    Aggregation { source: AggregationError },
    #[snafu(display("{message}"))]
    SelectionRejected { message: String },
    #[snafu(display("Difference detected between the tabulated results and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PollResult<T> = Result<T, PollError>;

// ********* Submission endpoint **********

/// The body of a request to the submission endpoint.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Option<String>,
    pub country: Option<String>,
    pub proximities: Option<Vec<ProximityEntry>>,
}

/// Applies the server-side checks to a submit request.
///
/// The scores are not trusted: they go through the same acceptance rules as a point
/// selected on the canvas.
pub fn accept_request(request: &SubmitRequest, scorer: &Scorer) -> PollResult<Submission> {
    let user_id = match request.user_id.as_deref().map(|s| s.trim()) {
        Some(u) if !u.is_empty() => u,
        _ => {
            return InvalidRequestSnafu {
                message: "User ID missing",
            }
            .fail()
        }
    };
    let entries = match &request.proximities {
        Some(l) if !l.is_empty() => l,
        _ => {
            return InvalidRequestSnafu {
                message: "Proximities data missing",
            }
            .fail()
        }
    };
    let scores = proximities_to_scores(entries, scorer.categories())?;
    match scorer.check_scores(&scores) {
        Verdict::Accepted(scores) => Ok(Submission::new(
            user_id,
            request.country.as_deref(),
            scores,
        )),
        Verdict::Rejected(rejection) => {
            warn!("accept_request: user {}: {}", user_id, rejection);
            SelectionRejectedSnafu {
                message: rejection.user_message(),
            }
            .fail()
        }
    }
}

fn point_submission(
    poll: &Poll,
    user_id: Option<&str>,
    country: Option<&str>,
    x: Option<f64>,
    y: Option<f64>,
) -> PollResult<Submission> {
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            whatever!("Both --x and --y are required when no request is given")
        }
    };
    let request_user = match user_id.map(|s| s.trim()) {
        Some(u) if !u.is_empty() => u,
        _ => {
            return InvalidRequestSnafu {
                message: "User ID missing",
            }
            .fail()
        }
    };
    let evaluation = poll
        .scorer
        .evaluate(&Point::new(x, y))
        .context(ScoringSnafu {})?;
    match evaluation.verdict {
        Verdict::Accepted(scores) => Ok(Submission::new(request_user, country, scores)),
        Verdict::Rejected(rejection) => SelectionRejectedSnafu {
            message: rejection.user_message(),
        }
        .fail(),
    }
}

fn read_request(path: &str) -> PollResult<SubmitRequest> {
    let contents = if path == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context(OpeningFileSnafu { path })?;
        s
    } else {
        fs::read_to_string(path).context(OpeningFileSnafu { path })?
    };
    debug!("read_request: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

fn outcome_to_json(outcome: &RecordOutcome) -> JSValue {
    json!({"id": outcome.id(), "message": outcome.message()})
}

// ********* Results endpoint **********

fn averages_to_json(averages: &[(String, f64)]) -> Vec<JSValue> {
    averages
        .iter()
        .map(|(label, average)| json!({"label": label, "average": average}))
        .collect()
}

/// The per-country list, in the shape returned by the results endpoint.
fn results_to_json(results: &SurveyResults) -> JSValue {
    let l: Vec<JSValue> = results
        .countries
        .iter()
        .map(|c| {
            json!({
                "country": c.country,
                "participantCount": c.participant_count,
                "proximities": averages_to_json(&c.averages)
            })
        })
        .collect();
    JSValue::Array(l)
}

// The global averages, each with its share of the total in percent.
fn global_to_json(global: &GlobalAggregate) -> JSValue {
    let proximities: Vec<JSValue> = global
        .averages
        .iter()
        .zip(global.shares.iter())
        .map(|((label, average), (_, share))| {
            json!({"label": label, "average": average, "share": share})
        })
        .collect();
    json!({
        "participantCount": global.participant_count,
        "proximities": proximities
    })
}

fn build_summary_js(title: &str, results: &SurveyResults) -> JSValue {
    let global = results.global.as_ref().map(global_to_json);
    json!({
        "title": title,
        "results": results_to_json(results),
        "global": global
    })
}

fn read_submissions(
    path: &str,
    input_type: &str,
    categories: &Categories,
) -> PollResult<Vec<Submission>> {
    info!("Attempting to read {} file {:?}", input_type, path);
    match input_type {
        "jsonl" => io_jsonl::read_jsonl_submissions(path, categories),
        "csv" => io_csv::read_csv_submissions(path, categories),
        "xlsx" => io_xlsx::read_xlsx_submissions(path, categories),
        x => {
            whatever!("Input type not supported: {:?}", x)
        }
    }
}

// The tabulation counts every row; rows that the endpoint would have refused are reported.
fn check_submissions(submissions: &[Submission], scorer: &Scorer) -> usize {
    let mut refused = 0;
    for s in submissions.iter() {
        if let Verdict::Rejected(rejection) = scorer.check_scores(&s.scores) {
            warn!(
                "check_submissions: user {}: {} (counted anyway)",
                s.user_id, rejection
            );
            refused += 1;
        }
    }
    refused
}

fn compare_with_reference(rendered: &str, reference_path: &str) -> PollResult<()> {
    let contents =
        fs::read_to_string(reference_path).context(OpeningFileSnafu {
            path: reference_path,
        })?;
    let reference: JSValue =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("compare_with_reference: reference: {:?}", reference);
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    if pretty_reference != rendered {
        warn!("Found differences with the reference string");
        print_diff(pretty_reference.as_str(), rendered, "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("The results match the reference {:?}", reference_path);
    Ok(())
}

fn write_output(out: Option<&str>, contents: &str) -> PollResult<()> {
    match out {
        None | Some("") | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            info!("Writing output to {:?}", path);
            fs::write(path, contents).context(WritingFileSnafu { path })
        }
    }
}

// ********* Commands **********

pub fn run_score(poll: &Poll, point: Point) -> PollResult<JSValue> {
    let scorer = &poll.scorer;
    let (width, height) = Triangle::canvas_size(poll.side_length);
    let vertices: Vec<JSValue> = scorer
        .categories()
        .iter()
        .zip(scorer.triangle().vertices().iter())
        .zip(scorer.triangle().label_anchors(scorer.categories()).iter())
        .map(|((c, v), (_, anchor))| {
            json!({
                "text": c.label,
                "position": c.position.as_str(),
                "x": v.x,
                "y": v.y,
                "labelAnchor": {"x": anchor.x, "y": anchor.y}
            })
        })
        .collect();
    let canvas = json!({"width": width, "height": height, "vertices": vertices});

    let evaluation = match scorer.evaluate(&point) {
        Ok(evaluation) => evaluation,
        Err(ScoringError::NotInsideTriangle) => {
            info!("run_score: {:?} is not inside the triangle", point);
            return Ok(json!({
                "title": poll.title,
                "canvas": canvas,
                "point": {"x": point.x, "y": point.y},
                "inside": false,
                "message": ScoringError::NotInsideTriangle.to_string()
            }));
        }
        Err(e) => return Err(e).context(ScoringSnafu {}),
    };
    let categories = scorer.categories();
    let raw = categories.tag(&ScoreTriple(evaluation.raw));
    let normalized = categories.tag(&evaluation.normalized);
    let (accepted, message) = match &evaluation.verdict {
        Verdict::Accepted(_) => (true, None),
        Verdict::Rejected(r) => (false, Some(r.user_message())),
    };
    Ok(json!({
        "title": poll.title,
        "canvas": canvas,
        "point": {"x": point.x, "y": point.y},
        "inside": true,
        "raw": scores_to_proximities(&raw),
        "normalized": scores_to_proximities(&normalized),
        "accepted": accepted,
        "message": message
    }))
}

pub fn run_submit(
    poll: &Poll,
    store_path: &str,
    submission: Submission,
) -> PollResult<RecordOutcome> {
    let mut store = JsonLinesStore::open(store_path, poll.scorer.categories())?;
    let outcome = store.record(submission)?;
    info!("run_submit: {:?} in {:?}", outcome, store_path);
    Ok(outcome)
}

pub fn run_results(
    poll: &Poll,
    input: &str,
    input_type: Option<&str>,
    api: bool,
) -> PollResult<(SurveyResults, JSValue)> {
    let categories = poll.scorer.categories();
    let submissions = read_submissions(input, input_type.unwrap_or("jsonl"), categories)?;
    let refused = check_submissions(&submissions, &poll.scorer);
    if refused > 0 {
        warn!(
            "{} of {} submissions do not satisfy the acceptance rules",
            refused,
            submissions.len()
        );
    }
    let results = summarize(&submissions, categories).context(AggregationSnafu {})?;
    if results.is_empty() {
        info!("No data yet in {:?}", input);
    }
    let js = if api {
        results_to_json(&results)
    } else {
        build_summary_js(&poll.title, &results)
    };
    Ok((results, js))
}

pub fn run_generate(poll: &Poll, count: usize, seed: &str, out: &str) -> PollResult<usize> {
    let submissions = synthetic::generate(&poll.scorer, count, seed).context(ScoringSnafu {})?;
    let mut store = JsonLinesStore::create(out, poll.scorer.categories());
    for s in submissions {
        store.insert(s);
    }
    store.save()?;
    info!("Wrote {} submissions to {:?}", store.len(), out);
    Ok(store.len())
}

pub fn run(args: &Args) -> PollResult<()> {
    let poll = read_config(args.config.as_deref())?;
    debug!("run: poll: {:?}", poll);

    match &args.command {
        Command::Score { x, y } => {
            let js = run_score(&poll, Point::new(*x, *y))?;
            let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
            println!("{}", pretty);
        }
        Command::Submit {
            store,
            user_id,
            country,
            x,
            y,
            request,
        } => {
            let submission = match request {
                Some(path) => accept_request(&read_request(path)?, &poll.scorer)?,
                None => point_submission(&poll, user_id.as_deref(), country.as_deref(), *x, *y)?,
            };
            let outcome = run_submit(&poll, store, submission)?;
            println!("{}", outcome_to_json(&outcome));
        }
        Command::Results {
            input,
            input_type,
            out,
            reference,
            api,
        } => {
            let (_, js) = run_results(&poll, input, input_type.as_deref(), *api)?;
            let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
            write_output(out.as_deref(), &pretty)?;
            if let Some(reference_path) = reference {
                compare_with_reference(&pretty, reference_path)?;
            }
        }
        Command::Generate { count, seed, out } => {
            run_generate(&poll, *count, seed, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn poll() -> Poll {
        default_poll().unwrap()
    }

    fn entries(values: &[(&str, i32)]) -> Option<Vec<ProximityEntry>> {
        Some(
            values
                .iter()
                .map(|(label, proximity)| ProximityEntry {
                    label: label.to_string(),
                    proximity: *proximity,
                })
                .collect(),
        )
    }

    fn request(user_id: Option<&str>, values: &[(&str, i32)]) -> SubmitRequest {
        SubmitRequest {
            user_id: user_id.map(|s| s.to_string()),
            country: None,
            proximities: entries(values),
        }
    }

    #[test]
    fn request_is_accepted() {
        init();
        let p = poll();
        let req = request(Some("u1"), &[("Work", 2), ("Salary", 7), ("People", 3)]);
        let s = accept_request(&req, &p.scorer).unwrap();
        assert_eq!(s.scores, ScoreTriple([7, 3, 2]));
        assert_eq!(s.country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn request_checks() {
        init();
        let p = poll();
        let ok = [("Salary", 7), ("People", 3), ("Work", 2)];
        assert!(matches!(
            accept_request(&request(None, &ok), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
        assert!(matches!(
            accept_request(&request(Some("  "), &ok), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
        assert!(matches!(
            accept_request(&request(Some("u1"), &[]), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
        let unknown = [("Salary", 7), ("People", 3), ("Money", 2)];
        assert!(matches!(
            accept_request(&request(Some("u1"), &unknown), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
        let twice = [("Salary", 7), ("Salary", 3), ("Work", 2)];
        assert!(matches!(
            accept_request(&request(Some("u1"), &twice), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
        let missing = [("Salary", 10), ("Work", 2)];
        assert!(matches!(
            accept_request(&request(Some("u1"), &missing), &p.scorer),
            Err(PollError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn indecisive_request_is_rejected_with_the_breakdown() {
        let p = poll();
        let req = request(Some("u1"), &[("Salary", 4), ("People", 4), ("Work", 4)]);
        match accept_request(&req, &p.scorer) {
            Err(PollError::SelectionRejected { message }) => {
                assert!(message.contains("Salary: 4/10\nPeople: 4/10\nWork: 4/10"))
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn request_parses_from_json() {
        let js = r#"{"user_id": "u1", "country": "Japan",
                     "proximities": [{"label": "Salary", "proximity": 10},
                                     {"label": "People", "proximity": 1},
                                     {"label": "Work", "proximity": 1}]}"#;
        let req: SubmitRequest = serde_json::from_str(js).unwrap();
        let s = accept_request(&req, &poll().scorer).unwrap();
        assert_eq!(s.country, "Japan");
        assert_eq!(s.scores, ScoreTriple([10, 1, 1]));
    }

    #[test]
    fn submitting_twice_updates_the_store() {
        init();
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let path = path.to_str().unwrap();
        let p = poll();
        let top = p.scorer.triangle().vertices()[0];

        let s1 = point_submission(
            &p,
            Some("u1"),
            Some("Japan"),
            Some(top.x),
            Some(top.y + 10.0),
        )
        .unwrap();
        let first = run_submit(&p, path, s1).unwrap();
        assert_eq!(first, RecordOutcome::Created(1));
        assert_eq!(
            outcome_to_json(&first),
            json!({"id": 1, "message": "Selection submitted successfully."})
        );

        let req = SubmitRequest {
            user_id: Some("u1".to_string()),
            country: Some("Brazil".to_string()),
            proximities: entries(&[("Salary", 1), ("People", 10), ("Work", 1)]),
        };
        let second = run_submit(&p, path, accept_request(&req, &p.scorer).unwrap()).unwrap();
        assert_eq!(second, RecordOutcome::Updated(1));
        assert_eq!(outcome_to_json(&second)["message"], "Selection updated successfully.");

        let (results, _) = run_results(&p, path, None, false).unwrap();
        assert_eq!(results.countries.len(), 1);
        assert_eq!(results.countries[0].country, "Brazil");
    }

    #[test]
    fn centroid_submission_is_rejected() {
        let p = poll();
        let c = p.scorer.triangle().centroid();
        assert!(matches!(
            point_submission(&p, Some("u1"), None, Some(c.x), Some(c.y)),
            Err(PollError::SelectionRejected { .. })
        ));
        assert!(matches!(
            point_submission(&p, Some("u1"), None, Some(0.0), Some(0.0)),
            Err(PollError::Scoring {
                source: ScoringError::NotInsideTriangle
            })
        ));
    }

    #[test]
    fn global_summary_has_shares() {
        let subs = vec![
            Submission::new("u1", Some("Portugal"), ScoreTriple([8, 2, 2])),
            Submission::new("u2", Some("Portugal"), ScoreTriple([4, 4, 4])),
            Submission::new("u3", Some("Canada"), ScoreTriple([2, 2, 8])),
        ];
        let results = summarize(&subs, &Categories::default_poll()).unwrap();
        let js = build_summary_js("t", &results);
        let salary = &js["global"]["proximities"][0];
        assert_eq!(salary["label"], "Salary");
        // Averages [4.67, 2.67, 4.67] over a total of 12.
        let share = salary["share"].as_f64().unwrap();
        assert!((share - 38.89).abs() < 1e-2);
        let shares: f64 = js["global"]["proximities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["share"].as_f64().unwrap())
            .sum();
        assert!((shares - 100.0).abs() < 1e-9);
        // Countries only report averages.
        assert_eq!(js["results"][0]["proximities"][0].get("share"), None);
    }

    #[test]
    fn empty_store_gives_empty_results() {
        init();
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "").unwrap();
        let p = poll();
        let (results, js) = run_results(&p, path.to_str().unwrap(), None, false).unwrap();
        assert!(results.is_empty());
        assert_eq!(js["results"], json!([]));
        assert_eq!(js["global"], JSValue::Null);

        let (_, api) = run_results(&p, path.to_str().unwrap(), Some("jsonl"), true).unwrap();
        assert_eq!(api, json!([]));
    }

    #[test]
    fn generated_store_is_tabulated() {
        init();
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.jsonl");
        let path = path.to_str().unwrap();
        let p = poll();
        assert_eq!(run_generate(&p, 40, "test", path).unwrap(), 40);
        let (results, js) = run_results(&p, path, None, false).unwrap();
        let total: u64 = results.countries.iter().map(|c| c.participant_count).sum();
        assert_eq!(total, 40);
        assert_eq!(js["global"]["participantCount"], 40);
        assert_eq!(js["title"], DEFAULT_TITLE);
        assert_eq!(
            js["results"][0]["proximities"][0]["label"],
            JSValue::String("Salary".to_string())
        );
    }

    #[test]
    fn reference_comparison() {
        let dir = tempdir().unwrap();
        let p = poll();
        let store = dir.path().join("sample.jsonl");
        run_generate(&p, 10, "reference", store.to_str().unwrap()).unwrap();
        let (_, js) = run_results(&p, store.to_str().unwrap(), None, false).unwrap();
        let pretty = serde_json::to_string_pretty(&js).unwrap();

        let reference = dir.path().join("reference.json");
        let reference_path = reference.to_str().unwrap();
        write_output(Some(reference_path), &pretty).unwrap();
        assert!(compare_with_reference(&pretty, reference_path).is_ok());

        fs::write(&reference, "{\"results\": []}").unwrap();
        assert!(matches!(
            compare_with_reference(&pretty, reference_path),
            Err(PollError::ReferenceMismatch { .. })
        ));
    }

    #[test]
    fn score_reports_the_breakdown() {
        let p = poll();
        let c = p.scorer.triangle().centroid();
        let js = run_score(&p, c).unwrap();
        assert_eq!(js["inside"], true);
        assert_eq!(js["accepted"], false);
        assert_eq!(js["raw"][0], json!({"label": "Salary", "proximity": 4}));
        assert_eq!(js["canvas"]["vertices"][1]["position"], "left");

        let outside = run_score(&p, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(outside["inside"], false);
        assert_eq!(
            outside["message"],
            "Click inside the triangle to select a position"
        );
    }

    #[test]
    fn unknown_input_type_is_an_error() {
        let p = poll();
        assert!(matches!(
            run_results(&p, "whatever", Some("parquet"), false),
            Err(PollError::Whatever { .. })
        ));
    }
}
