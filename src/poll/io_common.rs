// Primitives shared by the readers and the store.

use std::collections::HashMap;
use std::path::Path;

use crate::poll::*;

/// The score of one label, as exchanged with the endpoints and stored on disk.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProximityEntry {
    pub label: String,
    pub proximity: i32,
}

pub fn scores_to_proximities(tagged: &[(String, i32)]) -> Vec<ProximityEntry> {
    tagged
        .iter()
        .map(|(label, proximity)| ProximityEntry {
            label: label.clone(),
            proximity: *proximity,
        })
        .collect()
}

/// Maps labelled scores back to a triple in category order.
///
/// Every label of the poll must be present exactly once, and no other label is allowed.
pub fn proximities_to_scores(
    entries: &[ProximityEntry],
    categories: &Categories,
) -> PollResult<ScoreTriple> {
    let mut values: [Option<i32>; 3] = [None; 3];
    for e in entries.iter() {
        let idx = match categories.index_of(e.label.as_str()) {
            Some(idx) => idx,
            None => {
                return InvalidRequestSnafu {
                    message: format!("Invalid label {:?} in proximities", e.label),
                }
                .fail()
            }
        };
        if values[idx].is_some() {
            return InvalidRequestSnafu {
                message: format!("Label {:?} appears more than once in proximities", e.label),
            }
            .fail();
        }
        values[idx] = Some(e.proximity);
    }
    let mut res = [0; 3];
    for (idx, v) in values.iter().enumerate() {
        res[idx] = (*v).context(InvalidRequestSnafu {
            message: format!(
                "Label {:?} missing in proximities",
                categories.label(idx).unwrap_or_default()
            ),
        })?;
    }
    Ok(ScoreTriple(res))
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Identifiers for the rows of a spreadsheet without a user id column.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

/// Where the fields of a submission are found in a row of a spreadsheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnMapping {
    pub user_id: Option<usize>,
    pub country: Option<usize>,
    /// The column of each label, in category order.
    pub scores: [usize; 3],
}

/// Given the header of a file (names of each of the columns), finds the column of each
/// field. The names are matched without regard to case or surrounding spaces.
pub fn get_col_index_mapping(
    header: &[Option<String>],
    categories: &Categories,
    path: &str,
) -> PollResult<ColumnMapping> {
    let col_names: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(idx, x)| x.as_ref().map(|s| (s.trim().to_lowercase(), idx)))
        .collect();
    debug!("get_col_index_mapping: col_names: {:?}", col_names);

    let mut scores = [0; 3];
    for (idx, label) in categories.labels().iter().enumerate() {
        scores[idx] = *col_names
            .get(&label.trim().to_lowercase())
            .context(MissingColumnSnafu {
                column: label,
                path,
            })?;
    }
    Ok(ColumnMapping {
        user_id: col_names.get("user_id").cloned(),
        country: col_names.get("country").cloned(),
        scores,
    })
}

pub fn parse_score(content: &str, lineno: usize) -> PollResult<i32> {
    let s = content.trim();
    if let Ok(x) = s.parse::<i32>() {
        return Ok(x);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() <= i32::MAX as f64 => Ok(f as i32),
        _ => InvalidScoreSnafu { lineno, content }.fail(),
    }
}

/// Turns one row of a spreadsheet into a submission.
///
/// Completely empty rows are skipped.
pub fn row_to_submission(
    mapping: &ColumnMapping,
    cells: &[Option<String>],
    lineno: usize,
    default_id: &impl Fn(usize) -> String,
) -> PollResult<Option<Submission>> {
    let cell = |idx: usize| {
        cells
            .get(idx)
            .and_then(|c| c.as_deref())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    };
    if (0..cells.len()).all(|idx| cell(idx).is_none()) {
        debug!("row_to_submission: skipping empty line {}", lineno);
        return Ok(None);
    }

    let user_id = match mapping.user_id.and_then(cell) {
        Some(u) => u.to_string(),
        None => default_id(lineno),
    };
    let country = mapping.country.and_then(cell);
    let mut scores = [0; 3];
    for (idx, col) in mapping.scores.iter().enumerate() {
        let content = cell(*col).unwrap_or_default();
        scores[idx] = parse_score(content, lineno)?;
    }
    debug!(
        "row_to_submission: line {}: {} {:?} {:?}",
        lineno, user_id, country, scores
    );
    Ok(Some(Submission::new(
        user_id.as_str(),
        country,
        ScoreTriple(scores),
    )))
}
