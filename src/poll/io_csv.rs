// Primitives for reading CSV files.

use crate::poll::{
    io_common::{get_col_index_mapping, make_default_id, row_to_submission},
    *,
};

/// Reads the submissions of a CSV export. The first line is the header.
pub fn read_csv_submissions(path: &str, categories: &Categories) -> PollResult<Vec<Submission>> {
    let default_id = make_default_id(path);

    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<Option<String>> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1usize })?
            .iter()
            .map(|s| Some(s.to_string()))
            .collect(),
        None => {
            warn!("read_csv_submissions: {:?} is empty", path);
            return Ok(Vec::new());
        }
    };
    debug!("read_csv_submissions: header: {:?}", header);
    let mapping = get_col_index_mapping(&header, categories, path)?;

    let mut res: Vec<Submission> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<Option<String>> = line.iter().map(|s| Some(s.to_string())).collect();
        if let Some(s) = row_to_submission(&mapping, &cells, lineno, &default_id)? {
            res.push(s);
        }
    }
    info!("read_csv_submissions: {} submissions in {:?}", res.len(), path);
    Ok(res)
}
