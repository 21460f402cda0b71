// Primitives for reading Excel exports.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::poll::{
    io_common::{get_col_index_mapping, make_default_id, row_to_submission},
    *,
};

/// Reads the submissions in the first worksheet of an Excel file. The first row is the
/// header.
pub fn read_xlsx_submissions(path: &str, categories: &Categories) -> PollResult<Vec<Submission>> {
    let default_id = make_default_id(path);

    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let header: Vec<Option<String>> = match iter.next() {
        Some(row) => row
            .iter()
            .map(|c| read_cell(c, 1))
            .collect::<PollResult<Vec<Option<String>>>>()?,
        None => {
            warn!("read_xlsx_submissions: {:?} is empty", path);
            return Ok(Vec::new());
        }
    };
    debug!("read_xlsx_submissions: header: {:?}", header);
    let mapping = get_col_index_mapping(&header, categories, path)?;

    let mut res: Vec<Submission> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let cells = row
            .iter()
            .map(|c| read_cell(c, lineno))
            .collect::<PollResult<Vec<Option<String>>>>()?;
        if let Some(s) = row_to_submission(&mapping, &cells, lineno, &default_id)? {
            res.push(s);
        }
    }
    info!("read_xlsx_submissions: {} submissions in {:?}", res.len(), path);
    Ok(res)
}

// Spreadsheets store whole numbers as floats.
fn read_cell(cell: &DataType, lineno: usize) -> PollResult<Option<String>> {
    match cell {
        DataType::String(s) => Ok(Some(s.clone())),
        DataType::Int(i) => Ok(Some(i.to_string())),
        DataType::Float(f) if f.fract() == 0.0 => Ok(Some(format!("{}", *f as i64))),
        DataType::Float(f) => Ok(Some(f.to_string())),
        DataType::Empty => Ok(None),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
