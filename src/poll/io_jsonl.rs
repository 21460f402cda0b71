// A submission store on disk, one JSON object per line.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::poll::{
    io_common::{proximities_to_scores, scores_to_proximities, ProximityEntry},
    *,
};

/// One line of the store.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoredSubmission {
    pub id: u64,
    pub user_id: String,
    pub country: String,
    pub proximities: Vec<ProximityEntry>,
}

pub struct JsonLinesStore {
    path: String,
    categories: Categories,
    records: Vec<StoredSubmission>,
}

impl JsonLinesStore {
    /// A new empty store. Nothing is written until the first save.
    pub fn create(path: &str, categories: &Categories) -> JsonLinesStore {
        JsonLinesStore {
            path: path.to_string(),
            categories: categories.clone(),
            records: Vec::new(),
        }
    }

    /// Opens an existing store, or an empty one if the file does not exist yet.
    pub fn open(path: &str, categories: &Categories) -> PollResult<JsonLinesStore> {
        let mut store = JsonLinesStore::create(path, categories);
        if !Path::new(path).exists() {
            info!("JsonLinesStore: {:?} does not exist yet", path);
            return Ok(store);
        }
        let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredSubmission = serde_json::from_str(line).context(ParsingJsonLineSnafu {
                path,
                lineno: idx + 1,
            })?;
            if let Some(existing) = store.records.iter_mut().find(|r| r.user_id == record.user_id) {
                warn!(
                    "JsonLinesStore: line {}: user {:?} appears twice, keeping the last answer",
                    idx + 1,
                    record.user_id
                );
                *existing = record;
            } else {
                store.records.push(record);
            }
        }
        debug!("JsonLinesStore: {} records in {:?}", store.records.len(), path);
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Adds or replaces the answer of a participant, in memory only.
    pub fn insert(&mut self, submission: Submission) -> RecordOutcome {
        let proximities = scores_to_proximities(&self.categories.tag(&submission.scores));
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.user_id == submission.user_id)
        {
            existing.country = submission.country;
            existing.proximities = proximities;
            return RecordOutcome::Updated(existing.id);
        }
        let id = self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.records.push(StoredSubmission {
            id,
            user_id: submission.user_id,
            country: submission.country,
            proximities,
        });
        RecordOutcome::Created(id)
    }

    /// Writes the whole store to disk.
    ///
    /// The records go to a temporary file next to the store, which then replaces the
    /// store. A failed write leaves the previous store untouched.
    pub fn save(&self) -> PollResult<()> {
        let mut contents = String::new();
        for r in self.records.iter() {
            contents.push_str(serde_json::to_string(r).context(ParsingJsonSnafu {})?.as_str());
            contents.push('\n');
        }
        let tmp = temp_path_for(&self.path);
        let tmp_str = tmp.to_string_lossy().to_string();
        let written = write_synced(&tmp, contents.as_bytes())
            .context(WritingFileSnafu { path: tmp_str.as_str() })
            .and_then(|_| {
                fs::rename(&tmp, &self.path).context(WritingFileSnafu {
                    path: self.path.as_str(),
                })
            });
        if written.is_err() {
            warn!("JsonLinesStore: could not replace {:?}, keeping it as it was", self.path);
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

// "<file name>.<pid>.tmp" in the directory of the store, so that the rename stays on
// one file system.
fn temp_path_for(path: &str) -> PathBuf {
    let target = Path::new(path);
    let fname = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store.jsonl");
    let tmp_name = format!("{}.{}.tmp", fname, std::process::id());
    match target.parent() {
        Some(dir) => dir.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

impl SubmissionStore for JsonLinesStore {
    type Error = PollError;

    fn record(&mut self, submission: Submission) -> PollResult<RecordOutcome> {
        let outcome = self.insert(submission);
        self.save()?;
        Ok(outcome)
    }

    fn snapshot(&self) -> PollResult<Vec<Submission>> {
        self.records
            .iter()
            .map(|r| {
                let scores = proximities_to_scores(&r.proximities, &self.categories)?;
                Ok(Submission::new(
                    r.user_id.as_str(),
                    Some(r.country.as_str()),
                    scores,
                ))
            })
            .collect()
    }
}

pub fn read_jsonl_submissions(path: &str, categories: &Categories) -> PollResult<Vec<Submission>> {
    // Unlike a submission, tabulation needs an existing store.
    fs::metadata(path).context(OpeningFileSnafu { path })?;
    JsonLinesStore::open(path, categories)?.snapshot()
}
