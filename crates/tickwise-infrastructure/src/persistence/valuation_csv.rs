use super::{append_row, open_reader};
use std::path::{Path, PathBuf};
use tickwise_domain::entities::valuation::ValuationRecord;
use tickwise_domain::repositories::valuation::ValuationRepository;

const HEADER: [&str; 5] = [
    "timestamp",
    "total_value",
    "total_cost",
    "total_pl",
    "total_pl_pct",
];

/// Portfolio value history, one row per stored snapshot.
#[derive(Debug, Clone)]
pub struct CsvValuationRepository {
    path: PathBuf,
}

impl CsvValuationRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ValuationRepository for CsvValuationRepository {
    fn load_valuations(&self) -> Result<Vec<ValuationRecord>, String> {
        let Some(mut rdr) = open_reader(&self.path)? else {
            return Ok(Vec::new());
        };
        rdr.deserialize::<ValuationRecord>()
            .enumerate()
            .map(|(idx, result)| {
                result.map_err(|err| {
                    format!(
                        "failed to parse {} line {}: {}",
                        self.path.display(),
                        idx + 2,
                        err
                    )
                })
            })
            .collect()
    }

    fn append_valuation(&self, record: &ValuationRecord) -> Result<(), String> {
        let row = [
            record.timestamp.to_string(),
            record.total_value.to_string(),
            record.total_cost.to_string(),
            record.total_pl.to_string(),
            record.total_pl_pct.to_string(),
        ];
        append_row(&self.path, &HEADER, &row)
    }
}
