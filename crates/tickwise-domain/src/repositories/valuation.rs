use crate::entities::valuation::ValuationRecord;

pub trait ValuationRepository {
    fn load_valuations(&self) -> Result<Vec<ValuationRecord>, String>;
    fn append_valuation(&self, record: &ValuationRecord) -> Result<(), String>;
}
