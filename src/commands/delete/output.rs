use super::execute::DeleteResult;
use crate::output::Outputable;

impl Outputable for DeleteResult {
    fn to_table(&self) -> String {
        format!("Deleted: {}", self.transcript)
    }
}
