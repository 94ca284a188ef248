//! Shared fixtures for unit tests.
use crate::record::DataRecord;

pub const FIVE_HIGHLIGHTS: &str = "Market leader in BFSI analytics\n\
     Recurring revenue above 70%\n\
     Blue-chip client base\n\
     Founder-led engineering culture\n\
     Expanding margins";

/// A record that satisfies every built-in requirement and raises no findings.
pub fn complete_record() -> DataRecord {
    let mut record = DataRecord::default();
    record.set("projectCodename", "Project Phoenix");
    record.set("companyName", "Acme Analytics");
    record.set("documentType", "management-presentation");
    record.set("companyDescription", "Data engineering services for banks.");
    record.set("investmentHighlights", FIVE_HIGHLIGHTS);
    record.set("founderName", "R. Mehta");
    record.set("serviceLines", "Data platforms|60%|Lakehouse builds");
    record.set("primaryVertical", "bfsi");
    record.set("currency", "INR");
    record.set("revenueFY24", 80.0);
    record.set("revenueFY25", 100.0);
    record.set("revenueFY26P", 140.0);
    record.set("ebitdaMarginFY25", 22.0);
    record
}
