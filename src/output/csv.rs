use super::{Formatter, iso8601_timestamp};
use crate::sps::SpCandidate;

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format(&self, candidate: &SpCandidate) -> String {
        format!(
            "{},{},{:.3},{:.9},{:.9},{:.9},{:.3}",
            iso8601_timestamp(),
            candidate.ident(),
            candidate.dm().as_pc_cm3(),
            candidate.tstart().as_secs(),
            candidate.tend().as_secs(),
            candidate.width().as_secs(),
            candidate.sigma()
        )
    }

    fn header(&self) -> Option<&'static str> {
        Some("ts,ident,dm,tstart,tend,width,sigma")
    }
}
