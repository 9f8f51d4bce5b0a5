use serde::Serialize;

use super::{Formatter, iso8601_timestamp};
use crate::sps::SpCandidate;

pub struct JsonFormatter;

#[derive(Serialize)]
struct Record<'a> {
    ts: String,
    #[serde(flatten)]
    candidate: &'a SpCandidate,
}

impl Formatter for JsonFormatter {
    fn format(&self, candidate: &SpCandidate) -> String {
        let record = Record {
            ts: iso8601_timestamp(),
            candidate,
        };
        serde_json::to_string(&record).unwrap_or_else(|e| {
            log::error!("Could not serialise candidate {}: {}", candidate.ident(), e);
            String::new()
        })
    }
}
