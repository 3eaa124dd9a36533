use std::io::{Read, Write};

use crate::stream::record::{RecordError, RecordReader};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InspectSummary {
    pub records: u64,
    pub payload_bytes: u64,
    pub largest: usize,
}

/// Walks a recorded stream and writes one `<index>\t<length>` line per record to `out`.
///
/// Stops at the first malformed record; everything listed before it is valid.
pub fn inspect_records<R: Read, W: Write>(
    input: R,
    out: &mut W,
    max_len: usize,
) -> Result<InspectSummary, RecordError> {
    let mut summary = InspectSummary::default();
    for payload in RecordReader::with_max_len(input, max_len) {
        let payload = payload?;
        writeln!(out, "{}\t{}", summary.records, payload.len())?;
        summary.records += 1;
        summary.payload_bytes += payload.len() as u64;
        summary.largest = summary.largest.max(payload.len());
    }
    out.flush()?;
    Ok(summary)
}
