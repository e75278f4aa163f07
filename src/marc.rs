//! MARC XML parsing for SRU search responses.
//!
//! Only the handful of fields needed to reconcile a search hit against the
//! title catalog are extracted: the control number (001), title (245$a),
//! imprint (260$b), author (100$a) and series (490$a). As with any MARC
//! lookup, only the first datafield with a given tag is consulted, and within
//! it only the first subfield with the wanted code.

use crate::error::{HoldingsError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use tracing::warn;

/// One bibliographic record from an SRU response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarcRecord {
    /// OCLC number (controlfield 001)
    pub control_number: Option<String>,
    /// 245$a
    pub title: Option<String>,
    /// 260$b
    pub imprint: Option<String>,
    /// 100$a
    pub author: Option<String>,
    /// 490$a
    pub series: Option<String>,
}

impl MarcRecord {
    fn slot(&mut self, tag: &str, code: &str) -> Option<&mut Option<String>> {
        match (tag, code) {
            ("245", "a") => Some(&mut self.title),
            ("260", "b") => Some(&mut self.imprint),
            ("100", "a") => Some(&mut self.author),
            ("490", "a") => Some(&mut self.series),
            _ => None,
        }
    }
}

/// Parsed SRU `searchRetrieveResponse`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SruResponse {
    /// Total hits reported by the service (may exceed `records.len()`)
    pub number_of_records: u64,
    pub records: Vec<MarcRecord>,
}

/// Parse an SRU response body containing MARC XML records.
///
/// # Errors
///
/// Returns a parse error for malformed XML or a missing `numberOfRecords`.
pub fn parse_sru_response(xml: &str) -> Result<SruResponse> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut number_of_records: Option<u64> = None;
    let mut records = Vec::new();

    let mut current: Option<MarcRecord> = None;
    let mut seen_tags: HashSet<String> = HashSet::new();
    let mut datafield: Option<String> = None;
    let mut subfield: Option<String> = None;
    let mut in_count = false;
    let mut in_control_number = false;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"numberOfRecords" => {
                    in_count = true;
                    text.clear();
                }
                b"recordData" => {
                    current = Some(MarcRecord::default());
                    seen_tags.clear();
                }
                b"controlfield" if current.is_some() => {
                    in_control_number = attribute(e, b"tag")?.as_deref() == Some("001");
                    text.clear();
                }
                b"datafield" if current.is_some() => {
                    let tag = attribute(e, b"tag")?.unwrap_or_default();
                    // Repeated tags are ignored
                    datafield = if seen_tags.insert(tag.clone()) { Some(tag) } else { None };
                }
                b"subfield" if datafield.is_some() => {
                    subfield = attribute(e, b"code")?;
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_count || in_control_number || subfield.is_some() {
                    let t = e
                        .unescape()
                        .map_err(|err| HoldingsError::Parse(format!("Bad XML text: {}", err)))?;
                    text.push_str(&t);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"numberOfRecords" => {
                    let count = text.trim().parse::<u64>().map_err(|err| {
                        HoldingsError::Parse(format!("Invalid numberOfRecords '{}': {}", text.trim(), err))
                    })?;
                    number_of_records = Some(count);
                    in_count = false;
                }
                b"controlfield" => {
                    if in_control_number {
                        if let Some(record) = current.as_mut() {
                            if record.control_number.is_none() {
                                record.control_number = Some(text.trim().to_string());
                            }
                        }
                    }
                    in_control_number = false;
                }
                b"subfield" => {
                    let code = subfield.take();
                    if let (Some(tag), Some(code), Some(record)) = (datafield.as_deref(), code, current.as_mut()) {
                        if let Some(slot) = record.slot(tag, &code) {
                            if slot.is_none() {
                                *slot = Some(text.clone());
                            }
                        }
                    }
                }
                b"datafield" => datafield = None,
                b"recordData" => {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                return Err(HoldingsError::Parse(format!("Invalid SRU response: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    let number_of_records = number_of_records
        .ok_or_else(|| HoldingsError::Parse("SRU response has no numberOfRecords".to_string()))?;

    Ok(SruResponse {
        number_of_records,
        records,
    })
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| HoldingsError::Parse(format!("Bad XML attribute: {}", err)))?;

    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| HoldingsError::Parse(format!("Bad XML attribute value: {}", err)))
    })
    .transpose()
}
