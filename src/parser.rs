//! O&M observation document parser.
//!
//! Reads `om:Observation` elements, alone or inside an
//! `om:ObservationCollection`, into [`ObservationRecord`]s. Elements are
//! matched on local names so any namespace prefix is accepted.

use std::fs;
use std::path::Path;

use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::codec::parse_timestamp;
use crate::error::{Result, SosError};
use crate::model::{
    DataArray, Encoding, EncodingSpec, ObservationRecord, ResultEntry, TimeInterval, Timestamp,
};

#[derive(Debug, Default)]
struct ObservationBuilder {
    id: Option<String>,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
    procedure: Option<String>,
    observed_property: Option<String>,
    feature_of_interest: Option<String>,
    result_href: Option<String>,
    has_array: bool,
    element_count: Option<usize>,
    encoding: Option<Encoding>,
    values: Option<String>,
}

impl ObservationBuilder {
    fn finish(self) -> Result<ObservationRecord> {
        let id = self.id.ok_or_else(|| {
            SosError::InvalidDocument("observation without gml:id".to_string())
        })?;

        let result = if self.has_array {
            ResultEntry::Array(DataArray {
                element_count: self.element_count,
                encoding: self.encoding.unwrap_or_default(),
                values: self.values.unwrap_or_default(),
            })
        } else if let Some(href) = self.result_href {
            ResultEntry::Reference(href)
        } else {
            return Err(SosError::InvalidDocument(format!(
                "observation {} has neither a data array nor a result reference",
                id
            )));
        };

        Ok(ObservationRecord {
            id,
            sampling_time: TimeInterval {
                begin: self.begin,
                end: self.end,
            },
            procedure: self.procedure,
            observed_property: self.observed_property,
            feature_of_interest: self.feature_of_interest,
            result,
        })
    }
}

fn attribute(element: &BytesStart, local_name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn text_block_spec(element: &BytesStart) -> Result<EncodingSpec> {
    let defaults = EncodingSpec::default();
    Ok(EncodingSpec {
        block_separator: attribute(element, b"blockSeparator")?
            .unwrap_or(defaults.block_separator),
        token_separator: attribute(element, b"tokenSeparator")?
            .unwrap_or(defaults.token_separator),
        decimal_separator: attribute(element, b"decimalSeparator")?
            .unwrap_or(defaults.decimal_separator),
    })
}

/// Reads a GML time position. Zoned positions keep their wall-clock time.
pub(crate) fn parse_time_value(text: &str) -> Option<Timestamp> {
    parse_timestamp(text).ok().or_else(|| {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| t.naive_local())
    })
}

/// Time position text; empty text is an open bound.
fn parse_time_position(text: &str) -> Result<Option<Timestamp>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    parse_time_value(text)
        .map(Some)
        .ok_or_else(|| SosError::InvalidDocument(format!("invalid time position '{}'", text)))
}

#[derive(Debug, Default)]
struct ParseState {
    current: Option<ObservationBuilder>,
    in_encoding: bool,
    in_element_count: bool,
}

impl ParseState {
    fn start(&mut self, element: &BytesStart) -> Result<()> {
        let name = element.local_name();
        let name = name.as_ref();

        if name == b"Observation" {
            if self.current.is_some() {
                warn!("Nested <Observation> ignored");
                return Ok(());
            }
            let id = attribute(element, b"id")?;
            debug!("Entering observation {:?}", id);
            self.current = Some(ObservationBuilder {
                id,
                ..Default::default()
            });
            return Ok(());
        }

        let Some(builder) = self.current.as_mut() else {
            return Ok(());
        };

        match name {
            b"procedure" => {
                if let Some(href) = attribute(element, b"href")? {
                    builder.procedure = Some(href);
                }
            }
            b"observedProperty" => {
                if let Some(href) = attribute(element, b"href")? {
                    builder.observed_property = Some(href);
                }
            }
            b"featureOfInterest" => {
                if let Some(href) = attribute(element, b"href")? {
                    builder.feature_of_interest = Some(href);
                }
            }
            b"result" => {
                builder.result_href = attribute(element, b"href")?;
            }
            b"DataArray" => builder.has_array = true,
            b"elementCount" => self.in_element_count = true,
            b"encoding" => self.in_encoding = true,
            b"TextBlock" if self.in_encoding => {
                builder.encoding = Some(Encoding::TextBlock(text_block_spec(element)?));
            }
            other if self.in_encoding && builder.encoding.is_none() => {
                let encoding_name = String::from_utf8_lossy(other).into_owned();
                debug!("Non-text encoding <{}>", encoding_name);
                builder.encoding = Some(Encoding::Other(encoding_name));
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8], text: &str, records: &mut Vec<ObservationRecord>) -> Result<()> {
        if name == b"Observation" {
            if let Some(builder) = self.current.take() {
                let record = builder.finish()?;
                debug!("Parsed observation {}", record.id);
                records.push(record);
            }
            return Ok(());
        }

        let Some(builder) = self.current.as_mut() else {
            return Ok(());
        };
        let text = text.trim();

        match name {
            b"beginPosition" => builder.begin = parse_time_position(text)?,
            b"endPosition" => builder.end = parse_time_position(text)?,
            b"timePosition" => {
                let t = parse_time_position(text)?;
                builder.begin = t;
                builder.end = t;
            }
            b"procedure" if builder.procedure.is_none() && !text.is_empty() => {
                builder.procedure = Some(text.to_string());
            }
            b"observedProperty" if builder.observed_property.is_none() && !text.is_empty() => {
                builder.observed_property = Some(text.to_string());
            }
            b"featureOfInterest" if builder.feature_of_interest.is_none() && !text.is_empty() => {
                builder.feature_of_interest = Some(text.to_string());
            }
            b"value" if self.in_element_count => match text.parse() {
                Ok(count) => builder.element_count = Some(count),
                Err(_) => warn!("Ignoring invalid elementCount '{}'", text),
            },
            b"elementCount" => self.in_element_count = false,
            b"encoding" => self.in_encoding = false,
            b"values" => builder.values = Some(text.to_string()),
            _ => {}
        }
        Ok(())
    }
}

/// Parses every observation of an O&M document.
pub fn parse_observations(xml: &str) -> Result<Vec<ObservationRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::default();
    let mut records = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                text.clear();
                state.start(&element)?;
            }
            Event::Empty(element) => {
                text.clear();
                state.start(&element)?;
                state.end(element.local_name().as_ref(), "", &mut records)?;
            }
            Event::Text(content) => text.push_str(&content.unescape()?),
            Event::CData(content) => text.push_str(&String::from_utf8_lossy(&content)),
            Event::End(element) => {
                state.end(element.local_name().as_ref(), &text, &mut records)?;
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if state.current.is_some() {
        return Err(SosError::InvalidDocument(
            "document ended inside an observation".to_string(),
        ));
    }

    debug!("Parsed {} observations", records.len());
    Ok(records)
}

pub fn parse_observation_file(path: &Path) -> Result<Vec<ObservationRecord>> {
    let xml = fs::read_to_string(path)?;
    parse_observations(&xml)
}
