//! `GetResult` request parsing.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Result, SosError};
use crate::model::{TemporalPredicate, Timestamp};
use crate::parser::parse_time_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResultRequest {
    pub template_id: String,
    pub event_time: Vec<TemporalPredicate>,
}

/// Payload of a `sos:GetResultResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResultResponse {
    pub template_id: String,
    pub values: String,
}

/// Time primitive seen inside one temporal operator.
#[derive(Debug, Default)]
struct OperatorBody {
    name: String,
    instant: Option<Timestamp>,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
    saw_instant: bool,
    saw_period: bool,
}

impl OperatorBody {
    fn into_predicate(self) -> Result<TemporalPredicate> {
        match self.name.as_str() {
            "TM_Equals" | "TM_Before" | "TM_After" => {
                if self.saw_period {
                    return Err(SosError::InvalidRequest(format!(
                        "{} expects a gml:TimeInstant",
                        self.name
                    )));
                }
                let t = self.instant.ok_or_else(|| {
                    SosError::InvalidRequest(format!("{} has no time position", self.name))
                })?;
                Ok(match self.name.as_str() {
                    "TM_Equals" => TemporalPredicate::Equals(t),
                    "TM_Before" => TemporalPredicate::Before(t),
                    _ => TemporalPredicate::After(t),
                })
            }
            "TM_During" => {
                if self.saw_instant {
                    return Err(SosError::InvalidRequest(
                        "TM_During expects a gml:TimePeriod".to_string(),
                    ));
                }
                match (self.begin, self.end) {
                    (Some(begin), Some(end)) => TemporalPredicate::during(begin, end),
                    _ => Err(SosError::InvalidRequest(
                        "TM_During needs both beginPosition and endPosition".to_string(),
                    )),
                }
            }
            other => Err(SosError::UnsupportedTemporalOperator(other.to_string())),
        }
    }
}

fn request_time(text: &str) -> Result<Timestamp> {
    parse_time_value(text)
        .ok_or_else(|| SosError::InvalidRequest(format!("invalid time position '{}'", text.trim())))
}

/// Parses a `sos:GetResult` document.
///
/// Only `TM_Equals`, `TM_Before`, `TM_After` and `TM_During` are accepted;
/// any other `TM_*` operator is rejected here, before any data is touched.
pub fn parse_get_result(xml: &str) -> Result<GetResultRequest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut template_id: Option<String> = None;
    let mut event_time = Vec::new();
    let mut operator: Option<OperatorBody> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                text.clear();
                let name = element.local_name();
                let name = String::from_utf8_lossy(name.as_ref());
                if name.starts_with("TM_") {
                    debug!("Temporal operator <{}>", name);
                    operator = Some(OperatorBody {
                        name: name.into_owned(),
                        ..Default::default()
                    });
                } else if let Some(body) = operator.as_mut() {
                    match &*name {
                        "TimeInstant" => body.saw_instant = true,
                        "TimePeriod" => body.saw_period = true,
                        _ => {}
                    }
                }
            }
            Event::Empty(element) => {
                let name = element.local_name();
                let name = String::from_utf8_lossy(name.as_ref());
                if name.starts_with("TM_") {
                    // an operator without a time primitive never yields a predicate
                    let body = OperatorBody {
                        name: name.into_owned(),
                        ..Default::default()
                    };
                    return match body.into_predicate() {
                        Err(e) => Err(e),
                        Ok(predicate) => Err(SosError::InvalidRequest(format!(
                            "empty temporal operator <{}>",
                            predicate.operator_name()
                        ))),
                    };
                }
            }
            Event::Text(content) => text.push_str(&content.unescape()?),
            Event::End(element) => {
                let name = element.local_name();
                let name = String::from_utf8_lossy(name.as_ref());
                match &*name {
                    "ObservationTemplateId" => template_id = Some(text.trim().to_string()),
                    "timePosition" => {
                        if let Some(body) = operator.as_mut() {
                            body.instant = Some(request_time(&text)?);
                        }
                    }
                    "beginPosition" => {
                        if let Some(body) = operator.as_mut() {
                            body.begin = Some(request_time(&text)?);
                        }
                    }
                    "endPosition" => {
                        if let Some(body) = operator.as_mut() {
                            body.end = Some(request_time(&text)?);
                        }
                    }
                    operator_name if operator_name.starts_with("TM_") => {
                        if let Some(body) = operator.take() {
                            event_time.push(body.into_predicate()?);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let template_id = template_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SosError::MissingParameter("ObservationTemplateId".to_string()))?;

    Ok(GetResultRequest {
        template_id,
        event_time,
    })
}
