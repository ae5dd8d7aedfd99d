use chrono::NaiveDateTime;

use crate::error::{Result, SosError};

/// Row and sampling timestamps carry no zone: `yyyy-MM-dd HH:mm:ss`.
pub type Timestamp = NaiveDateTime;

/// Sampling span of one stored result, read as `[begin, end)`.
///
/// A missing bound is open on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInterval {
    pub begin: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeInterval {
    pub fn new(begin: Timestamp, end: Timestamp) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
        }
    }

    pub fn instant(t: Timestamp) -> Self {
        Self::new(t, t)
    }

    /// `begin < t`, with an open begin counting as minus infinity.
    pub fn begins_before(&self, t: Timestamp) -> bool {
        self.begin.map_or(true, |b| b < t)
    }

    /// `end > t`, with an open end counting as plus infinity.
    pub fn ends_after(&self, t: Timestamp) -> bool {
        self.end.map_or(true, |e| e > t)
    }

    /// `begin <= t <= end`.
    pub fn contains(&self, t: Timestamp) -> bool {
        self.begin.map_or(true, |b| b <= t) && self.end.map_or(true, |e| e >= t)
    }
}

/// One OGC temporal operator from a request's `eventTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPredicate {
    Equals(Timestamp),
    Before(Timestamp),
    After(Timestamp),
    During { begin: Timestamp, end: Timestamp },
}

impl TemporalPredicate {
    /// `TM_During` over `[begin, end)`; a period ending before it begins is
    /// rejected.
    pub fn during(begin: Timestamp, end: Timestamp) -> Result<Self> {
        if end < begin {
            return Err(SosError::InvalidRequest(format!(
                "TM_During period ends before it begins: {} / {}",
                begin, end
            )));
        }
        Ok(TemporalPredicate::During { begin, end })
    }

    pub fn operator_name(&self) -> &'static str {
        match self {
            TemporalPredicate::Equals(_) => "TM_Equals",
            TemporalPredicate::Before(_) => "TM_Before",
            TemporalPredicate::After(_) => "TM_After",
            TemporalPredicate::During { .. } => "TM_During",
        }
    }
}

/// Separators of a SWE `TextBlock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingSpec {
    pub block_separator: String,
    pub token_separator: String,
    pub decimal_separator: String,
}

impl EncodingSpec {
    pub fn new(
        block_separator: impl Into<String>,
        token_separator: impl Into<String>,
        decimal_separator: impl Into<String>,
    ) -> Self {
        Self {
            block_separator: block_separator.into(),
            token_separator: token_separator.into(),
            decimal_separator: decimal_separator.into(),
        }
    }
}

impl Default for EncodingSpec {
    fn default() -> Self {
        Self::new("@@", ",", ".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    TextBlock(EncodingSpec),
    /// Any other SWE encoding, by element name (`BinaryBlock`, `XMLBlock`, ...).
    Other(String),
}

impl Encoding {
    pub fn name(&self) -> &str {
        match self {
            Encoding::TextBlock(_) => "TextBlock",
            Encoding::Other(name) => name,
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::TextBlock(EncodingSpec::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataArray {
    pub element_count: Option<usize>,
    pub encoding: Encoding,
    pub values: String,
}

/// Payload of a stored observation: either inline data or a link to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEntry {
    Reference(String),
    Array(DataArray),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    pub id: String,
    pub sampling_time: TimeInterval,
    pub procedure: Option<String>,
    pub observed_property: Option<String>,
    pub feature_of_interest: Option<String>,
    pub result: ResultEntry,
}

impl ObservationRecord {
    pub fn data_array(&self) -> Option<&DataArray> {
        match &self.result {
            ResultEntry::Array(array) => Some(array),
            ResultEntry::Reference(_) => None,
        }
    }
}

/// Selection criteria for stored results. Empty lists leave that facet unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationCriteria {
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    pub event_time: Vec<TemporalPredicate>,
}

impl ObservationCriteria {
    pub fn with_event_time(&self, event_time: &[TemporalPredicate]) -> Self {
        let mut criteria = self.clone();
        criteria.event_time.extend_from_slice(event_time);
        criteria
    }
}
