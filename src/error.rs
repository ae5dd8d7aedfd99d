use thiserror::Error;

#[derive(Debug, Error)]
pub enum SosError {
    #[error("Malformed row: cannot parse timestamp '{0}'")]
    MalformedRow(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid result {id}: {reason}")]
    InvalidResult { id: String, reason: String },

    #[error("Unknown result: {0}")]
    UnknownResult(String),

    #[error("Unsupported temporal operator: {0}")]
    UnsupportedTemporalOperator(String),

    #[error("Unknown observation template: {0}")]
    UnknownTemplate(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid observation document: {0}")]
    InvalidDocument(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SosError>;

/// OGC exception codes used in `ows:ExceptionReport` documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    NoApplicableCode,
}

impl ExceptionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::NoApplicableCode => "NoApplicableCode",
        }
    }
}

impl SosError {
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            SosError::MissingParameter(_) => ExceptionCode::MissingParameterValue,
            SosError::UnsupportedTemporalOperator(_)
            | SosError::UnknownTemplate(_)
            | SosError::InvalidRequest(_) => ExceptionCode::InvalidParameterValue,
            _ => ExceptionCode::NoApplicableCode,
        }
    }

    /// Name of the request parameter the error refers to, if any.
    pub fn locator(&self) -> Option<&str> {
        match self {
            SosError::UnsupportedTemporalOperator(_) => Some("eventTime"),
            SosError::UnknownTemplate(_) => Some("ObservationTemplateId"),
            SosError::MissingParameter(name) => Some(name.as_str()),
            _ => None,
        }
    }
}
