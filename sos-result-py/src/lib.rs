use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use ::sos_result::codec::parse_timestamp;
use ::sos_result::model::{
    DataArray, Encoding, EncodingSpec, ObservationRecord, ResultEntry, TemporalPredicate,
    TimeInterval, Timestamp,
};
use ::sos_result::temporal::apply_predicates;
use ::sos_result::{assembly, parser, MemoryStore, SosError};
use std::path::Path;

#[pymodule]
fn sos_result(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyObservation>()?;
    m.add_function(wrap_pyfunction!(parse_observations, m)?)?;
    m.add_function(wrap_pyfunction!(parse_observation_file, m)?)?;
    m.add_function(wrap_pyfunction!(filter_block, m)?)?;
    m.add_function(wrap_pyfunction!(compute_result_values, m)?)?;
    Ok(())
}

fn to_py_err(e: SosError) -> PyErr {
    match e {
        SosError::Io(e) => PyErr::new::<PyIOError, _>(format!("I/O error: {}", e)),
        other => PyErr::new::<PyValueError, _>(other.to_string()),
    }
}

fn timestamp(text: &str) -> PyResult<Timestamp> {
    parse_timestamp(text).map_err(to_py_err)
}

#[pyclass(name = "Observation")]
#[derive(Clone)]
pub struct PyObservation {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub begin: Option<String>,
    #[pyo3(get)]
    pub end: Option<String>,
    #[pyo3(get)]
    pub procedure: Option<String>,
    #[pyo3(get)]
    pub observed_property: Option<String>,
    #[pyo3(get)]
    pub feature_of_interest: Option<String>,
    #[pyo3(get)]
    pub href: Option<String>,
    #[pyo3(get)]
    pub element_count: Option<usize>,
    #[pyo3(get)]
    pub encoding: Option<String>,
    #[pyo3(get)]
    pub block_separator: Option<String>,
    #[pyo3(get)]
    pub token_separator: Option<String>,
    #[pyo3(get)]
    pub decimal_separator: Option<String>,
    #[pyo3(get)]
    pub values: Option<String>,
}

fn format_time(t: Option<Timestamp>) -> Option<String> {
    t.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl From<ObservationRecord> for PyObservation {
    fn from(record: ObservationRecord) -> Self {
        let mut observation = PyObservation {
            id: record.id,
            begin: format_time(record.sampling_time.begin),
            end: format_time(record.sampling_time.end),
            procedure: record.procedure,
            observed_property: record.observed_property,
            feature_of_interest: record.feature_of_interest,
            href: None,
            element_count: None,
            encoding: None,
            block_separator: None,
            token_separator: None,
            decimal_separator: None,
            values: None,
        };

        match record.result {
            ResultEntry::Reference(href) => observation.href = Some(href),
            ResultEntry::Array(array) => {
                observation.element_count = array.element_count;
                observation.encoding = Some(array.encoding.name().to_string());
                if let Encoding::TextBlock(spec) = &array.encoding {
                    observation.block_separator = Some(spec.block_separator.clone());
                    observation.token_separator = Some(spec.token_separator.clone());
                    observation.decimal_separator = Some(spec.decimal_separator.clone());
                }
                observation.values = Some(array.values);
            }
        }
        observation
    }
}

impl TryFrom<PyObservation> for ObservationRecord {
    type Error = PyErr;

    fn try_from(py_obs: PyObservation) -> PyResult<Self> {
        let begin = py_obs.begin.as_deref().map(timestamp).transpose()?;
        let end = py_obs.end.as_deref().map(timestamp).transpose()?;

        let result = match (py_obs.href, py_obs.values) {
            (Some(href), None) => ResultEntry::Reference(href),
            (_, Some(values)) => {
                let encoding = match py_obs.encoding.as_deref() {
                    None | Some("TextBlock") => {
                        let defaults = EncodingSpec::default();
                        Encoding::TextBlock(EncodingSpec::new(
                            py_obs.block_separator.unwrap_or(defaults.block_separator),
                            py_obs.token_separator.unwrap_or(defaults.token_separator),
                            py_obs.decimal_separator.unwrap_or(defaults.decimal_separator),
                        ))
                    }
                    Some(other) => Encoding::Other(other.to_string()),
                };
                ResultEntry::Array(DataArray {
                    element_count: py_obs.element_count,
                    encoding,
                    values,
                })
            }
            (None, None) => {
                return Err(PyErr::new::<PyValueError, _>(format!(
                    "Observation {} has neither values nor href",
                    py_obs.id
                )))
            }
        };

        Ok(ObservationRecord {
            id: py_obs.id,
            sampling_time: TimeInterval { begin, end },
            procedure: py_obs.procedure,
            observed_property: py_obs.observed_property,
            feature_of_interest: py_obs.feature_of_interest,
            result,
        })
    }
}

#[pymethods]
impl PyObservation {
    #[new]
    #[pyo3(signature = (id, values, begin=None, end=None, block_separator="@@".to_string(), token_separator=",".to_string(), decimal_separator=".".to_string()))]
    fn new(
        id: String,
        values: String,
        begin: Option<String>,
        end: Option<String>,
        block_separator: String,
        token_separator: String,
        decimal_separator: String,
    ) -> PyResult<Self> {
        let observation = PyObservation {
            id,
            begin,
            end,
            procedure: None,
            observed_property: None,
            feature_of_interest: None,
            href: None,
            element_count: None,
            encoding: Some("TextBlock".to_string()),
            block_separator: Some(block_separator),
            token_separator: Some(token_separator),
            decimal_separator: Some(decimal_separator),
            values: Some(values),
        };
        // reject bad sampling times up front
        ObservationRecord::try_from(observation.clone())?;
        Ok(observation)
    }

    fn __repr__(&self) -> String {
        format!(
            "Observation(id='{}', begin={:?}, end={:?}, encoding={:?})",
            self.id, self.begin, self.end, self.encoding
        )
    }
}

/// Temporal filter keywords shared by `filter_block` and `compute_result_values`.
fn predicates(
    equals: Option<String>,
    before: Option<String>,
    after: Option<String>,
    during: Option<(String, String)>,
) -> PyResult<Vec<TemporalPredicate>> {
    let mut predicates = Vec::new();
    if let Some(t) = equals {
        predicates.push(TemporalPredicate::Equals(timestamp(&t)?));
    }
    if let Some(t) = after {
        predicates.push(TemporalPredicate::After(timestamp(&t)?));
    }
    if let Some(t) = before {
        predicates.push(TemporalPredicate::Before(timestamp(&t)?));
    }
    if let Some((begin, end)) = during {
        predicates.push(
            TemporalPredicate::during(timestamp(&begin)?, timestamp(&end)?).map_err(to_py_err)?,
        );
    }
    Ok(predicates)
}

#[pyfunction]
pub fn parse_observations(xml: String) -> PyResult<Vec<PyObservation>> {
    let records = parser::parse_observations(&xml).map_err(to_py_err)?;
    Ok(records.into_iter().map(PyObservation::from).collect())
}

#[pyfunction]
pub fn parse_observation_file(path: String) -> PyResult<Vec<PyObservation>> {
    let records = parser::parse_observation_file(Path::new(&path)).map_err(to_py_err)?;
    Ok(records.into_iter().map(PyObservation::from).collect())
}

#[pyfunction]
#[pyo3(signature = (values, begin=None, end=None, equals=None, before=None, after=None, during=None, block_separator="@@".to_string(), token_separator=",".to_string(), decimal_separator=".".to_string()))]
#[allow(clippy::too_many_arguments)]
pub fn filter_block(
    values: String,
    begin: Option<String>,
    end: Option<String>,
    equals: Option<String>,
    before: Option<String>,
    after: Option<String>,
    during: Option<(String, String)>,
    block_separator: String,
    token_separator: String,
    decimal_separator: String,
) -> PyResult<String> {
    let sampling = TimeInterval {
        begin: begin.as_deref().map(timestamp).transpose()?,
        end: end.as_deref().map(timestamp).transpose()?,
    };
    let encoding = Encoding::TextBlock(EncodingSpec::new(
        block_separator,
        token_separator,
        decimal_separator,
    ));
    let predicates = predicates(equals, before, after, during)?;
    Ok(apply_predicates(&values, &encoding, &sampling, &predicates))
}

#[pyfunction]
#[pyo3(signature = (observations, result_ids, equals=None, before=None, after=None, during=None))]
pub fn compute_result_values(
    observations: Vec<PyObservation>,
    result_ids: Vec<String>,
    equals: Option<String>,
    before: Option<String>,
    after: Option<String>,
    during: Option<(String, String)>,
) -> PyResult<String> {
    let store = observations
        .into_iter()
        .map(ObservationRecord::try_from)
        .collect::<PyResult<MemoryStore>>()?;
    let predicates = predicates(equals, before, after, during)?;
    assembly::compute_result_values(&store, &result_ids, &predicates).map_err(to_py_err)
}
