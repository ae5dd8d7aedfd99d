use std::sync::Arc;

use tracing::{info, warn};

use crate::assembly::compute_result_values;
use crate::cache::{Sweeper, TemplateCache};
use crate::config::ServiceConfig;
use crate::error::{Result, SosError};
use crate::model::ObservationCriteria;
use crate::request::{parse_get_result, GetResultRequest, GetResultResponse};
use crate::store::ObservationStore;
use crate::writer::ResponseWriter;

/// Serves `GetResult` requests from a store and a set of registered
/// observation templates.
pub struct ResultService<S: ObservationStore> {
    store: S,
    config: ServiceConfig,
    templates: Arc<TemplateCache>,
    writer: ResponseWriter,
    _sweeper: Option<Sweeper>,
}

impl<S: ObservationStore> ResultService<S> {
    /// Service without a background sweep; expired templates are still
    /// never served.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self {
            store,
            config,
            templates: Arc::new(TemplateCache::new()),
            writer: ResponseWriter::new(),
            _sweeper: None,
        }
    }

    /// Service whose template cache is swept every `config.sweep_interval`.
    pub fn with_sweeper(store: S, config: ServiceConfig) -> Result<Self> {
        let templates = Arc::new(TemplateCache::new());
        let sweeper = TemplateCache::start_sweeper(Arc::clone(&templates), config.sweep_interval)?;
        Ok(Self {
            store,
            config,
            templates,
            writer: ResponseWriter::new(),
            _sweeper: Some(sweeper),
        })
    }

    pub fn with_writer(mut self, writer: ResponseWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn register_template(&self, template_id: impl Into<String>, criteria: ObservationCriteria) {
        self.templates
            .insert(template_id, criteria, self.config.template_ttl);
    }

    pub fn get_result(&self, request: &GetResultRequest) -> Result<GetResultResponse> {
        let criteria = self
            .templates
            .get(&request.template_id)
            .ok_or_else(|| SosError::UnknownTemplate(request.template_id.clone()))?;

        let criteria = criteria.with_event_time(&request.event_time);
        let result_ids = self.store.filter_result_ids(&criteria);
        info!(
            "Template {}: {} candidate results",
            request.template_id,
            result_ids.len()
        );

        let values = compute_result_values(&self.store, &result_ids, &request.event_time)?;

        Ok(GetResultResponse {
            template_id: request.template_id.clone(),
            values,
        })
    }

    /// Runs a `GetResult` XML request end to end. Failures become an OWS
    /// exception report.
    pub fn handle_get_result_xml(&self, xml: &str) -> String {
        let outcome = parse_get_result(xml)
            .and_then(|request| self.get_result(&request))
            .and_then(|response| self.writer.write_get_result(&response));

        match outcome {
            Ok(document) => document,
            Err(e) => {
                warn!("GetResult failed: {}", e);
                self.writer
                    .write_exception_report(&e)
                    .unwrap_or_else(|_| e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DataArray, Encoding, EncodingSpec, ObservationRecord, ResultEntry, TemporalPredicate,
        TimeInterval, Timestamp,
    };
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn day(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn store() -> MemoryStore {
        let encoding = Encoding::TextBlock(EncodingSpec::new(";", ",", "."));
        vec![
            ObservationRecord {
                id: "obs-1".to_string(),
                sampling_time: TimeInterval::new(day(1), day(5)),
                procedure: Some("sensor-a".to_string()),
                observed_property: None,
                feature_of_interest: None,
                result: ResultEntry::Array(DataArray {
                    element_count: Some(5),
                    encoding: encoding.clone(),
                    values: (1..=5)
                        .map(|d| format!("2020-01-0{}T00:00:00,{}.0;", d, d))
                        .collect(),
                }),
            },
            ObservationRecord {
                id: "obs-2".to_string(),
                sampling_time: TimeInterval::new(day(1), day(5)),
                procedure: Some("sensor-b".to_string()),
                observed_property: None,
                feature_of_interest: None,
                result: ResultEntry::Array(DataArray {
                    element_count: None,
                    encoding,
                    values: "2020-01-03T00:00:00,9.0;".to_string(),
                }),
            },
        ]
        .into_iter()
        .collect()
    }

    fn sensor_a() -> ObservationCriteria {
        ObservationCriteria {
            procedures: vec!["sensor-a".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_get_result_narrows_by_template_and_time() {
        let service = ResultService::new(store(), ServiceConfig::default());
        service.register_template("tmpl", sensor_a());

        let response = service
            .get_result(&GetResultRequest {
                template_id: "tmpl".to_string(),
                event_time: vec![
                    TemporalPredicate::After(day(2)),
                    TemporalPredicate::Before(day(4)),
                ],
            })
            .unwrap();

        assert_eq!(response.template_id, "tmpl");
        assert_eq!(response.values, "2020-01-03T00:00:00,3.0;\n");
    }

    #[test]
    fn test_unknown_template() {
        let service = ResultService::new(store(), ServiceConfig::default());
        let err = service
            .get_result(&GetResultRequest {
                template_id: "missing".to_string(),
                event_time: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, SosError::UnknownTemplate(_)));
    }

    #[test]
    fn test_expired_template_is_unknown() {
        let config = ServiceConfig {
            template_ttl: Duration::ZERO,
            ..Default::default()
        };
        let service = ResultService::new(store(), config);
        service.register_template("tmpl", sensor_a());

        let err = service
            .get_result(&GetResultRequest {
                template_id: "tmpl".to_string(),
                event_time: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, SosError::UnknownTemplate(_)));
    }

    #[test]
    fn test_unbounded_template_ttl() {
        let config = ServiceConfig {
            template_ttl: Duration::MAX,
            ..Default::default()
        };
        let service = ResultService::new(store(), config);
        service.register_template("tmpl", sensor_a());

        let response = service
            .get_result(&GetResultRequest {
                template_id: "tmpl".to_string(),
                event_time: vec![TemporalPredicate::Equals(day(2))],
            })
            .unwrap();
        assert_eq!(response.values, "2020-01-02T00:00:00,2.0;\n");
    }

    #[test]
    fn test_handle_xml_success_and_exception() {
        let service = ResultService::with_sweeper(store(), ServiceConfig::default())
            .unwrap()
            .with_writer(ResponseWriter::compact());
        service.register_template("tmpl", sensor_a());

        let ok = service.handle_get_result_xml(
            r#"<sos:GetResult xmlns:sos="http://www.opengis.net/sos/1.0" xmlns:ogc="http://www.opengis.net/ogc" xmlns:gml="http://www.opengis.net/gml">
                 <sos:ObservationTemplateId>tmpl</sos:ObservationTemplateId>
                 <sos:eventTime><ogc:TM_Equals><gml:TimeInstant><gml:timePosition>2020-01-04T00:00:00</gml:timePosition></gml:TimeInstant></ogc:TM_Equals></sos:eventTime>
               </sos:GetResult>"#,
        );
        assert!(ok.contains("<sos:result RS=\"tmpl\">2020-01-04T00:00:00,4.0;\n</sos:result>"));

        let failed = service.handle_get_result_xml(
            r#"<sos:GetResult xmlns:sos="http://www.opengis.net/sos/1.0" xmlns:ogc="http://www.opengis.net/ogc" xmlns:gml="http://www.opengis.net/gml">
                 <sos:ObservationTemplateId>tmpl</sos:ObservationTemplateId>
                 <sos:eventTime><ogc:TM_Overlaps><gml:TimeInstant><gml:timePosition>2020-01-04T00:00:00</gml:timePosition></gml:TimeInstant></ogc:TM_Overlaps></sos:eventTime>
               </sos:GetResult>"#,
        );
        assert!(failed.contains("ows:ExceptionReport"));
        assert!(failed.contains("TM_Overlaps"));
    }
}
