pub mod assembly;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod request;
pub mod service;
pub mod store;
pub mod temporal;
pub mod writer;
pub mod zip_handler;

pub use assembly::compute_result_values;
pub use config::ServiceConfig;
pub use error::{Result, SosError};
pub use model::{
    DataArray, Encoding, EncodingSpec, ObservationCriteria, ObservationRecord, ResultEntry,
    TemporalPredicate, TimeInterval, Timestamp,
};
pub use request::{parse_get_result, GetResultRequest, GetResultResponse};
pub use service::ResultService;
pub use store::{MemoryStore, ObservationStore};
pub use writer::ResponseWriter;
pub use zip_handler::ZipHandler;
