//! Reading survey tables and persisting result tables.
pub mod sink;
pub mod survey_csv;

pub use sink::{CsvSink, ResultSink};
pub use survey_csv::{read_survey_table, SurveyReaderConfig};
