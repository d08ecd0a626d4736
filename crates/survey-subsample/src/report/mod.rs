//! HTML run report: plotly figures embedded in a maud page.
pub mod plots;
pub mod report;

pub use report::{Report, ReportSection};
