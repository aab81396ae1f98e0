//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_report_api;

pub use http_report_api::HttpReportApi;
