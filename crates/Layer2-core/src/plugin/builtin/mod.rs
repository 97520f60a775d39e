//! 내장 플러그인 패키지

mod csv_report;

pub use csv_report::CsvReportPlugin;

use super::catalog::PluginCatalog;

/// 내장 소스 단위 이름
pub const CSV_REPORT_UNIT: &str = "csv_report_plugin";

/// 내장 플러그인을 카탈로그에 등록
pub fn register_builtins(catalog: &mut PluginCatalog) -> &mut PluginCatalog {
    catalog.register::<CsvReportPlugin>(CSV_REPORT_UNIT)
}
