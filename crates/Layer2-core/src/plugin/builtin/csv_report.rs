//! CSV 리포트 플러그인
//!
//! 테스트 데이터 문서에서 세 개의 CSV 파일을 생성합니다:
//! - `<out>.summary.csv`: 테스트 정보, 응답 시간/처리량/에러율 지표
//! - `<out>.requests.csv`: 요청별 상세 (요청 데이터가 없으면 생략)
//! - `<out>.errors.csv`: 에러 집계 (비어 있어도 헤더는 기록)
//!
//! 설정 키:
//! - `delimiter`: 구분 문자 (기본 `,`)

use crate::plugin::descriptor::{PluginConfig, PluginDescriptor, PluginVersion};
use crate::plugin::traits::{Plugin, PluginState, ReportGenerator};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use volley_foundation::{Error, Result};

const SUMMARY_FIELDS: [&str; 8] = [
    "metric",
    "name",
    "value",
    "unit",
    "start_time",
    "end_time",
    "duration",
    "users",
];

const REQUEST_FIELDS: [&str; 10] = [
    "timestamp",
    "method",
    "name",
    "response_time",
    "response_length",
    "status_code",
    "success",
    "error",
    "user_id",
    "concurrent_users",
];

const ERROR_FIELDS: [&str; 6] = ["timestamp", "method", "name", "error", "count", "percentage"];

/// 지표 그룹 (테스트 데이터 키, 단위)
const METRIC_GROUPS: [(&str, &str); 3] = [
    ("response_time", "ms"),
    ("throughput", "req/s"),
    ("error_rate", "%"),
];

/// CSV 리포트 플러그인
#[derive(Default)]
pub struct CsvReportPlugin {
    state: PluginState,
}

impl CsvReportPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn delimiter(&self) -> Result<u8> {
        match self.state.get("delimiter") {
            None | Some(Value::Null) => Ok(b','),
            Some(Value::String(s)) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(other) => Err(Error::Config(format!(
                "delimiter must be a single ASCII character, got {}",
                other
            ))),
        }
    }

    fn writer(&self, path: &Path) -> Result<csv::Writer<std::fs::File>> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter()?)
            .from_path(path)
            .map_err(csv_error)
    }

    fn write_summary(&self, test_data: &Value, path: &Path) -> Result<()> {
        let mut writer = self.writer(path)?;
        writer.write_record(SUMMARY_FIELDS).map_err(csv_error)?;

        let test_name = match test_data.get("test_name") {
            Some(v) => cell(Some(v)),
            None => "Unknown".to_string(),
        };
        let number = |key: &str| match test_data.get(key) {
            Some(v) => cell(Some(v)),
            None => "0".to_string(),
        };
        writer
            .write_record([
                "test_info".to_string(),
                test_name,
                String::new(),
                String::new(),
                cell(test_data.get("start_time")),
                cell(test_data.get("end_time")),
                number("duration"),
                number("users"),
            ])
            .map_err(csv_error)?;

        for (group, unit) in METRIC_GROUPS {
            let Some(metrics) = test_data.get(group).and_then(Value::as_object) else {
                continue;
            };
            for (metric, value) in metrics {
                let value = cell(Some(value));
                writer
                    .write_record([
                        group,
                        metric.as_str(),
                        value.as_str(),
                        unit,
                        "",
                        "",
                        "",
                        "",
                    ])
                    .map_err(csv_error)?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// 요청 데이터가 없으면 파일을 만들지 않음 (false 반환)
    fn write_requests(&self, test_data: &Value, path: &Path) -> Result<bool> {
        let requests = rows(test_data, "requests");
        if requests.is_empty() {
            warn!("No request data, skipping {:?}", path);
            return Ok(false);
        }

        let mut writer = self.writer(path)?;
        writer.write_record(REQUEST_FIELDS).map_err(csv_error)?;
        for request in requests {
            let record: Vec<String> = REQUEST_FIELDS
                .iter()
                .map(|field| match (request.get(*field), *field) {
                    (Some(v), _) => cell(Some(v)),
                    (None, "response_time" | "response_length" | "concurrent_users") => {
                        "0".to_string()
                    }
                    (None, "success") => "false".to_string(),
                    (None, _) => String::new(),
                })
                .collect();
            writer.write_record(&record).map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(true)
    }

    fn write_errors(&self, test_data: &Value, path: &Path) -> Result<()> {
        let mut writer = self.writer(path)?;
        writer.write_record(ERROR_FIELDS).map_err(csv_error)?;

        for error in rows(test_data, "errors") {
            let record: Vec<String> = ERROR_FIELDS
                .iter()
                .map(|field| match (error.get(*field), *field) {
                    (Some(v), _) => cell(Some(v)),
                    (None, "count") => "0".to_string(),
                    (None, "percentage") => "0.0".to_string(),
                    (None, _) => String::new(),
                })
                .collect();
            writer.write_record(&record).map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// 출력 경로의 확장자를 교체한 파일 경로
pub(crate) fn report_file(output_path: &Path, suffix: &str) -> PathBuf {
    output_path.with_extension(suffix)
}

fn rows<'a>(test_data: &'a Value, key: &str) -> Vec<&'a Map<String, Value>> {
    test_data
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::Io(e.into())
}

impl Plugin for CsvReportPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("CSVReportPlugin", "report")
            .with_version(PluginVersion::new(1, 0, 0))
            .with_description("Generates CSV test reports (summary, requests, errors)")
            .with_author("Volley")
            .with_config_field(
                "delimiter",
                json!({"type": "string", "default": ",", "description": "Field delimiter"}),
            )
    }

    fn initialize(&self, config: &PluginConfig) -> Result<()> {
        if !self.validate_config(config) {
            return Err(Error::Config("delimiter must be a single ASCII character".into()));
        }
        self.configure(config)?;
        info!("CSV report plugin initialized");
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        info!("CSV report plugin cleaned up");
        Ok(())
    }

    fn state(&self) -> &PluginState {
        &self.state
    }

    fn validate_config(&self, config: &PluginConfig) -> bool {
        match config.get("delimiter") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.len() == 1 && s.is_ascii(),
            Some(_) => false,
        }
    }

    fn as_report_generator(&self) -> Option<&dyn ReportGenerator> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ReportGenerator for CsvReportPlugin {
    fn generate(&self, test_data: &Value, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        self.write_summary(test_data, &report_file(output_path, "summary.csv"))?;
        self.write_requests(test_data, &report_file(output_path, "requests.csv"))?;
        self.write_errors(test_data, &report_file(output_path, "errors.csv"))?;

        info!("Generated CSV report: {:?}", output_path);
        Ok(())
    }

    fn supported_formats(&self) -> BTreeSet<String> {
        BTreeSet::from(["csv".to_string()])
    }

    fn customize_report_data(&self, mut test_data: Value) -> Value {
        let descriptor = self.descriptor();
        if let Some(map) = test_data.as_object_mut() {
            map.insert(
                "report_generated_at".into(),
                json!(chrono::Local::now().to_rfc3339()),
            );
            map.insert(
                "report_plugin".into(),
                json!({"name": descriptor.name, "version": descriptor.version.to_string()}),
            );
        }
        test_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "test_name": "checkout",
            "start_time": "2026-10-01T10:00:00",
            "end_time": "2026-10-01T10:05:00",
            "duration": 300,
            "users": 50,
            "response_time": {"avg": 120.5, "p95": 310},
            "throughput": {"rps": 42.0},
            "requests": [
                {"method": "GET", "name": "/cart", "response_time": 98, "success": true},
                {"method": "POST", "name": "/pay", "error": "timeout, upstream"}
            ]
        })
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_generate_writes_three_files() {
        let temp = TempDir::new().unwrap();
        let plugin = CsvReportPlugin::new();
        plugin.initialize(&PluginConfig::new()).unwrap();

        let out = temp.path().join("reports/run1.csv");
        plugin.generate(&sample(), &out).unwrap();

        let summary = read(&temp.path().join("reports/run1.summary.csv"));
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "metric,name,value,unit,start_time,end_time,duration,users");
        assert_eq!(
            lines[1],
            "test_info,checkout,,,2026-10-01T10:00:00,2026-10-01T10:05:00,300,50"
        );
        assert!(lines.contains(&"response_time,avg,120.5,ms,,,,"));
        assert!(lines.contains(&"throughput,rps,42.0,req/s,,,,"));
        assert_eq!(lines.len(), 5);

        let requests = read(&temp.path().join("reports/run1.requests.csv"));
        let lines: Vec<&str> = requests.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], ",GET,/cart,98,0,,true,,,0");
        assert_eq!(lines[2], ",POST,/pay,0,0,,false,\"timeout, upstream\",,0");

        let errors = read(&temp.path().join("reports/run1.errors.csv"));
        assert_eq!(errors.trim_end(), "timestamp,method,name,error,count,percentage");
    }

    #[test]
    fn test_missing_requests_skips_file() {
        let temp = TempDir::new().unwrap();
        let plugin = CsvReportPlugin::new();

        let out = temp.path().join("empty");
        plugin.generate(&json!({}), &out).unwrap();

        assert!(temp.path().join("empty.summary.csv").exists());
        assert!(!temp.path().join("empty.requests.csv").exists());
        assert!(temp.path().join("empty.errors.csv").exists());

        let summary = read(&temp.path().join("empty.summary.csv"));
        assert_eq!(summary.lines().nth(1), Some("test_info,Unknown,,,,,0,0"));
    }

    #[test]
    fn test_delimiter_config() {
        let temp = TempDir::new().unwrap();
        let plugin = CsvReportPlugin::new();

        let mut bad = PluginConfig::new();
        bad.insert("delimiter".into(), json!(";;"));
        assert!(plugin.initialize(&bad).is_err());

        let mut config = PluginConfig::new();
        config.insert("delimiter".into(), json!(";"));
        plugin.initialize(&config).unwrap();

        let out = temp.path().join("run");
        plugin
            .generate(&json!({"errors": [{"name": "/a", "count": 2}]}), &out)
            .unwrap();
        let errors = read(&temp.path().join("run.errors.csv"));
        assert_eq!(errors.lines().nth(1), Some(";;/a;;2;0.0"));
    }

    #[test]
    fn test_customize_report_data() {
        let plugin = CsvReportPlugin::new();
        let data = plugin.customize_report_data(json!({"test_name": "t"}));

        assert!(data["report_generated_at"].as_str().is_some());
        assert_eq!(data["report_plugin"]["name"], json!("CSVReportPlugin"));
        assert_eq!(data["report_plugin"]["version"], json!("1.0.0"));
        assert_eq!(data["test_name"], json!("t"));
    }

    #[test]
    fn test_capabilities() {
        let plugin = CsvReportPlugin::new();
        assert!(plugin.as_report_generator().is_some());
        assert!(plugin.as_test_lifecycle().is_none());
        assert_eq!(
            plugin.supported_formats(),
            BTreeSet::from(["csv".to_string()])
        );
    }
}
