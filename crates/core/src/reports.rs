//! Execution (JUnit-style) and coverage (Cobertura-style) report parsers
//! (`spec.md` §4.4). No repo in the retrieval pack parses this XML shape;
//! `quick-xml` is used as the idiomatic low-level reader, per `DESIGN.md`.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report file not found: {0}")]
    NotFound(String),
    #[error("failed to read report file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReportSummary {
    pub errors: u32,
    pub failures: u32,
    pub skipped: u32,
    pub tests_total: u32,
    pub exec_time: f64,
    pub unit: u32,
    pub integration: u32,
    pub system: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReportSummary {
    pub line_valid: Option<u32>,
    pub line_covered: Option<u32>,
    pub line_rate: Option<f64>,
    pub branch_valid: Option<u32>,
    pub branch_covered: Option<u32>,
    pub branch_rate: Option<f64>,
}

fn attr_str(e: &quick_xml::events::BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn attr_u32(e: &quick_xml::events::BytesStart, name: &str) -> u32 {
    attr_str(e, name).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn attr_f64(e: &quick_xml::events::BytesStart, name: &str) -> f64 {
    attr_str(e, name).and_then(|v| v.parse().ok()).unwrap_or(0.0)
}

/// Parses the `testsuite` element's attributes, then walks every
/// `testcase`'s `properties/property[@name="categories"]` to aggregate
/// per-category counts. A missing report file is a distinct error from
/// missing attributes (which default to zero, per `spec.md` §4.4).
pub fn parse_execution_report(path: &Path) -> Result<ExecutionReportSummary, ReportError> {
    if !path.exists() {
        return Err(ReportError::NotFound(path.display().to_string()));
    }
    let xml = std::fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut summary = ExecutionReportSummary::default();
    let mut in_categories_property = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                match name.as_ref() {
                    b"testsuite" => {
                        summary.errors = attr_u32(&e, "errors");
                        summary.failures = attr_u32(&e, "failures");
                        summary.skipped = attr_u32(&e, "skipped");
                        summary.tests_total = attr_u32(&e, "tests");
                        summary.exec_time = attr_f64(&e, "time");
                    }
                    b"property" => {
                        if attr_str(&e, "name").as_deref() == Some("categories") {
                            if let Some(value) = attr_str(&e, "value") {
                                for category in &["unit", "integration", "system"] {
                                    if value.contains(category) {
                                        match *category {
                                            "unit" => summary.unit += 1,
                                            "integration" => summary.integration += 1,
                                            "system" => summary.system += 1,
                                            _ => unreachable!(),
                                        }
                                    }
                                }
                            }
                            in_categories_property = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) if e.name().as_ref() == b"property" => {
                in_categories_property = false;
            }
            _ => {
                let _ = in_categories_property;
            }
        }
        buf.clear();
    }

    Ok(summary)
}

/// Parses the Cobertura root element's coverage attributes. Missing
/// attributes yield `None`, not zero (`spec.md` §4.4).
pub fn parse_coverage_report(path: &Path) -> Result<CoverageReportSummary, ReportError> {
    if !path.exists() {
        return Err(ReportError::NotFound(path.display().to_string()));
    }
    let xml = std::fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut attrs: HashMap<String, String> = HashMap::new();
    let mut buf = Vec::new();
    let mut root_seen = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                if !root_seen {
                    root_seen = true;
                    for a in e.attributes().flatten() {
                        attrs.insert(
                            String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                            String::from_utf8_lossy(&a.value).into_owned(),
                        );
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(CoverageReportSummary {
        line_valid: attrs.get("lines-valid").and_then(|v| v.parse().ok()),
        line_covered: attrs.get("lines-covered").and_then(|v| v.parse().ok()),
        line_rate: attrs.get("line-rate").and_then(|v| v.parse().ok()),
        branch_valid: attrs.get("branches-valid").and_then(|v| v.parse().ok()),
        branch_covered: attrs.get("branches-covered").and_then(|v| v.parse().ok()),
        branch_rate: attrs.get("branch-rate").and_then(|v| v.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_execution_report_is_distinct_error() {
        let err = parse_execution_report(Path::new("/nonexistent/execution-report.xml")).unwrap_err();
        assert!(matches!(err, ReportError::NotFound(_)));
    }

    #[test]
    fn parses_execution_report_with_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("execution-report.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<testsuite errors="1" failures="2" skipped="0" tests="5" time="3.21">
  <testcase name="a">
    <properties><property name="categories" value="['unit']"/></properties>
  </testcase>
  <testcase name="b">
    <properties><property name="categories" value="['unit', 'integration']"/></properties>
  </testcase>
</testsuite>"#,
        )
        .unwrap();
        let summary = parse_execution_report(&path).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.tests_total, 5);
        assert_eq!(summary.unit, 2);
        assert_eq!(summary.integration, 1);
        assert_eq!(summary.system, 0);
    }

    #[test]
    fn missing_attributes_default_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("execution-report.xml");
        std::fs::write(&path, r#"<testsuite/>"#).unwrap();
        let summary = parse_execution_report(&path).unwrap();
        assert_eq!(summary, ExecutionReportSummary::default());
    }

    #[test]
    fn parses_coverage_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage-report.xml");
        std::fs::write(
            &path,
            r#"<coverage lines-covered="80" lines-valid="100" line-rate="0.8" branches-covered="10" branches-valid="20" branch-rate="0.5"/>"#,
        )
        .unwrap();
        let summary = parse_coverage_report(&path).unwrap();
        assert_eq!(summary.line_valid, Some(100));
        assert_eq!(summary.branch_rate, Some(0.5));
    }

    #[test]
    fn missing_coverage_attributes_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage-report.xml");
        std::fs::write(&path, r#"<coverage/>"#).unwrap();
        let summary = parse_coverage_report(&path).unwrap();
        assert_eq!(summary.line_valid, None);
        assert_eq!(summary.branch_rate, None);
    }
}
