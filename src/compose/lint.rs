//! Schema checks on a parsed [`ComposeFile`].

use crate::compose::model::{ComposeFile, PortMapping};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub service: Option<String>,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.service {
            Some(service) => write!(f, "{}: [{}] {}", level, service, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    fn push(&mut self, severity: Severity, service: Option<&str>, message: String) {
        self.findings.push(Finding {
            severity,
            service: service.map(str::to_string),
            message,
        });
    }
}

/// Environment keys an image family needs to start.
#[derive(Debug, Clone)]
pub struct EnvRule {
    pub image_families: Vec<String>,
    pub required_keys: Vec<String>,
}

impl EnvRule {
    fn new(families: &[&str], keys: &[&str]) -> Self {
        Self {
            image_families: families.iter().map(|s| s.to_string()).collect(),
            required_keys: keys.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LintOptions {
    pub expected_services: Vec<String>,
    pub env_rules: Vec<EnvRule>,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            expected_services: vec!["mysql".to_string(), "postgres".to_string()],
            env_rules: vec![
                EnvRule::new(&["mysql", "mariadb"], &["MYSQL_ROOT_PASSWORD", "MYSQL_DATABASE"]),
                EnvRule::new(&["postgres"], &["POSTGRES_PASSWORD", "POSTGRES_DB"]),
            ],
        }
    }
}

pub fn lint(file: &ComposeFile, options: &LintOptions) -> LintReport {
    let mut report = LintReport::default();

    check_version(file, &mut report);
    check_service_names(file, options, &mut report);

    let mut bindings: Vec<(&str, String, PortMapping)> = Vec::new();

    for (name, service) in &file.services {
        let name = name.as_str();

        if service.image.trim().is_empty() {
            report.push(Severity::Error, Some(name), "no image specified".to_string());
        } else if !service.has_explicit_tag() {
            report.push(
                Severity::Warning,
                Some(name),
                format!("image '{}' has no tag, 'latest' is not reproducible", service.image),
            );
        }

        for (text, parsed) in service.port_mappings() {
            match parsed {
                Ok(mapping) if mapping.host_port.is_none() => {
                    report.push(
                        Severity::Warning,
                        Some(name),
                        format!("port '{}' publishes no host port, the runtime will pick one", text),
                    );
                }
                Ok(mapping) => bindings.push((name, text, mapping)),
                Err(reason) => {
                    report.push(Severity::Error, Some(name), format!("invalid port '{}': {}", text, reason));
                }
            }
        }

        let env = service.environment_map();
        let family = service.image_family();
        for rule in options
            .env_rules
            .iter()
            .filter(|r| r.image_families.iter().any(|f| f == family))
        {
            for key in &rule.required_keys {
                match env.get(key) {
                    None => report.push(
                        Severity::Error,
                        Some(name),
                        format!("required environment variable {} is missing", key),
                    ),
                    Some(value) if value.trim().is_empty() => report.push(
                        Severity::Error,
                        Some(name),
                        format!("required environment variable {} is empty", key),
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    for (i, (service_a, text_a, a)) in bindings.iter().enumerate() {
        for (service_b, text_b, b) in &bindings[i + 1..] {
            if a.collides_with(b) {
                let message = if service_a == service_b {
                    format!("ports '{}' and '{}' bind the same host port", text_a, text_b)
                } else {
                    format!(
                        "host port {} of '{}' is also bound by service '{}' ('{}')",
                        a.host_port.unwrap_or_default(),
                        text_a,
                        service_b,
                        text_b
                    )
                };
                report.push(Severity::Error, Some(*service_a), message);
            }
        }
    }

    report
}

fn check_version(file: &ComposeFile, report: &mut LintReport) {
    match &file.version {
        None => {}
        Some(serde_yaml::Value::String(v)) if !v.trim().is_empty() => {}
        Some(other) => report.push(
            Severity::Warning,
            None,
            format!("version should be a non-empty string, got {:?}", other),
        ),
    }
}

fn check_service_names(file: &ComposeFile, options: &LintOptions, report: &mut LintReport) {
    if file.services.is_empty() {
        report.push(Severity::Error, None, "no services declared".to_string());
        return;
    }

    for expected in &options.expected_services {
        if !file.services.contains_key(expected) {
            report.push(
                Severity::Error,
                None,
                format!("expected service '{}' is not declared", expected),
            );
        }
    }

    for name in file.services.keys() {
        if !options.expected_services.contains(name) {
            report.push(
                Severity::Warning,
                Some(name.as_str()),
                "service is not one of the expected services".to_string(),
            );
        }
    }
}
