//! `tessera check` command implementation.
//!
//! Validates the configuration file and the catalog it points to:
//! - configuration values (page size, pipeline name, model credentials)
//! - catalog references (tables and `Table.Column` names resolve)
//! - warnings for selectors that can never take effect

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tessera_core::{Catalog, TesseraConfig};
use tessera_pipeline::PipelineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: &'static str,
    pub message: String,
    pub file: Option<PathBuf>,
}

impl CheckFinding {
    fn new(severity: Severity, category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            file: None,
        }
    }

    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl std::fmt::Display for CheckFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;
        if let Some(file) = &self.file {
            write!(f, " ({})", file.display())?;
        }
        Ok(())
    }
}

/// Run every check and print the findings. Returns `true` when no errors
/// were found.
pub fn run(config_path: &Path) -> Result<bool> {
    let findings = check(config_path);
    for finding in &findings {
        println!("{}", finding);
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    let warnings = findings
        .iter()
        .filter(|f| f.severity == Severity::Warning)
        .count();
    println!("{} error(s), {} warning(s)", errors, warnings);
    Ok(errors == 0)
}

pub fn check(config_path: &Path) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    let config = match TesseraConfig::load_with_context(config_path) {
        Ok(config) => config,
        Err(e) => {
            findings.push(CheckFinding::error("config", e.to_string()).with_file(config_path));
            return findings;
        }
    };

    if let Err(e) = config.validate() {
        findings.push(CheckFinding::error("config", e.to_string()).with_file(config_path));
    }
    if let Err(e) = PipelineSettings::from_config(&config) {
        findings.push(
            CheckFinding::error("pipeline", format!("{}: '{}'", e, config.pipeline.name))
                .with_file(config_path),
        );
    }

    let Some(catalog_file) = config.catalog_file.as_ref() else {
        return findings;
    };
    match Catalog::from_file(catalog_file) {
        Ok(catalog) => findings.extend(check_catalog(&catalog, catalog_file)),
        Err(e) => {
            findings.push(CheckFinding::error("catalog", e.to_string()).with_file(catalog_file));
        }
    }
    findings
}

/// Consistency warnings for a catalog that loaded successfully.
fn check_catalog(catalog: &Catalog, file: &Path) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    let enabled = catalog.data_sources.iter().filter(|d| d.enabled).count();
    if enabled == 0 {
        findings.push(CheckFinding::warning("catalog", "no enabled data sources").with_file(file));
    }

    for ds in &catalog.data_sources {
        if !catalog.tables.iter().any(|t| t.data_source == ds.id) {
            findings.push(
                CheckFinding::warning(
                    "catalog",
                    format!("data source '{}' declares no tables", ds.display_name),
                )
                .with_file(file),
            );
        }
    }

    for table in &catalog.tables {
        if !catalog.columns.iter().any(|c| c.table == table.id) {
            findings.push(
                CheckFinding::warning(
                    "catalog",
                    format!("table '{}' declares no columns and is never visible", table.name),
                )
                .with_file(file),
            );
        }
    }

    // Includes of globally private tables never take effect.
    for selector in &catalog.role_tables {
        for id in &selector.include {
            let denied = catalog
                .private_tables
                .iter()
                .any(|p| p.tables.contains(id));
            if let (true, Some(table)) = (denied, catalog.tables.iter().find(|t| t.id == *id)) {
                findings.push(
                    CheckFinding::warning(
                        "policy",
                        format!(
                            "role '{}' includes private table '{}'; the include has no effect",
                            selector.role, table.name
                        ),
                    )
                    .with_file(file),
                );
            }
        }
    }

    let defined: BTreeSet<&str> = catalog
        .role_tables
        .iter()
        .map(|s| s.role.as_str())
        .chain(catalog.role_columns.iter().map(|s| s.role.as_str()))
        .chain(catalog.role_filters.iter().map(|s| s.role.as_str()))
        .collect();
    for user in &catalog.users {
        for role in &user.roles {
            if !defined.contains(role.as_str()) {
                findings.push(
                    CheckFinding::info(
                        "users",
                        format!(
                            "user '{}' holds role '{}' which no selector mentions",
                            user.username, role
                        ),
                    )
                    .with_file(file),
                );
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
users:
  - username: alice
    roles: [sales, intern]
datasources:
  - id: 1
    display_name: chinook
    kind: sqlite
    connection_str: sqlite://chinook.db
    tables:
      - name: Invoice
        columns:
          - { name: InvoiceId, data_type: INTEGER }
      - name: Empty
    private_tables: [Invoice]
    roles:
      sales:
        include_tables: [Invoice]
"#;

    fn write_project(config: &str, catalog: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("catalog.yaml"), catalog).unwrap();
        let config_path = dir.path().join("tessera.yaml");
        std::fs::write(&config_path, config).unwrap();
        (dir, config_path)
    }

    fn messages(findings: &[CheckFinding], severity: Severity) -> Vec<String> {
        findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| f.message.clone())
            .collect()
    }

    #[test]
    fn test_valid_project_has_only_warnings() {
        let (_dir, path) = write_project("catalog_file: catalog.yaml\n", CATALOG);
        let findings = check(&path);

        assert!(messages(&findings, Severity::Error).is_empty());
        let warnings = messages(&findings, Severity::Warning);
        assert!(warnings.iter().any(|m| m.contains("'Empty' declares no columns")));
        assert!(warnings.iter().any(|m| m.contains("includes private table 'Invoice'")));
        let infos = messages(&findings, Severity::Info);
        assert_eq!(infos, vec!["user 'alice' holds role 'intern' which no selector mentions"]);
    }

    #[test]
    fn test_unknown_pipeline_is_an_error() {
        let (_dir, path) = write_project(
            "catalog_file: catalog.yaml\npipeline:\n  name: two_step\n",
            CATALOG,
        );
        let errors = messages(&check(&path), Severity::Error);
        assert_eq!(errors, vec!["Invalid Pipeline Name: 'two_step'"]);
    }

    #[test]
    fn test_bad_catalog_reference_is_an_error() {
        let (_dir, path) = write_project(
            "catalog_file: catalog.yaml\n",
            "datasources:\n  - id: 1\n    display_name: x\n    connection_str: x\n    private_tables: [Nope]\n",
        );
        let errors = messages(&check(&path), Severity::Error);
        assert_eq!(errors, vec!["data source 1: unknown table 'Nope'"]);
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let findings = check(&dir.path().join("absent.yaml"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
    }
}
