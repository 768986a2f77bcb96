//! Linkage tree validation.
//!
//! Checks the structural invariants every complete dendrogram over `n`
//! items must satisfy:
//! - Exactly `n - 1` merges
//! - Children precede their parent (`child id < parent id`)
//! - Every node is merged at most once, and never with itself
//! - Each merge's size equals the sum of its children's sizes
//! - The root covers all `n` items
//! - Merge distances are finite and non-negative
//!
//! Non-monotone merge heights are reported as info only: they are legal,
//! but callers cutting the tree should not assume monotonicity.
//!
//! # Example
//!
//! ```rust
//! use sheaf::hierarchy::{Dendrogram, HealthCheck};
//!
//! let mut d = Dendrogram::new(3);
//! d.add_merge(0, 1, 0.2, 2);
//! d.add_merge(2, 3, 0.5, 3);
//!
//! let report = d.health_check();
//! assert!(report.is_healthy(), "{report}");
//! ```

use std::collections::HashMap;

use super::dendrogram::Dendrogram;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A problem that should be fixed.
    Error,
    /// A critical issue that may cause failures.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node id involved, if any.
    pub node_id: Option<usize>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node_id: None,
        }
    }

    /// Add a node id to this issue.
    pub fn with_node(mut self, id: usize) -> Self {
        self.node_id = Some(id);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node_id {
            write!(f, " (node {})", id)?;
        }
        Ok(())
    }
}

/// Report from a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Check if the report contains no errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// Check if there are any issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "Validation passed: no issues found");
        }

        let counts = self.counts();
        write!(f, "Validation report: ")?;

        let parts: Vec<String> = [
            (Severity::Critical, "critical"),
            (Severity::Error, "errors"),
            (Severity::Warning, "warnings"),
            (Severity::Info, "info"),
        ]
        .iter()
        .filter_map(|(sev, name)| counts.get(sev).map(|c| format!("{} {}", c, name)))
        .collect();

        writeln!(f, "{}", parts.join(", "))?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// Types that can be structurally validated.
pub trait HealthCheck {
    /// Validate and return a report.
    fn health_check(&self) -> ValidationReport;

    /// Quick check: returns true if healthy.
    fn is_healthy(&self) -> bool {
        self.health_check().is_healthy()
    }
}

impl HealthCheck for Dendrogram {
    fn health_check(&self) -> ValidationReport {
        validate_dendrogram(self)
    }
}

/// Validate the structure of a dendrogram.
pub fn validate_dendrogram(dendro: &Dendrogram) -> ValidationReport {
    let mut report = ValidationReport::new();
    let n = dendro.n_items();

    if n == 0 {
        report.add(ValidationIssue::new(
            Severity::Critical,
            "dendrogram has no items",
        ));
        return report;
    }
    if dendro.n_merges() + 1 != n {
        report.add(ValidationIssue::new(
            Severity::Error,
            format!(
                "expected {} merges for {n} items, found {}",
                n - 1,
                dendro.n_merges()
            ),
        ));
    }

    let mut merged = vec![false; dendro.n_nodes()];
    let mut prev_distance = f64::NEG_INFINITY;
    let mut non_monotone = 0usize;

    for (k, m) in dendro.merges().enumerate() {
        let id = n + k;
        let issue = |severity, message: String| ValidationIssue::new(severity, message).with_node(id);

        if m.cluster_a == m.cluster_b {
            report.add(issue(
                Severity::Error,
                format!("node {} merged with itself", m.cluster_a),
            ));
        }
        let mut children_ok = true;
        for child in [m.cluster_a, m.cluster_b] {
            if child >= id {
                report.add(issue(
                    Severity::Error,
                    format!("child {child} does not precede its parent"),
                ));
                children_ok = false;
            } else if merged[child] {
                report.add(issue(
                    Severity::Error,
                    format!("node {child} merged more than once"),
                ));
            } else {
                merged[child] = true;
            }
        }
        if children_ok {
            let expected = dendro.count(m.cluster_a) + dendro.count(m.cluster_b);
            if m.size != expected {
                report.add(issue(
                    Severity::Error,
                    format!("size {} but children hold {expected} items", m.size),
                ));
            }
        }
        if !m.distance.is_finite() || m.distance < 0.0 {
            report.add(issue(
                Severity::Error,
                format!("invalid merge distance {}", m.distance),
            ));
        } else {
            if m.distance < prev_distance {
                non_monotone += 1;
            }
            prev_distance = m.distance;
        }
    }

    if let Some(root) = dendro.root() {
        if dendro.count(root) != n {
            report.add(
                ValidationIssue::new(
                    Severity::Error,
                    format!("root covers {} of {n} items", dendro.count(root)),
                )
                .with_node(root),
            );
        }
    }
    if non_monotone > 0 {
        report.add(ValidationIssue::new(
            Severity::Info,
            format!("{non_monotone} merges are lower than their predecessor"),
        ));
    }

    report
}
