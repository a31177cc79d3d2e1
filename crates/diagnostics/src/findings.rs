//! Finding model: what the analyzer reports and how severe it is.

use std::fmt;

use container::ServiceKey;

/// How strongly a finding suggests a configuration mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Information => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// The rules the analyzer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticRule {
    /// A longer-lived service holds a shorter-lived dependency, silently
    /// extending the dependency's lifetime.
    CaptiveDependency,
    /// A transient service is tracked for disposal; without an ambient
    /// scope its instances are never released.
    DisposableTransient,
    /// A service declares more dependencies than the configured threshold.
    TooManyDependencies,
}

impl DiagnosticRule {
    pub fn id(&self) -> &'static str {
        match self {
            DiagnosticRule::CaptiveDependency => "captive-dependency",
            DiagnosticRule::DisposableTransient => "disposable-transient",
            DiagnosticRule::TooManyDependencies => "too-many-dependencies",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticRule::CaptiveDependency => Severity::Error,
            DiagnosticRule::DisposableTransient => Severity::Warning,
            DiagnosticRule::TooManyDependencies => Severity::Information,
        }
    }
}

impl fmt::Display for DiagnosticRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One diagnostic verdict about one registration.
#[derive(Debug, Clone)]
pub struct Finding {
    pub rule: DiagnosticRule,
    pub severity: Severity,
    pub service: ServiceKey,
    pub message: String,
}

impl Finding {
    pub(crate) fn new(rule: DiagnosticRule, service: ServiceKey, message: String) -> Self {
        Self {
            rule,
            severity: rule.default_severity(),
            service,
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity, self.rule, self.message
        )
    }
}
