//! Contract validation
//!
//! Checks a contract descriptor for shape problems before anything is
//! synthesized from it. Diagnostics accumulate rather than stopping at the
//! first problem, so one pass reports everything wrong with a contract.
//!
//! # Checks
//!
//! 1. **Naming**: contract, member and parameter names are non-empty and
//!    free of whitespace or control characters
//! 2. **Signature**: parameter names unique within a method; repeated
//!    property declarations and repeated method signatures are warnings
//! 3. **Coherence**: no name is both a property and a method; nested and
//!    extended contracts are themselves valid

use std::collections::BTreeSet;
use std::fmt;

use crate::contract::{Contract, Member};
use crate::types::TypeDesc;

// ── Result Types ──────────────────────────────────────────

/// Outcome of validating one contract
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no error-level diagnostic was produced
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect()
    }

    fn add_error(&mut self, kind: DiagnosticKind, message: String, member: Option<&str>) {
        self.push(Severity::Error, kind, message, member);
    }

    fn add_warning(&mut self, kind: DiagnosticKind, message: String, member: Option<&str>) {
        self.push(Severity::Warning, kind, message, member);
    }

    fn push(&mut self, severity: Severity, kind: DiagnosticKind, message: String, member: Option<&str>) {
        self.diagnostics.push(Diagnostic {
            severity,
            kind,
            message,
            member: member.map(str::to_string),
        });
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Member the finding is about, if any
    pub member: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.member {
            Some(member) => write!(f, "{} [{}] at '{}': {}", prefix, self.kind, member, self.message),
            None => write!(f, "{} [{}]: {}", prefix, self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Category of validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Naming,
    Signature,
    Coherence,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Naming => write!(f, "naming"),
            DiagnosticKind::Signature => write!(f, "signature"),
            DiagnosticKind::Coherence => write!(f, "coherence"),
        }
    }
}

// ── Public API ────────────────────────────────────────────

/// Validate a contract descriptor, reporting every problem found.
pub fn verify(contract: &Contract) -> ValidationResult {
    let mut result = ValidationResult::new();

    verify_naming(contract, &mut result);
    verify_signatures(contract, &mut result);
    verify_coherence(contract, &mut result);

    result
}

// ── Naming ────────────────────────────────────────────────

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn verify_naming(contract: &Contract, result: &mut ValidationResult) {
    if contract.name().trim().is_empty() {
        result.add_error(
            DiagnosticKind::Naming,
            "contract name must not be empty".into(),
            None,
        );
    }

    for member in contract.members() {
        if !is_valid_name(member.name()) {
            result.add_error(
                DiagnosticKind::Naming,
                format!("invalid member name {:?}", member.name()),
                Some(member.name()),
            );
        }
        for param in member.params() {
            if !is_valid_name(&param.name) {
                result.add_error(
                    DiagnosticKind::Naming,
                    format!("invalid parameter name {:?}", param.name),
                    Some(member.name()),
                );
            }
        }
    }
}

// ── Signatures ────────────────────────────────────────────

fn verify_signatures(contract: &Contract, result: &mut ValidationResult) {
    let mut properties = BTreeSet::new();
    let mut methods: Vec<&Member> = Vec::new();

    for member in contract.members() {
        if member.is_method() {
            verify_unique_params(member, result);
            if methods.iter().any(|m| m.name() == member.name() && m.same_signature(member)) {
                result.add_warning(
                    DiagnosticKind::Signature,
                    format!("duplicate method signature {}", member.signature()),
                    Some(member.name()),
                );
            }
            methods.push(member);
        } else if !properties.insert(member.name()) {
            result.add_warning(
                DiagnosticKind::Signature,
                format!("property '{}' declared more than once; the first wins", member.name()),
                Some(member.name()),
            );
        }
    }
}

fn verify_unique_params(method: &Member, result: &mut ValidationResult) {
    let mut seen = BTreeSet::new();
    for param in method.params() {
        if !seen.insert(param.name.as_str()) {
            result.add_error(
                DiagnosticKind::Signature,
                format!("duplicate parameter name '{}'", param.name),
                Some(method.name()),
            );
        }
    }
}

// ── Coherence ─────────────────────────────────────────────

fn verify_coherence(contract: &Contract, result: &mut ValidationResult) {
    verify_kind_clash(contract, result);

    for member in contract.members() {
        verify_nested_type(member.ty(), member.name(), result);
        for param in member.params() {
            verify_nested_type(&param.ty, member.name(), result);
        }
    }

    for base in contract.extends() {
        if let Err(err) = base.validate() {
            result.add_error(
                DiagnosticKind::Coherence,
                format!("extended contract is invalid: {}", err),
                None,
            );
        }
    }
}

/// A name may not be both a property and a method in one contract
fn verify_kind_clash(contract: &Contract, result: &mut ValidationResult) {
    let properties: BTreeSet<&str> = contract
        .members()
        .iter()
        .filter(|m| !m.is_method())
        .map(|m| m.name())
        .collect();
    let mut reported = BTreeSet::new();
    for method in contract.members().iter().filter(|m| m.is_method()) {
        if properties.contains(method.name()) && reported.insert(method.name()) {
            result.add_error(
                DiagnosticKind::Coherence,
                format!("'{}' is declared as both a property and a method", method.name()),
                Some(method.name()),
            );
        }
    }
}

fn verify_nested_type(ty: &TypeDesc, member: &str, result: &mut ValidationResult) {
    match ty {
        TypeDesc::Contract(nested) => {
            if let Err(err) = nested.validate() {
                result.add_error(
                    DiagnosticKind::Coherence,
                    format!("nested contract is invalid: {}", err),
                    Some(member),
                );
            }
        }
        TypeDesc::Nullable(inner) | TypeDesc::List(inner) => {
            verify_nested_type(inner, member, result)
        }
        _ => {}
    }
}
