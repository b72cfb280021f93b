//! Diagnostic model: a typed, accumulated list of errors and warnings.
//! Five distinguishable error classes plus a return-path warning, each
//! carrying a severity, a source line, and a message.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NameResolution,
    TypeMismatch,
    ArrayMisuse,
    ConstViolation,
    ReturnPath,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn render(&self) -> String {
        match self.severity {
            Severity::Error => format!("line {}: {}", self.line, self.message),
            Severity::Warning => format!("Warning at line {}: {}", self.line, self.message),
        }
    }
}

/// Accumulates diagnostics during a single analysis pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn error(&mut self, kind: ErrorKind, line: usize, message: impl Into<String>) {
        self.items.push(Diagnostic { severity: Severity::Error, kind, line, message: message.into() });
    }

    pub fn warning(&mut self, kind: ErrorKind, line: usize, message: impl Into<String>) {
        self.items.push(Diagnostic { severity: Severity::Warning, kind, line, message: message.into() });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Nonzero on any error, zero otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            1
        } else {
            0
        }
    }

    pub fn render_all(&self) -> Vec<String> {
        self.items.iter().map(Diagnostic::render).collect()
    }
}
