//! Structured pipeline errors.
//!
//! Stage-level failures abort the rest of the run and surface a `kind` plus a
//! human-readable message. Per-animal "ancestor not found" is deliberately
//! *not* represented here: it is the expected trigger for the provenance
//! fallback chain, never an error.

/// Closed failure taxonomy for the estimation/ranking engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required input file (animal table, reference table) is absent.
    MissingInputFile,
    /// A required column is absent from an input table.
    MissingColumn,
    /// Connection/query failure against the reference store; fatal for the run.
    ReferenceLookup,
    /// Weight profile rejected at save time (`sum(|w|) != 100 ± 1e-4`).
    WeightProfileInvalid,
    /// Malformed arguments or input values caught before/at load time.
    InvalidInput,
    /// Output destination could not be written (after any retries).
    ExportFailed,
    /// Cancellation flag observed between stages.
    Cancelled,
}

impl ErrorKind {
    /// Process exit code for the binary edge.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::MissingInputFile
            | ErrorKind::MissingColumn
            | ErrorKind::InvalidInput
            | ErrorKind::WeightProfileInvalid => 2,
            ErrorKind::ExportFailed => 3,
            ErrorKind::ReferenceLookup => 4,
            ErrorKind::Cancelled => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::MissingInputFile => "missing-input-file",
            ErrorKind::MissingColumn => "missing-column",
            ErrorKind::ReferenceLookup => "reference-lookup",
            ErrorKind::WeightProfileInvalid => "weight-profile-invalid",
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::ExportFailed => "export-failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone)]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

impl std::fmt::Debug for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for PipelineError {}
