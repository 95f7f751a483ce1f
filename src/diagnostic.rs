use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: String,
    pub kind: String,
    pub message: String,
    pub location: String,
}

impl Diagnostic {
    pub fn error(kind: &str, message: String, location: String) -> Self {
        Self {
            severity: "error".into(),
            kind: kind.into(),
            message,
            location,
        }
    }

    pub fn warning(kind: &str, message: String, location: String) -> Self {
        Self {
            severity: "warning".into(),
            kind: kind.into(),
            message,
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {} ({})",
            self.severity, self.kind, self.message, self.location
        )
    }
}
