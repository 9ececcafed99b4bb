use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerErrorKind {
    /// Bad submission shape, unmet state-machine precondition, unknown case.
    Validation,
    /// Authorization gate said no. Callers get no ledger detail beyond this.
    Permission,
    /// Reserved for optimistic-lock failures; no transition raises it yet.
    Conflict,
    /// Transaction or blob-store failure; the batch was rolled back.
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerError {
    pub kind: LedgerErrorKind,
    pub message: String,
    pub case_no: Option<i64>,
    pub field: Option<String>,
    pub detail: Option<String>,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            case_no: None,
            field: None,
            detail: None,
        }
    }

    pub fn with_case(mut self, case_no: i64) -> Self {
        self.case_no = Some(case_no);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Validation, message)
    }

    pub fn permission() -> Self {
        Self::new(LedgerErrorKind::Permission, "forbidden")
    }

    pub fn storage(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(LedgerErrorKind::Storage, "storage failure").with_detail(detail)
    }

    pub fn case_not_found(case_no: i64) -> Self {
        Self::new(
            LedgerErrorKind::Validation,
            format!("test case {} not found", case_no),
        )
        .with_case(case_no)
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.case_no {
            Some(no) => write!(f, "{} (case {})", self.message, no),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Walk an anyhow chain and recover the typed ledger error, if any.
pub fn try_map_error(err: &anyhow::Error) -> Option<&LedgerError> {
    err.chain().find_map(|e| e.downcast_ref::<LedgerError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_error_survives_anyhow_context() {
        let err = anyhow::Error::new(LedgerError::validation("executor is required"))
            .context("submit failed");
        let mapped = try_map_error(&err).expect("should recover LedgerError");
        assert_eq!(mapped.kind, LedgerErrorKind::Validation);
        assert_eq!(mapped.message, "executor is required");
    }

    #[test]
    fn permission_error_carries_no_detail() {
        let err = LedgerError::permission();
        assert_eq!(err.to_string(), "forbidden");
        assert!(err.detail.is_none());
    }
}
