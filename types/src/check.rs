use serde_json::Value;

/// One `(condition, error?)` pair for `reject_if_any`.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub condition: bool,
    pub error: Option<Value>,
}

impl Check {
    #[must_use]
    pub const fn new(condition: bool) -> Self {
        Self {
            condition,
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(condition: bool, error: impl Into<Value>) -> Self {
        Self {
            condition,
            error: Some(error.into()),
        }
    }
}

impl From<bool> for Check {
    fn from(condition: bool) -> Self {
        Self::new(condition)
    }
}

impl<E: Into<Value>> From<(bool, E)> for Check {
    fn from((condition, error): (bool, E)) -> Self {
        Self::with_error(condition, error)
    }
}
