use serde_json::{Map, Value};

/// Key under which `to_object` re-adds the error list when asked to.
pub const ERRORS_KEY: &str = "_errors";

/// Options for projecting a context into a plain JSON map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub include_errors: bool,
    pub exclude: Vec<String>,
}

impl Projection {
    #[must_use]
    pub fn with_errors(mut self) -> Self {
        self.include_errors = true;
        self
    }

    #[must_use]
    pub fn excluding<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Project `fields`, re-adding `errors` under [`ERRORS_KEY`] when requested.
    ///
    /// Exclusions apply last, so excluding [`ERRORS_KEY`] wins over `include_errors`.
    #[must_use]
    pub fn apply(&self, fields: &Map<String, Value>, errors: Option<&[Value]>) -> Map<String, Value> {
        let mut out = fields.clone();
        if self.include_errors
            && let Some(errors) = errors
        {
            out.insert(ERRORS_KEY.to_string(), Value::Array(errors.to_vec()));
        }
        for key in &self.exclude {
            out.remove(key);
        }
        out
    }
}

/// Apply a projection to any JSON map. There is no error list here, so
/// `include_errors` has nothing to add.
#[must_use]
pub fn project(fields: &Map<String, Value>, projection: &Projection) -> Map<String, Value> {
    projection.apply(fields, None)
}
