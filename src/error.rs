use std::collections::BTreeMap;

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self { message, errors }
    }

    /// Single field validation error
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::new(errors)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if self.errors.len() > 1 {
            for (field, messages) in &self.errors {
                write!(f, "\n  {}: {}", field, messages.join("; "))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error of a `Result<(), String>` check, if any
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn build(self) -> Option<ValidationErrors> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ValidationErrors::new(self.errors))
        }
    }

    /// Return Ok(()) if no errors, or Err(ValidationErrors) if there are errors
    pub fn finish(self) -> Result<(), ValidationErrors> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
