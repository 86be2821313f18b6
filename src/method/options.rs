//! Method declaration options

use serde_json::Value;

/// `{pre, post, validate, message}` of a method declaration.
///
/// `pre`, `post` and `validate` each take a single name or a list of
/// names; anything else is rejected when the method is declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodOptions {
    pub pre: Option<Value>,
    pub post: Option<Value>,
    pub validate: Option<Value>,
    pub message: Option<String>,
}

impl MethodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle name(s) to run before: init, validate, save, remove
    pub fn pre(mut self, hooks: impl Into<Value>) -> Self {
        self.pre = Some(hooks.into());
        self
    }

    pub fn post(mut self, hooks: impl Into<Value>) -> Self {
        self.post = Some(hooks.into());
        self
    }

    /// Field name(s) this method validates
    pub fn validate(mut self, fields: impl Into<Value>) -> Self {
        self.validate = Some(fields.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Reads options from a JSON object, e.g. `{"pre": ["save"]}`
    pub fn from_json(value: &Value) -> Self {
        Self {
            pre: value.get("pre").cloned(),
            post: value.get("post").cloned(),
            validate: value.get("validate").cloned(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_json_agree() {
        let built = MethodOptions::new()
            .pre(vec!["save", "validate"])
            .validate("email")
            .message("bad email");
        let parsed = MethodOptions::from_json(&json!({
            "pre": ["save", "validate"],
            "validate": "email",
            "message": "bad email"
        }));
        assert_eq!(built, parsed);
    }
}
