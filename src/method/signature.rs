//! `declare_method` and the recorded signature

use serde_json::Value;

use crate::field::ModelMetadata;
use crate::model::{bind_hook, bind_validator, ModelSlot};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{OdmError, OdmResult};
use crate::store::{DocHook, DocValidator};

use super::body::MethodBody;
use super::options::MethodOptions;

/// One declared method, with its body already bound to the owning model
#[derive(Debug, Clone)]
pub struct MethodSignature {
    name: String,
    hook: Option<DocHook>,
    validator: Option<DocValidator>,
    pre_hooks: Vec<String>,
    post_hooks: Vec<String>,
    validated_fields: Vec<String>,
    message: Option<String>,
}

impl MethodSignature {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hook(&self) -> Option<&DocHook> {
        self.hook.as_ref()
    }

    pub fn validator(&self) -> Option<&DocValidator> {
        self.validator.as_ref()
    }

    pub fn pre_hooks(&self) -> &[String] {
        &self.pre_hooks
    }

    pub fn post_hooks(&self) -> &[String] {
        &self.post_hooks
    }

    pub fn validated_fields(&self) -> &[String] {
        &self.validated_fields
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// A single name or a list of names
fn names(model: &str, method: &str, key: &str, value: Option<&Value>) -> OdmResult<Vec<String>> {
    let malformed = || {
        OdmError::malformed_declaration(
            model,
            method,
            format!("`{}` must be a name or a list of names", key),
        )
    };
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(name)) => Ok(vec![name.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(malformed))
            .collect(),
        Some(_) => Err(malformed()),
    }
}

pub(crate) fn declare_method(
    model: &'static str,
    slot: &ModelSlot,
    metadata: &mut ModelMetadata,
    name: &str,
    options: MethodOptions,
    body: MethodBody,
) -> OdmResult<()> {
    let pre_hooks = names(model, name, "pre", options.pre.as_ref())?;
    let post_hooks = names(model, name, "post", options.post.as_ref())?;
    let validated_fields = names(model, name, "validate", options.validate.as_ref())?;
    let hooked = !pre_hooks.is_empty() || !post_hooks.is_empty();

    let kind = body.kind();
    let (hook, validator) = match body {
        MethodBody::Hook(_) if !validated_fields.is_empty() => {
            return Err(OdmError::malformed_declaration(
                model,
                name,
                "a hook body cannot validate fields; declare it with `MethodBody::both`",
            ))
        }
        MethodBody::Validator(_) if hooked => {
            return Err(OdmError::malformed_declaration(
                model,
                name,
                "a validator body cannot run as a lifecycle hook; declare it with `MethodBody::both`",
            ))
        }
        MethodBody::Hook(f) => (Some(bind_hook(slot, f)), None),
        MethodBody::Validator(f) => (None, Some(bind_validator(slot, f))),
        MethodBody::Both { hook, validator } => (
            Some(bind_hook(slot, hook)),
            Some(bind_validator(slot, validator)),
        ),
    };

    metadata.push_method(MethodSignature {
        name: name.to_string(),
        hook,
        validator,
        pre_hooks,
        post_hooks,
        validated_fields,
        message: options.message,
    });
    log_event_with_fields(
        Event::MethodDeclared,
        &[("model", model), ("method", name), ("kind", kind)],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OdmErrorCode;
    use serde_json::json;

    fn declare(options: MethodOptions, body: MethodBody) -> OdmResult<ModelMetadata> {
        let mut metadata = ModelMetadata::new();
        declare_method("User", &ModelSlot::new(), &mut metadata, "check", options, body)?;
        Ok(metadata)
    }

    #[test]
    fn test_single_names_become_lists() {
        let metadata = declare(
            MethodOptions::new().pre("save").post(vec!["save", "remove"]),
            MethodBody::hook(|_| Ok(())),
        )
        .unwrap();
        let sig = &metadata.method_signatures()[0];
        assert_eq!(sig.pre_hooks(), ["save".to_string()]);
        assert_eq!(sig.post_hooks().len(), 2);
        assert!(sig.hook().is_some());
        assert!(sig.validator().is_none());
    }

    #[test]
    fn test_validator_signature() {
        let metadata = declare(
            MethodOptions::new().validate(vec!["email", "backupEmail"]).message("bad"),
            MethodBody::validator(|_, v| v.is_string()),
        )
        .unwrap();
        let sig = &metadata.method_signatures()[0];
        assert_eq!(sig.validated_fields(), ["email".to_string(), "backupEmail".to_string()]);
        assert_eq!(sig.message(), Some("bad"));
        assert!(!sig.validator().unwrap().is_async());
    }

    #[test]
    fn test_not_declared_properly() {
        let err = declare(MethodOptions::new().pre(json!(42)), MethodBody::hook(|_| Ok(()))).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::MalformedDeclaration);
        assert!(err.message().contains("not declared properly"));

        let err = declare(MethodOptions::new().validate(json!([1])), MethodBody::validator(|_, _| true)).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::MalformedDeclaration);
    }

    #[test]
    fn test_unknown_hook_names_are_kept() {
        let metadata = declare(MethodOptions::new().pre("archive"), MethodBody::hook(|_| Ok(()))).unwrap();
        assert_eq!(metadata.method_signatures()[0].pre_hooks(), ["archive".to_string()]);
    }

    #[test]
    fn test_dual_body_fills_both_slots() {
        let body = MethodBody::both(
            crate::method::HookFn::new(|_| Ok(())),
            crate::schema::ValidatorFn::new(|_, v| v.is_string()),
        );
        let metadata = declare(MethodOptions::new().pre("save").validate("email"), body).unwrap();
        let sig = &metadata.method_signatures()[0];
        assert!(sig.hook().is_some());
        assert!(sig.validator().is_some());
        assert_eq!(sig.pre_hooks(), ["save".to_string()]);
        assert_eq!(sig.validated_fields(), ["email".to_string()]);
    }

    #[test]
    fn test_body_kind_must_fit_slots() {
        assert!(declare(MethodOptions::new().pre("save"), MethodBody::validator(|_, _| true)).is_err());
        assert!(declare(MethodOptions::new().validate("email"), MethodBody::hook(|_| Ok(()))).is_err());
    }
}
