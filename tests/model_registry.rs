//! Model Registry Tests
//!
//! Registration end to end:
//! - Declaration errors reject the whole model
//! - Method validators and hooks wire into the compiled schema
//! - A model reusing another's definition gets its own collection
//! - Configuration files drive registry-wide defaults

mod common;

use std::io::Write;

use aeromodel::schema::{keys, Marker, ModelRef};
use aeromodel::store::Engine;
use aeromodel::tree::Tree;
use aeromodel::{
    typed, Field, FieldType, HookFn, Instance, MethodBody, MethodOptions, Model, ModelBuilder, ModelExt, ModelRegistry,
    OdmConfig, OdmErrorCode, OdmResult, Ref, Subdoc, ValidateSpec, ValidatorFn,
};
use common::User;
use serde_json::json;

macro_rules! model {
    ($ty:ident, $name:literal, |$m:ident| $body:block) => {
        struct $ty(Instance);

        impl Model for $ty {
            const NAME: &'static str = $name;

            fn define($m: &mut ModelBuilder) -> OdmResult<()> $body

            fn from_instance(instance: Instance) -> Self {
                $ty(instance)
            }

            fn instance(&self) -> &Instance {
                &self.0
            }
        }
    };
}

// =============================================================================
// Declaration Error Tests
// =============================================================================

model!(Untyped, "Untyped", |m| {
    m.property("mystery", Field::new())?;
    Ok(())
});

model!(TwoRefs, "TwoRefs", |m| {
    let user = Tree::Leaf(Marker::Model(ModelRef::of::<User>()));
    m.property(
        "owners",
        Tree::from_pairs([(keys::REF, Tree::Seq(vec![user.clone(), user]))]),
    )?;
    Ok(())
});

model!(BadHook, "BadHook", |m| {
    m.method(
        "audit",
        MethodOptions::new().pre(json!({"save": true})),
        HookFn::new(|_| Ok(())),
    )?;
    Ok(())
});

model!(HookValidates, "HookValidates", |m| {
    m.field::<String>("name", Field::new())?;
    m.method(
        "audit",
        MethodOptions::new().validate("name"),
        HookFn::new(|_| Ok(())),
    )?;
    Ok(())
});

#[test]
fn test_declaration_errors_reject_model() {
    let registry = ModelRegistry::in_memory();
    registry.register::<User>().unwrap();

    let cases = [
        (registry.register::<Untyped>().err(), OdmErrorCode::TypeNotSet),
        (registry.register::<TwoRefs>().err(), OdmErrorCode::InvalidReferenceArray),
        (registry.register::<BadHook>().err(), OdmErrorCode::MalformedDeclaration),
        (registry.register::<HookValidates>().err(), OdmErrorCode::MalformedDeclaration),
    ];
    for (err, code) in cases {
        assert_eq!(err.map(|e| e.code()), Some(code));
    }
    assert_eq!(registry.model_names(), vec!["User"]);
    assert_eq!(registry.engine().model_names(), vec!["User".to_string()]);
}

model!(Shop, "Shop", |m| {
    let items = Subdoc::new()
        .field("name", typed(FieldType::String))
        .field("price", Field::new().required())
        .array();
    m.property("items", items)?;
    Ok(())
});

model!(Place, "Place", |m| {
    m.property(
        "address",
        Tree::from_pairs([
            ("street", typed(FieldType::String)),
            ("city", Field::new().required().build()),
        ]),
    )?;
    Ok(())
});

#[test]
fn test_untyped_nested_fields_rejected() {
    let registry = ModelRegistry::in_memory();

    let err = registry.register::<Shop>().err().unwrap();
    assert_eq!(err.code(), OdmErrorCode::TypeNotSet);
    assert_eq!(err.field(), Some("items.price"));

    let err = registry.register::<Place>().err().unwrap();
    assert_eq!(err.code(), OdmErrorCode::TypeNotSet);
    assert_eq!(err.field(), Some("address.city"));

    assert!(registry.is_empty());
    assert!(!registry.engine().has_model("Shop"));
}

#[test]
fn test_malformed_method_message_names_member() {
    let registry = ModelRegistry::in_memory();
    let err = registry.register::<BadHook>().err().unwrap();
    assert!(err.message().contains("BadHook.audit is not declared properly"));
}

// =============================================================================
// Alias Tests
// =============================================================================

model!(Legacy, "Legacy", |m| {
    let user = Tree::Leaf(Marker::Model(ModelRef::of::<User>()));
    m.property("owner", Tree::from_pairs([(keys::REFER, user)]))?;
    Ok(())
});

#[tokio::test]
async fn test_refer_alias_behaves_as_ref() {
    let registry = ModelRegistry::in_memory();
    let users = registry.register::<User>().unwrap();
    let legacy = registry.register::<Legacy>().unwrap();

    let schema = registry.compiled::<Legacy>().unwrap().schema();
    assert_eq!(schema.reference_for("owner"), Some("User"));

    let ada = users.create(json!({"name": "Ada"})).await.unwrap();
    let record = legacy.create(json!({"owner": ada.id()})).await.unwrap();
    let record = record.populate(&["owner"]).await.unwrap();
    assert!(record.reference::<User>("owner").unwrap().equals(&ada));
}

// =============================================================================
// Method Tests
// =============================================================================

model!(Account, "Account", |m| {
    m.field::<String>("handle", Field::new())?
        .field::<String>("email", Field::new())?
        .field::<i64>("saves", Field::new().default_value(0))?
        .method(
            "email_shape",
            // `nickname` is not a field; it is skipped
            MethodOptions::new()
                .validate(vec!["email", "nickname"])
                .message("{PATH} must contain @, got {VALUE}"),
            ValidatorFn::new(|_, value| value.as_str().map_or(true, |s| s.contains('@'))),
        )?
        .method(
            "handle_free",
            MethodOptions::new().validate("handle"),
            ValidatorFn::with_callback(|_, value, done| {
                done.finish(value.as_str() != Some("root"))
            }),
        )?
        .method(
            "count_save",
            MethodOptions::new().pre(vec!["save"]).post("archive"),
            HookFn::with_callback(|account, done| {
                let saves = account.get_as::<i64>("saves").unwrap_or(0);
                account.set("saves", saves + 1);
                done.next();
            }),
        )?
        .method(
            "no_banned",
            MethodOptions::new().pre("save"),
            HookFn::new(|account| match account.value("handle") {
                Some(handle) if handle == "banned" => Err("banned handle".to_string()),
                _ => Ok(()),
            }),
        )?;
    Ok(())
});

#[tokio::test]
async fn test_method_validators_and_hooks() {
    let registry = ModelRegistry::in_memory();
    let accounts = registry.register::<Account>().unwrap();

    let schema = registry.compiled::<Account>().unwrap().schema();
    assert!(!schema.has_path("nickname"));
    assert!(schema.path("handle").unwrap().validators[0].is_async);

    let err = accounts
        .create(json!({"handle": "ada", "email": "123"}))
        .await
        .err()
        .unwrap();
    let failure = err.validation().unwrap().get("email").unwrap();
    assert_eq!(failure.message, "email must contain @, got 123");

    let err = accounts.create(json!({"handle": "root"})).await.err().unwrap();
    assert!(err.validation().unwrap().get("handle").is_some());

    let err = accounts.create(json!({"handle": "banned"})).await.err().unwrap();
    assert_eq!(err.code(), OdmErrorCode::Storage);
    assert!(err.message().contains("banned handle"));
    assert_eq!(accounts.count(json!({})).unwrap(), 0);

    let ada = accounts
        .create(json!({"handle": "ada", "email": "ada@x.io"}))
        .await
        .unwrap();
    assert_eq!(ada.get_as::<i64>("saves"), Some(1));
}

model!(Ticket, "Ticket", |m| {
    m.field::<String>("code", Field::new())?
        .field::<i64>("stamps", Field::new().default_value(0))?
        .method(
            "stamp_and_check",
            MethodOptions::new().pre("save").validate("code"),
            MethodBody::both(
                HookFn::new(|ticket| {
                    let stamps = ticket.get_as::<i64>("stamps").unwrap_or(0);
                    ticket.set("stamps", stamps + 1);
                    Ok(())
                }),
                ValidatorFn::new(|_, value| value.as_str().map_or(true, |s| s.starts_with('T'))),
            ),
        )?;
    Ok(())
});

#[tokio::test]
async fn test_one_method_as_hook_and_validator() {
    let registry = ModelRegistry::in_memory();
    let tickets = registry.register::<Ticket>().unwrap();

    let err = tickets.create(json!({"code": "X1"})).await.err().unwrap();
    assert!(err.validation().unwrap().get("code").is_some());

    let ticket = tickets.create(json!({"code": "T1"})).await.unwrap();
    assert_eq!(ticket.get_as::<i64>("stamps"), Some(1));
}

model!(Shapes, "Shapes", |m| {
    let short = || ValidatorFn::new(|_, v| v.as_str().map_or(true, |s| s.len() < 5));
    let lower = || ValidatorFn::new(|_, v| v.as_str().map_or(true, |s| s == s.to_lowercase()));
    m.field::<String>("bare", Field::new().validate(short()))?
        .field::<String>("pair", Field::new().validate(ValidateSpec::pair(short(), "pair too long")))?
        .field::<String>("object", Field::new().validate(ValidateSpec::object(short(), "object too long")))?
        .field::<String>(
            "list",
            Field::new().validate(ValidateSpec::list([
                (short(), "list too long"),
                (lower(), "list not lowercase"),
            ])),
        )?;
    Ok(())
});

#[tokio::test]
async fn test_every_validate_shape_is_normalized() {
    let registry = ModelRegistry::in_memory();
    let shapes = registry.register::<Shapes>().unwrap();

    let schema = registry.compiled::<Shapes>().unwrap().schema();
    for path in ["bare", "pair", "object"] {
        assert_eq!(schema.path(path).unwrap().validators.len(), 1, "{}", path);
    }
    assert_eq!(schema.path("list").unwrap().validators.len(), 2);

    let record = shapes.construct(json!({
        "bare": "toolong",
        "pair": "toolong",
        "object": "toolong",
        "list": "ABC"
    }));
    let err = record.validate().await.err().unwrap();
    let failures = err.validation().unwrap();
    assert_eq!(failures.get("pair").unwrap().message, "pair too long");
    assert_eq!(failures.get("object").unwrap().message, "object too long");
    assert_eq!(failures.get("list").unwrap().message, "list not lowercase");
    assert!(failures.get("bare").is_some());
}

// =============================================================================
// Definition Reuse Tests
// =============================================================================

struct Admin(Instance);

impl Model for Admin {
    const NAME: &'static str = "Admin";

    fn define(m: &mut ModelBuilder) -> OdmResult<()> {
        User::define(m)?;
        m.field::<Vec<String>>("grants", Field::new())?;
        m.field::<Ref<User>>("mentor", Field::new())?;
        Ok(())
    }

    fn from_instance(instance: Instance) -> Self {
        Admin(instance)
    }

    fn instance(&self) -> &Instance {
        &self.0
    }
}

#[tokio::test]
async fn test_reused_definition_has_own_collection() {
    let registry = ModelRegistry::in_memory();
    let users = registry.register::<User>().unwrap();
    let admins = registry.register::<Admin>().unwrap();
    assert_eq!(admins.collection_name(), "admins");

    let root = admins
        .create(json!({"name": "Root", "grants": ["all"]}))
        .await
        .unwrap();
    // inherited hook runs with the admin record
    assert_eq!(root.get_as::<i64>("visits"), Some(1));
    assert_eq!(root.get_as::<Vec<String>>("grants"), Some(vec!["all".to_string()]));
    assert_eq!(users.count(json!({})).unwrap(), 0);
    assert_eq!(admins.count(json!({})).unwrap(), 1);

    let found = admins.find_one(json!({"name": "Root"})).await.unwrap().unwrap();
    assert!(found.instance().downcast::<Admin>().is_some());
    assert!(found.instance().downcast::<User>().is_none());
}

// =============================================================================
// Configuration Tests
// =============================================================================

model!(Note, "Note", |m| {
    m.field::<String>("text", Field::new())?;
    Ok(())
});

#[tokio::test]
async fn test_config_file_drives_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"timestamps": false, "version_key": "_rev", "pluralize_collections": false, "log_level": "warn"}}"#
    )
    .unwrap();

    let config = OdmConfig::from_file(file.path()).unwrap();
    let registry = ModelRegistry::new(Engine::in_memory(), config).unwrap();
    let notes = registry.register::<Note>().unwrap();
    assert_eq!(notes.collection_name(), "note");

    let schema = registry.compiled::<Note>().unwrap().schema();
    assert!(schema.timestamps().is_none());
    assert_eq!(schema.version_key(), Some("_rev"));

    let note = notes.create(json!({"text": "hi"})).await.unwrap();
    assert_eq!(note.version(), Some(0));
    assert_eq!(note.value("_rev"), Some(json!(0)));
    assert!(note.created_at().is_none());
}

// =============================================================================
// Teardown Tests
// =============================================================================

#[tokio::test]
async fn test_teardown_keeps_records() {
    let registry = ModelRegistry::in_memory();
    let users = registry.register::<User>().unwrap();
    users.create(json!({"name": "Ada"})).await.unwrap();

    assert_eq!(registry.teardown().unwrap(), 1);
    assert!(!registry.is_mapped::<User>());
    assert_eq!(
        registry.collection::<User>().err().map(|e| e.code()),
        Some(OdmErrorCode::NotRegistered)
    );

    let users = registry.register::<User>().unwrap();
    assert_eq!(users.count(json!({})).unwrap(), 1);
}
