//! Shared models for integration tests

#![allow(dead_code)]

use aeromodel::{
    typed, Field, FieldType, HookFn, Instance, MethodOptions, Model, ModelBuilder, OdmResult, Ref,
    Subdoc, ValidatorFn,
};

// =============================================================================
// Users and posts
// =============================================================================

pub struct User(pub Instance);

impl Model for User {
    const NAME: &'static str = "User";

    fn define(m: &mut ModelBuilder) -> OdmResult<()> {
        m.field::<String>("name", Field::new().required())?
            .field::<String>(
                "email",
                Field::new().validate(ValidatorFn::new(|_, value| {
                    value.is_null() || value.as_str().map_or(false, |s| s.contains('@'))
                })),
            )?
            .field::<String>("password", Field::new().hidden())?
            .field::<i64>("visits", Field::new().default_value(0))?
            .method(
                "count_visit",
                MethodOptions::new().pre("save"),
                HookFn::new(|user| {
                    let visits = user.get_as::<i64>("visits").unwrap_or(0);
                    user.set("visits", visits + 1);
                    Ok(())
                }),
            )?;
        Ok(())
    }

    fn from_instance(instance: Instance) -> Self {
        User(instance)
    }

    fn instance(&self) -> &Instance {
        &self.0
    }
}

pub struct Post(pub Instance);

impl Model for Post {
    const NAME: &'static str = "Post";

    fn define(m: &mut ModelBuilder) -> OdmResult<()> {
        m.field::<String>("title", Field::new())?;
        m.field::<Ref<User>>("creator", Field::new())?;
        m.field::<Vec<Ref<User>>>("readers", Field::new())?;
        Ok(())
    }

    fn from_instance(instance: Instance) -> Self {
        Post(instance)
    }

    fn instance(&self) -> &Instance {
        &self.0
    }
}

// =============================================================================
// Houses with nested rooms
// =============================================================================

pub struct House(pub Instance);

impl Model for House {
    const NAME: &'static str = "House";

    fn define(m: &mut ModelBuilder) -> OdmResult<()> {
        let rooms = Subdoc::new()
            .field("name", typed(FieldType::String))
            .field("owner", Field::reference::<User>())
            .field("code", Field::string())
            .hide(["code"])
            .array();
        m.field::<String>("address", Field::new())?
            .property("rooms", rooms)?;
        Ok(())
    }

    fn from_instance(instance: Instance) -> Self {
        House(instance)
    }

    fn instance(&self) -> &Instance {
        &self.0
    }
}
