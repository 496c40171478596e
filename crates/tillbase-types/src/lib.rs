pub mod actor;
pub mod envelope;
pub mod hash;
pub mod id;
pub mod time;
pub mod prelude;

#[cfg(feature = "schema")]
pub mod schema_gen {
    use super::*;
    use schemars::schema::RootSchema;
    use schemars::schema_for;

    pub fn envelope_schema() -> RootSchema {
        schema_for!(envelope::Envelope)
    }
}
