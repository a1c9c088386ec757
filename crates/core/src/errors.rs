use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "field mapping is not injective: attribute `{attribute}` is reached again from `{wire_key}`"
    )]
    NonInjectiveMapping { attribute: String, wire_key: String },
    #[error("field mapping lists wire key `{wire_key}` more than once")]
    DuplicateWireKey { wire_key: String },
    #[error("entity `{entity}` has no attribute `{attribute}`")]
    UnknownAttribute { entity: &'static str, attribute: String },
}
