pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;

pub use config::{AppConfig, BitrixConfig, ConfigError, LoadOptions, LogFormat, LoggingConfig};
pub use domain::contact::Contact;
pub use domain::deal::Deal;
pub use domain::entity::{attributes_to_wire, Entity};
pub use domain::mapping::FieldMapping;
pub use domain::multi_field::MultiValueField;
pub use domain::smart_process::SmartProcess;
pub use domain::wire::{EntityId, WireRecord};
pub use errors::DomainError;
pub use logging::init_logging;
