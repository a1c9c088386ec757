//! Bitrix24 access layer: the remote client seam, reusable capabilities,
//! typed repositories, the repository registry and application services.

pub mod capabilities;
pub mod client;
pub mod errors;
pub mod registry;
pub mod repositories;
pub mod services;
pub mod testing;
pub mod webhook;

pub use capabilities::{EntityMethods, FilterOperator, ListQuery};
pub use client::{BatchCommand, BatchCommands, BitrixClient, ClientError};
pub use errors::{RegistryError, RepositoryError, Severity};
pub use registry::RepositoryRegistry;
pub use repositories::{
    BitrixRepository, ContactRepository, CrmRepository, DealRepository, EntityRepository,
    SmartProcessRepository,
};
pub use services::{ContactSearch, ContactService, DealListOptions, DealService};
pub use webhook::WebhookClient;
