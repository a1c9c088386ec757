pub mod contact;
pub mod deal;
pub mod entity;
pub mod mapping;
pub mod multi_field;
pub mod smart_process;
pub mod wire;
