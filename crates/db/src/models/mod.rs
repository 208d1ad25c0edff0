//! Row structs matching the tables.
//!
//! Each struct derives `FromRow` and converts into the corresponding
//! domain type from `praxis-core` (`From` where the mapping cannot fail,
//! `TryFrom` where a stored string or JSONB blob has to parse).

pub mod history;
pub mod notification;
pub mod request;
pub mod staff;
pub mod workflow;
