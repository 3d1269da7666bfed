//! Datapub registration client for the DataCite REST API.
//!
//! This crate is a client only: it converts an entity's exported metadata
//! into the DataCite envelope, validates it, and submits it under a DOI that
//! the ledger has already reserved. The metadata converter and validator are
//! consumed as black boxes through [`MetadataSource`].

#![deny(unsafe_code)]

mod client;
mod error;
mod metadata;

pub use client::{
    DataCiteClient, DataCiteConfig, RegistrationApi, RegistrationRequest,
};
pub use error::{RegistrarError, RegistrarResult};
pub use metadata::{MetadataError, MetadataSource};
