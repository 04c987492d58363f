//! Declarative macros for document types

pub mod macros;
