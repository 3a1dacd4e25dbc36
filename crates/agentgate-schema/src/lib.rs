//! # agentgate-schema
//!
//! JSON Schema validation for the agentgate pipeline.
//!
//! [`engine::JsonSchemaValidator`] implements
//! [`agentgate_core::traits::SchemaValidator`]. It checks ability params,
//! mapped policy params, policy configuration and every phase payload
//! against the shapes declared in the package contracts.
//!
//! Two string formats are understood on top of the JSON Schema vocabulary:
//!
//! - `evm-address`: `0x` followed by 40 hex digits
//! - `uint-string`: a base-10 unsigned integer, as big amounts travel
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use agentgate_schema::engine::JsonSchemaValidator;
//!
//! let validator = JsonSchemaValidator::new();
//! let report = validator.validate("swap:params", &schema, &params)?;
//! ```

pub mod engine;
