//! # agentgate-core
//!
//! Permission resolution and staged lifecycle execution for agentgate
//! abilities and their policies.
//!
//! This crate provides:
//! - The four trait seams (`ChainRegistry`, `PhaseRunner`, `SchemaValidator`,
//!   `ReportSink`)
//! - The `PermissionResolver`, `PolicyMap` and parameter mapper that turn an
//!   invocation request into a validated plan
//! - The `LifecycleExecutor` and `ResultAggregator` that run the plan
//! - The `Pipeline` that wires them together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentgate_core::{InvocationRequest, Pipeline, PipelineConfig};
//!
//! let report = pipeline.invoke(request).await?;
//! if !report.is_allowed() {
//!     println!("{:?}", report.deciding());
//! }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod lifecycle;
pub mod mapper;
pub mod pipeline;
pub mod policy_map;
pub mod resolver;
pub mod traits;

pub use catalog::PackageCatalog;
pub use config::PipelineConfig;
pub use pipeline::{InvocationRequest, Pipeline};
