//! testscope Core Library
//!
//! Maps the files a change touched to the tests that exercised them in a
//! previous recorded run, and compiles those tests into a title filter a
//! test runner can apply.

pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod graph;
pub mod normalize;
pub mod obs;
pub mod pattern;
pub mod select;
pub mod telemetry;

pub use config::{ImpactConfig, CONFIG_FILE_NAME};
pub use engine::RelationshipManager;
pub use error::{ImpactError, Result};
pub use git::{changed_files, is_git_repo};
pub use graph::{ImpactResult, RelationshipGraph, TestRef};
pub use normalize::{CanonicalPath, PathNormalizer, DEFAULT_IGNORE_PATTERNS};
pub use pattern::TitlePattern;
pub use select::{
    find_related_tests, find_related_tests_with, impacted_tests_pattern, select_tests,
    select_tests_with, selection_from, NoImpactPolicy, Selection,
};
pub use telemetry::init_tracing;

pub use testscope_transport::{
    Connector, ConnectorOptions, EndpointOptions, ObjectStoreOptions, RelationshipKind,
    UploadStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
