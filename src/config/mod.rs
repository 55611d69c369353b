//! Configuration management
//!
//! Node-level settings: ports, storage paths, bootstrap seeds, and static
//! peer declarations.

pub mod settings;

pub use settings::NodeConfig;
