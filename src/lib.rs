//! Layered configuration.
//!
//! Stack several configuration sources (files, environment variables,
//! in-memory mappings) behind one prioritized nested mapping:
//!
//! ```
//! use config_stacker::{MappingNode, StackedConfig};
//! use config_stacker::sources::{EnvAdapter, MemoryAdapter};
//! use serde_json::json;
//!
//! let config = StackedConfig::builder()
//!     .source(MemoryAdapter::new(json!({"server": {"port": 8080, "debug": false}})))
//!     .source(EnvAdapter::new("MYAPP").with_vars([("MYAPP_SERVER_PORT", "9000")]))
//!     .build();
//!
//! // Environment values are strings; the typed source supplies the type.
//! let port = config.get_path("server.port").unwrap();
//! assert_eq!(port.into_value(), Some(json!(9000)));
//! ```

pub mod cli;
pub mod coerce;
pub mod converters;
pub mod error;
pub mod keys;
pub mod loader;
pub mod merge;
pub mod node;
pub mod source;
pub mod source_list;
pub mod sources;
pub mod stacker;
pub mod strategies;
pub mod value;
pub mod watcher;

pub use converters::{Converter, ConverterRegistry};
pub use error::{ErrorCode, Result, StackError};
pub use keys::{KeyPath, KeyPattern};
pub use node::MappingNode;
pub use source::{Adapter, Source, SourceSection};
pub use source_list::SourceList;
pub use stacker::StackedConfig;
pub use strategies::{Strategy, StrategyMap};
pub use value::{ConvertedValue, Mapping, Node, Object};
