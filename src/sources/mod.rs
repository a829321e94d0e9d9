//! Built-in adapters.
//!
//! | Adapter        | Typed | Writable | Backend                    |
//! |----------------|-------|----------|----------------------------|
//! | [`MemoryAdapter`] | yes | yes     | in-process mapping         |
//! | [`EnvAdapter`]    | no  | no      | environment variables      |
//! | [`YamlFile`]      | yes | yes     | YAML file via `serde_yaml` |
//! | [`JsonFile`]      | yes | yes     | JSON file via `serde_json` |

mod env;
mod file;
mod memory;

pub use env::EnvAdapter;
pub use file::{JsonFile, YamlFile};
pub use memory::MemoryAdapter;
