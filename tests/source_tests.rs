//! Integration tests for single sources and the file adapters.

use chrono::NaiveDate;
use config_stacker::converters::{Converter, ConverterRegistry, dates};
use config_stacker::error::ErrorCode;
use config_stacker::sources::{JsonFile, MemoryAdapter, YamlFile};
use config_stacker::{
    Adapter, ConvertedValue, KeyPath, Mapping, MappingNode, Source, SourceList, StackedConfig,
};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

/// Adapter counting reads, with writes that always fail.
#[derive(Clone, Default)]
struct CountingAdapter {
    reads: Arc<AtomicUsize>,
}

impl Adapter for CountingAdapter {
    fn name(&self) -> &str {
        "counting"
    }

    fn read_all(&self) -> anyhow::Result<Mapping> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"a": 1}).as_object().cloned().unwrap_or_default())
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn write_all(&self, _data: &Mapping) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

fn path(key: &str) -> KeyPath {
    KeyPath::parse(key)
}

// =============================================================================
// Caching
// =============================================================================

#[test]
fn test_uncached_source_reads_every_time() {
    let adapter = CountingAdapter::default();
    let source = Source::new(adapter.clone());

    source.read().unwrap();
    source.read().unwrap();
    assert_eq!(adapter.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cache_toggling() {
    let adapter = CountingAdapter::default();
    let source = Source::new(adapter.clone());

    source.enable_cache();
    assert!(source.is_cached());
    source.read().unwrap();
    source.read().unwrap();
    assert_eq!(adapter.reads.load(Ordering::SeqCst), 1);

    source.clear_cache();
    assert!(source.is_cached());
    source.read().unwrap();
    assert_eq!(adapter.reads.load(Ordering::SeqCst), 2);

    source.disable_cache();
    assert!(!source.is_cached());
    source.read().unwrap();
    source.read().unwrap();
    assert_eq!(adapter.reads.load(Ordering::SeqCst), 4);
}

#[test]
fn test_cache_toggling_keeps_list_order() {
    let first = Source::new(MemoryAdapter::new(json!({"a": 1})).named("first"));
    let second = Source::new(MemoryAdapter::new(json!({"a": 2})).named("second"));
    let list: SourceList = [first.clone(), second.clone()].into_iter().collect();
    let config = StackedConfig::new(list);

    second.enable_cache();
    first.disable_cache();

    let names: Vec<String> = config
        .source_list()
        .iter_by_priority()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(names, ["second", "first"]);
    assert_eq!(config.get("a").unwrap().into_value(), Some(json!(2)));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_adapter_write_error_is_wrapped() {
    let source = Source::new(CountingAdapter::default());

    let err = source.write(&path("a"), 2).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SourceWriteError);
    assert!(err.to_string().contains("counting"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_read_only_source() {
    let source = Source::builder(MemoryAdapter::new(json!({"a": 1})))
        .readonly(true)
        .build();

    assert_eq!(
        source.root().set("a", 2).unwrap_err().code(),
        ErrorCode::ReadOnly
    );
    assert_eq!(source.remove(&path("a")).unwrap_err().code(), ErrorCode::ReadOnly);
}

#[test]
fn test_adapter_without_write_support_is_read_only() {
    struct ReadOnlyAdapter;

    impl Adapter for ReadOnlyAdapter {
        fn name(&self) -> &str {
            "read-only"
        }

        fn read_all(&self) -> anyhow::Result<Mapping> {
            Ok(Mapping::new())
        }
    }

    let source = Source::new(ReadOnlyAdapter);
    assert!(!source.is_writable());
    assert_eq!(
        source.write(&path("a"), 1).unwrap_err().code(),
        ErrorCode::ReadOnly
    );
}

// =============================================================================
// Sections
// =============================================================================

#[test]
fn test_source_section_access() {
    let source = Source::new(MemoryAdapter::new(json!({"a": 1, "b": {"c": 2, "d": {"e": 3}}})));
    let root = source.root();

    assert_eq!(root.keys().unwrap(), ["a", "b"]);
    assert_eq!(root.get_path("b.d.e").unwrap().into_value(), Some(json!(3)));
    assert!(root.contains("b").unwrap());
    assert!(!root.contains("x").unwrap());

    let b = root.get("b").unwrap().into_section().unwrap();
    b.set_path("d.f", "new").unwrap();
    assert_eq!(
        Value::Object(b.dump().unwrap()),
        json!({"c": 2, "d": {"e": 3, "f": "new"}})
    );
    assert_eq!(b.len().unwrap(), 2);
}

#[test]
fn test_date_converter_round_trip() {
    let source = Source::builder(MemoryAdapter::new(json!({"release": {"date": "2020-02-29"}})))
        .with_converters(ConverterRegistry::new().with(dates("release.date", None)))
        .build();

    let node = source.root().get_path("release.date").unwrap();
    assert_eq!(
        node.downcast_ref::<NaiveDate>(),
        NaiveDate::from_ymd_opt(2020, 2, 29).as_ref()
    );

    let next = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
    source
        .write(&path("release.date"), ConvertedValue::object(next))
        .unwrap();
    assert_eq!(
        source.read_path(&path("release.date")).unwrap(),
        Some(json!("2021-03-01"))
    );
    assert_eq!(
        Value::Object(source.dump().unwrap()),
        json!({"release": {"date": "2021-03-01"}})
    );
}

#[test]
fn test_unserializable_object_keeps_stored_data() {
    #[derive(Debug, serde::Deserialize)]
    struct Handle {
        #[allow(dead_code)]
        fd: i32,
    }

    impl serde::Serialize for Handle {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("handles are process-local"))
        }
    }

    let source = Source::builder(MemoryAdapter::new(json!({"handle": {"fd": 3}})))
        .with_converters(ConverterRegistry::new().with(Converter::serde::<Handle>("handle")))
        .build();

    let err = source
        .write(&path("handle"), ConvertedValue::object(Handle { fd: 4 }))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotWritable);
    assert_eq!(
        source.read_path(&path("handle")).unwrap(),
        Some(json!({"fd": 3}))
    );
}

// =============================================================================
// File adapters
// =============================================================================

#[test]
fn test_yaml_file_through_stack() {
    let dir = TempDir::new().unwrap();
    let defaults = dir.path().join("defaults.yaml");
    let local = dir.path().join("local.json");
    fs::write(&defaults, "server:\n  host: localhost\n  port: 8080\n").unwrap();

    let local_source = Source::new(JsonFile::new(&local).optional());
    let config = StackedConfig::builder()
        .source(Source::builder(YamlFile::new(&defaults)).readonly(true).build())
        .source(local_source.clone())
        .build();

    assert_eq!(
        config.get_path("server.port").unwrap().into_value(),
        Some(json!(8080))
    );

    // The key exists only in a locked source.
    assert_eq!(
        config.set_path("server.port", 9000).unwrap_err().code(),
        ErrorCode::NoWritableSource
    );

    config.set_path("server.debug", true).unwrap();
    let written: Value = serde_json::from_str(&fs::read_to_string(&local).unwrap()).unwrap();
    assert_eq!(written, json!({"server": {"debug": true}}));
    assert_eq!(
        Value::Object(config.dump().unwrap()),
        json!({"server": {"host": "localhost", "port": 8080, "debug": true}})
    );
}

#[test]
fn test_invalid_yaml_is_read_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.yaml");
    fs::write(&file, "a: [1, 2\n").unwrap();

    let source = Source::new(YamlFile::new(&file));
    assert_eq!(source.read().unwrap_err().code(), ErrorCode::SourceReadError);
}

#[test]
fn test_cached_file_source_ignores_outside_edits_until_cleared() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("config.yaml");
    fs::write(&file, "a: 1\n").unwrap();

    let source = Source::builder(YamlFile::new(&file)).cached(true).build();
    assert_eq!(source.read_path(&path("a")).unwrap(), Some(json!(1)));

    fs::write(&file, "a: 2\n").unwrap();
    assert_eq!(source.read_path(&path("a")).unwrap(), Some(json!(1)));

    source.clear_cache();
    assert_eq!(source.read_path(&path("a")).unwrap(), Some(json!(2)));
}
