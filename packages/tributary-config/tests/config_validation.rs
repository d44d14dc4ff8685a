use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use tributary_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

static FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn set_key(value: &mut Value, section: &[&str], key: &str, new_value: Value) {
	let mut table = value.as_table_mut().expect("Template config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{name}]."));
	}

	table.insert(key.to_string(), new_value);
}

fn remove_section(value: &mut Value, section: &[&str], key: &str) {
	let mut table = value.as_table_mut().expect("Template config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{name}]."));
	}

	table.remove(key);
}

fn write_temp_config(value: &Value) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be after the Unix epoch.")
		.as_nanos();
	let counter = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!(
		"tributary_config_test_{}_{nanos}_{counter}.toml",
		std::process::id()
	));
	let payload = toml::to_string(value).expect("Failed to render config.");

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_value(value: &Value) -> tributary_config::Result<Config> {
	let path = write_temp_config(value);
	let result = tributary_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn validation_message(value: &Value) -> String {
	match load_value(value) {
		Err(Error::Validation { message }) => message,
		Err(err) => panic!("Expected validation error, got {err}."),
		Ok(_) => panic!("Expected validation error, got a valid config."),
	}
}

#[test]
fn sample_config_loads() {
	let cfg = load_value(&sample_value()).expect("Sample config must load.");

	assert_eq!(cfg.search.top_k, 5);
	assert_eq!(cfg.search.mode, "merge_all");
	assert_eq!(cfg.context.max_chars, 4_000);
	assert_eq!(cfg.storage.vector.backend, "qdrant");
	assert!(cfg.providers.rerank.is_some());
}

#[test]
fn search_context_and_memory_sections_default_when_absent() {
	let mut value = sample_value();

	remove_section(&mut value, &[], "search");
	remove_section(&mut value, &[], "context");
	remove_section(&mut value, &[], "memory");

	let cfg = load_value(&value).expect("Config without optional sections must load.");

	assert_eq!(cfg.search.top_k, 5);
	assert_eq!(cfg.search.threshold, 0.5);
	assert_eq!(cfg.search.bm25_weight, 0.5);
	assert_eq!(cfg.search.k_reranker, 3);
	assert_eq!(cfg.search.normalization, "raw");
	assert_eq!(cfg.context.max_chars, 4_000);
	assert_eq!(cfg.memory.dedup_similarity, 0.85);
}

#[test]
fn labels_are_normalized_before_validation() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "mode", Value::String(" Threshold_Filtered ".to_string()));
	set_key(&mut value, &["storage", "vector"], "backend", Value::String("QDRANT".to_string()));

	let cfg = load_value(&value).expect("Mixed-case labels must load.");

	assert_eq!(cfg.search.mode, "threshold_filtered");
	assert_eq!(cfg.storage.vector.backend, "qdrant");
}

#[test]
fn in_process_backend_does_not_require_url() {
	let mut value = sample_value();

	set_key(&mut value, &["storage", "vector"], "backend", Value::String("in_process".to_string()));
	set_key(&mut value, &["storage", "vector"], "url", Value::String("  ".to_string()));

	let cfg = load_value(&value).expect("In-process backend must load without a url.");

	assert!(cfg.storage.vector.url.is_none());
}

#[test]
fn qdrant_backend_requires_url() {
	let mut value = sample_value();

	set_key(&mut value, &["storage", "vector"], "url", Value::String(String::new()));

	assert_eq!(
		validation_message(&value),
		"storage.vector.url is required when storage.vector.backend is qdrant."
	);
}

#[test]
fn unknown_backend_is_rejected() {
	let mut value = sample_value();

	set_key(&mut value, &["storage", "vector"], "backend", Value::String("milvus".to_string()));

	assert_eq!(
		validation_message(&value),
		"storage.vector.backend must be one of qdrant or in_process."
	);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut value = sample_value();

	set_key(&mut value, &["providers", "embedding"], "dimensions", Value::Integer(768));

	assert_eq!(
		validation_message(&value),
		"providers.embedding.dimensions must match storage.vector.vector_dim."
	);
}

#[test]
fn bm25_weight_must_be_in_unit_range() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "bm25_weight", Value::Float(1.5));

	assert_eq!(validation_message(&value), "search.bm25_weight must be in the range 0.0-1.0.");
}

#[test]
fn top_k_must_be_positive() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "top_k", Value::Integer(0));

	assert_eq!(validation_message(&value), "search.top_k must be greater than zero.");
}

#[test]
fn unknown_mode_is_rejected() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "mode", Value::String("best_effort".to_string()));

	assert_eq!(
		validation_message(&value),
		"search.mode must be one of merge_all or threshold_filtered."
	);
}

#[test]
fn unknown_normalization_is_rejected() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "normalization", Value::String("z_score".to_string()));

	assert_eq!(validation_message(&value), "search.normalization must be one of raw or min_max.");
}

#[test]
fn rerank_requires_provider() {
	let mut value = sample_value();

	set_key(&mut value, &["search"], "rerank", Value::Boolean(true));
	remove_section(&mut value, &["providers"], "rerank");

	assert_eq!(validation_message(&value), "search.rerank requires a [providers.rerank] section.");
}

#[test]
fn empty_embedding_api_key_is_rejected() {
	let mut value = sample_value();

	set_key(&mut value, &["providers", "embedding"], "api_key", Value::String(" ".to_string()));

	assert_eq!(validation_message(&value), "Provider embedding api_key must be non-empty.");
}

#[test]
fn context_budget_must_be_positive() {
	let mut value = sample_value();

	set_key(&mut value, &["context"], "max_chars", Value::Integer(0));

	assert_eq!(validation_message(&value), "context.max_chars must be greater than zero.");
}

#[test]
fn dedup_similarity_must_be_in_unit_range() {
	let mut value = sample_value();

	set_key(&mut value, &["memory"], "dedup_similarity", Value::Float(-0.1));

	assert_eq!(validation_message(&value), "memory.dedup_similarity must be in the range 0.0-1.0.");
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("tributary_config_missing_file.toml");
	let err = tributary_config::load(&path).expect_err("Missing file must fail.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
