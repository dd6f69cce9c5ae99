//! In-process stand-in for the native engine
//!
//! `MockNative` keeps a tiny repository in memory: records keyed by data
//! source and record id, each assigned to an entity, plus a configuration
//! registry whose documents declare the known data sources. Every module
//! handle it hands out shares that state, so an engine handle sees records
//! loaded through another engine handle, and a reinitialized engine sees
//! the data sources of its new configuration.
//!
//! Besides behaving like the native layer, the mock records what happened
//! to it (call history, flags received, configuration ids passed to
//! `init_with_config_id` and `reinit`) and can be told to fail the next
//! call to a given operation.

use crate::{
    NativeConfigManager, NativeConfigured, NativeDiagnostic, NativeEngine, NativeLayer,
    NativeLifecycle, NativeProduct, NativeReply, ReturnCode, NATIVE_FAILURE,
};
use meld_core::{codes, ConfigId, FacetKind};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Data sources declared by the configuration a fresh mock starts with
pub const DEFAULT_DATA_SOURCES: &[&str] = &["TEST", "CUSTOMERS"];

type Outcome<T> = Result<T, (i64, String)>;

#[derive(Debug, Default)]
struct ModuleState {
    open: bool,
    last_error: Option<(i64, String)>,
}

#[derive(Debug)]
struct MockRecord {
    entity_id: i64,
    document: Value,
}

#[derive(Debug)]
struct MockConfig {
    comment: String,
    document: String,
    data_sources: Vec<String>,
}

#[derive(Debug)]
struct Injected {
    operation: String,
    code: i64,
    message: String,
}

/// Arguments a module was last initialized with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitArgs {
    /// Instance name
    pub instance_name: String,
    /// Settings document
    pub settings: String,
    /// Verbose flag
    pub verbose: bool,
}

#[derive(Debug, Default)]
struct MockState {
    modules: HashMap<FacetKind, ModuleState>,
    records: BTreeMap<(String, String), MockRecord>,
    next_entity_id: i64,
    configs: BTreeMap<ConfigId, MockConfig>,
    next_config_id: ConfigId,
    default_config_id: Option<ConfigId>,
    active_config_id: Option<ConfigId>,
    added: u64,
    deleted: u64,
    history: Vec<String>,
    flags_seen: Vec<(String, u64)>,
    init_args: HashMap<FacetKind, InitArgs>,
    init_config_ids: Vec<ConfigId>,
    reinit_calls: Vec<ConfigId>,
    injected: Vec<Injected>,
    call_delay: Option<Duration>,
}

impl MockState {
    fn record_init(&mut self, kind: FacetKind, instance_name: &str, settings: &str, verbose: bool) {
        self.init_args.insert(
            kind,
            InitArgs {
                instance_name: instance_name.to_string(),
                settings: settings.to_string(),
                verbose,
            },
        );
    }

    fn module(&mut self, kind: FacetKind) -> &mut ModuleState {
        self.modules.entry(kind).or_default()
    }

    fn register(&mut self, document: &str, comment: &str) -> Outcome<ConfigId> {
        let parsed: Value = serde_json::from_str(document)
            .map_err(|e| (codes::INVALID_JSON, format!("Invalid JSON config document: {}", e)))?;
        let data_sources = match parsed.get("DATA_SOURCES") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(_) => {
                return Err((
                    codes::INVALID_JSON,
                    "DATA_SOURCES must be an array".to_string(),
                ))
            }
        };
        self.next_config_id += 1;
        let id = self.next_config_id;
        self.configs.insert(
            id,
            MockConfig {
                comment: comment.to_string(),
                document: document.to_string(),
                data_sources,
            },
        );
        Ok(id)
    }

    fn require_config(&self, config_id: ConfigId) -> Outcome<()> {
        if self.configs.contains_key(&config_id) {
            Ok(())
        } else {
            Err((
                codes::UNKNOWN_CONFIG_ID,
                format!("Unknown configuration ID: {}", config_id),
            ))
        }
    }

    fn require_data_source(&self, data_source: &str) -> Outcome<()> {
        let known = self
            .active_config_id
            .and_then(|id| self.configs.get(&id))
            .map(|c| c.data_sources.iter().any(|d| d == data_source))
            .unwrap_or(false);
        if known {
            Ok(())
        } else {
            Err((
                codes::UNKNOWN_DATA_SOURCE,
                format!("Unknown data source: {}", data_source),
            ))
        }
    }

    fn entity_records(&self, entity_id: i64) -> Vec<(&(String, String), &MockRecord)> {
        self.records
            .iter()
            .filter(|(_, r)| r.entity_id == entity_id)
            .collect()
    }

    fn require_entity(&self, entity_id: i64) -> Outcome<()> {
        if self.records.values().any(|r| r.entity_id == entity_id) {
            Ok(())
        } else {
            Err((
                codes::UNKNOWN_ENTITY,
                format!("Unknown resolved entity value '{}'", entity_id),
            ))
        }
    }

    fn entity_document(&self, entity_id: i64) -> Value {
        let records: Vec<Value> = self
            .entity_records(entity_id)
            .into_iter()
            .map(|((ds, id), _)| json!({ "DATA_SOURCE": ds, "RECORD_ID": id }))
            .collect();
        json!({ "RESOLVED_ENTITY": { "ENTITY_ID": entity_id, "RECORDS": records } })
    }

    fn info(data_source: &str, record_id: &str, affected: Option<i64>) -> String {
        let affected: Vec<Value> = affected
            .into_iter()
            .map(|id| json!({ "ENTITY_ID": id }))
            .collect();
        json!({
            "DATA_SOURCE": data_source,
            "RECORD_ID": record_id,
            "AFFECTED_ENTITIES": affected,
        })
        .to_string()
    }

    fn add(&mut self, data_source: &str, record_id: &str, record: &str) -> Outcome<i64> {
        self.require_data_source(data_source)?;
        if record_id.is_empty() {
            return Err((codes::MISSING_RECORD_ID, "Missing RECORD_ID".to_string()));
        }
        let document: Value = serde_json::from_str(record)
            .map_err(|e| (codes::INVALID_JSON, format!("Invalid JSON record: {}", e)))?;
        let key = (data_source.to_string(), record_id.to_string());
        let entity_id = match self.records.get(&key) {
            Some(existing) => existing.entity_id,
            None => {
                self.next_entity_id += 1;
                self.next_entity_id
            }
        };
        self.records.insert(
            key,
            MockRecord {
                entity_id,
                document,
            },
        );
        self.added += 1;
        Ok(entity_id)
    }

    fn delete(&mut self, data_source: &str, record_id: &str) -> Outcome<Option<i64>> {
        self.require_data_source(data_source)?;
        let removed = self
            .records
            .remove(&(data_source.to_string(), record_id.to_string()))
            .map(|r| r.entity_id);
        if removed.is_some() {
            self.deleted += 1;
        }
        Ok(removed)
    }

    fn record(&self, data_source: &str, record_id: &str) -> Outcome<&MockRecord> {
        self.require_data_source(data_source)?;
        self.records
            .get(&(data_source.to_string(), record_id.to_string()))
            .ok_or_else(|| {
                (
                    codes::UNKNOWN_RECORD,
                    format!("Unknown record: dsrc[{}], record[{}]", data_source, record_id),
                )
            })
    }
}

// =============================================================================
// MockNative
// =============================================================================

/// In-memory native layer.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct MockNative {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockNative {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNative {
    /// Mock whose default configuration declares [`DEFAULT_DATA_SOURCES`]
    pub fn new() -> Self {
        Self::with_data_sources(DEFAULT_DATA_SOURCES)
    }

    /// Mock whose default configuration declares the given data sources
    pub fn with_data_sources(data_sources: &[&str]) -> Self {
        let mut state = MockState::default();
        let document = Self::config_document(data_sources);
        // A freshly serialized document always parses
        if let Ok(id) = state.register(&document, "default configuration") {
            state.default_config_id = Some(id);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Configuration document declaring the given data sources
    pub fn config_document(data_sources: &[&str]) -> String {
        json!({ "DATA_SOURCES": data_sources }).to_string()
    }

    /// Fail the next call to `operation` (for example `"engine.get_stats"`)
    /// with the given native error code and message.
    pub fn fail_next(&self, operation: &str, code: i64, message: &str) {
        self.state.lock().injected.push(Injected {
            operation: operation.to_string(),
            code,
            message: message.to_string(),
        });
    }

    /// Sleep for `delay` at the start of every native call
    pub fn set_call_delay(&self, delay: Option<Duration>) {
        self.state.lock().call_delay = delay;
    }

    /// Every native call so far, as `"<module>.<operation>"`
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    /// Number of calls made to `operation`
    pub fn calls_to(&self, operation: &str) -> usize {
        self.state
            .lock()
            .history
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    /// Flags received by flag-taking calls, in call order
    pub fn flags_seen(&self) -> Vec<(String, u64)> {
        self.state.lock().flags_seen.clone()
    }

    /// Arguments the module of `kind` was last initialized with
    pub fn init_args(&self, kind: FacetKind) -> Option<InitArgs> {
        self.state.lock().init_args.get(&kind).cloned()
    }

    /// Configuration ids passed to `init_with_config_id`
    pub fn init_config_ids(&self) -> Vec<ConfigId> {
        self.state.lock().init_config_ids.clone()
    }

    /// Configuration ids passed to `reinit`
    pub fn reinit_calls(&self) -> Vec<ConfigId> {
        self.state.lock().reinit_calls.clone()
    }

    /// Configuration the engine currently runs with
    pub fn active_config_id(&self) -> Option<ConfigId> {
        self.state.lock().active_config_id
    }

    /// Current default configuration id
    pub fn default_config_id(&self) -> Option<ConfigId> {
        self.state.lock().default_config_id
    }

    /// Register a configuration directly, bypassing any module
    pub fn register_config_document(&self, data_sources: &[&str], comment: &str) -> ConfigId {
        let document = Self::config_document(data_sources);
        let mut state = self.state.lock();
        state.next_config_id += 1;
        let id = state.next_config_id;
        state.configs.insert(
            id,
            MockConfig {
                comment: comment.to_string(),
                document,
                data_sources: data_sources.iter().map(|d| d.to_string()).collect(),
            },
        );
        id
    }

    /// Whether a module of this kind is currently initialized
    pub fn is_open(&self, kind: FacetKind) -> bool {
        self.state
            .lock()
            .modules
            .get(&kind)
            .map(|m| m.open)
            .unwrap_or(false)
    }

    /// Number of records in the repository
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    fn module(&self, kind: FacetKind) -> MockModule {
        MockModule {
            kind,
            state: Arc::clone(&self.state),
        }
    }
}

impl NativeLayer for MockNative {
    fn engine(&self) -> Arc<dyn NativeEngine> {
        Arc::new(self.module(FacetKind::Engine))
    }

    fn diagnostic(&self) -> Arc<dyn NativeDiagnostic> {
        Arc::new(self.module(FacetKind::Diagnostic))
    }

    fn config_manager(&self) -> Arc<dyn NativeConfigManager> {
        Arc::new(self.module(FacetKind::ConfigManager))
    }

    fn product(&self) -> Arc<dyn NativeProduct> {
        Arc::new(self.module(FacetKind::Product))
    }
}

// =============================================================================
// Module handles
// =============================================================================

struct MockModule {
    kind: FacetKind,
    state: Arc<Mutex<MockState>>,
}

impl MockModule {
    fn call<T: Default>(
        &self,
        op: &str,
        body: impl FnOnce(&mut MockState) -> Outcome<T>,
    ) -> NativeReply<T> {
        let delay = self.state.lock().call_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        let name = format!("{}.{}", self.kind, op);
        trace!(target: "meld::native", call = %name, "mock native call");
        state.history.push(name.clone());

        let opening = op == "init" || op == "init_with_config_id";
        let outcome = if let Some(pos) = state.injected.iter().position(|i| i.operation == name) {
            let injected = state.injected.remove(pos);
            Err((injected.code, injected.message))
        } else if !opening && !state.module(self.kind).open {
            Err((
                codes::MODULE_NOT_INITIALIZED,
                format!("{} module not initialized", self.kind),
            ))
        } else {
            body(&mut state)
        };

        match outcome {
            Ok(response) => NativeReply::ok(response),
            Err(error) => {
                state.module(self.kind).last_error = Some(error);
                NativeReply::failed(NATIVE_FAILURE)
            }
        }
    }

    fn status(&self, op: &str, body: impl FnOnce(&mut MockState) -> Outcome<()>) -> ReturnCode {
        self.call(op, body).return_code
    }

    fn flagged<T: Default>(
        &self,
        op: &str,
        flags: u64,
        body: impl FnOnce(&mut MockState) -> Outcome<T>,
    ) -> NativeReply<T> {
        let name = format!("{}.{}", self.kind, op);
        self.state.lock().flags_seen.push((name, flags));
        self.call(op, body)
    }
}

impl NativeLifecycle for MockModule {
    fn init(&self, instance_name: &str, settings: &str, verbose: bool) -> ReturnCode {
        let kind = self.kind;
        self.status("init", |s| {
            s.record_init(kind, instance_name, settings, verbose);
            if kind.is_config_sensitive() {
                let id = s.default_config_id.ok_or((
                    codes::UNKNOWN_CONFIG_ID,
                    "No default configuration has been set".to_string(),
                ))?;
                s.active_config_id = Some(id);
            }
            s.module(kind).open = true;
            Ok(())
        })
    }

    fn destroy(&self) -> ReturnCode {
        let kind = self.kind;
        self.status("destroy", |s| {
            s.module(kind).open = false;
            Ok(())
        })
    }

    fn last_exception(&self) -> String {
        let mut state = self.state.lock();
        state
            .module(self.kind)
            .last_error
            .as_ref()
            .map(|(_, message)| message.clone())
            .unwrap_or_default()
    }

    fn last_exception_code(&self) -> i64 {
        let mut state = self.state.lock();
        state
            .module(self.kind)
            .last_error
            .as_ref()
            .map(|(code, _)| *code)
            .unwrap_or(0)
    }

    fn clear_last_exception(&self) {
        self.state.lock().module(self.kind).last_error = None;
    }
}

impl NativeConfigured for MockModule {
    fn init_with_config_id(
        &self,
        instance_name: &str,
        settings: &str,
        config_id: ConfigId,
        verbose: bool,
    ) -> ReturnCode {
        let kind = self.kind;
        self.status("init_with_config_id", |s| {
            s.record_init(kind, instance_name, settings, verbose);
            s.init_config_ids.push(config_id);
            s.require_config(config_id)?;
            s.active_config_id = Some(config_id);
            s.module(kind).open = true;
            Ok(())
        })
    }

    fn reinit(&self, config_id: ConfigId) -> ReturnCode {
        self.status("reinit", |s| {
            s.reinit_calls.push(config_id);
            s.require_config(config_id)?;
            s.active_config_id = Some(config_id);
            Ok(())
        })
    }
}

impl NativeEngine for MockModule {
    fn add_record(&self, data_source: &str, record_id: &str, record: &str, flags: u64)
        -> ReturnCode {
        self.flagged("add_record", flags, |s| {
            s.add(data_source, record_id, record).map(|_| ())
        })
        .return_code
    }

    fn add_record_with_info(
        &self,
        data_source: &str,
        record_id: &str,
        record: &str,
        flags: u64,
    ) -> NativeReply<String> {
        self.flagged("add_record_with_info", flags, |s| {
            let entity_id = s.add(data_source, record_id, record)?;
            Ok(MockState::info(data_source, record_id, Some(entity_id)))
        })
    }

    fn delete_record(&self, data_source: &str, record_id: &str, flags: u64) -> ReturnCode {
        self.flagged("delete_record", flags, |s| {
            s.delete(data_source, record_id).map(|_| ())
        })
        .return_code
    }

    fn delete_record_with_info(
        &self,
        data_source: &str,
        record_id: &str,
        flags: u64,
    ) -> NativeReply<String> {
        self.flagged("delete_record_with_info", flags, |s| {
            let removed = s.delete(data_source, record_id)?;
            Ok(MockState::info(data_source, record_id, removed))
        })
    }

    fn reevaluate_entity(&self, entity_id: i64, flags: u64) -> ReturnCode {
        self.flagged("reevaluate_entity", flags, |s| s.require_entity(entity_id))
            .return_code
    }

    fn reevaluate_entity_with_info(&self, entity_id: i64, flags: u64) -> NativeReply<String> {
        self.flagged("reevaluate_entity_with_info", flags, |s| {
            s.require_entity(entity_id)?;
            Ok(json!({ "AFFECTED_ENTITIES": [{ "ENTITY_ID": entity_id }] }).to_string())
        })
    }

    fn get_entity_by_entity_id(&self, entity_id: i64, flags: u64) -> NativeReply<String> {
        self.flagged("get_entity_by_entity_id", flags, |s| {
            s.require_entity(entity_id)?;
            Ok(s.entity_document(entity_id).to_string())
        })
    }

    fn get_entity_by_record_id(
        &self,
        data_source: &str,
        record_id: &str,
        flags: u64,
    ) -> NativeReply<String> {
        self.flagged("get_entity_by_record_id", flags, |s| {
            let entity_id = s.record(data_source, record_id)?.entity_id;
            Ok(s.entity_document(entity_id).to_string())
        })
    }

    fn get_record(&self, data_source: &str, record_id: &str, flags: u64) -> NativeReply<String> {
        self.flagged("get_record", flags, |s| {
            let record = s.record(data_source, record_id)?;
            Ok(json!({
                "DATA_SOURCE": data_source,
                "RECORD_ID": record_id,
                "JSON_DATA": record.document,
            })
            .to_string())
        })
    }

    fn why_entities(&self, entity_id_1: i64, entity_id_2: i64, flags: u64) -> NativeReply<String> {
        self.flagged("why_entities", flags, |s| {
            s.require_entity(entity_id_1)?;
            s.require_entity(entity_id_2)?;
            Ok(json!({
                "WHY_RESULTS": [{
                    "ENTITY_ID": entity_id_1,
                    "ENTITY_ID_2": entity_id_2,
                    "MATCH_INFO": { "WHY_KEY": "" },
                }],
                "ENTITIES": [s.entity_document(entity_id_1), s.entity_document(entity_id_2)],
            })
            .to_string())
        })
    }

    fn search_by_attributes(&self, attributes: &str, flags: u64) -> NativeReply<String> {
        self.flagged("search_by_attributes", flags, |s| {
            let wanted: Value = serde_json::from_str(attributes)
                .map_err(|e| (codes::INVALID_JSON, format!("Invalid JSON attributes: {}", e)))?;
            let wanted = wanted.as_object().cloned().unwrap_or_default();
            let mut matches: Vec<i64> = s
                .records
                .values()
                .filter(|r| wanted.iter().all(|(k, v)| r.document.get(k) == Some(v)))
                .map(|r| r.entity_id)
                .collect();
            matches.sort_unstable();
            matches.dedup();
            let entities: Vec<Value> = matches
                .into_iter()
                .map(|id| json!({ "ENTITY": s.entity_document(id) }))
                .collect();
            Ok(json!({ "RESOLVED_ENTITIES": entities }).to_string())
        })
    }

    fn count_redo_records(&self) -> NativeReply<i64> {
        self.call("count_redo_records", |_| Ok(0))
    }

    fn prime_engine(&self) -> ReturnCode {
        self.status("prime_engine", |_| Ok(()))
    }

    fn get_stats(&self) -> NativeReply<String> {
        self.call("get_stats", |s| {
            Ok(json!({
                "workload": {
                    "loadedRecords": s.records.len(),
                    "addedRecords": s.added,
                    "deletedRecords": s.deleted,
                }
            })
            .to_string())
        })
    }

    fn get_active_config_id(&self) -> NativeReply<ConfigId> {
        self.call("get_active_config_id", |s| {
            s.active_config_id.ok_or((
                codes::UNKNOWN_CONFIG_ID,
                "No active configuration".to_string(),
            ))
        })
    }
}

impl NativeDiagnostic for MockModule {
    fn get_repository_info(&self) -> NativeReply<String> {
        self.call("get_repository_info", |_| {
            Ok(json!({
                "dataStores": [{ "id": "CORE", "type": "memory", "location": "mock" }]
            })
            .to_string())
        })
    }

    fn check_repository_performance(&self, seconds: i64) -> NativeReply<String> {
        self.call("check_repository_performance", |_| {
            Ok(json!({ "numRecordsInserted": 0, "insertTime": seconds * 1000 }).to_string())
        })
    }

    fn get_feature(&self, feature_id: i64) -> NativeReply<String> {
        self.call("get_feature", |s| {
            if !s.records.values().any(|r| r.entity_id == feature_id) {
                return Err((
                    codes::UNKNOWN_ENTITY,
                    format!("Unknown feature ID: {}", feature_id),
                ));
            }
            Ok(json!({ "LIB_FEAT_ID": feature_id, "FTYPE_CODE": "RECORD" }).to_string())
        })
    }

    fn purge_repository(&self) -> ReturnCode {
        self.status("purge_repository", |s| {
            s.records.clear();
            Ok(())
        })
    }
}

impl NativeConfigManager for MockModule {
    fn register_config(&self, config: &str, comment: &str) -> NativeReply<ConfigId> {
        self.call("register_config", |s| s.register(config, comment))
    }

    fn get_config(&self, config_id: ConfigId) -> NativeReply<String> {
        self.call("get_config", |s| {
            s.require_config(config_id)?;
            Ok(s.configs
                .get(&config_id)
                .map(|c| c.document.clone())
                .unwrap_or_default())
        })
    }

    fn get_config_registry(&self) -> NativeReply<String> {
        self.call("get_config_registry", |s| {
            let configs: Vec<Value> = s
                .configs
                .iter()
                .map(|(id, c)| json!({ "CONFIG_ID": id, "CONFIG_COMMENTS": c.comment }))
                .collect();
            Ok(json!({ "CONFIGS": configs }).to_string())
        })
    }

    fn get_default_config_id(&self) -> NativeReply<ConfigId> {
        self.call("get_default_config_id", |s| Ok(s.default_config_id.unwrap_or(0)))
    }

    fn set_default_config_id(&self, config_id: ConfigId) -> ReturnCode {
        self.status("set_default_config_id", |s| {
            s.require_config(config_id)?;
            s.default_config_id = Some(config_id);
            Ok(())
        })
    }

    fn replace_default_config_id(&self, current: ConfigId, new: ConfigId) -> ReturnCode {
        self.status("replace_default_config_id", |s| {
            let actual = s.default_config_id.unwrap_or(0);
            if actual != current {
                return Err((
                    codes::REPLACE_CONFLICT,
                    format!(
                        "Current default configuration ID {} does not match {}",
                        actual, current
                    ),
                ));
            }
            s.require_config(new)?;
            s.default_config_id = Some(new);
            Ok(())
        })
    }
}

impl NativeProduct for MockModule {
    fn get_version(&self) -> NativeReply<String> {
        self.call("get_version", |_| {
            Ok(json!({
                "PRODUCT_NAME": "meld mock engine",
                "VERSION": env!("CARGO_PKG_VERSION"),
            })
            .to_string())
        })
    }

    fn get_license(&self) -> NativeReply<String> {
        self.call("get_license", |_| {
            Ok(json!({ "customer": "mock", "licenseType": "EVAL", "recordLimit": 0 }).to_string())
        })
    }
}
