//! Compiled model: shards, normalizers and keywords behind compile and parse

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gazette_core::{
    AppConfig, AttributeFilter, AttributeStore, GazetteError, InternalId, NoProgress, Normalizer,
    ProgressSink, Result, RowId, RowPolicy, SqliteAttributeStore,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::align::{align_layers, Layer};
use crate::dictionary::DictionarySpec;
use crate::disambiguate::disambiguate;
use crate::keywords::{KeywordIndex, KeywordIndexBuilder};
use crate::normalize::{self, BypassNormalizer};
use crate::reduce::{flatten_spans, reduce_spans, SpanAttributes};
use crate::shard::{DictionaryRow, ShardOptions, TrieBuilder, TrieShard};
use crate::spotter::Spotter;
use crate::{EntityExtractor, RecognizedEntity};

/// Layer holding synonyms that were not normalized
pub const RAW_LAYER: &str = "bypass";

// ============================================================================
// Compile options and report
// ============================================================================

/// Settings of one compile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub column_separator: char,
    pub column_enclosure: Option<char>,
    pub word_separator: char,
    pub compressed: bool,
    pub item_limit: usize,
    pub tokenizer_option: u8,
    pub include_keywords: bool,
    pub disambiguate_all: bool,
    pub row_policy: RowPolicy,
    /// Input size in bytes, used for progress only
    pub total_bytes: Option<u64>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            column_separator: '\t',
            column_enclosure: None,
            word_separator: ' ',
            compressed: true,
            item_limit: 0,
            tokenizer_option: 0,
            include_keywords: true,
            disambiguate_all: false,
            row_policy: RowPolicy::Skip,
            total_bytes: None,
        }
    }
}

impl CompileOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            column_separator: config.dictionary.column_separator,
            column_enclosure: config.dictionary.column_enclosure,
            word_separator: config.compile.word_separator,
            compressed: config.compile.compressed,
            item_limit: config.compile.item_limit,
            tokenizer_option: config.compile.tokenizer_option,
            include_keywords: config.compile.include_keywords,
            disambiguate_all: config.compile.disambiguate_all,
            row_policy: config.compile.row_policy,
            total_bytes: None,
        }
    }
}

/// Outcome of one compile pass
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub rows_read: usize,
    pub rows_inserted: usize,
    pub rows_skipped: usize,
    pub shards: usize,
    pub entities: usize,
    pub ambiguous_entities: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CompileReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            rows_read: 0,
            rows_inserted: 0,
            rows_skipped: 0,
            shards: 0,
            entities: 0,
            ambiguous_entities: 0,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }
}

/// Where a dictionary row's synonym goes
enum Route<'a> {
    Normalized(&'a str, &'a Arc<dyn Normalizer>),
    Raw,
}

// ============================================================================
// Model
// ============================================================================

/// Compiled dictionary ready for parsing
pub struct Model {
    shards: Vec<TrieShard>,
    normalizers: Vec<(String, Arc<dyn Normalizer>)>,
    tag_map: HashMap<String, String>,
    default_normalizer: Option<String>,
    word_separator: char,
    tokenizer_option: u8,
    keywords: KeywordIndex,
    store: Box<dyn AttributeStore>,
    progress: Arc<dyn ProgressSink>,
    compiled: bool,
}

impl Model {
    pub fn new(store: Box<dyn AttributeStore>) -> Self {
        Self {
            shards: Vec::new(),
            normalizers: Vec::new(),
            tag_map: HashMap::new(),
            default_normalizer: None,
            word_separator: ' ',
            tokenizer_option: 0,
            keywords: KeywordIndex::default(),
            store,
            progress: Arc::new(NoProgress),
            compiled: false,
        }
    }

    /// Model backed by an in-memory SQLite store
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Box::new(SqliteAttributeStore::in_memory()?)))
    }

    /// Store and normalizers as described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = SqliteAttributeStore::from_config(&config.store)?;
        let mut model = Self::new(Box::new(store));
        for nc in &config.normalizers {
            model.add_normalizer(&nc.name, normalize::from_config(nc)?, nc.default);
            for tag in &nc.tags {
                model.map_tag(tag, &nc.name);
            }
        }
        model.word_separator = config.compile.word_separator;
        model.tokenizer_option = config.compile.tokenizer_option;
        Ok(model)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Register a normalizer under `name`.
    ///
    /// The first normalizer becomes the default unless a later one is
    /// registered with `default` set. Re-registering a name replaces it.
    pub fn add_normalizer(&mut self, name: &str, normalizer: Arc<dyn Normalizer>, default: bool) {
        match self.normalizers.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = normalizer,
            None => self.normalizers.push((name.to_string(), normalizer)),
        }
        self.tag_map.insert(name.to_string(), name.to_string());
        if default || self.default_normalizer.is_none() {
            self.default_normalizer = Some(name.to_string());
        }
        debug!("Registered normalizer '{}' (default: {})", name, default);
    }

    /// Let dictionary rows tagged `tag` select normalizer `name`
    pub fn map_tag(&mut self, tag: &str, name: &str) {
        self.tag_map.insert(tag.to_string(), name.to_string());
    }

    pub fn normalizer_names(&self) -> impl Iterator<Item = &str> {
        self.normalizers.iter().map(|(name, _)| name.as_str())
    }

    pub fn default_normalizer(&self) -> Option<&str> {
        self.default_normalizer.as_deref()
    }

    pub fn shards(&self) -> &[TrieShard] {
        &self.shards
    }

    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    fn normalizer(&self, name: &str) -> Option<&Arc<dyn Normalizer>> {
        self.normalizers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, normalizer)| normalizer)
    }

    /// Pick the normalizer for a row's tag.
    ///
    /// Unknown tags and untagged rows use the default normalizer. A tag
    /// mapped to an unregistered normalizer falls back to the raw value.
    fn route(&self, tag: Option<&str>) -> Route<'_> {
        let name = match tag.and_then(|t| self.tag_map.get(t)) {
            Some(name) => Some(name.as_str()),
            None => self.default_normalizer.as_deref(),
        };
        match name.and_then(|n| self.normalizers.iter().find(|(r, _)| r == n)) {
            Some((name, normalizer)) => Route::Normalized(name, normalizer),
            None => Route::Raw,
        }
    }

    // ------------------------------------------------------------------------
    // Compile
    // ------------------------------------------------------------------------

    /// Compile a dictionary file
    pub fn compile_file(
        &mut self,
        path: impl AsRef<Path>,
        spec: DictionarySpec,
        mut options: CompileOptions,
    ) -> Result<CompileReport> {
        let path = path.as_ref();
        let file = File::open(path)?;
        options.total_bytes = Some(file.metadata()?.len());
        info!("Compiling dictionary {}", path.display());
        self.compile(BufReader::new(file), spec, options)
    }

    /// Compile dictionary lines from `reader` into shards and keywords.
    ///
    /// Row ids are line numbers. Rows that cannot be parsed are skipped or
    /// abort the pass depending on `options.row_policy`. Attributes left in
    /// the store by an earlier run are replaced; a failed pass rolls its
    /// writes back and leaves the model uncompiled.
    pub fn compile<R: BufRead>(
        &mut self,
        reader: R,
        spec: DictionarySpec,
        options: CompileOptions,
    ) -> Result<CompileReport> {
        if self.compiled {
            return Err(GazetteError::Invariant(
                "model is already compiled".to_string(),
            ));
        }
        match self.compile_pass(reader, spec, options) {
            Ok(report) => {
                self.compiled = true;
                Ok(report)
            }
            Err(err) => {
                if let Err(e) = self.store.rollback() {
                    warn!("Failed to roll back attribute store: {}", e);
                }
                Err(err)
            }
        }
    }

    fn compile_pass<R: BufRead>(
        &mut self,
        mut reader: R,
        spec: DictionarySpec,
        options: CompileOptions,
    ) -> Result<CompileReport> {
        if self.normalizers.is_empty() {
            self.add_normalizer(RAW_LAYER, Arc::new(BypassNormalizer), true);
        }
        self.word_separator = options.word_separator;
        self.tokenizer_option = options.tokenizer_option;

        let mut report = CompileReport::start();
        self.progress.status("Compiling dictionary");
        self.store.create_schema()?;
        self.store.begin()?;
        self.store.clear()?;

        let spec = Arc::new(spec);
        let layer_names: Vec<String> = self.normalizer_names().map(str::to_string).collect();
        let shard_options = ShardOptions {
            compressed: options.compressed,
            item_limit: options.item_limit,
            tokenizer_option: options.tokenizer_option,
            word_separator: options.word_separator,
        };
        let mut builder = TrieBuilder::new(spec.clone(), &layer_names, shard_options);
        let mut keywords = KeywordIndexBuilder::new(options.word_separator, options.disambiguate_all);
        let mut entity_ids: HashMap<String, InternalId> = HashMap::new();
        let mut raw_fallback = false;

        let mut line = String::new();
        let mut bytes_read: u64 = 0;
        let mut last_percent = 0u8;
        let mut row: RowId = 0;
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            bytes_read += read as u64;
            report.rows_read += 1;

            match self.compile_row(&spec, row, &line, &options, &mut entity_ids) {
                Ok((layer, label, entity, columns)) => {
                    raw_fallback |= layer == RAW_LAYER;
                    let entry = DictionaryRow {
                        row,
                        entity,
                        columns: &columns,
                    };
                    builder.insert(self.store.as_ref(), &layer, &label, &entry)?;
                    if options.include_keywords {
                        keywords.add(row, entity, &label);
                    }
                    report.rows_inserted += 1;
                }
                Err(err @ GazetteError::Parse { .. }) => match options.row_policy {
                    RowPolicy::Abort => return Err(err),
                    RowPolicy::Skip => {
                        warn!("Skipping dictionary row: {}", err);
                        report.rows_skipped += 1;
                        report.errors.push(err.to_string());
                    }
                },
                Err(err) => return Err(err),
            }

            if let Some(total) = options.total_bytes.filter(|&t| t > 0) {
                let percent = (bytes_read * 100 / total).min(100) as u8;
                if percent != last_percent {
                    last_percent = percent;
                    self.progress.progress(percent);
                }
            }
            row += 1;
        }

        self.store.commit()?;
        if raw_fallback && self.normalizer(RAW_LAYER).is_none() {
            self.add_normalizer(RAW_LAYER, Arc::new(BypassNormalizer), false);
        }

        self.shards = builder.finish();
        self.keywords = keywords.build();

        report.shards = self.shards.len();
        report.entities = entity_ids.len();
        report.ambiguous_entities = self.keywords.len();
        report.finished_at = Utc::now();
        self.progress.progress(100);
        info!(
            "Compiled {} rows ({} skipped) into {} shards, {} entities, {} ambiguous",
            report.rows_inserted,
            report.rows_skipped,
            report.shards,
            report.entities,
            report.ambiguous_entities
        );
        Ok(report)
    }

    /// Split, identify and normalize one dictionary line
    fn compile_row(
        &self,
        spec: &DictionarySpec,
        row: RowId,
        line: &str,
        options: &CompileOptions,
        entity_ids: &mut HashMap<String, InternalId>,
    ) -> Result<(String, String, InternalId, Vec<String>)> {
        let columns =
            spec.split_line(row, line, options.column_separator, options.column_enclosure)?;
        let column = |index: usize| {
            columns.get(index).map(String::as_str).ok_or_else(|| GazetteError::Parse {
                row,
                message: format!("column {index} is out of range"),
            })
        };

        let raw_id = column(spec.id.column_index)?;
        let synonym = column(spec.value.column_index)?;
        let tag = match &spec.tag {
            Some(field) => Some(column(field.column_index)?),
            None => None,
        };

        let (layer, label) = match self.route(tag) {
            Route::Normalized(name, normalizer) => (
                name.to_string(),
                normalizer
                    .normalize(synonym, options.word_separator, options.tokenizer_option)
                    .text,
            ),
            Route::Raw => {
                let err = GazetteError::NotFound(format!(
                    "normalizer for tag '{}'",
                    tag.unwrap_or_default()
                ));
                warn!("Row {}: {}, inserting the raw value", row, err);
                (RAW_LAYER.to_string(), synonym.to_string())
            }
        };
        let label = label.trim_matches(options.word_separator).to_string();
        if label.is_empty() {
            return Err(GazetteError::Parse {
                row,
                message: "synonym is empty".to_string(),
            });
        }

        let next = entity_ids.len();
        let entity = *entity_ids.entry(raw_id.to_string()).or_insert(next);
        Ok((layer, label, entity, columns))
    }

    // ------------------------------------------------------------------------
    // Parse
    // ------------------------------------------------------------------------

    /// Recognize entities in `source`.
    ///
    /// Normalizes once per normalizer, spots every shard, aligns the layers,
    /// disambiguates and reduces to non-overlapping locations in `source`.
    pub fn parse(&self, source: &str, filter: &AttributeFilter) -> Result<SpanAttributes> {
        if self.normalizers.is_empty() {
            return Err(GazetteError::Configuration(
                "no normalizers configured".to_string(),
            ));
        }
        self.progress.status("Parsing text");

        let steps = (self.normalizers.len() * self.shards.len()).max(1);
        let mut done = 0;
        let mut layers = Vec::with_capacity(self.normalizers.len());
        for (name, normalizer) in &self.normalizers {
            let normalized = normalizer.normalize(source, self.word_separator, self.tokenizer_option);
            let mut matches = Vec::new();
            for (index, shard) in self.shards.iter().enumerate() {
                if let Some(trie) = shard.layer(name) {
                    let found =
                        Spotter::new(trie, self.store.as_ref(), filter, shard.word_separator())
                            .spot(&normalized.text)?;
                    debug!(
                        "Layer '{}' shard {}: {} matches",
                        name,
                        index,
                        found.len()
                    );
                    matches.extend(found.into_iter().map(|m| (index, m)));
                }
                done += 1;
                self.progress.progress((done * 100 / steps) as u8);
            }
            layers.push(Layer {
                name: name.clone(),
                normalized,
                matches,
            });
        }

        let mut spans = align_layers(&layers);
        if !self.keywords.is_empty() {
            disambiguate(&mut spans, &layers, &self.keywords, self.word_separator);
        }
        let mut flattened = flatten_spans(&spans);
        let locations: BTreeSet<(usize, usize)> =
            reduce_spans(flattened.keys().copied()).into_iter().collect();
        flattened.retain(|location, _| locations.contains(location));

        self.progress.progress(100);
        info!("Parsed {} characters into {} spans", source.chars().count(), flattened.len());
        Ok(flattened)
    }

    /// Parse and pair every location with its original text
    pub fn recognize(&self, text: &str, filter: &AttributeFilter) -> Result<Vec<RecognizedEntity>> {
        let chars: Vec<char> = text.chars().collect();
        let spans = self.parse(text, filter)?;
        Ok(spans
            .into_iter()
            .map(|((begin, end), attributes)| RecognizedEntity {
                text: chars[begin.min(chars.len())..end.min(chars.len())]
                    .iter()
                    .collect(),
                begin,
                end,
                attributes,
            })
            .collect())
    }

    /// Parse with an `attrs_where` map keyed by `"+"` and `"-"`
    pub fn parse_where(
        &self,
        source: &str,
        attrs_where: &BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
        attrs_out: &[String],
    ) -> Result<SpanAttributes> {
        let filter = AttributeFilter::from_where(attrs_where, attrs_out)?;
        self.parse(source, &filter)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("shards", &self.shards.len())
            .field("normalizers", &self.normalizer_names().collect::<Vec<_>>())
            .field("default_normalizer", &self.default_normalizer)
            .field("word_separator", &self.word_separator)
            .field("keywords", &self.keywords.len())
            .field("store", &self.store.name())
            .finish()
    }
}

impl EntityExtractor for Model {
    fn extract(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        self.recognize(text, &AttributeFilter::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazette_core::FieldDefinition;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn spec() -> DictionarySpec {
        DictionarySpec::compile(&[
            FieldDefinition::attribute("normalizer").as_tag(),
            FieldDefinition::attribute("entity_id").as_id(),
            FieldDefinition::attribute("label").as_value(),
            FieldDefinition::attribute("some_attribute").with_delimiter(","),
        ])
        .unwrap()
    }

    const DICTIONARY: &str = "t1\tentity1\twhite refrigerator\tA,B\n\
                              t1\tentity2\tcat\tC\n\
                              t1\tentity1\tfridge\tA\n";

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressSink for Recorder {
        fn progress(&self, percent: u8) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(percent);
            }
        }
    }

    #[test]
    fn test_compile_registers_bypass() {
        let mut model = Model::in_memory().unwrap();
        let report = model
            .compile(Cursor::new(DICTIONARY), spec(), CompileOptions::default())
            .unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_inserted, 3);
        assert_eq!(report.entities, 2);
        assert_eq!(report.shards, 1);
        assert_eq!(model.default_normalizer(), Some(RAW_LAYER));
        assert!(model.shards()[0].layer(RAW_LAYER).is_some());
    }

    #[test]
    fn test_compile_twice_is_rejected() {
        let mut model = Model::in_memory().unwrap();
        model
            .compile(Cursor::new(DICTIONARY), spec(), CompileOptions::default())
            .unwrap();
        let err = model
            .compile(Cursor::new(DICTIONARY), spec(), CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, GazetteError::Invariant(_)));
    }

    #[test]
    fn test_skip_policy_records_error() {
        let mut model = Model::in_memory().unwrap();
        let dictionary = "t1\tentity1\tcat\tA\nbroken line\nt1\tentity2\t  \tB\n";
        let report = model
            .compile(Cursor::new(dictionary), spec(), CompileOptions::default())
            .unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.rows_skipped, 2);
        assert!(report.errors[0].contains("row 1"));
    }

    #[test]
    fn test_abort_policy_stops() {
        let mut model = Model::in_memory().unwrap();
        let options = CompileOptions {
            row_policy: RowPolicy::Abort,
            ..CompileOptions::default()
        };
        let err = model
            .compile(Cursor::new("broken line\n"), spec(), options)
            .unwrap_err();
        assert!(matches!(err, GazetteError::Parse { row: 0, .. }));
    }

    fn color_spec() -> DictionarySpec {
        DictionarySpec::compile(&[
            FieldDefinition::attribute("entity_id").as_id(),
            FieldDefinition::attribute("label").as_value(),
            FieldDefinition::attribute("color"),
        ])
        .unwrap()
    }

    fn attribute(model: &Model, text: &str, name: &str) -> BTreeSet<String> {
        let spans = model.parse(text, &AttributeFilter::none()).unwrap();
        spans
            .values()
            .filter_map(|attrs| attrs.get(name))
            .flatten()
            .cloned()
            .collect()
    }

    #[test]
    fn test_recompile_replaces_file_store_rows() {
        let path = std::env::temp_dir().join(format!(
            "gazette-model-{}-recompile.attributes",
            std::process::id()
        ));
        let compile = |dictionary: &str| {
            let store = SqliteAttributeStore::open(&path).unwrap();
            let mut model = Model::new(Box::new(store));
            model
                .compile(Cursor::new(dictionary), color_spec(), CompileOptions::default())
                .unwrap();
            model
        };

        drop(compile("E1\tcat\tblack\n"));
        let model = compile("E9\tcat\twhite\n");
        assert_eq!(
            attribute(&model, "a cat", "color"),
            BTreeSet::from(["white".to_string()])
        );
        assert_eq!(
            attribute(&model, "a cat", "entity_id"),
            BTreeSet::from(["E9".to_string()])
        );
        drop(model);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_compile_rolls_back() {
        let mut model = Model::in_memory().unwrap();
        let options = CompileOptions {
            row_policy: RowPolicy::Abort,
            ..CompileOptions::default()
        };
        let err = model
            .compile(Cursor::new("E1\tcat\tblack\nbroken\n"), color_spec(), options)
            .unwrap_err();
        assert!(matches!(err, GazetteError::Parse { row: 1, .. }));
        assert!(model.shards().is_empty());

        model
            .compile(Cursor::new("E2\tcat\twhite\n"), color_spec(), CompileOptions::default())
            .unwrap();
        assert_eq!(
            attribute(&model, "a cat", "color"),
            BTreeSet::from(["white".to_string()])
        );
        assert_eq!(
            attribute(&model, "a cat", "entity_id"),
            BTreeSet::from(["E2".to_string()])
        );
    }

    #[test]
    fn test_synonym_shared_by_many_rows() {
        let dictionary: String = (0..1_500)
            .map(|i| format!("E{i}\tjohn\tc{}\n", i % 3))
            .collect();
        let mut model = Model::in_memory().unwrap();
        model
            .compile(Cursor::new(dictionary), color_spec(), CompileOptions::default())
            .unwrap();

        assert_eq!(attribute(&model, "hello john", "entity_id").len(), 1_500);
        let filter = AttributeFilter::none().include("color", "c0");
        let spans = model.parse("hello john", &filter).unwrap();
        assert_eq!(spans[&(6, 10)]["color"], BTreeSet::from(["c0".to_string()]));
        assert_eq!(spans[&(6, 10)]["entity_id"].len(), 500);
    }

    #[test]
    fn test_parse_without_normalizers() {
        let model = Model::in_memory().unwrap();
        let err = model.parse("text", &AttributeFilter::none()).unwrap_err();
        assert!(matches!(err, GazetteError::Configuration(_)));
    }

    #[test]
    fn test_route_by_tag() {
        let mut model = Model::in_memory().unwrap();
        model.add_normalizer("plain", Arc::new(BypassNormalizer), false);
        model.add_normalizer("lower", normalize_lower(), true);
        model.map_tag("tokenizer2", "lower");
        model.map_tag("orphan", "missing");

        assert!(matches!(model.route(Some("tokenizer2")), Route::Normalized("lower", _)));
        assert!(matches!(model.route(Some("plain")), Route::Normalized("plain", _)));
        assert!(matches!(model.route(Some("unknown")), Route::Normalized("lower", _)));
        assert!(matches!(model.route(None), Route::Normalized("lower", _)));
        assert!(matches!(model.route(Some("orphan")), Route::Raw));
    }

    fn normalize_lower() -> Arc<dyn Normalizer> {
        Arc::new(
            crate::normalize::TokenNormalizer::new()
                .unwrap()
                .lowercase(true),
        )
    }

    #[test]
    fn test_progress_reaches_100() {
        let recorder = Arc::new(Recorder::default());
        let mut model = Model::in_memory().unwrap().with_progress(recorder.clone());
        let options = CompileOptions {
            total_bytes: Some(DICTIONARY.len() as u64),
            ..CompileOptions::default()
        };
        model.compile(Cursor::new(DICTIONARY), spec(), options).unwrap();
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_extract_returns_original_text() {
        let mut model = Model::in_memory().unwrap();
        model
            .compile(Cursor::new(DICTIONARY), spec(), CompileOptions::default())
            .unwrap();
        let found = model.extract("a white refrigerator and a cat").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "white refrigerator");
        assert_eq!((found[0].begin, found[0].end), (2, 20));
        assert_eq!(
            found[0].attributes["entity_id"],
            BTreeSet::from(["entity1".to_string()])
        );
        assert_eq!(found[1].text, "cat");
    }
}
