//! Pipeline Integration Tests
//!
//! Compile small dictionaries into in-memory models and parse text end to end.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::Arc;

use gazette_core::{
    AppConfig, AttributeFilter, FieldDefinition, GazetteError, Normalizer, NormalizerConfig,
    NormalizerKind, RowPolicy,
};
use gazette_recognizer::{
    BypassNormalizer, CompileOptions, DictionarySpec, EntityExtractor, Model, SpanAttributes,
    TokenNormalizer,
};
use proptest::prelude::*;

/// Columns: normalizer tag, entity id, label, habitat (comma separated)
fn tagged_spec() -> DictionarySpec {
    DictionarySpec::compile(&[
        FieldDefinition::attribute("normalizer").as_tag(),
        FieldDefinition::attribute("entity_id").as_id(),
        FieldDefinition::attribute("label").as_value(),
        FieldDefinition::attribute("habitat").with_delimiter(","),
    ])
    .unwrap()
}

/// Columns: entity id, label
fn plain_spec() -> DictionarySpec {
    DictionarySpec::compile(&[
        FieldDefinition::attribute("entity_id").as_id(),
        FieldDefinition::attribute("label").as_value(),
    ])
    .unwrap()
}

fn lowercase() -> Arc<dyn Normalizer> {
    Arc::new(TokenNormalizer::new().unwrap().lowercase(true))
}

fn compile(model: &mut Model, spec: DictionarySpec, dictionary: &str, options: CompileOptions) {
    model
        .compile(Cursor::new(dictionary.to_string()), spec, options)
        .unwrap();
}

fn plain_model(dictionary: &str) -> Model {
    let mut model = Model::in_memory().unwrap();
    compile(&mut model, plain_spec(), dictionary, CompileOptions::default());
    model
}

fn values(result: &SpanAttributes, location: (usize, usize), name: &str) -> BTreeSet<String> {
    result[&location][name].clone()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Matching
// =============================================================================

#[test]
fn test_exact_match() {
    let model = plain_model("E1\twhite refrigerator\n");
    let result = model
        .parse("this is a white refrigerator here", &AttributeFilter::none())
        .unwrap();
    assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![(10, 28)]);
    assert_eq!(values(&result, (10, 28), "entity_id"), set(&["E1"]));
}

#[test]
fn test_no_match_is_empty() {
    let model = plain_model("E1\twhite refrigerator\n");
    let result = model
        .parse("nothing to see", &AttributeFilter::none())
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_sharded_model_finds_all_rows() {
    let mut model = Model::in_memory().unwrap();
    let options = CompileOptions {
        item_limit: 2,
        ..CompileOptions::default()
    };
    compile(
        &mut model,
        plain_spec(),
        "E1\tone\nE2\ttwo\nE3\tthree\nE4\tfour\nE5\tfive\n",
        options,
    );

    let sizes: Vec<usize> = model.shards().iter().map(|s| s.rows()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let result = model
        .parse("five and one and three", &AttributeFilter::none())
        .unwrap();
    assert_eq!(
        result.keys().copied().collect::<Vec<_>>(),
        vec![(0, 4), (9, 12), (17, 22)]
    );
    assert_eq!(values(&result, (0, 4), "entity_id"), set(&["E5"]));
}

#[test]
fn test_uncompressed_model_matches_compressed() {
    let dictionary = "E1\twhite refrigerator\nE2\twhite\nE3\tcat\n";
    let text = "a white cat and a white refrigerator";

    let compressed = plain_model(dictionary);
    let mut uncompressed = Model::in_memory().unwrap();
    let options = CompileOptions {
        compressed: false,
        ..CompileOptions::default()
    };
    compile(&mut uncompressed, plain_spec(), dictionary, options);

    assert!(compressed.shards()[0].is_compressed());
    assert!(!uncompressed.shards()[0].is_compressed());
    assert_eq!(
        compressed.parse(text, &AttributeFilter::none()).unwrap(),
        uncompressed.parse(text, &AttributeFilter::none()).unwrap()
    );
}

#[test]
fn test_trie_snapshot_serializes() {
    let model = plain_model("E1\tcat\n");
    let trie = model.shards()[0].layer("bypass").unwrap();
    let json = serde_json::to_value(trie.snapshot()).unwrap();
    assert_eq!(json["children"]["c"]["children"]["at"]["entity"][0], 0);
}

// =============================================================================
// Normalizers
// =============================================================================

#[test]
fn test_multi_normalizer_merge() {
    let mut model = Model::in_memory().unwrap();
    model.add_normalizer("raw", Arc::new(BypassNormalizer), true);
    model.add_normalizer("lower", lowercase(), false);
    compile(
        &mut model,
        tagged_spec(),
        "raw\tE1\tWhite Fridge\thome\nlower\tE2\twhite fridge\tshop\n",
        CompileOptions::default(),
    );

    let result = model
        .parse("a White Fridge", &AttributeFilter::none())
        .unwrap();
    assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![(2, 14)]);
    assert_eq!(values(&result, (2, 14), "entity_id"), set(&["E1", "E2"]));
    assert_eq!(values(&result, (2, 14), "habitat"), set(&["home", "shop"]));
}

#[test]
fn test_normalized_match_maps_to_original_offsets() {
    let mut model = Model::in_memory().unwrap();
    model.add_normalizer("lower", lowercase(), true);
    compile(
        &mut model,
        tagged_spec(),
        "lower\tE1\tWhite Fridge\thome\n",
        CompileOptions::default(),
    );

    let text = "My WHITE   fridge, please";
    let result = model.parse(text, &AttributeFilter::none()).unwrap();
    assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![(3, 17)]);

    let found = model.extract(text).unwrap();
    assert_eq!(found[0].text, "WHITE   fridge");
}

#[test]
fn test_unmapped_tag_falls_back_to_raw_value() {
    let mut model = Model::in_memory().unwrap();
    model.add_normalizer("lower", lowercase(), true);
    model.map_tag("legacy", "retired");
    let report = model
        .compile(
            Cursor::new("legacy\tE1\tNew York\tcity\n"),
            tagged_spec(),
            CompileOptions::default(),
        )
        .unwrap();
    assert_eq!(report.rows_inserted, 1);
    assert!(model.normalizer_names().any(|n| n == "bypass"));
    assert_eq!(model.default_normalizer(), Some("lower"));

    let result = model
        .parse("in New York today", &AttributeFilter::none())
        .unwrap();
    assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![(3, 11)]);
    assert!(model
        .parse("in new york today", &AttributeFilter::none())
        .unwrap()
        .is_empty());
}

#[test]
fn test_model_from_config() {
    let config = AppConfig {
        normalizers: vec![
            NormalizerConfig {
                name: "lower".to_string(),
                kind: NormalizerKind::Token,
                lowercase: true,
                pattern: None,
                default: false,
                tags: vec!["animal".to_string()],
            },
            NormalizerConfig {
                name: "raw".to_string(),
                kind: NormalizerKind::Bypass,
                lowercase: false,
                pattern: None,
                default: true,
                tags: vec!["plant".to_string()],
            },
        ],
        ..AppConfig::default()
    };
    let mut model = Model::from_config(&config).unwrap();
    assert_eq!(model.default_normalizer(), Some("raw"));

    compile(
        &mut model,
        tagged_spec(),
        "animal	cat	Cat	land
plant	fern	Fern	forest
",
        CompileOptions::from_config(&config),
    );
    let result = model
        .parse("a cat near a Fern", &AttributeFilter::none())
        .unwrap();
    assert_eq!(
        result.keys().copied().collect::<Vec<_>>(),
        vec![(2, 5), (13, 17)]
    );
    assert_eq!(values(&result, (13, 17), "habitat"), set(&["forest"]));
}

// =============================================================================
// Disambiguation
// =============================================================================

const HOMONYMS: &str = "A\trefrigerator\n\
                        A\tkitchen appliance\n\
                        B\trefrigerator\n\
                        B\tmortuary cabinet\n";

#[test]
fn test_disambiguation_by_context() {
    let model = plain_model(HOMONYMS);
    assert_eq!(model.keywords().len(), 2);

    let result = model
        .parse("kitchen refrigerator", &AttributeFilter::none())
        .unwrap();
    assert_eq!(values(&result, (8, 20), "entity_id"), set(&["A"]));

    let result = model
        .parse("the mortuary refrigerator", &AttributeFilter::none())
        .unwrap();
    assert_eq!(values(&result, (13, 25), "entity_id"), set(&["B"]));
}

#[test]
fn test_disambiguation_tie_keeps_both() {
    let model = plain_model(HOMONYMS);
    let result = model
        .parse("a refrigerator", &AttributeFilter::none())
        .unwrap();
    assert_eq!(values(&result, (2, 14), "entity_id"), set(&["A", "B"]));
}

#[test]
fn test_keywords_disabled_keeps_both() {
    let mut model = Model::in_memory().unwrap();
    let options = CompileOptions {
        include_keywords: false,
        ..CompileOptions::default()
    };
    compile(&mut model, plain_spec(), HOMONYMS, options);
    assert!(model.keywords().is_empty());

    let result = model
        .parse("kitchen refrigerator", &AttributeFilter::none())
        .unwrap();
    assert_eq!(values(&result, (8, 20), "entity_id"), set(&["A", "B"]));
}

// =============================================================================
// Filters
// =============================================================================

const ANIMALS: &str = "raw\teagle\teagle\tair\n\
                       raw\tshark\tshark\tocean\n\
                       raw\tbat\tbat\tair,cave\n";

fn animal_model() -> Model {
    let mut model = Model::in_memory().unwrap();
    compile(&mut model, tagged_spec(), ANIMALS, CompileOptions::default());
    model
}

#[test]
fn test_include_filter() {
    let model = animal_model();
    let filter = AttributeFilter::none().include("habitat", "air");
    let result = model.parse("eagle shark bat", &filter).unwrap();
    assert_eq!(
        result.keys().copied().collect::<Vec<_>>(),
        vec![(0, 5), (12, 15)]
    );
    assert_eq!(values(&result, (12, 15), "habitat"), set(&["air", "cave"]));
}

#[test]
fn test_exclude_filter_and_output() {
    let model = animal_model();
    let mut attrs_where = BTreeMap::new();
    attrs_where.insert(
        "-".to_string(),
        BTreeMap::from([("habitat".to_string(), set(&["cave"]))]),
    );
    let result = model
        .parse_where("eagle shark bat", &attrs_where, &["entity_id".to_string()])
        .unwrap();
    assert_eq!(
        result.keys().copied().collect::<Vec<_>>(),
        vec![(0, 5), (6, 11)]
    );
    assert!(result.values().all(|attrs| attrs.len() == 1));
    assert_eq!(values(&result, (6, 11), "entity_id"), set(&["shark"]));
}

#[test]
fn test_malformed_filter_key() {
    let model = animal_model();
    let mut attrs_where = BTreeMap::new();
    attrs_where.insert("*".to_string(), BTreeMap::new());
    let err = model
        .parse_where("eagle", &attrs_where, &[])
        .unwrap_err();
    assert!(matches!(err, GazetteError::Configuration(_)));
}

// =============================================================================
// Row handling
// =============================================================================

#[test]
fn test_abort_on_short_row() {
    let mut model = Model::in_memory().unwrap();
    let options = CompileOptions {
        row_policy: RowPolicy::Abort,
        ..CompileOptions::default()
    };
    let err = model
        .compile(Cursor::new("E1\tcat\nE2\n"), plain_spec(), options)
        .unwrap_err();
    assert!(matches!(err, GazetteError::Parse { row: 1, .. }));
}

#[test]
fn test_enclosure_and_crlf() {
    let mut model = Model::in_memory().unwrap();
    let options = CompileOptions {
        column_enclosure: Some('"'),
        ..CompileOptions::default()
    };
    compile(&mut model, plain_spec(), "\"E1\"\t\"white cat\"\r\n", options);
    let result = model
        .parse("a white cat", &AttributeFilter::none())
        .unwrap();
    assert_eq!(values(&result, (2, 11), "entity_id"), set(&["E1"]));
}

// =============================================================================
// Properties
// =============================================================================

fn overlapping_model() -> Model {
    let mut model = Model::in_memory().unwrap();
    model.add_normalizer("raw", Arc::new(BypassNormalizer), true);
    model.add_normalizer("lower", lowercase(), false);
    compile(
        &mut model,
        tagged_spec(),
        "raw\tE1\tbig white\tx\n\
         lower\tE2\twhite fridge\ty\n\
         raw\tE3\tfridge cat\tz\n\
         lower\tE4\tcat\tz\n\
         raw\tE5\tbig\tx\n",
        CompileOptions::default(),
    );
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_parse_never_overlaps(
        words in prop::collection::vec(
            prop::sample::select(vec!["big", "white", "fridge", "cat", "dog", "Big", "WHITE"]),
            0..12,
        )
    ) {
        let model = overlapping_model();
        let text = words.join(" ");
        let result = model.parse(&text, &AttributeFilter::none()).unwrap();
        let keys: Vec<(usize, usize)> = result.keys().copied().collect();
        for pair in keys.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0, "{:?} overlaps in {:?}", pair, text);
        }
        for (begin, end) in keys {
            prop_assert!(begin < end && end <= text.chars().count());
        }
    }
}
