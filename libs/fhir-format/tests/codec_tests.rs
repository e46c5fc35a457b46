use ferrum_context::{SchemaCatalog, TypeKind, TypeSchema};
use ferrum_format::{
    from_json_str, from_json_value, from_xml_str, to_json_value, to_xml_string, CodecOptions,
    ErrorKind, FormatError, JsonCodec, RecordCodec, Registry, XmlCodec,
};
use ferrum_models::{Choice, DataType, Extension, FieldValue, Primitive, Record, ResourceEnvelope};
use quickcheck::{QuickCheck, TestResult};
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn registry() -> &'static Registry {
    Registry::core()
}

// ============================================================================
// Choice fields
// ============================================================================

#[test]
fn test_choice_variants_are_exclusive() {
    let err = from_json_str(
        registry(),
        r#"{"resourceType":"Observation","status":"final","valueString":"high","valueBoolean":true}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChoiceConflict);
    assert_eq!(err.path(), Some("Observation"));

    // a shadow key alone is enough to make its variant present
    let err = from_json_str(
        registry(),
        r#"{"resourceType":"Observation","status":"final","_valueString":{"id":"s"},"valueBoolean":true}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChoiceConflict);

    // a bare null does not count as a variant
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Observation","status":"final","valueString":null,"valueBoolean":true}"#,
    )
    .unwrap();
    assert_eq!(envelope.record().choice("value").unwrap().data_type(), DataType::Boolean);
}

#[test]
fn test_choice_variant_not_allowed_for_field() {
    let err = from_json_str(
        registry(),
        r#"{"resourceType":"Observation","status":"final","effectiveBoolean":true}"#,
    )
    .unwrap_err();
    assert!(matches!(err, FormatError::UnknownElement { ref name, .. } if name == "effectiveBoolean"));
}

#[test]
fn test_choice_decodes_to_tagged_variant() {
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Observation","status":"final","valueQuantity":{"value":7.20,"unit":"mmol/L"}}"#,
    )
    .unwrap();
    let value = envelope.record().choice("value").unwrap();
    assert_eq!(value.data_type(), DataType::Quantity);
    let quantity = value.as_complex().unwrap();
    assert_eq!(quantity.primitive("value").unwrap().value.as_ref().unwrap().to_string(), "7.20");
}

// ============================================================================
// Primitive metadata
// ============================================================================

#[test]
fn test_metadata_only_primitive_in_both_formats() {
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","_birthDate":{"id":"x"}}"#,
    )
    .unwrap();
    let birth_date = envelope.record().primitive("birthDate").unwrap();
    assert_eq!(birth_date.value, None);
    assert_eq!(birth_date.id.as_deref(), Some("x"));

    let json = to_json_value(registry(), &envelope).unwrap();
    assert_eq!(
        json,
        json!({ "resourceType": "Patient", "birthDate": null, "_birthDate": { "id": "x" } })
    );

    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert!(xml.contains(r#"<birthDate id="x"/>"#));
    assert_eq!(from_xml_str(registry(), &xml).unwrap(), envelope);
}

#[test]
fn test_primitive_array_gap_alignment() {
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","name":[{"given":["a",null,"c"],"_given":[null,{"id":"m"}]}]}"#,
    )
    .unwrap();
    let name = &envelope.record().complexes("name").unwrap()[0];
    assert_eq!(
        name.primitives("given").unwrap(),
        &[
            Primitive::from("a"),
            Primitive::metadata_only(Some("m".to_string()), Vec::new()),
            Primitive::from("c"),
        ]
    );

    let json = to_json_value(registry(), &envelope).unwrap();
    assert_eq!(json["name"][0]["given"], json!(["a", null, "c"]));
    assert_eq!(json["name"][0]["_given"], json!([null, { "id": "m" }, null]));
}

#[test]
fn test_empty_array_positions_dropped() {
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","name":[{"given":["a",null,"c"]}]}"#,
    )
    .unwrap();
    let name = &envelope.record().complexes("name").unwrap()[0];
    assert_eq!(name.primitives("given").unwrap().len(), 2);
}

#[test]
fn test_longer_shadow_array_rejected() {
    let err = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","name":[{"given":["a"],"_given":[null,{"id":"m"}]}]}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArrayAlignment);
    match err {
        FormatError::ArrayAlignment {
            path,
            field,
            values,
            shadows,
        } => {
            assert_eq!(path, "Patient.name[0]");
            assert_eq!(field, "given");
            assert_eq!((values, shadows), (1, 2));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_nested_extensions_round_trip() {
    let extension = Extension::new("http://example.org/complex")
        .with_id("outer")
        .with_extension(
            Extension::new("part").with_value(
                Choice::complex(
                    Record::new("Coding")
                        .with("system", Primitive::from("http://loinc.org"))
                        .with("code", Primitive::from("1234-5")),
                )
                .unwrap(),
            ),
        )
        .with_extension(
            Extension::new("flag")
                .with_value(Choice::primitive(DataType::Boolean, Primitive::from(true)).unwrap()),
        );
    let patient = Record::new("Patient")
        .with("extension", vec![extension])
        .with(
            "active",
            Primitive::from(true).with_extension(Extension::new("http://example.org/source")),
        );
    let envelope = ResourceEnvelope::new(patient);

    let json = to_json_value(registry(), &envelope).unwrap();
    assert_eq!(json["extension"][0]["extension"][0]["valueCoding"]["code"], "1234-5");
    assert_eq!(from_json_value(registry(), &json).unwrap(), envelope);

    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert_eq!(from_xml_str(registry(), &xml).unwrap(), envelope);
}

#[test]
fn test_multiline_values_survive_xml() {
    let note = Record::new("Annotation").with(
        "text",
        Primitive::from("# Findings\n\n* first\r\n* second\twith tab"),
    );
    let observation = Record::new("Observation")
        .with("status", Primitive::from("final"))
        .with("note", vec![note])
        .with(
            "extension",
            vec![Extension::new("http://example.org/comment")
                .with_id("c\n1")
                .with_value(
                    Choice::primitive(DataType::Markdown, Primitive::from("a\nb")).unwrap(),
                )],
        );
    let envelope = ResourceEnvelope::new(observation);

    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert!(xml.contains("&#10;&#10;* first&#13;&#10;* second&#9;with tab"));
    assert_eq!(from_xml_str(registry(), &xml).unwrap(), envelope);

    let json = to_json_value(registry(), &envelope).unwrap();
    assert_eq!(from_json_value(registry(), &json).unwrap(), envelope);
}

#[test]
fn test_extension_values_of_metadata_types() {
    let envelope = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","extension":[{"url":"http://x","valueContactDetail":{"name":"n","telecom":[{"system":"email","value":"a@b.c"}]}},{"url":"http://y","valueUsageContext":{"code":{"code":"focus"},"valueReference":{"reference":"Patient/1"}}}]}"#,
    )
    .unwrap();
    let extensions = envelope.record().extensions("extension").unwrap();
    let value = extensions[0].value.as_ref().unwrap();
    assert_eq!(value.data_type(), DataType::ContactDetail);

    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert!(xml.contains("<valueContactDetail>"));
    assert!(xml.contains("<valueUsageContext>"));
    assert_eq!(from_xml_str(registry(), &xml).unwrap(), envelope);
}

#[test]
fn test_undefined_variant_type_is_structural() {
    let mut catalog = SchemaCatalog::new();
    catalog
        .insert(
            TypeSchema::builder("Gadget", TypeKind::Resource)
                .primitive("id", DataType::Id)
                .extensions("extension")
                .build()
                .unwrap(),
        )
        .unwrap();
    let registry = Registry::from_catalog(catalog).unwrap();

    let err = from_json_str(
        &registry,
        r#"{"resourceType":"Gadget","extension":[{"url":"http://x","valueContactDetail":{"name":"n"}}]}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.path(), Some("Gadget.extension[0].valueContactDetail"));

    let err = from_xml_str(
        &registry,
        r#"<Gadget xmlns="http://hl7.org/fhir"><extension url="http://x"><valueContactDetail><name value="n"/></valueContactDetail></extension></Gadget>"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    // primitive variants need no schema
    let envelope = from_json_str(
        &registry,
        r#"{"resourceType":"Gadget","extension":[{"url":"http://x","valueString":"ok"}]}"#,
    )
    .unwrap();
    assert_eq!(envelope.record().extensions("extension").unwrap().len(), 1);
}

// ============================================================================
// Resource dispatch
// ============================================================================

#[test]
fn test_unknown_discriminator() {
    let err = from_json_str(registry(), r#"{"resourceType":"Spaceship"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownDiscriminator);

    let err = from_xml_str(registry(), r#"<Spaceship xmlns="http://hl7.org/fhir"/>"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownDiscriminator);

    let err = from_json_str(
        registry(),
        r#"{"resourceType":"Patient","contained":[{"resourceType":"Spaceship"}]}"#,
    )
    .unwrap_err();
    match err {
        FormatError::UnknownResourceType {
            path,
            resource_type,
        } => {
            assert_eq!(path, "Patient.contained[0]");
            assert_eq!(resource_type, "Spaceship");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_period_choice_with_mixed_contained_resources() {
    let observation = Record::new("Observation")
        .with("id", Primitive::from("o1"))
        .with(
            "contained",
            vec![
                ResourceEnvelope::new(
                    Record::new("Patient")
                        .with("id", Primitive::from("p1"))
                        .with("gender", Primitive::from("other")),
                ),
                ResourceEnvelope::new(
                    Record::new("Encounter")
                        .with("id", Primitive::from("e1"))
                        .with("status", Primitive::from("finished")),
                ),
            ],
        )
        .with("status", Primitive::from("final"))
        .with(
            "effective",
            Choice::complex(
                Record::new("Period")
                    .with("start", Primitive::from("2024-01-01"))
                    .with("end", Primitive::from("2024-01-02")),
            )
            .unwrap(),
        );
    let envelope = ResourceEnvelope::new(observation);

    let json = to_json_value(registry(), &envelope).unwrap();
    assert_eq!(json["effectivePeriod"]["start"], "2024-01-01");
    assert_eq!(json["contained"][0]["resourceType"], "Patient");
    assert_eq!(json["contained"][1]["resourceType"], "Encounter");
    assert_eq!(from_json_value(registry(), &json).unwrap(), envelope);

    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert!(xml.contains("<effectivePeriod>"));
    assert_eq!(xml.matches("xmlns=").count(), 1);
    let decoded = from_xml_str(registry(), &xml).unwrap();
    assert_eq!(decoded, envelope);

    let contained = decoded.record().resources("contained").unwrap();
    let types: Vec<&str> = contained.iter().map(ResourceEnvelope::resource_type).collect();
    assert_eq!(types, vec!["Patient", "Encounter"]);
}

#[test]
fn test_custom_registry() {
    let mut catalog = ferrum_context::core::catalog().unwrap();
    catalog
        .insert(
            TypeSchema::builder("Widget", TypeKind::Resource)
                .primitive("id", DataType::Id)
                .primitive("size", DataType::PositiveInt)
                .choice("label", &[DataType::String, DataType::CodeableConcept])
                .build()
                .unwrap(),
        )
        .unwrap();
    let catalog: Arc<SchemaCatalog> = Arc::new(catalog);
    let widget = Arc::clone(catalog.get("Widget").unwrap());

    let registry = Registry::builder(Arc::clone(&catalog))
        .register("Widget", RecordCodec::new(widget))
        .unwrap()
        .register_type("Patient")
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(registry.resource_types(), vec!["Patient", "Widget"]);

    let codec = JsonCodec::new(&registry);
    let envelope = codec
        .decode_resource(r#"{"resourceType":"Widget","size":3,"labelString":"big"}"#)
        .unwrap();
    assert_eq!(envelope.record().primitive("size"), Some(&Primitive::from(3)));

    // only registered types dispatch, even when the catalogue knows them
    let err = codec
        .decode_resource(r#"{"resourceType":"Observation","status":"final"}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownDiscriminator);

    let xml = XmlCodec::new(&registry).encode_resource(&envelope).unwrap();
    assert!(xml.contains(r#"<labelString value="big"/>"#));
}

#[test]
fn test_registry_rejects_bad_registrations() {
    let catalog = Arc::new(ferrum_context::core::catalog().unwrap());
    let period = Arc::clone(catalog.get("Period").unwrap());
    let patient = Arc::clone(catalog.get("Patient").unwrap());

    let err = Registry::builder(Arc::clone(&catalog))
        .register("Period", RecordCodec::new(period))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);

    let err = Registry::builder(Arc::clone(&catalog))
        .register("Person", RecordCodec::new(Arc::clone(&patient)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);

    let err = Registry::builder(Arc::clone(&catalog))
        .register("Patient", RecordCodec::new(Arc::clone(&patient)))
        .and_then(|builder| builder.register("Patient", RecordCodec::new(patient)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);
}

// ============================================================================
// XML structure
// ============================================================================

#[test]
fn test_xml_structure_rejections() {
    let cases = [
        (
            r#"<Patient xmlns="http://example.org/other"/>"#,
            "foreign namespace",
        ),
        (
            r#"<Patient xmlns="http://hl7.org/fhir"><active value="true" extra="1"/></Patient>"#,
            "unexpected attribute",
        ),
        (
            r#"<Patient xmlns="http://hl7.org/fhir"><active value="true">yes</active></Patient>"#,
            "text content",
        ),
        (
            r#"<Patient xmlns="http://hl7.org/fhir"><contained></contained></Patient>"#,
            "empty wrapper",
        ),
        (
            r#"<Patient xmlns="http://hl7.org/fhir"><text><div><p>x</p></div></text></Patient>"#,
            "narrative outside the XHTML namespace",
        ),
        (
            r#"<Patient xmlns="http://hl7.org/fhir"><extension><valueString value="x"/></extension></Patient>"#,
            "extension without url",
        ),
    ];

    for (xml, description) in cases {
        let err = from_xml_str(registry(), xml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural, "{}", description);
    }
}

#[test]
fn test_xml_comments_and_whitespace_ignored() {
    let envelope = from_xml_str(
        registry(),
        r#"<?xml version="1.0"?>
        <!-- leading comment -->
        <Patient xmlns="http://hl7.org/fhir">
            <!-- inner comment -->
            <active value="true"/>
        </Patient>"#,
    )
    .unwrap();
    assert_eq!(envelope.record().primitive("active"), Some(&Primitive::from(true)));
}

#[test]
fn test_xhtml_passthrough() {
    let div = r#"<div xmlns="http://www.w3.org/1999/xhtml"><p>A &amp; B <i>x</i></p><br/></div>"#;
    let json = json!({
        "resourceType": "Basic",
        "text": { "status": "generated", "div": div }
    });
    let envelope = from_json_value(registry(), &json).unwrap();
    let xml = to_xml_string(registry(), &envelope).unwrap();
    assert!(xml.contains(div));

    let decoded = from_xml_str(registry(), &xml).unwrap();
    let text = decoded.record().complex("text").unwrap();
    assert_eq!(text.get("div"), Some(&FieldValue::Xhtml(div.to_string())));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_lenient_mode_skips_unknown_elements() {
    let options = CodecOptions::default().lenient();
    let json = JsonCodec::with_options(registry(), options.clone());
    let envelope = json
        .decode_resource(r#"{"resourceType":"Patient","active":true,"colour":"blue"}"#)
        .unwrap();
    assert_eq!(envelope.record().len(), 1);

    let xml = XmlCodec::with_options(registry(), options);
    let envelope = xml
        .decode_resource(r#"<Patient xmlns="http://hl7.org/fhir"><colour value="blue"/><active value="true"/></Patient>"#)
        .unwrap();
    assert_eq!(envelope.record().len(), 1);
    // primitive metadata stays strict
    let err = JsonCodec::with_options(registry(), CodecOptions::default().lenient())
        .decode_resource(r#"{"resourceType":"Patient","active":true,"_active":{"id":"a","bogus":1}}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

fn nested_sections(depth: usize) -> serde_json::Value {
    let mut section = json!({ "title": "leaf" });
    for i in 0..depth {
        section = json!({ "title": format!("level {}", i), "section": [section] });
    }
    json!({ "resourceType": "Composition", "status": "final", "section": [section] })
}

/// Bundles embedding bundles through `entry.resource`.
fn nested_bundles(depth: usize) -> serde_json::Value {
    let mut bundle = json!({ "resourceType": "Patient", "id": "innermost" });
    for i in 0..depth {
        bundle = json!({
            "resourceType": "Bundle",
            "id": format!("b{}", i),
            "type": "collection",
            "entry": [{ "resource": bundle }]
        });
    }
    bundle
}

#[test]
fn test_deep_nesting_within_limit() {
    // fixed stack: the depth limit must trip long before it runs out
    let handle = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let registry = Registry::core();
            let value = nested_sections(60);
            let envelope = from_json_value(registry, &value).unwrap();
            assert_eq!(to_json_value(registry, &envelope).unwrap(), value);

            let xml = to_xml_string(registry, &envelope).unwrap();
            assert_eq!(from_xml_str(registry, &xml).unwrap(), envelope);

            let err = from_json_value(registry, &nested_sections(500)).unwrap_err();
            assert!(matches!(err, FormatError::DepthLimit { limit: 100, .. }));

            let bundles = nested_bundles(30);
            let envelope = from_json_value(registry, &bundles).unwrap();
            let xml = to_xml_string(registry, &envelope).unwrap();
            assert_eq!(xml.matches("<resource>").count(), 30);
            assert_eq!(from_xml_str(registry, &xml).unwrap(), envelope);
        })
        .unwrap();
    handle.join().unwrap();
}

#[test]
fn test_depth_limit_is_configurable() {
    let codec = JsonCodec::with_options(registry(), CodecOptions::default().with_max_depth(5));
    let err = codec.decode_value(&nested_sections(10)).unwrap_err();
    assert!(matches!(err, FormatError::DepthLimit { limit: 5, .. }));
    assert!(codec.decode_value(&nested_sections(2)).is_ok());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_shared_registry_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let registry = Registry::core();
                let input = format!(
                    r#"{{"resourceType":"Patient","id":"p{}","multipleBirthInteger":{}}}"#,
                    i, i
                );
                let envelope = from_json_str(registry, &input).unwrap();
                let xml = to_xml_string(registry, &envelope).unwrap();
                assert_eq!(from_xml_str(registry, &xml).unwrap(), envelope);
                envelope
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let envelope = handle.join().unwrap();
        assert_eq!(
            envelope.record().primitive("id"),
            Some(&Primitive::from(format!("p{}", i)))
        );
    }
}

// ============================================================================
// Property tests
// ============================================================================

/// Drop the characters XML 1.0 cannot carry at all, even as references.
fn clean(text: String) -> Option<String> {
    let text: String = text
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
            )
        })
        .collect();
    (!text.is_empty()).then_some(text)
}

fn patient_from(
    given: Vec<(Option<String>, Option<String>)>,
    active: Option<bool>,
    multiple_birth: Option<i32>,
) -> ResourceEnvelope {
    let given: Vec<Primitive> = given
        .into_iter()
        .map(|(value, id)| Primitive {
            value: value.and_then(clean).map(Into::into),
            id: id.and_then(clean),
            extension: Vec::new(),
        })
        .filter(|primitive| !primitive.is_empty())
        .collect();

    let mut patient = Record::new("Patient");
    if !given.is_empty() {
        patient.set("name", vec![Record::new("HumanName").with("given", given)]);
    }
    if let Some(active) = active {
        patient.set("active", Primitive::from(active));
    }
    if let Some(count) = multiple_birth {
        patient.set(
            "multipleBirth",
            Choice::primitive(DataType::Integer, Primitive::from(count)).unwrap(),
        );
    }
    ResourceEnvelope::new(patient)
}

#[test]
fn test_quickcheck_round_trip() {
    fn prop(
        given: Vec<(Option<String>, Option<String>)>,
        active: Option<bool>,
        multiple_birth: Option<i32>,
    ) -> TestResult {
        let registry = Registry::core();
        let envelope = patient_from(given, active, multiple_birth);

        let json = match to_json_value(registry, &envelope) {
            Ok(json) => json,
            Err(_) => return TestResult::failed(),
        };
        if from_json_value(registry, &json).ok().as_ref() != Some(&envelope) {
            return TestResult::failed();
        }

        let xml = match to_xml_string(registry, &envelope) {
            Ok(xml) => xml,
            Err(_) => return TestResult::failed(),
        };
        TestResult::from_bool(from_xml_str(registry, &xml).ok().as_ref() == Some(&envelope))
    }

    QuickCheck::new().tests(200).quickcheck(
        prop as fn(Vec<(Option<String>, Option<String>)>, Option<bool>, Option<i32>) -> TestResult,
    );
}
