use pretty_assertions::assert_eq;
use typewright::infer::Inference;
use typewright::render::Annotation;
use typewright_typescript::codegen;

#[track_caller]
fn generated(samples: &[(&str, &str)]) -> Vec<String> {
    generated_result(samples).lines
}

#[track_caller]
fn generated_result(samples: &[(&str, &str)]) -> typewright::render::SerializedRenderResult {
    let mut inference = Inference::new(true);
    for (name, json) in samples {
        let value = serde_json::from_str(json).expect("invalid json");
        inference.add_sample(name, &value).expect("add sample");
    }
    let (graph, _) = inference.finish().expect("finish");
    codegen(&graph).expect("codegen")
}

#[test]
fn simple_interface() {
    let lines = generated(&[("Root", r#"{"id": 1, "name": "Ada", "ok": true}"#)]);
    assert_eq!(
        lines,
        vec![
            "export interface Root {",
            "    id: number;",
            "    name: string;",
            "    ok: boolean;",
            "}",
        ]
    );
}

#[test]
fn nested_shapes() {
    let lines = generated(&[(
        "Order",
        r#"{
            "lines": [{"sku": "A", "note": null}, {"sku": "B", "note": "gift"}],
            "labels": {"en": "one", "fr": "un", "de": "eins"}
        }"#,
    )]);
    assert_eq!(
        lines,
        vec![
            "export interface Order {",
            "    labels: { [key: string]: string };",
            "    lines: Line[];",
            "}",
            "",
            "export interface Line {",
            "    note: string | null;",
            "    sku: string;",
            "}",
        ]
    );
}

#[test]
fn unions_become_type_aliases() {
    let lines = generated(&[("Root", r#"{"value": [1, "x", 2.5]}"#)]);
    assert_eq!(
        lines,
        vec![
            "export interface Root {",
            "    value: Value[];",
            "}",
            "",
            "export type Value = number | string;",
        ]
    );
}

#[test]
fn odd_property_names_are_quoted() {
    let lines = generated(&[("Root", r#"{"first name": "Ada", "_tag": 1}"#)]);
    assert_eq!(
        lines,
        vec![
            "export interface Root {",
            "    _tag: number;",
            "    \"first name\": string;",
            "}",
        ]
    );
}

#[test]
fn non_class_top_levels_get_aliases() {
    let lines = generated(&[("Numbers", r#"[1, 2, 3]"#)]);
    assert_eq!(lines, vec!["export type Numbers = number[];"]);
}

#[test]
fn enums_are_reported_as_unsupported() {
    let schema = r#"{
        "type": "object",
        "title": "Shirt",
        "properties": {"size": {"enum": ["S", "M", "L"], "title": "Size"}},
        "required": ["size"]
    }"#;
    let mut inference = Inference::new(true);
    let value = serde_json::from_str(schema).expect("invalid json");
    inference.add_schema("Shirt", &value).expect("add schema");
    let (graph, _) = inference.finish().expect("finish");
    let result = codegen(&graph).expect("codegen");

    assert_eq!(
        result.lines,
        vec![
            "export interface Shirt {",
            "    size: Size;",
            "}",
            "",
            "export type Size = string;",
        ]
    );
    assert_eq!(result.annotations.len(), 1);
    match &result.annotations[0].annotation {
        Annotation::Issue(message) => assert!(message.contains("enums are not supported")),
        other => panic!("expected an issue annotation, got {other:?}"),
    }
}

#[test]
fn output_is_stable() {
    let sample = r#"{"a": [{"x": []}], "b": {"y": null}}"#;
    assert_eq!(generated(&[("Root", sample)]), generated(&[("Root", sample)]));
}
