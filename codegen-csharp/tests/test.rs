use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use typewright::infer::Inference;
use typewright_csharp::codegen;

#[track_caller]
fn generated(samples: &[(&str, &str)]) -> Vec<String> {
    let mut inference = Inference::new(true);
    for (name, json) in samples {
        let value = serde_json::from_str(json).expect("invalid json");
        inference.add_sample(name, &value).expect("add sample");
    }
    let (graph, _) = inference.finish().expect("finish");
    codegen(&graph, &BTreeMap::new()).expect("codegen").lines
}

#[test]
fn simple_class() {
    let lines = generated(&[("Root", r#"{"id": 1, "name": "Ada", "score": 1.5}"#)]);
    assert_eq!(
        lines,
        vec![
            "using System;",
            "using System.Collections.Generic;",
            "using Newtonsoft.Json;",
            "",
            "namespace Generated",
            "{",
            "    public partial class Root",
            "    {",
            "        [JsonProperty(\"id\")]",
            "        public long Id { get; set; }",
            "",
            "        [JsonProperty(\"name\")]",
            "        public string Name { get; set; }",
            "",
            "        [JsonProperty(\"score\")]",
            "        public double Score { get; set; }",
            "    }",
            "}",
        ]
    );
}

#[test]
fn nested_classes_arrays_and_options() {
    let lines = generated(&[(
        "Order",
        r#"{
            "lines": [
                {"sku": "A", "qty": 1, "note": null},
                {"sku": "B", "qty": 2, "note": "gift"}
            ]
        }"#,
    )]);
    assert_eq!(
        lines,
        vec![
            "using System;",
            "using System.Collections.Generic;",
            "using Newtonsoft.Json;",
            "",
            "namespace Generated",
            "{",
            "    public partial class Order",
            "    {",
            "        [JsonProperty(\"lines\")]",
            "        public Line[] Lines { get; set; }",
            "    }",
            "",
            "    public partial class Line",
            "    {",
            "        [JsonProperty(\"note\")]",
            "        public string Note { get; set; }",
            "",
            "        [JsonProperty(\"qty\")]",
            "        public long Qty { get; set; }",
            "",
            "        [JsonProperty(\"sku\")]",
            "        public string Sku { get; set; }",
            "    }",
            "}",
        ]
    );
}

#[test]
fn union_properties_get_a_struct() {
    let lines = generated(&[("Root", r#"{"value": [1, "x"]}"#)]);
    assert_eq!(
        lines,
        vec![
            "using System;",
            "using System.Collections.Generic;",
            "using Newtonsoft.Json;",
            "",
            "namespace Generated",
            "{",
            "    public partial class Root",
            "    {",
            "        [JsonProperty(\"value\")]",
            "        public Value[] TheValue { get; set; }",
            "    }",
            "",
            "    public partial struct Value",
            "    {",
            "        public long? Integer;",
            "        public string String;",
            "    }",
            "}",
        ]
    );
}

#[test]
fn maps_and_keyword_collisions() {
    let lines = generated(&[(
        "Config",
        r#"{
            "labels": {"en": "one", "fr": "un", "de": "eins"},
            "class": true
        }"#,
    )]);
    assert_eq!(
        lines,
        vec![
            "using System;",
            "using System.Collections.Generic;",
            "using Newtonsoft.Json;",
            "",
            "namespace Generated",
            "{",
            "    public partial class Config",
            "    {",
            "        [JsonProperty(\"class\")]",
            "        public bool Class { get; set; }",
            "",
            "        [JsonProperty(\"labels\")]",
            "        public Dictionary<string, string> Labels { get; set; }",
            "    }",
            "}",
        ]
    );
}

#[test]
fn non_class_top_levels_are_noted() {
    let result = {
        let mut inference = Inference::new(true);
        let value = serde_json::from_str(r#"[1, 2, 3]"#).expect("invalid json");
        inference.add_sample("Numbers", &value).expect("add sample");
        let (graph, _) = inference.finish().expect("finish");
        codegen(&graph, &BTreeMap::new()).expect("codegen")
    };
    assert!(
        result
            .lines
            .iter()
            .any(|line| line.contains("// Numbers is a long[]"))
    );
    assert_eq!(result.annotations.len(), 1);
}

#[test]
fn output_is_stable() {
    let sample = r#"{"a": {"x": 1}, "b": {"x": 2}, "c": [true, null]}"#;
    assert_eq!(generated(&[("Root", sample)]), generated(&[("Root", sample)]));
}
