pub mod canonical;
pub mod graph;
pub mod graphql;
pub mod infer;
pub mod naming;
pub mod render;
pub mod schema;
pub mod union;

#[cfg(test)]
mod tests {
    use crate::{
        graph::{IrGraph, IrType},
        infer::Inference,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn single_sample_objects() {
        TestCase::new()
            .sample("Root", r#"{"a": 1, "b": "x"}"#)
            .graph("Root:{a:int,b:str}")
            .run();

        TestCase::new()
            .sample("Root", r#"{}"#)
            .graph("Root:{}")
            .run();

        TestCase::new()
            .sample("Root", r#"{"x": 1.5, "y": true, "z": null}"#)
            .graph("Root:{x:double,y:bool,z:|null|}")
            .run();
    }

    #[test]
    fn empty_arrays_erase_once_siblings_contribute() {
        TestCase::new()
            .sample("Root", r#"{"xs": []}"#)
            .sample("Root", r#"{"xs": [1]}"#)
            .graph("Root:{xs:[int]}")
            .run();

        // the order of contribution does not matter
        TestCase::new()
            .sample("Root", r#"{"xs": [1]}"#)
            .sample("Root", r#"{"xs": []}"#)
            .graph("Root:{xs:[int]}")
            .run();

        // an empty array that never sees data widens to any
        TestCase::new()
            .sample("Root", r#"{"xs": []}"#)
            .graph("Root:{xs:[any]}")
            .run();
    }

    #[test]
    fn nulls_make_properties_optional() {
        TestCase::new()
            .sample("Root", r#"{"x": 1, "y": null}"#)
            .sample("Root", r#"{"x": null, "y": 2}"#)
            .graph("Root:{x:int?,y:int?}")
            .run();
    }

    #[test]
    fn disjoint_samples_optionalize() {
        TestCase::new()
            .sample("Root", r#"{"a": 1}"#)
            .sample("Root", r#"{"b": "x"}"#)
            .graph("Root:{a:int?,b:str?}")
            .run();
    }

    #[test]
    fn mixed_numbers_widen_to_double() {
        TestCase::new()
            .sample("Root", r#"{"n": [1, 2.5]}"#)
            .graph("Root:{n:[|double|]}")
            .run();

        TestCase::new()
            .sample("Root", r#"{"n": [1, "x"]}"#)
            .graph("Root:{n:[|int|str|]}")
            .run();
    }

    #[test]
    fn same_shape_nested_objects_share_one_class() {
        let mut inference = Inference::new(true);
        inference
            .add_sample(
                "Root",
                &serde_json::from_str(r#"{"p": {"a": 1}, "q": {"a": 2}}"#).expect("json"),
            )
            .expect("add sample");
        let (graph, _) = inference.finish().expect("finish");

        assert_eq!(format!("{graph}"), "Root:{p:{a:int},q:{a:int}}");

        // one arena entry for the root, one shared entry for p/q
        let reachable = graph.reachable_classes().expect("reachable");
        assert_eq!(reachable.len(), 2);

        let shared = graph.live(reachable[1]).expect("live");
        assert_eq!(
            shared.names.get().iter().cloned().collect::<Vec<_>>(),
            vec!["p".to_string(), "q".to_string()]
        );
    }

    #[test]
    fn schema_with_empty_required_is_all_optional() {
        TestCase::new()
            .schema(
                "Root",
                r#"{
                    "type": "object",
                    "properties": {"n": {"type": "integer"}},
                    "required": []
                }"#,
            )
            .graph("Root:{n:int?}")
            .run();
    }

    #[test]
    fn uniform_objects_demote_to_maps() {
        let sample = r#"[{"en": "one"}, {"fr": "un"}, {"de": "eins"}]"#;

        TestCase::new()
            .sample("Root", sample)
            .graph("Root:[{*:str}]")
            .run();

        TestCase::new()
            .no_maps()
            .sample("Root", sample)
            .graph("Root:[{en:str?,fr:str?,de:str?}]")
            .run();
    }

    #[test]
    fn disagreeing_objects_stay_classes() {
        // int and str never unify to one map value type
        TestCase::new()
            .sample("Root", r#"{"wrap": {"id": 1, "name": "x"}}"#)
            .graph("Root:{wrap:{id:int,name:str}}")
            .run();
    }

    #[test]
    fn api_response() {
        TestCase::new()
            .sample(
                "Response",
                r#"
                {
                    "user": {
                        "id": 7,
                        "name": "Ada",
                        "verified": true
                    },
                    "items": [
                        {"sku": "A-1", "qty": 2, "price": 499.99, "note": null},
                        {"sku": "B-9", "qty": 1, "price": 12.5, "note": "gift"}
                    ],
                    "next_page": null
                }
                "#,
            )
            .graph(
                "Response:{\
                user:{id:int,name:str,verified:bool},\
                items:[{sku:str,qty:int,price:double,note:str?}],\
                next_page:|null|\
            }",
            )
            .run();
    }

    #[test]
    fn recursive_samples_stay_finite() {
        let mut inference = Inference::new(true);
        inference
            .add_sample(
                "List",
                &serde_json::from_str(
                    r#"
                    [
                        {"val": 1, "next": null},
                        {"val": 2, "next": {"val": 3, "next": null}}
                    ]
                    "#,
                )
                .expect("json"),
            )
            .expect("add sample");
        let (graph, _) = inference.finish().expect("finish");
        assert_no_dangling(&graph);
    }

    struct TestCase<'a> {
        sources: Vec<(&'a str, Source<'a>)>,
        infer_maps: bool,
        expected: Option<&'a str>,
    }

    enum Source<'a> {
        Sample(&'a str),
        Schema(&'a str),
    }

    impl<'a> TestCase<'a> {
        fn new() -> Self {
            Self {
                sources: vec![],
                infer_maps: true,
                expected: None,
            }
        }

        fn no_maps(mut self) -> Self {
            self.infer_maps = false;
            self
        }

        fn sample(mut self, name: &'a str, json: &'a str) -> Self {
            self.sources.push((name, Source::Sample(json)));
            self
        }

        fn schema(mut self, name: &'a str, json: &'a str) -> Self {
            self.sources.push((name, Source::Schema(json)));
            self
        }

        fn graph(mut self, expected: &'a str) -> Self {
            self.expected = Some(expected);
            self
        }

        #[track_caller]
        fn run(self) {
            let mut inference = Inference::new(self.infer_maps);
            for (name, source) in &self.sources {
                match source {
                    Source::Sample(json) => {
                        let value = serde_json::from_str(json).expect("invalid json");
                        inference.add_sample(name, &value).expect("add sample");
                    }
                    Source::Schema(json) => {
                        let value = serde_json::from_str(json).expect("invalid json");
                        inference.add_schema(name, &value).expect("add schema");
                    }
                }
            }
            let (mut graph, _) = inference.finish().expect("finish");

            if let Some(expected) = self.expected {
                assert_eq!(format!("{graph}"), expected, "CANONICAL GRAPH");
            }

            assert_no_dangling(&graph);

            // canonicalization is idempotent
            let before = format!("{graph}");
            crate::canonical::canonicalize(&mut graph, self.infer_maps)
                .expect("second canonicalization");
            assert_eq!(format!("{graph}"), before, "IDEMPOTENT CANONICALIZATION");
        }
    }

    /// No reachable slot may still be `NoInformation`, and every reachable
    /// class reference must resolve.
    #[track_caller]
    fn assert_no_dangling(graph: &IrGraph) {
        fn walk(graph: &IrGraph, ty: &IrType, depth: usize) {
            assert!(depth <= graph.class_count() + 8, "unbounded type nesting");
            match ty {
                IrType::NoInformation => panic!("NoInformation survived canonicalization"),
                IrType::Array(inner) | IrType::Map(inner) => walk(graph, inner, depth + 1),
                IrType::Class(id) => {
                    graph.live(*id).expect("class reference resolves");
                }
                IrType::Union(union) => {
                    for member in union.members() {
                        match &member {
                            IrType::Class(id) => {
                                graph.live(*id).expect("union class reference resolves");
                            }
                            IrType::Union(_) => {}
                            _ => walk(graph, &member, depth + 1),
                        }
                    }
                }
                _ => {}
            }
        }

        for ty in graph.toplevels.values() {
            walk(graph, ty, 0);
        }
        for id in graph.reachable_classes().expect("reachable") {
            for ty in graph.live(id).expect("live").properties.values() {
                walk(graph, ty, 0);
            }
        }
    }
}
