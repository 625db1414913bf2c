use resolver::{ErrorKind, LoadError, ParserOptions, ResolveError, ResolvedBag, Value, load};

fn run(source: &str) -> ResolvedBag {
    load(source).expect("load failed")
}

fn run_err(source: &str) -> LoadError {
    load(source).expect_err("expected load to fail")
}

#[test]
fn literal_types() {
    let bag = run("c\n  x = 42\n  y = 3.14\n  z = true\n  w = hello world\n");
    let c = bag.get("c").unwrap();
    assert_eq!(c.get("x"), Some(&Value::Integer(42)));
    assert_eq!(c.get("y"), Some(&Value::Float("3.14".parse().unwrap())));
    assert_eq!(c.get("z"), Some(&Value::Boolean(true)));
    assert_eq!(c.get("w"), Some(&Value::String("hello world".into())));
}

#[test]
fn abstract_default_block_is_not_emitted() {
    let source = ":: abstract\n    prop1 = 1\n\nmy class :: abstract\n    prop2 = 2\n";
    let bag = run(source);

    assert_eq!(bag.class_names().collect::<Vec<_>>(), ["my class"]);
    let my_class = bag.get("my class").unwrap();
    assert_eq!(my_class.len(), 2);
    assert_eq!(my_class.get_int("prop1"), Some(1));
    assert_eq!(my_class.get_int("prop2"), Some(2));
}

#[test]
fn abstract_classes_are_excluded() {
    let bag = run(":: a\n  x = 1\n:: b :: a\n  y = 2\nc :: b\n::\n  ignored = true\n");
    assert_eq!(bag.len(), 1);
    assert!(!bag.contains("a"));
    assert!(!bag.contains("b"));
    assert!(!bag.contains(""));
    assert_eq!(bag.get("c").unwrap().get_int("x"), Some(1));
}

#[test]
fn own_properties_override_inherited() {
    let bag = run("base\n  from base = value\n  override = base value\nderived :: base\n  from derived = value\n  override = derived value\n");
    let derived = bag.get("derived").unwrap();
    assert_eq!(derived.len(), 3);
    assert_eq!(derived.get_str("from base"), Some("value"));
    assert_eq!(derived.get_str("override"), Some("derived value"));
    // the base itself is untouched
    assert_eq!(bag.get("base").unwrap().get_str("override"), Some("base value"));
}

#[test]
fn later_bases_override_earlier_ones() {
    let bag = run(":: a\n  foo = from a\n  bar = from a\n:: b\n  foo = from b\n  baz = from b\nc :: a :: b\n  sprang = from c\n");
    let c = bag.get("c").unwrap();
    assert_eq!(c.len(), 4);
    assert_eq!(c.get_str("foo"), Some("from b"));
    assert_eq!(c.get_str("bar"), Some("from a"));
    assert_eq!(c.get_str("baz"), Some("from b"));
    assert_eq!(c.get_str("sprang"), Some("from c"));
}

#[test]
fn comma_separated_bases() {
    let bag = run(":: a\n  k = a\n:: b\n  k = b\nab :: a, b\nba :: b, a\n");
    assert_eq!(bag.get("ab").unwrap().get_str("k"), Some("b"));
    assert_eq!(bag.get("ba").unwrap().get_str("k"), Some("a"));
}

#[test]
fn diamond_takes_the_later_override() {
    let source = "\
:: A
    shared = from A
    only a = 1
:: B :: A
    shared = from B
:: C :: A
    shared = from C
D :: B, C
E :: C, B
F :: B, C
    shared = from F
";
    let bag = run(source);
    assert_eq!(bag.get("D").unwrap().get_str("shared"), Some("from C"));
    assert_eq!(bag.get("E").unwrap().get_str("shared"), Some("from B"));
    assert_eq!(bag.get("F").unwrap().get_str("shared"), Some("from F"));
    assert_eq!(bag.get("D").unwrap().get_int("only a"), Some(1));
}

#[test]
fn diamond_falls_back_to_the_root() {
    let bag = run(":: A\n  shared = from A\n:: B :: A\n  b = 1\n:: C :: A\n  c = 1\nD :: B, C\n");
    assert_eq!(bag.get("D").unwrap().get_str("shared"), Some("from A"));
}

#[test]
fn diamond_where_only_one_side_overrides() {
    // C re-inherits A after B overrode the key, so A's value wins again
    let bag = run(":: A\n  shared = from A\n:: B :: A\n  shared = from B\n:: C :: A\nD :: B, C\n");
    assert_eq!(bag.get("D").unwrap().get_str("shared"), Some("from A"));
}

#[test]
fn nested_groups_merge_key_wise() {
    let source = "\
:: creature
    stats
        hp = 10
        mp = 5
    name = creature
goblin :: creature
    stats
        hp = 3
        speed = 1.5
";
    let bag = run(source);
    let goblin = bag.get("goblin").unwrap();
    assert_eq!(goblin.get_path("stats.hp"), Some(&Value::Integer(3)));
    assert_eq!(goblin.get_path("stats.mp"), Some(&Value::Integer(5)));
    assert_eq!(goblin.get_path("stats.speed"), Some(&Value::Float(1.5)));
    assert_eq!(goblin.get_str("name"), Some("creature"));
}

#[test]
fn nested_groups_inherit_from_siblings() {
    let source = "\
base
    a = 1
derived :: base
    child base :: base
        b = 2
    other child :: child base
        c = 3
";
    let bag = run(source);
    let other = bag.get("derived").unwrap().get_group("other child").unwrap();
    assert_eq!(other.get_int("a"), Some(1));
    assert_eq!(other.get_int("b"), Some(2));
    assert_eq!(other.get_int("c"), Some(3));
}

#[test]
fn same_name_base_uses_the_enclosing_scope() {
    let source = "\
foo
  bar = in base
a
  foo ::
    bar = overridden
b
  foo ::
";
    let bag = run(source);
    assert_eq!(bag.get("foo").unwrap().get_str("bar"), Some("in base"));
    assert_eq!(
        bag.get("a").unwrap().get_path("foo.bar"),
        Some(&Value::String("overridden".into()))
    );
    assert_eq!(bag.get("b").unwrap().get_path("foo.bar"), Some(&Value::String("in base".into())));
}

#[test]
fn abstract_group_templates() {
    let source = "\
inventory
    :: slot
        capacity = 10
        locked = false
    left hand :: slot
    right hand :: slot
        capacity = 20
";
    let bag = run(source);
    let inventory = bag.get("inventory").unwrap();
    assert!(!inventory.contains_key("slot"));
    assert_eq!(inventory.get_path("left hand.capacity"), Some(&Value::Integer(10)));
    assert_eq!(inventory.get_path("right hand.capacity"), Some(&Value::Integer(20)));
    assert_eq!(inventory.get_path("right hand.locked"), Some(&Value::Boolean(false)));
}

#[test]
fn literal_replaces_inherited_group() {
    let bag = run("base\n  g\n    x = 1\nchild :: base\n  g = flat\n");
    assert_eq!(bag.get("child").unwrap().get_str("g"), Some("flat"));
}

#[test]
fn multiline_values_and_comments() {
    let source = "\
// a whole-line comment
c  // trailing comment on a header
  description =
    a long
    description
  url = \"http://example.com\" // the quotes protect the slashes
";
    let bag = run(source);
    let c = bag.get("c").unwrap();
    assert_eq!(c.get_str("description"), Some("a long description"));
    assert_eq!(c.get_str("url"), Some("http://example.com"));
}

#[test]
fn stray_quote_keeps_the_comment_stripped() {
    let bag = run("c\n  t = 5\" screen // note\n");
    assert_eq!(bag.get("c").unwrap().get_str("t"), Some("5\" screen"));
}

#[test]
fn parse_diagnostics_point_at_the_given_file() {
    let err = run_err("x = 1\n");
    assert_eq!(err.kind(), ErrorKind::Structure);
    let diagnostics = err.diagnostics(7);
    assert!(!diagnostics.is_empty());
    for diagnostic in &diagnostics {
        assert!(!diagnostic.labels.is_empty());
        assert!(diagnostic.labels.iter().all(|label| label.file_id == 7));
    }
}

#[test]
fn forward_references_resolve() {
    let bag = run("early :: late\n  a = 1\nlate\n  b = 2\n");
    let early = bag.get("early").unwrap();
    assert_eq!(early.get_int("a"), Some(1));
    assert_eq!(early.get_int("b"), Some(2));
}

#[test]
fn classes_keep_declaration_order() {
    let bag = run("zeta\nalpha\nmid\n");
    assert_eq!(bag.class_names().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
}

#[test]
fn unknown_base() {
    let err = run_err("foo :: bar\n");
    assert_eq!(err.kind(), ErrorKind::UnknownBase);
    assert_eq!(err.line(), 1);
    match err {
        LoadError::Resolve(ResolveError::UnknownBase { base, class, .. }) => {
            assert_eq!(base, "bar");
            assert_eq!(class, "foo");
        }
        other => panic!("expected unknown base, got {:?}", other),
    }
}

#[test]
fn two_class_cycle() {
    let err = run_err("A :: B\nB :: A\n");
    assert_eq!(err.kind(), ErrorKind::Cycle);
    match err {
        LoadError::Resolve(ResolveError::Cycle { cycle, .. }) => {
            assert_eq!(cycle, ["A", "B", "A"]);
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn long_cycle_does_not_overflow() {
    let n = 5000;
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!("c{} :: c{}\n", i, (i + 1) % n));
    }
    let err = run_err(&source);
    assert_eq!(err.kind(), ErrorKind::Cycle);
    match err {
        LoadError::Resolve(ResolveError::Cycle { cycle, .. }) => {
            assert_eq!(cycle.len(), n + 1);
            assert_eq!(cycle.first(), cycle.last());
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn long_chain_does_not_overflow() {
    let n = 5000;
    let mut source = String::from("c0\n  root = true\n");
    for i in 1..n {
        source.push_str(&format!("c{} :: c{}\n", i, i - 1));
    }
    let bag = run(&source);
    assert_eq!(bag.len(), n);
    assert_eq!(bag.get(&format!("c{}", n - 1)).unwrap().get_bool("root"), Some(true));
}

#[test]
fn long_group_chain_does_not_overflow() {
    let n = 3000;
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!("c{}\n", i));
        if i + 1 < n {
            source.push_str(&format!("  g :: c{}\n", i + 1));
        } else {
            source.push_str("  leaf = true\n");
        }
    }
    let bag = run(&source);
    assert_eq!(bag.len(), n);

    let mut current = bag.get("c0").unwrap();
    let mut depth = 0;
    while let Some(next) = current.get_group("g") {
        current = next;
        depth += 1;
    }
    assert_eq!(depth, n - 1);
    assert_eq!(current.get_bool("leaf"), Some(true));
}

#[test]
fn error_kinds() {
    let cases = [
        ("c\n    a = 1\n  b = 2\n", ErrorKind::Indentation),
        ("c\n  a = 1\n\tb = 2\n", ErrorKind::Indentation),
        ("x = 1\n", ErrorKind::Structure),
        ("c :: a,,b\n", ErrorKind::Structure),
        ("a\na\n", ErrorKind::DuplicateClass),
        ("a :: missing\n", ErrorKind::UnknownBase),
        ("a :: a2\na2 :: a\n", ErrorKind::Cycle),
    ];
    for (source, kind) in cases {
        assert_eq!(run_err(source).kind(), kind, "{:?}", source);
    }
}

#[test]
fn no_partial_result_on_error() {
    // a valid class before the failure does not leak out
    assert!(load("good\n  a = 1\nbad :: nowhere\n").is_err());
}

#[test]
fn loads_are_independent() {
    let source = "a\n  x = 1\n";
    assert_eq!(run(source), run(source));
    assert!(load("b :: missing").is_err());
    assert_eq!(run(source).get("a").unwrap().get_int("x"), Some(1));
}

#[test]
fn custom_options() {
    let options = ParserOptions {
        comment_marker: "#".to_string(),
        ..ParserOptions::default()
    };
    let bag = resolver::load_with_options("c # comment\n  a = 1 # another\n", &options).unwrap();
    assert_eq!(bag.get("c").unwrap().get_int("a"), Some(1));
}

#[test]
fn bag_serializes_as_nested_maps() {
    let bag = run("c\n  n = 1\n  f = 0.5\n  s = text\n  g\n    b = false\n");
    let json = serde_json::to_string(&bag).unwrap();
    assert_eq!(
        json,
        r#"{"c":{"n":1,"f":0.5,"s":"text","g":{"b":false}}}"#
    );
}
