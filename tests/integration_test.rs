// Integration tests for Parser + Evaluator
//
// These tests drive complete expressions through the public API against
// JSON documents.

use serde_json::json;
use snapexpr::{compile, evaluate, evaluate_json, evaluate_with_options, jsonpath};
use snapexpr::{ErrorKind, EvalOptions, JValue};

fn doc(value: serde_json::Value) -> JValue {
    JValue::from(value)
}

fn eval(expr: &str, data: serde_json::Value) -> JValue {
    evaluate(expr, &doc(data)).unwrap_or_else(|e| panic!("{} failed: {}", expr, e))
}

fn eval_err(expr: &str, data: serde_json::Value) -> ErrorKind {
    match evaluate(expr, &doc(data)) {
        Ok(v) => panic!("{} unexpectedly produced {}", expr, v),
        Err(e) => e.kind(),
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

#[test]
fn test_field_path_matches_manual_traversal() {
    let data = json!({"user": {"name": "John", "tags": ["a", "b"]}});
    assert_eq!(eval("$.user.name", data.clone()), doc(json!("John")));
    assert_eq!(eval("$['user']['tags'][1]", data.clone()), doc(json!("b")));
    assert_eq!(eval("$.user.tags[-1]", data), JValue::Null);
}

#[test]
fn test_missing_path_is_null() {
    assert_eq!(eval("$.b.c", json!({"a": 1})), JValue::Null);
    assert_eq!(eval("$.a.b", json!({"a": 1})), JValue::Null);
    assert_eq!(eval("$.a[3]", json!({"a": [1]})), JValue::Null);
}

#[test]
fn test_wildcard_plurality() {
    let data = json!({"items": [{"v": 1}, {"v": 2}]});
    assert_eq!(eval("$.items[*].v", data.clone()), doc(json!([1, 2])));
    assert_eq!(eval("$.items[*].w", data.clone()), doc(json!([])));
    assert_eq!(eval("$.items.v", data), doc(json!([1, 2])));
}

#[test]
fn test_recursive_descent_is_preorder() {
    let data = json!({
        "id": 1,
        "child": {"id": 2, "child": {"id": 3}},
        "list": [{"id": 4}]
    });
    assert_eq!(eval("$..id", data), doc(json!([1, 2, 3, 4])));
}

#[test]
fn test_filters() {
    let data = json!({"books": [
        {"title": "A", "price": 8, "tags": ["x"]},
        {"title": "B", "price": 12},
        {"title": "C", "price": 20}
    ]});
    assert_eq!(
        eval("$.books[?(@.price > 10)].title", data.clone()),
        doc(json!(["B", "C"]))
    );
    assert_eq!(
        eval("$.books[?(@.price > 10 && @.price < 15)].title", data.clone()),
        doc(json!(["B"]))
    );
    assert_eq!(
        eval("$.books[?(@.price < 10 || @.title == 'C')].title", data.clone()),
        doc(json!(["A", "C"]))
    );
    assert_eq!(eval("$.books[?(@.price > 100)]", data), doc(json!([])));
}

#[test]
fn test_dynamic_accessors() {
    let data = json!({"key": "b", "i": 1, "obj": {"a": 1, "b": 2}, "arr": [10, 20]});
    assert_eq!(eval("$.obj[$.key]", data.clone()), doc(json!(2)));
    assert_eq!(eval("$.arr[$.i]", data.clone()), doc(json!(20)));
    assert_eq!(eval("$.obj.*", data), doc(json!([1, 2])));
}

#[test]
fn test_length_field() {
    let data = json!({"s": "hello", "a": [1, 2, 3]});
    assert_eq!(eval("$.s.length", data.clone()), doc(json!(5)));
    assert_eq!(eval("$.a.length", data), doc(json!(3)));
}

#[test]
fn test_path_syntax_errors() {
    assert_eq!(eval_err("$.a[1", json!({})), ErrorKind::PathSyntaxError);
    assert_eq!(eval_err("$.", json!({})), ErrorKind::PathSyntaxError);
    assert_eq!(eval_err("$.a[]", json!({})), ErrorKind::PathSyntaxError);
}

#[test]
fn test_jsonpath_entry_point() {
    let data = doc(json!({"a": {"b": [1, 2, 3]}}));
    assert_eq!(jsonpath(&data, "$.a.b[1]").unwrap(), doc(json!(2)));
    assert_eq!(jsonpath(&data, "a.b[*]").unwrap(), doc(json!([1, 2, 3])));
    assert_eq!(jsonpath(&data, "$").unwrap(), data);
    let err = jsonpath(&data, "$.a[0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathSyntaxError);
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[test]
fn test_operator_precedence() {
    assert_eq!(eval("2 + 3 * 4", json!({})), doc(json!(14)));
    assert_eq!(eval("(2 + 3) * 4", json!({})), doc(json!(20)));
    assert_eq!(eval("true || false && false", json!({})), JValue::Bool(true));
    assert_eq!(eval("10 - 4 - 3", json!({})), doc(json!(3)));
    assert_eq!(eval("1 + 2 == 3", json!({})), JValue::Bool(true));
}

#[test]
fn test_string_concatenation_vs_addition() {
    assert_eq!(eval("\"x\" + 1", json!({})), doc(json!("x1")));
    assert_eq!(eval("1 + 2", json!({})), doc(json!(3)));
    assert_eq!(eval("1 + 2 + 'a'", json!({})), doc(json!("3a")));
    assert_eq!(eval("$.a + $.b", json!({"a": "4", "b": 2})), doc(json!("42")));
}

#[test]
fn test_ternary_laziness() {
    assert_eq!(
        eval("$.missing ? $.alsoMissing.deep : 42", json!({})),
        doc(json!(42))
    );
    assert_eq!(eval("[] ? 'truthy' : 'falsy'", json!({})), doc(json!("truthy")));
    assert_eq!(eval("'' ? 'truthy' : 'falsy'", json!({})), doc(json!("falsy")));
    assert_eq!(
        eval("$.n > 1 ? 'big' : $.n > 0 ? 'one' : 'none'", json!({"n": 1})),
        doc(json!("one"))
    );
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval_err("10 / 0", json!({})), ErrorKind::DivisionByZeroError);
    assert_eq!(eval_err("10 / $.zero", json!({"zero": 0})), ErrorKind::DivisionByZeroError);
}

#[test]
fn test_equality() {
    assert_eq!(eval("1 == '1'", json!({})), JValue::Bool(true));
    assert_eq!(eval("1 === '1'", json!({})), JValue::Bool(false));
    assert_eq!(eval("true == 1", json!({})), JValue::Bool(true));
    assert_eq!(eval("null == null", json!({})), JValue::Bool(true));
    assert_eq!(eval("$.a === $.b", json!({"a": [1, {"x": 2}], "b": [1, {"x": 2}]})), JValue::Bool(true));
    assert_eq!(eval("1 !== 1", json!({})), JValue::Bool(false));
}

// ── Builtins ──────────────────────────────────────────────────────────────────

#[test]
fn test_string_builtins() {
    let data = json!({"name": "  Hello World  ", "snake": "some_value-here"});
    assert_eq!(eval("$.name.trim().toUpperCase()", data.clone()), doc(json!("HELLO WORLD")));
    assert_eq!(eval("$.snake.camelCase()", data.clone()), doc(json!("someValueHere")));
    assert_eq!(eval("'fooBar'.kebabCase()", data.clone()), doc(json!("foo-bar")));
    assert_eq!(eval("'fooBar'.snakeCase()", data.clone()), doc(json!("foo_bar")));
    assert_eq!(eval("'a,b,c'.split(',')", data.clone()), doc(json!(["a", "b", "c"])));
    assert_eq!(eval("'abc'.charAt(1)", data.clone()), doc(json!("b")));
    assert_eq!(eval("'hello'.contains('ell')", data.clone()), JValue::Bool(true));
    assert_eq!(eval("'hello'.substring(1, 3)", data.clone()), doc(json!("el")));
    assert_eq!(eval("'hello'.slice(-3)", data.clone()), doc(json!("llo")));
    assert_eq!(eval("'ab'.repeat(3)", data.clone()), doc(json!("ababab")));
    assert_eq!(eval_err("'ab'.repeat(1e18)", json!({})), ErrorKind::ResourceLimitExceeded);
    assert_eq!(eval_err("'ab'.repeat(-1)", json!({})), ErrorKind::TypeError);
    assert_eq!(eval("'A'.charCodeAt(0)", data.clone()), doc(json!(65)));
    assert_eq!(eval("'a\u{1F600}'.charCodeAt(1)", data.clone()), doc(json!(0xD83D)));
    assert_eq!(eval("'a\u{1F600}'.charCodeAt(2)", data.clone()), doc(json!(0xDE00)));
    assert_eq!(eval("'a-b-c'.replace('-', '+')", data.clone()), doc(json!("a+b-c")));
    assert_eq!(eval("'a-b-c'.replaceAll('-', '+')", data.clone()), doc(json!("a+b+c")));
    assert_eq!(eval("'a1b22'.replace(/\\d+/g, '#')", data.clone()), doc(json!("a#b#")));
    assert_eq!(eval("'2024-03'.match(/(\\d+)-(\\d+)/)[2]", data.clone()), doc(json!("03")));
    assert_eq!(
        eval("'Hello %s, you are %d'.sprintf('Ann', 30)", data),
        doc(json!("Hello Ann, you are 30"))
    );
}

#[test]
fn test_number_builtins() {
    assert_eq!(eval("(3.14159).toFixed(2)", json!({})), doc(json!("3.14")));
    assert_eq!(eval("$.n.toFixed(1)", json!({"n": 2.25})), doc(json!("2.3")));
    assert_eq!(eval("(12345).toExponential(2)", json!({})), doc(json!("1.23e+4")));
    assert_eq!(eval("(123.456).toPrecision(4)", json!({})), doc(json!("123.5")));
    assert_eq!(eval("(255).toString(16)", json!({})), doc(json!("ff")));
}

#[test]
fn test_array_builtins_are_non_mutating() {
    let data = doc(json!({"a": [3, 1, 2]}));
    let expr = compile("[$.a.push(4), $.a.pop(), $.a.sort(), $.a.reverse(), $.a.shift(), $.a]").unwrap();
    let result = expr.evaluate(&data).unwrap();
    assert_eq!(
        result,
        doc(json!([[3, 1, 2, 4], [3, 1], [1, 2, 3], [2, 1, 3], [1, 2], [3, 1, 2]]))
    );
    assert_eq!(data, doc(json!({"a": [3, 1, 2]})));
}

#[test]
fn test_array_higher_order_builtins() {
    let data = json!({"nums": [1, 2, 3, 4], "people": [
        {"name": "Ann", "age": 31},
        {"name": "Bob", "age": 25}
    ]});
    assert_eq!(eval("$.nums.map(x => x * 10)", data.clone()), doc(json!([10, 20, 30, 40])));
    assert_eq!(eval("$.nums.filter(x => x % 2 == 0)", data.clone()), doc(json!([2, 4])));
    assert_eq!(eval("$.nums.reduce((acc, x) => acc + x, 0)", data.clone()), doc(json!(10)));
    assert_eq!(eval("$.nums.reduceRight((acc, x) => acc + x, '')", data.clone()), doc(json!("4321")));
    assert_eq!(eval("$.people.find(p => p.age < 30).name", data.clone()), doc(json!("Bob")));
    assert_eq!(eval("$.people.findIndex(p => p.age > 40)", data.clone()), doc(json!(-1)));
    assert_eq!(
        eval("$.people.sort((a, b) => a.age - b.age).map(p => p.name)", data.clone()),
        doc(json!(["Bob", "Ann"]))
    );
    assert_eq!(
        eval("$.people.toObject(p => p.name, p => p.age)", data.clone()),
        doc(json!({"Ann": 31, "Bob": 25}))
    );
    assert_eq!(eval("$.nums.map('x + index')", data.clone()), doc(json!([1, 3, 5, 7])));
    assert_eq!(eval("$.nums.join('-')", data.clone()), doc(json!("1-2-3-4")));
    assert_eq!(eval("$.nums.includes(3)", data.clone()), JValue::Bool(true));
    assert_eq!(eval("$.nums.splice(1, 2, 'x')", data.clone()), doc(json!([1, "x", 4])));
    assert_eq!(eval("$.nums.slice(1, -1)", data.clone()), doc(json!([2, 3])));
    assert_eq!(eval("[10, 9, 1].sort()", data), doc(json!([1, 10, 9])));
    assert_eq!(eval_err("[].reduce((a, b) => a + b)", json!({})), ErrorKind::TypeError);
}

#[test]
fn test_object_builtins() {
    let data = json!({"o": {"a": 1, "b": {"c": [5, 6]}, "n": null}});
    assert_eq!(eval("$.o.keys()", data.clone()), doc(json!(["a", "b", "n"])));
    assert_eq!(
        eval("$.keys()", json!({"z": 1, "a": 2, "m": 3})),
        doc(json!(["z", "a", "m"]))
    );
    assert_eq!(
        serde_json::Value::from(&doc(json!({"z": 1, "a": 2}))).to_string(),
        r#"{"z":1,"a":2}"#
    );
    assert_eq!(eval("$.o.get('b.c[1]')", data.clone()), doc(json!(6)));
    assert_eq!(eval("$.o.get('b.x', 'dflt')", data.clone()), doc(json!("dflt")));
    assert_eq!(eval("$.o.get('n', 'dflt')", data.clone()), JValue::Null);
    assert_eq!(eval("$.o.hasPath('b.c[0]')", data.clone()), JValue::Bool(true));
    assert_eq!(eval("$.o.hasPath('b.z')", data.clone()), JValue::Bool(false));
    assert_eq!(eval("$.o.getFirst(['x', 'a'], 0)", data.clone()), doc(json!(1)));
    assert_eq!(eval("$.o.hasOwnProperty('n')", data.clone()), JValue::Bool(true));
    assert_eq!(eval("{}.isEmpty()", data.clone()), JValue::Bool(true));
    assert_eq!(
        eval("$.o.filter((v, k) => k != 'b')", data.clone()),
        doc(json!({"a": 1, "n": null}))
    );
    assert_eq!(
        eval("{a: 1, b: 2}.mapValues(v => v * 2)", data.clone()),
        doc(json!({"a": 2, "b": 4}))
    );
    assert_eq!(
        eval("{a: 1}.mapKeys((v, k) => k.toUpperCase())", data.clone()),
        doc(json!({"A": 1}))
    );
    assert_eq!(
        eval("{a: {x: 1}}.merge({a: {y: 2}})", data.clone()),
        doc(json!({"a": {"x": 1, "y": 2}}))
    );
    assert_eq!(
        eval("{a: {x: 1}}.extend({a: {y: 2}})", data.clone()),
        doc(json!({"a": {"y": 2}}))
    );
    assert_eq!(
        eval("{a: 1}.entries()", data),
        doc(json!([["a", 1]]))
    );
}

#[test]
fn test_math_namespace() {
    assert_eq!(eval("Math.max(1, 5, 3)", json!({})), doc(json!(5)));
    assert_eq!(eval("Math.min($.xs)", json!({"xs": [4, 2, 8]})), doc(json!(2)));
    assert_eq!(eval("Math.round(2.5)", json!({})), doc(json!(3)));
    assert_eq!(eval("Math.pow(2, 8)", json!({})), doc(json!(256)));
    assert_eq!(eval("Math.floor(Math.PI)", json!({})), doc(json!(3)));
    assert_eq!(eval("Math.sign(-4)", json!({})), doc(json!(-1)));
    let r = eval("Math.random()", json!({})).as_f64().unwrap();
    assert!((0.0..1.0).contains(&r));
    assert_eq!(eval("Math.randomUUID().length", json!({})), doc(json!(36)));
}

#[test]
fn test_global_functions() {
    assert_eq!(eval("parseInt('42px')", json!({})), doc(json!(42)));
    assert_eq!(eval("parseInt('ff', 16)", json!({})), doc(json!(255)));
    assert_eq!(eval("isNaN(parseInt('11', -2))", json!({})), JValue::Bool(true));
    assert_eq!(eval("parseFloat('3.5kg')", json!({})), doc(json!(3.5)));
    assert_eq!(eval("isNaN('abc')", json!({})), JValue::Bool(true));
    assert_eq!(eval("encodeURIComponent('a b&c')", json!({})), doc(json!("a%20b%26c")));
    assert_eq!(eval("decodeURIComponent('%E0%A4%A')", json!({})), JValue::Null);
    assert_eq!(eval("instanceOf($.a, 'Array')", json!({"a": []})), JValue::Bool(true));
    assert_eq!(eval("instanceOf($.a, 'Object')", json!({"a": []})), JValue::Bool(false));
    assert_eq!(eval("eval('$.x * 2', {x: 21})", json!({})), doc(json!(42)));
    assert_eq!(eval("eval('$.x + 1')", json!({"x": 1})), doc(json!(2)));
    assert_eq!(eval("jsonPath($, '$.a.b')", json!({"a": {"b": 7}})), doc(json!(7)));
    assert_eq!(eval("typeof $.d", json!({"d": {}})), doc(json!("object")));
    assert_eq!(eval("JSON.stringify({a: [1]})", json!({})), doc(json!("{\"a\":[1]}")));
    assert_eq!(eval("JSON.parse('[1,2]')[1]", json!({})), doc(json!(2)));
}

#[test]
fn test_date_builtins() {
    let data = json!({"ts": "2024-03-15T10:30:00Z"});
    assert_eq!(eval("Date.parse($.ts).getFullYear()", data.clone()), doc(json!(2024)));
    assert_eq!(eval("Date.parse($.ts).getMonth()", data.clone()), doc(json!(3)));
    assert_eq!(
        eval("Date.parse($.ts).plusDays(20).toString()", data.clone()),
        doc(json!("2024-04-04T10:30:00.000Z"))
    );
    assert_eq!(
        eval("Date.parse($.ts).toLocaleDateTimeString({format: 'yyyy/MM/dd HH:mm', timeZone: '-05:00'})", data.clone()),
        doc(json!("2024/03/15 05:30"))
    );
    assert_eq!(
        eval("Date.parse($.ts).withYear(2000).toISOString()", data.clone()),
        doc(json!("2000-03-15T10:30:00.000Z"))
    );
    assert_eq!(
        eval("Date.parse('15/03/2024', 'dd/MM/yyyy').getDate()", data.clone()),
        doc(json!(15))
    );
    assert_eq!(eval("Date.parse('garbage')", data.clone()), JValue::Null);
    assert_eq!(eval("Date.UTC(1970, 0, 2)", data.clone()), doc(json!(86_400_000)));
    assert_eq!(
        eval("Date.parse($.ts).plusHours(1) > Date.parse($.ts)", data.clone()),
        JValue::Bool(true)
    );
    assert_eq!(
        eval("Date.parse($.ts) instanceof DateTime", data.clone()),
        JValue::Bool(true)
    );
    assert_eq!(eval("LocalDate.parse('2024-02-29').toString()", data.clone()), doc(json!("2024-02-29")));
    assert_eq!(eval("typeof Date.now()", data), doc(json!("date")));
}

// ── Match ─────────────────────────────────────────────────────────────────────

#[test]
fn test_match_fallback() {
    let expr = r#"match $.status { {"code":200} => "ok", {"code":404} => "missing", _ => "unknown" }"#;
    assert_eq!(eval(expr, json!({"status": {"code": 500}})), doc(json!("unknown")));
    assert_eq!(eval(expr, json!({"status": {"code": 404}})), doc(json!("missing")));
}

#[test]
fn test_match_ranges_and_markers() {
    let expr = r#"match $ {
        {code: "200..300"} => "success",
        {code: "400..500=", retry!: true} => "retry",
        {code: "400..500="} => "client",
        _ => "other"
    }"#;
    assert_eq!(eval(expr, json!({"code": 204})), doc(json!("success")));
    assert_eq!(eval(expr, json!({"code": 429, "retry": true})), doc(json!("retry")));
    assert_eq!(eval(expr, json!({"code": 500, "retry": null})), doc(json!("client")));
    assert_eq!(eval(expr, json!({"code": 300})), doc(json!("other")));
}

#[test]
fn test_match_arrays_and_regex() {
    let expr = r#"match $.v {
        [1, ...] => "starts with one",
        [..., {last: true}] => "ends with last",
        /^id-\d+$/ => "an id",
        _ => "nothing"
    }"#;
    assert_eq!(eval(expr, json!({"v": [1, 2, 3]})), doc(json!("starts with one")));
    assert_eq!(eval(expr, json!({"v": [0, {"last": true}]})), doc(json!("ends with last")));
    assert_eq!(eval(expr, json!({"v": "id-42"})), doc(json!("an id")));
    assert_eq!(eval(expr, json!({"v": 42})), doc(json!("nothing")));
}

#[test]
fn test_match_without_fallback_errors() {
    let expr = r#"match $.code { 200 => "ok" }"#;
    assert_eq!(eval_err(expr, json!({"code": 500})), ErrorKind::NoMatchError);
}

// ── Errors, limits and API ────────────────────────────────────────────────────

#[test]
fn test_error_kinds() {
    assert_eq!(eval_err("1 +", json!({})), ErrorKind::SyntaxError);
    assert_eq!(eval_err("'unterminated", json!({})), ErrorKind::SyntaxError);
    assert_eq!(eval_err("$.a.noSuchMethod()", json!({"a": "s"})), ErrorKind::UnknownFunctionError);
    assert_eq!(eval_err("(5).toUpperCase()", json!({})), ErrorKind::TypeError);
    assert_eq!(eval_err("$.missing.trim()", json!({})), ErrorKind::TypeError);
    assert_eq!(eval_err("'abc'.charAt(1, 2, 3)", json!({})), ErrorKind::TypeError);
    assert_eq!(eval_err("Math.nope(1)", json!({})), ErrorKind::UnknownFunctionError);
}

#[test]
fn test_syntax_error_span() {
    let err = evaluate("1 + )", &JValue::Null).unwrap_err();
    let (fragment, offset) = err.span().unwrap();
    assert_eq!(offset, 4);
    assert!(fragment.starts_with(')'));
}

#[test]
fn test_resource_limits() {
    let data = doc(json!({"xs": (0..100).collect::<Vec<_>>()}));
    let options = EvalOptions {
        max_steps: 50,
        ..EvalOptions::default()
    };
    let err = evaluate_with_options("$.xs.map(x => x + 1)", &data, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);

    let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    let err = evaluate(&deep, &JValue::Null).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
}

#[test]
fn test_idempotence() {
    let data = doc(json!({"items": [{"p": 2, "q": 3}, {"p": 4, "q": 1}]}));
    let expr = "$.items.map(i => i.p * i.q).reduce((a, b) => a + b, 0) + ' total'";
    let first = evaluate(expr, &data).unwrap();
    let second = evaluate(expr, &data).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, doc(json!("10 total")));
}

#[test]
fn test_evaluate_json_round_trip() {
    let out = evaluate_json("$.a.map(x => x * 1.5)", r#"{"a": [2, 3]}"#).unwrap();
    assert_eq!(out, "[3,4.5]");

    let err = evaluate_json("$.a", "{not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDocument);
}

#[test]
fn test_concurrent_evaluations_are_independent() {
    let expr = compile("$.n * 2").unwrap();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let expr = expr.clone();
            std::thread::spawn(move || expr.evaluate(&JValue::from(json!({"n": n}))).unwrap())
        })
        .collect();
    let results: Vec<JValue> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![doc(json!(0)), doc(json!(2)), doc(json!(4)), doc(json!(6))]);
}
