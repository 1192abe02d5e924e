//! End-to-end expansion pipeline tests
//!
//! Each test drives the full path: discovery-file text → registry →
//! parse → expand → pretty-printed output.

use expect_test::expect;
use integration_tests::TestFixture;
use ql_driver::UnitError;
use ql_expand::ExpansionError;

const MANIFEST: &str = r#"
[[macros]]
name = "double"

[[macros.rules]]
args = ["$x"]
template = "$x * 2"
placeholders = [{ name = "x", class = "expr" }]

[[macros]]
name = "swap"

[[macros.rules]]
args = ["$a", "$b"]
template = "{ let tmp = $a; $b }"
placeholders = [{ name = "a", class = "expr" }, { name = "b", class = "expr" }]

[[rewrites]]
name = "add-zero"
pattern = "$x + 0"
template = "$x"
placeholders = [{ name = "x", class = "expr" }]
"#;

#[test]
fn test_builtin_pipeline() {
    let mut fixture = TestFixture::new();
    let output = fixture
        .expand_source("assert!(1 + 1 == 2);\nstringify!(7 * 3)\n")
        .unwrap();
    expect![[r#"
        if !(1 + 1 == 2) {
            abort("assertion failed: 1 + 1 == 2");
        };
        "7 * 3"
    "#]]
    .assert_eq(&output);
}

#[test]
fn test_discovery_rules_and_rewrites() {
    let mut fixture = TestFixture::with_manifest(MANIFEST).unwrap();
    let output = fixture
        .expand_source("let price = 3;\ndouble!(price + 1) + 0\n")
        .unwrap();
    expect![[r#"
        let price = 3;
        (price + 1) * 2
    "#]]
    .assert_eq(&output);
}

#[test]
fn test_block_template_expansion() {
    let mut fixture = TestFixture::with_manifest(MANIFEST).unwrap();
    let output = fixture.expand_source("swap!(first, second)").unwrap();
    expect![[r#"
        {
            let tmp = first;
            second
        }
    "#]]
    .assert_eq(&output);
}

#[test]
fn test_operator_classes_widen_rewrites() {
    let manifest = r#"
[[rewrites]]
name = "comparisons-to-calls"
pattern = "$a < $b"
template = "compare($a, $b)"
placeholders = [{ name = "a", class = "expr" }, { name = "b", class = "expr" }]
operators = { "<" = ["<", "<=", ">", ">="] }
"#;
    let mut fixture = TestFixture::with_manifest(manifest).unwrap();
    assert_eq!(fixture.expand_source("1 > 2").unwrap(), "compare(1, 2)\n");
    assert_eq!(fixture.expand_source("3 <= 4").unwrap(), "compare(3, 4)\n");
    // Equality is not in the class
    assert_eq!(fixture.expand_source("5 == 6").unwrap(), "5 == 6\n");
}

#[test]
fn test_sibling_units_survive_a_failure() {
    let mut fixture = TestFixture::with_manifest(MANIFEST).unwrap();
    fixture.add_unit("<first>", "double!(1)").unwrap();
    fixture.add_unit("<broken>", "missing!(2)").unwrap();
    fixture.add_unit("<third>", "double!(3)").unwrap();

    let reports = fixture.compile();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].result.as_ref().unwrap().output, "1 * 2\n");
    assert!(matches!(
        reports[1].result.as_ref().unwrap_err(),
        UnitError::Expand(ExpansionError::UndefinedMacro { .. })
    ));
    assert_eq!(reports[2].result.as_ref().unwrap().output, "3 * 2\n");
}

#[test]
fn test_depth_limit_fails_deterministically() {
    let manifest = r#"
[[macros]]
name = "omega"

[[macros.rules]]
args = ["$x"]
template = "omega!($x)"
placeholders = [{ name = "x", class = "expr" }]
"#;
    let first = TestFixture::with_manifest(manifest)
        .unwrap()
        .expand_source("omega!(1)")
        .unwrap_err()
        .to_string();
    let second = TestFixture::with_manifest(manifest)
        .unwrap()
        .expand_source("omega!(1)")
        .unwrap_err()
        .to_string();
    assert!(first.contains("recursion limit"), "{first}");
    assert_eq!(first, second);
}
