use email_rule_engine::{Field, Rule, RuleSet, RuleWarning};
use serde_json::json;

const UBER_RULE: &str = r#"{
    "id": "r-1",
    "name": "Uber Eats receipt",
    "pattern": "Uber Eats",
    "fields": [
        {"name": "date", "source": "header", "key": "Date", "post_process": "strip()"},
        {"name": "amount", "source": "html", "selector": "td:contains('Total') span", "process": "extract_text"},
        {
            "name": "items", "source": "html", "selector": "tr.item", "process": "extract_items",
            "subfields": [{"name": "name", "selector": ".name"}, {"name": "price", "selector": ".price"}],
            "subfield_order": ["name", "price"],
            "special_values": [
                {"subfield": "name", "value": "Tip", "extract_subfield": "price", "name": "tip", "post_process": "replace('\\$','')"}
            ]
        }
    ],
    "outputTemplate": "uber_{date}_{amount}",
    "requiredFields": ["amount"],
    "isActive": true
}"#;

#[test]
fn test_rule_decodes_typed_fields() {
    let rule = Rule::from_json(UBER_RULE).unwrap();

    assert_eq!(rule.id.as_deref(), Some("r-1"));
    assert_eq!(rule.fields.len(), 3);
    assert!(matches!(rule.fields[0], Field::Header(ref f) if f.key == "Date"));
    assert!(matches!(rule.fields[1], Field::Text(_)));
    match &rule.fields[2] {
        Field::Items(items) => {
            assert_eq!(items.subfields.len(), 2);
            assert_eq!(items.subfield_order.as_deref(), Some(&["name".to_string(), "price".to_string()][..]));
            assert_eq!(items.special_values[0].name, "tip");
            assert!(items.special_values[0].post_process.is_some());
        }
        other => panic!("expected items field, got {other:?}"),
    }
    assert_eq!(rule.required_fields, vec!["amount"]);
    assert!(rule.lint().is_empty());
}

#[test]
fn test_rule_defaults() {
    let rule = Rule::from_json(
        r#"{"name": "n", "pattern": "p", "fields": [], "requiredFields": null}"#,
    )
    .unwrap();

    assert!(rule.is_active);
    assert!(rule.required_fields.is_empty());
    assert_eq!(rule.output_template, "");
    assert!(rule.id.is_none());
}

#[test]
fn test_rule_roundtrip() {
    let rule = Rule::from_json(UBER_RULE).unwrap();
    let value = serde_json::to_value(&rule).unwrap();
    let original: serde_json::Value = serde_json::from_str(UBER_RULE).unwrap();
    assert_eq!(value, original);
}

#[test]
fn test_unknown_source_is_rejected() {
    let err = Rule::from_json(
        r#"{"name": "n", "pattern": "p", "fields": [{"name": "x", "source": "body", "selector": "p"}]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown source 'body'"), "{err}");
}

#[test]
fn test_unknown_process_is_rejected() {
    let err = Rule::from_json(
        r#"{"name": "n", "pattern": "p", "fields": [{"name": "x", "source": "html", "selector": "p", "process": "extract_html"}]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown process 'extract_html'"), "{err}");
}

#[test]
fn test_missing_attributes_are_rejected() {
    for field in [
        json!({"name": "x", "source": "header"}),
        json!({"name": "x", "source": "html", "process": "extract_text"}),
        json!({"name": "x", "source": "html", "selector": "p"}),
    ] {
        let doc = json!({"name": "n", "pattern": "p", "fields": [field]}).to_string();
        let err = Rule::from_json(&doc).unwrap_err();
        assert!(err.to_string().contains("missing required attribute"), "{err}");
    }
}

#[test]
fn test_invalid_selector_does_not_reject_rule() {
    let rule = Rule::from_json(
        r#"{"name": "n", "pattern": "p", "fields": [{"name": "x", "source": "html", "selector": "p:contains(x)", "process": "extract_text"}]}"#,
    )
    .unwrap();

    let warnings = rule.lint();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(warnings[0], RuleWarning::InvalidSelector { ref field, .. } if field == "x"));
}

#[test]
fn test_matches_subject_or_sender() {
    let mut rule = Rule::from_json(UBER_RULE).unwrap();

    assert!(rule.matches("Your Uber Eats order", ""));
    assert!(rule.matches("Receipt", "Uber Eats <noreply@uber.com>"));
    assert!(!rule.matches("Your Uber trip", "noreply@uber.com"));

    rule.is_active = false;
    assert!(!rule.matches("Your Uber Eats order", ""));
}

#[test]
fn test_rule_set_first_match_wins() {
    let rules = RuleSet::from_json(
        r#"[
            {"name": "inactive", "pattern": "Uber", "fields": [], "isActive": false},
            {"name": "eats", "pattern": "Uber Eats", "fields": []},
            {"name": "any uber", "pattern": "Uber", "fields": []}
        ]"#,
    )
    .unwrap();

    assert_eq!(rules.len(), 3);
    assert_eq!(rules.find_match("Your Uber Eats order", "").map(|r| r.name.as_str()), Some("eats"));
    assert_eq!(rules.find_match("Your Uber trip", "").map(|r| r.name.as_str()), Some("any uber"));
    assert!(rules.find_match("Instacart", "orders@instacart.com").is_none());
}

#[test]
fn test_lint_reports_authoring_problems() {
    let rule: Rule = serde_json::from_value(json!({
        "name": "n", "pattern": "p",
        "fields": [
            {"name": "total", "source": "header", "key": "X", "post_process": "title()"},
            {
                "name": "a", "source": "html", "selector": "tr", "process": "extract_items",
                "subfields": [{"name": "k", "selector": ".k"}],
                "subfield_order": ["k", "v"],
                "special_values": [{"subfield": "k", "value": "Total", "extract_subfield": "v", "name": "total"}]
            },
            {
                "name": "b", "source": "html", "selector": "li", "process": "extract_items",
                "subfields": [{"name": "k", "selector": ".k"}],
                "special_values": [{"subfield": "k", "value": "Total", "extract_subfield": "k", "name": "total"}]
            }
        ],
        "requiredFields": ["total", "nowhere"]
    }))
    .unwrap();

    let warnings = rule.lint();

    assert!(warnings.contains(&RuleWarning::UnrecognizedDirective {
        field: "total".into(),
        directive: "title()".into(),
    }));
    assert!(warnings.contains(&RuleWarning::UndeclaredSubfield {
        field: "a".into(),
        subfield: "v".into(),
    }));
    assert!(warnings.contains(&RuleWarning::SpecialValueShadowsField {
        field: "a".into(),
        name: "total".into(),
    }));
    assert!(warnings.contains(&RuleWarning::DuplicateSpecialValue {
        name: "total".into(),
        first_field: "a".into(),
        second_field: "b".into(),
    }));
    assert!(warnings.contains(&RuleWarning::UnreachableRequiredField {
        name: "nowhere".into(),
    }));
    // "v" is reported once although referenced twice
    assert_eq!(
        warnings
            .iter()
            .filter(|w| matches!(w, RuleWarning::UndeclaredSubfield { .. }))
            .count(),
        1
    );
}
