/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for quarto-hbtemplate through the public API.
 */

use pretty_assertions::assert_eq;
use quarto_hbtemplate::{
    HelperRegistry, Partials, Template, TemplateError, TemplateValue,
};

fn ctx(json: &str) -> TemplateValue {
    TemplateValue::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
}

fn render(source: &str, context: &TemplateValue) -> String {
    Template::compile(source)
        .expect("template should compile")
        .render(context)
        .expect("template should render")
}

#[test]
fn test_pure_literal_templates_round_trip() {
    for source in [
        "plain text",
        "multi\nline\ntext\n",
        "spaces  and\ttabs",
        "lone braces { } are fine",
        "",
    ] {
        assert_eq!(render(source, &TemplateValue::Null), source);
    }
}

#[test]
fn test_escaping() {
    let context = ctx(r#"{"v": "&\"'`<>"}"#);
    assert_eq!(
        render("{{v}}", &context),
        "&amp;&quot;&#x27;&#x60;&lt;&gt;"
    );
    assert_eq!(render("{{{v}}}", &context), "&\"'`<>");
    assert_eq!(render("{{&v}}", &context), "&\"'`<>");
}

#[test]
fn test_if_truthiness_over_value_kinds() {
    let truthy = [
        r#"{"v": true}"#,
        r#"{"v": 1}"#,
        r#"{"v": "false"}"#,
        r#"{"v": [0]}"#,
        r#"{"v": {"k": null}}"#,
    ];
    let falsy = [
        r#"{"v": false}"#,
        r#"{"v": 0}"#,
        r#"{"v": ""}"#,
        r#"{"v": []}"#,
        r#"{"v": {}}"#,
        r#"{"v": null}"#,
        r#"{}"#,
    ];
    for json in truthy {
        assert_eq!(render("{{#if v}}A{{else}}B{{/if}}", &ctx(json)), "A", "{json}");
        assert_eq!(render("{{#unless v}}A{{else}}B{{/unless}}", &ctx(json)), "B", "{json}");
    }
    for json in falsy {
        assert_eq!(render("{{#if v}}A{{else}}B{{/if}}", &ctx(json)), "B", "{json}");
        assert_eq!(render("{{#unless v}}A{{else}}B{{/unless}}", &ctx(json)), "A", "{json}");
    }
}

#[test]
fn test_each_over_a_list() {
    let template = "{{#each items}}{{this}},{{/each}}";
    assert_eq!(render(template, &ctx(r#"{"items": [1, 2, 3]}"#)), "1,2,3,");
    assert_eq!(render(template, &ctx(r#"{"items": []}"#)), "");
    assert_eq!(
        render(
            "{{#each items}}{{this}}{{else}}none{{/each}}",
            &ctx(r#"{"items": []}"#)
        ),
        "none"
    );
}

#[test]
fn test_parent_traversal_from_nested_scope() {
    let context = ctx(r#"{"a": {"b": "X"}}"#);
    assert_eq!(render("{{#with a}}{{../a.b}}{{/with}}", &context), "X");
    // Two frames deep: each iteration then with
    assert_eq!(
        render(
            "{{#each items}}{{#with inner}}{{../../title}}{{/with}}{{/each}}",
            &ctx(r#"{"title": "T", "items": [{"inner": {}}]}"#)
        ),
        "T"
    );
}

#[test]
fn test_standalone_block_tags_do_not_leak_blank_lines() {
    let source = "before\n{{#if show}}\nbody\n{{/if}}\nafter";
    assert_eq!(render(source, &ctx(r#"{"show": true}"#)), "before\nbody\nafter");
    assert_eq!(render(source, &ctx(r#"{"show": false}"#)), "before\nafter");
}

#[test]
fn test_inline_tags_keep_their_whitespace() {
    let source = "a {{#if show}}b{{/if}} c";
    assert_eq!(render(source, &ctx(r#"{"show": true}"#)), "a b c");
}

#[test]
fn test_partial_invocation() {
    let mut partials = Partials::new();
    partials.add_source("child", "{{name}}");
    let template = Template::compile("{{> child}}").unwrap();
    let output = template
        .render_with(&ctx(r#"{"name": "Ada"}"#), None, Some(&partials), None)
        .unwrap();
    assert_eq!(output, "Ada");
}

#[test]
fn test_partial_with_context_argument_and_overrides() {
    let mut partials = Partials::new();
    partials.add_source("card", "{{name}} ({{role}})");
    let template = Template::compile("{{> card author role=\"editor\"}}").unwrap();
    let output = template
        .render_with(
            &ctx(r#"{"author": {"name": "Grace", "role": "admin"}}"#),
            None,
            Some(&partials),
            None,
        )
        .unwrap();
    // The keyword override is checked before the partial's context
    assert_eq!(output, "Grace (editor)");
}

#[test]
fn test_compiled_partials_are_reusable() {
    let child = Template::compile("{{title}}").unwrap();
    let mut partials = Partials::new();
    partials.add_template("child", &child);
    let template = Template::compile("[{{> child}}]").unwrap();
    let output = template
        .render_with(&ctx(r#"{"title": "T"}"#), None, Some(&partials), None)
        .unwrap();
    assert_eq!(output, "[T]");
}

#[test]
fn test_malformed_block_name_is_a_parse_error() {
    let err = Template::compile("{{#foo}}...{{/bar}}").unwrap_err();
    match err {
        TemplateError::Parse {
            line,
            character,
            message,
        } => {
            assert_eq!(line, 1);
            assert_eq!(character, 12);
            assert_eq!(message, "expected '{{/foo}}' but found '{{/bar}}'");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_iteration_parity_convention() {
    // @odd is true for indices 0 and 2; @even for index 1
    let output = render(
        "{{#each items}}{{#if @odd}}o{{else}}e{{/if}}{{/each}}",
        &ctx(r#"{"items": ["a", "b", "c"]}"#),
    );
    assert_eq!(output, "oeo");
}

#[test]
fn test_iteration_first_last_index() {
    let output = render(
        "{{#each items}}{{@index}}{{#if @first}}F{{/if}}{{#if @last}}L{{/if}};{{/each}}",
        &ctx(r#"{"items": ["a", "b", "c"]}"#),
    );
    assert_eq!(output, "0F;1;2L;");
}

#[test]
fn test_lookup_helper_returns_null_on_failure() {
    let context = ctx(r#"{"items": ["a", "b"], "map": {"k": "v"}}"#);
    assert_eq!(render("{{lookup items 1}}", &context), "b");
    assert_eq!(render("{{lookup items 9}}", &context), "");
    assert_eq!(render("{{lookup map \"k\"}}", &context), "v");
    assert_eq!(render("{{lookup map \"nope\"}}", &context), "");
}

#[test]
fn test_missing_lookups_render_empty_without_guards() {
    let output = render(
        "[{{missing}}][{{deeply.missing.path}}]",
        &ctx(r#"{"deeply": {}}"#),
    );
    assert_eq!(output, "[][]");
}

#[test]
fn test_unresolved_name_with_arguments_errors_at_render() {
    let template = Template::compile("{{nope 1 2}}").unwrap();
    let err = template.render(&ctx("{}")).unwrap_err();
    assert!(matches!(err, TemplateError::HelperMissing { name } if name == "nope"));
}

#[test]
fn test_custom_helpers_receive_args_and_kwargs() {
    let mut helpers = HelperRegistry::new();
    helpers.register_fn("join", |_scope, _options, args, kwargs| {
        let sep = match kwargs.get("sep") {
            Some(TemplateValue::String(s)) => s.clone(),
            _ => ",".to_string(),
        };
        let parts: Vec<String> = match args.first() {
            Some(TemplateValue::List(items)) => items.iter().map(|v| v.render()).collect(),
            _ => Vec::new(),
        };
        Ok(TemplateValue::String(parts.join(&sep)))
    });

    let template = Template::compile(r#"{{join items sep="-"}}"#).unwrap();
    let output = template
        .render_with(&ctx(r#"{"items": [1, 2, 3]}"#), Some(&helpers), None, None)
        .unwrap();
    assert_eq!(output, "1-2-3");
}

#[test]
fn test_subexpressions_nest_as_arguments() {
    let output = render(
        "{{#if (lookup (lookup rows 0) 1)}}hit{{else}}miss{{/if}}",
        &ctx(r#"{"rows": [[false, true]]}"#),
    );
    assert_eq!(output, "hit");
}

#[test]
fn test_precompiled_output_renders_identically() {
    let source = "{{#each posts}}<h2>{{title}}</h2>{{/each}}";
    let context = ctx(r#"{"posts": [{"title": "A"}, {"title": "B"}]}"#);

    let direct = Template::compile(source).unwrap().render(&context).unwrap();
    let text = Template::precompile(source).unwrap();
    let loaded = Template::from_precompiled(&text)
        .unwrap()
        .render(&context)
        .unwrap();
    assert_eq!(direct, loaded);
    assert_eq!(direct, "<h2>A</h2><h2>B</h2>");
}

#[test]
fn test_render_failures_keep_compiled_template_usable() {
    let template = Template::compile("{{#each items}}{{bad arg}}{{/each}}").unwrap();
    assert!(template.render(&ctx(r#"{"items": [1]}"#)).is_err());
    // A later render with an empty list never reaches the bad expression
    assert_eq!(template.render(&ctx(r#"{"items": []}"#)).unwrap(), "");
}
