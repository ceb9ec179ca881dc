//! Integration tests for the block tree flattener

use blockdom_core::{
    flatten, flatten_str, flatten_str_with, BlockRecord, Element, ErrorKind, FlattenError,
    FlattenOptions, Flattener, Node, Span,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn find<'a>(blocks: &'a [BlockRecord], id: &str) -> &'a BlockRecord {
    blocks
        .iter()
        .find(|b| b.id == id)
        .unwrap_or_else(|| panic!("no record with id {id}"))
}

// ============================================================================
// Basic records
// ============================================================================

#[test]
fn test_flat_single_block() {
    let blocks = flatten_str(r#"<block id="a" type="event_whengreenflag"></block>"#).unwrap();
    assert_eq!(
        blocks,
        vec![BlockRecord::new("a", "event_whengreenflag", true)]
    );
}

#[test]
fn test_empty_input_yields_no_blocks() {
    assert!(flatten_str("").unwrap().is_empty());
    assert!(flatten_str("   \n  ").unwrap().is_empty());
}

#[test]
fn test_non_block_roots_are_ignored() {
    let markup = r#"text<variables><variable id="v">x</variable></variables><!-- c --><block id="a" type="x"/>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, "a");
}

#[test]
fn test_multiple_top_level_blocks_in_document_order() {
    let markup = r#"<block id="b" type="y"/><block id="a" type="x"/>"#;
    let blocks = flatten_str(markup).unwrap();
    let ids: Vec<_> = blocks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, ["b", "a"]);
    assert!(blocks.iter().all(|b| b.top_level));
}

#[rstest]
#[case("<BLOCK id=\"a\" type=\"x\"><FIELD name=\"F\">1</FIELD></BLOCK>")]
#[case("<Block id=\"a\" type=\"x\"><Field name=\"F\">1</Field></Block>")]
#[case("<block id=\"a\" type=\"x\"><field name=\"F\">1</field></block>")]
fn test_tag_names_are_case_insensitive(#[case] markup: &str) {
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].field_value("F"), Some("1"));
}

#[test]
fn test_unknown_children_are_ignored() {
    let markup = r#"<block id="a" type="x"><mutation proccode="p"/><comment>hi</comment><data>d</data></block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks, vec![BlockRecord::new("a", "x", true)]);
}

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_field_capture() {
    let blocks = flatten_str(r#"<block id="a" type="x"><field name="VAR">42</field></block>"#).unwrap();
    let field = blocks[0].field("VAR").unwrap();
    assert_eq!(field.name, "VAR");
    assert_eq!(field.value, "42");
}

#[test]
fn test_field_value_keeps_whitespace_and_decodes_entities() {
    let markup = r#"<block id="a" type="x"><field name="TEXT"> a &amp; b </field></block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks[0].field_value("TEXT"), Some(" a & b "));
}

#[test]
fn test_duplicate_field_name_last_wins() {
    let markup = r#"<block id="a" type="x"><field name="F">1</field><field name="F">2</field></block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks[0].fields.len(), 1);
    assert_eq!(blocks[0].field_value("F"), Some("2"));
}

#[test]
fn test_malformed_field_fails() {
    let err = flatten_str(r#"<block id="a" type="x"><field name="X"></field></block>"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFieldText);
    assert!(err.to_string().contains(r#"<field name="X">"#));
}

#[test]
fn test_self_closing_field_fails() {
    let err = flatten_str(r#"<block id="a" type="x"><field name="X"/></block>"#).unwrap_err();
    assert!(matches!(err, FlattenError::MissingFieldText { ref name, .. } if name == "X"));
}

#[test]
fn test_field_value_with_html_nbsp() {
    let blocks =
        flatten_str(r#"<block id="a" type="text"><field name="TEXT">a&nbsp;b</field></block>"#)
            .unwrap();
    assert_eq!(blocks[0].field_value("TEXT"), Some("a\u{a0}b"));
}

#[test]
fn test_field_whose_first_child_is_an_element_fails() {
    let markup = r#"<block id="a" type="x"><field name="X"><b>1</b></field></block>"#;
    let err = flatten_str(markup).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFieldText);
}

#[test]
fn test_field_without_name_fails() {
    let err = flatten_str(r#"<block id="a" type="x"><field>1</field></block>"#).unwrap_err();
    assert!(matches!(
        err,
        FlattenError::MissingAttribute { attribute: "name", .. }
    ));
}

// ============================================================================
// Inputs and shadows
// ============================================================================

#[test]
fn test_nested_value_with_shadow_fallback() {
    let markup = r#"<block id="a" type="motion_movesteps">
        <value name="STEPS"><shadow id="s" type="math_number"><field name="NUM">10</field></shadow></value>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();

    assert_eq!(blocks.len(), 2);
    let parent = find(&blocks, "a");
    let input = parent.input("STEPS").unwrap();
    assert_eq!(input.name, "STEPS");
    assert_eq!(input.block, "s");

    let shadow = find(&blocks, "s");
    assert_eq!(shadow.opcode, "math_number");
    assert!(!shadow.top_level);
    assert_eq!(shadow.field_value("NUM"), Some("10"));
}

#[test]
fn test_block_overrides_shadow() {
    let markup = r#"<block id="a" type="motion_movesteps">
        <value name="STEPS">
            <shadow id="s" type="math_number"><field name="NUM">10</field></shadow>
            <block id="r" type="operator_add"/>
        </value>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();

    assert_eq!(blocks.len(), 2);
    assert_eq!(find(&blocks, "a").input("STEPS").unwrap().block, "r");
    assert!(blocks.iter().all(|b| b.id != "s"));
}

#[test]
fn test_first_nested_block_wins() {
    let markup = r#"<block id="a" type="x">
        <value name="V"><block id="first" type="y"/><block id="second" type="y"/></value>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(find(&blocks, "a").input("V").unwrap().block, "first");
    assert!(blocks.iter().all(|b| b.id != "second"));
}

#[test]
fn test_statement_input() {
    let markup = r#"<block id="loop" type="control_forever">
        <statement name="SUBSTACK">
            <block id="s1" type="looks_nextcostume">
                <next><block id="s2" type="control_wait"/></next>
            </block>
        </statement>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();

    assert_eq!(blocks.len(), 3);
    assert_eq!(find(&blocks, "loop").input("SUBSTACK").unwrap().block, "s1");
    assert_eq!(find(&blocks, "s1").next.as_deref(), Some("s2"));
    assert!(!find(&blocks, "s2").top_level);
}

#[test]
fn test_duplicate_input_name_last_wins() {
    let markup = r#"<block id="a" type="x">
        <value name="V"><block id="b" type="y"/></value>
        <value name="V"><block id="c" type="y"/></value>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();
    let parent = find(&blocks, "a");
    assert_eq!(parent.inputs.len(), 1);
    assert_eq!(parent.input("V").unwrap().block, "c");
    // Both nested blocks were still visited.
    assert_eq!(blocks.len(), 3);
}

#[rstest]
#[case("value", r#"<value name="V"></value>"#)]
#[case("statement", r#"<statement name="S"><field name="F">1</field></statement>"#)]
#[case("next", "<next>  </next>")]
fn test_slot_without_nested_block_fails(#[case] tag: &str, #[case] slot: &str) {
    let markup = format!(r#"<block id="a" type="x">{slot}</block>"#);
    let err = flatten_str(&markup).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingChildBlock);
    assert!(err.to_string().contains(&format!("<{tag}")));
}

#[test]
fn test_value_without_name_fails() {
    let markup = r#"<block id="a" type="x"><value><block id="b" type="y"/></value></block>"#;
    let err = flatten_str(markup).unwrap_err();
    assert!(matches!(
        err,
        FlattenError::MissingAttribute { ref tag, attribute: "name", .. } if tag == "value"
    ));
}

#[rstest]
#[case(r#"<block type="x"/>"#, "id")]
#[case(r#"<block id="a"/>"#, "type")]
#[case(r#"<block id="a" type="x"><next><shadow type="y"/></next></block>"#, "id")]
fn test_missing_block_attribute_fails(#[case] markup: &str, #[case] attribute: &str) {
    let err = flatten_str(markup).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingAttribute);
    assert!(err.to_string().contains(&format!("`{attribute}`")));
}

// ============================================================================
// Next chains
// ============================================================================

#[test]
fn test_chained_next() {
    let blocks =
        flatten_str(r#"<block id="a" type="x"><next><block id="b" type="y"></block></next></block>"#)
            .unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(find(&blocks, "a").next.as_deref(), Some("b"));
    assert!(find(&blocks, "a").top_level);
    assert!(!find(&blocks, "b").top_level);
    assert_eq!(find(&blocks, "b").next, None);
}

#[test]
fn test_multiple_next_last_wins() {
    let markup = r#"<block id="a" type="x">
        <next><block id="b" type="y"/></next>
        <next><block id="c" type="y"/></next>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(find(&blocks, "a").next.as_deref(), Some("c"));
}

#[test]
fn test_next_uses_shadow_when_no_block() {
    let markup = r#"<block id="a" type="x"><next><shadow id="s" type="y"/></next></block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(find(&blocks, "a").next.as_deref(), Some("s"));
}

// ============================================================================
// Namespace semantics
// ============================================================================

#[test]
fn test_duplicate_id_later_visit_wins() {
    let markup = r#"<block id="a" type="first"/><block id="a" type="second"><field name="F">1</field></block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].opcode, "second");
    assert_eq!(blocks[0].field_value("F"), Some("1"));
}

#[test]
fn test_duplicate_id_keeps_first_position() {
    let markup = r#"<block id="a" type="x"/><block id="b" type="y"/><block id="a" type="z"/>"#;
    let blocks = flatten_str(markup).unwrap();
    let ids: Vec<_> = blocks.iter().map(|b| (b.id.as_str(), b.opcode.as_str())).collect();
    assert_eq!(ids, [("a", "z"), ("b", "y")]);
}

#[test]
fn test_nested_block_reusing_parent_id_replaces_parent() {
    let markup = r#"<block id="a" type="parent">
        <next><block id="a" type="child"><field name="F">c</field></block></next>
        <field name="G">p</field>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();

    assert_eq!(blocks.len(), 1);
    let survivor = &blocks[0];
    assert_eq!(survivor.opcode, "child");
    assert!(!survivor.top_level);
    assert_eq!(survivor.field_value("F"), Some("c"));
    // The displaced parent's later writes do not leak into the survivor.
    assert_eq!(survivor.field("G"), None);
    assert_eq!(survivor.next, None);
}

#[test]
fn test_nested_duplicate_overwrites_earlier_sibling() {
    let markup = r#"<block id="a" type="x">
        <value name="L"><block id="dup" type="left"/></value>
        <value name="R"><block id="dup" type="right"/></value>
    </block>"#;
    let blocks = flatten_str(markup).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(find(&blocks, "dup").opcode, "right");
}

#[test]
fn test_flatten_is_idempotent() {
    let markup = r#"<block id="a" type="x">
        <value name="V"><shadow id="s" type="math_number"><field name="NUM">1</field></shadow></value>
        <next><block id="b" type="y"/></next>
    </block>"#;
    let first = flatten_str(markup).unwrap();
    let second = flatten_str(markup).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_error_aborts_whole_call() {
    let markup = r#"<block id="ok" type="x"/><block id="bad" type="y"><value name="V"/></block>"#;
    assert!(flatten_str(markup).is_err());
}

// ============================================================================
// Hand-built trees and the Flattener builder
// ============================================================================

#[test]
fn test_flatten_hand_built_tree() {
    let root = Element::new("block")
        .with_attr("id", "a")
        .with_attr("type", "x")
        .with_child(
            Element::new("value")
                .with_attr("name", "V")
                .with_child(Node::text_node("\n"))
                .with_child(Element::new("shadow").with_attr("id", "s").with_attr("type", "y")),
        );

    let blocks = flatten(&[Node::text_node("ignored"), root.into()]).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].input("V").unwrap().block, "s");
}

#[test]
fn test_hand_built_error_reports_element_span() {
    let root = Element::new("block")
        .with_attr("id", "a")
        .with_attr("type", "x")
        .with_child(Element::new("next").with_span(Span::new(10, 20)));

    let err = flatten(&[root.into()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingChildBlock);
    assert_eq!(err.span(), Some(Span::new(10, 20)));
}

#[test]
fn test_linked_ids_lists_inputs_then_next() {
    let blocks = flatten_str(
        r#"<block id="a" type="x">
            <statement name="SUBSTACK"><block id="c" type="y"/></statement>
            <value name="COND"><shadow id="b" type="z"/></value>
            <next><block id="d" type="y"/></next>
        </block>"#,
    )
    .unwrap();
    let linked: Vec<&str> = blocks[0].linked_ids().collect();
    assert_eq!(linked, ["b", "c", "d"]);
    assert_eq!(blocks[3].linked_ids().count(), 0);
}

#[test]
fn test_flattener_accumulates_across_visits() {
    let a = Element::new("block").with_attr("id", "a").with_attr("type", "x");
    let b = Element::new("block").with_attr("id", "b").with_attr("type", "y");

    let mut flattener = Flattener::new(FlattenOptions::default());
    assert!(flattener.is_empty());
    flattener.visit(&a, 0).unwrap();
    flattener.visit(&b, 3).unwrap();

    assert_eq!(flattener.len(), 2);
    assert!(!flattener.get("b").unwrap().top_level);
    let records = flattener.finish();
    assert_eq!(records[0].id, "a");
}

// ============================================================================
// Depth guard
// ============================================================================

#[test]
fn test_depth_guard_unbounded_by_default() {
    let mut markup = String::new();
    for i in 0..50 {
        markup.push_str(&format!(r#"<block id="b{i}" type="x"><next>"#));
    }
    markup.push_str(r#"<block id="end" type="x"/>"#);
    for _ in 0..50 {
        markup.push_str("</next></block>");
    }
    let blocks = flatten_str(&markup).unwrap();
    assert_eq!(blocks.len(), 51);
}

#[test]
fn test_depth_guard_rejects_deep_nesting() {
    let markup = r#"<block id="a" type="x"><next><block id="b" type="x"><next><block id="c" type="x"/></next></block></next></block>"#;

    let ok = flatten_str_with(markup, &FlattenOptions::default().with_max_depth(2)).unwrap();
    assert_eq!(ok.len(), 3);

    let err = flatten_str_with(markup, &FlattenOptions::default().with_max_depth(1)).unwrap_err();
    assert!(matches!(err, FlattenError::DepthLimit { depth: 2, limit: 1, .. }));
}

// ============================================================================
// Error locations
// ============================================================================

#[test]
fn test_error_span_points_at_offending_element() {
    let markup = r#"<block id="a" type="x"><field name="X"></field></block>"#;
    let err = flatten_str(markup).unwrap_err();
    let span = err.span().unwrap();
    assert_eq!(span.slice(markup), Some(r#"<field name="X"></field>"#));
}
