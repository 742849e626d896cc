use codeplan_sync::axis::{self, AxisDialect};
use codeplan_sync::code::Code;
use codeplan_sync::error::GrammarError;
use codeplan_sync::tree::{CodeTree, DepthPolicy, Node, NodeKind};
use proptest::prelude::*;

fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ',(){}]{0,10}"
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn code() -> impl Strategy<Value = Code> {
    (0u64..5000).prop_map(Code::new)
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        3 => (code(), label()).prop_map(|(code, label)| Node::regular(code, label)),
        1 => Just(Node::Base),
        1 => (name(), label(), prop::collection::vec(code(), 1..4))
            .prop_map(|(name, label, codes)| Node::combine(name, label, &codes)),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(3, 32, 4, |inner| {
        (name(), label(), prop::collection::vec(inner, 1..4))
            .prop_map(|(name, label, children)| Node::net(name, label, children))
    })
}

fn tree() -> impl Strategy<Value = CodeTree> {
    (any::<bool>(), prop::collection::vec(node(), 0..6)).prop_map(|(base, mut children)| {
        if base {
            children.insert(0, Node::Base);
        }
        CodeTree::with_children(children, DepthPolicy::CombineFlat)
    })
}

proptest! {
    #[test]
    fn parse_inverts_render(tree in tree()) {
        let rendered = axis::render(&tree);
        let parsed = axis::parse(&rendered);
        prop_assert!(parsed.is_ok(), "{rendered}: {parsed:?}");
        let parsed = parsed.expect("checked");
        prop_assert_eq!(parsed.children(), tree.children());
        prop_assert_eq!(axis::render(&parsed), rendered);
    }

    #[test]
    fn quoted_labels_survive_escaping(text in "[a-z' ]{1,12}") {
        let tree = CodeTree::with_children(
            vec![Node::regular(Code::new(1), text.clone())],
            DepthPolicy::CombineFlat,
        );
        let rendered = axis::render(&tree);
        let inner = &rendered[rendered.find('\'').expect("quoted") + 1..rendered.len() - 2];
        prop_assert_eq!(inner.replace("''", "'"), text.clone());
        let parsed = axis::parse(&rendered).expect("parse");
        prop_assert_eq!(parsed.children(), tree.children());
    }
}

#[test]
fn doubled_quote_is_unescaped() {
    let tree = axis::parse("{base(),CB_1 'it''s',CB_2 'b'}").expect("parse");
    assert_eq!(
        tree.children(),
        &[
            Node::Base,
            Node::regular(Code::new(1), "it's"),
            Node::regular(Code::new(2), "b"),
        ]
    );
    assert_eq!(axis::render(&tree), "{base(),CB_1 'it''s',CB_2 'b'}");
}

#[test]
fn nested_nets_keep_child_order() {
    let tree = axis::parse(
        "{base(),CB_100 'Service' net({CB_2 'Fast',CB_200 'Staff' net({CB_3 'Kind',CB_4 'Rude'}),CB_5 'Slow'}),CB_6}",
    )
    .expect("parse");
    let outline = tree.outline();
    assert_eq!(
        outline,
        "base()\nCB_100 - Service\n    CB_2 - Fast\n    CB_200 - Staff\n        CB_3 - Kind\n        CB_4 - Rude\n    CB_5 - Slow\nCB_6 - \n"
    );
    assert_eq!(tree.count(NodeKind::Net), 2);
}

#[test]
fn unmatched_close_names_the_fragment() {
    let errors = axis::parse("{CB_1 'a'}),CB_2}").expect_err("unmatched");
    assert_eq!(
        errors.0,
        vec![GrammarError::UnmatchedClose {
            fragment: "CB_1 'a'".to_string()
        }]
    );
}

#[test]
fn every_defect_is_reported() {
    let errors = axis::parse("{n 'x' net({}),CB_1 label,m 'y' net({CB_2}").expect_err("defects");
    assert_eq!(
        errors.0,
        vec![
            GrammarError::EmptyAxisNet {
                name: "n".to_string()
            },
            GrammarError::MalformedFragment {
                fragment: "CB_1 label".to_string()
            },
            GrammarError::UnclosedNet {
                name: "m".to_string()
            },
        ]
    );
}

#[test]
fn leading_base_dialect_is_idempotent() {
    let tree = axis::parse("{CB_1 'a'}").expect("parse");
    let with_base = axis::render_with(&tree, AxisDialect::LeadingBase);
    assert_eq!(with_base, "{base(),CB_1 'a'}");
    let reparsed = axis::parse(&with_base).expect("parse");
    assert_eq!(axis::render_with(&reparsed, AxisDialect::LeadingBase), with_base);
}
