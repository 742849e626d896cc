mod common;

use codeplan_sync::code::Code;
use codeplan_sync::codeplan::Codeplan;
use codeplan_sync::error::GrammarError;
use codeplan_sync::rows::{FirstSeen, LexicographicMax, RowKind, RowScan, classify};
use codeplan_sync::tree::{Node, NodeKind};
use common::sheet_rows;

fn codes<'a>(cells: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    cells.iter().map(|code| (*code, "label")).collect()
}

fn errors(cells: &[&str]) -> Vec<GrammarError> {
    RowScan::new(sheet_rows(&codes(cells))).validate()
}

#[test]
fn classification_follows_rule_order() {
    assert_eq!(classify("12"), RowKind::Regular(Code::new(12)));
    assert_eq!(classify("**"), RowKind::NetStart(2));
    assert_eq!(classify("###"), RowKind::NetEnd(3));
    assert_eq!(classify("4.5"), RowKind::Combine(vec![Code::new(4), Code::new(5)]));
    assert_eq!(
        classify("1, 2,3"),
        RowKind::Combine(vec![Code::new(1), Code::new(2), Code::new(3)])
    );
    assert_eq!(classify("4.5.6"), RowKind::Invalid);
    assert_eq!(classify("1,x"), RowKind::Invalid);
    assert_eq!(classify("*#"), RowKind::Invalid);
    assert_eq!(classify(""), RowKind::Invalid);
}

#[test]
fn long_digit_runs_are_regular_codes() {
    assert_eq!(
        classify("4294967296"),
        RowKind::Regular(Code::new(4_294_967_296))
    );
    assert_eq!(
        errors(&["1", "99999999999999999999", "2"]),
        vec![GrammarError::CodeOutOfRange {
            code: "99999999999999999999".to_string(),
            row: Some(2)
        }]
    );
}

#[test]
fn single_net_with_two_children() {
    let rows = sheet_rows(&[("*", "Net"), ("1", "One"), ("2", "Two"), ("#", "")]);
    let codeplan = Codeplan::from_rows("sheet", rows, &LexicographicMax);
    assert!(codeplan.is_valid(), "{}", codeplan.errors());
    let tree = codeplan.tree().expect("tree");
    let nets = tree
        .children()
        .iter()
        .filter_map(|node| match node {
            Node::Net { children, .. } => Some(children.len()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(nets, vec![2]);
    assert_eq!(tree.children()[0], Node::Base);
}

#[test]
fn skipped_depth_is_reported() {
    assert_eq!(
        errors(&["*", "*", "1", "#"]),
        vec![GrammarError::NetDepth {
            row: 2,
            expected: 2
        }]
    );
}

#[test]
fn empty_net_is_reported() {
    assert_eq!(errors(&["*", "#"]), vec![GrammarError::EmptyNet { row: 2 }]);
}

#[test]
fn too_many_hashes_are_reported() {
    assert_eq!(
        errors(&["*", "1", "##"]),
        vec![GrammarError::NetClose { row: 3, open: 1 }]
    );
}

#[test]
fn duplicates_in_one_scope_report_once() {
    assert_eq!(
        errors(&["1", "1"]),
        vec![GrammarError::DuplicateCode {
            row: 2,
            code: Code::new(1)
        }]
    );
    assert_eq!(
        errors(&["1,1,2"]),
        vec![GrammarError::DuplicateCombineCodes { row: 1 }]
    );
}

#[test]
fn opening_a_net_starts_a_new_scope() {
    assert!(errors(&["1", "*", "1", "#"]).is_empty());
}

#[test]
fn invalid_rows_are_trimmed_at_both_ends_only() {
    let rows = sheet_rows(&[
        ("Title", ""),
        ("", ""),
        ("1", "One"),
        ("n/a", ""),
        ("2", "Two"),
        ("Total", ""),
    ]);
    let scan = RowScan::new(rows);
    assert_eq!(scan.rows().len(), 3);
    assert_eq!(scan.rows()[0].row.index, 3);
    assert_eq!(
        scan.validate(),
        vec![GrammarError::InvalidCode {
            code: "n/a".to_string(),
            row: Some(4)
        }]
    );
}

#[test]
fn all_invalid_sheet_is_empty_codeplan() {
    assert_eq!(errors(&["Title", ""]), vec![GrammarError::EmptyCodeplan]);
}

#[test]
fn errors_accumulate_across_rows() {
    let found = errors(&["*", "#", "3", "3", "**", "4", "#"]);
    assert_eq!(
        found,
        vec![
            GrammarError::EmptyNet { row: 2 },
            GrammarError::DuplicateCode {
                row: 4,
                code: Code::new(3)
            },
            GrammarError::NetDepth {
                row: 5,
                expected: 1
            },
        ]
    );
}

#[test]
fn nets_and_combines_are_named_by_row() {
    let rows = sheet_rows(&[("*", "Net"), ("1", "One"), ("#", ""), ("1.2", "Both")]);
    let codeplan = Codeplan::from_rows("sheet", rows, &LexicographicMax);
    let flat = codeplan.tree().expect("tree").flatten();
    let names = flat
        .iter()
        .filter(|node| matches!(node.kind, NodeKind::Net | NodeKind::Combine))
        .map(|node| node.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["net1", "comb4"]);
    assert_eq!(
        codeplan.axis().expect("axis"),
        "{base(),net1 'Net' net({CB_1 'One'}),comb4 'Both' combine({CB_1,CB_2})}"
    );
}

#[test]
fn elements_sort_numerically_and_mark_doubles() {
    let rows = sheet_rows(&[("10", "Ten"), ("9", "Nine"), ("*", "Net"), ("10", "Zehn"), ("#", "")]);
    let max = Codeplan::from_rows("sheet", rows.clone(), &LexicographicMax);
    let elements = max
        .elements()
        .iter()
        .map(|e| (e.code.value(), e.label.as_str(), e.is_doubled))
        .collect::<Vec<_>>();
    assert_eq!(elements, vec![(9, "Nine", false), (10, "Zehn", true)]);

    let first = Codeplan::from_rows("sheet", rows, &FirstSeen);
    assert_eq!(first.element(Code::new(10)).map(|e| e.label.as_str()), Some("Ten"));
}

#[test]
fn combine_codes_contribute_empty_labels() {
    let rows = sheet_rows(&[("3", "Three"), ("3,4", "Group")]);
    let codeplan = Codeplan::from_rows("sheet", rows, &LexicographicMax);
    let elements = codeplan
        .elements()
        .iter()
        .map(|e| (e.code.value(), e.label.as_str(), e.is_doubled))
        .collect::<Vec<_>>();
    assert_eq!(elements, vec![(3, "Three", true), (4, "", false)]);
}
