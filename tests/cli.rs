mod common;

use assert_cmd::Command;
use codeplan_sync::document::MetadataDocument;
use codeplan_sync::names::RenameTable;
use codeplan_sync::reconcile::RedirectMaps;
use common::{TestWorkspace, fixture_path};
use predicates::prelude::*;
use predicates::str::contains;

fn command() -> Command {
    Command::cargo_bin("codeplan-sync").expect("binary exists")
}

#[test]
fn check_summarizes_codeplan_sheets() {
    command()
        .args(["check", "-w"])
        .arg(fixture_path("workbook"))
        .assert()
        .success()
        .stdout(contains("CP Brands"))
        .stdout(contains("CP Reasons"))
        .stdout(contains("Notes").not());
}

#[test]
fn check_reports_grammar_errors_and_fails() {
    command()
        .args(["check", "--workbook"])
        .arg(fixture_path("broken"))
        .assert()
        .failure()
        .stdout(contains("Codeplan \"CP Broken\": Empty net in row 2"))
        .stdout(contains("Codeplan \"CP Broken\": Duplicate code CB_1 found in row 4"))
        .stderr(contains("1 sheet(s) with errors"));
}

#[test]
fn check_emits_json_summaries() {
    let output = command()
        .args(["check", "--json", "-w"])
        .arg(fixture_path("workbook"))
        .output()
        .expect("run check");
    assert!(output.status.success());
    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let names = summaries
        .as_array()
        .expect("array")
        .iter()
        .map(|summary| summary["name"].as_str().expect("name").to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["CP Brands", "CP Reasons"]);
    assert_eq!(summaries[1]["combines"], 1);
    assert_eq!(summaries[1]["doubled"], serde_json::json!(["CB_1", "CB_2"]));
}

#[test]
fn check_reads_one_sheet_from_stdin() {
    command()
        .args(["check", "-w", "-"])
        .write_stdin("Title,\n*,Net\n1,One\n#,\n2,Two\n")
        .assert()
        .success()
        .stdout(contains("stdin"));

    command()
        .args(["tree", "--sheet", "stdin", "--axis", "-w", "-"])
        .write_stdin("1,One\n2,Two\n")
        .assert()
        .success()
        .stdout("{base(),CB_1 'One',CB_2 'Two'}\n");
}

#[test]
fn tree_prints_sheet_outline() {
    command()
        .args(["tree", "--sheet", "CP Brands", "-w"])
        .arg(fixture_path("workbook"))
        .assert()
        .success()
        .stdout("base()\nnet2 - Positive\n    CB_1 - Good service\n    CB_2 - Fast\nCB_3 - Other\n");
}

#[test]
fn tree_prints_document_axis() {
    command()
        .args(["tree", "--codeplan", "head_2", "--axis", "-d"])
        .arg(fixture_path("document.yaml"))
        .assert()
        .success()
        .stdout("{base(),CB_1 'Price',CB_2 'Quality'}\n");
}

#[test]
fn tree_rejects_unknown_sheet() {
    command()
        .args(["tree", "--sheet", "CP Missing", "-w"])
        .arg(fixture_path("workbook"))
        .assert()
        .failure()
        .stderr(contains("Sheet 'CP Missing' not found"));
}

#[test]
fn merge_then_rewrite_coding_statements() {
    let workspace = TestWorkspace::new();
    let merged = workspace.path().join("merged.yaml");
    let renames = workspace.path().join("renames.yaml");
    let redirects = workspace.path().join("redirects.yaml");

    command()
        .arg("merge")
        .arg("-d")
        .arg(fixture_path("document.yaml"))
        .arg("-w")
        .arg(fixture_path("workbook"))
        .arg("-a")
        .arg(fixture_path("adapter.yaml"))
        .arg("-o")
        .arg(&merged)
        .arg("--rename-table")
        .arg(&renames)
        .arg("--redirects")
        .arg(&redirects)
        .assert()
        .success()
        .stdout(contains("merged"))
        .stdout(contains("skipped"))
        .stdout(contains("1 redirected, 0 relabelled"));

    let document = MetadataDocument::load(&merged).expect("merged document");
    let axes = document
        .variables
        .iter()
        .map(|variable| (variable.name.as_str(), variable.axis.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        axes,
        vec![
            (
                "f4l[{axa}].f4",
                "{base(),net2 'Positive' net({CB_1 'Good service',CB_2 'Fast'}),CB_3 'Other'}"
            ),
            (
                "f4l[{bxb}].f4",
                "{base(),CB_1 'Price',CB_2 'Quality',comb3 'Price or quality' combine({CB_1,CB_2})}"
            ),
            (
                "q9",
                "{base(),CB_1 'Price',CB_2 'Quality',comb3 'Price or quality' combine({CB_1,CB_2})}"
            ),
        ]
    );
    let head_1 = document.category_set("head_1").expect("head_1");
    assert_eq!(head_1.categories.len(), 3);

    let rename_table: RenameTable =
        serde_yaml::from_str(&workspace.read("renames.yaml")).expect("rename yaml");
    assert_eq!(rename_table.get("f4l[{axa}].f4"), Some("f4l_f4_axa_o_c"));
    let redirect_maps: RedirectMaps =
        serde_yaml::from_str(&workspace.read("redirects.yaml")).expect("redirect yaml");
    assert_eq!(redirect_maps.len(), 1);
    assert!(redirect_maps.get("f4l[{axa}].f4.Coding").is_some());

    command()
        .arg("tree")
        .arg("-d")
        .arg(&merged)
        .args(["--codeplan", "head_2"])
        .assert()
        .success()
        .stdout(contains("comb3 - Price or quality"));

    let rewritten = workspace.path().join("rewritten.txt");
    command()
        .arg("rewrite")
        .arg("-i")
        .arg(fixture_path("verbaco.txt"))
        .arg("-o")
        .arg(&rewritten)
        .arg("--rename-table")
        .arg(&renames)
        .arg("--redirects")
        .arg(&redirects)
        .assert()
        .success();
    assert_eq!(
        workspace.read("rewritten.txt"),
        "UPDATE vdata SET f4l_f4_axa_o_c={CB_3,CB_1} WHERE Respondent.Serial = 1\n\
         UPDATE vdata SET q9.Coding={CB_2} WHERE Respondent.Serial = 1\n"
    );
}

#[test]
fn merge_writes_nothing_when_a_mapping_fails() {
    let workspace = TestWorkspace::new();
    let adapter = workspace.write(
        "adapter.yaml",
        "mappings:\n  - document: head_1\n    sheet: CP Brands\n",
    );
    let merged = workspace.path().join("merged.yaml");

    command()
        .arg("merge")
        .arg("-d")
        .arg(fixture_path("document.yaml"))
        .arg("-w")
        .arg(fixture_path("workbook"))
        .arg("-a")
        .arg(&adapter)
        .arg("-o")
        .arg(&merged)
        .assert()
        .failure()
        .stdout(contains("failed"))
        .stderr(contains("nothing was written"));
    assert!(!merged.exists());
}

#[test]
fn rename_prints_table_to_stdout() {
    command()
        .args(["rename", "-d"])
        .arg(fixture_path("document.yaml"))
        .assert()
        .success()
        .stdout(contains("f4l_f4_axa_o_c"))
        .stdout(contains("f4l_f4_bxb_o_c"))
        .stdout(contains("q9: q9.Coding"));

    command()
        .args(["rename", "--renamed-only", "-d"])
        .arg(fixture_path("document.yaml"))
        .assert()
        .success()
        .stdout(contains("q9").not());
}

#[test]
fn append_adds_unknown_entries_only() {
    let workspace = TestWorkspace::new();
    let other = workspace.write(
        "other.yaml",
        "category_sets:\n  - name: head_1\n    categories: []\n  - name: head_9\n    categories:\n      - { name: CB_1, label: Yes }\nvariables:\n  - name: q9\n    label: Reasons\n    category_set: head_2\n    axis: \"{}\"\n  - name: q10\n    label: Agree\n    category_set: head_9\n    axis: \"{base(),CB_1 'Yes'}\"\n",
    );
    let output = workspace.path().join("combined.yaml");
    command()
        .arg("append")
        .arg("-d")
        .arg(fixture_path("document.yaml"))
        .arg("--other")
        .arg(&other)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let combined = MetadataDocument::load(&output).expect("combined document");
    let sets = combined
        .category_sets
        .iter()
        .map(|set| set.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(sets, vec!["head_1", "head_2", "head_9"]);
    assert_eq!(combined.category_set("head_1").map(|set| set.categories.len()), Some(4));
    assert_eq!(combined.variables.len(), 4);
    assert_eq!(combined.variables[3].name, "q10");
}

#[test]
fn compare_lists_changes_between_waves() {
    let workspace = TestWorkspace::new();
    let current = workspace.write(
        "current.yaml",
        "category_sets:\n  - name: head_2\n    categories:\n      - { name: CB_1, label: Cost }\n      - { name: CB_3, label: Design }\nvariables:\n  - name: q9\n    label: Reasons\n    category_set: head_2\n    axis: \"{base(),CB_1 'Cost',CB_3 'Design'}\"\n",
    );
    command()
        .arg("compare")
        .arg("--previous")
        .arg(fixture_path("document.yaml"))
        .arg("--current")
        .arg(&current)
        .assert()
        .success()
        .stdout(contains("variable dropped"))
        .stdout(contains("category relabelled"))
        .stdout(contains("head_2/CB_3"));

    command()
        .arg("compare")
        .arg("--previous")
        .arg(&current)
        .arg("--current")
        .arg(&current)
        .assert()
        .success()
        .stdout("No differences\n");
}
