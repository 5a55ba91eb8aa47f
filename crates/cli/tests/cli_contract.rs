use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Writes a fixture PDF with the given `(width, height, rotation)` pages.
fn write_fixture(path: &Path, specs: &[(f32, f32, i64)]) {
    let mut doc = Document::with_version("1.7");
    let mut kids = Vec::new();
    let mut page_ids = Vec::new();

    for &(width, height, rotation) in specs {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width),
                Object::Real(height),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {},
        };
        if rotation != 0 {
            page.set("Rotate", rotation);
        }
        let page_id = doc.add_object(page);
        kids.push(Object::Reference(page_id));
        page_ids.push(page_id);
    }

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => specs.len() as i64,
    });
    for page_id in page_ids {
        if let Ok(dict) = doc.get_object_mut(page_id).and_then(|obj| obj.as_dict_mut()) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.save(path).expect("fixture should save");
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(&input, &[(612.0, 792.0, 0), (500.0, 700.0, 90)]);

    let output = cargo_bin_cmd!("pagemark")
        .arg("info")
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["pages"][0]["width"], 612.0);
    assert_eq!(value["pages"][0]["height"], 792.0);
    assert_eq!(value["pages"][0]["rotation"], 0);
    assert_eq!(value["pages"][1]["rotation"], 90);
}

#[test]
fn export_writes_pages_in_selection_order_with_sidecar() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(
        &input,
        &[(612.0, 792.0, 0), (500.0, 500.0, 0), (400.0, 600.0, 0)],
    );

    let out_path = temp.path().join("subset.pdf");
    cargo_bin_cmd!("pagemark")
        .arg("export")
        .arg(&input)
        .arg("--pages")
        .arg("3,1")
        .arg("--output")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 2 pages"));

    let doc = Document::load(&out_path).expect("output should parse");
    let sizes: Vec<f32> = doc
        .page_iter()
        .map(|page_id| {
            doc.get_object(page_id)
                .and_then(|obj| obj.as_dict())
                .and_then(|dict| dict.get(b"MediaBox"))
                .and_then(|obj| obj.as_array())
                .expect("page should carry a MediaBox")[2]
                .as_float()
                .expect("MediaBox entries should be numeric")
        })
        .collect();
    assert_eq!(sizes, vec![400.0, 612.0]);

    let sidecar = out_path.with_file_name("subset.pdf.json");
    assert!(sidecar.exists(), "export should write a sidecar next to the output");
}

#[test]
fn export_applies_annotations_from_the_input_sidecar() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(&input, &[(612.0, 792.0, 0)]);

    // Canvas rect (100,100)-(200,150) in export space, plus one label.
    fs::write(
        temp.path().join("doc.pdf.json"),
        r#"{"0": [[100.0, 642.0, 200.0, 692.0], ["approved", 50.0, 692.0, 14]]}"#,
    )
    .expect("sidecar fixture should write");

    let out_path = temp.path().join("annotated.pdf");
    cargo_bin_cmd!("pagemark")
        .arg("export")
        .arg(&input)
        .arg("--pages")
        .arg("1")
        .arg("--output")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 markups, 1 text runs"));

    let doc = Document::load(&out_path).expect("output should parse");
    let page_id = doc.page_iter().next().expect("output should have a page");

    let annots = doc
        .get_object(page_id)
        .and_then(|obj| obj.as_dict())
        .and_then(|dict| dict.get(b"Annots"))
        .and_then(|obj| obj.as_array())
        .expect("page should carry an Annots array");
    assert_eq!(annots.len(), 1);

    let content = doc.get_page_content(page_id).expect("page content should load");
    assert!(String::from_utf8_lossy(&content).contains("(approved) Tj"));

    let round_tripped: Value = serde_json::from_str(
        &fs::read_to_string(out_path.with_file_name("annotated.pdf.json"))
            .expect("output sidecar should exist"),
    )
    .expect("output sidecar should be valid JSON");
    assert_eq!(round_tripped["0"][0], serde_json::json!([100.0, 642.0, 200.0, 692.0]));
}

#[test]
fn export_rejects_out_of_range_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(&input, &[(612.0, 792.0, 0)]);

    let out_path = temp.path().join("nope.pdf");
    cargo_bin_cmd!("pagemark")
        .arg("export")
        .arg(&input)
        .arg("--pages")
        .arg("7")
        .arg("--output")
        .arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));

    assert!(!out_path.exists());
}

#[test]
fn export_rejects_zero_page_numbers() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(&input, &[(612.0, 792.0, 0)]);

    cargo_bin_cmd!("pagemark")
        .arg("export")
        .arg(&input)
        .arg("--pages")
        .arg("0")
        .arg("--output")
        .arg(temp.path().join("zero.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("pagemark")
        .arg("info")
        .arg("/nonexistent/missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("invalid.pdf");
    fs::write(&input, b"not a pdf at all").expect("fixture should write");

    cargo_bin_cmd!("pagemark")
        .arg("info")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn export_fails_for_malformed_sidecar() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("doc.pdf");
    write_fixture(&input, &[(612.0, 792.0, 0)]);
    fs::write(temp.path().join("doc.pdf.json"), b"{ not json }")
        .expect("sidecar fixture should write");

    cargo_bin_cmd!("pagemark")
        .arg("export")
        .arg(&input)
        .arg("--pages")
        .arg("1")
        .arg("--output")
        .arg(temp.path().join("out.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("sidecar"));
}

#[test]
fn version_prints_semver() {
    cargo_bin_cmd!("pagemark")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d+\.\d+\.\d+\n$").expect("regex should compile"));
}
