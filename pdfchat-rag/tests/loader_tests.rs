//! Loading real PDF files from a staging directory.

mod common;

use std::path::Path;

use common::{PARIS, keyword_pipeline};
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use pdfchat_rag::{DocumentLoader, PdfDirectoryLoader, RagError};

/// Write a PDF with one page per entry of `pages`, each showing its text.
fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn one_document_per_page_with_zero_based_page_numbers() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("france.pdf"), &[PARIS, "Berlin is the capital of Germany."]);

    let documents = PdfDirectoryLoader::new().load(temp.path()).unwrap();

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].page, Some(0));
    assert_eq!(documents[1].page, Some(1));
    assert!(documents[0].text.contains(PARIS), "extracted {:?}", documents[0].text);
    assert!(documents[1].text.contains("Berlin"));
    assert!(documents[0].source.ends_with("france.pdf"));
    assert_eq!(documents[0].metadata.get("page").map(String::as_str), Some("0"));
    assert_eq!(documents[0].text, documents[0].text.trim());
}

#[test]
fn files_load_in_sorted_order_and_stay_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("b.pdf"), &["Second file."]);
    write_pdf(&temp.path().join("a.pdf"), &["First file."]);

    let documents = PdfDirectoryLoader::new().load(temp.path()).unwrap();

    let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
    assert!(sources[0].ends_with("a.pdf"));
    assert!(sources[1].ends_with("b.pdf"));
    assert!(temp.path().join("a.pdf").exists());
    assert!(temp.path().join("b.pdf").exists());
}

#[tokio::test]
async fn ingest_directory_indexes_every_page() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("france.pdf"), &[PARIS]);
    let (pipeline, index) = keyword_pipeline();

    let report = pipeline.ingest_directory(temp.path()).await.unwrap();

    assert_eq!(report.document_count, 1);
    assert_eq!(report.chunk_count, 1);
    assert_eq!(index.namespace_count().await, 1);
}

#[tokio::test]
async fn ingesting_an_empty_directory_is_a_load_error() {
    let temp = tempfile::tempdir().unwrap();
    let (pipeline, index) = keyword_pipeline();

    let err = pipeline.ingest_directory(temp.path()).await.unwrap_err();

    assert!(matches!(err, RagError::Load { .. }));
    assert_eq!(index.namespace_count().await, 0);
}
