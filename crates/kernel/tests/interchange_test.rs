#![allow(clippy::unwrap_used, clippy::expect_used)]
//! XML export and import of whole pages, image payloads included.

mod common;

use common::{ACTOR, TestApp};
use folio_kernel::CmsError;
use folio_kernel::file::FileStorage;
use folio_kernel::form::{Submission, UploadedFile};
use folio_kernel::models::{CmsValue, PageState};
use folio_kernel::services::PageUpdate;
use folio_test_utils::TINY_PNG;

async fn page_with_content(app: &TestApp) -> folio_kernel::models::Page {
    let page = app.create_static().await;
    app.save_heading(page.id, "Fish & <chips>").await;
    let image = Submission::new()
        .with_field("basename", "image")
        .with_field("title", "Pixel")
        .with_field("size", "l")
        .with_file("image", UploadedFile::new("pixel.png", TINY_PNG.to_vec()));
    app.pages()
        .save_section(ACTOR, page.id, "image", &image)
        .await
        .unwrap();
    app.pages()
        .update(
            ACTOR,
            page.id,
            PageUpdate {
                url: page.url.clone(),
                search_image: Some(UploadedFile::new("search.png", TINY_PNG.to_vec())),
                ..PageUpdate::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn export_then_import_reproduces_the_page() {
    let app = TestApp::new().await;
    let page = page_with_content(&app).await;

    let (_, xml) = app.pages().export_xml(page.id).await.unwrap();
    assert!(xml.contains(r#"template="static""#));
    assert!(xml.contains("Fish &amp; &lt;chips&gt;"));

    // The draft blocks an import onto the same path until it is published.
    let err = app.pages().import_xml(ACTOR, &xml).await.unwrap_err();
    assert!(matches!(err, CmsError::Validation(ref m) if m.contains("Another draft")));
    app.pages().publish(ACTOR, page.id).await.unwrap();

    let imported = app.pages().import_xml(ACTOR, &xml).await.unwrap();
    assert_ne!(imported.id, page.id);
    assert_eq!(imported.url, page.url);
    assert_eq!(imported.state, PageState::Draft);
    assert_eq!(imported.search_image, page.search_image);

    let original = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    let copied = CmsValue::for_page(app.state.db(), imported.id).await.unwrap();
    let pairs = |values: &[CmsValue]| {
        let mut pairs: Vec<(String, String, String)> = values
            .iter()
            .map(|v| (v.name.clone(), v.type_name.clone(), v.value.clone()))
            .collect();
        pairs.sort();
        pairs
    };
    assert_eq!(pairs(&original), pairs(&copied));

    // Identical bytes under the exported key are reused, not duplicated.
    assert_eq!(app.files.len(), 2);
}

#[tokio::test]
async fn import_into_an_empty_store_writes_the_images() {
    let source = TestApp::new().await;
    let page = page_with_content(&source).await;
    let (_, xml) = source.pages().export_xml(page.id).await.unwrap();

    let target = TestApp::new().await;
    let imported = target.pages().import_xml(ACTOR, &xml).await.unwrap();
    assert_eq!(target.files.len(), 2);

    let values = CmsValue::for_page(target.state.db(), imported.id).await.unwrap();
    let key = values
        .iter()
        .find(|v| v.name == "image/image")
        .map(|v| v.value.clone())
        .unwrap();
    assert_eq!(target.files.read(&key).await.unwrap(), TINY_PNG);
}

#[tokio::test]
async fn invalid_documents_are_rejected() {
    let app = TestApp::new().await;

    let err = app.pages().validate_xml("not xml at all").await.unwrap_err();
    assert!(err.to_string().starts_with("Malformed XML or not an XML document"));

    let err = app
        .pages()
        .validate_xml(r#"<cms-page version="1"><page path="/x/" template="missing"/></cms-page>"#)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Malformed XML: wrong template missing");

    let err = app
        .pages()
        .validate_xml(r#"<cms-page version="1"><page path="" template="static"/></cms-page>"#)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Malformed XML: missing path");

    let doc = app
        .pages()
        .validate_xml(r#"<cms-page version="1"><page path="/fresh/" template="static"/></cms-page>"#)
        .await
        .unwrap();
    assert_eq!(doc.template, "static");
}
