#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Page lifecycle through the service layer: drafts, section saves,
//! publishing, archiving, copies and deletion.

mod common;

use common::{ACTOR, TestApp};
use folio_kernel::CmsError;
use folio_kernel::content::SchemaError;
use folio_kernel::form::{Submission, UploadedFile};
use folio_kernel::models::{CmsValue, PageFilter, PageMeta, PageState};
use folio_kernel::services::{NewPage, PageUpdate};
use folio_test_utils::{TINY_PNG, unique_url};

fn value_of(values: &[CmsValue], name: &str) -> Option<String> {
    values.iter().find(|v| v.name == name).map(|v| v.value.clone())
}

#[tokio::test]
async fn create_normalizes_url_and_starts_as_draft() {
    let app = TestApp::new().await;
    let page = app
        .pages()
        .create(
            ACTOR,
            NewPage {
                url: "about/team".into(),
                template: "static".into(),
                meta: PageMeta {
                    description: "Team".into(),
                    ..PageMeta::default()
                },
                ..NewPage::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.url, "/about/team/");
    assert_eq!(page.state, PageState::Draft);
    assert_eq!(page.description, "Team");
    assert!(page.updated > 0);
}

#[tokio::test]
async fn second_draft_on_a_path_is_rejected() {
    let app = TestApp::new().await;
    let url = unique_url("dup");
    app.create_at(&url, "").await;

    let err = app
        .pages()
        .create(
            ACTOR,
            NewPage {
                url: url.clone(),
                template: "static".into(),
                ..NewPage::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CmsError::Validation(ref m) if m == "Another draft page exists for this URL."
    ));

    // Same URL in another locale is a different path.
    let other = app.create_at(&url, "de").await;
    assert_eq!(other.locale, "de");
}

#[tokio::test]
async fn unknown_template_and_locale_are_rejected() {
    let app = TestApp::new().await;
    let bad_template = app
        .pages()
        .create(
            ACTOR,
            NewPage {
                url: unique_url("x"),
                template: "nope".into(),
                ..NewPage::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(bad_template, CmsError::Validation(_)));

    let bad_locale = app
        .pages()
        .create(
            ACTOR,
            NewPage {
                url: unique_url("x"),
                locale: "fr".into(),
                template: "static".into(),
                ..NewPage::default()
            },
        )
        .await
        .unwrap_err();
    assert!(bad_locale.to_string().contains("fr is not one of the available choices"));
}

#[tokio::test]
async fn section_save_writes_full_value_names() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Hello").await;

    let dots = Submission::new()
        .with_field("basename", "dots/1/text")
        .with_field("text", "first");
    app.pages()
        .save_section(ACTOR, page.id, "dots", &dots)
        .await
        .unwrap();

    let values = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    assert_eq!(value_of(&values, "heading/text").as_deref(), Some("Hello"));
    assert_eq!(value_of(&values, "dots/1/text/text").as_deref(), Some("first"));

    // Saving again overwrites rather than duplicating.
    app.save_heading(page.id, "Hello again").await;
    let values = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    assert_eq!(values.iter().filter(|v| v.name == "heading/text").count(), 1);
    assert_eq!(value_of(&values, "heading/text").as_deref(), Some("Hello again"));
}

#[tokio::test]
async fn section_save_rejects_forms_outside_the_section() {
    let app = TestApp::new().await;
    let page = app.create_static().await;

    let submission = Submission::new()
        .with_field("basename", "image")
        .with_field("title", "x");
    let err = app
        .pages()
        .save_section(ACTOR, page.id, "heading", &submission)
        .await
        .unwrap_err();
    assert!(matches!(err, CmsError::Schema(SchemaError::UnknownNode(_))));

    let bad_position = Submission::new()
        .with_field("basename", "dots/first/text")
        .with_field("text", "x");
    let err = app
        .pages()
        .save_section(ACTOR, page.id, "dots", &bad_position)
        .await
        .unwrap_err();
    assert!(matches!(err, CmsError::Schema(SchemaError::InvalidPosition(_))));
}

#[tokio::test]
async fn image_uploads_are_sniffed_and_stored() {
    let app = TestApp::new().await;
    let page = app.create_static().await;

    let not_an_image = Submission::new()
        .with_field("basename", "image")
        .with_file("image", UploadedFile::new("notes.png", b"plain text".to_vec()));
    let err = app
        .pages()
        .save_section(ACTOR, page.id, "image", &not_an_image)
        .await
        .unwrap_err();
    let CmsError::FormValidation(errors) = err else {
        panic!("expected field errors, got {err:?}");
    };
    assert!(errors.errors.contains_key("image"));
    assert!(app.files.is_empty());

    let upload = Submission::new()
        .with_field("basename", "image")
        .with_field("title", "Pixel")
        .with_file("image", UploadedFile::new("pixel.png", TINY_PNG.to_vec()));
    app.pages()
        .save_section(ACTOR, page.id, "image", &upload)
        .await
        .unwrap();
    assert_eq!(app.files.len(), 1);

    let values = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    let key = value_of(&values, "image/image").unwrap();
    assert!(key.starts_with("cms/image/"));
    assert!(key.ends_with(".png"));

    // A later save without a new upload keeps the stored image.
    let retitle = Submission::new()
        .with_field("basename", "image")
        .with_field("title", "Renamed");
    app.pages()
        .save_section(ACTOR, page.id, "image", &retitle)
        .await
        .unwrap();
    let values = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    assert_eq!(value_of(&values, "image/image"), Some(key));
    assert_eq!(value_of(&values, "image/title").as_deref(), Some("Renamed"));
}

#[tokio::test]
async fn clear_removes_values_below_the_basename() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    for pos in ["1", "2"] {
        let submission = Submission::new()
            .with_field("basename", format!("dots/{pos}/text"))
            .with_field("text", format!("dot {pos}"));
        app.pages()
            .save_section(ACTOR, page.id, "dots", &submission)
            .await
            .unwrap();
    }
    app.save_heading(page.id, "Stays").await;

    let removed = app
        .pages()
        .clear_section(ACTOR, page.id, "dots/1")
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let removed = app.pages().clear_section(ACTOR, page.id, "dots").await.unwrap();
    assert_eq!(removed, 1);

    let values = CmsValue::for_page(app.state.db(), page.id).await.unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].name, "heading/text");
}

#[tokio::test]
async fn overview_reports_section_completion() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Done").await;

    let overview = app.pages().section_overview(&page).await.unwrap();
    let names: Vec<&str> = overview.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["heading", "image", "dots"]);
    assert_eq!(overview[0].done, 100);
    assert_eq!(overview[1].done, 0);
    assert_eq!(overview[1].title, "Main image");
}

#[tokio::test]
async fn publish_renders_and_archives_the_previous_live_page() {
    let app = TestApp::new().await;
    let url = unique_url("pub");
    let first = app.create_at(&url, "").await;
    app.save_heading(first.id, "First").await;

    let first = app.pages().publish(ACTOR, first.id).await.unwrap();
    assert_eq!(first.state, PageState::Live);
    let rendered = app.pages().load_rendered(&first).await.unwrap();
    assert_eq!(rendered["heading"], "<h2>First</h2>");
    assert_eq!(rendered["dots"], "");

    // A live page does not block a new draft.
    let second = app.create_at(&url, "").await;
    app.save_heading(second.id, "Second").await;
    app.pages().publish(ACTOR, second.id).await.unwrap();

    let first = app.pages().get(first.id).await.unwrap();
    assert_eq!(first.state, PageState::Archived);
    let live = app
        .pages()
        .list(
            &PageFilter {
                state: Some(PageState::Live),
                q: Some(url.trim_matches('/').to_string()),
                ..PageFilter::default()
            },
            1,
        )
        .await
        .unwrap();
    assert_eq!(live.total, 1);
    assert_eq!(live.pages[0].id, second.id);
}

#[tokio::test]
async fn refresh_rewrites_the_rendered_cache() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Before").await;
    let page = app.pages().publish(ACTOR, page.id).await.unwrap();

    app.save_heading(page.id, "After").await;
    let rendered = app.pages().load_rendered(&page).await.unwrap();
    assert_eq!(rendered["heading"], "<h2>Before</h2>");

    let sections = app.pages().refresh(ACTOR, page.id).await.unwrap();
    assert_eq!(sections, 3);
    let rendered = app.pages().load_rendered(&page).await.unwrap();
    assert_eq!(rendered["heading"], "<h2>After</h2>");
}

#[tokio::test]
async fn live_pages_must_be_unpublished_before_delete() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Doomed").await;
    app.pages().publish(ACTOR, page.id).await.unwrap();

    let err = app.pages().delete(ACTOR, page.id).await.unwrap_err();
    assert!(matches!(err, CmsError::InvariantViolation(_)));

    let archived = app.pages().unpublish(ACTOR, page.id).await.unwrap();
    assert_eq!(archived.state, PageState::Archived);
    app.pages().delete(ACTOR, page.id).await.unwrap();

    assert!(matches!(
        app.pages().get(page.id).await.unwrap_err(),
        CmsError::NotFound(_)
    ));
    assert!(CmsValue::for_page(app.state.db(), page.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn copy_creates_a_draft_with_all_values() {
    let app = TestApp::new().await;
    let source = app.create_static().await;
    app.save_heading(source.id, "Copied").await;
    app.pages().publish(ACTOR, source.id).await.unwrap();

    let target = unique_url("copy");
    let copy = app.pages().copy(ACTOR, source.id, &target, "de").await.unwrap();
    assert_ne!(copy.id, source.id);
    assert_eq!(copy.url, target);
    assert_eq!(copy.locale, "de");
    assert_eq!(copy.state, PageState::Draft);

    let values = CmsValue::for_page(app.state.db(), copy.id).await.unwrap();
    assert_eq!(value_of(&values, "heading/text").as_deref(), Some("Copied"));

    // The target now has a draft.
    let err = app.pages().copy(ACTOR, source.id, &target, "de").await.unwrap_err();
    assert!(matches!(err, CmsError::Validation(_)));
}

#[tokio::test]
async fn update_moves_pages_and_manages_the_search_image() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    let blocker = app.create_static().await;

    let moved_onto_draft = app
        .pages()
        .update(
            ACTOR,
            page.id,
            PageUpdate {
                url: blocker.url.clone(),
                ..PageUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(moved_onto_draft, CmsError::Validation(_)));

    let new_url = unique_url("moved");
    let updated = app
        .pages()
        .update(
            ACTOR,
            page.id,
            PageUpdate {
                url: new_url.clone(),
                meta: PageMeta {
                    meta_title: "Moved".into(),
                    ..PageMeta::default()
                },
                search_image: Some(UploadedFile::new("s.png", TINY_PNG.to_vec())),
                ..PageUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.url, new_url);
    assert_eq!(updated.meta_title, "Moved");
    assert!(!updated.search_image.is_empty());

    let cleared = app
        .pages()
        .update(
            ACTOR,
            page.id,
            PageUpdate {
                url: new_url,
                clear_search_image: true,
                ..PageUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.search_image.is_empty());
}

#[tokio::test]
async fn history_records_each_operation() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Logged").await;
    app.pages().publish(ACTOR, page.id).await.unwrap();

    let history = app.pages().history(page.id).await.unwrap();
    let messages: Vec<&str> = history.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"created"));
    assert!(messages.contains(&"saved heading"));
    assert!(messages.contains(&"published"));
    assert!(history.iter().all(|e| e.actor == ACTOR));
}
