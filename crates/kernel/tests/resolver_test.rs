#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Request-to-page resolution through the path cache.

mod common;

use common::{ACTOR, TestApp};
use folio_kernel::resolver::PageRequest;
use folio_test_utils::unique_url;

#[tokio::test]
async fn public_mode_serves_only_live_pages_from_the_rendered_cache() {
    let app = TestApp::with_env(&[("ADMIN_ENABLED", "false")]).await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Published").await;

    let request = PageRequest::new(page.url.trim_matches('/'));
    assert!(app.state.resolver().resolve(&request).await.unwrap().is_none());

    app.pages().publish(ACTOR, page.id).await.unwrap();
    // Later edits stay invisible until the next publish or refresh.
    app.save_heading(page.id, "Edited").await;

    let resolved = app.state.resolver().resolve(&request).await.unwrap().unwrap();
    assert_eq!(resolved.page.id, page.id);
    assert!(!resolved.preview);
    assert_eq!(resolved.sections["heading"], "<h2>Published</h2>");
}

#[tokio::test]
async fn admin_mode_previews_drafts_and_prefers_live() {
    let app = TestApp::new().await;
    let url = unique_url("preview");
    let live = app.create_at(&url, "").await;
    app.save_heading(live.id, "Live").await;
    app.pages().publish(ACTOR, live.id).await.unwrap();
    let draft = app.create_at(&url, "").await;
    app.save_heading(draft.id, "Draft").await;

    let resolved = app
        .state
        .resolver()
        .resolve(&PageRequest::new(&url))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.page.id, live.id);
    assert!(resolved.preview);

    let by_id = PageRequest {
        cmsid: Some(draft.id.to_string()),
        ..PageRequest::new("/anything/")
    };
    let resolved = app.state.resolver().resolve(&by_id).await.unwrap().unwrap();
    assert_eq!(resolved.page.id, draft.id);
    assert_eq!(resolved.sections["heading"], "<h2>Draft</h2>");
}

#[tokio::test]
async fn cmsid_is_ignored_outside_admin_mode() {
    let app = TestApp::with_env(&[("ADMIN_ENABLED", "false")]).await;
    let draft = app.create_static().await;

    let request = PageRequest {
        cmsid: Some(draft.id.to_string()),
        ..PageRequest::new("/nothing-here/")
    };
    assert!(app.state.resolver().resolve(&request).await.unwrap().is_none());
}

#[tokio::test]
async fn alternative_urls_are_tried_in_order() {
    let app = TestApp::with_env(&[("ADMIN_ENABLED", "false")]).await;
    let shared = app.create_static().await;
    app.pages().publish(ACTOR, shared.id).await.unwrap();

    let request = PageRequest {
        cms_urls: vec!["/missing/".into(), shared.url.clone()],
        ..PageRequest::new("/not-a-page/")
    };
    let id = app.state.resolver().page_id(&request).await.unwrap();
    assert_eq!(id, Some(shared.id));
}

#[tokio::test]
async fn localized_lookup_falls_back_through_locale_tags() {
    let app = TestApp::with_env(&[("ADMIN_ENABLED", "false"), ("LOCALIZED", "true")]).await;
    let url = unique_url("intl");
    let neutral = app.create_at(&url, "").await;
    let german = app.create_at(&url, "de").await;
    app.pages().publish(ACTOR, neutral.id).await.unwrap();
    app.pages().publish(ACTOR, german.id).await.unwrap();

    let resolver = app.state.resolver();
    let de_at = PageRequest::new(&url).with_locale("de-at");
    assert_eq!(resolver.page_id(&de_at).await.unwrap(), Some(german.id));

    let fr = PageRequest::new(&url).with_locale("fr");
    assert_eq!(resolver.page_id(&fr).await.unwrap(), Some(neutral.id));
}

#[tokio::test]
async fn deleted_pages_stop_resolving() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    let request = PageRequest::new(&page.url);
    assert!(app.state.resolver().resolve(&request).await.unwrap().is_some());

    app.pages().delete(ACTOR, page.id).await.unwrap();
    assert!(app.state.resolver().resolve(&request).await.unwrap().is_none());
}

#[tokio::test]
async fn preview_and_published_sections_match() {
    let app = TestApp::new().await;
    let page = app.create_static().await;
    app.save_heading(page.id, "Same either way").await;
    app.pages().publish(ACTOR, page.id).await.unwrap();

    let request = PageRequest::new(&page.url);
    let preview = app.state.resolver().resolve(&request).await.unwrap().unwrap();
    assert!(preview.preview);

    let cached = app.pages().load_rendered(&page).await.unwrap();
    assert_eq!(preview.sections, cached);
    assert_eq!(cached["heading"], "<h2>Same either way</h2>");
}
