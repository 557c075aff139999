#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] owns a private in-memory SQLite database and an
//! in-memory file store, and loads the real Tera templates and page
//! definitions from the workspace root, so tests exercise the actual kernel
//! code without sharing state.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use folio_kernel::content::{TypeRegistry, loader};
use folio_kernel::file::{FileStorage, MemoryFileStorage};
use folio_kernel::form::Submission;
use folio_kernel::models::Page;
use folio_kernel::services::{NewPage, PageService};
use folio_kernel::theme::ThemeEngine;
use folio_kernel::{AppState, Config, db, routes};
use folio_test_utils::{MultipartBuilder, fields, unique_url};

/// Actor recorded on service calls made by tests.
pub const ACTOR: &str = "tester";

fn workspace_dir(name: &str) -> String {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "..", "..", name].iter().collect();
    path.to_string_lossy().into_owned()
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub files: Arc<MemoryFileStorage>,
}

impl TestApp {
    /// Admin mode on, no admin token, two languages, not localized.
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Build an app with extra configuration variables.
    pub async fn with_env(vars: &[(&str, &str)]) -> Self {
        let mut env: HashMap<String, String> = [
            ("DATABASE_URL", "sqlite::memory:".to_string()),
            ("TEMPLATES_DIR", workspace_dir("templates")),
            ("PAGES_DIR", workspace_dir("pages")),
            ("SITE_URL", "https://example.com".to_string()),
            ("LANGUAGES", "en,de".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (key, value) in vars {
            env.insert((*key).to_string(), (*value).to_string());
        }
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let pool = db::create_pool(&config).await.unwrap();
        let files = Arc::new(MemoryFileStorage::new("/files"));
        let storage: Arc<dyn FileStorage> = files.clone();
        let theme = Arc::new(ThemeEngine::new(&config.templates_dir).unwrap());
        let types = TypeRegistry::new(storage.clone());
        let templates = loader::load_dir(&config.pages_dir, &types).unwrap();

        let state = AppState::from_parts(config, pool, theme, storage, types, templates);
        let router = routes::app(state.clone());
        Self {
            router,
            state,
            files,
        }
    }

    pub fn pages(&self) -> &PageService {
        self.state.pages()
    }

    /// Create a draft `static` page at a fresh URL.
    pub async fn create_static(&self) -> Page {
        self.create_at(&unique_url("page"), "").await
    }

    pub async fn create_at(&self, url: &str, locale: &str) -> Page {
        self.pages()
            .create(
                ACTOR,
                NewPage {
                    url: url.to_string(),
                    locale: locale.to_string(),
                    template: "static".to_string(),
                    ..NewPage::default()
                },
            )
            .await
            .unwrap()
    }

    /// Save the heading of a `static` page.
    pub async fn save_heading(&self, id: Uuid, text: &str) {
        let submission =
            Submission::from_fields(fields(&[("basename", "heading"), ("text", text)]));
        self.pages()
            .save_section(ACTOR, id, "heading", &submission)
            .await
            .unwrap();
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_headers(&self, uri: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::get(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// POST an urlencoded form.
    pub async fn post_form(&self, uri: &str, body: &str) -> Response {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a multipart form.
    pub async fn post_multipart(&self, uri: &str, form: &MultipartBuilder) -> Response {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, form.content_type())
                .body(Body::from(form.body()))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `Location` header of a redirect.
pub fn location(response: &Response) -> String {
    assert!(
        response.status().is_redirection(),
        "expected a redirect, got {}",
        response.status()
    );
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

pub fn assert_status(response: &Response, status: StatusCode) {
    assert_eq!(response.status(), status);
}

/// `text` as Tera's HTML autoescape writes it.
pub fn escaped(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
        .replace('/', "&#x2F;")
}
