//! CMS admin routes: page listing, creation, metadata, sections, lifecycle
//! transitions, copy, history and XML interchange.
//!
//! Every handler checks the capabilities it needs on the [`Actor`]
//! installed by the admin auth middleware.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::ReferenceEntry;
use crate::error::{CmsError, CmsResult, FieldErrors};
use crate::form::{AjaxStatus, FormDescriptor, Submission};
use crate::interchange;
use crate::middleware::authenticate_admin;
use crate::models::{Page, PageFilter, PageMeta, PageState};
use crate::permissions::{Actor, Permission};
use crate::services::{NewPage, PageUpdate};
use crate::state::AppState;
use crate::theme::FormRenderer;

use super::helpers::{ADMIN_BASE, Notice, admin_context, page_url, redirect_with, render_admin};

const DEFAULT_RAWID_LIMIT: usize = 20;

fn pages_url() -> String {
    format!("{ADMIN_BASE}/pages")
}

/// Redirect with a success notice, or with an error notice when the
/// failure is something the editor can act on.
fn outcome<T>(result: CmsResult<T>, url: &str, success: &str) -> CmsResult<Response> {
    match result {
        Ok(_) => Ok(redirect_with(url, "message", success)),
        Err(e) if e.is_user_facing() => Ok(redirect_with(url, "error", &e.to_string())),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Raw list filters; empty strings mean "any".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    state: String,
    template: String,
    locale: String,
    q: String,
    page: Option<u32>,
}

impl ListQuery {
    fn filter(&self) -> PageFilter {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        PageFilter {
            state: self.state.parse::<PageState>().ok(),
            template: non_empty(&self.template),
            locale: non_empty(&self.locale),
            q: non_empty(&self.q),
        }
    }
}

/// GET /admin/cms/pages
async fn list_pages(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
    Query(notice): Query<Notice>,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;

    let pages = state
        .pages()
        .list(&query.filter(), query.page.unwrap_or(1))
        .await?;

    let mut context = admin_context(&state, &notice);
    context.insert("pages", &pages);
    context.insert("states", &PageState::ALL);
    context.insert("template_choices", &state.pages().templates().choices());
    context.insert("filter_state", &query.state);
    context.insert("filter_template", &query.template);
    context.insert("filter_locale", &query.locale);
    context.insert("q", &query.q);
    render_admin(&state, "cms/page_list.html", &context)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PageForm {
    url: String,
    locale: String,
    template: String,
    #[serde(flatten)]
    meta: PageMeta,
}

fn render_add_form(
    state: &AppState,
    form: &PageForm,
    error: Option<String>,
) -> CmsResult<Response> {
    let notice = Notice {
        message: None,
        error,
    };
    let mut context = admin_context(state, &notice);
    context.insert("form", form);
    context.insert("template_choices", &state.pages().templates().choices());
    render_admin(state, "cms/page_add.html", &context)
}

/// GET /admin/cms/pages/new
async fn add_page_form(State(state): State<AppState>, actor: Actor) -> CmsResult<Response> {
    actor.require(&[Permission::AddPage, Permission::AddPath])?;
    render_add_form(&state, &PageForm::default(), None)
}

/// POST /admin/cms/pages/new
async fn add_page_submit(
    State(state): State<AppState>,
    actor: Actor,
    Form(form): Form<PageForm>,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddPage, Permission::AddPath])?;

    let input = NewPage {
        url: form.url.clone(),
        locale: form.locale.clone(),
        template: form.template.clone(),
        meta: form.meta.clone(),
    };
    match state.pages().create(&actor.id, input).await {
        Ok(page) => Ok(redirect_with(&page_url(page.id), "message", "Page created.")),
        Err(e) if e.is_user_facing() => render_add_form(&state, &form, Some(e.to_string())),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// GET /admin/cms/pages/{id}
async fn edit_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(notice): Query<Notice>,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;
    render_edit(&state, id, &notice).await
}

async fn render_edit(state: &AppState, id: Uuid, notice: &Notice) -> CmsResult<Response> {
    let pages = state.pages();
    let page = pages.get(id).await?;
    let template = pages.template_for(&page)?;
    let sections = pages.section_overview(&page).await?;
    let done = pages.load(&page).await?.done_percent();
    let similar = pages.similar_pages(&page).await?;

    let mut context = admin_context(state, notice);
    context.insert("page", &page);
    context.insert("form", &page);
    context.insert("template_name", &template.name);
    context.insert("sections", &sections);
    context.insert("done", &done);
    context.insert("similar", &similar);
    context.insert("preview_url", &page.preview_url());
    if !page.search_image.is_empty() {
        context.insert("search_image_url", &pages.types().files().public_url(&page.search_image));
    }
    render_admin(state, "cms/page_edit.html", &context)
}

/// POST /admin/cms/pages/{id}
async fn edit_page_submit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;

    let mut submission = Submission::from_multipart(multipart).await?;
    let search_image = submission.take_file("search_image");
    let text = |name: &str| submission.field(name).unwrap_or_default().trim().to_string();
    let update = PageUpdate {
        url: text("url"),
        locale: text("locale"),
        meta: PageMeta {
            description: text("description"),
            meta_title: text("meta_title"),
            meta_description: text("meta_description"),
            meta_keywords: text("meta_keywords"),
            search_text: text("search_text"),
        },
        search_image,
        clear_search_image: submission.field("clear_search_image").is_some(),
    };

    outcome(
        state.pages().update(&actor.id, id, update).await,
        &page_url(id),
        "Page saved.",
    )
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

async fn render_section(
    state: &AppState,
    page: &Page,
    section: &str,
    form: &FormDescriptor,
    notice: &Notice,
) -> CmsResult<Response> {
    let template = state.pages().template_for(page)?;
    let info = template
        .get_section(section)
        .ok_or_else(|| CmsError::not_found(format!("section {section}")))?;
    let form_html = FormRenderer::new(state.theme()).render(form)?;

    let mut context = admin_context(state, notice);
    context.insert("page", page);
    context.insert("section", &serde_json::json!({
        "name": info.name,
        "title": info.title,
        "description": info.description,
        "done": info.done_percent(),
    }));
    context.insert("form_html", &form_html);
    render_admin(state, "cms/section_edit.html", &context)
}

/// GET /admin/cms/pages/{id}/sections/{section}
async fn edit_section(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, section)): Path<(Uuid, String)>,
    Query(notice): Query<Notice>,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddValue, Permission::ChangeValue])?;

    let page = state.pages().get(id).await?;
    let form = state.pages().section_form(&page, &section).await?;
    render_section(&state, &page, &section, &form, &notice).await
}

/// POST /admin/cms/pages/{id}/sections/{section}
async fn save_section(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, section)): Path<(Uuid, String)>,
    multipart: Multipart,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddValue, Permission::ChangeValue])?;

    let submission = Submission::from_multipart(multipart).await?;
    let ajax = submission.is_ajax();
    match state.pages().save_section(&actor.id, id, &section, &submission).await {
        Ok(_) if ajax => Ok(AjaxStatus::ok().into_response()),
        Ok(_) => Ok(redirect_with(&page_url(id), "message", "Section saved.")),
        Err(CmsError::FormValidation(errors)) if ajax => {
            Ok(AjaxStatus::from_field_errors(&errors).into_response())
        }
        Err(CmsError::FormValidation(errors)) => {
            redisplay_section(&state, id, &section, &errors).await
        }
        Err(e) if ajax && e.is_user_facing() => {
            Ok(AjaxStatus::message(e.to_string()).into_response())
        }
        Err(e) if e.is_user_facing() => Ok(redirect_with(
            &format!("{}/sections/{section}", page_url(id)),
            "error",
            &e.to_string(),
        )),
        Err(e) => Err(e),
    }
}

async fn redisplay_section(
    state: &AppState,
    id: Uuid,
    section: &str,
    errors: &FieldErrors,
) -> CmsResult<Response> {
    let page = state.pages().get(id).await?;
    let mut form = state.pages().section_form(&page, section).await?;
    form.apply_errors(errors);
    let notice = Notice {
        message: None,
        error: Some("Please correct the errors below.".into()),
    };
    render_section(state, &page, section, &form, &notice).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClearForm {
    basename: String,
    is_ajax: Option<String>,
}

/// POST /admin/cms/pages/{id}/sections/{section}/clear
async fn clear_section(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, section)): Path<(Uuid, String)>,
    Form(form): Form<ClearForm>,
) -> CmsResult<Response> {
    actor.require(&[Permission::DeleteValue])?;

    let basename = if form.basename.is_empty() {
        section.clone()
    } else {
        form.basename.clone()
    };
    if !(basename == section || basename.starts_with(&format!("{section}/"))) {
        return Err(CmsError::not_found(format!("section {basename}")));
    }

    let result = state.pages().clear_section(&actor.id, id, &basename).await;
    if form.is_ajax.is_some() {
        return match result {
            Ok(_) => Ok(AjaxStatus::ok().into_response()),
            Err(e) if e.is_user_facing() => Ok(AjaxStatus::message(e.to_string()).into_response()),
            Err(e) => Err(e),
        };
    }
    outcome(
        result,
        &format!("{}/sections/{section}", page_url(id)),
        "Values cleared.",
    )
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /admin/cms/pages/{id}/publish
async fn publish_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[
        Permission::ChangePage,
        Permission::AddRendered,
        Permission::ChangeRendered,
    ])?;
    outcome(
        state.pages().publish(&actor.id, id).await,
        &page_url(id),
        "Page published.",
    )
}

/// POST /admin/cms/pages/{id}/unpublish
async fn unpublish_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;
    outcome(
        state.pages().unpublish(&actor.id, id).await,
        &page_url(id),
        "Page unpublished.",
    )
}

/// POST /admin/cms/pages/{id}/refresh
async fn refresh_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddRendered, Permission::ChangeRendered])?;
    outcome(
        state.pages().refresh(&actor.id, id).await,
        &page_url(id),
        "Page refreshed.",
    )
}

/// POST /admin/cms/pages/{id}/delete
async fn delete_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[
        Permission::DeletePage,
        Permission::DeleteValue,
        Permission::DeleteRendered,
    ])?;
    match state.pages().delete(&actor.id, id).await {
        Ok(()) => Ok(redirect_with(&pages_url(), "message", "Page deleted.")),
        Err(e) if e.is_user_facing() => Ok(redirect_with(&page_url(id), "error", &e.to_string())),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Copy
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CopyForm {
    url: String,
    locale: String,
}

async fn render_copy(
    state: &AppState,
    page: &Page,
    form: &CopyForm,
    error: Option<String>,
) -> CmsResult<Response> {
    let notice = Notice {
        message: None,
        error,
    };
    let mut context = admin_context(state, &notice);
    context.insert("page", page);
    context.insert("form", form);
    render_admin(state, "cms/page_copy.html", &context)
}

/// GET /admin/cms/pages/{id}/copy
async fn copy_page_form(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddPage, Permission::AddPath])?;
    let page = state.pages().get(id).await?;
    let form = CopyForm {
        url: page.url.clone(),
        locale: page.locale.clone(),
    };
    render_copy(&state, &page, &form, None).await
}

/// POST /admin/cms/pages/{id}/copy
async fn copy_page_submit(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Form(form): Form<CopyForm>,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddPage, Permission::AddPath])?;
    match state.pages().copy(&actor.id, id, &form.url, &form.locale).await {
        Ok(copy) => Ok(redirect_with(&page_url(copy.id), "message", "Page copied.")),
        Err(e) if e.is_user_facing() => {
            let page = state.pages().get(id).await?;
            render_copy(&state, &page, &form, Some(e.to_string())).await
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// GET /admin/cms/pages/{id}/history
async fn page_history(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;
    let page = state.pages().get(id).await?;
    let entries = state.pages().history(id).await?;

    let mut context = admin_context(&state, &Notice::default());
    context.insert("page", &page);
    context.insert("entries", &entries);
    render_admin(&state, "cms/page_history.html", &context)
}

// ---------------------------------------------------------------------------
// XML interchange
// ---------------------------------------------------------------------------

/// GET /admin/cms/pages/{id}/export
async fn export_page(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> CmsResult<Response> {
    actor.require(&[Permission::ChangePage])?;
    let (page, xml) = state.pages().export_xml(id).await?;
    let file_name = interchange::export_file_name(&page.url);
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        xml,
    )
        .into_response())
}

fn render_import(state: &AppState, error: Option<String>) -> CmsResult<Response> {
    let notice = Notice {
        message: None,
        error,
    };
    render_admin(state, "cms/page_import.html", &admin_context(state, &notice))
}

/// GET /admin/cms/import
async fn import_form(State(state): State<AppState>, actor: Actor) -> CmsResult<Response> {
    actor.require(&[Permission::AddPath, Permission::AddPage, Permission::AddValue])?;
    render_import(&state, None)
}

/// POST /admin/cms/import
///
/// Accepts the document as an uploaded `file` or a pasted `xml` field.
async fn import_submit(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> CmsResult<Response> {
    actor.require(&[Permission::AddPath, Permission::AddPage, Permission::AddValue])?;

    let submission = Submission::from_multipart(multipart).await?;
    let xml = match (submission.file("file"), submission.field("xml")) {
        (Some(upload), _) => String::from_utf8(upload.data.clone())
            .map_err(|_| CmsError::Validation("Malformed XML: not UTF-8 text".into())),
        (None, Some(text)) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(CmsError::Validation("This field is required.".into())),
    };

    let result = match xml {
        Ok(xml) => state.pages().import_xml(&actor.id, &xml).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(page) => Ok(redirect_with(&page_url(page.id), "message", "Page imported.")),
        Err(e) if e.is_user_facing() => render_import(&state, Some(e.to_string())),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Reference search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIdQuery {
    #[serde(rename = "type")]
    kind: String,
    q: String,
    limit: Option<usize>,
}

/// GET /admin/cms/rawid?type=...&q=...
async fn rawid_search(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RawIdQuery>,
) -> CmsResult<Json<Vec<ReferenceEntry>>> {
    actor.require(&[Permission::ChangeValue])?;
    let lookup = state
        .pages()
        .types()
        .lookup(&query.kind.to_lowercase())
        .ok_or_else(|| CmsError::not_found(format!("reference type {}", query.kind)))?;
    Ok(Json(lookup.search(
        &query.q,
        query.limit.unwrap_or(DEFAULT_RAWID_LIMIT),
    )))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

async fn admin_index() -> Redirect {
    Redirect::to(&pages_url())
}

/// Create the CMS admin router, guarded by [`authenticate_admin`].
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(ADMIN_BASE, get(admin_index))
        .route(&format!("{ADMIN_BASE}/pages"), get(list_pages))
        .route(
            &format!("{ADMIN_BASE}/pages/new"),
            get(add_page_form).post(add_page_submit),
        )
        .route(
            &format!("{ADMIN_BASE}/pages/{{id}}"),
            get(edit_page).post(edit_page_submit),
        )
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/history"), get(page_history))
        .route(
            &format!("{ADMIN_BASE}/pages/{{id}}/copy"),
            get(copy_page_form).post(copy_page_submit),
        )
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/publish"), post(publish_page))
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/unpublish"), post(unpublish_page))
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/refresh"), post(refresh_page))
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/delete"), post(delete_page))
        .route(&format!("{ADMIN_BASE}/pages/{{id}}/export"), get(export_page))
        .route(
            &format!("{ADMIN_BASE}/pages/{{id}}/sections/{{section}}"),
            get(edit_section).post(save_section),
        )
        .route(
            &format!("{ADMIN_BASE}/pages/{{id}}/sections/{{section}}/clear"),
            post(clear_section),
        )
        .route(
            &format!("{ADMIN_BASE}/import"),
            get(import_form).post(import_submit),
        )
        .route(&format!("{ADMIN_BASE}/rawid"), get(rawid_search))
        .route_layer(middleware::from_fn_with_state(state, authenticate_admin))
}
