//! HTTP routes. Each handler reads the session and form, calls one `api` flow and turns
//! the result into a redirect, a JSON body or an [`AppError`].

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{info, warn};

use api::institutions::{self, JoinOutcome};
use api::profiles::{self, ProfileEdit};
use api::views::{CreateInstitutionView, IndexView, InstitutionView, LoginView, ProfileView};
use api::{auth, Error};

use crate::error::AppError;
use crate::forms::{
    required, EmailForm, LoginForm, LoginQuery, ProfileForm, RenameForm, SignUpForm, SlugForm,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
        .route("/profiles/{username}", get(show_profile).post(edit_profile))
        .route(
            "/institutions/create",
            get(create_institution_page).post(create_institution),
        )
        .route(
            "/institutions/{slug}",
            get(show_institution).post(rename_institution),
        )
        .route("/institutions/{slug}/add_user", post(add_user))
        .with_state(state)
}

/// `302 Found` to `location`.
fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

#[derive(Debug, Serialize)]
struct AddUserResponse {
    status: JoinOutcome,
}

async fn index(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<IndexView>, AppError> {
    let identity = auth::identify(&session).await;
    let view = profiles::index(state.backend.as_ref(), identity.as_ref()).await?;
    Ok(Json(view))
}

async fn login_page(session: Session, Query(query): Query<LoginQuery>) -> Response {
    if auth::identify(&session).await.is_some() {
        return found("/");
    }
    Json(LoginView { error: query.error }).into_response()
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = required(form.email, "email")?;
    let password = required(form.password, "password")?;

    match auth::sign_in(state.backend.as_ref(), &email, &password).await {
        Ok(identity) => {
            auth::remember(&session, &identity).await?;
            info!("{} signed in", identity.id);
            Ok(found("/"))
        }
        Err(Error::InvalidCredentials) => {
            warn!("Failed sign-in for {}", auth::normalize_email(&email));
            Ok(found("/login?error=invalid_credentials"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignUpForm>,
) -> Result<Response, AppError> {
    let email = required(form.email, "email")?;
    let password = required(form.password, "password")?;
    let username = required(form.username, "username")?;

    let identity = auth::sign_up(state.backend.as_ref(), &email, &password, &username).await?;
    auth::remember(&session, &identity).await?;

    Ok(found(format!("/profiles/{}", username.trim())))
}

async fn logout(session: Session) -> Result<Response, AppError> {
    auth::forget(&session).await?;
    Ok(found("/login"))
}

async fn show_profile(
    State(state): State<AppState>,
    session: Session,
    Path(username): Path<String>,
) -> Result<Json<ProfileView>, AppError> {
    let identity = auth::identify(&session).await;
    let view = profiles::view_profile(
        state.backend.as_ref(),
        identity.as_ref(),
        &username,
        state.email_visibility,
    )
    .await?;
    Ok(Json(view))
}

async fn edit_profile(
    State(state): State<AppState>,
    session: Session,
    Path(_username): Path<String>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let edit = ProfileEdit {
        profile_id: required(form.profile_id, "profile-id")?,
        first_name: required(form.first_name, "first-name")?,
        last_name: required(form.last_name, "last-name")?,
        public_fields: required(form.public_fields, "public-fields")?,
    };

    let identity = auth::identify(&session).await;
    let profile = profiles::update_profile(state.backend.as_ref(), identity.as_ref(), &edit).await?;
    Ok(found(format!("/profiles/{}", profile.username)))
}

async fn create_institution_page(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CreateInstitutionView>, AppError> {
    let identity = auth::identify(&session).await;
    let view = institutions::create_page(state.backend.as_ref(), identity.as_ref()).await?;
    Ok(Json(view))
}

async fn create_institution(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SlugForm>,
) -> Result<Response, AppError> {
    let slug = required(form.slug, "slug")?;

    let identity = auth::identify(&session).await;
    let institution =
        institutions::create_institution(state.backend.as_ref(), identity.as_ref(), &slug).await?;
    Ok(found(format!("/institutions/{}", institution.slug)))
}

async fn show_institution(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Json<InstitutionView>, AppError> {
    let identity = auth::identify(&session).await;
    let view =
        institutions::view_institution(state.backend.as_ref(), identity.as_ref(), &slug).await?;
    Ok(Json(view))
}

async fn rename_institution(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Form(form): Form<RenameForm>,
) -> Result<Response, AppError> {
    let institution_id = required(form.institution_id, "institution-id")?;
    let new_slug = required(form.slug, "slug")?;

    let identity = auth::identify(&session).await;
    let renamed = institutions::rename_institution(
        state.backend.as_ref(),
        identity.as_ref(),
        &slug,
        &institution_id,
        &new_slug,
    )
    .await?;
    Ok(found(format!("/institutions/{}", renamed.slug)))
}

async fn add_user(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Form(form): Form<EmailForm>,
) -> Result<Json<AddUserResponse>, AppError> {
    let email = required(form.email, "email")?;

    let identity = auth::identify(&session).await;
    let status =
        institutions::add_member(state.backend.as_ref(), identity.as_ref(), &slug, &email).await?;
    Ok(Json(AddUserResponse { status }))
}
