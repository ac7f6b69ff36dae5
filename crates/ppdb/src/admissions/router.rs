use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::clock::Clock;
use super::descriptor::REGISTRATION_FIELDS;
use super::domain::{RegistrantDetails, RegistrationId, RegistrationStatus};
use super::error::ServiceError;
use super::fees::{FeeCatalogService, FeeDraft, FeeEntryId};
use super::lifecycle::BulkStatusRequest;
use super::query::RegistrationQuery;
use super::report::AdmissionsSummary;
use super::repository::{FeeCatalogRepository, RegistrationRepository};
use super::service::RegistrationService;
use super::validation::ValidationErrors;

const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Shared handler state: both services plus the clock used for defaults.
pub struct AdmissionsState<R, F> {
    pub registrations: Arc<RegistrationService<R>>,
    pub fees: Arc<FeeCatalogService<F>>,
    pub clock: Arc<dyn Clock>,
}

impl<R, F> Clone for AdmissionsState<R, F> {
    fn clone(&self) -> Self {
        Self {
            registrations: Arc::clone(&self.registrations),
            fees: Arc::clone(&self.fees),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Router exposing registration intake, review and the fee catalog.
pub fn admissions_router<R, F>(state: AdmissionsState<R, F>) -> Router
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/admissions/registrations",
            post(submit_handler::<R, F>).get(list_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/registrations/majors",
            get(majors_handler::<R, F>),
        )
        .route("/api/v1/admissions/registrations/schema", get(schema_handler))
        .route(
            "/api/v1/admissions/registrations/search",
            get(search_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/registrations/bulk-status",
            post(bulk_status_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/registrations/:id",
            get(view_handler::<R, F>)
                .put(update_handler::<R, F>)
                .delete(delete_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/registrations/:id/status",
            put(status_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/registrations/:id/print",
            get(print_handler::<R, F>),
        )
        .route("/api/v1/admissions/summary", get(summary_handler::<R, F>))
        .route(
            "/api/v1/admissions/academic-years",
            get(list_years_handler::<R, F>).post(create_year_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/academic-years/:year",
            get(year_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/academic-years/:year/fees",
            post(add_fee_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/academic-years/:year/fees/order",
            put(reorder_fees_handler::<R, F>),
        )
        .route(
            "/api/v1/admissions/academic-years/:year/fees/:fee_id",
            put(update_fee_handler::<R, F>).delete(remove_fee_handler::<R, F>),
        )
        .with_state(state)
}

/// Maps a service failure onto its HTTP status and JSON payload.
pub(crate) fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(errors) => {
            let payload = json!({
                "error": errors.to_string(),
                "fields": errors.errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        ServiceError::NotFound { .. } => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        ServiceError::Conflict(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        ServiceError::Permission(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::FORBIDDEN, Json(payload)).into_response()
        }
        ServiceError::Repository(_) => {
            error!(error = %err, "admissions store failure");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

/// JSON request body whose rejections share the service error payload.
///
/// Bodies that parse but do not fit the target type answer 422 with a
/// `fields` list; other rejections keep their status and carry `error`.
pub(crate) struct JsonBody<T>(pub(crate) T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_response(rejection)),
        }
    }
}

pub(crate) fn rejection_response(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::JsonDataError(err) => error_response(ServiceError::Validation(
            ValidationErrors::single("body", err.body_text()),
        )),
        other => {
            let payload = json!({ "error": other.body_text() });
            (other.status(), Json(payload)).into_response()
        }
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    JsonBody(details): JsonBody<RegistrantDetails>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let today = state.clock.today();
    let result = state
        .registrations
        .submit(details)
        .map(|record| record.view(today));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Query(query): Query<RegistrationQuery>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.registrations.list_views(&query))
}

pub(crate) async fn majors_handler<R, F>(State(state): State<AdmissionsState<R, F>>) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.registrations.distinct_majors())
}

pub(crate) async fn schema_handler() -> Response {
    (StatusCode::OK, Json(REGISTRATION_FIELDS)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<u32>,
}

pub(crate) async fn search_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    respond(StatusCode::OK, state.registrations.search(&params.q, limit))
}

pub(crate) async fn bulk_status_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    JsonBody(request): JsonBody<BulkStatusRequest>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let report = state
        .registrations
        .bulk_set_status(&request.ids, request.status);
    (StatusCode::OK, Json(report)).into_response()
}

pub(crate) async fn view_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(id): Path<u64>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.registrations.view(RegistrationId(id)))
}

pub(crate) async fn update_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(id): Path<u64>,
    JsonBody(details): JsonBody<RegistrantDetails>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let today = state.clock.today();
    let result = state
        .registrations
        .update(RegistrationId(id), details)
        .map(|record| record.view(today));
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(id): Path<u64>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    match state.registrations.delete(RegistrationId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    status: RegistrationStatus,
}

pub(crate) async fn status_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(id): Path<u64>,
    JsonBody(change): JsonBody<StatusChange>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let result = state
        .registrations
        .set_status(RegistrationId(id), change.status)
        .map(|transition| {
            json!({
                "transition": transition,
                "flagged": transition.is_flagged(),
                "reopened": transition.reopened(),
            })
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn print_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(id): Path<u64>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.registrations.print_view(RegistrationId(id)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SummaryParams {
    year: Option<i32>,
    income_status: Option<RegistrationStatus>,
}

pub(crate) async fn summary_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Query(params): Query<SummaryParams>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let year = params.year.unwrap_or_else(|| state.clock.today().year());
    let result = AdmissionsSummary::collect(
        &state.registrations,
        &state.fees,
        year,
        params.income_status,
    );
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_years_handler<R, F>(State(state): State<AdmissionsState<R, F>>) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.fees.list_years())
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewAcademicYear {
    academic_year: i32,
}

pub(crate) async fn create_year_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    JsonBody(request): JsonBody<NewAcademicYear>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let result = state
        .fees
        .create_year(request.academic_year)
        .map(|year| year.view());
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn year_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(year): Path<i32>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.fees.get_year(year).map(|year| year.view()))
}

pub(crate) async fn add_fee_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(year): Path<i32>,
    JsonBody(draft): JsonBody<FeeDraft>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::CREATED, state.fees.add_fee(year, draft))
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeeOrder {
    fee_ids: Vec<FeeEntryId>,
}

pub(crate) async fn reorder_fees_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path(year): Path<i32>,
    JsonBody(order): JsonBody<FeeOrder>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(StatusCode::OK, state.fees.reorder_fees(year, &order.fee_ids))
}

pub(crate) async fn update_fee_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path((year, fee_id)): Path<(i32, u32)>,
    JsonBody(draft): JsonBody<FeeDraft>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    respond(
        StatusCode::OK,
        state.fees.update_fee(year, FeeEntryId(fee_id), draft),
    )
}

pub(crate) async fn remove_fee_handler<R, F>(
    State(state): State<AdmissionsState<R, F>>,
    Path((year, fee_id)): Path<(i32, u32)>,
) -> Response
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    match state.fees.remove_fee(year, FeeEntryId(fee_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
