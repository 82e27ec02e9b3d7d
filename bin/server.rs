// Consumer Deduplication Engine - Web Server
// JSON API over the resolver and merge workflow

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use consumer_dedup::{
    run_batch, CustomerFields, DraftAction, DuplicateResolver, MergeError, MergeWorkflow,
    RecordFilter, RecordStore, RecordType, ResolutionChoice, ScoredDuplicate, SqliteStore,
    StoreError, SubmitOutcome, ThresholdConfig,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    defaults: ThresholdConfig,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn merge_error_response(e: MergeError) -> axum::response::Response {
    let status = match &e {
        MergeError::EmptyDraft | MergeError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        MergeError::DuplicateCheck(_) => StatusCode::SERVICE_UNAVAILABLE,
        MergeError::Store(store) => error_status(store),
    };
    (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(flatten)]
    fields: CustomerFields,

    /// Per-request threshold overrides; omitted fields use server defaults.
    #[serde(default)]
    settings: Option<ThresholdConfig>,
}

#[derive(Deserialize)]
struct CustomerSubmission {
    #[serde(flatten)]
    fields: CustomerFields,

    #[serde(default)]
    settings: Option<ThresholdConfig>,

    /// Answer to a previous duplicate prompt. The flow is stateless: the
    /// client resubmits the same draft together with its chosen resolution.
    #[serde(default)]
    resolution: Option<ResolutionChoice>,
}

#[derive(Serialize)]
struct DuplicatePrompt {
    needs_confirmation: bool,
    duplicates: Vec<ScoredDuplicate>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_list_limit")]
    limit: usize,

    record_type: Option<String>,
}

fn default_list_limit() -> usize {
    100
}

#[derive(Serialize)]
struct StatsResponse {
    total: usize,
    originals: usize,
    duplicates: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Record counts by type
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let counts = (|| -> Result<StatsResponse, StoreError> {
        Ok(StatsResponse {
            total: store.count(RecordFilter::All)?,
            originals: store.count(RecordFilter::ByType(RecordType::Original))?,
            duplicates: store.count(RecordFilter::ByType(RecordType::Duplicate))?,
        })
    })();

    match counts {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::<StatsResponse>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/customers - Browse records
async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let filter = match params.record_type.as_deref() {
        None => RecordFilter::All,
        Some(raw) => match RecordType::parse(raw) {
            Some(t) => RecordFilter::ByType(t),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::err(format!(
                        "unknown record_type: {}",
                        raw
                    ))),
                )
                    .into_response()
            }
        },
    };

    match store.list(filter, params.limit) {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::ok(records))).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/customers/:id - Fetch one record
async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.find_by_id(&id) {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::err(format!("no record with id {}", id))),
        )
            .into_response(),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/customers/:id/duplicates - Duplicates of an existing record
async fn get_customer_duplicates(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let record = match store.find_by_id(&id) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::err(format!("no record with id {}", id))),
            )
                .into_response()
        }
        Err(e) => {
            return (
                error_status(&e),
                Json(ApiResponse::<()>::err(e.to_string())),
            )
                .into_response()
        }
    };

    let settings = state.defaults.clone();
    let resolver = DuplicateResolver::new(&*store);
    match resolver.resolve(
        &record.fields.searchable(),
        Some(&id),
        &settings,
        settings.max_results,
    ) {
        Ok(duplicates) => (StatusCode::OK, Json(ApiResponse::ok(duplicates))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// POST /api/search - Duplicates for an ad-hoc partial customer
async fn search_customers(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let settings = request.settings.unwrap_or_else(|| state.defaults.clone());
    let resolver = DuplicateResolver::new(&*store);
    match resolver.resolve(&request.fields, None, &settings, settings.max_results) {
        Ok(duplicates) => (StatusCode::OK, Json(ApiResponse::ok(duplicates))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// POST /api/customers - Create with the duplicate confirmation flow
async fn create_customer(
    State(state): State<AppState>,
    Json(submission): Json<CustomerSubmission>,
) -> impl IntoResponse {
    submit_draft(&state, submission, None)
}

/// PUT /api/customers/:id - Update with the duplicate confirmation flow
async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(submission): Json<CustomerSubmission>,
) -> impl IntoResponse {
    submit_draft(&state, submission, Some(id))
}

/// Shared submit/confirm path for create and update. One workflow per
/// request; a confirmation round trip replays the draft with a resolution.
fn submit_draft(
    state: &AppState,
    submission: CustomerSubmission,
    existing_id: Option<String>,
) -> axum::response::Response {
    let store = state.store.lock().unwrap();
    let settings = submission.settings.unwrap_or_else(|| state.defaults.clone());

    let action = match existing_id {
        None => DraftAction::Create {
            fields: submission.fields,
        },
        Some(id) => DraftAction::Update {
            id,
            fields: submission.fields,
        },
    };

    let mut workflow = MergeWorkflow::new(&*store, settings).with_actor("api");
    let outcome = match workflow.submit(action) {
        Ok(outcome) => outcome,
        Err(e) => return merge_error_response(e),
    };

    match outcome {
        SubmitOutcome::Resolved(resolved) => {
            (StatusCode::OK, Json(ApiResponse::ok(resolved))).into_response()
        }
        SubmitOutcome::AwaitingConfirmation { duplicates } => match submission.resolution {
            None => (
                StatusCode::CONFLICT,
                Json(ApiResponse::ok(DuplicatePrompt {
                    needs_confirmation: true,
                    duplicates,
                })),
            )
                .into_response(),
            Some(choice) => match workflow.confirm(choice) {
                Ok(resolved) => {
                    (StatusCode::OK, Json(ApiResponse::ok(resolved))).into_response()
                }
                Err(e) => merge_error_response(e),
            },
        },
    }
}

/// POST /api/batch - Run the full deduplication sweep
async fn run_batch_report(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match run_batch(&*store, &state.defaults) {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Consumer Deduplication Engine - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::var("DEDUP_DB").unwrap_or_else(|_| "customers.db".to_string());
    let store = SqliteStore::open(&db_path).expect("Failed to open database");
    println!("✓ Database opened: {}", db_path);

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        defaults: ThresholdConfig::default(),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/customers", get(list_customers))
        .route("/customers", post(create_customer))
        .route("/customers/:id", get(get_customer))
        .route("/customers/:id", put(update_customer))
        .route("/customers/:id/duplicates", get(get_customer_duplicates))
        .route("/search", post(search_customers))
        .route("/batch", post(run_batch_report))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let port = std::env::var("PORT").unwrap_or_else(|_| "6000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:{}", port);
    println!("   API: http://localhost:{}/api/customers", port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
