//! Webhook listener for event-driven story ingestion.
//!
//! Hosts the same trigger contract as the `issue-event` subcommand as a
//! long-running HTTP surface: GitHub posts the `issues` payload here and
//! labeled openings run the pipeline.

use std::path::PathBuf;
use std::sync::Mutex;

use actix_http::body::MessageBody;
use actix_service::ServiceFactory;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{post, web, App, Error, HttpResponse, HttpServer, Responder};
use serde_json::json;
use tracing_actix_web::TracingLogger;

use crate::pipeline::{self, Config, Outcome};
use crate::trigger::{self, IssuesEvent};

/// Global state shared by the webhook routes.
pub struct AppState {
    /// Path to the repository containing the story document.
    pub repo_path: PathBuf,
    /// Pipeline configuration.
    pub config: Config,
    /// Serializes pipeline runs. The remote branch is the only resource
    /// shared between runs, and concurrent pushes race.
    pub run_lock: Mutex<()>,
}

/// Receive a GitHub `issues` event and run the ingestion pipeline.
///
/// Events that do not open a labeled issue answer 204 without touching
/// the repository. Invalid labeled events answer 422. Pipeline failures
/// answer 500 with the error text.
#[post("/events/issues")]
async fn issues_event(
    event: web::Json<IssuesEvent>,
    data: web::Data<AppState>,
) -> impl Responder {
    let event = event.into_inner();
    let resolved = match trigger::resolve_issue_event(&event, &data.config) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::error!("Rejecting issues event: {err:?}");
            return HttpResponse::UnprocessableEntity().body(err.to_string());
        }
    };
    let Some((record, options)) = resolved else {
        return HttpResponse::NoContent().finish();
    };

    let state = data.clone();
    let result = web::block(move || {
        let guard = match state.run_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let outcome = pipeline::run(&state.repo_path, &state.config, &record, &options);
        drop(guard);
        outcome
    })
    .await;

    match result {
        Ok(Ok(Outcome::Committed(commit))) => HttpResponse::Ok().json(json!({
            "outcome": "committed",
            "commit": commit.to_string(),
        })),
        Ok(Ok(Outcome::NoChanges)) => HttpResponse::Ok().json(json!({
            "outcome": "no-changes",
        })),
        Ok(Err(err)) => {
            tracing::error!("Pipeline run failed: {err:?}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
        Err(err) => {
            tracing::error!("Pipeline task failed: {err:?}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Build the actix app with all chronicle routes registered.
pub fn init_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Response = ServiceResponse<impl MessageBody>,
        Config = (),
        InitError = (),
        Error = Error,
    >,
> {
    App::new()
        .wrap(TracingLogger::default())
        .app_data(state)
        .service(issues_event)
}

/// Serve the chronicle webhook listener.
///
/// # Errors
///
/// Will return `Err` if the listener cannot bind or the server fails.
#[actix_web::main]
pub async fn serve(repo_path: PathBuf, config: Config, port: u16) -> std::io::Result<()> {
    let bind = "127.0.0.1";
    tracing::info!(
        "Running chronicle listener for `{}` on http://{bind}:{port}.",
        repo_path.display()
    );
    let state = web::Data::new(AppState {
        repo_path,
        config,
        run_lock: Mutex::new(()),
    });
    HttpServer::new(move || init_app(state.clone()))
        .bind((bind, port))?
        .run()
        .await
}
