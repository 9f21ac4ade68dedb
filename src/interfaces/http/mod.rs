use crate::application::use_cases::transfer::{
    auto_map_headers, export_file_name, export_records, import_test_cases, template_csv, to_csv,
};
use crate::application::{ExecutionEngine, WorkbookHandle};
use crate::domain::error::{AppError, Result};
use crate::domain::run::{EngineStatus, SimulationConfig, TestProgress};
use crate::domain::test_case::{Feedback, NewTestCase, TestCasePatch};
use crate::domain::transfer::{AutoGenerateConfig, ColumnMapping};
use crate::domain::view::{FilterConfig, SortConfig, ViewState};
use crate::domain::worksheet::{ColumnType, CustomColumnPatch};
use crate::infrastructure::config::ServerConfig;
use actix_cors::Cors;
use actix_web::{
    delete, dev::Server, get, http::header, patch, post, put, web, App, HttpResponse, HttpServer,
    Responder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct HttpState {
    pub engine: Arc<ExecutionEngine>,
}

impl HttpState {
    fn workbook(&self) -> &WorkbookHandle {
        self.engine.workbook()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorksheetRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameWorksheetRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub source_index: usize,
    pub dest_index: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub ids: Vec<String>,
    pub target_worksheet_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub mapping: Vec<ColumnMapping>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMapRequest {
    pub headers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersRequest {
    pub filters: Vec<FilterConfig>,
}

/// `null` clears the sort.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRequest {
    #[serde(default)]
    pub sort: Option<SortConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Defaults to every row of the active worksheet.
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub config: Option<SimulationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStateResponse {
    pub progress: TestProgress,
    pub status: EngineStatus,
}

pub fn error_response(err: &AppError) -> HttpResponse {
    match err {
        AppError::NotFound(_) => HttpResponse::NotFound().body(err.to_string()),
        AppError::ValidationError(_) => HttpResponse::BadRequest().body(err.to_string()),
        AppError::Conflict(_) => HttpResponse::Conflict().body(err.to_string()),
        _ => {
            error!(error = %err, "Request failed");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

fn respond<T: Serialize>(result: Result<T>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(&e),
    }
}

fn csv_response(result: Result<String>, file_name: &str) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ))
            .body(body),
        Err(e) => error_response(&e),
    }
}

// Workbook and worksheets

#[get("/workbook")]
async fn get_workbook(data: web::Data<HttpState>) -> impl Responder {
    respond(data.workbook().with(|wb| wb.snapshot()).await)
}

#[post("/worksheets")]
async fn create_worksheet(
    data: web::Data<HttpState>,
    req: web::Json<CreateWorksheetRequest>,
) -> impl Responder {
    let name = req.into_inner().name;
    respond(data.workbook().with(move |wb| wb.create_worksheet(name)).await)
}

#[patch("/worksheets/{id}")]
async fn rename_worksheet(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<RenameWorksheetRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let name = req.into_inner().name;
    respond(
        data.workbook()
            .try_with(move |wb| wb.rename_worksheet(&id, name))
            .await,
    )
}

#[post("/worksheets/{id}/duplicate")]
async fn duplicate_worksheet(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| wb.duplicate_worksheet(&id))
            .await,
    )
}

#[delete("/worksheets/{id}")]
async fn delete_worksheet(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data
        .workbook()
        .try_with(move |wb| wb.delete_worksheet(&id))
        .await
    {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => HttpResponse::Conflict().body("Cannot delete the last worksheet"),
        Err(e) => error_response(&e),
    }
}

#[post("/worksheets/{id}/activate")]
async fn activate_worksheet(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| {
                wb.set_active(&id)?;
                Ok(wb.snapshot())
            })
            .await,
    )
}

// Test cases

#[get("/test-cases")]
async fn list_test_cases(data: web::Data<HttpState>) -> impl Responder {
    respond(
        data.workbook()
            .with(|wb| wb.current_view().as_ref().clone())
            .await,
    )
}

#[put("/view")]
async fn set_view(data: web::Data<HttpState>, req: web::Json<ViewState>) -> impl Responder {
    let view = req.into_inner();
    respond(
        data.workbook()
            .with(move |wb| {
                wb.set_view(view);
                wb.current_view().as_ref().clone()
            })
            .await,
    )
}

#[put("/view/search")]
async fn set_search(data: web::Data<HttpState>, req: web::Json<SearchRequest>) -> impl Responder {
    let query = req.into_inner().query;
    respond(
        data.workbook()
            .with(move |wb| {
                wb.set_search_query(query);
                wb.current_view().as_ref().clone()
            })
            .await,
    )
}

#[put("/view/filters")]
async fn set_filters(data: web::Data<HttpState>, req: web::Json<FiltersRequest>) -> impl Responder {
    let filters = req.into_inner().filters;
    respond(
        data.workbook()
            .with(move |wb| {
                wb.set_filters(filters);
                wb.current_view().as_ref().clone()
            })
            .await,
    )
}

#[put("/view/sort")]
async fn set_sort(data: web::Data<HttpState>, req: web::Json<SortRequest>) -> impl Responder {
    let sort = req.into_inner().sort;
    respond(
        data.workbook()
            .with(move |wb| {
                wb.set_sort(sort);
                wb.current_view().as_ref().clone()
            })
            .await,
    )
}

#[post("/test-cases")]
async fn add_test_case(data: web::Data<HttpState>, req: web::Json<NewTestCase>) -> impl Responder {
    let input = req.into_inner();
    respond(data.workbook().try_with(move |wb| wb.cases().add(input)).await)
}

#[patch("/test-cases/{id}")]
async fn update_test_case(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<TestCasePatch>,
) -> impl Responder {
    let id = path.into_inner();
    let patch = req.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| wb.cases().update(&id, patch))
            .await,
    )
}

#[post("/test-cases/delete")]
async fn delete_test_cases(data: web::Data<HttpState>, req: web::Json<IdsRequest>) -> impl Responder {
    let ids = req.into_inner().ids;
    respond(
        data.workbook()
            .with(move |wb| CountResponse {
                count: wb.cases().delete(&ids).len(),
            })
            .await,
    )
}

#[post("/test-cases/duplicate")]
async fn duplicate_test_cases(
    data: web::Data<HttpState>,
    req: web::Json<IdsRequest>,
) -> impl Responder {
    let ids = req.into_inner().ids;
    respond(data.workbook().with(move |wb| wb.cases().duplicate(&ids)).await)
}

#[post("/test-cases/reorder")]
async fn reorder_test_cases(
    data: web::Data<HttpState>,
    req: web::Json<ReorderRequest>,
) -> impl Responder {
    let ReorderRequest {
        source_index,
        dest_index,
    } = req.into_inner();
    match data
        .workbook()
        .try_with(move |wb| wb.cases().reorder(source_index, dest_index))
        .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

#[post("/test-cases/{id}/feedback")]
async fn give_feedback(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<FeedbackRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let feedback = req.into_inner().feedback;
    respond(
        data.workbook()
            .try_with(move |wb| {
                wb.cases_for_row(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?
                    .give_feedback(&id, feedback)
            })
            .await,
    )
}

#[post("/test-cases/move")]
async fn move_test_cases(data: web::Data<HttpState>, req: web::Json<MoveRequest>) -> impl Responder {
    let MoveRequest {
        ids,
        target_worksheet_id,
    } = req.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| {
                let count = wb.move_test_cases(&ids, &target_worksheet_id)?;
                Ok(CountResponse { count })
            })
            .await,
    )
}

#[post("/test-cases/reset")]
async fn reset_results(data: web::Data<HttpState>, req: web::Json<IdsRequest>) -> impl Responder {
    let ids = req.into_inner().ids;
    respond(
        data.workbook()
            .with(move |wb| CountResponse {
                count: wb.cases().reset_results(&ids),
            })
            .await,
    )
}

#[post("/test-cases/import")]
async fn import_rows(data: web::Data<HttpState>, req: web::Json<ImportRequest>) -> impl Responder {
    let ImportRequest { mapping, rows } = req.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| import_test_cases(&mut wb.cases(), &mapping, &rows))
            .await,
    )
}

#[post("/test-cases/import/auto-map")]
async fn auto_map(req: web::Json<AutoMapRequest>) -> impl Responder {
    HttpResponse::Ok().json(auto_map_headers(&req.headers))
}

#[post("/test-cases/generate")]
async fn generate_test_cases(
    data: web::Data<HttpState>,
    req: web::Json<AutoGenerateConfig>,
) -> impl Responder {
    respond(data.engine.generate_test_cases(req.into_inner()).await)
}

#[post("/test-cases/sample")]
async fn load_sample_data(data: web::Data<HttpState>) -> impl Responder {
    respond(
        data.engine
            .load_sample_data()
            .await
            .map(|count| CountResponse { count }),
    )
}

#[get("/test-cases/export")]
async fn export_csv(data: web::Data<HttpState>) -> impl Responder {
    let exported = data
        .workbook()
        .with(|wb| {
            let name = export_file_name(&wb.active().name);
            (name, export_records(&wb.current_view()))
        })
        .await;
    match exported {
        Ok((name, records)) => csv_response(to_csv(&records), &name),
        Err(e) => error_response(&e),
    }
}

#[get("/test-cases/template")]
async fn import_template() -> impl Responder {
    csv_response(template_csv(), "test-cases-template.csv")
}

// Custom columns

#[post("/columns")]
async fn add_column(data: web::Data<HttpState>, req: web::Json<AddColumnRequest>) -> impl Responder {
    let AddColumnRequest {
        name,
        column_type,
        options,
    } = req.into_inner();
    respond(
        data.workbook()
            .with(move |wb| wb.add_column(name, column_type, options))
            .await,
    )
}

#[patch("/columns/{id}")]
async fn update_column(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<CustomColumnPatch>,
) -> impl Responder {
    let id = path.into_inner();
    let patch = req.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| wb.update_column(&id, patch))
            .await,
    )
}

#[delete("/columns/{id}")]
async fn delete_column(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    respond(data.workbook().try_with(move |wb| wb.delete_column(&id)).await)
}

#[post("/columns/{id}/duplicate")]
async fn duplicate_column(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    respond(
        data.workbook()
            .try_with(move |wb| wb.duplicate_column(&id))
            .await,
    )
}

// Runs

/// The batch slot is claimed before responding, so a concurrent start gets
/// 409 and a stop sent right after the 202 applies to this batch.
#[post("/runs")]
async fn start_batch(data: web::Data<HttpState>, req: web::Json<IdsRequest>) -> impl Responder {
    let guard = match data.engine.claim_batch() {
        Ok(guard) => guard,
        Err(e) => return error_response(&e),
    };
    let ids = req.into_inner().ids;
    let engine = Arc::clone(&data.engine);
    actix_web::rt::spawn(async move {
        if let Err(e) = engine.run_claimed_tests(guard, ids).await {
            warn!(error = %e, "Test batch failed");
        }
    });
    HttpResponse::Accepted().finish()
}

#[post("/runs/single/{id}")]
async fn run_single(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data.engine.run_test(&id).await {
        Ok(_) => {
            let row = data
                .workbook()
                .with(move |wb| wb.find_row(&id).cloned())
                .await;
            respond(row)
        }
        Err(e) => error_response(&e),
    }
}

#[post("/runs/simulation")]
async fn start_simulation(
    data: web::Data<HttpState>,
    req: web::Json<SimulationRequest>,
) -> impl Responder {
    let SimulationRequest { ids, config } = req.into_inner();
    let ids = match ids {
        Some(ids) => ids,
        None => match data
            .workbook()
            .with(|wb| {
                wb.active()
                    .test_cases
                    .iter()
                    .map(|row| row.id.clone())
                    .collect::<Vec<_>>()
            })
            .await
        {
            Ok(ids) => ids,
            Err(e) => return error_response(&e),
        },
    };
    if ids.is_empty() {
        return HttpResponse::BadRequest().body("No test cases to run the simulation on");
    }

    let claim = match data.engine.claim_simulation(config.unwrap_or_default()) {
        Ok(claim) => claim,
        Err(e) => return error_response(&e),
    };
    let engine = Arc::clone(&data.engine);
    actix_web::rt::spawn(async move {
        let result = engine
            .run_claimed_simulation(claim, ids, |pass| info!(pass, "Simulation pass complete"))
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Simulation failed");
        }
    });
    HttpResponse::Accepted().finish()
}

#[post("/runs/stop")]
async fn stop_runs(data: web::Data<HttpState>) -> impl Responder {
    data.engine.stop();
    HttpResponse::NoContent().finish()
}

#[get("/runs/progress")]
async fn run_progress(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(RunStateResponse {
        progress: data.engine.progress(),
        status: data.engine.status(),
    })
}

#[get("/runs/summary")]
async fn run_summary(data: web::Data<HttpState>) -> impl Responder {
    respond(data.workbook().with(|wb| wb.summary()).await)
}

#[get("/runs/recommendations")]
async fn recommendations(data: web::Data<HttpState>) -> impl Responder {
    respond(data.workbook().with(|wb| wb.recommendation_groups()).await)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(get_workbook)
            .service(create_worksheet)
            .service(rename_worksheet)
            .service(duplicate_worksheet)
            .service(delete_worksheet)
            .service(activate_worksheet)
            .service(list_test_cases)
            .service(set_view)
            .service(set_search)
            .service(set_filters)
            .service(set_sort)
            .service(export_csv)
            .service(import_template)
            .service(add_test_case)
            .service(delete_test_cases)
            .service(duplicate_test_cases)
            .service(reorder_test_cases)
            .service(move_test_cases)
            .service(reset_results)
            .service(import_rows)
            .service(auto_map)
            .service(generate_test_cases)
            .service(load_sample_data)
            .service(update_test_case)
            .service(give_feedback)
            .service(add_column)
            .service(update_column)
            .service(delete_column)
            .service(duplicate_column)
            .service(start_batch)
            .service(run_single)
            .service(start_simulation)
            .service(stop_runs)
            .service(run_progress)
            .service(run_summary)
            .service(recommendations),
    );
}

pub fn start_server(engine: Arc<ExecutionEngine>, config: &ServerConfig) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { engine });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run();

    info!(host = %config.host, port = config.port, "HTTP API listening");
    Ok(server)
}
