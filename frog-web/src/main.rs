//! Fachada HTTP Axum sobre o cliente do Frog: anotação de texto e de XML.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use frog_core::{to_bio, tokenize, FrogClient, FrogError, Span, XmlOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Estado compartilhado da aplicação
struct AppState {
    client: FrogClient,
}

#[derive(Deserialize)]
struct TagRequest {
    text: String,
}

#[derive(Serialize)]
struct TagResponse {
    entities: Vec<Span>,
    bio: Vec<Span>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        )
        .init();

    let frog_host = std::env::var("FROG_HOST").unwrap_or_else(|_| "localhost".to_string());
    let frog_port: u16 = std::env::var("FROG_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9999);
    let bind = std::env::var("BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let state = Arc::new(AppState {
        client: FrogClient::new(frog_host.clone(), frog_port),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tag", post(tag_handler))
        .route("/xml", post(xml_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await.unwrap();
    info!("servidor no ar em http://{bind}, Frog em {frog_host}:{frog_port}");
    axum::serve(listener, app).await.unwrap();
}

/// Anota texto puro: tokeniza, consulta o Frog e devolve os spans de
/// entidade mais a sequência BIO completa.
async fn tag_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TagRequest>,
) -> Response {
    if req.text.trim().is_empty() {
        return bad_request("empty text");
    }

    let state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let tokens = tokenize(&req.text);
        let entities = state.client.apply_tokens(&req.text, &tokens)?;
        let bio = to_bio(&entities, &tokens)?;
        Ok::<_, FrogError>(TagResponse { entities, bio })
    })
    .await;

    match result {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_err) => {
            error!("tarefa de anotação abortada: {join_err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Anota um documento XML: o corpo é o pedido completo (documento, XPath,
/// nomes de milestone) e a resposta é o documento anotado, como XML.
async fn xml_handler(
    State(state): State<Arc<AppState>>,
    Json(options): Json<XmlOptions>,
) -> Response {
    let state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || state.client.apply_xml(&options)).await;

    match result {
        Ok(Ok(xml)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            xml,
        )
            .into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_err) => {
            error!("tarefa de anotação abortada: {join_err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Erros de entrada são culpa do cliente HTTP; falhas de transporte ou de
/// protocolo com o Frog são um gateway ruim.
fn error_response(err: FrogError) -> Response {
    let status = match err {
        FrogError::InvalidInput(_) | FrogError::Xml(_) | FrogError::XPath(_) => {
            StatusCode::BAD_REQUEST
        }
        FrogError::Transport(_) | FrogError::Protocol(_) => StatusCode::BAD_GATEWAY,
        FrogError::OutOfRange | FrogError::OverlappingEntities => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status == StatusCode::BAD_GATEWAY {
        error!("falha ao consultar o Frog: {err}");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}
