use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use mlwr_protocol::endpoints;
use mlwr_search::ObjectType;
use mlwr_types::ObjectKind;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Routes under `/api/<type>` for one object kind.
fn kind_routes(kind: ObjectKind) -> Router<AppState> {
    let create = match kind {
        ObjectKind::File => post(handler::create_file),
        ObjectKind::Config => post(handler::create_config),
        ObjectKind::TextBlob => post(handler::create_blob),
    };
    let mut routes = Router::new()
        .route(endpoints::CREATE, create)
        .route(endpoints::SEARCH, post(handler::search_objects))
        .route(endpoints::OBJECT, get(handler::get_object));
    if kind == ObjectKind::File {
        routes = routes.route(endpoints::DOWNLOAD, get(handler::download_file));
    }
    routes
        .layer(Extension(kind))
        .layer(Extension(ObjectType::from(kind)))
}

/// Build the axum router with all MLWR endpoints.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size;
    let mut router = Router::new()
        .route(endpoints::HEALTH, get(handler::health))
        .route(endpoints::INFO, get(handler::info))
        .route(endpoints::REMOTES, get(handler::list_remotes))
        .route(endpoints::REMOTE_PULL, post(handler::remote_pull))
        .route(endpoints::REMOTE_PUSH, post(handler::remote_push))
        .nest(
            &endpoints::type_prefix("object"),
            Router::new()
                .route(endpoints::SEARCH, post(handler::search_objects))
                .layer(Extension(ObjectType::Object)),
        );
    for kind in [ObjectKind::File, ObjectKind::Config, ObjectKind::TextBlob] {
        router = router.nest(&endpoints::type_prefix(kind.endpoint()), kind_routes(kind));
    }
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
