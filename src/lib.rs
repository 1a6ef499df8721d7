pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod delta;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;
pub mod store;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    redis::RedisClient,
    services::{interaction_service::InteractionService, vote_service::VoteService},
    store::VoteStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VoteStore>,
    pub votes: Arc<VoteService>,
    pub interactions: Arc<InteractionService>,
    pub redis: Arc<RedisClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn VoteStore>, redis: Arc<RedisClient>, config: Arc<Config>) -> Self {
        let votes = Arc::new(VoteService::new(store.clone(), config.engine.clone()));
        let interactions = Arc::new(InteractionService::new(
            store.clone(),
            config.engine.clone(),
        ));

        Self {
            store,
            votes,
            interactions,
            redis,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    // All routes require an authenticated caller
    let item_routes = Router::new()
        .route(
            "/api/items/{item_type}/{item_id}/vote",
            post(handlers::votes::cast_vote),
        )
        .route(
            "/api/items/{item_type}/{item_id}/bookmark",
            post(handlers::votes::toggle_bookmark),
        )
        .route(
            "/api/items/{item_type}/{item_id}/interaction",
            get(handlers::votes::get_interaction).put(handlers::votes::upsert_interaction),
        )
        .route(
            "/api/items/{item_type}/{item_id}/counters",
            get(handlers::votes::get_counters),
        );

    Router::new()
        .merge(item_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
