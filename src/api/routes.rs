// src/api/routes.rs
use actix_web::web;
use crate::api::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/jsonrpc", web::post().to(handlers::jsonrpc))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(handlers::health_check))
        );
}
