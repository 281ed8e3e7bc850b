use crate::{
    api::{accounting, commission, commitments, employee, permissions, records, tasks},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_error_handler, query_error_handler},
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let burst = requests_per_min.max(1);
        let per_ms = (60_000 / burst as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .period(Duration::from_millis(per_ms))
            .burst_size(burst)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(|| {
                warn!(requests_per_min, "Invalid rate limit, using the default");
                GovernorConfig::default()
            });
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));

    // malformed bodies and queries answer with the same JSON error shape
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler));

    // Public routes
    cfg.service(
        web::resource("/login")
            .wrap(login_limiter)
            .route(web::post().to(handlers::login)),
    );

    // Session-protected routes
    cfg.service(
        web::scope("")
            .wrap(from_fn(auth_middleware))
            .service(web::resource("/logout").route(web::post().to(handlers::logout)))
            .service(web::resource("/home").route(web::get().to(handlers::home)))
            // commission and commitments before the /accounting/{branch} pages
            .service(
                web::scope("/accounting/commission")
                    .service(
                        web::resource("")
                            .route(web::get().to(commission::list_months))
                            .route(web::post().to(commission::save_month)),
                    )
                    .service(
                        web::resource("/settings")
                            .route(web::get().to(commission::get_settings))
                            .route(web::put().to(commission::update_settings)),
                    )
                    .service(
                        web::resource("/{month}").route(web::delete().to(commission::delete_month)),
                    ),
            )
            .service(
                web::resource("/accounting/commitments")
                    .route(web::get().to(commitments::list_commitments))
                    .route(web::post().to(commitments::commitment_action)),
            )
            .service(
                web::scope("/accounting/{branch}")
                    // /accounting/{branch}/daily
                    .service(
                        web::resource("/daily")
                            .route(web::get().to(accounting::get_daily))
                            .route(web::post().to(accounting::save_daily)),
                    )
                    // /accounting/{branch}/movements
                    .service(
                        web::resource("/movements").route(web::get().to(accounting::movements)),
                    ),
            )
            .service(
                web::scope("/records/{branch}")
                    .service(
                        web::resource("")
                            .route(web::get().to(records::list_records))
                            .route(web::post().to(records::create_record)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(records::update_record))
                            .route(web::delete().to(records::delete_record)),
                    ),
            )
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("")
                            .route(web::get().to(tasks::list_tasks))
                            .route(web::post().to(tasks::create_task)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(tasks::delete_task))),
            )
            .service(
                web::resource("/permissions")
                    .route(web::get().to(permissions::list_permissions))
                    .route(web::post().to(permissions::user_action)),
            ),
    );
}
