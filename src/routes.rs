use crate::{
    api::{attendance, payroll, reports, shifts},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use tracing::warn;

/// Every API route under `prefix`, without rate limiting.
pub fn api_scope(prefix: &str) -> actix_web::Scope {
    web::scope(prefix)
        // /clock-in, /clock-out
        .service(web::resource("/clock-in").route(web::post().to(shifts::clock_in)))
        .service(web::resource("/clock-out").route(web::post().to(shifts::clock_out)))
        // /roster/{location}
        .service(
            web::scope("/roster")
                .service(web::resource("/{location}").route(web::get().to(shifts::staff_roster)))
                .service(web::resource("/{location}/find").route(web::get().to(shifts::find_user))),
        )
        .service(web::resource("/work-hours").route(web::get().to(shifts::work_hours)))
        .service(
            web::scope("/shifts")
                // /shifts
                .service(
                    web::resource("")
                        .route(web::get().to(shifts::list_shifts))
                        .route(web::post().to(shifts::add_shift))
                        .route(web::put().to(shifts::edit_shift))
                        .route(web::delete().to(shifts::remove_shift)),
                )
                // /shifts/events/{event_id}
                .service(
                    web::resource("/events/{event_id}")
                        .route(web::put().to(shifts::edit_event))
                        .route(web::delete().to(shifts::delete_event)),
                ),
        )
        .service(
            web::scope("/attendance")
                .service(
                    web::resource("")
                        .route(web::post().to(attendance::mark))
                        .route(web::put().to(attendance::edit)),
                )
                .service(web::resource("/{location}/students").route(web::get().to(attendance::students)))
                .service(web::resource("/{location}/count").route(web::get().to(attendance::count))),
        )
        .service(
            web::scope("/reports")
                // fixed paths before /{location}/...
                .service(
                    web::resource("/attendance/monthly").route(web::post().to(reports::monthly_attendance)),
                )
                .service(web::resource("/cleanup").route(web::post().to(reports::cleanup)))
                .service(web::resource("/{location}/hours").route(web::get().to(reports::hours)))
                .service(web::resource("/{location}/log").route(web::post().to(reports::regenerate_log)))
                .service(web::resource("/{location}/summary").route(web::post().to(reports::regenerate_summary)))
                .service(
                    web::resource("/{location}/attendance").route(web::post().to(reports::regenerate_attendance)),
                ),
        )
        .service(
            web::scope("/payroll")
                .service(web::resource("/approvals").route(web::get().to(payroll::list_approvals)))
                .service(web::resource("/{location}/approve").route(web::post().to(payroll::approve)))
                .service(web::resource("/{location}/status").route(web::get().to(payroll::approval_status))),
        )
}

fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    match build_limiter(config.rate_per_min) {
        Some(limiter) => {
            cfg.service(api_scope(&config.api_prefix).wrap(limiter));
        }
        None => {
            warn!(rate_per_min = config.rate_per_min, "Invalid rate limit, serving API unthrottled");
            cfg.service(api_scope(&config.api_prefix));
        }
    }
}
