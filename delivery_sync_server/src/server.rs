use std::time::Duration;

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use delivery_sync_engine::{events::EventProducers, DispatchApi, ReconcilerApi, SqliteDatabase, TrackingApi};
use futures::future::{ok, Either};
use log::{info, warn};

use crate::{
    config::{ServerConfig, ServerOptions},
    courier_routes::CourierWebhookRoute,
    errors::ServerError,
    helpers::{get_remote_ip, is_whitelisted},
    integrations::{
        courier::{create_courier_event_handlers, CourierClient},
        notifier::create_notifier_event_handlers,
    },
    poll_sweeper::PollSweeper,
    routes::{health, AssignOtpsRoute, DeliveryRecordRoute, DispatchDeliveryRoute, TrackDeliveryRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let courier =
        CourierClient::new(config.courier.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = start_event_handlers(&config, courier.clone()).await;
    let reconciler = ReconcilerApi::new(db, producers);
    let tracking_api = TrackingApi::new(reconciler.clone(), courier.clone(), config.sweeper.sweep.clone());
    let mut sweeper = PollSweeper::new(tracking_api, config.sweeper.interval);
    if config.sweeper.enabled {
        sweeper.start();
    } else {
        info!("🧹️ The poll sweeper is disabled");
    }
    let srv = create_server_instance(config, reconciler, courier)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    sweeper.stop().await;
    result
}

/// Subscribes the courier and notifier integrations to the engine's events.
pub async fn start_event_handlers(config: &ServerConfig, courier: CourierClient) -> EventProducers {
    let mut producers = EventProducers::default();
    let courier_handlers = create_courier_event_handlers(courier);
    producers.extend(courier_handlers.producers());
    courier_handlers.start_handlers().await;
    match create_notifier_event_handlers(&config.notifier) {
        Ok(handlers) => {
            producers.extend(handlers.producers());
            handlers.start_handlers().await;
        },
        Err(e) => warn!("🔔️ Vendor notifications are disabled. {e}"),
    }
    producers
}

/// Every API shares the reconciler's per-order locks, across all workers, so writes to one order are serialised no
/// matter which route or task they come from.
pub fn create_server_instance(
    config: ServerConfig,
    reconciler: ReconcilerApi<SqliteDatabase>,
    courier: CourierClient,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let sweep_config = config.sweeper.sweep.clone();
    let whitelist = config.courier_whitelist.clone();
    let srv = HttpServer::new(move || {
        let dispatch_api = DispatchApi::new(reconciler.clone(), courier.clone());
        let tracking_api = TrackingApi::new(reconciler.clone(), courier.clone(), sweep_config.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dsync::access_log"))
            .app_data(web::Data::new(reconciler.clone()))
            .app_data(web::Data::new(dispatch_api))
            .app_data(web::Data::new(tracking_api))
            .app_data(web::Data::new(options));
        let whitelist = whitelist.clone();
        let webhook_scope = web::scope("/delivery-events")
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded);
                let whitelisted = is_whitelisted(peer_ip, whitelist.as_deref());
                if whitelisted {
                    Either::Left(srv.call(req))
                } else {
                    let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "an unknown address".into());
                    warn!("📬️ Rejected courier webhook from {peer}. It is not on the whitelist.");
                    Either::Right(ok(req.error_response(ServerError::ForbiddenPeer(peer))))
                }
            })
            .service(CourierWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(webhook_scope)
            .service(DeliveryRecordRoute::<SqliteDatabase, CourierClient>::new())
            .service(TrackDeliveryRoute::<SqliteDatabase, CourierClient>::new())
            .service(DispatchDeliveryRoute::<SqliteDatabase, CourierClient>::new())
            .service(AssignOtpsRoute::<SqliteDatabase, CourierClient>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
