//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. I/O, database operations,
//! courier calls) should be expressed as futures or asynchronous functions.
use actix_web::{get, web, HttpResponse, Responder};
use delivery_sync_engine::{
    db_types::OrderNumber,
    traits::{CourierGateway, DeliveryStore},
    DispatchApi,
    TrackingApi,
};
use log::*;

use crate::{
    data_objects::{DispatchRequest, OtpUpdate},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Delivery  ----------------------------------------------------
route!(delivery_record => Get "/delivery/{order_number}" impl DeliveryStore, CourierGateway);
/// Fetches the delivery for an order, along with its full status history.
pub async fn delivery_record<B: DeliveryStore, C: CourierGateway>(
    path: web::Path<String>,
    api: web::Data<DispatchApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = OrderNumber::from(path.into_inner());
    debug!("💻️ GET delivery record for {order_number}");
    let record = api.fetch_delivery_record(&order_number).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(track_delivery => Post "/delivery/{order_number}/track" impl DeliveryStore, CourierGateway);
/// Polls the courier for the order right away, and reconciles the result.
pub async fn track_delivery<B: DeliveryStore, C: CourierGateway>(
    path: web::Path<String>,
    api: web::Data<TrackingApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = OrderNumber::from(path.into_inner());
    debug!("💻️ POST track delivery for {order_number}");
    let result = api.track_now(&order_number).await?;
    info!("💻️ On-demand tracking of order {order_number}: {}", result.outcome);
    Ok(HttpResponse::Ok().json(result))
}

route!(dispatch_delivery => Post "/delivery/{order_number}/dispatch" impl DeliveryStore, CourierGateway);
pub async fn dispatch_delivery<B: DeliveryStore, C: CourierGateway>(
    path: web::Path<String>,
    body: web::Json<DispatchRequest>,
    api: web::Data<DispatchApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = OrderNumber::from(path.into_inner());
    let DispatchRequest { details, redispatch } = body.into_inner();
    debug!("💻️ POST dispatch for {order_number} (redispatch: {redispatch})");
    let record = api.request_dispatch(&order_number, details, redispatch).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(assign_otps => Post "/delivery/{order_number}/otps" impl DeliveryStore, CourierGateway);
pub async fn assign_otps<B: DeliveryStore, C: CourierGateway>(
    path: web::Path<String>,
    body: web::Json<OtpUpdate>,
    api: web::Data<DispatchApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = OrderNumber::from(path.into_inner());
    let otps = body.into_inner();
    if otps.pickup_otp.is_none() && otps.delivery_otp.is_none() {
        return Err(ServerError::InvalidRequestBody("At least one of pickup_otp or delivery_otp is required".into()));
    }
    debug!("💻️ POST OTPs for {order_number}");
    let record = api.assign_otps(&order_number, otps.into()).await?;
    Ok(HttpResponse::Ok().json(record))
}
