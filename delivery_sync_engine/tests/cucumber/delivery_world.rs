use cucumber::World;
use delivery_sync_engine::{
    events::{EventHandlers, EventHooks},
    reconcile_objects::ReconcileResult,
    DeliveryStore,
    ReconcilerApi,
    SqliteDatabase,
};
use log::*;

use crate::support::{new_database, HookCalled};

#[derive(Default, Debug, World)]
pub struct DeliveryWorld {
    pub system: Option<DeliverySystem>,
    pub last_result: Option<ReconcileResult>,
}

#[derive(Debug)]
pub struct DeliverySystem {
    pub db_path: String,
    pub reconciler: ReconcilerApi<SqliteDatabase>,
    pub vendor_notifications: HookCalled,
}

impl DeliveryWorld {
    pub async fn system(&mut self) -> &DeliverySystem {
        if self.system.is_none() {
            self.system = Some(DeliverySystem::new().await);
        }
        self.system.as_ref().expect("System not initialised")
    }

    pub fn api(&self) -> &ReconcilerApi<SqliteDatabase> {
        &self.system.as_ref().expect("ReconcilerApi not initialised").reconciler
    }
}

impl DeliverySystem {
    pub async fn new() -> Self {
        let db = new_database().await;
        let db_path = db.url().to_string();
        debug!("Created database: {db_path}");
        let vendor_notifications = HookCalled::default();
        let counter = vendor_notifications.clone();
        let mut hooks = EventHooks::default();
        hooks.on_rider_assigned(move |ev| {
            info!("🪝️ Vendor {} notified about order {}", ev.order.vendor_id, ev.order.order_number);
            counter.called();
            Box::pin(async {})
        });
        let handlers = EventHandlers::new(16, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let reconciler = ReconcilerApi::new(db, producers);
        Self { db_path, reconciler, vendor_notifications }
    }
}
