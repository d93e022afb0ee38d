use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DeliveryCompletedEvent,
    EventHandler,
    EventProducer,
    EventType,
    Handler,
    RiderAssignedEvent,
    RiderDroppedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub rider_assigned_producer: Vec<EventProducer<RiderAssignedEvent>>,
    pub rider_dropped_producer: Vec<EventProducer<RiderDroppedEvent>>,
    pub delivery_completed_producer: Vec<EventProducer<DeliveryCompletedEvent>>,
}

impl EventProducers {
    /// Publishes the event to every subscriber of its type.
    pub async fn publish(&self, event: EventType) {
        match event {
            EventType::RiderAssigned(ev) => {
                for producer in &self.rider_assigned_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
            EventType::RiderDropped(ev) => {
                for producer in &self.rider_dropped_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
            EventType::DeliveryCompleted(ev) => {
                for producer in &self.delivery_completed_producer {
                    producer.publish_event(ev.clone()).await;
                }
            },
        }
    }

    /// Merges the producers of another set of handlers into this one.
    pub fn extend(&mut self, other: EventProducers) {
        self.rider_assigned_producer.extend(other.rider_assigned_producer);
        self.rider_dropped_producer.extend(other.rider_dropped_producer);
        self.delivery_completed_producer.extend(other.delivery_completed_producer);
    }
}

pub struct EventHandlers {
    pub on_rider_assigned: Option<EventHandler<RiderAssignedEvent>>,
    pub on_rider_dropped: Option<EventHandler<RiderDroppedEvent>>,
    pub on_delivery_completed: Option<EventHandler<DeliveryCompletedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_rider_assigned = hooks.on_rider_assigned.map(|f| EventHandler::new(buffer_size, f));
        let on_rider_dropped = hooks.on_rider_dropped.map(|f| EventHandler::new(buffer_size, f));
        let on_delivery_completed = hooks.on_delivery_completed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_rider_assigned, on_rider_dropped, on_delivery_completed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_rider_assigned {
            result.rider_assigned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_rider_dropped {
            result.rider_dropped_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_delivery_completed {
            result.delivery_completed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_rider_assigned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_rider_dropped {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_delivery_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_rider_assigned: Option<Handler<RiderAssignedEvent>>,
    pub on_rider_dropped: Option<Handler<RiderDroppedEvent>>,
    pub on_delivery_completed: Option<Handler<DeliveryCompletedEvent>>,
}

impl EventHooks {
    pub fn on_rider_assigned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RiderAssignedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_rider_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_rider_dropped<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RiderDroppedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_rider_dropped = Some(Arc::new(f));
        self
    }

    pub fn on_delivery_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeliveryCompletedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_delivery_completed = Some(Arc::new(f));
        self
    }
}
