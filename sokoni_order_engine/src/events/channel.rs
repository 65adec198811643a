//! The mpsc plumbing underneath the order event hooks.
//!
//! An [`EventHandler`] owns one receiver and one hook closure. Callers take as many
//! [`EventProducer`]s as they need via [`EventHandler::subscribe`], hand them to the order flow,
//! and then start the handler. Hooks see only the event payload itself; anything else they need
//! (a database handle, a push channel) has to be captured in the closure. Hooks may be async and
//! each invocation runs on its own task, so a slow hook never blocks the order flow.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    hook: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, hook: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, hook }
    }

    /// Hands out a new producer for this handler's channel.
    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Consumes events until every producer has been dropped, then waits for in-flight hook
    /// invocations to finish before returning.
    pub async fn start_handler(mut self) {
        debug!("📬️ Event handler listening");
        // the handler's own sender must go, or the recv loop would never end
        drop(self.sender);
        let in_flight = Arc::new(AtomicI64::new(0));
        while let Some(event) = self.receiver.recv().await {
            let hook = Arc::clone(&self.hook);
            in_flight.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&in_flight);
            tokio::spawn(async move {
                (hook)(event).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while in_flight.load(Ordering::SeqCst) > 0 {
            trace!("📬️ Draining {} running hooks before shutdown", in_flight.load(Ordering::SeqCst));
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
