//! Email notification seam. Actual delivery is an external collaborator;
//! this crate only decides when to send what.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use store::OrderRecord;

use crate::error::Result;

/// Sends a templated email about an order.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template: &str, order: &OrderRecord) -> Result<()>;
}

/// Notifier that only logs. Used when no mail collaborator is wired up.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template: &str, order: &OrderRecord) -> Result<()> {
        tracing::info!(template, order_id = %order.id, email = %order.shipping.email, "email queued");
        Ok(())
    }
}

/// Recording notifier for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<(String, OrderId)>>>,
}

impl InMemoryNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (template, order) pair sent so far.
    pub fn sent(&self) -> Vec<(String, OrderId)> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, template: &str, order: &OrderRecord) -> Result<()> {
        self.sent
            .write()
            .unwrap()
            .push((template.to_string(), order.id));
        Ok(())
    }
}
