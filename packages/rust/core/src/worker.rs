//! The errand loop: connect, consume, process, acknowledge, and reconnect.
//!
//! ```text
//! Disconnected ──connect ok──▶ Connected ──consumer up──▶ Consuming
//!      ▲                                                      │
//!      └──────── broker error / stream end (after delay) ─────┘
//! ```
//!
//! Only broker failures end a cycle. Errand failures are logged and the
//! delivery is still acknowledged exactly once; there is no redelivery.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use muninn_broker::{BrokerConnector, ErrandSession, InboundDelivery};
use muninn_shared::Result;

use crate::errand::ErrandHandler;

/// Lifecycle of the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Consuming,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Consuming => "consuming",
        })
    }
}

/// Decides how long to wait before reconnect attempt `attempt` (1-based,
/// counting consecutive failed cycles). `None` stops the worker.
pub trait ReconnectPolicy: Send {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

/// Retry forever with the same delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(self.0)
    }
}

/// Single-consumer errand worker.
pub struct Worker<C> {
    connector: C,
    handler: ErrandHandler,
    state: ConnectionState,
}

impl<C: BrokerConnector> Worker<C> {
    pub fn new(connector: C, handler: ErrandHandler) -> Self {
        Self {
            connector,
            handler,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run until `policy` declines to reconnect. [`FixedDelay`] never does.
    pub async fn run(&mut self, policy: &mut dyn ReconnectPolicy) {
        let mut attempt: u32 = 0;
        loop {
            match self.cycle().await {
                Ok(()) => warn!("consumer stream ended"),
                Err(e) => error!(error = %e, "broker connection failed"),
            }

            // A session that reached Consuming resets the failure count.
            if self.state == ConnectionState::Consuming {
                attempt = 0;
            }
            self.transition(ConnectionState::Disconnected);
            attempt = attempt.saturating_add(1);

            let Some(delay) = policy.next_delay(attempt) else {
                warn!(attempt, "reconnect policy exhausted, stopping worker");
                return;
            };
            info!(attempt, ?delay, "reconnecting to broker");
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection lifetime. Returns when the session is lost.
    async fn cycle(&mut self) -> Result<()> {
        let mut session = self.connector.connect().await?;
        self.transition(ConnectionState::Connected);

        let result = self.consume(session.as_mut()).await;
        session.close().await;
        result
    }

    async fn consume(&mut self, session: &mut dyn ErrandSession) -> Result<()> {
        self.transition(ConnectionState::Consuming);
        info!("setup complete, listening for errands");

        while let Some(delivery) = session.next_delivery().await? {
            self.process(session, delivery).await?;
        }
        Ok(())
    }

    /// Handle one delivery and acknowledge it.
    ///
    /// Errand failures are logged. A broker failure from publishing or
    /// acknowledging is returned so the session is torn down; the ack is
    /// attempted either way.
    async fn process(&self, session: &mut dyn ErrandSession, delivery: InboundDelivery) -> Result<()> {
        let mut lost = None;

        match self.handler.handle(&delivery.body).await {
            Ok(echo) => {
                let identifier = echo.errand.errand_identifier.clone();
                match echo.to_vec() {
                    Ok(body) => match session.publish(&body).await {
                        Ok(()) => info!(errand_identifier = %identifier, "echo published"),
                        Err(e) => {
                            error!(errand_identifier = %identifier, error = %e, "echo publish failed");
                            if e.is_connection_error() {
                                lost = Some(e);
                            }
                        }
                    },
                    Err(e) => error!(errand_identifier = %identifier, error = %e, "echo serialization failed"),
                }
            }
            Err(e) => error!(error = %e, "errand failed"),
        }

        if let Err(e) = session.ack(delivery.delivery_tag).await {
            if e.is_connection_error() {
                return Err(e);
            }
            error!(delivery_tag = delivery.delivery_tag, error = %e, "ack failed");
        } else {
            debug!(delivery_tag = delivery.delivery_tag, "delivery acknowledged");
        }

        lost.map_or(Ok(()), Err)
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "connection state change");
            self.state = next;
        }
    }
}
