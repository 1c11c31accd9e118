//! # Summary
//!
//! This module contains the message handlers of the protocol, one module per
//! role. Each adds an `impl` block to [`Replica`](crate::replica::Replica),
//! so every role reads and writes the same single-owner state.

/// Promises and acceptance.
mod acceptor;

/// Bulk import of learned slots by lagging replicas.
mod catchup;

/// Client admission and timeouts.
mod client;

/// Prepare rounds and slot assignment.
mod leader;

/// Accept-vote aggregation.
mod learner;
