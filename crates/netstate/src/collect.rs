//! State collection.
//!
//! Builds a normalized snapshot of the live network stack. Collection is
//! all-or-nothing: if either query fails, the whole snapshot is discarded
//! and the reconcile call fails with a collection error, because a partial
//! snapshot would make the diff engine draw wrong conclusions.

use tracing::debug;

use crate::backend::NetworkBackend;
use crate::error::{Error, Result};
use crate::state::NetworkState;

/// Collect the current authoritative state. Side-effect free.
pub async fn collect<B: NetworkBackend>(backend: &B) -> Result<NetworkState> {
    let interfaces = backend
        .query_interfaces()
        .await
        .map_err(as_collection_error)?;
    let routes = backend.query_routes().await.map_err(as_collection_error)?;

    debug!(
        interfaces = interfaces.len(),
        routes = routes.len(),
        "collected current state"
    );

    Ok(NetworkState {
        interfaces,
        routes: Some(routes),
    })
}

fn as_collection_error(err: Error) -> Error {
    match err {
        err @ Error::Collection(_) => err,
        other => Error::Collection(other.to_string()),
    }
}
