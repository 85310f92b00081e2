//! Fetch plumbing between the loader and whatever performs network I/O.
//!
//! The loader never awaits anything itself. `request_tile` hands back a
//! [`PendingFetch`]; the host drives it to completion on its own executor and
//! feeds the resulting [`FetchCompletion`] back into the layer.

use futures::future::{Abortable, LocalBoxFuture};

use crate::error::OverlayError;
use crate::models::TileCoord;

/// One tile request as handed to a [`TileFetcher`].
#[derive(Clone, Debug, PartialEq)]
pub struct TileRequest {
    pub coord: TileCoord,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Performs the network request for a tile and yields the raw payload.
pub trait TileFetcher {
    fn fetch(&self, request: &TileRequest) -> LocalBoxFuture<'static, Result<Vec<u8>, OverlayError>>;
}

/// Identifies which fetch attempt a completion belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: u64,
    pub coord: TileCoord,
    pub tile_key: String,
}

pub struct PendingFetch {
    pub ticket: FetchTicket,
    future: Abortable<LocalBoxFuture<'static, Result<Vec<u8>, OverlayError>>>,
}

impl PendingFetch {
    pub(crate) fn new(
        ticket: FetchTicket,
        future: Abortable<LocalBoxFuture<'static, Result<Vec<u8>, OverlayError>>>,
    ) -> Self {
        Self { ticket, future }
    }

    /// Resolves to the payload, or `Cancelled` if the tile was unloaded first.
    pub async fn run(self) -> FetchCompletion {
        let PendingFetch { ticket, future } = self;
        let result = match future.await {
            Ok(result) => result,
            Err(_aborted) => Err(OverlayError::Cancelled(ticket.tile_key.clone())),
        };
        FetchCompletion { ticket, result }
    }
}

impl std::fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub ticket: FetchTicket,
    pub result: Result<Vec<u8>, OverlayError>,
}
