use futures::future::{AbortHandle, AbortRegistration};


/// Cancel handle for one in-flight tile fetch.
///
/// `id` distinguishes successive fetches of the same tile so a completion
/// from an earlier, cancelled attempt is never mistaken for the current one.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    pub id: u64,
    pub tile_key: String,
    handle: AbortHandle,
}

impl CancellationToken {
    /// New token plus the registration the fetch future is wrapped with.
    pub fn new(id: u64, tile_key: String) -> (Self, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (
            Self {
                id,
                tile_key,
                handle,
            },
            registration,
        )
    }

    /// Safe to call any number of times, before or after the fetch resolved.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}
