use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderValue;

use crate::gate::AccessGate;
use crate::lightning::{AnyBackend, TimeoutBackend};

/// Backend the server runs against: LNbits or mock, always behind a timeout
pub type ServerBackend = TimeoutBackend<AnyBackend>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<AccessGate<ServerBackend>>,
    /// Challenges expose preimages in mock mode
    pub mock_mode: bool,
    pub started_at: Instant,
    /// How long unsettled payment records are kept
    pub retention: Duration,
    /// Browser origins allowed by CORS; empty allows any
    pub cors_origins: Vec<HeaderValue>,
}

impl AppState {
    pub fn new(gate: AccessGate<ServerBackend>, retention: Duration) -> Self {
        let mock_mode = gate.tracker().backend().inner().is_mock();
        Self {
            gate: Arc::new(gate),
            mock_mode,
            started_at: Instant::now(),
            retention,
            cors_origins: Vec::new(),
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.cors_origins = origins;
        self
    }
}
