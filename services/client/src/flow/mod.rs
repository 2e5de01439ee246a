pub mod credentials;
pub mod gateway;
pub mod html;
pub mod protocol;
pub mod session;
pub mod staging;
pub mod state;

// Re-export the pieces a host app touches directly.
pub use credentials::CredentialStore;
pub use gateway::AuthGateway;
pub use session::{SolveDeps, SolveHandle, SolveSession, SolveSnapshot};
pub use staging::StagingBuffer;
pub use state::ClientState;
