// Library root
// -----------
// Client library for the Moltbook agent API plus the terminal flows the
// `moltbook` binary is built from.
//
// Module responsibilities:
// - `api`: blocking HTTP client, one method per endpoint, raw JSON back.
// - `credentials`: the local credential file and its env-var fallback.
// - `verification`: registration and claim polling.
// - `heartbeat`: periodic status/DM/feed check with a state file.
// - `ui`: dialoguer menus and prompts on top of the above.
pub mod api;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod ui;
pub mod verification;

pub use api::MoltbookClient;
pub use cancel::CancelToken;
pub use credentials::{CredentialStore, Credentials};
pub use error::{Error, Result};
