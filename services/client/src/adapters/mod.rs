pub mod http_auth;
pub mod image_file;
pub mod typesetter;
pub mod ws_transport;

pub use http_auth::HttpAuthAdapter;
pub use image_file::FsImageLoader;
pub use typesetter::KatexMarkupTypesetter;
pub use ws_transport::{WsSolveConnector, WsSolveTransport};
