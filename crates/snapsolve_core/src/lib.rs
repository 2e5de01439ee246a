pub mod domain;
pub mod image;
pub mod ports;
pub mod render;
pub mod session;

pub use domain::{
    CapturedImage, DisplayMode, ImageRef, LoginOutcome, RenderedDocument, Segment, SolvePhase,
    TokenPair, UserInfo,
};
pub use image::{prepare_payload, ImageError, ImageFormat, ImagePayload};
pub use ports::{
    AuthService, ImageLoader, MathRenderError, MathTypesetter, PortError, PortResult,
    SolveConnector, SolveTransport,
};
pub use render::render;
pub use session::{Effect, SolveError, SolveMachine, TransportEvent};
