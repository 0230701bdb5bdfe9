// spl_gateway/src/proxy_server/mod.rs

//! Client-facing side of the gateway.
//!
//! - `tcp_server` / `ws_endpoint`: acceptors, one session per connection.
//! - `session_factory`: picks live or shadow sessions for an acceptor.
//! - `client_session` / `shadow_session`: the two session kinds.
//! - `connection_manager`: registry of open sessions, used for downlink fan-out.
//! - `downlink_relay`: pump from the satellite MO queue to the live sessions.
//! - `shadow`: the locally held vehicle state served by shadow sessions.
//! - `service`: wires all of the above from an `AppConfig`.

pub mod client_session;
pub mod connection_manager;
pub mod downlink_relay;
pub mod service;
pub mod session_factory;
pub mod shadow;
pub mod shadow_session;
pub mod tcp_server;
pub mod ws_endpoint;

pub use client_session::{ClientSession, LiveClientSession};
pub use connection_manager::ConnectionManager;
pub use downlink_relay::DownlinkRelay;
pub use service::{GatewayAddrs, GatewayService};
pub use session_factory::{LiveSessionFactory, SessionFactory, ShadowSessionFactory};
pub use shadow::{ShadowChannel, VehicleShadow};
pub use shadow_session::ShadowClientSession;
pub use tcp_server::MavlinkTcpServer;
pub use ws_endpoint::WsService;
