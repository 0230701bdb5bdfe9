// mav_channel_utils/src/client/mod.rs

//! Client-side transports, as used by a ground control station talking to the
//! gateway (and by the integration tests).

pub mod transport;
