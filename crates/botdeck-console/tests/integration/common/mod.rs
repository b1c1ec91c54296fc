//! Shared mock servers.

pub mod mock_api;
pub mod mock_ws;
