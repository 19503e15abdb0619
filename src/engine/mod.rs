//! Execution Engine: resolve templates against a scope chain, send them through
//! a transport, and record outcomes in history.

pub mod actor;
pub mod executor;
pub mod transport;

pub use actor::ExecutionActor;
pub use executor::{classify_body, dispatch, execute, execute_recorded, resolve};
pub use transport::{Progress, ReqwestTransport, Transport, TransportResponse};
