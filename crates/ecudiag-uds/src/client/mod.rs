//! Client façade: hex commands in, [`DiagnosticResult`] out

mod manager;
mod result;

pub use manager::{ClientManager, TransportFactory};
pub use result::DiagnosticResult;
