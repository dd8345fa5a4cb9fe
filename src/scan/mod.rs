//! Handler selection, execution and result ranking

pub mod aggregate;
pub mod batch;
pub mod dispatcher;
pub mod registry;

pub use aggregate::aggregate;
pub use batch::{ScanRequest, scan_packages, scan_packages_with_cancel};
pub use dispatcher::{Dispatcher, HandlerFailure, ScanReport};
pub use registry::{HandlerRegistry, create_default_registry};
