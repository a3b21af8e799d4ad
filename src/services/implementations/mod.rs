mod maintenance_service;
mod monitor_service;
mod stream_service;

pub use maintenance_service::MaintenanceService;
pub use monitor_service::MonitorService;
pub use stream_service::StreamService;
