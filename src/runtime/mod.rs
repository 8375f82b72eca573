mod bootstrap;
pub mod monitor_loop;
pub mod queue;
pub mod sensor_pump;

pub use bootstrap::run;
pub use monitor_loop::{LoopControl, MonitorLoop};
pub use queue::{
    publish_blocking, MonitorEvent, MonitorEventQueue, ShutdownReason, MONITOR_EVENTS,
    MONITOR_EVENT_QUEUE_DEPTH,
};
pub use sensor_pump::{run_sensor_pump, spawn_sensor_pump};
