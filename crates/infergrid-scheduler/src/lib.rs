//! infergrid-scheduler — which task goes next, and where it goes.
//!
//! Two independent decisions made once per dispatch:
//!
//! ```text
//! PendingPool (ordered by the run's Policy)
//!   └── select_next() → Task
//! LoadBalancer
//!   └── choose_server(task, servers) → ServerId (least current_load / capacity)
//! ```

pub mod load_balancer;
pub mod pending;
pub mod policy;

pub use load_balancer::{LeastAdjustedLoad, LoadBalancer};
pub use pending::PendingPool;
pub use policy::DispatchOrder;
