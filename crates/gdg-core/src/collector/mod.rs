//! Host inspection through `/proc`.
//!
//! ```text
//!   DStateMonitor      util::host
//!        │                 │
//!        └──────┬──────────┘
//!        ┌──────▼──────┐
//!        │  FileSystem │ (trait)
//!        └──────┬──────┘
//!        ┌──────┴──────┐
//!   ┌────▼────┐   ┌────▼────┐
//!   │ RealFs  │   │ MockFs  │
//!   │ (Linux) │   │ (tests) │
//!   └─────────┘   └─────────┘
//! ```
//!
//! ```
//! use gdg_core::collector::{DStateMonitor, MockFs};
//!
//! let monitor = DStateMonitor::new(MockFs::with_blocked_io(3), "/proc");
//! assert_eq!(monitor.count_dstate().unwrap(), 3);
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::DStateMonitor;
pub use traits::{FileSystem, RealFs};
