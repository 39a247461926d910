// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-adapters: platform-facing integrations — the Process Monitor
//! and Identifier (§4.1, §4.2), the Packet Filter Adapter's platform
//! variants (§4.4), and the desktop notification collaborator (§7).

pub mod notify;
pub mod packet_filter;
pub mod process_identifier;
pub mod process_monitor;

pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
pub use packet_filter::{probe, FilterError, IptablesAdapter, NoOpAdapter, PacketFilterAdapter, WfpAdapter};
pub use process_identifier::ProcessIdentifier;
pub use process_monitor::{recv_with_drop_sentinel, MonitorError, ProcessLister, ProcessMonitor};

#[cfg(any(test, feature = "test-support"))]
pub use notify::fake::FakeNotifyAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use packet_filter::fake::FakeFilterAdapter;
