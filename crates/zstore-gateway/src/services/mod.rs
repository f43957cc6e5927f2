//! Gateway services: access policy, channel provisioning and teardown.

pub mod access;
pub mod provisioner;
pub mod teardown;

pub use access::{is_admin_path, AccessPolicy, GateOutcome};
pub use provisioner::{build_ticket_message, ChannelProvisioner, ProvisionedChannel};
pub use teardown::{Ack, ChannelTeardown};
