// ── Operations ──
//
// The bridge between the pure action/reducer layer and network I/O.
// Every operation is an async function with the HTTP client and store
// injected; nothing here reaches for ambient globals. Multi-step
// operations run their dependent calls strictly sequentially.

mod backups;
mod networking;
mod resource;

pub use backups::take_backup;
pub use networking::{IpAssignment, assign_ips, set_reverse_dns};
pub use resource::ResourceOps;
