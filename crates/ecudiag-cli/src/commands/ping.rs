//! Ping command - reachability check

use ecudiag_uds::ping_host;

use crate::output::OutputContext;

/// Check a host without opening a diagnostic session
pub async fn ping(host: &str, ctx: &OutputContext) -> bool {
    let result = ping_host(host).await;
    ctx.print_ping(&result);
    result.success
}
