//! Send and run commands - UDS requests over a live connection

use std::path::Path;

use anyhow::{Context, Result};
use ecudiag_uds::{ClientManager, ConnectionConfig, SecurityConfig};
use tracing::debug;

use crate::output::OutputContext;

/// One request line of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line_no: usize,
    pub service: String,
    pub data: String,
}

/// Connect, send a single request, then disconnect
pub async fn send(
    connection: ConnectionConfig,
    security: SecurityConfig,
    service: &str,
    data: &str,
    ctx: &OutputContext,
) -> bool {
    let Some(mut manager) = open(connection, security, ctx).await else {
        return false;
    };

    let result = manager.send_command(service, data).await;
    ctx.print_result(&format!("[{}]", service), &result);

    manager.disconnect().await;
    result.success
}

/// Connect once and send every request in `script`
pub async fn run(
    connection: ConnectionConfig,
    security: SecurityConfig,
    script: &Path,
    keep_going: bool,
    ctx: &OutputContext,
) -> Result<bool> {
    let content = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script: {}", script.display()))?;
    let lines = parse_script(&content);

    let Some(mut manager) = open(connection, security, ctx).await else {
        return Ok(false);
    };

    let mut all_ok = true;
    for line in &lines {
        debug!(line = line.line_no, service = %line.service, "Running script line");
        let result = manager.send_command(&line.service, &line.data).await;
        ctx.print_result(&format!("{:>4} [{}]", line.line_no, line.service), &result);

        if !result.success {
            all_ok = false;
            if !keep_going {
                ctx.error(&format!("Stopping at line {}", line.line_no));
                break;
            }
        }
        // A fatal error drops the session; nothing after it can succeed
        if !manager.connection_status() {
            ctx.error("Connection lost");
            break;
        }
    }

    manager.disconnect().await;
    Ok(all_ok)
}

async fn open(
    connection: ConnectionConfig,
    security: SecurityConfig,
    ctx: &OutputContext,
) -> Option<ClientManager> {
    ctx.info(&format!(
        "Connecting to {} (ECU 0x{:04X})...",
        connection.endpoint(),
        connection.server_address
    ));

    let mut manager = ClientManager::new(security);
    let result = manager.connect(connection).await;
    if !result.success {
        ctx.print_result("[connect]", &result);
        return None;
    }
    Some(manager)
}

/// Split a script into requests; blank lines and `#` comments are skipped
///
/// The first token of a line is the service id, the rest is the request hex.
pub fn parse_script(content: &str) -> Vec<ScriptLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = raw.split('#').next().unwrap_or_default().trim();
            if text.is_empty() {
                return None;
            }
            let (service, data) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
            Some(ScriptLine {
                line_no: idx + 1,
                service: service.to_string(),
                data: data.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_script() {
        let script = "\
# enter extended session
10 10 03

22 22 F1 90   # VIN
3E
";
        assert_eq!(
            parse_script(script),
            vec![
                ScriptLine {
                    line_no: 2,
                    service: "10".into(),
                    data: "10 03".into(),
                },
                ScriptLine {
                    line_no: 4,
                    service: "22".into(),
                    data: "22 F1 90".into(),
                },
                ScriptLine {
                    line_no: 5,
                    service: "3E".into(),
                    data: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_script_comments_only() {
        assert!(parse_script("# nothing\n\n   \n").is_empty());
    }
}
