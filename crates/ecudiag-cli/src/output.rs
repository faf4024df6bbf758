//! Output formatting for ecudiag (text, json)

use clap::ValueEnum;
use colored::Colorize;
use ecudiag_uds::codec::hex_dump;
use ecudiag_uds::{DiagnosticResult, PingResult};
use serde::Serialize;

const DUMP_WIDTH: usize = 16;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// One JSON document per result
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print an info message (unless in quiet mode or emitting JSON)
    pub fn info(&self, msg: &str) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", msg);
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print a serializable value as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
        );
    }

    /// Print the outcome of one diagnostic request
    pub fn print_result(&self, label: &str, result: &DiagnosticResult) {
        if self.format == OutputFormat::Json {
            self.print_json(result);
            return;
        }

        if result.success {
            if !self.quiet {
                println!("{} {}", label.bold(), result.message.green());
            }
        } else {
            self.error(&format!("{} {}", label, result.message));
        }

        if let Some(data) = result.data.as_deref().filter(|d| !d.is_empty()) {
            if self.quiet {
                println!("{}", hex::encode(data));
            } else {
                for line in hex_dump(data, DUMP_WIDTH) {
                    println!("  {}", line.dimmed());
                }
            }
        }
    }

    /// Print a reachability check result
    pub fn print_ping(&self, result: &PingResult) {
        if self.format == OutputFormat::Json {
            self.print_json(result);
            return;
        }

        let ip = result.ip.as_deref().unwrap_or("-");
        if result.success {
            let time = result
                .time_ms
                .map(|ms| format!("{:.1} ms", ms))
                .unwrap_or_default();
            println!(
                "{} {} ({}) via {:?}: {}",
                "reachable".green(),
                result.host.bold(),
                ip,
                result.method,
                time
            );
        } else {
            self.error(&format!(
                "unreachable {} ({}) via {:?}: {}",
                result.host,
                ip,
                result.method,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Text => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                self.print_json(&map);
            }
        }
    }
}
