//! Web server command.

use console::style;

use crate::config::Settings;

use super::build_harvester;

/// Start the web server.
pub async fn cmd_serve(
    settings: &Settings,
    bind: Option<&str>,
    sweep_interval_mins: Option<u64>,
) -> anyhow::Result<()> {
    let mut server = settings.server.clone();
    if let Some(bind) = bind {
        let (host, port) = parse_bind_address(bind, server.port)?;
        server.host = host;
        server.port = port;
    }
    if sweep_interval_mins.is_some() {
        server.sweep_interval_mins = sweep_interval_mins;
    }

    let harvester = build_harvester(settings)?;

    println!(
        "{} Starting regharvest server at http://{}:{}",
        style("→").cyan(),
        server.host,
        server.port
    );
    match server.sweep_interval_mins {
        Some(mins) => println!("  Sweeping every {mins} minutes"),
        None => println!("  No in-process scheduler; POST /trigger to sweep"),
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(harvester, &server).await
}

/// Parse a bind address that can be just a port ("8610"), just a host
/// ("0.0.0.0"), or both ("0.0.0.0:8610").
fn parse_bind_address(bind: &str, default_port: u16) -> anyhow::Result<(String, u16)> {
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), default_port))
}
