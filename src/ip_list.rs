use std::{ fs, net::IpAddr, path::Path };

use anyhow::{ Context, Result };
use tracing::{ debug, info };

use crate::error::ScanError;

/// Reads the target list, one address per line. Blank lines and `#`
/// comments are skipped; anything else must parse as an IPv4/IPv6 literal.
pub fn load_targets(path: &Path, skip_private: bool) -> Result<Vec<IpAddr>> {
    let content = fs
        ::read_to_string(path)
        .context(format!("cannot read target list {}", path.display()))?;
    let targets = parse_targets(&content, skip_private)?;
    info!("loaded {} target addresses from {}", targets.len(), path.display());
    Ok(targets)
}

fn parse_targets(content: &str, skip_private: bool) -> Result<Vec<IpAddr>, ScanError> {
    let mut targets = vec![];
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ip: IpAddr = line
            .parse()
            .map_err(|_| {
                ScanError::InvalidInput(format!("{:?} on line {} is not an IP address", line, n + 1))
            })?;
        if skip_private && !ip_rfc::global(&ip) {
            debug!(%ip, "skipping non-global address");
            continue;
        }
        targets.push(ip);
    }
    Ok(targets)
}
