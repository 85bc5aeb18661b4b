//! The Security Gate: outbound URL validation and secret redaction.

use crate::error::MovaError;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const SENSITIVE_KEY_SUBSTRINGS: &[&str] = &[
    "authorization",
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "auth",
    "bearer",
    "jwt",
];

const DEFAULT_DENIED_PORTS: &[u16] = &[
    22, 23, 25, 53, 135, 139, 445, 1433, 1521, 3306, 3389, 5432, 6379,
];

/// A hostname deny/allow pattern. `*` matches any run of characters, same
/// semantics as a shell glob restricted to this one wildcard.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => {
                (0..=t.len()).any(|i| helper(&p[1..], &t[i..]))
            }
            Some(c) => t.first() == Some(c) && helper(&p[1..], &t[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

/// One CIDR block, used for the default-deny IP ranges.
#[derive(Debug, Clone, Copy)]
pub struct CidrBlock {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    pub fn new(network: IpAddr, prefix_len: u8) -> Self {
        Self { network, prefix_len }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = v4_mask(self.prefix_len);
                (u32::from(net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = v6_mask(self.prefix_len);
                (u128::from(net) & mask) == (u128::from(*addr) & mask)
            }
            _ => false,
        }
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len as u32)
    }
}

fn cidr(addr: &str, prefix_len: u8) -> CidrBlock {
    CidrBlock::new(addr.parse().expect("static cidr literal"), prefix_len)
}

fn default_denied_ranges() -> Vec<CidrBlock> {
    vec![
        cidr("127.0.0.0", 8),
        cidr("169.254.0.0", 16),
        cidr("10.0.0.0", 8),
        cidr("172.16.0.0", 12),
        cidr("192.168.0.0", 16),
        CidrBlock::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 128),
        // fc00::/7, IPv6 unique local addresses
        CidrBlock::new(IpAddr::V6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0)), 7),
    ]
}

/// Configuration for the Security Gate. Construct with `SecurityConfig::default()`
/// for the spec-mandated defaults, or customize via the builder methods.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_schemes: Vec<String>,
    pub denied_hosts: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub denied_ip_ranges: Vec<CidrBlock>,
    pub denied_ports: Vec<u16>,
    pub allowed_ports: Vec<u16>,
    pub max_response_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            denied_hosts: vec!["localhost".to_string()],
            allowed_hosts: Vec::new(),
            denied_ip_ranges: default_denied_ranges(),
            denied_ports: DEFAULT_DENIED_PORTS.to_vec(),
            allowed_ports: Vec::new(),
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

impl SecurityConfig {
    /// Runs the full URL validation pipeline from spec.md §4.8 and returns
    /// the parsed URL on success.
    pub fn validate_url(&self, raw_url: &str) -> Result<url::Url, MovaError> {
        let parsed = url::Url::parse(raw_url).map_err(|e| MovaError::SecurityDenied {
            message: format!("malformed URL: {}", e),
        })?;

        let scheme = parsed.scheme();
        if !self.allowed_schemes.iter().any(|s| s == scheme) {
            return Err(MovaError::SecurityDenied {
                message: format!("scheme {} is not allowed", scheme),
            });
        }

        let host = parsed.host_str().ok_or_else(|| MovaError::SecurityDenied {
            message: "URL has no host".to_string(),
        })?;

        if self.denied_hosts.iter().any(|p| glob_match(p, host)) {
            return Err(MovaError::SecurityDenied {
                message: format!("host {} is explicitly denied", host),
            });
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if let Some(range) = self.denied_ip_ranges.iter().find(|r| r.contains(&ip)) {
                let _ = range;
                return Err(MovaError::SecurityDenied {
                    message: format!("host {} is explicitly denied", host),
                });
            }
        }

        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.iter().any(|p| glob_match(p, host)) {
            return Err(MovaError::SecurityDenied {
                message: format!("host {} is not in the allow list", host),
            });
        }

        let port = parsed.port_or_known_default().unwrap_or(0);
        if self.denied_ports.contains(&port) {
            return Err(MovaError::SecurityDenied {
                message: format!("port {} is explicitly denied", port),
            });
        }
        if !self.allowed_ports.is_empty() && !self.allowed_ports.contains(&port) {
            return Err(MovaError::SecurityDenied {
                message: format!("port {} is not in the allow list", port),
            });
        }

        Ok(parsed)
    }
}

fn mask_value(key: &str, value: &str) -> String {
    let lower = value.trim();
    if lower.len() <= 4 {
        "*****".to_string()
    } else if lower.starts_with("Bearer ") {
        "Bearer *****".to_string()
    } else if lower.starts_with("Basic ") {
        "Basic *****".to_string()
    } else if lower.len() <= 8 {
        let mut chars = lower.chars();
        let first = chars.next().unwrap();
        let last = chars.last().unwrap_or(first);
        format!("{}*****{}", first, last)
    } else {
        let mut chars = lower.chars();
        let a = chars.next().unwrap();
        let b = chars.next().unwrap_or(a);
        let mut rest: Vec<char> = lower.chars().collect();
        let y = rest.pop().unwrap_or(b);
        let x = rest.pop().unwrap_or(a);
        let _ = key;
        format!("{}{}*****{}{}", a, b, x, y)
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Masks any key containing a sensitive substring, leaving the key set and
/// all other values untouched (spec.md §8's redaction law).
pub fn redact(map: &HashMap<String, Value>) -> HashMap<String, Value> {
    map.iter()
        .map(|(k, v)| {
            if is_sensitive_key(k) {
                let masked = match v {
                    Value::String(s) => mask_value(k, s),
                    other => mask_value(k, &other.to_string()),
                };
                (k.clone(), Value::String(masked))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// A coarser, string-level redactor for log lines that embed URLs or raw
/// JSON bodies rather than a parameter map (e.g. request URLs with
/// credentials embedded, or serialized headers blocks).
pub fn redact_string(input: &str) -> String {
    let re = regex::Regex::new(
        r#"(?i)("(?:authorization|password|secret|token|api[_-]?key|credential)"\s*:\s*")[^"]*(")"#,
    )
    .expect("static regex");
    let masked = re.replace_all(input, "$1*****$2").to_string();

    let url_re = regex::Regex::new(r"://([^:@/]+):([^@/]+)@").expect("static regex");
    url_re.replace_all(&masked, "://$1:*****@").to_string()
}
