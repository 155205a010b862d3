//! Custom functions available to every template.

use log::warn;
use minijinja::value::Rest;
use minijinja::{Error, ErrorKind, State, Value};
use std::net::Ipv4Addr;

use crate::yaml::to_block_yaml;

/// Rounds used by [`mkpasswd`].
pub const MKPASSWD_ROUNDS: usize = 8192;

fn invalid(msg: String) -> Error {
    Error::new(ErrorKind::InvalidOperation, msg)
}

/// File header marker; renders as nothing so templates can always call it.
pub fn kiln_header() -> String {
    String::new()
}

/// Name of the template currently being rendered.
pub fn filepath(state: &State) -> String {
    state.name().to_string()
}

/// Returns the `offset`-th address of an IPv4 CIDR block by incrementing the
/// last octet of the network address.
pub fn ip_of_cidr(cidr: &str, offset: u32) -> Result<String, Error> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid(format!("could not parse CIDR [{}]: missing prefix length", cidr)))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|e| invalid(format!("could not parse CIDR [{}]: {}", cidr, e)))?;
    let prefix: u32 = prefix
        .parse()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| invalid(format!("could not parse CIDR [{}]: invalid prefix length", cidr)))?;

    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    let mut octets = Ipv4Addr::from(u32::from(addr) & mask).octets();
    let last = u32::from(octets[3]) + offset;
    octets[3] = u8::try_from(last).map_err(|_| {
        invalid(format!("offset {} is out of range for CIDR [{}]", offset, cidr))
    })?;
    Ok(Ipv4Addr::from(octets).to_string())
}

/// SHA-512 crypt hash of `password` with a random maximum-length salt.
pub fn mkpasswd(password: &str) -> Result<String, Error> {
    let params = sha_crypt::Sha512Params::new(MKPASSWD_ROUNDS)
        .map_err(|e| invalid(format!("invalid hash parameters: {:?}", e)))?;
    sha_crypt::sha512_simple(password, &params)
        .map_err(|e| invalid(format!("could not generate a hashed password: {:?}", e)))
}

/// Re-encodes `value` as a block YAML fragment.
pub fn to_yaml(value: Value, indent: Option<usize>) -> Result<String, Error> {
    let value = serde_json::to_value(&value)
        .map_err(|e| invalid(format!("could not encode yaml: {}", e)))?;
    Ok(to_block_yaml(&value, indent.unwrap_or(2)))
}

/// Checks `version` against `constraint`. When the check passes every
/// message is logged as a warning; the result is returned either way.
pub fn semver_check(version: &str, constraint: &str, messages: Rest<String>) -> Result<bool, Error> {
    let parsed = parse_version(version)?;
    let alternatives = parse_constraint(constraint)?;
    let check = alternatives.iter().any(|req| req.matches(&parsed));

    if check {
        for message in messages.iter() {
            warn!("semver check passed: {}", message);
        }
    }
    Ok(check)
}

/// Parses a version, tolerating a leading `v` and missing minor/patch parts.
pub fn parse_version(version: &str) -> Result<semver::Version, Error> {
    let trimmed = version.trim().trim_start_matches('v');
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let padding = ".0".repeat(2usize.saturating_sub(core.matches('.').count()));
    semver::Version::parse(&format!("{}{}{}", core, padding, rest))
        .map_err(|e| invalid(format!("invalid semver version [{}]: {}", version, e)))
}

/// Parses `||`-separated alternatives. Inside an alternative comparators are
/// joined by commas or whitespace, `a - b` is an inclusive range and a bare
/// version means an exact match.
pub fn parse_constraint(constraint: &str) -> Result<Vec<semver::VersionReq>, Error> {
    constraint
        .split("||")
        .map(|alternative| {
            semver::VersionReq::parse(&comparators(alternative).join(", "))
                .map_err(|e| invalid(format!("invalid semver constraint [{}]: {}", constraint, e)))
        })
        .collect()
}

fn is_operator(token: &str) -> bool {
    token.chars().all(|ch| "<>=!~^".contains(ch))
}

fn comparators(alternative: &str) -> Vec<String> {
    let tokens: Vec<&str> = alternative
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(&"-"), Some(upper)) => {
                out.push(format!(">={}", token));
                out.push(format!("<={}", upper));
                i += 3;
            }
            (Some(version), _) if is_operator(token) => {
                out.push(format!("{}{}", token, version));
                i += 2;
            }
            _ => {
                out.push(token.to_string());
                i += 1;
            }
        }
    }
    out.iter().map(|c| normalize_comparator(c)).collect()
}

fn normalize_comparator(comparator: &str) -> String {
    let split = comparator
        .find(|ch: char| ch.is_ascii_alphanumeric() || ch == '*')
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = version.trim_start_matches('v');
    let exact = op.trim().is_empty()
        && version.starts_with(|ch: char| ch.is_ascii_digit())
        && !version.contains(['*', 'x', 'X']);
    if exact {
        format!("={}", version)
    } else {
        format!("{}{}", op, version)
    }
}
