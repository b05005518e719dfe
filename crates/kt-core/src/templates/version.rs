//! `requires_kt` checks for catalog projects
//!
//! A project may pin the kt versions it was written for, either as a plain
//! version (`0.3.0`, read as `>=0.3.0`) or as a semver range
//! (`>=0.2, <0.4`).

use semver::{Comparator, Op, Version, VersionReq};

/// Compare the running kt version against a project's `requires_kt`.
/// Returns a warning when kt falls outside the requirement; unparseable
/// versions are not compared.
pub fn check_compatibility(
    cli_version: &str,
    requirement: &str,
    upgrade_command: &str,
) -> Option<String> {
    let cli = parse_version(cli_version)?;
    let req = parse_requirement(requirement)?;
    if req.matches(&cli) {
        return None;
    }

    let mut warning = format!(
        "This project requires kt {}, you are running {}.",
        req, cli
    );
    if req.comparators.iter().any(|c| raises_minimum(c, &cli)) {
        warning.push_str(&format!("\nConsider updating: {}", upgrade_command));
    }
    Some(warning)
}

/// Parse a version, handling a leading 'v'
pub fn parse_version(version: &str) -> Option<Version> {
    let cleaned = version.trim();
    Version::parse(cleaned.strip_prefix('v').unwrap_or(cleaned)).ok()
}

/// A bare version means "this version or newer"
pub fn parse_requirement(requirement: &str) -> Option<VersionReq> {
    match parse_version(requirement) {
        Some(version) => Some(VersionReq {
            comparators: vec![Comparator {
                op: Op::GreaterEq,
                major: version.major,
                minor: Some(version.minor),
                patch: Some(version.patch),
                pre: version.pre,
            }],
        }),
        None => VersionReq::parse(requirement.trim()).ok(),
    }
}

/// Whether `comparator` asks for something newer than `cli`
fn raises_minimum(comparator: &Comparator, cli: &Version) -> bool {
    if matches!(comparator.op, Op::Less | Op::LessEq) {
        return false;
    }
    let floor = Version::new(
        comparator.major,
        comparator.minor.unwrap_or(0),
        comparator.patch.unwrap_or(0),
    );
    floor > *cli
}
