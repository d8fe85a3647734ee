use std::collections::BTreeMap;
use std::process::Command;

use anyhow::Context;
use serde::Deserialize;

/// Internal crates each workspace crate may depend on.
const ALLOWED: &[(&str, &[&str])] = &[
    ("rulehaunt-domain", &[]),
    ("rulehaunt-shared", &["rulehaunt-domain"]),
    ("rulehaunt-player", &["rulehaunt-domain", "rulehaunt-shared"]),
    ("xtask", &[]),
];

/// External crates the domain layer may not pull in (no I/O in the core).
const DOMAIN_FORBIDDEN: &[&str] = &[
    "tokio",
    "reqwest",
    "tokio-tungstenite",
    "axum",
    "futures-util",
];

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<Package>,
    workspace_members: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Package {
    id: String,
    name: String,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize)]
struct Dependency {
    name: String,
    #[serde(default)]
    kind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("arch-check") => arch_check(),
        Some(cmd) => anyhow::bail!("Unknown xtask command: {cmd}"),
        None => anyhow::bail!("Usage: cargo xtask <command>\n\nCommands:\n  arch-check"),
    }
}

fn arch_check() -> anyhow::Result<()> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .output()
        .context("running cargo metadata")?;

    if !output.status.success() {
        anyhow::bail!(
            "cargo metadata failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    }

    let metadata: Metadata =
        serde_json::from_slice(&output.stdout).context("parsing cargo metadata output")?;
    let violations = check(&metadata);

    if violations.is_empty() {
        println!("arch-check: {} crates OK", metadata.workspace_members.len());
        return Ok(());
    }

    for violation in &violations {
        eprintln!("arch-check: {violation}");
    }
    anyhow::bail!("{} layering violation(s)", violations.len())
}

fn check(metadata: &Metadata) -> Vec<String> {
    let allowed: BTreeMap<&str, &[&str]> = ALLOWED.iter().copied().collect();
    let mut violations = Vec::new();

    let members = metadata
        .packages
        .iter()
        .filter(|p| metadata.workspace_members.contains(&p.id));

    for package in members {
        let Some(permitted) = allowed.get(package.name.as_str()) else {
            violations.push(format!("{} is not listed in the layer table", package.name));
            continue;
        };

        // Dev-dependencies are free to reach across layers
        let normal = package
            .dependencies
            .iter()
            .filter(|d| d.kind.as_deref() != Some("dev"));

        for dep in normal {
            let internal = allowed.contains_key(dep.name.as_str());
            if internal && !permitted.contains(&dep.name.as_str()) {
                violations.push(format!("{} must not depend on {}", package.name, dep.name));
            }
            if package.name == "rulehaunt-domain" && DOMAIN_FORBIDDEN.contains(&dep.name.as_str()) {
                violations.push(format!("rulehaunt-domain must stay I/O free (found {})", dep.name));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(json: &str) -> Metadata {
        serde_json::from_str(json).expect("metadata")
    }

    #[test]
    fn clean_layering_passes() {
        let m = metadata(
            r#"{
                "workspace_members": ["d", "s", "p"],
                "packages": [
                    {"id": "d", "name": "rulehaunt-domain", "dependencies": [{"name": "serde", "kind": null}]},
                    {"id": "s", "name": "rulehaunt-shared", "dependencies": [{"name": "rulehaunt-domain", "kind": null}]},
                    {"id": "p", "name": "rulehaunt-player", "dependencies": [
                        {"name": "rulehaunt-shared", "kind": null},
                        {"name": "axum", "kind": "dev"}
                    ]}
                ]
            }"#,
        );
        assert!(check(&m).is_empty());
    }

    #[test]
    fn upward_and_io_dependencies_are_flagged() {
        let m = metadata(
            r#"{
                "workspace_members": ["d", "s"],
                "packages": [
                    {"id": "d", "name": "rulehaunt-domain", "dependencies": [{"name": "tokio", "kind": null}]},
                    {"id": "s", "name": "rulehaunt-shared", "dependencies": [{"name": "rulehaunt-player", "kind": null}]}
                ]
            }"#,
        );
        let violations = check(&m);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("tokio")));
        assert!(violations
            .iter()
            .any(|v| v == "rulehaunt-shared must not depend on rulehaunt-player"));
    }
}
