//! Diff computation and display

use colored::Colorize;

use crate::resource::{Resource, ResourceDiff, ResourceState};

/// Compute diffs for all resources
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| ResourceDiff::from_resource(r.as_ref()).ok().flatten())
        .collect()
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!("{}", "Provisioning Diff".bold());

    let mut last_type = "";
    for diff in diffs {
        if diff.resource_type != last_type {
            let type_name = match diff.resource_type.as_str() {
                "os_package" => "Packages",
                "system_user" => "Users",
                "directory" => "Directories",
                "code_copy" => "Code",
                "virtualenv" => "Virtualenv",
                "config_file" => "Config files",
                "systemd_unit" => "Supervisor units",
                "systemd_service" => "Services",
                other => other,
            };
            println!();
            println!("  {}", type_name.bold());
            last_type = &diff.resource_type;
        }

        let symbol = match (&diff.current, &diff.desired) {
            (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
            (ResourceState::Modified { .. }, _) | (_, ResourceState::Modified { .. }) => {
                "~".yellow()
            }
            _ => "?".dimmed(),
        };

        let state_desc = match &diff.current {
            ResourceState::Absent => "(absent)".to_string(),
            ResourceState::Modified { from, to } => format!("{from} → {to}"),
            _ => String::new(),
        };

        println!(
            "    {} {:<40} {}",
            symbol,
            diff.resource_id,
            state_desc.dimmed()
        );
    }

    println!();
    println!("  {} change(s) to apply", diffs.len().to_string().bold());
}
