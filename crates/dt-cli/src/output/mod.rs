//! Output formatting utilities for the CLI
//!
//! Tables for engine listings and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use crate::docker::ContainerSummary;

/// Number of container ID characters shown, as `docker ps` does
const SHORT_ID_LEN: usize = 10;

/// Format a container list as an ASCII table
///
/// Returns "No containers" for an empty list.
pub fn format_containers(containers: &[ContainerSummary]) -> String {
    if containers.is_empty() {
        return "No containers".to_string();
    }

    #[derive(Tabled)]
    struct ContainerRow {
        #[tabled(rename = "CONTAINER ID")]
        id: String,
        #[tabled(rename = "IMAGE")]
        image: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "NAMES")]
        names: String,
    }

    let rows: Vec<ContainerRow> = containers
        .iter()
        .map(|c| ContainerRow {
            id: c.id.chars().take(SHORT_ID_LEN).collect(),
            image: c.image.clone(),
            status: c.status.clone().unwrap_or_else(|| "-".to_string()),
            names: c
                .names
                .iter()
                .map(|n| n.trim_start_matches('/'))
                .collect::<Vec<_>>()
                .join(","),
        })
        .collect();

    Table::new(rows).with(Style::blank()).to_string()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, image: &str, names: &[&str]) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            image: image.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
            state: Some("running".to_string()),
            status: Some("Up 5 minutes".to_string()),
        }
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_containers(&[]), "No containers");
    }

    #[test]
    fn test_format_truncates_ids_and_names() {
        let table = format_containers(&[container(
            "4f2a9c1be0d8a3e5f6",
            "nginx:1.25",
            &["/web", "/frontend"],
        )]);

        assert!(table.contains("CONTAINER ID"));
        assert!(table.contains("4f2a9c1be0"));
        assert!(!table.contains("4f2a9c1be0d"));
        assert!(table.contains("nginx:1.25"));
        assert!(table.contains("web,frontend"));
    }
}
