use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::model::{Status, Task};
use crate::store::ops::SelectedTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn status_label(status: Status) -> String {
    let label = status.to_string();
    match status {
        Status::Open => label.normal().to_string(),
        Status::InProgress => label.cyan().to_string(),
        Status::Blocked => label.yellow().to_string(),
        Status::Closed => label.green().to_string(),
        Status::Deleted => label.red().to_string(),
    }
}

fn print_pretty(task: &Task, parent_shared_context: Option<&[String]>) {
    println!(
        "[{}] {} ({})",
        task.id.to_string().bold(),
        task.title,
        status_label(task.status)
    );
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!("  type: {} | category: {}", task.task_type, task.category);
    if let Some(parent) = task.parent_id {
        println!("  parent: {parent}");
    }
    if !task.meta.is_empty() {
        let pairs: Vec<String> = task.meta.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("  meta: {}", pairs.join(", "));
    }
    if !task.relations.is_empty() {
        let edges: Vec<String> = task
            .relations
            .iter()
            .map(|r| format!("{} {}", r.as_type, r.relates_to))
            .collect();
        println!("  relations: {}", edges.join(", "));
    }
    if let Some(pr) = task.pr_num {
        println!("  pr: #{pr}");
    }
    for note in &task.shared_context {
        println!("  {} {note}", "context:".dimmed());
    }
    if let Some(notes) = parent_shared_context {
        for note in notes {
            println!("  {} {note}", "story context:".dimmed());
        }
    }
}

fn print_minimal_row(task: &Task) {
    let title = truncate_title(&task.title, 32);
    println!(
        "{:>5} {:32} {:8} {:12} {}",
        task.id,
        title,
        task.task_type.to_string(),
        task.status.to_string(),
        task.category
    );
}

pub fn print_task(task: &Task, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(task)?),
        Format::Pretty => print_pretty(task, None),
        Format::Minimal => print_minimal_row(task),
    }
    Ok(())
}

pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let truncated: String = title.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

pub fn print_selection(selected: &[SelectedTask], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(selected)?),
        Format::Pretty => {
            for hit in selected {
                print_pretty(&hit.task, hit.parent_shared_context.as_deref());
                println!();
            }
        }
        Format::Minimal => {
            println!(
                "{:>5} {:32} {:8} {:12} CATEGORY",
                "ID", "TITLE", "TYPE", "STATUS"
            );
            println!("{}", "-".repeat(70));
            for hit in selected {
                print_minimal_row(&hit.task);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_titles() {
        assert_eq!(truncate_title("short", 12), "short");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_title("ééééééé", 6), "ééé...");
    }
}
