use crate::config::Hooks;
use colored::*;

const INDENT: &str = "        ";

/// Tell the user about declared hooks. Local builds never run them.
///
/// Returns whether a warning was printed.
pub fn warn_about_hooks(hooks: &Hooks) -> bool {
    match format_hooks(hooks) {
        Some(listing) => {
            println!(
                "{} You have defined the following hook(s). They cannot be run locally.",
                "!".yellow()
            );
            println!("{}", listing);
            true
        }
        None => false,
    }
}

/// The hook listing, or `None` when no build hook is declared.
fn format_hooks(hooks: &Hooks) -> Option<String> {
    if hooks.build.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    for (kind, commands) in [("build", &hooks.build), ("deploy", &hooks.deploy)] {
        if commands.is_empty() {
            continue;
        }
        lines.push(format!("    {}: |", kind));
        for command in commands {
            for line in command.trim().lines() {
                lines.push(format!("{}{}", INDENT, line.trim()));
            }
        }
    }
    Some(lines.join("\n"))
}
