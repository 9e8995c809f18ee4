use owo_colors::OwoColorize;

const VERSION_STR: &str = concat!("fdsh v", env!("CARGO_PKG_VERSION"));

/// Command, arguments, summary
const COMMANDS: &[(&str, &str, &str)] = &[
    ("help", "", "show this help"),
    ("ls", "", "list directory"),
    ("cd", "<path>", "change directory, `/` goes to the top"),
    ("pwd", "", "show current directory"),
    ("mkdir", "<name>", "create directory"),
    ("rm", "<name>", "remove file or empty directory"),
    ("cat", "<file>", "show file content"),
    ("get", "<file> [dst]", "copy file to the host"),
    ("put", "<src> [name]", "copy host file here"),
    ("mount", "<image>", "open another image"),
    ("sync", "", "flush current volume"),
    ("exit", "", "flush and leave (also Ctrl + D)"),
];

pub fn show_welcome_text() {
    println!(
        "{} {}",
        VERSION_STR.bold().bright_green(),
        "type `help` for help".dimmed()
    );
}

pub fn show_help_text() {
    let width = COMMANDS
        .iter()
        .map(|(name, args, _)| name.len() + args.len() + 1)
        .max()
        .unwrap_or_default();
    println!("\n{}\n", VERSION_STR.bold());
    for (name, args, summary) in COMMANDS {
        let pad = width - (name.len() + args.len() + 1);
        println!(
            "  {} {}{:pad$} | {}",
            name.cyan().bold(),
            args.bright_cyan(),
            "",
            summary.dimmed(),
        );
    }
    println!();
}
