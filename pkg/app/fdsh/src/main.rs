#[macro_use]
extern crate log;

mod logger;
mod services;
mod utils;

use std::io::{BufRead, Write};
use storage::*;

fn main() {
    logger::init();

    let mut root = RootFs::new();
    for path in std::env::args().skip(1) {
        match services::mount(&mut root, &path) {
            Ok(()) => {}
            Err(err) => error!("Cannot mount {}: {}", path, err),
        }
    }

    utils::show_welcome_text();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} $ ", root.cwd().unwrap_or_default());
        if std::io::stdout().flush().is_err() {
            break;
        }
        let input = match lines.next() {
            Some(Ok(input)) => input,
            _ => {
                println!();
                break;
            }
        };
        let line: Vec<&str> = input.split_whitespace().collect();
        let Some(command) = line.first() else {
            continue;
        };
        let arg = line.get(1).copied();
        match (*command, arg) {
            ("exit", _) => break,
            ("help", _) => utils::show_help_text(),
            ("ls", _) => services::report(services::list(&mut root)),
            ("pwd", _) => services::report(root.cwd().map(|cwd| println!("{}", cwd))),
            ("sync", _) => services::report(root.flush()),
            ("cd", Some(path)) => services::report(services::change_dir(&mut root, path)),
            ("mkdir", Some(name)) => services::report(root.mkdir(name, &EntryOptions::default())),
            ("rm", Some(name)) => services::report(root.remove(name)),
            ("cat", Some(name)) => services::report(services::cat(&mut root, name)),
            ("get", Some(name)) => {
                services::report(services::get(&mut root, name, line.get(2).copied()))
            }
            ("put", Some(src)) => {
                services::report(services::put(&mut root, src, line.get(2).copied()))
            }
            ("mount", Some(path)) => services::report(services::mount(&mut root, path)),
            ("cd" | "mkdir" | "rm" | "cat" | "get" | "put" | "mount", None) => {
                println!("Usage: {} <arg>, see `help`", command)
            }
            _ => println!("[=] unknown command \"{}\"", command),
        }
    }

    if let Err(err) = root.flush() {
        error!("Flush failed: {}", err);
    }
}
